use std::sync::atomic::AtomicBool;
use std::time::Duration;

use tgam_core::{
    AnalysisCfg, ConnectionErrorKind, ConnectionEvent, Coordinator, DecodedRecord, PortEvent,
    StreamEvent, event_channel,
};
use tgam_traits::clock::test_clock::TestClock;

fn coordinator(cfg: AnalysisCfg) -> (Coordinator<TestClock>, TestClock) {
    let clock = TestClock::new();
    let c = Coordinator::with_clock(cfg, clock.clone()).unwrap();
    (c, clock)
}

#[test]
fn sixty_five_samples_trigger_exactly_one_recompute() {
    let (mut c, _clock) = coordinator(AnalysisCfg::default());
    let mut combined = Vec::new();
    for i in 0..65 {
        if let Some(rec) = c.handle(DecodedRecord::raw(i)) {
            combined.push(rec);
        }
    }
    assert_eq!(combined.len(), 1);
    assert_eq!(c.engine().recompute_count(), 1);
    assert_eq!(c.pending(), 1);
    // Last sample of the batch is sample 63.
    assert!((combined[0].raw_eeg - 63.0 * 0.516).abs() < 1e-9);
}

#[test]
fn fallback_flushes_partial_batch_after_interval() {
    let (mut c, clock) = coordinator(AnalysisCfg::default());
    for i in 0..70 {
        c.handle(DecodedRecord::raw(i));
    }
    assert_eq!(c.pending(), 6);
    assert!(c.tick().is_none());
    clock.advance(Duration::from_millis(99));
    assert!(c.tick().is_none());
    clock.advance(Duration::from_millis(1));
    let rec = c.tick().expect("fallback flush");
    assert_eq!(rec.timestamp_ms, 100);
    assert_eq!(c.pending(), 0);
    assert_eq!(c.engine().recompute_count(), 2);
    clock.advance(Duration::from_secs(1));
    assert!(c.tick().is_none(), "empty batch never flushes");
}

#[test]
fn fallback_below_minimum_window_carries_bands_forward() {
    let (mut c, clock) = coordinator(AnalysisCfg::default());
    for i in 0..10 {
        c.handle(DecodedRecord::raw(i));
    }
    clock.advance(Duration::from_millis(150));
    let rec = c.tick().expect("fallback flush");
    assert_eq!(rec.frequency_bands.0, [0.0; 8]);
    assert_eq!(c.engine().recompute_count(), 0);
}

#[test]
fn scalars_are_merged_into_next_emission() {
    let cfg = AnalysisCfg {
        batch_size: 4,
        ..AnalysisCfg::default()
    };
    let (mut c, _clock) = coordinator(cfg);
    c.handle(DecodedRecord::Attention { value: 61 });
    c.handle(DecodedRecord::SignalQuality { value: 26 });
    let mut out = None;
    for i in 0..4 {
        out = c.handle(DecodedRecord::raw(i));
    }
    let rec = out.expect("batch of four");
    assert_eq!(rec.attention, Some(61));
    assert_eq!(rec.signal_quality, Some(26));
    assert_eq!(rec.meditation, None);
}

#[test]
fn reset_clears_everything() {
    let (mut c, _clock) = coordinator(AnalysisCfg::default());
    for i in 0..130 {
        c.handle(DecodedRecord::raw(i));
    }
    c.handle(DecodedRecord::Meditation { value: 3 });
    c.reset();
    let stats = c.statistics();
    assert_eq!(stats.recomputes, 0);
    assert_eq!(stats.combined_emitted, 0);
    assert!(stats.aggregate.raw.is_none());
    assert!(stats.aggregate.meditation.is_none());
    assert_eq!(c.pending(), 0);
    assert!(c.engine().is_empty());
    c.reset();
    assert_eq!(c.statistics(), stats);
}

#[test]
fn invalid_config_is_rejected() {
    let bad = AnalysisCfg {
        sample_rate_hz: 0,
        ..AnalysisCfg::default()
    };
    assert!(Coordinator::with_clock(bad, TestClock::new()).is_err());
    let bad = AnalysisCfg {
        batch_size: 0,
        ..AnalysisCfg::default()
    };
    assert!(Coordinator::new(bad).is_err());
}

#[test]
fn set_sample_rate_rebuilds_engine() {
    let (mut c, _clock) = coordinator(AnalysisCfg::default());
    for i in 0..100 {
        c.handle(DecodedRecord::raw(i));
    }
    c.set_sample_rate(256).unwrap();
    assert_eq!(c.engine().sample_rate_hz(), 256);
    assert!(c.engine().is_empty());
    assert!(c.set_sample_rate(0).is_err());
    assert_eq!(c.config().sample_rate_hz, 256);
}

#[test]
fn run_routes_port_events_until_senders_drop() {
    let cfg = AnalysisCfg {
        batch_size: 2,
        ..AnalysisCfg::default()
    };
    let (mut c, _clock) = coordinator(cfg);
    let (tx, rx) = event_channel();
    tx.send(PortEvent::Opened {
        port: "loop0".into(),
    })
    .unwrap();
    tx.send(PortEvent::RawBytes(vec![1, 2, 3])).unwrap();
    tx.send(PortEvent::Record(DecodedRecord::raw(1))).unwrap();
    tx.send(PortEvent::Record(DecodedRecord::raw(2))).unwrap();
    tx.send(PortEvent::Error {
        kind: ConnectionErrorKind::Timeout,
        message: "semaphore timeout".into(),
    })
    .unwrap();
    tx.send(PortEvent::Closed).unwrap();
    drop(tx);

    let shutdown = AtomicBool::new(false);
    let mut seen = Vec::new();
    c.run(&rx, |ev| seen.push(ev), &shutdown);

    assert!(matches!(
        seen[0],
        StreamEvent::Connection(ConnectionEvent::Opened { ref port }) if port == "loop0"
    ));
    assert!(matches!(seen[1], StreamEvent::Decoded(_)));
    assert!(matches!(seen[2], StreamEvent::Decoded(_)));
    assert!(matches!(seen[3], StreamEvent::Combined(_)));
    assert!(matches!(
        seen[4],
        StreamEvent::Connection(ConnectionEvent::Error(ref e)) if e.kind == ConnectionErrorKind::Timeout
    ));
    assert!(matches!(seen[5], StreamEvent::Connection(ConnectionEvent::Closed)));
    assert_eq!(seen.len(), 6);
}

#[test]
fn run_honors_shutdown_flag() {
    let (mut c, _clock) = coordinator(AnalysisCfg::default());
    let (_tx, rx) = event_channel();
    let shutdown = AtomicBool::new(true);
    let mut n = 0;
    c.run(&rx, |_| n += 1, &shutdown);
    assert_eq!(n, 0);
}
