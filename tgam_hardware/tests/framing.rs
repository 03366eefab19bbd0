use rstest::rstest;
use tgam_hardware::error::HwError;
use tgam_hardware::{SerialBackend, builder_for};
use tgam_traits::{FlowControl, Parity, PortBackend, SerialSettings, StopBits};

fn settings() -> SerialSettings {
    SerialSettings::new("/dev/tgam-test-does-not-exist")
}

#[rstest]
#[case(Parity::None, StopBits::One, FlowControl::None, 8)]
#[case(Parity::Even, StopBits::Two, FlowControl::Hardware, 7)]
#[case(Parity::Odd, StopBits::One, FlowControl::Software, 5)]
fn supported_framing_builds(
    #[case] parity: Parity,
    #[case] stop_bits: StopBits,
    #[case] flow_control: FlowControl,
    #[case] byte_size: u8,
) {
    let s = SerialSettings {
        parity,
        stop_bits,
        flow_control,
        byte_size,
        ..settings()
    };
    assert!(builder_for(&s).is_ok());
}

#[rstest]
#[case(Parity::Mark, StopBits::One, 8, "mark parity")]
#[case(Parity::Space, StopBits::One, 8, "space parity")]
#[case(Parity::None, StopBits::OnePointFive, 8, "1.5 stop bits")]
#[case(Parity::None, StopBits::One, 9, "byte size")]
fn unsupported_framing_is_rejected(
    #[case] parity: Parity,
    #[case] stop_bits: StopBits,
    #[case] byte_size: u8,
    #[case] needle: &str,
) {
    let s = SerialSettings {
        parity,
        stop_bits,
        byte_size,
        ..settings()
    };
    match builder_for(&s) {
        Err(HwError::Unsupported(msg)) => assert!(msg.contains(needle), "{msg}"),
        Err(other) => panic!("unexpected error: {other:?}"),
        Ok(_) => panic!("expected rejection"),
    }
}

#[test]
fn opening_a_missing_device_fails_without_panicking() {
    let backend = SerialBackend::new();
    let err = backend.open(&settings()).expect_err("device must not exist");
    assert!(!err.to_string().is_empty());
}

#[test]
fn probing_a_missing_device_fails() {
    let backend = SerialBackend::new();
    assert!(
        backend
            .probe(
                "/dev/tgam-test-does-not-exist",
                std::time::Duration::from_millis(10)
            )
            .is_err()
    );
}
