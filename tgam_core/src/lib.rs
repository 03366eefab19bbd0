#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! TGAM headset stream processing (hardware-agnostic).
//!
//! All device access goes through `tgam_traits::PortBackend` and
//! `tgam_traits::SerialTransport`.
//!
//! ## Architecture
//!
//! - **Decoding**: incremental packet state machine (`decoder`)
//! - **Bands**: windowed Butterworth decomposition into eight bands
//!   (`filters`, `bands`)
//! - **Aggregation**: per-kind rolling statistics (`aggregator`)
//! - **Connection**: enumeration, open/retry/close and the background read
//!   loop (`port`, `reader`)
//! - **Coordination**: batching, scalar caching and combined output
//!   (`coordinator`)

pub mod aggregator;
pub mod bands;
pub mod config;
pub mod conversions;
pub mod coordinator;
pub mod decoder;
pub mod error;
pub mod filters;
pub mod hw_error;
pub mod mocks;
pub mod port;
pub mod reader;
pub mod records;
pub mod util;

pub use aggregator::{AggregateSnapshot, AggregateStats, Aggregator};
pub use bands::{BandEngine, BandStatistics, FilterStrategy};
pub use config::{AnalysisCfg, ReaderCfg};
pub use coordinator::{ConnectionEvent, Coordinator, StreamEvent, StreamStatistics};
pub use decoder::{Decoder, DecoderStats, encode_packet};
pub use error::{ConfigError, ConnectionError, ConnectionErrorKind, ProtocolError};
pub use port::{PortEvent, PortManager, PortState, event_channel};
pub use records::{Band, BandPowerSet, CombinedRecord, DecodedRecord, RecordKind, SignalLevel};
