pub mod geo_index;
pub mod ranking;
pub mod recovery_service;
pub mod sequencer;

pub use geo_index::GeoIndex;
pub use ranking::{Candidate, CandidateRanker};
pub use recovery_service::{DispatchRecoveryService, RecoveryReport, RecoveryService};
pub use sequencer::{CreateRideRequest, DispatchSequencer, SequencerConfig};
