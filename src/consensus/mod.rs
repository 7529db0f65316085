//! Auto-consensus batch collection.
//!
//! In batch mode the camera keeps capturing while the document is steady
//! and offers every candidate to a [`ConsensusCollector`]. Candidates whose
//! difference hash is too close to one already collected are discarded, so
//! the delivered batch holds perceptually distinct frames for downstream
//! OCR voting.

mod collector;

pub use collector::{
    BatchOutcome, Completion, ConsensusCollector, ConsensusConfig, ConsensusError, OfferOutcome,
};
