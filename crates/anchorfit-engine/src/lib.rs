//! Refinement engine: normalizer, candidate generators, scorer, and the
//! bounded accept/retry/rollback controller.

pub mod batch;
pub mod controller;
pub mod generator;
pub mod normalize;
pub mod rules;
pub mod scorer;

pub use batch::{BatchSummary, run_batch};
pub use controller::{Controller, validate};
pub use generator::{
    CandidateGenerator, DEFAULT_REPLY_FIELD, DeterministicGenerator,
    ModelGenerator, extract_first_json_object,
};
pub use normalize::{is_interrogative_anchor, normalize};
pub use scorer::Scorer;
