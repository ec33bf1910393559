pub mod capability;
pub mod config;
pub mod error;
pub mod model;
pub mod schema;
pub mod text;

pub use capability::{FnGeneration, FnSimilarity, GenerationInput, Similarity, TextGeneration};
pub use config::{
    BatchConfig, ColumnNames, DecisionStrategy, EmbeddingConfig, EngineConfig, GenerationConfig,
    GeneratorKind, NearMissBand,
};
pub use error::{ConfigError, GenerationFailure, ScoringError, ValidationFailure};
pub use model::{
    Candidate, Decision, Origin, RefinementRequest, RefinementResult, ScoredCandidate,
    StructuralTag, percent_change,
};
pub use schema::batch;
pub use text::TermSet;
