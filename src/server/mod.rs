//! Request handling behind the RPC surface
//!
//! - [`processor`]: resolution, inference and training orchestration
//! - [`model_cache`]: loaded model instances keyed by (name, version)
//! - [`streaming`]: outbound result chunking and inbound upload reassembly

pub mod model_cache;
pub mod processor;
pub mod streaming;

pub use model_cache::{CacheStats, CachedModel, ModelCache};
pub use processor::{
    HealthReport, ModelInfo, Processed, RequestProcessor, TrainingOutcome, TrainingRequest,
};
pub use streaming::{consume_chunks, error_chunk, produce_chunks, ResultChunk, ResultChunks, TrainingChunk};
