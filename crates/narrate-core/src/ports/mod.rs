//! Port definitions for the external systems the pipeline talks to.
//!
//! Ports contain no implementation details and use only domain types.
//! Adapters live in `narrate-storage`, `narrate-synth` and `narrate-audio`.

pub mod media;
pub mod storage;
pub mod synthesis;

pub use media::{EncodeSpec, Filter, MediaEngine, MediaError, StitchSpec, mastering_chain};
pub use storage::{Access, ObjectStore, PutOptions, StorageError, StoredObject};
pub use synthesis::{SynthesisEngine, SynthesisError, SynthesisRequest, SynthesisResponse};
