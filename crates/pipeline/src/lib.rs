//! The try-on workflow.
//!
//! ```text
//! VALIDATE -> SUBMITTED -> POLLING -> DOWNLOADING -> PERSISTING -> DONE
//!     \___________\____________\___________\_____________\_______-> FAILED
//! ```
//!
//! Validation, submission, polling and download failures end the attempt.
//! Persistence degrades instead: the durable copy is required, the local
//! copy and the metadata row are conveniences whose failure is folded into
//! the [`TryOnResult`](fitbooth_core::TryOnResult) flags.

pub mod error;
pub mod orchestrator;
pub mod prepare;

pub use error::TryOnError;
pub use orchestrator::{TryOnMetadata, TryOnOrchestrator, TryOnProgress, TryOnRequest, TryOnStage};
pub use prepare::{frame_model_image, prepare_model_image, ModelSource};
