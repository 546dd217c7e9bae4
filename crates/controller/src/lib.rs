//! tstream - Controller
//!
//! The control plane: declaration storage, the reconciler that diffs a newly
//! resolved component set against the running workers, and the config worker
//! that serializes declaration applies and emits lifecycle events.
//!
//! Control-plane errors surface to the caller; everything the data plane
//! does behind these components logs and continues.

mod error;
mod reconciler;
mod storage;
mod worker;

pub use error::{ControllerError, Result};
pub use reconciler::Reconciler;
pub use storage::{CONFIG_KEY, FileStorage, MemoryStorage, Storage};
pub use worker::{ConfigEvent, ConfigWorker, ProcessOptions, ProcessOutcome};
