//!
//! # Task System
//!
//! A bounded worker pool for running long jobs off the request path.
//!
//! Bring your own task type and error type, and the system takes care of queueing,
//! parallel execution and failure isolation:
//! - A fixed number of workers pull from a single bounded queue;
//! - Dispatching never waits: a full queue is reported back as [`TaskSystemError::Busy`];
//! - A task that panics only fails itself, the worker that ran it keeps going;
//! - On shutdown, running tasks are allowed to finish and queued tasks are handed back to their
//!   dispatchers through [`TaskStatus::Shutdown`].
//!
//! ## Basic example
//!
//! ```
//! use cumulus_task_system::{Task, TaskId, TaskOutput, TaskStatus, TaskSystem};
//! use async_trait::async_trait;
//! use thiserror::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum SampleError {
//!     #[error("Sample error")]
//!     SampleError,
//! }
//!
//! #[derive(Debug)]
//! pub struct ReadyTask {
//!     id: TaskId,
//! }
//!
//! #[async_trait]
//! impl Task<SampleError> for ReadyTask {
//!     fn id(&self) -> TaskId {
//!         self.id
//!     }
//!
//!     async fn run(&mut self) -> Result<TaskOutput, SampleError> {
//!         Ok(TaskOutput::Empty)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let system = TaskSystem::<ReadyTask, SampleError>::new(2, 16);
//!
//!     let handle = system.dispatch(ReadyTask { id: TaskId::new_v4() }).unwrap();
//!
//!     assert!(matches!(
//!         handle.await,
//!         Ok(TaskStatus::Done((_, TaskOutput::Empty)))
//!     ));
//!
//!     system.shutdown().await;
//! }
//! ```

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod error;
mod system;
mod task;
mod worker;

pub use error::{RunError, SystemError as TaskSystemError};
pub use system::{Dispatcher as TaskDispatcher, System as TaskSystem};
pub use task::{
	AnyTaskOutput, IntoAnyTaskOutput, IntoTask, Task, TaskHandle, TaskId, TaskOutput, TaskStatus,
};
