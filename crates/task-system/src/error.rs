use std::fmt;

use thiserror::Error;

use super::task::TaskId;

/// Bound required from the error type returned by every task on a system
pub trait RunError: std::error::Error + fmt::Debug + Send + Sync + 'static {}

impl<T: std::error::Error + fmt::Debug + Send + Sync + 'static> RunError for T {}

#[derive(Debug, Error)]
pub enum SystemError {
	#[error("task queue is full <capacity={0}>")]
	Busy(usize),
	#[error("task system is shutting down")]
	Shutdown,
	#[error("task join error <id='{0}'>")]
	TaskJoin(TaskId),
}
