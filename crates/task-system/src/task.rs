use std::{
	fmt,
	future::Future,
	pin::Pin,
	task::{Context, Poll},
};

use async_trait::async_trait;
use downcast_rs::{impl_downcast, Downcast};
use tokio::sync::oneshot;
use uuid::Uuid;

use super::error::{RunError, SystemError};

/// A unique identifier for a task using the [`uuid`](https://docs.rs/uuid) crate.
///
/// Ids are random, so they carry no information about submission order.
pub type TaskId = Uuid;

/// Any kind of output that a task can return.
///
/// The dispatcher downcasts it back to the concrete type it knows the task returns.
pub trait AnyTaskOutput: Send + Downcast + 'static {}

impl fmt::Debug for Box<dyn AnyTaskOutput> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "<AnyTaskOutput>")
	}
}

impl_downcast!(AnyTaskOutput);

impl<T: Send + 'static> AnyTaskOutput for T {}

/// Boxes any [`AnyTaskOutput`] into a [`TaskOutput`].
pub trait IntoAnyTaskOutput {
	fn into_output(self) -> TaskOutput;
}

impl<T: AnyTaskOutput + 'static> IntoAnyTaskOutput for T {
	fn into_output(self) -> TaskOutput {
		TaskOutput::Out(Box::new(self))
	}
}

/// Whether a task returned anything or not.
#[derive(Debug)]
pub enum TaskOutput {
	Out(Box<dyn AnyTaskOutput>),
	Empty,
}

impl From<()> for TaskOutput {
	fn from((): ()) -> Self {
		Self::Empty
	}
}

/// All possible outcomes for a dispatched task. Every variant is terminal.
#[derive(Debug)]
pub enum TaskStatus<T, E> {
	/// The task finished successfully and maybe has some output for the dispatcher.
	Done((TaskId, TaskOutput)),
	/// The task returned an error.
	Error(E),
	/// The task panicked; the panic payload message is kept when it was a string.
	Panicked(String),
	/// The system was shutdown before a worker picked the task up, so we give it back.
	Shutdown(Box<T>),
}

/// Converts a value into the task type a system runs.
pub trait IntoTask<T>: Send {
	fn into_task(self) -> T;
}

impl<T: Send> IntoTask<T> for T {
	fn into_task(self) -> T {
		self
	}
}

/// The unit of work executed by a worker.
///
/// All tasks on a system return the same error type, so the dispatcher has a single place to
/// turn failures into something meaningful. A task runs exactly once: there is no pause, resume
/// or retry, and once a worker starts it, it runs to completion.
#[async_trait]
pub trait Task<E: RunError>: Send + 'static {
	fn id(&self) -> TaskId;

	async fn run(&mut self) -> Result<TaskOutput, E>;
}

pub(crate) struct TaskWorkState<T, E> {
	pub(crate) task: T,
	pub(crate) done_tx: oneshot::Sender<TaskStatus<T, E>>,
}

pin_project_lite::pin_project! {
	/// Resolves with the task's terminal [`TaskStatus`].
	///
	/// Dropping the handle does not cancel the task, it only discards its outcome.
	#[must_use = "`TaskHandle` does nothing unless polled"]
	pub struct TaskHandle<T, E> {
		#[pin]
		done_rx: oneshot::Receiver<TaskStatus<T, E>>,
		task_id: TaskId,
	}
}

impl<T, E> TaskHandle<T, E> {
	pub(crate) const fn new(task_id: TaskId, done_rx: oneshot::Receiver<TaskStatus<T, E>>) -> Self {
		Self { done_rx, task_id }
	}

	#[must_use]
	pub const fn task_id(&self) -> TaskId {
		self.task_id
	}
}

impl<T, E> fmt::Debug for TaskHandle<T, E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TaskHandle")
			.field("task_id", &self.task_id)
			.finish_non_exhaustive()
	}
}

impl<T, E: RunError> Future for TaskHandle<T, E> {
	type Output = Result<TaskStatus<T, E>, SystemError>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let this = self.project();
		let task_id = *this.task_id;

		this.done_rx
			.poll(cx)
			.map(|res| res.map_err(|_| SystemError::TaskJoin(task_id)))
	}
}
