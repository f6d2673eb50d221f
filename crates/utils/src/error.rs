use std::{
	fmt::{self, Display},
	path::Path,
};

use thiserror::Error;
use tracing::error;

/// Logs the error side of a fire-and-forget result
pub fn report_error(res: &Result<(), impl Display>, context: &str) {
	if let Err(e) = res {
		error!(%context, "{e:#}");
	}
}

/// I/O error carrying the path it happened on, and optionally what we were doing there
#[derive(Error, Debug)]
pub struct FileIOError {
	pub path: Box<Path>,
	#[source]
	pub source: std::io::Error,
	pub maybe_context: Option<&'static str>,
}

impl Display for FileIOError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.maybe_context {
			Some(ctx) => write!(
				f,
				"file I/O error ({ctx}): {}; path: '{}'",
				self.source,
				self.path.display()
			),
			None => write!(
				f,
				"file I/O error: {}; path: '{}'",
				self.source,
				self.path.display()
			),
		}
	}
}

impl FileIOError {
	#[must_use]
	pub fn kind(&self) -> std::io::ErrorKind {
		self.source.kind()
	}

	#[must_use]
	pub fn is_not_found(&self) -> bool {
		self.kind() == std::io::ErrorKind::NotFound
	}
}

impl<P: AsRef<Path>> From<(P, std::io::Error)> for FileIOError {
	fn from((path, source): (P, std::io::Error)) -> Self {
		Self {
			path: path.as_ref().into(),
			source,
			maybe_context: None,
		}
	}
}

impl<P: AsRef<Path>> From<(P, std::io::Error, &'static str)> for FileIOError {
	fn from((path, source, context): (P, std::io::Error, &'static str)) -> Self {
		Self {
			path: path.as_ref().into(),
			source,
			maybe_context: Some(context),
		}
	}
}
