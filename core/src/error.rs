use thiserror::Error;

use crate::{archive::ArchiveError, backend::BackendError, store::StoreError};

/// Response codes shared with the request layer. `0` is success.
pub mod codes {
	pub const NOT_SET: i32 = -1;
	pub const SUCCESS: i32 = 0;
	pub const NOT_FOUND: i32 = 404;
	pub const PARAM_ERR: i32 = 40001;
	pub const OBJECT_EXIST: i32 = 40004;
	pub const GROUP_NOT_ALLOWED: i32 = 40007;
	pub const DB_ERR: i32 = 50001;
	pub const IO_FAILED: i32 = 50004;
	pub const ARCHIVE_FAILED: i32 = 50005;
	pub const CACHE_FAILED: i32 = 50006;
	pub const QUEUE_FULL: i32 = 50007;
}

#[derive(Debug, Error)]
pub enum Error {
	/// Absent object or path, undecodable identifier, or an object owned by someone else
	#[error("{0}")]
	NotFound(String),
	/// Capability flag is off for the user's group
	#[error("{0}")]
	PermissionDenied(String),
	#[error("{0}")]
	ParamInvalid(String),
	/// An object with the same name already sits in the destination
	#[error("{0}")]
	Conflict(String),
	/// Group size ceiling or remaining capacity exceeded
	#[error("{0}")]
	ResourceExceeded(String),
	#[error("task queue is full, try again later")]
	Busy,
	#[error("task engine is shutting down")]
	ShuttingDown,
	#[error(transparent)]
	Backend(#[from] BackendError),
	#[error(transparent)]
	Archive(#[from] ArchiveError),
	#[error(transparent)]
	Persistence(StoreError),
	#[error(transparent)]
	Cache(#[from] cumulus_cache::Error),
	/// A multi-object operation stopped part way; objects not listed were processed
	#[error("{cause} (failed: {})", .failed.join(", "))]
	Incomplete {
		failed: Vec<String>,
		#[source]
		cause: Box<Error>,
	},
}

impl From<StoreError> for Error {
	fn from(e: StoreError) -> Self {
		match e {
			StoreError::NotFound(what) => Self::NotFound(what),
			e => Self::Persistence(e),
		}
	}
}

impl Error {
	pub fn not_found(what: impl Into<String>) -> Self {
		Self::NotFound(what.into())
	}

	pub fn param(what: impl Into<String>) -> Self {
		Self::ParamInvalid(what.into())
	}

	#[must_use]
	pub fn code(&self) -> i32 {
		match self {
			Self::NotFound(_) => codes::NOT_FOUND,
			Self::PermissionDenied(_) => codes::GROUP_NOT_ALLOWED,
			// Size and quota rejections are reported like any other invalid request
			Self::ParamInvalid(_) | Self::ResourceExceeded(_) => codes::PARAM_ERR,
			Self::Conflict(_) => codes::OBJECT_EXIST,
			Self::Busy | Self::ShuttingDown => codes::QUEUE_FULL,
			Self::Backend(_) => codes::IO_FAILED,
			Self::Archive(_) => codes::ARCHIVE_FAILED,
			Self::Persistence(_) => codes::DB_ERR,
			Self::Cache(_) => codes::CACHE_FAILED,
			Self::Incomplete { cause, .. } => cause.code(),
		}
	}
}
