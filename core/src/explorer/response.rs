use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, warn};

use crate::{error::codes, Error};

/// Uniform envelope returned by every facade action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
	pub code: i32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
	pub msg: String,
}

impl Response {
	#[must_use]
	pub fn ok() -> Self {
		Self {
			code: codes::SUCCESS,
			data: None,
			msg: String::new(),
		}
	}

	pub fn with_data(data: impl Serialize) -> Self {
		match serde_json::to_value(data) {
			Ok(data) => Self {
				code: codes::SUCCESS,
				data: Some(data),
				msg: String::new(),
			},
			Err(e) => {
				error!(?e, "Failed to serialize response data;");
				Self {
					code: codes::NOT_SET,
					data: None,
					msg: "failed to serialize response".to_string(),
				}
			}
		}
	}

	#[must_use]
	pub const fn is_ok(&self) -> bool {
		self.code == codes::SUCCESS
	}

	/// Deserializes `data` into `T`
	pub fn data_as<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
		self.data
			.clone()
			.and_then(|data| serde_json::from_value(data).ok())
	}
}

impl From<Error> for Response {
	fn from(e: Error) -> Self {
		let code = e.code();

		match e {
			Error::Backend(_) | Error::Archive(_) | Error::Persistence(_) => {
				error!(?e, code, "Request failed;");
			}
			_ => warn!(%e, code, "Request rejected"),
		}

		Self {
			code,
			data: None,
			msg: e.to_string(),
		}
	}
}

impl<T: Serialize> From<Result<T, Error>> for Response {
	fn from(res: Result<T, Error>) -> Self {
		match res {
			Ok(data) => Self::with_data(data),
			Err(e) => e.into(),
		}
	}
}

/// Properties shown for a file or a folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectProps {
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	/// Storage policy name, files only
	pub policy: String,
	pub size: u64,
	pub child_folder_num: u64,
	pub child_file_num: u64,
	/// Location of the object, filled only when asked to trace the root
	pub path: String,
	/// When the statistics were computed, older than now when they came from cache
	pub query_date: DateTime<Utc>,
}
