//! Archive codec capability used by the compress and decompress jobs and by archive downloads.

use std::{borrow::Cow, io::Read};

use encoding_rs::{Encoding, UTF_8};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod bundled;
mod tarball;
mod zipfile;

pub use bundled::StandardCodec;

/// Container formats a decompress request may name, recognised by file suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
	Zip,
	Gz,
	Xz,
	Tar,
	Rar,
}

impl ArchiveFormat {
	const SUFFIXES: [(&'static str, Self); 5] = [
		(".zip", Self::Zip),
		(".gz", Self::Gz),
		(".xz", Self::Xz),
		(".tar", Self::Tar),
		(".rar", Self::Rar),
	];

	/// Suffix match that ignores ASCII case, so `PHOTOS.ZIP` is a zip.
	/// `None` for anything outside the allow-list.
	#[must_use]
	pub fn from_name(name: &str) -> Option<Self> {
		Self::SUFFIXES
			.iter()
			.find(|(suffix, _)| has_suffix(name, suffix))
			.map(|(_, format)| *format)
	}

	#[must_use]
	pub const fn suffix(self) -> &'static str {
		match self {
			Self::Zip => ".zip",
			Self::Gz => ".gz",
			Self::Xz => ".xz",
			Self::Tar => ".tar",
			Self::Rar => ".rar",
		}
	}
}

pub(crate) fn has_suffix(name: &str, suffix: &str) -> bool {
	name.len()
		.checked_sub(suffix.len())
		.and_then(|start| name.get(start..))
		.is_some_and(|end| end.eq_ignore_ascii_case(suffix))
}

#[derive(Debug, Error)]
pub enum ArchiveError {
	#[error("archive format {0:?} is not supported by this codec")]
	UnsupportedFormat(ArchiveFormat),
	#[error("unsupported entry name encoding '{0}'")]
	UnsupportedEncoding(String),
	#[error("corrupt archive: {0}")]
	Corrupt(#[source] std::io::Error),
	#[error("archive entry name '{0}' is not valid in the requested encoding")]
	InvalidEntryName(String),
	#[error("archive expands beyond {limit} bytes")]
	TooLarge { limit: u64 },
	#[error("failed to write archive: {0}")]
	Write(#[source] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveEntry {
	Dir { path: String },
	File { path: String, data: Vec<u8> },
}

impl ArchiveEntry {
	#[must_use]
	pub fn path(&self) -> &str {
		match self {
			Self::Dir { path } | Self::File { path, .. } => path,
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractOptions {
	/// WHATWG label of the charset entry names are written in (`gbk`, `shift_jis`, ...).
	/// `None` means UTF-8, or for zip whatever the archive flags itself.
	pub encoding: Option<String>,
	/// Ceiling on the total uncompressed size, checked while reading
	pub max_size: Option<u64>,
}

/// Accumulates `(entry name, content)` pairs into one archive
pub trait ArchiveWriter: Send {
	fn append(&mut self, name: &str, data: &[u8]) -> Result<(), ArchiveError>;

	fn finish(self: Box<Self>) -> Result<Vec<u8>, ArchiveError>;
}

/// Codec work is CPU bound and synchronous, it runs on whichever worker executes the job.
pub trait ArchiveCodec: Send + Sync + 'static {
	/// Suffix given to archives this codec writes, dot included
	fn extension(&self) -> &'static str;

	fn open_for_write(&self) -> Box<dyn ArchiveWriter>;

	/// Reads every entry of `data`, an archive file called `name`.
	///
	/// Entry paths come back `/` separated, relative, and free of `.` and `..` components.
	/// A compressed stream that holds a single plain file comes back as one entry named after
	/// the archive, minus its suffix.
	fn extract(
		&self,
		format: ArchiveFormat,
		name: &str,
		data: &[u8],
		options: &ExtractOptions,
	) -> Result<Vec<ArchiveEntry>, ArchiveError>;
}

/// Turns raw entry name bytes into text
#[derive(Debug, Clone, Copy)]
struct EntryNames {
	encoding: Option<&'static Encoding>,
}

impl EntryNames {
	fn for_label(label: Option<&str>) -> Result<Self, ArchiveError> {
		let Some(label) = label.map(str::trim).filter(|label| !label.is_empty()) else {
			return Ok(Self { encoding: None });
		};

		Encoding::for_label(label.as_bytes())
			.map(|encoding| Self {
				encoding: Some(encoding),
			})
			.ok_or_else(|| ArchiveError::UnsupportedEncoding(label.to_string()))
	}

	const fn is_explicit(self) -> bool {
		self.encoding.is_some()
	}

	fn decode(self, raw: &[u8]) -> Result<String, ArchiveError> {
		self.encoding
			.unwrap_or(UTF_8)
			.decode_without_bom_handling_and_without_replacement(raw)
			.map(Cow::into_owned)
			.ok_or_else(|| {
				ArchiveError::InvalidEntryName(String::from_utf8_lossy(raw).into_owned())
			})
	}
}

/// Uncompressed bytes read out of one archive so far, against an optional ceiling
#[derive(Debug)]
struct Budget {
	limit: Option<u64>,
	used: u64,
}

impl Budget {
	const fn new(limit: Option<u64>) -> Self {
		Self { limit, used: 0 }
	}

	/// Reads `reader` to the end, failing as soon as the ceiling would be crossed
	fn read<R: Read>(&mut self, mut reader: R) -> Result<Vec<u8>, ArchiveError> {
		let mut data = Vec::new();

		match self.limit {
			None => {
				reader.read_to_end(&mut data).map_err(ArchiveError::Corrupt)?;
			}
			Some(limit) => {
				let left = limit.saturating_sub(self.used);
				reader
					.take(left.saturating_add(1))
					.read_to_end(&mut data)
					.map_err(ArchiveError::Corrupt)?;

				if data.len() as u64 > left {
					return Err(ArchiveError::TooLarge { limit });
				}
			}
		}

		self.used += data.len() as u64;

		Ok(data)
	}
}

/// Drops empty and `.` components, and refuses entries with `..` anywhere
fn sanitize(name: &str) -> Option<String> {
	let mut parts = Vec::new();
	for part in name.split(['/', '\\']) {
		match part {
			"" | "." => {}
			".." => return None,
			part => parts.push(part),
		}
	}

	(!parts.is_empty()).then(|| parts.join("/"))
}
