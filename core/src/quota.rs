//! Capability and quota policy over a user's group record.
//!
//! Every facade method runs [`preflight`] with its list of [`Requirement`]s before doing any
//! work, and gets back a single [`Decision`]. Nothing here performs I/O: the user record passed
//! in is read from the store at check time.

use crate::{model::User, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
	/// Create a compress job that writes an archive into the user's storage
	ArchiveTask,
	/// Stream a selection as an archive without storing it
	ArchiveDownload,
	/// Create a decompress job
	Decompress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeLimit {
	Compress,
	Decompress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
	Capability(Capability),
	/// The operation touches this many bytes, measured against the group ceiling
	SizeWithin(SizeLimit, u64),
	/// The operation will add this many bytes to the user's storage
	Headroom(u64),
	/// The operation only accepts one object and the selection holds this many
	SingleObject(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
	CapabilityOff(Capability),
	SizeExceeded { limit: SizeLimit, size: u64, ceiling: u64 },
	InsufficientCapacity { needed: u64, remaining: u64 },
	MultipleObjects(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
	Allow,
	Deny(Denial),
}

impl Decision {
	pub fn into_result(self) -> Result<(), Error> {
		match self {
			Self::Allow => Ok(()),
			Self::Deny(denial) => Err(denial.into()),
		}
	}
}

impl From<Denial> for Error {
	fn from(denial: Denial) -> Self {
		match denial {
			Denial::CapabilityOff(capability) => Self::PermissionDenied(format!(
				"your group is not allowed to use {capability:?}"
			)),
			Denial::SizeExceeded {
				limit,
				size,
				ceiling,
			} => Self::ResourceExceeded(format!(
				"{limit:?} size {size} exceeds the group limit of {ceiling} bytes"
			)),
			Denial::InsufficientCapacity { needed, remaining } => Self::ResourceExceeded(format!(
				"insufficient capacity: {needed} bytes needed, {remaining} remaining"
			)),
			Denial::MultipleObjects(n) => {
				Self::ParamInvalid(format!("only one object can be processed at a time, got {n}"))
			}
		}
	}
}

#[must_use]
pub const fn allowed(user: &User, capability: Capability) -> bool {
	let options = &user.group.options;
	match capability {
		Capability::ArchiveDownload => options.archive_download,
		// Decompression rides on the same group switch as archive creation
		Capability::ArchiveTask | Capability::Decompress => options.archive_task,
	}
}

#[must_use]
pub const fn remaining_capacity(user: &User) -> u64 {
	user.group.max_storage.saturating_sub(user.storage_used)
}

pub fn check_size_limit(user: &User, limit: SizeLimit, size: u64) -> Result<(), Error> {
	match size_denial(user, limit, size) {
		None => Ok(()),
		Some(denial) => Err(denial.into()),
	}
}

const fn size_denial(user: &User, limit: SizeLimit, size: u64) -> Option<Denial> {
	let ceiling = match limit {
		SizeLimit::Compress => user.group.options.compress_size,
		SizeLimit::Decompress => user.group.options.decompress_size,
	};

	if ceiling != 0 && size > ceiling {
		Some(Denial::SizeExceeded {
			limit,
			size,
			ceiling,
		})
	} else {
		None
	}
}

/// Estimated archive size of `total` bytes, rounded half away from zero
#[must_use]
#[allow(
	clippy::cast_precision_loss,
	clippy::cast_possible_truncation,
	clippy::cast_sign_loss
)]
pub fn estimate_compressed(total: u64, ratio: f64) -> u64 {
	// `as` saturates on overflow and maps NaN to 0
	(total as f64 * ratio).round() as u64
}

/// Evaluates `requirements` in order and stops at the first one that is not met
#[must_use]
pub fn preflight(user: &User, requirements: &[Requirement]) -> Decision {
	for requirement in requirements {
		let denial = match *requirement {
			Requirement::Capability(capability) => {
				(!allowed(user, capability)).then_some(Denial::CapabilityOff(capability))
			}
			Requirement::SizeWithin(limit, size) => size_denial(user, limit, size),
			Requirement::Headroom(needed) => {
				let remaining = remaining_capacity(user);
				(needed > remaining).then_some(Denial::InsufficientCapacity { needed, remaining })
			}
			Requirement::SingleObject(n) => (n > 1).then_some(Denial::MultipleObjects(n)),
		};

		if let Some(denial) = denial {
			return Decision::Deny(denial);
		}
	}

	Decision::Allow
}
