//! Process-wide key/value cache with per-entry time to live.
//!
//! Values are stored as [`serde_json::Value`] so a single instance can hold heterogeneous data
//! (aggregate folder statistics next to short lived download sessions). The cache is never a
//! source of truth: clearing it at any time only costs recomputation.
//!
//! There is no global instance, build one at startup and share it behind an `Arc`. Time is read
//! through a [`Clock`], so tests can swap in a [`ManualClock`].

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

mod clock;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{Cache, Error};
