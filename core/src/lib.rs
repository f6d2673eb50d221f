//! Core of the Cumulus storage service.
//!
//! A per-user virtual filesystem of folders and files kept in a [`store::Store`], whose bytes
//! live in pluggable [`backend::StorageBackend`]s. On top of it sit the quota pre-flight of
//! [`quota`], the background archive jobs of [`jobs`] and the request facing [`Explorer`].

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

pub mod archive;
pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod explorer;
pub mod hashid;
pub mod jobs;
pub mod logging;
pub mod model;
pub mod quota;
pub mod signer;
pub mod store;
pub mod vfs;

pub use config::CoreConfig;
pub use context::CoreContext;
pub use error::Error;
pub use explorer::{Explorer, Response};
pub use vfs::FileSystem;
