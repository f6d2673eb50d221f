use std::sync::Arc;

use cumulus_cache::Cache;

use crate::{
	archive::ArchiveCodec, backend::Backends, config::CoreConfig, signer::UrlSigner, store::Store,
	vfs::LockTable,
};

/// Everything the filesystem, the jobs and the facade share for the life of the process.
///
/// Built once at startup and passed around behind an `Arc`, nothing here is reached through a
/// global.
pub struct CoreContext {
	pub config: CoreConfig,
	pub store: Arc<dyn Store>,
	pub backends: Backends,
	pub codec: Arc<dyn ArchiveCodec>,
	pub signer: Arc<dyn UrlSigner>,
	pub cache: Arc<Cache>,
	pub locks: LockTable,
}

impl std::fmt::Debug for CoreContext {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CoreContext")
			.field("config", &self.config)
			.field("backends", &self.backends)
			.field("cache", &self.cache)
			.finish_non_exhaustive()
	}
}

impl CoreContext {
	#[must_use]
	pub fn new(
		config: CoreConfig,
		store: Arc<dyn Store>,
		backends: Backends,
		codec: Arc<dyn ArchiveCodec>,
		signer: Arc<dyn UrlSigner>,
		cache: Arc<Cache>,
	) -> Arc<Self> {
		Arc::new(Self {
			config,
			store,
			backends,
			codec,
			signer,
			cache,
			locks: LockTable::new(),
		})
	}
}
