use std::collections::HashMap;

use tracing::debug;

use super::{DecompressJob, JobOutput, Progress};
use crate::{
	archive::{ArchiveEntry, ArchiveFormat, ExtractOptions},
	context::CoreContext,
	model::Folder,
	quota::remaining_capacity,
	vfs::FileSystem,
	Error,
};

/// Extracts an archive file into the destination folder, recreating its directory tree.
///
/// Every extracted file goes through `put_file`, so names, policy and quota apply per entry.
/// A failure part way leaves what was already extracted in place.
pub(super) async fn run(
	ctx: &CoreContext,
	fs: &FileSystem<'_>,
	job: &DecompressJob,
	progress: &Progress<'_>,
) -> Result<JobOutput, Error> {
	let file = fs.file_at(&job.src).await?;
	let format = ArchiveFormat::from_name(&file.name).ok_or_else(|| {
		Error::ParamInvalid(format!("'{}' is not a supported archive", file.name))
	})?;
	let dst = fs.folder_at(&job.dst).await?;

	// Extraction stops as soon as the archive expands past what the user can still store
	let options = ExtractOptions {
		encoding: job.encoding.clone(),
		max_size: Some(remaining_capacity(&fs.fresh_user().await?)),
	};

	let data = fs.content(&file).await?;
	let entries = ctx.codec.extract(format, &file.name, &data, &options)?;
	drop(data);

	let total = entries.len() as u64;
	progress.report(0, total).await;

	let mut tree = Tree::new(dst);
	let mut files = 0;

	for (done, entry) in entries.iter().enumerate() {
		match entry {
			ArchiveEntry::Dir { path } => {
				tree.ensure(fs, path).await?;
			}
			ArchiveEntry::File { path, data } => {
				let (parent, name) = path.rsplit_once('/').unwrap_or(("", path.as_str()));
				let folder = tree.ensure(fs, parent).await?;
				fs.put_file(&folder, name, data).await?;
				files += 1;
			}
		}

		progress.report(done as u64 + 1, total).await;
	}

	debug!(
		archive = %file.name,
		files,
		folders = tree.created,
		"Archive extracted"
	);

	Ok(JobOutput::Extracted {
		folders: tree.created,
		files,
	})
}

/// Folders already resolved under the destination, keyed by relative path
struct Tree {
	folders: HashMap<String, Folder>,
	created: usize,
}

impl Tree {
	fn new(root: Folder) -> Self {
		Self {
			folders: HashMap::from([(String::new(), root)]),
			created: 0,
		}
	}

	async fn ensure(&mut self, fs: &FileSystem<'_>, path: &str) -> Result<Folder, Error> {
		let mut current = String::new();

		for part in path.split('/').filter(|part| !part.is_empty()) {
			let child = if current.is_empty() {
				part.to_string()
			} else {
				format!("{current}/{part}")
			};

			if !self.folders.contains_key(&child) {
				let parent = self
					.folders
					.get(&current)
					.cloned()
					.ok_or_else(|| Error::NotFound(format!("folder '{current}' vanished")))?;
				let folder = fs.ensure_folder(&parent, part).await?;
				self.folders.insert(child.clone(), folder);
				self.created += 1;
			}

			current = child;
		}

		self.folders
			.get(&current)
			.cloned()
			.ok_or_else(|| Error::NotFound(format!("folder '{current}' vanished")))
	}
}
