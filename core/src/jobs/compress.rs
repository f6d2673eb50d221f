use tracing::debug;

use super::{CompressJob, JobOutput, Progress};
use crate::{context::CoreContext, vfs::FileSystem, Error};

/// Packs the selection into one archive and stores it in the destination folder.
///
/// Sizes and quota were estimated at submission; `put_file` checks the real archive size
/// against policy and capacity again before it lands.
pub(super) async fn run(
	ctx: &CoreContext,
	fs: &FileSystem<'_>,
	job: &CompressJob,
	progress: &Progress<'_>,
) -> Result<JobOutput, Error> {
	let dst = fs.folder_at(&job.dst).await?;
	let (folders, files) = fs.resolve(&job.selection, None).await?;

	let items = fs.archive_items(&folders, &files).await?;
	let total = items.iter().map(|item| item.file.size).sum();
	progress.report(0, total).await;

	let mut writer = ctx.codec.open_for_write();
	let mut done = 0;

	for item in &items {
		let data = fs.content(&item.file).await?;
		writer.append(&item.path, &data)?;

		done += item.file.size;
		progress.report(done, total).await;
	}

	let archive = writer.finish()?;

	debug!(
		entries = items.len(),
		original_size = total,
		archive_size = archive.len(),
		"Archive built"
	);

	let file = fs.put_file(&dst, &job.name, &archive).await?;

	Ok(JobOutput::ArchiveCreated(file))
}
