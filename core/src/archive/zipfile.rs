use std::io::Cursor;

use tracing::trace;
use zip::{result::ZipError, ZipArchive};

use super::{sanitize, ArchiveEntry, ArchiveError, Budget, EntryNames};

pub(super) fn read(
	data: &[u8],
	names: EntryNames,
	budget: &mut Budget,
) -> Result<Vec<ArchiveEntry>, ArchiveError> {
	let mut archive = ZipArchive::new(Cursor::new(data)).map_err(corrupt)?;
	let mut extracted = Vec::with_capacity(archive.len());

	for index in 0..archive.len() {
		let file = archive.by_index(index).map_err(corrupt)?;

		// Without an explicit charset the archive's own flag picks UTF-8 or CP437
		let name = if names.is_explicit() {
			names.decode(file.name_raw())?
		} else {
			file.name().to_string()
		};

		let Some(path) = sanitize(&name) else {
			trace!(%name, "Skipping archive entry with an unusable path");
			continue;
		};

		if file.is_dir() {
			extracted.push(ArchiveEntry::Dir { path });
		} else {
			let data = budget.read(file)?;
			extracted.push(ArchiveEntry::File { path, data });
		}
	}

	Ok(extracted)
}

fn corrupt(e: ZipError) -> ArchiveError {
	ArchiveError::Corrupt(std::io::Error::other(e))
}
