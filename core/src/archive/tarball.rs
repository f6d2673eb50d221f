use std::io::Read;

use flate2::{write::GzEncoder, Compression};
use tar::{Archive, Builder, EntryType, Header};
use tracing::trace;

use super::{sanitize, ArchiveEntry, ArchiveError, ArchiveWriter, Budget, EntryNames};

/// Offset and value of the magic that POSIX and GNU tar headers carry
const MAGIC_OFFSET: usize = 257;
const MAGIC: &[u8] = b"ustar";

struct TarGzWriter {
	builder: Builder<GzEncoder<Vec<u8>>>,
}

impl ArchiveWriter for TarGzWriter {
	fn append(&mut self, name: &str, data: &[u8]) -> Result<(), ArchiveError> {
		let mut header = Header::new_gnu();
		header.set_size(data.len() as u64);
		header.set_mode(0o644);
		header.set_entry_type(EntryType::Regular);

		self.builder
			.append_data(&mut header, name, data)
			.map_err(ArchiveError::Write)
	}

	fn finish(self: Box<Self>) -> Result<Vec<u8>, ArchiveError> {
		self.builder
			.into_inner()
			.and_then(GzEncoder::finish)
			.map_err(ArchiveError::Write)
	}
}

pub(super) fn writer() -> Box<dyn ArchiveWriter> {
	Box::new(TarGzWriter {
		builder: Builder::new(GzEncoder::new(Vec::new(), Compression::default())),
	})
}

pub(super) fn looks_like_tar(data: &[u8]) -> bool {
	data.get(MAGIC_OFFSET..MAGIC_OFFSET + MAGIC.len()) == Some(MAGIC)
}

pub(super) fn read<R: Read>(
	reader: R,
	names: EntryNames,
	budget: &mut Budget,
) -> Result<Vec<ArchiveEntry>, ArchiveError> {
	let mut archive = Archive::new(reader);
	let mut extracted = Vec::new();

	for entry in archive.entries().map_err(ArchiveError::Corrupt)? {
		let mut entry = entry.map_err(ArchiveError::Corrupt)?;

		let name = names.decode(&entry.path_bytes())?;
		let Some(path) = sanitize(&name) else {
			trace!(%name, "Skipping archive entry with an unusable path");
			continue;
		};

		match entry.header().entry_type() {
			EntryType::Directory => extracted.push(ArchiveEntry::Dir { path }),
			EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse => {
				let data = budget.read(&mut entry)?;
				extracted.push(ArchiveEntry::File { path, data });
			}
			// Links and special files have no counterpart in the virtual filesystem
			_ => trace!(%path, "Skipping non regular archive entry"),
		}
	}

	Ok(extracted)
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	fn plain_tar(entries: &[(&[u8], EntryType, &[u8])]) -> Vec<u8> {
		let mut builder = Builder::new(Vec::new());

		for (raw_name, kind, data) in entries {
			let mut header = Header::new_gnu();
			if let Some(gnu) = header.as_gnu_mut() {
				gnu.name[..raw_name.len()].copy_from_slice(raw_name);
			}
			header.set_entry_type(*kind);
			header.set_size(data.len() as u64);
			header.set_mode(0o644);
			header.set_cksum();
			builder.append(&header, *data).unwrap();
		}

		builder.into_inner().unwrap()
	}

	#[test]
	fn reads_directories_and_skips_links() {
		let data = plain_tar(&[
			(&b"empty/"[..], EntryType::Directory, &b""[..]),
			(&b"./x/y.bin"[..], EntryType::Regular, &b"xyz"[..]),
			(&b"link"[..], EntryType::Symlink, &b""[..]),
			(&b"../escape.txt"[..], EntryType::Regular, &b"no"[..]),
		]);
		assert!(looks_like_tar(&data));

		let entries = read(
			&data[..],
			EntryNames::for_label(None).unwrap(),
			&mut Budget::new(None),
		)
		.unwrap();

		assert_eq!(
			entries,
			vec![
				ArchiveEntry::Dir {
					path: "empty".into()
				},
				ArchiveEntry::File {
					path: "x/y.bin".into(),
					data: b"xyz".to_vec()
				},
			]
		);
	}

	#[test]
	fn decodes_legacy_entry_names() {
		let (name, _, _) = encoding_rs::GBK.encode("资料/说明.txt");
		let data = plain_tar(&[(&name[..], EntryType::Regular, &b"hello"[..])]);

		let entries = read(
			&data[..],
			EntryNames::for_label(Some("gbk")).unwrap(),
			&mut Budget::new(None),
		)
		.unwrap();
		assert_eq!(entries[0].path(), "资料/说明.txt");

		assert!(matches!(
			read(&data[..], EntryNames::for_label(None).unwrap(), &mut Budget::new(None)),
			Err(ArchiveError::InvalidEntryName(_))
		));
	}

	#[test]
	fn stops_reading_past_the_budget() {
		let data = plain_tar(&[
			(&b"a.bin"[..], EntryType::Regular, &[0_u8; 600][..]),
			(&b"b.bin"[..], EntryType::Regular, &[0_u8; 600][..]),
		]);

		assert!(matches!(
			read(
				&data[..],
				EntryNames::for_label(None).unwrap(),
				&mut Budget::new(Some(1000))
			),
			Err(ArchiveError::TooLarge { limit: 1000 })
		));
	}

	#[test]
	fn short_or_foreign_data_is_not_a_tarball() {
		assert!(!looks_like_tar(b"plain text"));
		assert!(!looks_like_tar(&[0; 1024]));
	}
}
