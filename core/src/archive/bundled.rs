use std::io::Read;

use flate2::read::GzDecoder;
use xz2::read::XzDecoder;

use super::{
	has_suffix, tarball, zipfile, ArchiveCodec, ArchiveEntry, ArchiveError, ArchiveFormat,
	ArchiveWriter, Budget, EntryNames, ExtractOptions,
};

/// Writes gzip'd tarballs. Reads tar, zip, and gzip or xz streams holding either a tarball or
/// a single file. Rar is refused.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCodec;

impl ArchiveCodec for StandardCodec {
	fn extension(&self) -> &'static str {
		".tar.gz"
	}

	fn open_for_write(&self) -> Box<dyn ArchiveWriter> {
		tarball::writer()
	}

	fn extract(
		&self,
		format: ArchiveFormat,
		name: &str,
		data: &[u8],
		options: &ExtractOptions,
	) -> Result<Vec<ArchiveEntry>, ArchiveError> {
		let names = EntryNames::for_label(options.encoding.as_deref())?;
		let mut budget = Budget::new(options.max_size);

		match format {
			ArchiveFormat::Tar => tarball::read(data, names, &mut budget),
			ArchiveFormat::Zip => zipfile::read(data, names, &mut budget),
			ArchiveFormat::Gz => {
				unwrap_stream(GzDecoder::new(data), name, format, names, &mut budget)
			}
			ArchiveFormat::Xz => {
				unwrap_stream(XzDecoder::new(data), name, format, names, &mut budget)
			}
			ArchiveFormat::Rar => Err(ArchiveError::UnsupportedFormat(format)),
		}
	}
}

fn unwrap_stream<R: Read>(
	stream: R,
	name: &str,
	format: ArchiveFormat,
	names: EntryNames,
	budget: &mut Budget,
) -> Result<Vec<ArchiveEntry>, ArchiveError> {
	let inner = budget.read(stream)?;
	let stem = stem(name, format);

	if has_suffix(stem, ".tar") || tarball::looks_like_tar(&inner) {
		// Already counted against the budget as a whole
		return tarball::read(&inner[..], names, &mut Budget::new(None));
	}

	Ok(vec![ArchiveEntry::File {
		path: stem.to_string(),
		data: inner,
	}])
}

/// `name` without the format suffix, or all of it when nothing would be left
fn stem(name: &str, format: ArchiveFormat) -> &str {
	let suffix = format.suffix();
	if has_suffix(name, suffix) && name.len() > suffix.len() {
		&name[..name.len() - suffix.len()]
	} else {
		name
	}
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use flate2::{write::GzEncoder, Compression};
	use pretty_assertions::assert_eq;
	use xz2::write::XzEncoder;

	use super::*;

	fn tarball(entries: &[(&str, &[u8])]) -> Vec<u8> {
		let mut writer = StandardCodec.open_for_write();
		for (name, data) in entries {
			writer.append(name, data).unwrap();
		}
		writer.finish().unwrap()
	}

	fn extract(
		format: ArchiveFormat,
		name: &str,
		data: &[u8],
	) -> Result<Vec<ArchiveEntry>, ArchiveError> {
		StandardCodec.extract(format, name, data, &ExtractOptions::default())
	}

	#[test]
	fn writes_and_reads_back_gzipped_tarballs() {
		let data = tarball(&[("a.txt", &b"alpha"[..]), ("docs/b.txt", &b"beta"[..])]);

		assert_eq!(
			extract(ArchiveFormat::Gz, "bundle.tar.gz", &data).unwrap(),
			vec![
				ArchiveEntry::File {
					path: "a.txt".into(),
					data: b"alpha".to_vec()
				},
				ArchiveEntry::File {
					path: "docs/b.txt".into(),
					data: b"beta".to_vec()
				},
			]
		);

		// Detected by content as well, whatever the name says
		assert_eq!(extract(ArchiveFormat::Gz, "bundle.gz", &data).unwrap().len(), 2);
	}

	#[test]
	fn single_file_streams_extract_to_their_stem() {
		let mut gz = GzEncoder::new(Vec::new(), Compression::default());
		gz.write_all(b"plain notes").unwrap();
		let gz = gz.finish().unwrap();

		let mut xz = XzEncoder::new(Vec::new(), 6);
		xz.write_all(b"server log").unwrap();
		let xz = xz.finish().unwrap();

		assert_eq!(
			extract(ArchiveFormat::Gz, "notes.txt.GZ", &gz).unwrap(),
			vec![ArchiveEntry::File {
				path: "notes.txt".into(),
				data: b"plain notes".to_vec()
			}]
		);
		assert_eq!(
			extract(ArchiveFormat::Xz, "server.log.xz", &xz).unwrap(),
			vec![ArchiveEntry::File {
				path: "server.log".into(),
				data: b"server log".to_vec()
			}]
		);
	}

	#[test]
	fn xz_wrapped_tarballs() {
		let mut builder = tar::Builder::new(Vec::new());
		let mut header = tar::Header::new_gnu();
		header.set_size(4);
		header.set_mode(0o644);
		header.set_cksum();
		builder.append_data(&mut header, "src/lib.rs", &b"mod "[..]).unwrap();

		let mut xz = XzEncoder::new(Vec::new(), 6);
		xz.write_all(&builder.into_inner().unwrap()).unwrap();

		assert_eq!(
			extract(ArchiveFormat::Xz, "src.tar.xz", &xz.finish().unwrap()).unwrap(),
			vec![ArchiveEntry::File {
				path: "src/lib.rs".into(),
				data: b"mod ".to_vec()
			}]
		);
	}

	#[test]
	fn size_ceiling_covers_the_whole_stream() {
		let data = tarball(&[("zeros.bin", &[0_u8; 64 * 1024][..])]);

		let options = ExtractOptions {
			max_size: Some(16 * 1024),
			..Default::default()
		};

		assert!(matches!(
			StandardCodec.extract(ArchiveFormat::Gz, "bomb.tar.gz", &data, &options),
			Err(ArchiveError::TooLarge { limit: 16384 })
		));
	}

	#[test]
	fn rejects_what_it_cannot_read() {
		let data = tarball(&[("a.txt", &b"alpha"[..])]);

		assert!(matches!(
			extract(ArchiveFormat::Rar, "old.rar", &data),
			Err(ArchiveError::UnsupportedFormat(ArchiveFormat::Rar))
		));
		assert!(matches!(
			StandardCodec.extract(
				ArchiveFormat::Gz,
				"a.tar.gz",
				&data,
				&ExtractOptions {
					encoding: Some("not-a-charset".into()),
					..Default::default()
				}
			),
			Err(ArchiveError::UnsupportedEncoding(_))
		));
		assert!(matches!(
			extract(ArchiveFormat::Gz, "broken.gz", b"definitely not gzip"),
			Err(ArchiveError::Corrupt(_))
		));
	}

	#[test]
	fn stem_keeps_names_that_are_only_a_suffix() {
		assert_eq!(stem("photos.tar.gz", ArchiveFormat::Gz), "photos.tar");
		assert_eq!(stem(".gz", ArchiveFormat::Gz), ".gz");
	}
}
