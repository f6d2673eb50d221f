//! Opaque object identifiers.
//!
//! An identifier is `base64url(mac ‖ (id ^ mask))`, where `mac` is a keyed hash over the object
//! kind and the raw id and `mask` is derived from the kind and `mac`. Decoding recomputes the mac
//! for the expected kind, so a tampered string or a folder id presented as a file both fail.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::Error;

const KEY_CONTEXT: &str = "cumulus object identifiers 2024-06-01 v1";

const MAC_LEN: usize = 4;
const ENCODED_LEN: usize = MAC_LEN + size_of::<u64>();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
	File,
	Folder,
}

impl ObjectKind {
	const fn tag(self) -> u8 {
		match self {
			Self::File => 1,
			Self::Folder => 2,
		}
	}
}

impl fmt::Display for ObjectKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::File => write!(f, "file"),
			Self::Folder => write!(f, "folder"),
		}
	}
}

#[derive(Clone)]
pub struct HashIdCodec {
	key: [u8; 32],
}

impl fmt::Debug for HashIdCodec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("HashIdCodec").finish_non_exhaustive()
	}
}

impl HashIdCodec {
	#[must_use]
	pub fn new(secret: &str) -> Self {
		Self {
			key: blake3::derive_key(KEY_CONTEXT, secret.as_bytes()),
		}
	}

	fn mac(&self, kind: ObjectKind, id: u64) -> [u8; MAC_LEN] {
		let mut input = [0; 1 + 8];
		input[0] = kind.tag();
		input[1..].copy_from_slice(&id.to_be_bytes());

		let mut mac = [0; MAC_LEN];
		mac.copy_from_slice(&blake3::keyed_hash(&self.key, &input).as_bytes()[..MAC_LEN]);
		mac
	}

	fn mask(&self, kind: ObjectKind, mac: &[u8; MAC_LEN]) -> u64 {
		let mut input = [0; 2 + MAC_LEN];
		input[0] = 0xff;
		input[1] = kind.tag();
		input[2..].copy_from_slice(mac);

		let mut mask = [0; 8];
		mask.copy_from_slice(&blake3::keyed_hash(&self.key, &input).as_bytes()[..8]);
		u64::from_be_bytes(mask)
	}

	#[must_use]
	pub fn encode(&self, kind: ObjectKind, id: u64) -> String {
		let mac = self.mac(kind, id);

		let mut raw = [0; ENCODED_LEN];
		raw[..MAC_LEN].copy_from_slice(&mac);
		raw[MAC_LEN..].copy_from_slice(&(id ^ self.mask(kind, &mac)).to_be_bytes());

		URL_SAFE_NO_PAD.encode(raw)
	}

	/// Every failure is reported as [`Error::NotFound`], whatever the reason.
	pub fn decode(&self, encoded: &str, expected: ObjectKind) -> Result<u64, Error> {
		let not_found = || Error::NotFound(format!("{expected} <id='{encoded}'> not found"));

		let raw = URL_SAFE_NO_PAD
			.decode(encoded)
			.ok()
			.filter(|raw| raw.len() == ENCODED_LEN)
			.ok_or_else(not_found)?;

		let mut mac = [0; MAC_LEN];
		mac.copy_from_slice(&raw[..MAC_LEN]);
		let mut masked = [0; 8];
		masked.copy_from_slice(&raw[MAC_LEN..]);

		let id = u64::from_be_bytes(masked) ^ self.mask(expected, &mac);

		if constant_time_eq(&self.mac(expected, id), &mac) {
			Ok(id)
		} else {
			Err(not_found())
		}
	}
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
	a.len() == b.len() && a.iter().zip(b).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_across_the_id_range() {
		let codec = HashIdCodec::new("secret");

		for id in [0, 1, 2, 42, 1 << 31, u64::from(u32::MAX) + 1, u64::MAX - 1, u64::MAX] {
			for kind in [ObjectKind::File, ObjectKind::Folder] {
				let encoded = codec.encode(kind, id);
				assert_eq!(encoded.len(), 16);
				assert_eq!(codec.decode(&encoded, kind).unwrap(), id);
			}
		}
	}

	#[test]
	fn encoding_is_deterministic_and_kind_tagged() {
		let codec = HashIdCodec::new("secret");

		assert_eq!(codec.encode(ObjectKind::File, 7), codec.encode(ObjectKind::File, 7));
		assert_ne!(codec.encode(ObjectKind::File, 7), codec.encode(ObjectKind::Folder, 7));
		assert_ne!(codec.encode(ObjectKind::File, 7), codec.encode(ObjectKind::File, 8));
	}

	#[test]
	fn wrong_kind_is_not_found() {
		let codec = HashIdCodec::new("secret");
		let folder = codec.encode(ObjectKind::Folder, 99);

		assert!(matches!(
			codec.decode(&folder, ObjectKind::File),
			Err(Error::NotFound(_))
		));
	}

	#[test]
	fn tampered_or_foreign_strings_are_not_found() {
		let codec = HashIdCodec::new("secret");
		let encoded = codec.encode(ObjectKind::File, 1234);

		let mut tampered = encoded.clone().into_bytes();
		tampered[10] = if tampered[10] == b'A' { b'B' } else { b'A' };
		let tampered = String::from_utf8(tampered).unwrap();

		let other_secret = HashIdCodec::new("another secret");

		for bad in [
			"",
			"x",
			"not base64 at all!",
			"AAAAAAAAAAAAAAAAAAAAAAAA",
			&encoded[..15],
			&tampered,
		] {
			assert!(
				matches!(codec.decode(bad, ObjectKind::File), Err(Error::NotFound(_))),
				"{bad} decoded"
			);
		}

		assert!(matches!(
			other_secret.decode(&encoded, ObjectKind::File),
			Err(Error::NotFound(_))
		));
	}
}
