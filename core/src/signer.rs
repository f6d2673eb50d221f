//! URL signing capability for one-time archive download links.

use std::{sync::Arc, time::Duration};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::TimeDelta;
use cumulus_cache::Clock;
use thiserror::Error;

const KEY_CONTEXT: &str = "cumulus signed urls 2024-06-01 v1";
const SIGN_PARAM: &str = "?sign=";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignError {
	#[error("signed url is malformed")]
	Malformed,
	#[error("signature does not match")]
	BadSignature,
	#[error("signed url expired")]
	Expired,
}

pub trait UrlSigner: Send + Sync + 'static {
	/// Returns `path` with a signature valid for `ttl` appended
	fn sign(&self, path: &str, ttl: Duration) -> String;

	/// Checks the signature and expiry of a signed url and returns the path it covers
	fn verify(&self, uri: &str) -> Result<String, SignError>;
}

/// Signs `path:expiry` with a keyed blake3 hash
pub struct KeyedSigner {
	key: [u8; 32],
	clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for KeyedSigner {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("KeyedSigner").finish_non_exhaustive()
	}
}

impl KeyedSigner {
	#[must_use]
	pub fn new(secret: &str, clock: Arc<dyn Clock>) -> Self {
		Self {
			key: blake3::derive_key(KEY_CONTEXT, secret.as_bytes()),
			clock,
		}
	}

	fn mac(&self, path: &str, expires: i64) -> blake3::Hash {
		blake3::keyed_hash(&self.key, format!("{path}:{expires}").as_bytes())
	}
}

impl UrlSigner for KeyedSigner {
	fn sign(&self, path: &str, ttl: Duration) -> String {
		let now = self.clock.now();
		let expires = TimeDelta::from_std(ttl)
			.ok()
			.and_then(|ttl| now.checked_add_signed(ttl))
			.map_or(i64::MAX, |at| at.timestamp());

		let mac = URL_SAFE_NO_PAD.encode(self.mac(path, expires).as_bytes());

		format!("{path}{SIGN_PARAM}{mac}:{expires}")
	}

	fn verify(&self, uri: &str) -> Result<String, SignError> {
		let (path, signature) = uri.split_once(SIGN_PARAM).ok_or(SignError::Malformed)?;
		let (mac, expires) = signature.rsplit_once(':').ok_or(SignError::Malformed)?;
		let expires = expires.parse::<i64>().map_err(|_| SignError::Malformed)?;
		let mac = URL_SAFE_NO_PAD
			.decode(mac)
			.ok()
			.and_then(|mac| <[u8; 32]>::try_from(mac).ok())
			.ok_or(SignError::Malformed)?;

		// `Hash` equality is constant time
		if self.mac(path, expires) != blake3::Hash::from(mac) {
			return Err(SignError::BadSignature);
		}

		if self.clock.now().timestamp() >= expires {
			return Err(SignError::Expired);
		}

		Ok(path.to_string())
	}
}
