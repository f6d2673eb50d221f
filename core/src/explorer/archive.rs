use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

use crate::{model::UserId, vfs::ItemSelection};

const SESSION_ID_LEN: usize = 16;

/// Short lived handoff between the request that asks for an archive and the download of it.
///
/// Lives in the cache only, and is taken out of it by the first download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSession {
	pub id: String,
	pub owner_id: UserId,
	pub selection: ItemSelection,
	pub expires_at: DateTime<Utc>,
}

impl ArchiveSession {
	#[must_use]
	pub fn new(owner_id: UserId, selection: ItemSelection, expires_at: DateTime<Utc>) -> Self {
		Self {
			id: rand::thread_rng()
				.sample_iter(&Alphanumeric)
				.take(SESSION_ID_LEN)
				.map(char::from)
				.collect(),
			owner_id,
			selection,
			expires_at,
		}
	}

	#[must_use]
	pub fn cache_key(id: &str) -> String {
		format!("archive_{id}")
	}

	/// Download path covered by the signed url, `{route}/{id}/archive{ext}`
	#[must_use]
	pub fn download_path(&self, route: &str, extension: &str) -> String {
		format!("{}/{}/archive{extension}", route.trim_end_matches('/'), self.id)
	}

	/// Extracts the session id back out of a download path
	#[must_use]
	pub fn id_from_path<'p>(path: &'p str, route: &str, extension: &str) -> Option<&'p str> {
		path.strip_prefix(route.trim_end_matches('/'))?
			.strip_prefix('/')?
			.strip_suffix(&format!("/archive{extension}"))
			.filter(|id| id.len() == SESSION_ID_LEN && id.chars().all(|c| c.is_ascii_alphanumeric()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn session_ids_are_random_alphanumerics() {
		let a = ArchiveSession::new(1, ItemSelection::default(), Utc::now());
		let b = ArchiveSession::new(1, ItemSelection::default(), Utc::now());

		assert_eq!(a.id.len(), SESSION_ID_LEN);
		assert!(a.id.chars().all(|c| c.is_ascii_alphanumeric()));
		assert_ne!(a.id, b.id);
	}

	#[test]
	fn download_path_round_trips_the_id() {
		let session = ArchiveSession::new(1, ItemSelection::default(), Utc::now());
		let path = session.download_path("/api/v3/file/archive/", ".tar.gz");

		assert_eq!(
			path,
			format!("/api/v3/file/archive/{}/archive.tar.gz", session.id)
		);
		assert_eq!(
			ArchiveSession::id_from_path(&path, "/api/v3/file/archive", ".tar.gz"),
			Some(session.id.as_str())
		);
		assert_eq!(
			ArchiveSession::id_from_path("/api/v3/file/archive/../x/archive.tar.gz", "/api/v3/file/archive", ".tar.gz"),
			None
		);
	}
}
