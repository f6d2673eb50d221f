use serde::{Deserialize, Serialize};

use crate::{
	hashid::{HashIdCodec, ObjectKind},
	vfs::ItemSelection,
	Error,
};

/// Opaque ids of the folders and files a request acts on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemIds {
	#[serde(default)]
	pub dirs: Vec<String>,
	#[serde(default)]
	pub items: Vec<String>,
}

impl ItemIds {
	/// Fails closed: a single bad id rejects the whole selection
	pub fn decode(&self, codec: &HashIdCodec) -> Result<ItemSelection, Error> {
		Ok(ItemSelection {
			dirs: self
				.dirs
				.iter()
				.map(|id| codec.decode(id, ObjectKind::Folder))
				.collect::<Result<_, _>>()?,
			items: self
				.items
				.iter()
				.map(|id| codec.decode(id, ObjectKind::File))
				.collect::<Result<_, _>>()?,
		})
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.dirs.len() + self.items.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.dirs.is_empty() && self.items.is_empty()
	}
}

/// Move and copy share their shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemMoveRequest {
	pub src_dir: String,
	pub src: ItemIds,
	pub dst: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRenameRequest {
	pub src: ItemIds,
	pub new_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDeleteRequest {
	#[serde(flatten)]
	pub items: ItemIds,
	#[serde(default)]
	pub force: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemCompressRequest {
	pub src: ItemIds,
	pub dst: String,
	pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDecompressRequest {
	/// Path of the archive file
	pub src: String,
	pub dst: String,
	#[serde(default)]
	pub encoding: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemPropertyRequest {
	pub id: String,
	#[serde(default)]
	pub is_folder: bool,
	#[serde(default)]
	pub trace_root: bool,
}
