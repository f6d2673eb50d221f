//! Integration tests for the synchronous item operations of the explorer: move, copy, rename,
//! delete and properties, driven through the same requests a client sends.

mod helpers;

use std::{sync::Arc, time::Duration};

use cumulus_cache::Clock;
use cumulus_core::{
	backend::MemoryBackend,
	error::codes,
	explorer::{
		ItemDeleteRequest, ItemIds, ItemMoveRequest, ItemPropertyRequest, ItemRenameRequest,
		ObjectProps,
	},
	hashid::ObjectKind,
	model::{CopyMode, NewFile},
	store::Store,
};
use helpers::*;
use pretty_assertions::assert_eq;
use tracing_test::traced_test;

fn move_request(src_dir: &str, src: ItemIds, dst: &str) -> ItemMoveRequest {
	ItemMoveRequest {
		src_dir: src_dir.to_string(),
		src,
		dst: dst.to_string(),
	}
}

// ============================================================================
// MOVE
// ============================================================================

#[tokio::test]
#[traced_test]
async fn move_keeps_backend_objects() -> anyhow::Result<()> {
	let harness = TestHarnessBuilder::new().build();

	let docs = harness.mkdir(&harness.root, "docs").await;
	let archive = harness.mkdir(&harness.root, "archive").await;
	let report = harness.put(&docs, "report.txt", b"quarterly").await;
	let drafts = harness.mkdir(&docs, "drafts").await;

	let res = harness
		.explorer
		.move_items(
			harness.user.id,
			&move_request("/docs", harness.ids(&[&drafts], &[&report]), "/archive"),
		)
		.await;
	assert!(res.is_ok(), "{res:?}");

	let fs = harness.fs().await;
	let moved = fs.file_at("/archive/report.txt").await?;
	assert_eq!(moved.id, report.id);
	assert_eq!(moved.source_name, report.source_name);
	assert_eq!(fs.folder_at("/archive/drafts").await?.id, drafts.id);
	assert!(!fs.is_file_exist("/docs/report.txt").await?);
	assert_eq!(harness.backend.len(), 1);
	assert_eq!(fs.ancestor_ids(drafts.id).await?, vec![drafts.id, archive.id, harness.root.id]);

	Ok(())
}

#[tokio::test]
async fn move_refuses_name_collision_before_moving_anything() -> anyhow::Result<()> {
	let harness = TestHarnessBuilder::new().build();

	let dst = harness.mkdir(&harness.root, "dst").await;
	let free = harness.put(&harness.root, "free.txt", b"1").await;
	let taken = harness.put(&harness.root, "taken.txt", b"2").await;
	harness.put(&dst, "taken.txt", b"3").await;

	let res = harness
		.explorer
		.move_items(
			harness.user.id,
			&move_request("/", harness.ids(&[], &[&free, &taken]), "/dst"),
		)
		.await;
	assert_eq!(res.code, codes::OBJECT_EXIST);

	let fs = harness.fs().await;
	assert_eq!(fs.file_at("/free.txt").await?.id, free.id);
	assert_eq!(fs.file_at("/taken.txt").await?.id, taken.id);

	Ok(())
}

#[tokio::test]
async fn move_into_own_descendant_is_rejected() -> anyhow::Result<()> {
	let harness = TestHarnessBuilder::new().build();

	let outer = harness.mkdir(&harness.root, "outer").await;
	let inner = harness.mkdir(&outer, "inner").await;

	for dst in ["/outer", "/outer/inner"] {
		let res = harness
			.explorer
			.move_items(
				harness.user.id,
				&move_request("/", harness.ids(&[&outer], &[]), dst),
			)
			.await;
		assert_eq!(res.code, codes::PARAM_ERR, "moving into {dst}");
	}

	let fs = harness.fs().await;
	assert_eq!(fs.folder_at("/outer/inner").await?.id, inner.id);

	Ok(())
}

#[tokio::test]
async fn move_of_objects_outside_source_folder_is_not_found() {
	let harness = TestHarnessBuilder::new().build();

	let elsewhere = harness.mkdir(&harness.root, "elsewhere").await;
	harness.mkdir(&harness.root, "dst").await;
	let file = harness.put(&elsewhere, "a.txt", b"a").await;

	let res = harness
		.explorer
		.move_items(
			harness.user.id,
			&move_request("/", harness.ids(&[], &[&file]), "/dst"),
		)
		.await;

	assert_eq!(res.code, codes::NOT_FOUND);
}

// ============================================================================
// COPY
// ============================================================================

#[tokio::test]
async fn copy_by_reference_shares_objects_and_charges_capacity() -> anyhow::Result<()> {
	let harness = TestHarnessBuilder::new().build();

	let photos = harness.mkdir(&harness.root, "photos").await;
	let trips = harness.mkdir(&photos, "trips").await;
	harness.put(&photos, "cat.png", &[7; 10]).await;
	harness.put(&trips, "beach.png", &[8; 20]).await;
	harness.mkdir(&harness.root, "backup").await;

	let res = harness
		.explorer
		.copy(
			harness.user.id,
			&move_request("/", harness.ids(&[&photos], &[]), "/backup"),
		)
		.await;
	assert!(res.is_ok(), "{res:?}");

	let fs = harness.fs().await;
	let original = fs.file_at("/photos/trips/beach.png").await?;
	let copy = fs.file_at("/backup/photos/trips/beach.png").await?;
	assert_ne!(copy.id, original.id);
	assert_eq!(copy.source_name, original.source_name);
	assert_eq!(fs.content(&copy).await?, vec![8; 20]);

	assert_eq!(harness.backend.len(), 2);
	assert_eq!(harness.fresh_user().await.storage_used, 60);

	Ok(())
}

#[tokio::test]
async fn copy_physical_duplicates_objects() -> anyhow::Result<()> {
	let harness = TestHarnessBuilder::new()
		.copy_mode(CopyMode::Physical)
		.build();

	let file = harness.put(&harness.root, "notes.md", b"# notes").await;
	harness.mkdir(&harness.root, "copies").await;

	let res = harness
		.explorer
		.copy(
			harness.user.id,
			&move_request("/", harness.ids(&[], &[&file]), "/copies"),
		)
		.await;
	assert!(res.is_ok(), "{res:?}");

	let copy = harness.fs().await.file_at("/copies/notes.md").await?;
	assert_ne!(copy.source_name, file.source_name);
	assert_eq!(harness.backend.len(), 2);
	assert_eq!(harness.fresh_user().await.storage_used, 14);

	Ok(())
}

#[tokio::test]
async fn copy_accepts_a_single_object_only() {
	let harness = TestHarnessBuilder::new().build();

	let a = harness.put(&harness.root, "a.txt", b"a").await;
	let b = harness.put(&harness.root, "b.txt", b"b").await;
	harness.mkdir(&harness.root, "dst").await;

	let res = harness
		.explorer
		.copy(
			harness.user.id,
			&move_request("/", harness.ids(&[], &[&a, &b]), "/dst"),
		)
		.await;

	assert_eq!(res.code, codes::PARAM_ERR);
	assert_eq!(harness.fresh_user().await.storage_used, 2);
}

#[tokio::test]
async fn copy_beyond_capacity_is_rejected() {
	let harness = TestHarnessBuilder::new().max_storage(100).build();

	let big = harness.put(&harness.root, "big.bin", &[0; 60]).await;
	harness.mkdir(&harness.root, "dst").await;

	let res = harness
		.explorer
		.copy(
			harness.user.id,
			&move_request("/", harness.ids(&[], &[&big]), "/dst"),
		)
		.await;

	assert_eq!(res.code, codes::PARAM_ERR);
	assert_eq!(harness.fresh_user().await.storage_used, 60);
}

// ============================================================================
// RENAME
// ============================================================================

#[tokio::test]
async fn rename_file_and_folder() -> anyhow::Result<()> {
	let harness = TestHarnessBuilder::new().build();

	let folder = harness.mkdir(&harness.root, "old").await;
	let file = harness.put(&folder, "draft.txt", b"x").await;

	let res = harness
		.explorer
		.rename(
			harness.user.id,
			&ItemRenameRequest {
				src: harness.ids(&[], &[&file]),
				new_name: "final.txt".to_string(),
			},
		)
		.await;
	assert!(res.is_ok(), "{res:?}");

	let res = harness
		.explorer
		.rename(
			harness.user.id,
			&ItemRenameRequest {
				src: harness.ids(&[&folder], &[]),
				new_name: "new".to_string(),
			},
		)
		.await;
	assert!(res.is_ok(), "{res:?}");

	assert_eq!(harness.fs().await.file_at("/new/final.txt").await?.id, file.id);

	Ok(())
}

#[tokio::test]
async fn rename_rejections() {
	let harness = TestHarnessBuilder::new().allowed_extensions(&["txt"]).build();

	let a = harness.put(&harness.root, "a.txt", b"a").await;
	let b = harness.put(&harness.root, "b.txt", b"b").await;

	let cases = [
		(harness.ids(&[], &[&a, &b]), "c.txt", codes::PARAM_ERR),
		(harness.ids(&[], &[&a]), "b.txt", codes::OBJECT_EXIST),
		(harness.ids(&[], &[&a]), "a/b.txt", codes::PARAM_ERR),
		(harness.ids(&[], &[&a]), "a.exe", codes::PARAM_ERR),
		(harness.ids(&[&harness.root], &[]), "home", codes::PARAM_ERR),
	];

	for (src, new_name, code) in cases {
		let res = harness
			.explorer
			.rename(
				harness.user.id,
				&ItemRenameRequest {
					src,
					new_name: new_name.to_string(),
				},
			)
			.await;
		assert_eq!(res.code, code, "renaming to {new_name}");
	}
}

// ============================================================================
// DELETE
// ============================================================================

#[tokio::test]
#[traced_test]
async fn delete_releases_shared_objects_with_the_last_reference() -> anyhow::Result<()> {
	let harness = TestHarnessBuilder::new().build();

	let original = harness.put(&harness.root, "a.txt", &[1; 10]).await;
	harness.mkdir(&harness.root, "dst").await;

	let res = harness
		.explorer
		.copy(
			harness.user.id,
			&move_request("/", harness.ids(&[], &[&original]), "/dst"),
		)
		.await;
	assert!(res.is_ok(), "{res:?}");
	assert_eq!(harness.fresh_user().await.storage_used, 20);

	let copy = harness.fs().await.file_at("/dst/a.txt").await?;

	let res = harness
		.explorer
		.delete(
			harness.user.id,
			&ItemDeleteRequest {
				items: harness.ids(&[], &[&original]),
				force: false,
			},
		)
		.await;
	assert!(res.is_ok(), "{res:?}");
	assert_eq!(harness.backend.len(), 1);
	assert_eq!(harness.fresh_user().await.storage_used, 10);

	let res = harness
		.explorer
		.delete(
			harness.user.id,
			&ItemDeleteRequest {
				items: harness.ids(&[], &[&copy]),
				force: false,
			},
		)
		.await;
	assert!(res.is_ok(), "{res:?}");
	assert!(harness.backend.is_empty());
	assert_eq!(harness.fresh_user().await.storage_used, 0);

	Ok(())
}

#[tokio::test]
async fn delete_folder_removes_whole_tree() -> anyhow::Result<()> {
	let harness = TestHarnessBuilder::new().build();

	let top = harness.mkdir(&harness.root, "top").await;
	let mid = harness.mkdir(&top, "mid").await;
	harness.put(&top, "1.txt", b"1").await;
	harness.put(&mid, "2.txt", b"22").await;

	let res = harness
		.explorer
		.delete(
			harness.user.id,
			&ItemDeleteRequest {
				items: harness.ids(&[&top], &[]),
				force: false,
			},
		)
		.await;
	assert!(res.is_ok(), "{res:?}");

	let fs = harness.fs().await;
	assert!(!fs.is_path_exist("/top").await?);
	assert!(harness.backend.is_empty());
	assert_eq!(harness.fresh_user().await.storage_used, 0);

	Ok(())
}

#[tokio::test]
async fn delete_of_root_is_rejected() {
	let harness = TestHarnessBuilder::new().build();

	let res = harness
		.explorer
		.delete(
			harness.user.id,
			&ItemDeleteRequest {
				items: harness.ids(&[&harness.root], &[]),
				force: true,
			},
		)
		.await;

	assert_eq!(res.code, codes::PARAM_ERR);
}

#[tokio::test]
#[traced_test]
async fn delete_keeps_records_the_backend_refused() -> anyhow::Result<()> {
	let memory = Arc::new(MemoryBackend::new());
	let flaky = Arc::new(FlakyBackend::new(Arc::clone(&memory)));
	let harness = TestHarnessBuilder::new()
		.backends(memory, flaky.clone())
		.build();

	let folder = harness.mkdir(&harness.root, "stuck").await;
	let stuck = harness.put(&folder, "stuck.txt", &[1; 5]).await;
	let gone = harness.put(&harness.root, "gone.txt", &[2; 7]).await;
	flaky.fail_delete_of(&stuck.source_name);

	let res = harness
		.explorer
		.delete(
			harness.user.id,
			&ItemDeleteRequest {
				items: harness.ids(&[&folder], &[&gone]),
				force: false,
			},
		)
		.await;
	assert_eq!(res.code, codes::IO_FAILED);
	assert!(res.msg.contains("stuck.txt"), "{}", res.msg);

	let fs = harness.fs().await;
	assert_eq!(fs.file_at("/stuck/stuck.txt").await?.id, stuck.id);
	assert!(!fs.is_file_exist("/gone.txt").await?);
	assert_eq!(harness.fresh_user().await.storage_used, 5);

	Ok(())
}

#[tokio::test]
async fn forced_delete_drops_records_the_backend_refused() -> anyhow::Result<()> {
	let memory = Arc::new(MemoryBackend::new());
	let flaky = Arc::new(FlakyBackend::new(Arc::clone(&memory)));
	let harness = TestHarnessBuilder::new()
		.backends(memory, flaky.clone())
		.build();

	let stuck = harness.put(&harness.root, "stuck.txt", &[1; 5]).await;
	flaky.fail_all_deletes();

	let res = harness
		.explorer
		.delete(
			harness.user.id,
			&ItemDeleteRequest {
				items: harness.ids(&[], &[&stuck]),
				force: true,
			},
		)
		.await;
	assert!(res.is_ok(), "{res:?}");

	assert!(!harness.fs().await.is_file_exist("/stuck.txt").await?);
	// The bytes stay behind, only the records and the accounting go
	assert_eq!(harness.backend.len(), 1);
	assert_eq!(harness.fresh_user().await.storage_used, 0);

	Ok(())
}

// ============================================================================
// PROPERTIES
// ============================================================================

#[tokio::test]
async fn folder_properties_are_cached() -> anyhow::Result<()> {
	let harness = TestHarnessBuilder::new().build();

	let docs = harness.mkdir(&harness.root, "docs").await;
	let sub = harness.mkdir(&docs, "sub").await;
	harness.put(&docs, "a.txt", &[0; 10]).await;
	harness.put(&docs, "b.txt", &[0; 20]).await;
	harness.put(&sub, "c.txt", &[0; 30]).await;

	let request = ItemPropertyRequest {
		id: harness.explorer.hashids().encode(ObjectKind::Folder, docs.id),
		is_folder: true,
		trace_root: true,
	};

	let first_query = harness.clock.now();
	let props = harness
		.explorer
		.property(harness.user.id, &request)
		.await
		.data_as::<ObjectProps>()
		.expect("folder properties");

	assert_eq!(props.child_folder_num, 1);
	assert_eq!(props.child_file_num, 3);
	assert_eq!(props.size, 60);
	assert_eq!(props.path, "/");
	assert_eq!(props.query_date, first_query);

	// A record written behind the filesystem's back is not seen while the cache holds
	harness
		.store
		.create_file(NewFile {
			name: "d.txt".to_string(),
			source_name: "elsewhere".to_string(),
			size: 40,
			folder_id: sub.id,
			owner_id: harness.user.id,
			policy_id: harness.policy.id,
		})
		.await?;
	harness.clock.advance(Duration::from_secs(10));

	let cached = harness
		.explorer
		.property(harness.user.id, &request)
		.await
		.data_as::<ObjectProps>()
		.expect("folder properties");
	assert_eq!(cached, props);

	harness.clock.advance(Duration::from_secs(300));

	let refreshed = harness
		.explorer
		.property(harness.user.id, &request)
		.await
		.data_as::<ObjectProps>()
		.expect("folder properties");
	assert_eq!(refreshed.child_file_num, 4);
	assert_eq!(refreshed.size, 100);
	assert_eq!(refreshed.query_date, harness.clock.now());

	Ok(())
}

#[tokio::test]
async fn writes_through_the_filesystem_evict_ancestor_properties() {
	let harness = TestHarnessBuilder::new().build();

	let docs = harness.mkdir(&harness.root, "docs").await;
	let sub = harness.mkdir(&docs, "sub").await;

	let request = ItemPropertyRequest {
		id: harness.explorer.hashids().encode(ObjectKind::Folder, docs.id),
		is_folder: true,
		trace_root: false,
	};

	let before = harness
		.explorer
		.property(harness.user.id, &request)
		.await
		.data_as::<ObjectProps>()
		.expect("folder properties");
	assert_eq!(before.child_file_num, 0);
	assert_eq!(before.path, "");

	harness.put(&sub, "deep.txt", &[1; 3]).await;

	let after = harness
		.explorer
		.property(harness.user.id, &request)
		.await
		.data_as::<ObjectProps>()
		.expect("folder properties");
	assert_eq!(after.child_file_num, 1);
	assert_eq!(after.size, 3);
}

#[tokio::test]
async fn file_properties_trace_their_folder() {
	let harness = TestHarnessBuilder::new().build();

	let docs = harness.mkdir(&harness.root, "docs").await;
	let sub = harness.mkdir(&docs, "sub").await;
	let file = harness.put(&sub, "c.txt", &[0; 30]).await;

	let props = harness
		.explorer
		.property(
			harness.user.id,
			&ItemPropertyRequest {
				id: harness.explorer.hashids().encode(ObjectKind::File, file.id),
				is_folder: false,
				trace_root: true,
			},
		)
		.await
		.data_as::<ObjectProps>()
		.expect("file properties");

	assert_eq!(props.policy, "Default policy");
	assert_eq!(props.size, 30);
	assert_eq!(props.path, "/docs/sub");
}

#[tokio::test]
async fn properties_of_bad_or_foreign_ids_are_not_found() {
	let harness = TestHarnessBuilder::new().build();
	let (intruder, _) = harness.other_user();

	let file = harness.put(&harness.root, "mine.txt", b"x").await;
	let hashids = harness.explorer.hashids();

	let cases = [
		(intruder.id, hashids.encode(ObjectKind::File, file.id), false),
		(harness.user.id, "not-an-id".to_string(), false),
		// A file id presented as a folder
		(harness.user.id, hashids.encode(ObjectKind::File, file.id), true),
	];

	for (user_id, id, is_folder) in cases {
		let res = harness
			.explorer
			.property(
				user_id,
				&ItemPropertyRequest {
					id,
					is_folder,
					trace_root: false,
				},
			)
			.await;
		assert_eq!(res.code, codes::NOT_FOUND);
	}
}

#[tokio::test]
async fn folder_walk_terminates_on_a_cycle() -> anyhow::Result<()> {
	let harness = TestHarnessBuilder::new().build();

	let a = harness.mkdir(&harness.root, "a").await;
	let b = harness.mkdir(&a, "b").await;
	harness.put(&b, "x.txt", &[0; 4]).await;

	// Corrupt the tree directly in the store: a -> b -> a
	harness.store.move_folder(a.id, b.id).await?;

	let stats = harness.fs().await.folder_stats(&a).await?;
	assert_eq!(stats.child_folder_num, 1);
	assert_eq!(stats.child_file_num, 1);
	assert_eq!(stats.size, 4);

	Ok(())
}
