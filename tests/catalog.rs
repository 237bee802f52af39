mod common;

use spherecast::camera::Projection;
use spherecast::catalog::id;
use spherecast::catalog::{Catalog, CatalogEntry, EntryKind};

use common::{video_file, Gateway, MockCamera};

fn leaf(entry_id: &str, parent: &str) -> CatalogEntry {
    CatalogEntry {
        id: entry_id.to_string(),
        kind: EntryKind::Video,
        title: "clip".to_string(),
        local_path: std::path::PathBuf::from("/tmp/clip.mp4"),
        source_uri: String::new(),
        mime: "video/mp4",
        width: 1920,
        height: 960,
        size: 1000,
        parent: parent.to_string(),
        children: Vec::new(),
    }
}

// ── Entry map semantics ───────────────────────────────────────────────────────

#[test]
fn new_catalog_contains_root() {
    let catalog = Catalog::new();
    let root = catalog.root();
    assert_eq!(root.id, id::ROOT_ID);
    assert_eq!(root.parent, "-1");
    assert_eq!(root.kind, EntryKind::Container);
}

#[test]
fn get_of_unknown_id_is_none() {
    let catalog = Catalog::new();
    assert!(catalog.get("/no/such/id").is_none());
}

#[test]
fn put_is_insert_if_absent() {
    let catalog = Catalog::new();
    catalog.put(leaf("/100TESTA/R0010001", id::VIDEO_ID));

    let mut replacement = leaf("/100TESTA/R0010001", id::VIDEO_ID);
    replacement.title = "other".to_string();
    catalog.put(replacement);

    // The first insert wins; re-population is a no-op.
    assert_eq!(catalog.get("/100TESTA/R0010001").unwrap().title, "clip");
}

#[test]
fn remove_deletes_single_entry() {
    let catalog = Catalog::new();
    catalog.put(leaf("/100TESTA/R0010001", id::VIDEO_ID));
    catalog.remove("/100TESTA/R0010001");
    assert!(catalog.get("/100TESTA/R0010001").is_none());
}

// ── Container tree invariants ─────────────────────────────────────────────────

#[test]
fn child_count_tracks_children_after_adds_and_removes() {
    let catalog = Catalog::new();
    catalog.add_child(id::ROOT_ID, CatalogEntry::container("1", id::ROOT_ID, "Video"));
    catalog.add_child("1", leaf("/100TESTA/R0010001", "1"));
    catalog.add_child("1", leaf("/100TESTA/R0010002", "1"));
    catalog.add_child("1", leaf("/100TESTA/R0010003", "1"));

    let container = catalog.get("1").unwrap();
    assert_eq!(container.child_count(), 3);
    assert_eq!(container.child_count(), container.children.len());

    catalog.remove_child("1", "/100TESTA/R0010002");
    let container = catalog.get("1").unwrap();
    assert_eq!(container.child_count(), 2);
    assert_eq!(container.child_count(), container.children.len());
    assert!(!container.children.iter().any(|c| c == "/100TESTA/R0010002"));
}

#[test]
fn add_child_is_idempotent() {
    let catalog = Catalog::new();
    catalog.add_child(id::ROOT_ID, CatalogEntry::container("1", id::ROOT_ID, "Video"));
    catalog.add_child("1", leaf("/100TESTA/R0010001", "1"));
    catalog.add_child("1", leaf("/100TESTA/R0010001", "1"));
    assert_eq!(catalog.get("1").unwrap().child_count(), 1);
}

#[test]
fn add_child_without_parent_fails() {
    let catalog = Catalog::new();
    assert!(!catalog.add_child("missing", leaf("/100TESTA/R0010001", "missing")));
    assert!(catalog.get("/100TESTA/R0010001").is_none());
}

#[test]
fn take_children_empties_the_list_and_returns_ids() {
    let catalog = Catalog::new();
    catalog.add_child(id::ROOT_ID, CatalogEntry::container("1", id::ROOT_ID, "Video"));
    catalog.add_child("1", leaf("/100TESTA/R0010001", "1"));
    catalog.add_child("1", leaf("/100TESTA/R0010002", "1"));

    let taken = catalog.take_children("1");
    assert_eq!(taken.len(), 2);
    assert_eq!(catalog.get("1").unwrap().child_count(), 0);
}

#[test]
fn children_of_skips_removed_entries() {
    let catalog = Catalog::new();
    catalog.add_child(id::ROOT_ID, CatalogEntry::container("1", id::ROOT_ID, "Video"));
    catalog.add_child("1", leaf("/100TESTA/R0010001", "1"));
    catalog.add_child("1", leaf("/100TESTA/R0010002", "1"));
    catalog.remove("/100TESTA/R0010001");

    let children = catalog.children_of("1");
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, "/100TESTA/R0010002");
}

#[test]
fn set_size_updates_advertised_length() {
    let catalog = Catalog::new();
    catalog.put(leaf("/100TESTA/R0010001", id::VIDEO_ID));
    catalog.set_size("/100TESTA/R0010001", 4242);
    assert_eq!(catalog.get("/100TESTA/R0010001").unwrap().size, 4242);
}

// ── Population ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn populate_builds_the_container_hierarchy() {
    let listing = vec![
        video_file("100TESTA", "R0010001", 3840, Projection::DualFisheye),
        common::image_file("100TESTA", "R0010002"),
    ];
    let gw = Gateway::start(MockCamera::new(), listing, true);

    for container in [
        id::ROOT_ID,
        id::VIDEO_ID,
        id::IMAGE_ID,
        id::CORRECTION_ID,
        id::ORIGINAL_VIDEO_ID,
        id::CORRECTED_VIDEO_ID,
    ] {
        let entry = gw.catalog.get(container).unwrap();
        assert_eq!(entry.kind, EntryKind::Container, "{container}");
    }
    assert_eq!(gw.catalog.root().child_count(), 3);
}

#[tokio::test]
async fn dual_fisheye_videos_are_listed_only_under_correction_originals() {
    let listing = vec![video_file("100TESTA", "R0010001", 3840, Projection::DualFisheye)];
    let gw = Gateway::start(MockCamera::new(), listing, true);

    assert_eq!(gw.catalog.get(id::VIDEO_ID).unwrap().child_count(), 0);
    let originals = gw.catalog.children_of(id::ORIGINAL_VIDEO_ID);
    assert_eq!(originals.len(), 1);
    assert_eq!(originals[0].id, "/ORIGINAL/100TESTA/R0010001");
    // The placeholder advertises the "processing" clip's length.
    assert_eq!(originals[0].size, gw.placeholders.processing_len);
}

#[tokio::test]
async fn equirectangular_videos_appear_in_both_video_and_originals() {
    let listing = vec![video_file("100TESTA", "R0010001", 1920, Projection::Equirectangular)];
    let gw = Gateway::start(MockCamera::new(), listing, true);

    assert_eq!(gw.catalog.get(id::VIDEO_ID).unwrap().child_count(), 1);
    assert_eq!(gw.catalog.get(id::ORIGINAL_VIDEO_ID).unwrap().child_count(), 1);
}

#[tokio::test]
async fn non_jpeg_stills_are_skipped() {
    let mut raw = common::image_file("100TESTA", "R0010003");
    raw.name = "R0010003.DNG".to_string();
    let gw = Gateway::start(MockCamera::new(), vec![raw], false);
    assert_eq!(gw.catalog.get(id::IMAGE_ID).unwrap().child_count(), 0);
}

#[tokio::test]
async fn correction_off_creates_no_correction_subtree() {
    let listing = vec![video_file("100TESTA", "R0010001", 3840, Projection::DualFisheye)];
    let gw = Gateway::start(MockCamera::new(), listing, false);

    assert!(gw.catalog.get(id::CORRECTION_ID).is_none());
    assert_eq!(gw.catalog.root().child_count(), 2);
}

#[tokio::test]
async fn populate_is_idempotent() {
    let listing = vec![video_file("100TESTA", "R0010001", 3840, Projection::DualFisheye)];
    let gw = Gateway::start(MockCamera::new(), listing.clone(), true);
    let before = gw.catalog.len();

    gw.manager.populate(listing, true);
    assert_eq!(gw.catalog.len(), before);
    assert_eq!(gw.catalog.get(id::ORIGINAL_VIDEO_ID).unwrap().child_count(), 1);
}

#[tokio::test]
async fn existing_corrected_output_is_published_at_population_time() {
    let camera = MockCamera::new();
    let tmp_listing = vec![video_file("100TESTA", "R0010001", 3840, Projection::DualFisheye)];

    // Build one gateway only to learn the corrected path layout, then place
    // a file there and re-populate.
    let gw = Gateway::start(camera, Vec::new(), true);
    let corrected = gw.storage.corrected_output("/100TESTA/R0010001");
    std::fs::create_dir_all(corrected.parent().unwrap()).unwrap();
    std::fs::write(&corrected, b"already-corrected-bytes").unwrap();

    gw.manager.populate(tmp_listing, true);

    assert!(gw.ledger.is_done("/100TESTA/R0010001"));
    let entry = gw.catalog.get("/CORRECTED/100TESTA/R0010001").unwrap();
    assert_eq!(entry.size, b"already-corrected-bytes".len() as u64);
    // The placeholder now advertises the "done" clip.
    let original = gw.catalog.get("/ORIGINAL/100TESTA/R0010001").unwrap();
    assert_eq!(original.size, gw.placeholders.done_len);
}

// ── Correction mode toggle ────────────────────────────────────────────────────

#[tokio::test]
async fn disabling_correction_tears_down_the_subtree_and_the_directory() {
    let listing = vec![video_file("100TESTA", "R0010001", 3840, Projection::DualFisheye)];
    let gw = Gateway::start(MockCamera::new(), listing, true);

    std::fs::create_dir_all(&gw.storage.corrected_dir).unwrap();
    std::fs::write(gw.storage.corrected_dir.join("junk.MP4"), b"x").unwrap();

    gw.manager.set_correction_mode(false);

    assert!(gw.catalog.get(id::CORRECTION_ID).is_none());
    assert!(gw.catalog.get(id::ORIGINAL_VIDEO_ID).is_none());
    assert!(gw.catalog.get(id::CORRECTED_VIDEO_ID).is_none());
    assert!(gw.catalog.get("/ORIGINAL/100TESTA/R0010001").is_none());
    assert_eq!(gw.catalog.root().child_count(), 2);
    assert!(!gw.storage.corrected_dir.exists());
}

#[tokio::test]
async fn reenabling_correction_rebuilds_the_subtree_from_the_listing() {
    let listing = vec![video_file("100TESTA", "R0010001", 3840, Projection::DualFisheye)];
    let gw = Gateway::start(MockCamera::new(), listing, true);

    gw.manager.set_correction_mode(false);
    gw.manager.set_correction_mode(true);

    assert_eq!(gw.catalog.root().child_count(), 3);
    let originals = gw.catalog.children_of(id::ORIGINAL_VIDEO_ID);
    assert_eq!(originals.len(), 1);
    assert_eq!(originals[0].id, "/ORIGINAL/100TESTA/R0010001");
}
