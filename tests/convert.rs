mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use spherecast::camera::Projection;
use spherecast::catalog::id;
use spherecast::convert::{ConvertEvent, ConvertState};

use common::{await_event, video_file, Gateway, MockCamera, GIB};

const SOURCE: &str = "/100TESTA/R0010001";

fn one_video_listing() -> Vec<spherecast::camera::FileEntry> {
    vec![video_file("100TESTA", "R0010001", 3840, Projection::DualFisheye)]
}

// ── Admission ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insufficient_storage_fails_the_job_without_a_remote_submit() {
    let camera = MockCamera::new();
    // Listing size is 64 MiB; 1 GiB remaining leaves less than the reject
    // threshold after subtracting it.
    camera.space.store(GIB, Ordering::SeqCst);
    let gw = Gateway::start(camera, one_video_listing(), true);
    let mut events = gw.converter.events();

    gw.converter.push(SOURCE);
    await_event(&mut events, |e| matches!(e, ConvertEvent::Failed { .. })).await;

    assert_eq!(gw.camera.convert_calls.load(Ordering::SeqCst), 0);
    assert_eq!(gw.notifier.error_cues.load(Ordering::SeqCst), 1);
    // The claim is released so a later request may retry.
    assert_eq!(gw.ledger.state(SOURCE), None);
}

#[tokio::test]
async fn low_battery_fails_the_job_without_a_remote_submit() {
    let mut camera = MockCamera::new();
    camera.battery = 0.05;
    let gw = Gateway::start(camera, one_video_listing(), true);
    let mut events = gw.converter.events();

    gw.converter.push(SOURCE);
    await_event(&mut events, |e| matches!(e, ConvertEvent::Failed { .. })).await;

    assert_eq!(gw.camera.convert_calls.load(Ordering::SeqCst), 0);
    assert_eq!(gw.notifier.error_cues.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn storage_query_failure_fails_the_job() {
    let camera = MockCamera::new();
    camera.fail_space.store(true, Ordering::SeqCst);
    let gw = Gateway::start(camera, one_video_listing(), true);
    let mut events = gw.converter.events();

    gw.converter.push(SOURCE);
    await_event(&mut events, |e| matches!(e, ConvertEvent::Failed { .. })).await;
    assert_eq!(gw.camera.convert_calls.load(Ordering::SeqCst), 0);
}

// ── Publication ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn successful_job_publishes_the_corrected_entry() {
    let camera = MockCamera::new();
    *camera.result_url.lock().unwrap() =
        Some("http://127.0.0.1:8080/files/abc/100TESTA/R0010001.MP4".into());
    let gw = Gateway::start(camera, one_video_listing(), true);
    let staged_bytes = b"corrected-output".to_vec();
    *gw.camera.staged_file.lock().unwrap() = Some((
        gw.storage.staging_dir.join("100TESTA/R0010001.MP4"),
        staged_bytes.clone(),
    ));
    let mut events = gw.converter.events();

    gw.converter.push(SOURCE);
    await_event(&mut events, |e| matches!(e, ConvertEvent::Published { .. })).await;

    // Corrected entry under the results container, with the real file size.
    let corrected = gw.catalog.get("/CORRECTED/100TESTA/R0010001").unwrap();
    assert_eq!(corrected.parent, id::CORRECTED_VIDEO_ID);
    assert_eq!(corrected.size, staged_bytes.len() as u64);
    assert_eq!(
        gw.catalog.get(id::CORRECTED_VIDEO_ID).unwrap().child_count(),
        1
    );

    // The output landed at the path the placeholder logic checks.
    let out_path = gw.storage.corrected_output(SOURCE);
    assert_eq!(std::fs::read(&out_path).unwrap(), staged_bytes);
    assert_eq!(gw.notifier.registered.lock().unwrap().as_slice(), &[out_path]);

    // The original placeholder advertises the "done" clip now.
    let original = gw.catalog.get(&id::original_id(SOURCE)).unwrap();
    assert_eq!(original.size, gw.placeholders.done_len);

    assert_eq!(gw.ledger.state(SOURCE), Some(ConvertState::Done));
    assert_eq!(gw.notifier.done_cues.load(Ordering::SeqCst), 1);
    assert_eq!(gw.notifier.error_cues.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn pushes_for_an_already_corrected_source_are_ignored() {
    let camera = MockCamera::new();
    *camera.result_url.lock().unwrap() =
        Some("http://127.0.0.1:8080/files/abc/100TESTA/R0010001.MP4".into());
    let gw = Gateway::start(camera, one_video_listing(), true);
    *gw.camera.staged_file.lock().unwrap() = Some((
        gw.storage.staging_dir.join("100TESTA/R0010001.MP4"),
        b"corrected-output".to_vec(),
    ));
    let mut events = gw.converter.events();

    gw.converter.push(SOURCE);
    await_event(&mut events, |e| matches!(e, ConvertEvent::Published { .. })).await;

    gw.converter.push(SOURCE);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(gw.camera.convert_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn duplicate_pushes_run_a_single_job() {
    // Never-completing job: the first push claims the source, the rest are
    // dropped at the ledger.
    let gw = Gateway::start(MockCamera::new(), one_video_listing(), true);
    let mut events = gw.converter.events();

    gw.converter.push(SOURCE);
    gw.converter.push(SOURCE);
    gw.converter.push(SOURCE);

    await_event(&mut events, |e| matches!(e, ConvertEvent::Started { .. })).await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(gw.camera.convert_calls.load(Ordering::SeqCst), 1);
    assert_eq!(gw.ledger.state(SOURCE), Some(ConvertState::Running));
}

// ── Cancellation ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn shutdown_mid_poll_cancels_the_remote_job_once_and_publishes_nothing() {
    // command_status reports inProgress forever, so the worker sits in the
    // poll loop until shut down.
    let gw = Gateway::start(MockCamera::new(), one_video_listing(), true);
    let mut events = gw.converter.events();

    gw.converter.push(SOURCE);
    await_event(&mut events, |e| matches!(e, ConvertEvent::Started { .. })).await;
    // Let the poll loop issue at least one status query.
    tokio::time::sleep(Duration::from_millis(100)).await;

    gw.converter.shutdown();
    await_event(&mut events, |e| matches!(e, ConvertEvent::Cancelled { .. })).await;

    assert_eq!(gw.camera.cancel_calls.load(Ordering::SeqCst), 1);
    // No catalog mutation: nothing was published.
    assert!(gw.catalog.get("/CORRECTED/100TESTA/R0010001").is_none());
    assert_eq!(
        gw.catalog.get(id::CORRECTED_VIDEO_ID).unwrap().child_count(),
        0
    );
    let original = gw.catalog.get(&id::original_id(SOURCE)).unwrap();
    assert_eq!(original.size, gw.placeholders.processing_len);
    // The interruption is not an error.
    assert_eq!(gw.notifier.error_cues.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn push_after_shutdown_is_ignored() {
    let gw = Gateway::start(MockCamera::new(), one_video_listing(), true);
    gw.converter.shutdown();
    gw.converter.push(SOURCE);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(gw.camera.convert_calls.load(Ordering::SeqCst), 0);
    assert_eq!(gw.ledger.state(SOURCE), None);
}
