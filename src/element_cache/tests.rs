//! Tests for the element location cache

use super::*;
use crate::capture::{FrameSequence, StaticFrameSource};
use crate::frame::{Frame, Point, Rect};
use crate::template_matching::Template;
use image::{Rgb, RgbImage};
use std::path::Path;
use std::time::Duration;

const PATCH: u32 = 16;

fn patch_image() -> RgbImage {
    RgbImage::from_fn(PATCH, PATCH, |x, y| {
        Rgb([(90 + x * 9) as u8, (40 + y * 11) as u8, ((x * y) % 50 + 120) as u8])
    })
}

/// 200x150 dark frame with the element pasted at `at`, if any
fn screen(at: Option<(u32, u32)>) -> Frame {
    let mut img = RgbImage::from_pixel(200, 150, Rgb([15, 15, 25]));
    if let Some((px, py)) = at {
        image::imageops::replace(&mut img, &patch_image(), px as i64, py as i64);
    }
    Frame::new(img)
}

fn template() -> Template {
    Template::new(Some("play".into()), patch_image())
}

fn quick_config() -> LocatorConfig {
    LocatorConfig {
        retry_delay: Duration::from_millis(1),
        ..LocatorConfig::default()
    }
}

fn locator_at(dir: &Path, source: StaticFrameSource) -> ElementLocator<StaticFrameSource> {
    ElementLocator::open(source, dir).with_config(quick_config())
}

#[tokio::test]
async fn test_search_then_verify_cached() {
    let dir = tempfile::tempdir().unwrap();
    let mut locator = locator_at(dir.path(), StaticFrameSource::new(screen(Some((120, 60)))));
    locator.save_template("Play Button", &template()).unwrap();

    let first = locator.locate("Play Button", "big green button", false).await.unwrap();
    assert_eq!(first.source, LocationSource::Searched);
    assert_eq!(first.point, Point::new(128, 68));
    assert_eq!(locator.store().cached_center("Play Button"), Some(Point::new(128, 68)));
    assert!(locator.record("Play Button").unwrap().last_found.is_some());

    let second = locator.locate("Play Button", "big green button", false).await.unwrap();
    assert_eq!(second.source, LocationSource::Verified);
    assert_eq!(second.point, first.point);

    // Persisted for the next session
    let reopened = CoordinateStore::load(dir.path().join(ELEMENTS_FILE));
    assert_eq!(reopened.cached_center("Play Button"), Some(Point::new(128, 68)));
}

#[tokio::test]
async fn test_stale_cache_triggers_search() {
    let dir = tempfile::tempdir().unwrap();
    TemplateLibrary::new(dir.path().join(TEMPLATES_DIR))
        .save("play", &template())
        .unwrap();
    let mut store = CoordinateStore::load(dir.path().join(ELEMENTS_FILE));
    store.set_cached("play", Point::new(20, 20));
    store.save().unwrap();

    let mut locator = locator_at(dir.path(), StaticFrameSource::new(screen(Some((150, 100)))));
    let found = locator.locate("play", "", false).await.unwrap();
    assert_eq!(found.source, LocationSource::Searched);
    assert_eq!(found.point, Point::new(158, 108));
    assert_eq!(locator.store().cached_center("play"), Some(Point::new(158, 108)));
}

#[tokio::test]
async fn test_force_search_skips_cache() {
    let dir = tempfile::tempdir().unwrap();
    let mut locator = locator_at(dir.path(), StaticFrameSource::new(screen(Some((40, 30)))));
    locator.save_template("play", &template()).unwrap();
    locator.locate("play", "", false).await.unwrap();

    let forced = locator.locate("play", "", true).await.unwrap();
    assert_eq!(forced.source, LocationSource::Searched);
    assert_eq!(forced.point, Point::new(48, 38));
}

#[tokio::test]
async fn test_missing_element_uses_manual_coordinate() {
    let dir = tempfile::tempdir().unwrap();
    let mut locator = locator_at(dir.path(), StaticFrameSource::new(screen(None)));
    locator.save_template("play", &template()).unwrap();

    let err = locator.locate("play", "", false).await.unwrap_err();
    assert!(matches!(err, LocateError::NoCachedOrManualCoordinate { .. }));

    locator.set_manual_coordinate("play", Some(Point::new(5, 6)));
    let manual = locator.locate("play", "", false).await.unwrap();
    assert_eq!(manual.source, LocationSource::Manual);
    assert_eq!(manual.point, Point::new(5, 6));
    assert_eq!(manual.confidence, None);
}

#[tokio::test]
async fn test_search_attempts_are_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let library = TemplateLibrary::new(dir.path().join(TEMPLATES_DIR));
    library.save("play", &template()).unwrap();
    // Exactly as many frames as attempts; a fourth capture would fail with Exhausted
    let source = FrameSequence::new(vec![screen(None), screen(None), screen(None)]);
    let mut locator = ElementLocator::new(source, library, CoordinateStore::in_memory())
        .with_config(quick_config());

    let err = locator.locate("play", "", false).await.unwrap_err();
    assert!(matches!(err, LocateError::NoCachedOrManualCoordinate { .. }));
    assert_eq!(locator.source().remaining(), 0);
}

#[tokio::test]
async fn test_late_appearance_is_found_on_retry() {
    let dir = tempfile::tempdir().unwrap();
    let library = TemplateLibrary::new(dir.path().join(TEMPLATES_DIR));
    library.save("play", &template()).unwrap();
    let source = FrameSequence::new(vec![screen(None), screen(Some((60, 60)))]);
    let mut locator = ElementLocator::new(source, library, CoordinateStore::in_memory())
        .with_config(quick_config());

    let found = locator.locate("play", "", false).await.unwrap();
    assert_eq!(found.point, Point::new(68, 68));
}

#[tokio::test]
async fn test_no_template_without_handler_is_denied() {
    let dir = tempfile::tempdir().unwrap();
    let mut locator = locator_at(dir.path(), StaticFrameSource::new(screen(Some((10, 10)))));

    let err = locator.locate("settings", "gear icon", false).await.unwrap_err();
    assert!(matches!(err, LocateError::AcquisitionDenied { .. }));
    assert_eq!(locator.get_location("settings", "gear icon", false).await, None);

    locator.set_manual_coordinate("settings", Some(Point::new(190, 5)));
    assert_eq!(
        locator.get_location("settings", "gear icon", false).await,
        Some(Point::new(190, 5))
    );
}

#[tokio::test]
async fn test_acquisition_handler_supplies_template() {
    let dir = tempfile::tempdir().unwrap();
    let (client, mut rx) = create_acquisition_channel();
    let handler_library = TemplateLibrary::new(dir.path().join(TEMPLATES_DIR));
    let handler = tokio::spawn(async move {
        let request = rx.recv().await.expect("one request");
        assert_eq!(request.element_name, "play");
        assert_eq!(request.description, "triangle");
        handler_library.save(&request.element_name, &template()).unwrap();
        request.respond(true);
    });

    let mut locator = locator_at(dir.path(), StaticFrameSource::new(screen(Some((100, 20)))))
        .with_acquisition(client);
    let found = locator.locate("play", "triangle", false).await.unwrap();
    assert_eq!(found.source, LocationSource::Searched);
    assert_eq!(found.point, Point::new(108, 28));
    handler.await.unwrap();
}

#[tokio::test]
async fn test_acquisition_refused_falls_back_to_manual() {
    let dir = tempfile::tempdir().unwrap();
    let (client, mut rx) = create_acquisition_channel();
    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            request.respond(false);
        }
    });

    let mut locator = locator_at(dir.path(), StaticFrameSource::new(screen(None)))
        .with_acquisition(client);
    locator.set_manual_coordinate("play", Some(Point::new(1, 2)));
    let located = locator.locate("play", "", false).await.unwrap();
    assert_eq!(located.source, LocationSource::Manual);
}

#[tokio::test]
async fn test_closed_acquisition_channel_counts_as_denied() {
    let dir = tempfile::tempdir().unwrap();
    let (client, rx) = create_acquisition_channel();
    drop(rx);
    let mut locator = locator_at(dir.path(), StaticFrameSource::new(screen(None)))
        .with_acquisition(client);
    assert!(matches!(
        locator.locate("play", "", false).await,
        Err(LocateError::AcquisitionDenied { .. })
    ));
}

#[tokio::test]
async fn test_cancelled_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let mut locator = locator_at(dir.path(), StaticFrameSource::new(screen(Some((0, 0)))));
    locator.save_template("play", &template()).unwrap();
    locator.cancel_flag().cancel();
    assert!(matches!(
        locator.locate("play", "", false).await,
        Err(LocateError::CancelledByCaller)
    ));
}

#[tokio::test]
async fn test_capture_failure_is_frame_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let library = TemplateLibrary::new(dir.path().join(TEMPLATES_DIR));
    library.save("play", &template()).unwrap();
    let mut locator = ElementLocator::new(FrameSequence::new(Vec::new()), library, CoordinateStore::in_memory());
    let err = locator.locate("play", "", false).await.unwrap_err();
    assert!(matches!(err, LocateError::FrameUnavailable { .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_capture_failure_falls_back_to_manual() {
    let dir = tempfile::tempdir().unwrap();
    let library = TemplateLibrary::new(dir.path().join(TEMPLATES_DIR));
    library.save("play", &template()).unwrap();
    let mut store = CoordinateStore::in_memory();
    store.set_manual("play", Some(Point::new(5, 6)));
    store.set_cached("play", Point::new(40, 40));
    let mut locator = ElementLocator::new(FrameSequence::new(Vec::new()), library, store);

    let located = locator.locate("play", "", false).await.unwrap();
    assert_eq!(located.source, LocationSource::Manual);
    assert_eq!(located.point, Point::new(5, 6));
    assert_eq!(locator.get_location("play", "", true).await, Some(Point::new(5, 6)));
}

#[tokio::test]
async fn test_unreadable_template_falls_back_to_manual() {
    let dir = tempfile::tempdir().unwrap();
    let library = TemplateLibrary::new(dir.path().join(TEMPLATES_DIR));
    std::fs::create_dir_all(library.dir()).unwrap();
    std::fs::write(library.path_for("play"), b"not a png").unwrap();

    let mut locator = ElementLocator::new(
        StaticFrameSource::new(screen(Some((10, 10)))),
        library,
        CoordinateStore::in_memory(),
    );
    assert!(matches!(
        locator.locate("play", "", false).await,
        Err(LocateError::TemplateDecode { .. })
    ));

    locator.set_manual_coordinate("play", Some(Point::new(5, 6)));
    assert_eq!(locator.get_location("play", "", false).await, Some(Point::new(5, 6)));
}

#[tokio::test]
async fn test_acquisition_without_file_falls_back_to_manual() {
    let dir = tempfile::tempdir().unwrap();
    let (client, mut rx) = create_acquisition_channel();
    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            // Claims success but never writes the template
            request.respond(true);
        }
    });

    let mut locator = locator_at(dir.path(), StaticFrameSource::new(screen(None)))
        .with_acquisition(client);
    assert!(matches!(
        locator.locate("play", "", false).await,
        Err(LocateError::TemplateNotFound { .. })
    ));

    locator.set_manual_coordinate("play", Some(Point::new(5, 6)));
    let located = locator.locate("play", "", false).await.unwrap();
    assert_eq!(located.source, LocationSource::Manual);
    assert_eq!(located.point, Point::new(5, 6));
}

#[tokio::test]
async fn test_cancel_is_not_masked_by_manual() {
    let dir = tempfile::tempdir().unwrap();
    let mut locator = locator_at(dir.path(), StaticFrameSource::new(screen(None)));
    locator.save_template("play", &template()).unwrap();
    locator.set_manual_coordinate("play", Some(Point::new(5, 6)));
    locator.cancel_flag().cancel();
    assert!(matches!(
        locator.locate("play", "", false).await,
        Err(LocateError::CancelledByCaller)
    ));
}

#[tokio::test]
async fn test_element_names_ignore_case() {
    let dir = tempfile::tempdir().unwrap();
    let mut locator = locator_at(dir.path(), StaticFrameSource::new(screen(Some((120, 60)))));
    locator.save_template("Play Button", &template()).unwrap();
    assert!(locator.has_template("play button"));

    let found = locator.locate("PLAY BUTTON", "", false).await.unwrap();
    assert_eq!(found.point, Point::new(128, 68));
    assert_eq!(locator.store().cached_center("Play Button"), Some(Point::new(128, 68)));
    assert_eq!(locator.element_names(), vec!["PLAY BUTTON".to_string()]);

    locator.set_manual_coordinate("play button", Some(Point::new(1, 2)));
    assert_eq!(locator.element_names().len(), 1);
    assert_eq!(locator.manual_coordinate("Play Button"), Some(Point::new(1, 2)));
}

#[test]
fn test_store_remove_ignores_case() {
    let mut store = CoordinateStore::in_memory();
    store.set_manual("Menu", Some(Point::new(3, 4)));
    store.set_cached("menu", Point::new(30, 40));
    assert_eq!(store.records().len(), 1);
    assert!(store.clear_cache("MENU"));

    let removed = store.remove("mEnU").unwrap();
    assert_eq!(removed.manual, Some(Point::new(3, 4)));
    assert!(store.records().is_empty());
    assert!(store.remove("menu").is_none());
}

#[tokio::test]
async fn test_persistence_failure_does_not_abort_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"x").unwrap();
    let library = TemplateLibrary::new(dir.path().join(TEMPLATES_DIR));
    library.save("play", &template()).unwrap();
    let store = CoordinateStore::load(blocker.join(ELEMENTS_FILE));
    assert!(store.save().is_err());

    let mut locator = ElementLocator::new(StaticFrameSource::new(screen(Some((30, 30)))), library, store)
        .with_config(quick_config());
    let found = locator.locate("play", "", false).await.unwrap();
    assert_eq!(found.point, Point::new(38, 38));
    assert_eq!(locator.store().cached_center("play"), Some(Point::new(38, 38)));
}

#[tokio::test]
async fn test_register_from_frame() {
    let dir = tempfile::tempdir().unwrap();
    let mut locator = locator_at(dir.path(), StaticFrameSource::new(screen(Some((70, 40)))));
    let path = locator
        .register_from_frame("Start Game", Rect::new(70, 40, PATCH, PATCH))
        .await
        .unwrap();
    assert_eq!(path, dir.path().join(TEMPLATES_DIR).join("Start_Game.png"));
    assert!(locator.has_template("Start Game"));

    let found = locator.locate("Start Game", "", false).await.unwrap();
    assert_eq!(found.point, Point::new(78, 48));
}

#[test]
fn test_clear_cache_keeps_manual_and_template() {
    let dir = tempfile::tempdir().unwrap();
    let mut locator = locator_at(dir.path(), StaticFrameSource::new(screen(None)));
    locator.save_template("a", &template()).unwrap();
    locator.set_manual_coordinate("a", Some(Point::new(1, 1)));
    locator.set_manual_coordinate("b", None);

    let mut store = CoordinateStore::in_memory();
    store.set_cached("a", Point::new(9, 9));
    store.set_cached("b", Point::new(8, 8));
    store.set_manual("a", Some(Point::new(1, 1)));
    store.clear_cache("a");
    assert_eq!(store.cached_center("a"), None);
    assert_eq!(store.get("a").unwrap().last_found, None);
    assert_eq!(store.manual("a"), Some(Point::new(1, 1)));
    assert_eq!(store.cached_center("b"), Some(Point::new(8, 8)));
    store.clear_all();
    assert_eq!(store.cached_center("b"), None);
    assert!(!store.clear_cache("missing"));

    locator.clear_all();
    assert!(locator.has_template("a"));
    assert_eq!(locator.manual_coordinate("a"), Some(Point::new(1, 1)));
    assert_eq!(locator.element_names(), vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn test_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join(ELEMENTS_FILE);
    let mut store = CoordinateStore::load(&path);
    store.set_manual("menu", Some(Point::new(3, 4)));
    store.set_cached("menu", Point::new(30, 40));
    store.set_cached("close", Point::new(-1, 7));
    store.save().unwrap();

    let reloaded = CoordinateStore::load(&path);
    assert_eq!(reloaded.records(), store.records());
}

#[test]
fn test_store_ignores_corrupt_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(ELEMENTS_FILE);
    std::fs::write(&path, "[1, 2").unwrap();
    let store = CoordinateStore::load(&path);
    assert_eq!(store.records().len(), 0);
    assert_eq!(store.path(), Some(path.as_path()));
}

#[test]
fn test_safe_file_names() {
    assert_eq!(safe_file_name("Play Button"), "Play_Button");
    assert_eq!(safe_file_name("a/b:c*?"), "a_b_c__");
    assert_eq!(safe_file_name("ok-name_1"), "ok-name_1");
}

#[test]
fn test_library_names_and_remove() {
    let dir = tempfile::tempdir().unwrap();
    let library = TemplateLibrary::new(dir.path());
    assert!(library.names().is_empty());
    library.save("Zed", &template()).unwrap();
    library.save("alpha beta", &template()).unwrap();
    assert_eq!(library.names(), vec!["Zed".to_string(), "alpha_beta".to_string()]);
    assert!(library.remove("Zed").unwrap());
    assert!(!library.remove("Zed").unwrap());
    assert!(matches!(
        library.load("Zed"),
        Err(LocateError::TemplateNotFound { .. })
    ));
}

#[test]
fn test_data_dir_prefers_explicit_value() {
    let explicit = std::path::PathBuf::from("/tmp/explicit-dir");
    assert_eq!(resolve_data_dir(Some(explicit.clone())), explicit);
}
