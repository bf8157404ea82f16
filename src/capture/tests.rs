// Tests for frame sources
// Focus: playback order, exhaustion, file re-reads

use super::*;
use crate::frame::Frame;

#[tokio::test]
async fn test_static_source_repeats() {
    let source = StaticFrameSource::new(Frame::filled(4, 3, [1, 2, 3]));
    for _ in 0..3 {
        let capture = source.capture().await.expect("static capture");
        assert_eq!((capture.frame.width(), capture.frame.height()), (4, 3));
    }
}

#[tokio::test]
async fn test_sequence_plays_in_order_then_exhausts() {
    let source = FrameSequence::new(vec![
        Frame::filled(2, 2, [10, 10, 10]),
        Frame::filled(2, 2, [20, 20, 20]),
    ]);
    assert_eq!(source.remaining(), 2);
    assert_eq!(source.capture_frame().await.unwrap().rgb(0, 0), [10, 10, 10]);
    assert_eq!(source.capture_frame().await.unwrap().rgb(0, 0), [20, 20, 20]);
    assert!(matches!(
        source.capture_frame().await,
        Err(CaptureError::Exhausted)
    ));
}

#[tokio::test]
async fn test_sequence_repeat_last() {
    let source = FrameSequence::new(vec![Frame::filled(2, 2, [7, 7, 7])]).repeat_last(true);
    source.capture_frame().await.unwrap();
    assert_eq!(source.capture_frame().await.unwrap().rgb(1, 1), [7, 7, 7]);
}

#[tokio::test]
async fn test_file_source_rereads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.png");
    Frame::filled(5, 5, [1, 1, 1]).image().save(&path).unwrap();

    let source = ImageFileSource::new(&path);
    assert_eq!(source.capture_frame().await.unwrap().rgb(0, 0), [1, 1, 1]);

    Frame::filled(5, 5, [9, 9, 9]).image().save(&path).unwrap();
    assert_eq!(source.capture_frame().await.unwrap().rgb(0, 0), [9, 9, 9]);
}

#[tokio::test]
async fn test_missing_file_is_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let source = ImageFileSource::new(dir.path().join("nope.png"));
    assert!(matches!(
        source.capture_frame().await,
        Err(CaptureError::ReadFailed { .. })
    ));
}

#[tokio::test]
async fn test_backend_from_paths() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.png");
    let b = dir.path().join("b.png");
    Frame::filled(3, 3, [1, 0, 0]).image().save(&a).unwrap();
    Frame::filled(3, 3, [0, 1, 0]).image().save(&b).unwrap();

    let single = CaptureBackend::from_paths(std::slice::from_ref(&a)).unwrap();
    assert!(matches!(single, CaptureBackend::File(_)));

    let many = CaptureBackend::from_paths(&[a, b]).unwrap();
    assert_eq!(many.capture_frame().await.unwrap().rgb(0, 0), [1, 0, 0]);
    assert_eq!(many.capture_frame().await.unwrap().rgb(0, 0), [0, 1, 0]);
    assert_eq!(many.capture_frame().await.unwrap().rgb(0, 0), [0, 1, 0]);
}
