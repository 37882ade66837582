//! Async capture stream tests. Require the `async` feature.

#![cfg(feature = "async")]

mod common;

use std::path::Path;

use common::sample_video_path;
use framegrab::{AcceptedFormat, ExtractionOptions, GrabError, capture_stream};
use tokio_stream::StreamExt;

#[tokio::test]
async fn missing_file_error_is_streamed() {
    let mut stream = capture_stream(
        "tests/fixtures/does_not_exist.mp4",
        AcceptedFormat::default(),
        ExtractionOptions::new(),
    );

    let first = stream.next().await.expect("stream ended without an item");
    assert!(matches!(first, Err(GrabError::FileOpen { .. })));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn streams_one_sample_per_position() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let options = ExtractionOptions::new().with_frame_count(6);
    let mut stream = capture_stream(path, AcceptedFormat::default(), options);

    let mut starts = Vec::new();
    while let Some(item) = stream.next().await {
        starts.push(item.unwrap().start());
    }

    assert_eq!(starts.len(), 6);
}

#[tokio::test]
async fn dropping_the_stream_early_is_clean() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let options = ExtractionOptions::new().with_frame_count(50);
    let mut stream = capture_stream(path, AcceptedFormat::default(), options);

    let first = stream.next().await.expect("no frame");
    assert!(first.is_ok());
    drop(stream);
}
