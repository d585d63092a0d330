mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use common::{FixedDetector, FixedSegmenter, MissingCodec, RawVideoCodec};
use image::{Rgb, RgbImage};
use roadlens::detection::{BBox, Detection};
use roadlens::server;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::Ordering;
use tower::ServiceExt;

const BODY_LIMIT: usize = 64 * 1024 * 1024;

fn video_request(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/vehicle-video")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

fn json_request(value: Value) -> Request<Body> {
    video_request(serde_json::to_vec(&value).unwrap())
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), BODY_LIMIT).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn app(detections: Vec<Detection>, codec: RawVideoCodec, staging: &Path) -> axum::Router {
    let pipeline = common::pipeline(
        Box::new(FixedSegmenter::new(Vec::new())),
        Box::new(FixedDetector { detections }),
        codec,
        staging,
    );
    server::router(pipeline, BODY_LIMIT)
}

fn clip(frames: usize) -> Vec<RgbImage> {
    (0..frames)
        .map(|i| RgbImage::from_pixel(32, 24, Rgb([i as u8 * 10, 40, 40])))
        .collect()
}

#[tokio::test]
async fn single_frame_video_is_annotated() {
    let staging = tempfile::tempdir().unwrap();
    let detections = vec![Detection::new(BBox::new(8.0, 30.0, 60.0, 58.0), "car", 0.88)];
    let app = app(detections, RawVideoCodec::default(), staging.path());
    let background = Rgb([0, 40, 40]);
    let input = common::encode_raw_video(&[RgbImage::from_pixel(96, 64, background)], 25.0);

    let (status, body) = send(app, json_request(json!({ "video": STANDARD.encode(&input) }))).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "success");
    assert_eq!(body["frames_processed"], 1);

    let output = STANDARD
        .decode(body["processed_video"].as_str().unwrap())
        .unwrap();
    let (info, frames) = common::decode_raw_video(&output).unwrap();
    assert_eq!((info.width, info.height, info.fps), (96, 64, 25.0));
    assert_eq!(frames.len(), 1);
    let frame = &frames[0];

    // Box
    assert_eq!(*frame.get_pixel(8, 30), Rgb([0, 255, 0]));
    assert_eq!(*frame.get_pixel(60, 58), Rgb([0, 255, 0]));
    assert_eq!(*frame.get_pixel(30, 45), background);

    // Caption "car 0.88" above the box, nothing below it
    let changed = |rows: std::ops::Range<u32>| {
        rows.flat_map(|y| (0..96).map(move |x| (x, y)))
            .filter(|&(x, y)| *frame.get_pixel(x, y) != background)
            .count()
    };
    assert!(changed(0..30) > 0, "caption missing");
    assert_eq!(changed(59..64), 0);

    assert!(common::dir_is_empty(staging.path()));
}

#[tokio::test]
async fn every_frame_is_processed_in_order() {
    let staging = tempfile::tempdir().unwrap();
    let segmenter = FixedSegmenter::new(Vec::new());
    let calls = segmenter.calls.clone();
    let pipeline = common::pipeline(
        Box::new(segmenter),
        Box::new(FixedDetector {
            detections: Vec::new(),
        }),
        RawVideoCodec::default(),
        staging.path(),
    );
    let app = server::router(pipeline, BODY_LIMIT);
    let frames = clip(5);
    let input = common::encode_raw_video(&frames, 29.97);

    let (status, body) = send(app, json_request(json!({ "video": STANDARD.encode(&input) }))).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["frames_processed"], 5);
    let output = STANDARD
        .decode(body["processed_video"].as_str().unwrap())
        .unwrap();
    let (info, decoded) = common::decode_raw_video(&output).unwrap();
    assert_eq!(info.fps, 29.97);
    assert_eq!(decoded, frames);
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn data_url_prefix_is_accepted() {
    let staging = tempfile::tempdir().unwrap();
    let app = app(Vec::new(), RawVideoCodec::default(), staging.path());
    let input = common::encode_raw_video(&clip(2), 10.0);
    let payload = format!("data:video/mp4;base64,{}", STANDARD.encode(&input));

    let (status, body) = send(app, json_request(json!({ "video": payload }))).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["frames_processed"], 2);
}

#[tokio::test]
async fn missing_video_field_is_rejected_before_staging() {
    let staging = tempfile::tempdir().unwrap();
    let app = app(Vec::new(), RawVideoCodec::default(), staging.path());

    let (status, body) = send(app, json_request(json!({ "clip": "AAAA" }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No video data received");
    assert!(common::dir_is_empty(staging.path()));
}

#[tokio::test]
async fn empty_body_is_rejected() {
    let staging = tempfile::tempdir().unwrap();
    let app = app(Vec::new(), RawVideoCodec::default(), staging.path());

    let (status, body) = send(app, video_request(Body::empty())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No video data received");
}

#[tokio::test]
async fn malformed_base64_is_rejected() {
    let staging = tempfile::tempdir().unwrap();
    let app = app(Vec::new(), RawVideoCodec::default(), staging.path());

    let (status, body) = send(app, json_request(json!({ "video": "not base64 at all!" }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("decode"));
    assert!(common::dir_is_empty(staging.path()));
}

#[tokio::test]
async fn undecodable_container_is_rejected_and_cleaned_up() {
    let staging = tempfile::tempdir().unwrap();
    let app = app(Vec::new(), RawVideoCodec::default(), staging.path());

    let (status, _) = send(
        app,
        json_request(json!({ "video": STANDARD.encode(b"garbage bytes here") })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(common::dir_is_empty(staging.path()));
}

#[tokio::test]
async fn video_without_frames_is_rejected() {
    let staging = tempfile::tempdir().unwrap();
    let app = app(Vec::new(), RawVideoCodec::default(), staging.path());
    let input = common::encode_raw_video_with_size(&[], 32, 24, 30.0);

    let (status, body) = send(app, json_request(json!({ "video": STANDARD.encode(&input) }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("no frames"));
    assert!(common::dir_is_empty(staging.path()));
}

#[tokio::test]
async fn zero_frame_rate_is_rejected() {
    let staging = tempfile::tempdir().unwrap();
    let app = app(Vec::new(), RawVideoCodec::default(), staging.path());
    let input = common::encode_raw_video(&clip(1), 0.0);

    let (status, _) = send(app, json_request(json!({ "video": STANDARD.encode(&input) }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(common::dir_is_empty(staging.path()));
}

#[tokio::test]
async fn mid_stream_failure_aborts_and_cleans_up() {
    let staging = tempfile::tempdir().unwrap();
    let codec = RawVideoCodec {
        fail_after: Some(2),
    };
    let app = app(Vec::new(), codec, staging.path());
    let input = common::encode_raw_video(&clip(4), 30.0);

    let (status, body) = send(app, json_request(json!({ "video": STANDARD.encode(&input) }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("frame 3"), "{message}");
    assert!(body.get("processed_video").is_none());
    assert!(common::dir_is_empty(staging.path()));
}

#[tokio::test]
async fn build_without_video_backend_is_a_server_fault() {
    let staging = tempfile::tempdir().unwrap();
    let pipeline = common::pipeline(
        Box::new(FixedSegmenter::new(Vec::new())),
        Box::new(FixedDetector {
            detections: Vec::new(),
        }),
        MissingCodec,
        staging.path(),
    );
    let app = server::router(pipeline, BODY_LIMIT);
    let input = common::encode_raw_video(&clip(1), 25.0);

    let (status, body) = send(app, json_request(json!({ "video": STANDARD.encode(&input) }))).await;

    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("no video backend"));
    assert!(common::dir_is_empty(staging.path()));
}
