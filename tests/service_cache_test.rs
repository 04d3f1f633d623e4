//! Integration tests for the extraction service: cache, single-flight, routing
//!
//! Run with: cargo test --test service_cache_test

mod common;

use common::{service, youtube_json, Reply, ScriptedRunner};
use grabgate::core::AppError;
use grabgate::download::Quality;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

#[tokio::test]
async fn test_second_call_is_served_from_cache() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::sequence(vec![Reply::Json(youtube_json("Cached"))]));
    let service = service(runner.clone(), dir.path(), true);

    let first = service.get_info(URL).await.unwrap();
    let second = service.get_info(URL).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(runner.call_count(), 1);
    assert_eq!(service.cache().stats().0, 1);
}

#[tokio::test]
async fn test_cache_key_ignores_fragment_and_host_case() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::sequence(vec![Reply::Json(youtube_json("Cached"))]));
    let service = service(runner.clone(), dir.path(), true);

    service.get_info(URL).await.unwrap();
    service
        .get_info("https://WWW.YOUTUBE.COM/watch?v=dQw4w9WgXcQ#t=42")
        .await
        .unwrap();
    assert_eq!(runner.call_count(), 1);
}

#[tokio::test]
async fn test_normalized_result_shape() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::always(Reply::Json(youtube_json("Shape"))));
    let service = service(runner, dir.path(), true);

    let info = service.get_info(URL).await.unwrap();
    let qualities: Vec<Quality> = info.formats.iter().map(|f| f.quality).collect();
    assert_eq!(
        qualities,
        vec![Quality::P1080, Quality::P720, Quality::P360, Quality::AudioOnly]
    );

    let p1080 = info.find(Quality::P1080).unwrap();
    assert!(!p1080.has_audio && p1080.can_merge_audio);
    let p360 = info.find(Quality::P360).unwrap();
    assert!(p360.has_audio && !p360.can_merge_audio);
    assert_eq!(p360.filesize, Some(9_000_000));

    let audio = info.find(Quality::AudioOnly).unwrap();
    assert_eq!(audio.url, "https://rr1.googlevideo.com/a251");
    assert_eq!(audio.format, "webm");
    assert_eq!(info.duration, 212);
}

#[tokio::test]
async fn test_single_flight_coalesces_concurrent_requests() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(
        ScriptedRunner::always(Reply::Json(youtube_json("Once"))).with_delay(Duration::from_millis(200)),
    );
    let service = Arc::new(service(runner.clone(), dir.path(), true));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.get_info(URL).await.map(|info| info.title.clone()) })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), "Once");
    }

    assert_eq!(runner.call_count(), 1);
}

#[tokio::test]
async fn test_single_flight_shares_failures() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(
        ScriptedRunner::always(Reply::Fail("ERROR: [youtube] x: Video unavailable".to_string()))
            .with_delay(Duration::from_millis(300)),
    );
    let service = Arc::new(service(runner.clone(), dir.path(), true));

    let started = std::time::Instant::now();
    let tasks: Vec<_> = (0..5)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.get_info(URL).await.map(|_| ()) })
        })
        .collect();
    for task in tasks {
        let err = task.await.unwrap().unwrap_err();
        assert_eq!(err.category(), "strategy_exhausted");
    }

    assert_eq!(runner.call_count(), 1);
    assert!(started.elapsed() < Duration::from_millis(1200));
    assert_eq!(service.in_flight_len(), 0);
}

#[tokio::test]
async fn test_cancelled_requests_leave_no_flight_behind() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(
        ScriptedRunner::always(Reply::Json(youtube_json("Slow"))).with_delay(Duration::from_secs(30)),
    );
    let service = Arc::new(service(runner.clone(), dir.path(), true));

    let tasks: Vec<_> = (0..50)
        .map(|i| {
            let service = service.clone();
            let url = format!("https://www.youtube.com/watch?v=id{i}");
            tokio::spawn(async move { service.get_info(&url).await.is_ok() })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(20)).await;

    for task in tasks {
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
    }

    assert_eq!(runner.call_count(), 50);
    assert_eq!(service.in_flight_len(), 0);
}

#[tokio::test]
async fn test_waiter_takes_over_cancelled_flight() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(
        ScriptedRunner::always(Reply::Json(youtube_json("Survivor"))).with_delay(Duration::from_millis(200)),
    );
    let service = Arc::new(service(runner.clone(), dir.path(), true));

    let first = {
        let service = service.clone();
        tokio::spawn(async move { service.get_info(URL).await.is_ok() })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = {
        let service = service.clone();
        tokio::spawn(async move { service.get_info(URL).await.map(|info| info.title.clone()) })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    first.abort();
    assert!(first.await.unwrap_err().is_cancelled());

    assert_eq!(second.await.unwrap().unwrap(), "Survivor");
    assert_eq!(runner.call_count(), 2);
    assert_eq!(service.in_flight_len(), 0);
}

#[tokio::test]
async fn test_without_single_flight_each_request_extracts() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(
        ScriptedRunner::always(Reply::Json(youtube_json("Many"))).with_delay(Duration::from_millis(200)),
    );
    let service = Arc::new(service(runner.clone(), dir.path(), false));

    let a = {
        let service = service.clone();
        tokio::spawn(async move { service.get_info(URL).await.is_ok() })
    };
    let b = {
        let service = service.clone();
        tokio::spawn(async move { service.get_info(URL).await.is_ok() })
    };
    assert!(a.await.unwrap() && b.await.unwrap());
    assert_eq!(runner.call_count(), 2);
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::sequence(vec![
        Reply::Fail("ERROR: [youtube] x: Video unavailable".to_string()),
        Reply::Json(youtube_json("Back")),
    ]));
    let service = service(runner.clone(), dir.path(), true);

    let err = service.get_info(URL).await.unwrap_err();
    assert!(matches!(err, AppError::StrategyExhausted { .. }));
    assert_eq!(service.get_info(URL).await.unwrap().title, "Back");
    assert_eq!(runner.call_count(), 2);
}

#[tokio::test]
async fn test_generic_sources_rejected_before_spawn() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::sequence(Vec::new()));
    let service = service(runner.clone(), dir.path(), true);

    let err = service.get_info("https://example.com/video.mp4").await.unwrap_err();
    assert!(matches!(err, AppError::UnsupportedPlatform(_)));
    assert_eq!(runner.call_count(), 0);
}

#[tokio::test]
async fn test_generic_sources_when_enabled() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::always(Reply::Json(
        serde_json::json!({
            "title": "Direct file",
            "duration": 5,
            "url": "https://cdn.example.com/video.mp4",
            "ext": "mp4"
        })
        .to_string(),
    )));
    let service = service(runner, dir.path(), true).with_generic_sources(true);

    let info = service.get_info("https://example.com/watch/1").await.unwrap();
    assert_eq!(info.formats.len(), 1);
    assert_eq!(info.formats[0].quality, Quality::BestAvailable);
}

#[tokio::test]
async fn test_invalid_urls() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::sequence(Vec::new()));
    let service = service(runner.clone(), dir.path(), true);

    for url in ["", "   ", "not a url", "ftp://youtube.com/x", "file:///etc/passwd"] {
        assert!(
            matches!(service.get_info(url).await, Err(AppError::InvalidUrl(_))),
            "{url}"
        );
    }
    let long = format!("https://youtube.com/watch?v={}", "a".repeat(3000));
    assert!(matches!(service.get_info(&long).await, Err(AppError::InvalidUrl(_))));
    assert_eq!(runner.call_count(), 0);
}

#[tokio::test]
async fn test_playlist_output_is_malformed() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::always(Reply::Json(format!(
        "{}\n{}",
        youtube_json("one"),
        youtube_json("two")
    ))));
    let service = service(runner, dir.path(), true);

    let err = service.get_info(URL).await.unwrap_err();
    assert!(matches!(err, AppError::MalformedResponse(_)));
}
