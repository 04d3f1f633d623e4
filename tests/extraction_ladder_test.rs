//! Integration tests for the extraction strategy ladder
//!
//! Run with: cargo test --test extraction_ladder_test

mod common;

use common::{extractor, youtube_json, Reply, ScriptedRunner, BOT_STDERR, VIMEO_AUTH_STDERR};
use grabgate::core::AppError;
use grabgate::download::{ExtractError, FailureKind, Platform, SourceRequest};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;

const YOUTUBE_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

#[tokio::test]
async fn test_bot_signature_then_success_never_tries_third() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::sequence(vec![
        Reply::Fail(BOT_STDERR.to_string()),
        Reply::Json(youtube_json("second")),
        Reply::Json(youtube_json("third")),
    ]));

    let raw = extractor(runner.clone(), dir.path())
        .extract(&SourceRequest::new(YOUTUBE_URL))
        .await
        .unwrap();

    assert_eq!(raw.json, youtube_json("second"));
    assert_eq!(raw.strategy, "client-spoof:android");
    assert_eq!(runner.call_count(), 2);

    let second = &runner.calls()[1];
    assert!(second.contains(&"youtube:player_client=android".to_string()));
    assert_eq!(second.last().map(String::as_str), Some(YOUTUBE_URL));
}

#[tokio::test]
async fn test_unrecognized_failure_aborts_after_first_attempt() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::always(Reply::Fail(
        "ERROR: something nobody has seen before".to_string(),
    )));

    let err = extractor(runner.clone(), dir.path())
        .extract(&SourceRequest::new(YOUTUBE_URL))
        .await
        .unwrap_err();

    assert!(matches!(err, ExtractError::StrategyExhausted { signature: None, .. }));
    assert_eq!(runner.call_count(), 1);
}

#[tokio::test]
async fn test_oversized_output_aborts_ladder() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::always(Reply::Json(youtube_json("huge"))));

    let err = extractor(runner.clone(), dir.path())
        .with_max_output_bytes(64)
        .extract(&SourceRequest::new(YOUTUBE_URL))
        .await
        .unwrap_err();

    match &err {
        ExtractError::OutputTooLarge { strategy, limit } => {
            assert_eq!(strategy, "standard");
            assert_eq!(*limit, 64);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(matches!(AppError::from(err), AppError::MalformedResponse(_)));
    assert_eq!(runner.call_count(), 1);
}

#[tokio::test]
async fn test_full_youtube_ladder_on_persistent_bot_detection() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::always(Reply::Fail(BOT_STDERR.to_string())));

    let err = extractor(runner.clone(), dir.path())
        .extract(&SourceRequest::new(YOUTUBE_URL))
        .await
        .unwrap_err();

    assert_eq!(runner.call_count(), 6);
    assert_eq!(err.signature(), Some(FailureKind::BotDetection));

    let calls = runner.calls();
    let with_cookies = calls.iter().filter(|args| args.contains(&"--cookies".to_string())).count();
    assert_eq!(with_cookies, 2);
    assert!(calls[5].contains(&"--impersonate".to_string()));
}

#[tokio::test]
async fn test_vimeo_auth_maps_to_sign_in_message() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::always(Reply::Fail(VIMEO_AUTH_STDERR.to_string())));

    let err = extractor(runner.clone(), dir.path())
        .extract(&SourceRequest::new("https://vimeo.com/123456"))
        .await
        .unwrap_err();
    assert_eq!(runner.call_count(), 4);

    let app: AppError = err.into();
    match &app {
        AppError::StrategyExhausted { platform, signature } => {
            assert_eq!(*platform, Platform::Vimeo);
            assert_eq!(*signature, Some(FailureKind::AuthRequired));
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert!(app.user_message().contains("signing in"));
    assert!(!app.user_message().contains("registered users"));
}

#[tokio::test]
async fn test_timeouts_escalate_until_success() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::sequence(vec![
        Reply::Timeout,
        Reply::Timeout,
        Reply::Json(youtube_json("late")),
    ]));

    let raw = extractor(runner.clone(), dir.path())
        .extract(&SourceRequest::new(YOUTUBE_URL))
        .await
        .unwrap();
    assert_eq!(raw.strategy, "client-spoof:ios");
    assert_eq!(raw.attempts, 3);
}

#[tokio::test]
async fn test_cookie_jar_materialized_once_and_reused() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::always(Reply::Fail(BOT_STDERR.to_string())));

    let _ = extractor(runner.clone(), dir.path())
        .extract(&SourceRequest::new(YOUTUBE_URL))
        .await;

    let jar = dir.path().join("cookies.txt");
    let content = std::fs::read_to_string(&jar).unwrap();
    assert!(content.starts_with("# Netscape HTTP Cookie File"));

    let jar_args: Vec<String> = runner
        .calls()
        .iter()
        .filter_map(|args| {
            args.iter()
                .position(|a| a == "--cookies")
                .map(|i| args[i + 1].clone())
        })
        .collect();
    assert_eq!(jar_args, vec![jar.to_string_lossy().to_string(); 2]);
}
