//! End-to-end runs against the platform watcher and a shell-script tool.

#![cfg(unix)]

use sdr_autoconvert::{ConversionSettings, ConverterError, WatchController, WatchSession};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn settings(tool_dir: &Path) -> ConversionSettings {
    let script = tool_dir.join("convert.sh");
    std::fs::write(&script, "cp \"$1\" \"$2\"\n").unwrap();

    ConversionSettings {
        tool: "sh".to_string(),
        tool_args: vec![script.to_string_lossy().into_owned()],
        settle_delay_ms: 50,
        poll_interval_ms: 10,
        readiness_timeout_ms: 2_000,
        ..Default::default()
    }
}

async fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[tokio::test]
async fn test_new_capture_is_converted_and_removed() {
    let tools = TempDir::new().unwrap();
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    let controller = WatchController::new(settings(tools.path()));
    controller
        .start(WatchSession::new(input.path(), output.path(), true))
        .await
        .unwrap();

    let source = input.path().join("Screenshot 2024-05-01.jxr");
    std::fs::write(&source, b"hdr pixels").unwrap();
    std::fs::write(input.path().join("notes.txt"), b"ignored").unwrap();

    let converted = output.path().join("Screenshot 2024-05-01-sdr.jpg");
    assert!(wait_for(|| converted.is_file() && !source.exists()).await);
    assert_eq!(std::fs::read(&converted).unwrap(), b"hdr pixels");
    assert!(input.path().join("notes.txt").exists());
    assert!(!output.path().join("notes-sdr.jpg").exists());

    controller.stop().await.unwrap();
}

#[tokio::test]
async fn test_originals_kept_without_delete_flag() {
    let tools = TempDir::new().unwrap();
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    let controller = WatchController::new(settings(tools.path()));
    controller
        .start(WatchSession::new(input.path(), output.path(), false))
        .await
        .unwrap();

    let source = input.path().join("photo.jxr");
    std::fs::write(&source, b"hdr").unwrap();

    let converted = output.path().join("photo-sdr.jpg");
    assert!(wait_for(|| converted.is_file()).await);
    assert!(source.exists());

    controller.stop().await.unwrap();
}

#[tokio::test]
async fn test_invalid_directories_leave_controller_stopped() {
    let tools = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let controller = WatchController::new(settings(tools.path()));

    let err = controller
        .start(WatchSession::new("", output.path(), false))
        .await
        .unwrap_err();
    assert!(matches!(err, ConverterError::InvalidConfiguration(_)));

    let err = controller
        .start(WatchSession::new(output.path().join("missing"), output.path(), false))
        .await
        .unwrap_err();
    assert!(matches!(err, ConverterError::InvalidConfiguration(_)));

    assert!(!controller.is_running().await);
}

#[tokio::test]
async fn test_files_created_after_stop_are_left_alone() {
    let tools = TempDir::new().unwrap();
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let session = WatchSession::new(input.path(), output.path(), true);

    let controller = WatchController::new(settings(tools.path()));
    assert!(controller.toggle(session.clone()).await.unwrap());
    assert!(matches!(
        controller.start(session.clone()).await,
        Err(ConverterError::AlreadyRunning(_))
    ));
    assert!(!controller.toggle(session).await.unwrap());
    controller.stop().await.unwrap();

    let source = input.path().join("late.jxr");
    std::fs::write(&source, b"hdr").unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(source.exists());
    assert!(!output.path().join("late-sdr.jpg").exists());
}
