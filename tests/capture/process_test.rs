//! Tests for capture process spawning against real child processes.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use tracecap::assets::Assets;
use tracecap::atrace::{AtraceOptions, CaptureProcess};
use tracecap::capture::{capture_process, CaptureError};
use tracecap::config::CaptureConfig;

fn sh(script: &str, extra: &[&str]) -> CaptureProcess {
    let mut args = vec!["-c".to_string(), script.to_string(), "sh".to_string()];
    args.extend(extra.iter().map(|s| (*s).to_string()));
    CaptureProcess::spawn_with_binary("sh", &args).unwrap()
}

#[test]
fn atrace_args_always_request_compression() {
    let args = AtraceOptions::new().cpu_sched(false).time_secs(10).build_args();
    assert_eq!(args, vec!["shell", "atrace", "-z", "-t", "10"]);
}

#[tokio::test]
async fn spawn_missing_adb_is_spawn_error() {
    let err = CaptureProcess::spawn("/nonexistent/adb", &AtraceOptions::new()).unwrap_err();
    let err: CaptureError = err.into();
    assert!(matches!(err, CaptureError::Spawn(_)));
}

#[tokio::test]
async fn captures_from_real_process() {
    let dir = tempfile::tempdir().unwrap();
    let payload_path = dir.path().join("payload.z");
    let output = dir.path().join("trace.html");

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(b"hello\nworld\n").unwrap();
    std::fs::write(&payload_path, encoder.finish().unwrap()).unwrap();

    let process = sh(
        r#"printf 'starting\n'; printf 'adb: warning\n' >&2; printf 'TRACE:\n'; cat "$1""#,
        &[payload_path.to_str().unwrap()],
    );

    let mut status = Vec::new();
    let mut relay = Vec::new();
    let outcome = capture_process(
        process,
        &CaptureConfig::default(),
        output.clone(),
        Assets::default(),
        &mut status,
        &mut relay,
    )
    .await
    .unwrap();

    assert_eq!(outcome.payload_bytes, 12);
    assert_eq!(status, b"starting\ndownloading trace...");
    assert_eq!(relay, b"adb: warning\n");
    let html = std::fs::read_to_string(&output).unwrap();
    assert!(html.contains("hello\\n\\\nworld\\n\\\n"));
    assert!(html.ends_with("</html>\n"));
}

#[tokio::test]
async fn real_process_failure_reports_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("trace.html");
    let process = sh("printf 'TRACE:\\n'; exit 3", &[]);

    let mut status = Vec::new();
    let failure = capture_process(
        process,
        &CaptureConfig::default(),
        output.clone(),
        Assets::default(),
        &mut status,
        std::io::sink(),
    )
    .await
    .unwrap_err();

    assert!(matches!(failure.error, CaptureError::NonZeroExit { code: 3 }));
    assert_eq!(failure.partial_output.as_deref(), Some(output.as_path()));
    let html = std::fs::read_to_string(&output).unwrap();
    assert!(!html.contains("</html>"));
}

#[tokio::test]
async fn real_process_without_marker_leaves_no_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("trace.html");
    let process = sh("printf 'error: no devices found\\n'", &[]);

    let mut status = Vec::new();
    let failure = capture_process(
        process,
        &CaptureConfig::default(),
        output.clone(),
        Assets::default(),
        &mut status,
        std::io::sink(),
    )
    .await
    .unwrap_err();

    assert!(matches!(failure.error, CaptureError::NoMarkerSeen));
    assert!(failure.partial_output.is_none());
    assert!(!output.exists());
}
