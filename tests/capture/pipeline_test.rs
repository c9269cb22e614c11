//! End-to-end tests for the capture pipeline with scripted channels.

use std::io::Write;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use tokio_test::io::{Builder, Mock};

use tracecap::assets::Assets;
use tracecap::atrace::ExitFuture;
use tracecap::capture::{
    CaptureError, CaptureOutcome, CaptureState, ChannelMultiplexer, SessionController,
};
use tracecap::config::CaptureConfig;

const SUFFIX_END: &str = "</html>\n";

fn compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn assets() -> Assets {
    Assets {
        css: "<style type=\"text/css\">.timeline{}</style>".to_string(),
        js: "<script language=\"javascript\">var viewer;</script>".to_string(),
    }
}

fn exit_with(code: i32) -> ExitFuture {
    Box::pin(async move { Ok(code) })
}

fn reads(chunks: &[&[u8]]) -> Mock {
    let mut builder = Builder::new();
    for chunk in chunks {
        builder.read(chunk);
    }
    builder.build()
}

struct Run {
    result: Result<CaptureOutcome, CaptureError>,
    state: CaptureState,
    exit_code: Option<i32>,
    partial: Option<PathBuf>,
    status: String,
    relay: Vec<u8>,
}

async fn run(
    config: &CaptureConfig,
    output: &Path,
    primary: Mock,
    diagnostic: Mock,
    code: i32,
) -> Run {
    let mut status = Vec::new();
    let mut mux = ChannelMultiplexer::new(primary, diagnostic, exit_with(code), Vec::new());
    let (result, state, exit_code, partial) = {
        let mut controller =
            SessionController::new(config, output.to_path_buf(), assets(), &mut status);
        let result = controller.run(&mut mux).await;
        (
            result,
            controller.state(),
            controller.exit_code(),
            controller.partial_output().map(Path::to_path_buf),
        )
    };
    Run {
        result,
        state,
        exit_code,
        partial,
        status: String::from_utf8(status).unwrap(),
        relay: mux.into_relay(),
    }
}

fn output_in(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("trace.html")
}

fn sample_trace() -> Vec<u8> {
    (0..4000)
        .map(|i| format!("     kworker/0:1-{i:05} [000] 100.{i:06}: workqueue_execute_start\n"))
        .collect::<String>()
        .into_bytes()
}

#[tokio::test]
async fn successful_capture_writes_well_formed_document() {
    let dir = tempfile::tempdir().unwrap();
    let output = output_in(&dir);
    let payload = compress(b"hello\nworld\n");
    let mut first = b"starting\nTRACE:\n".to_vec();
    first.extend_from_slice(&payload);

    let run = run(
        &CaptureConfig::default(),
        &output,
        reads(&[first.as_slice()]),
        reads(&[]),
        0,
    )
    .await;

    let outcome = run.result.unwrap();
    assert_eq!(outcome.output, output);
    assert_eq!(outcome.payload_bytes, 12);
    assert_eq!(run.state, CaptureState::Finished);
    assert_eq!(run.exit_code, Some(0));
    assert!(run.partial.is_none());
    assert_eq!(run.status, "starting\ndownloading trace...");

    let html = std::fs::read_to_string(&output).unwrap();
    assert!(html.starts_with("<!DOCTYPE HTML>"));
    assert!(html.contains(".timeline{}"));
    assert!(html.contains("var linuxPerfData = \"\\\nhello\\n\\\nworld\\n\\\n"));
    assert!(html.ends_with(SUFFIX_END));
}

#[tokio::test]
async fn marker_split_across_reads_is_recognized_and_hidden() {
    let dir = tempfile::tempdir().unwrap();
    let output = output_in(&dir);
    let mut second = b"E:\n".to_vec();
    second.extend_from_slice(&compress(b"split\n"));

    let run = run(
        &CaptureConfig::default(),
        &output,
        reads(&[&b"capturing trace...\nTRAC"[..], second.as_slice()]),
        reads(&[]),
        0,
    )
    .await;

    assert!(run.result.is_ok());
    assert!(!run.status.contains("TRAC\n"));
    assert_eq!(run.status, "capturing trace...\ndownloading trace...");
    let html = std::fs::read_to_string(&output).unwrap();
    assert!(html.contains("split\\n\\\n"));
}

#[tokio::test]
async fn payload_split_into_small_reads_matches_input() {
    let dir = tempfile::tempdir().unwrap();
    let output = output_in(&dir);
    let trace = sample_trace();
    let mut stream = b"TRACE:\r\n".to_vec();
    stream.extend_from_slice(&compress(&trace));
    let chunks: Vec<&[u8]> = stream.chunks(333).collect();

    let run = run(
        &CaptureConfig::default(),
        &output,
        reads(&chunks),
        reads(&[]),
        0,
    )
    .await;

    assert_eq!(run.result.unwrap().payload_bytes, trace.len() as u64);
    let html = std::fs::read_to_string(&output).unwrap();
    let escaped = String::from_utf8(trace).unwrap().replace('\n', "\\n\\\n");
    assert!(html.contains(&escaped));
}

#[tokio::test]
async fn non_zero_exit_after_marker_leaves_partial_document() {
    let dir = tempfile::tempdir().unwrap();
    let output = output_in(&dir);
    let compressed = compress(&sample_trace());
    let mut stream = b"TRACE:\n".to_vec();
    stream.extend_from_slice(&compressed[..compressed.len() / 2]);

    let run = run(
        &CaptureConfig::default(),
        &output,
        reads(&[stream.as_slice()]),
        reads(&[]),
        1,
    )
    .await;

    let err = run.result.unwrap_err();
    assert!(matches!(err, CaptureError::NonZeroExit { code: 1 }));
    assert!(err.to_string().contains("error code 1"));
    assert_eq!(run.state, CaptureState::Failed);
    assert_eq!(run.exit_code, Some(1));
    assert_eq!(run.partial.as_deref(), Some(output.as_path()));

    let html = std::fs::read_to_string(&output).unwrap();
    assert!(html.contains("var linuxPerfData"));
    assert!(html.contains("kworker/0:1-00000"));
    assert!(!html.contains(SUFFIX_END));
}

#[tokio::test]
async fn exit_without_marker_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let output = output_in(&dir);

    let run = run(
        &CaptureConfig::default(),
        &output,
        reads(&[&b"capturing trace..."[..], &b" done\nerror: trace buffer empty"[..]]),
        reads(&[]),
        0,
    )
    .await;

    let err = run.result.unwrap_err();
    assert!(matches!(err, CaptureError::NoMarkerSeen));
    assert!(!err.to_string().contains("error code"));
    assert_eq!(run.state, CaptureState::Failed);
    assert!(run.partial.is_none());
    assert!(!output.exists());
    assert_eq!(
        run.status,
        "capturing trace... done\nerror: trace buffer empty\n"
    );
}

#[tokio::test]
async fn non_zero_exit_before_marker_reports_code() {
    let dir = tempfile::tempdir().unwrap();
    let output = output_in(&dir);

    let run = run(
        &CaptureConfig::default(),
        &output,
        reads(&[]),
        reads(&[&b"error: device not found\n"[..]]),
        255,
    )
    .await;

    assert!(matches!(
        run.result,
        Err(CaptureError::NonZeroExit { code: 255 })
    ));
    assert!(!output.exists());
    assert_eq!(run.relay, b"error: device not found\n");
}

#[tokio::test]
async fn read_error_mid_capture_leaves_partial_document() {
    let dir = tempfile::tempdir().unwrap();
    let output = output_in(&dir);
    let compressed = compress(&sample_trace());
    let mut stream = b"TRACE:\n".to_vec();
    stream.extend_from_slice(&compressed[..compressed.len() / 2]);

    let primary = Builder::new()
        .read(&stream)
        .read_error(std::io::Error::new(ErrorKind::BrokenPipe, "device disconnected"))
        .build();
    let run = run(&CaptureConfig::default(), &output, primary, reads(&[]), 0).await;

    let err = run.result.unwrap_err();
    assert!(matches!(err, CaptureError::ChannelRead { channel: "stdout", .. }));
    assert_eq!(run.state, CaptureState::Failed);
    assert!(run.exit_code.is_none());
    assert_eq!(run.partial.as_deref(), Some(output.as_path()));

    let html = std::fs::read_to_string(&output).unwrap();
    assert!(html.contains("var linuxPerfData"));
    assert!(html.contains("kworker/0:1-00000"));
    assert!(!html.contains(SUFFIX_END));
}

#[tokio::test]
async fn malformed_payload_fails_without_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let output = output_in(&dir);

    let run = run(
        &CaptureConfig::default(),
        &output,
        reads(&[&b"TRACE:\n"[..], &b"definitely not zlib"[..], &b"more bytes"[..]]),
        reads(&[]),
        0,
    )
    .await;

    assert!(matches!(run.result, Err(CaptureError::Decompression(_))));
    assert_eq!(run.state, CaptureState::Failed);
    assert_eq!(run.partial.as_deref(), Some(output.as_path()));
    let html = std::fs::read_to_string(&output).unwrap();
    assert!(html.ends_with("var linuxPerfData = \"\\\n"));
}

#[tokio::test]
async fn pty_newlines_are_translated_when_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let output = output_in(&dir);
    let trace = sample_trace();
    let mut mangled = Vec::new();
    for b in compress(&trace) {
        if b == b'\n' {
            mangled.push(b'\r');
        }
        mangled.push(b);
    }
    let mut stream = b"TRACE:\r\n".to_vec();
    stream.extend_from_slice(&mangled);
    let chunks: Vec<&[u8]> = stream.chunks(1000).collect();

    let config = CaptureConfig {
        translate_crlf: true,
        ..CaptureConfig::default()
    };
    let run = run(&config, &output, reads(&chunks), reads(&[]), 0).await;

    assert_eq!(run.result.unwrap().payload_bytes, trace.len() as u64);
}

#[tokio::test]
async fn custom_marker_is_honored() {
    let dir = tempfile::tempdir().unwrap();
    let output = output_in(&dir);
    let mut stream = b"TRACE:\nPAYLOAD:\n".to_vec();
    stream.extend_from_slice(&compress(b"x\n"));

    let config = CaptureConfig {
        marker: "PAYLOAD:".to_string(),
        ..CaptureConfig::default()
    };
    let run = run(&config, &output, reads(&[stream.as_slice()]), reads(&[]), 0).await;

    assert!(run.result.is_ok());
    assert!(run.status.starts_with("TRACE:\n"));
}
