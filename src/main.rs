//! tracecap - Capture Android system traces into self-contained HTML.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tracecap::assets::AssetMode;
use tracecap::atrace::AtraceOptions;
use tracecap::capture::run_capture;
use tracecap::config::{ConfigLoader, TracecapConfig};
use tracecap::display;
use tracecap::tags::TagSet;

#[derive(Parser)]
#[command(
    name = "tracecap",
    about = "Capture a system-wide Android trace into an HTML file",
    version
)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Write HTML to FILE.
    #[arg(short = 'o', value_name = "FILE")]
    output: Option<PathBuf>,

    /// Trace for N seconds.
    #[arg(short = 't', long = "time", value_name = "N",
          value_parser = clap::value_parser!(u32).range(1..))]
    time: Option<u32>,

    /// Use a trace buffer size of N KB.
    #[arg(short = 'b', long = "buf-size", value_name = "N",
          value_parser = clap::value_parser!(u32).range(1..))]
    buf_size: Option<u32>,

    /// Trace disk I/O (requires root).
    #[arg(short = 'd', long = "disk")]
    disk: bool,

    /// Trace CPU frequency changes.
    #[arg(short = 'f', long = "cpu-freq")]
    cpu_freq: bool,

    /// Trace CPU idle events.
    #[arg(short = 'i', long = "cpu-idle")]
    cpu_idle: bool,

    /// Trace CPU load.
    #[arg(short = 'l', long = "cpu-load")]
    cpu_load: bool,

    /// Inhibit tracing the CPU scheduler (allows longer trace times by
    /// reducing the data rate into the buffer).
    #[arg(short = 's', long = "no-cpu-sched")]
    no_cpu_sched: bool,

    /// Trace the kernel workqueues (requires root).
    #[arg(short = 'w', long = "workqueue")]
    workqueue: bool,

    /// Set the enabled trace tags and exit; a comma separated list of:
    /// gfx, input, view, webview, wm, am, sync, audio, video, camera.
    #[arg(long = "set-tags", value_name = "TAGS")]
    set_tags: Option<String>,

    /// Link to the original CSS and JS resources instead of embedding them.
    #[arg(long = "link-assets")]
    link_assets: bool,

    /// Read configuration from PATH instead of the default locations.
    #[arg(long = "config", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn atrace_options(&self) -> AtraceOptions {
        let mut options = AtraceOptions::new()
            .disk(self.disk)
            .cpu_freq(self.cpu_freq)
            .cpu_idle(self.cpu_idle)
            .cpu_load(self.cpu_load)
            .cpu_sched(!self.no_cpu_sched)
            .workqueue(self.workqueue);
        if let Some(secs) = self.time {
            options = options.time_secs(secs);
        }
        if let Some(kb) = self.buf_size {
            options = options.buffer_kb(kb);
        }
        options
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn set_tags(config: &TracecapConfig, list: &str) -> ExitCode {
    let tags = match TagSet::parse(list) {
        Ok(tags) => tags,
        Err(e) => {
            display::print_error(&e.to_string());
            return ExitCode::from(2);
        }
    };
    if let Err(e) = tags.apply(&config.adb).await {
        display::print_error(&e.to_string());
    }
    display::print_tags_set(&tags);
    ExitCode::SUCCESS
}

async fn capture(config: &TracecapConfig, cli: &Cli) -> ExitCode {
    let output = cli.output.clone().unwrap_or_else(|| config.output.clone());
    let mode = if cli.link_assets {
        AssetMode::Link
    } else {
        AssetMode::Embed
    };
    let options = cli.atrace_options();
    tracing::info!(
        output = %output.display(),
        mode = ?mode,
        args = ?options.build_args(),
        "Starting capture"
    );

    match run_capture(config, &options, output, mode).await {
        Ok(outcome) => {
            display::print_trace_written(&outcome);
            ExitCode::SUCCESS
        }
        Err(failure) => {
            display::print_capture_error(&failure.error, failure.partial_output.as_deref());
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let loader = cli
        .config
        .clone()
        .map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let config = match loader.load() {
        Ok(config) => config,
        Err(e) => {
            display::print_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };

    if let Some(list) = &cli.set_tags {
        return set_tags(&config, list).await;
    }
    capture(&config, &cli).await
}
