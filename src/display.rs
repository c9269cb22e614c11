//! Colored terminal output for capture results.

use std::io::{self, Write};
use std::path::Path;

use owo_colors::OwoColorize;

use crate::capture::{CaptureError, CaptureOutcome};
use crate::tags::TagSet;

/// Build the `file://` URL for a written document.
#[must_use]
pub fn file_url(path: &Path) -> String {
    let absolute = std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf());
    format!("file://{}", absolute.display())
}

/// Finish the "downloading trace..." line and print where the trace went.
pub fn print_trace_written(outcome: &CaptureOutcome) {
    println!(
        " {}\n\n    wrote {}\n",
        "done".green().bold(),
        file_url(&outcome.output).cyan()
    );
    let _ = io::stdout().flush();
}

/// Print the terminal report for a failed capture.
pub fn print_capture_error(err: &CaptureError, partial_output: Option<&Path>) {
    if let Some(path) = partial_output {
        // Ends the open "downloading trace..." line.
        println!();
        eprintln!("{} {}", "[ERROR]".red().bold(), err.to_string().red());
        eprintln!(
            "{} partial trace left at {}",
            "[INFO]".yellow().bold(),
            path.display().dimmed()
        );
    } else {
        eprintln!("{} {}", "[ERROR]".red().bold(), err.to_string().red());
    }
}

/// Print a generic error without capture context.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message.red());
}

/// Print the confirmation after setting trace tags.
pub fn print_tags_set(tags: &TagSet) {
    println!(
        "\nSet enabled tags to: {}\n",
        tags.names().join(", ").cyan()
    );
    println!(
        "You will likely need to restart the Android framework for this to take effect:\n\n    {}\n    {}\n",
        "adb shell stop".bold(),
        "adb shell start".bold()
    );
    let _ = io::stdout().flush();
}
