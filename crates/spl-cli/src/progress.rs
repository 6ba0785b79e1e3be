use std::sync::Arc;

use colored::Colorize;
use spl_types::{format_bytes_count, ProgressEvent, ProgressFn};

/// Progress callback rendering to stderr.
pub fn reporter() -> ProgressFn {
    Arc::new(|event: &ProgressEvent<'_>| eprint!("{}", render(event)))
}

fn render(event: &ProgressEvent<'_>) -> String {
    match *event {
        ProgressEvent::File { path, percent } => {
            let line = format!("\r{}  {}", format!("{percent:>3}%").bold(), path.display());
            if percent == 100 {
                line + "\n"
            } else {
                line
            }
        }
        ProgressEvent::Throughput { bytes_per_sec } => {
            format!("\r  {} {}/s\n", "throughput".dimmed(), format_bytes_count(bytes_per_sec).cyan())
        }
        ProgressEvent::Chunk { index, size } => {
            format!(
                "\r  {} #{index} ({})\n",
                "chunk".dimmed(),
                format_bytes_count(size as f64).cyan()
            )
        }
    }
}
