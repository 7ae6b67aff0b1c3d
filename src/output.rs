use std::io::{self, Write};

use serde::Serialize;

use crate::app::{BuildResult, ProgressEvent, ProgressSink, SourceStatus};
use crate::exif::ExifResult;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_build(result: &BuildResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_exif(result: &ExifResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Progress lines on stderr, kept apart from `WARN` log lines by the `==>`
/// prefix.
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("==> {} ({} ms)", event.message, elapsed.as_millis()),
            None => eprintln!("==> {}", event.message),
        }
    }
}

pub fn print_build_summary(result: &BuildResult) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let red = "\x1b[31m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!("{cyan}Dataset summary{reset}");
    for source in &result.sources {
        match source.status {
            SourceStatus::Collected => {
                let color = if source.skipped > 0 { yellow } else { green };
                println!(
                    "{color}  {:<10} {} records from {}/{} items, {} skipped ({}){reset}",
                    source.source,
                    source.records,
                    source.selected,
                    source.available,
                    source.skipped,
                    source.origin.as_deref().unwrap_or("-"),
                );
            }
            SourceStatus::Failed => {
                println!(
                    "{red}  {:<10} failed: {}{reset}",
                    source.source,
                    source.error.as_deref().unwrap_or("unknown error"),
                );
            }
        }
    }
    println!(
        "{green}Manifest written with {} entries at {}{reset}",
        result.rows, result.manifest_path
    );
}

pub fn print_exif_summary(result: &ExifResult) {
    let green = "\x1b[32m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    for failure in &result.failed {
        println!("{red}  {} failed: {}{reset}", failure.file, failure.message);
    }
    println!(
        "{green}EXIF rewritten for {} images in {}{reset}",
        result.written.len(),
        result.output_dir
    );
}
