//! Progress bars for transfers
//!
//! Hidden in quiet or JSON mode and when `--no-progress` is given.

use super::OutputConfig;

const BYTES_TEMPLATE: &str =
    "{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg} ({eta})";

/// Byte-count progress bar for a transfer
///
/// Safe to update from concurrently running part uploads.
#[derive(Debug)]
pub struct TransferProgress {
    bar: Option<indicatif::ProgressBar>,
}

impl TransferProgress {
    /// Progress bar over `total` bytes
    pub fn new(config: &OutputConfig, total: u64) -> Self {
        if config.quiet || config.json || config.no_progress {
            return Self { bar: None };
        }

        let bar = indicatif::ProgressBar::new(total);
        if let Ok(style) = indicatif::ProgressStyle::default_bar().template(BYTES_TEMPLATE) {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar: Some(bar) }
    }

    pub fn inc(&self, delta: u64) {
        if let Some(bar) = &self.bar {
            bar.inc(delta);
        }
    }

    pub fn set_message(&self, message: impl Into<String>) {
        if let Some(bar) = &self.bar {
            bar.set_message(message.into());
        }
    }

    pub fn finish_and_clear(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }

    /// Stop the bar where it is, leaving it on screen
    pub fn abandon(&self) {
        if let Some(bar) = &self.bar {
            bar.abandon();
        }
    }

    pub fn is_visible(&self) -> bool {
        self.bar.is_some()
    }
}
