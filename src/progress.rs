/*!
 * Batch progress notifications.
 *
 * One `batch_size` event before processing starts, then one
 * `processing_next` event per pair as it begins. Reporters must return
 * immediately and swallow their own failures: a lost notification never
 * affects the batch.
 */

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use std::fmt::Debug;
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedSender;

use crate::batch_matcher::FilePair;

/// Receives fire-and-forget progress events
pub trait ProgressReporter: Send + Sync + Debug {
    /// Total number of matched pairs
    fn batch_size(&self, total: usize);

    /// Pair `index` (zero-based) is about to be processed
    fn processing_next(&self, index: usize, pair: &FilePair);

    /// Every pair has been handled
    fn finished(&self) {}
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn batch_size(&self, _total: usize) {}
    fn processing_next(&self, _index: usize, _pair: &FilePair) {}
}

/// Writes events to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn batch_size(&self, total: usize) {
        info!("Batch contains {} file(s)", total);
    }

    fn processing_next(&self, index: usize, pair: &FilePair) {
        info!("[{}] Processing {}", index + 1, pair.video.display());
    }
}

/// Progress event forwarded over a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    BatchSize(usize),
    ProcessingNext { index: usize, video: PathBuf },
    Finished,
}

/// Forwards events to an unbounded channel, e.g. for a front end
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    sender: UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new(sender: UnboundedSender<ProgressEvent>) -> Self {
        Self { sender }
    }

    fn send(&self, event: ProgressEvent) {
        if self.sender.send(event).is_err() {
            debug!("Progress receiver dropped, event discarded");
        }
    }
}

impl ProgressReporter for ChannelProgress {
    fn batch_size(&self, total: usize) {
        self.send(ProgressEvent::BatchSize(total));
    }

    fn processing_next(&self, index: usize, pair: &FilePair) {
        self.send(ProgressEvent::ProcessingNext {
            index,
            video: pair.video.clone(),
        });
    }

    fn finished(&self) {
        self.send(ProgressEvent::Finished);
    }
}

/// Terminal progress bar
#[derive(Debug, Clone)]
pub struct TerminalProgress {
    bar: ProgressBar,
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style.progress_chars("█▓▒░"));
        Self { bar }
    }
}

impl ProgressReporter for TerminalProgress {
    fn batch_size(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
    }

    fn processing_next(&self, index: usize, pair: &FilePair) {
        let name = pair
            .video
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        self.bar.set_position(index as u64);
        self.bar.set_message(format!("Processing: {}", name));
    }

    fn finished(&self) {
        let total = self.bar.length().unwrap_or(0);
        self.bar.set_position(total);
        self.bar.finish_with_message("Batch processing complete");
    }
}
