//! A minimal terminal spinner with a live status label.

use std::io::Write;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Braille spinner frames.
const FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Frame interval.
const INTERVAL: Duration = Duration::from_millis(80);

/// A terminal spinner that runs in a background task and writes to stderr.
///
/// The label can be changed while it spins with [`Spinner::set_label`].
pub struct Spinner {
    handle: JoinHandle<()>,
    label: watch::Sender<String>,
    cancel: CancellationToken,
}

impl Spinner {
    pub fn start(label: &str) -> Self {
        let (label_tx, label_rx) = watch::channel(label.to_string());
        let cancel = CancellationToken::new();
        let stop = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut i = 0;
            loop {
                let frame = FRAMES[i % FRAMES.len()];
                // \r moves to start of line, \x1b[2K clears the line
                eprint!("\x1b[2K\r{frame} {}", *label_rx.borrow());
                let _ = std::io::stderr().flush();

                tokio::select! {
                    _ = tokio::time::sleep(INTERVAL) => {}
                    _ = stop.cancelled() => break,
                }
                i += 1;
            }
            eprint!("\x1b[2K\r");
            let _ = std::io::stderr().flush();
        });

        Self {
            handle,
            label: label_tx,
            cancel,
        }
    }

    /// Replace the text shown next to the spinner.
    pub fn set_label(&self, label: impl Into<String>) {
        self.label.send_replace(label.into());
    }

    /// Stop the spinner and clear its line.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_single_braille_chars() {
        assert!(!FRAMES.is_empty());
        for frame in FRAMES {
            assert_eq!(frame.chars().count(), 1);
        }
    }

    #[tokio::test]
    async fn spinner_relabels_and_stops() {
        let spinner = Spinner::start("submitted");
        spinner.set_label("working · poll 1");
        assert_eq!(*spinner.label.borrow(), "working · poll 1");
        tokio::time::sleep(Duration::from_millis(200)).await;
        spinner.stop().await;
    }

    #[tokio::test]
    async fn spinner_immediate_stop() {
        let spinner = Spinner::start("quick");
        spinner.stop().await;
    }
}
