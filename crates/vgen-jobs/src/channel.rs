//! Push channel between a running job and its caller.
//!
//! The job side holds a [`ProgressReporter`]; the transport side consumes a
//! [`ProgressStream`]. The stream yields job events in order, interleaves a
//! keep-alive whenever nothing was sent for one interval, and ends right
//! after the first terminal event. Dropping the stream stops the keep-alive
//! timer with it.

use std::pin::Pin;
use std::time::Duration;

use futures_util::stream::{self, Stream};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::debug;

use vgen_models::JobEvent;

/// Error sent when the job side goes away without a terminal event.
const ABANDONED_MESSAGE: &str = "Internal server error.";

/// One item on the caller-facing stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelItem {
    Event(JobEvent),
    KeepAlive,
}

pub type ProgressStream = Pin<Box<dyn Stream<Item = ChannelItem> + Send>>;

/// Job-side handle of the push channel.
///
/// `complete` and `fail` consume the reporter, so at most one terminal
/// event can be sent.
#[derive(Debug)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<JobEvent>,
}

impl ProgressReporter {
    pub fn progress(&self, percent: u8, status: &str) {
        self.send(JobEvent::progress(percent, status));
    }

    pub fn complete(self, url: &str, name: &str) {
        self.send(JobEvent::complete(url, name));
    }

    pub fn fail(self, message: &str) {
        self.send(JobEvent::error(message));
    }

    /// Whether the caller has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, event: JobEvent) {
        if self.tx.send(event).is_err() {
            debug!("Progress channel closed, event dropped");
        }
    }
}

struct StreamState {
    rx: mpsc::UnboundedReceiver<JobEvent>,
    ticker: Interval,
    finished: bool,
}

/// Open a channel whose stream emits a keep-alive after `keepalive` of
/// silence.
pub fn progress_channel(keepalive: Duration) -> (ProgressReporter, ProgressStream) {
    let (tx, rx) = mpsc::unbounded_channel();

    let mut ticker = interval_at(Instant::now() + keepalive, keepalive);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let state = StreamState {
        rx,
        ticker,
        finished: false,
    };

    let stream = stream::unfold(state, |mut state| async move {
        if state.finished {
            return None;
        }

        tokio::select! {
            msg = state.rx.recv() => {
                let event = match msg {
                    Some(event) => event,
                    // Reporter dropped without a terminal event
                    None => JobEvent::error(ABANDONED_MESSAGE),
                };
                state.finished = event.is_terminal();
                state.ticker.reset();
                Some((ChannelItem::Event(event), state))
            }
            _ = state.ticker.tick() => Some((ChannelItem::KeepAlive, state)),
        }
    });

    (ProgressReporter { tx }, Box::pin(stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_after_idle_interval() {
        let (reporter, mut stream) = progress_channel(Duration::from_secs(15));

        let started = Instant::now();
        assert_eq!(stream.next().await, Some(ChannelItem::KeepAlive));
        assert_eq!(started.elapsed(), Duration::from_secs(15));

        assert_eq!(stream.next().await, Some(ChannelItem::KeepAlive));
        assert_eq!(started.elapsed(), Duration::from_secs(30));

        drop(reporter);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_reset_keepalive_timer() {
        let (reporter, mut stream) = progress_channel(Duration::from_secs(15));

        tokio::time::sleep(Duration::from_secs(10)).await;
        reporter.progress(10, "Processing image...");
        assert_eq!(
            stream.next().await,
            Some(ChannelItem::Event(JobEvent::progress(10, "Processing image...")))
        );

        let after_event = Instant::now();
        assert_eq!(stream.next().await, Some(ChannelItem::KeepAlive));
        assert_eq!(after_event.elapsed(), Duration::from_secs(15));

        drop(reporter);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_ends_after_terminal_event() {
        let (reporter, mut stream) = progress_channel(Duration::from_secs(15));

        reporter.progress(0, "Starting...");
        reporter.complete("http://localhost/download/v.mp4", "v.mp4");

        assert_eq!(
            stream.next().await,
            Some(ChannelItem::Event(JobEvent::progress(0, "Starting...")))
        );
        assert_eq!(
            stream.next().await,
            Some(ChannelItem::Event(JobEvent::complete(
                "http://localhost/download/v.mp4",
                "v.mp4"
            )))
        );
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_reporter_yields_single_error() {
        let (reporter, mut stream) = progress_channel(Duration::from_secs(15));

        reporter.progress(25, "Merging video...");
        drop(reporter);

        assert!(matches!(stream.next().await, Some(ChannelItem::Event(JobEvent::Progress { .. }))));
        assert_eq!(
            stream.next().await,
            Some(ChannelItem::Event(JobEvent::error(ABANDONED_MESSAGE)))
        );
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_reporter_survives_dropped_stream() {
        let (reporter, stream) = progress_channel(Duration::from_secs(15));
        drop(stream);

        assert!(reporter.is_closed());
        reporter.progress(50, "Rendering...");
        reporter.fail("Render failed completely.");
    }
}
