//! Frame hand-off to the projector and exposure acknowledgment.
//!
//! The controller publishes each frame to a [`DisplaySink`] and then waits
//! for the frame's sequence id to show up on the sink's acknowledgment
//! channel. Where the acknowledgment comes from (a timer, the browser that
//! drives the projector, or an operator key press) is the sink's business.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use dlprint_slicer::Frame;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::error::DisplayError;

/// What the display is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayStatus {
    /// Id of the current frame.
    pub sequence_id: u64,
    /// Its exposure.
    pub duration: Duration,
    /// Exposure left, counted from publication.
    pub remaining: Duration,
}

/// Destination for layer frames.
pub trait DisplaySink: Send + Sync {
    /// Replace the current frame.
    fn publish(&self, frame: Arc<Frame>) -> Result<(), DisplayError>;

    /// The current frame's id and timing, if any frame was published.
    fn poll_status(&self) -> Option<DisplayStatus>;

    /// Channel carrying the highest acknowledged sequence id (0 = none).
    fn subscribe_acknowledgments(&self) -> watch::Receiver<u64>;
}

/// Where acknowledgments for a [`FrameStore`] come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckMode {
    /// A timer fires `duration` after publication.
    #[default]
    Timer,
    /// The web client fetched the image and polled again at least `duration`
    /// later.
    Client,
    /// Someone calls [`FrameStore::acknowledge`] explicitly.
    Manual,
}

#[derive(Debug, Default)]
struct Current {
    frame: Option<Arc<Frame>>,
    published_at: Option<Instant>,
    fetched_at: Option<Instant>,
}

/// In-memory display sink shared with the web server.
///
/// Readers always see either the previous or the new frame in full.
#[derive(Debug)]
pub struct FrameStore {
    mode: AckMode,
    current: RwLock<Current>,
    acks: Arc<watch::Sender<u64>>,
}

impl FrameStore {
    /// Empty store acknowledging frames according to `mode`.
    pub fn new(mode: AckMode) -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            mode,
            current: RwLock::new(Current::default()),
            acks: Arc::new(tx),
        }
    }

    /// Acknowledgment source.
    pub fn mode(&self) -> AckMode {
        self.mode
    }

    /// The frame being shown.
    pub fn current(&self) -> Option<Arc<Frame>> {
        self.read().frame.clone()
    }

    /// The frame being shown, recording that the client has it.
    pub fn fetch_image(&self) -> Option<Arc<Frame>> {
        let mut cur = self.write();
        if cur.frame.is_some() && cur.fetched_at.is_none() {
            cur.fetched_at = Some(Instant::now());
        }
        cur.frame.clone()
    }

    /// `"<sequence_id> <duration_ms>"` for the polling client, `None` before
    /// the first frame.
    ///
    /// In [`AckMode::Client`] a poll arriving at least one exposure after the
    /// image was fetched acknowledges the frame.
    pub fn info_line(&self) -> Option<String> {
        let cur = self.read();
        let frame = cur.frame.as_ref()?;
        let line = format!("{} {}", frame.sequence_id(), frame.duration().as_millis());
        if self.mode == AckMode::Client {
            if let Some(fetched) = cur.fetched_at {
                if fetched.elapsed() >= frame.duration() {
                    acknowledge(&self.acks, frame.sequence_id());
                }
            }
        }
        Some(line)
    }

    /// Acknowledge frame `sequence_id`. Older ids are ignored.
    pub fn acknowledge(&self, sequence_id: u64) -> bool {
        acknowledge(&self.acks, sequence_id)
    }

    /// Acknowledge whatever is being shown now; returns its id.
    pub fn acknowledge_current(&self) -> Option<u64> {
        let id = self.current()?.sequence_id();
        self.acknowledge(id);
        Some(id)
    }

    /// Highest acknowledged id.
    pub fn last_acknowledged(&self) -> u64 {
        *self.acks.borrow()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Current> {
        self.current.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Current> {
        self.current.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new(AckMode::default())
    }
}

impl DisplaySink for FrameStore {
    fn publish(&self, frame: Arc<Frame>) -> Result<(), DisplayError> {
        let sequence_id = frame.sequence_id();
        let duration = frame.duration();

        if self.mode == AckMode::Timer {
            let handle = tokio::runtime::Handle::try_current().map_err(|_| DisplayError::NoRuntime)?;
            let acks = Arc::clone(&self.acks);
            handle.spawn(async move {
                tokio::time::sleep(duration).await;
                acknowledge(&acks, sequence_id);
            });
        }

        let mut cur = self.write();
        cur.frame = Some(frame);
        cur.published_at = Some(Instant::now());
        cur.fetched_at = None;
        debug!(sequence_id, duration_ms = duration.as_millis() as u64, "frame published");
        Ok(())
    }

    fn poll_status(&self) -> Option<DisplayStatus> {
        let cur = self.read();
        let frame = cur.frame.as_ref()?;
        let elapsed = cur.published_at.map(|t| t.elapsed()).unwrap_or_default();
        Some(DisplayStatus {
            sequence_id: frame.sequence_id(),
            duration: frame.duration(),
            remaining: frame.duration().saturating_sub(elapsed),
        })
    }

    fn subscribe_acknowledgments(&self) -> watch::Receiver<u64> {
        self.acks.subscribe()
    }
}

fn acknowledge(acks: &watch::Sender<u64>, sequence_id: u64) -> bool {
    let advanced = acks.send_if_modified(|last| {
        if sequence_id > *last {
            *last = sequence_id;
            true
        } else {
            false
        }
    });
    if advanced {
        trace!(sequence_id, "frame acknowledged");
    }
    advanced
}
