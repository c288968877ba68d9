//! Per-artifact lifecycle of the background sync.
//!
//! ```text
//! NotStarted -> Syncing -> UpToDate ----------------> Ready
//!                  |          \                         ^
//!                  |           -> Merging ---------------|
//!                  |-> Updated -> Merging -> Ready       |
//!                  |                  \-> Failed         |
//!                  \-> Failed
//! ```
//!
//! `UpToDate` and `Updated` may also drop straight to `Failed` when the
//! publish itself fails, so every run still settles.
//!
//! `Ready` can only be entered through [`Readiness::publish`], which stores the
//! [`CacheEntry`] before the ready flag is raised. Readers check the flag with
//! acquire ordering, so nobody observes `Ready` without the entry.

use crate::cache::CacheEntry;
use crate::error::{Error, ErrorKind, Result};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "state", content = "error")]
pub enum ReadinessState {
    NotStarted,
    Syncing,
    /// Local marker matched the remote one.
    UpToDate,
    /// A new payload was downloaded.
    Updated,
    Merging,
    Ready,
    Failed(ErrorKind),
}

impl ReadinessState {
    /// `Ready` or `Failed`: nothing further will happen in this process.
    pub fn is_terminal(self) -> bool {
        matches!(self, ReadinessState::Ready | ReadinessState::Failed(_))
    }

    fn can_move_to(self, next: ReadinessState) -> bool {
        use ReadinessState::*;
        matches!(
            (self, next),
            (NotStarted, Syncing)
                | (Syncing, UpToDate)
                | (Syncing, Updated)
                | (Syncing, Failed(_))
                | (UpToDate, Ready)
                | (UpToDate, Merging)
                | (UpToDate, Failed(_))
                | (Updated, Merging)
                | (Updated, Failed(_))
                | (Merging, Ready)
                | (Merging, Failed(_))
        )
    }
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadinessState::NotStarted => f.write_str("NotStarted"),
            ReadinessState::Syncing => f.write_str("Syncing"),
            ReadinessState::UpToDate => f.write_str("UpToDate"),
            ReadinessState::Updated => f.write_str("Updated"),
            ReadinessState::Merging => f.write_str("Merging"),
            ReadinessState::Ready => f.write_str("Ready"),
            ReadinessState::Failed(kind) => write!(f, "Failed({})", kind),
        }
    }
}

/// Readiness slot of one artifact, shared between its background worker and
/// the interception gate.
#[derive(Debug)]
pub struct Readiness {
    artifact: String,
    history: Mutex<Vec<ReadinessState>>,
    entry: RwLock<Option<Arc<CacheEntry>>>,
    ready: AtomicBool,
}

impl Readiness {
    pub fn new(artifact: impl Into<String>) -> Self {
        Self {
            artifact: artifact.into(),
            history: Mutex::new(vec![ReadinessState::NotStarted]),
            entry: RwLock::new(None),
            ready: AtomicBool::new(false),
        }
    }

    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    pub fn state(&self) -> ReadinessState {
        let history = self.history.lock().unwrap_or_else(|p| p.into_inner());
        history.last().copied().unwrap_or(ReadinessState::NotStarted)
    }

    /// Every state this artifact has been in, oldest first.
    pub fn history(&self) -> Vec<ReadinessState> {
        self.history
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Move to `next`. `Ready` is refused here; use [`publish`](Self::publish).
    pub fn transition(&self, next: ReadinessState) -> Result<()> {
        if next == ReadinessState::Ready {
            return Err(self.invalid(self.state(), next));
        }
        self.advance(next)
    }

    /// Enter `Failed(kind)`.
    pub fn fail(&self, kind: ErrorKind) -> Result<()> {
        let result = self.advance(ReadinessState::Failed(kind));
        if result.is_ok() {
            error!("Artifact '{}' failed ({})", self.artifact, kind);
        }
        result
    }

    /// Install `entry` and enter `Ready`.
    ///
    /// The entry reference is swapped in whole before the ready flag is raised.
    pub fn publish(&self, entry: CacheEntry) -> Result<()> {
        let mut history = self
            .history
            .lock()
            .map_err(|_| Error::Other("readiness lock poisoned".into()))?;
        let current = history.last().copied().unwrap_or(ReadinessState::NotStarted);
        if !current.can_move_to(ReadinessState::Ready) {
            return Err(self.invalid(current, ReadinessState::Ready));
        }

        {
            let mut slot = self
                .entry
                .write()
                .map_err(|_| Error::Other("overlay cache lock poisoned".into()))?;
            *slot = Some(Arc::new(entry));
        }
        self.ready.store(true, Ordering::Release);
        debug!("Artifact '{}': {} -> Ready", self.artifact, current);
        history.push(ReadinessState::Ready);
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// The published entry, or `None` while not `Ready`. Never blocks on the
    /// worker: the write lock is only held for a pointer swap.
    pub fn current(&self) -> Option<Arc<CacheEntry>> {
        if !self.is_ready() {
            return None;
        }
        self.entry.read().ok()?.clone()
    }

    /// Poll until the state is terminal or `timeout` elapses. Returns the last
    /// observed state.
    pub fn wait_until_settled(&self, poll_interval: Duration, timeout: Duration) -> ReadinessState {
        let deadline = Instant::now() + timeout;
        loop {
            let state = self.state();
            if state.is_terminal() || Instant::now() >= deadline {
                return state;
            }
            std::thread::sleep(poll_interval);
        }
    }

    fn advance(&self, next: ReadinessState) -> Result<()> {
        let mut history = self
            .history
            .lock()
            .map_err(|_| Error::Other("readiness lock poisoned".into()))?;
        let current = history.last().copied().unwrap_or(ReadinessState::NotStarted);
        if !current.can_move_to(next) {
            return Err(self.invalid(current, next));
        }
        debug!("Artifact '{}': {} -> {}", self.artifact, current, next);
        history.push(next);
        Ok(())
    }

    fn invalid(&self, from: ReadinessState, to: ReadinessState) -> Error {
        Error::InvalidTransition {
            artifact: self.artifact.clone(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ArtifactDescriptor, ArtifactKind, SyncStrategy};
    use crate::document::ContentDocument;
    use ReadinessState::*;

    fn entry() -> CacheEntry {
        CacheEntry::new(
            ArtifactDescriptor::new(
                "ui",
                ArtifactKind::Document,
                SyncStrategy::PayloadDigest,
                None,
                "https://example.invalid/ui.json",
                "/tmp/ui",
            ),
            None,
            ContentDocument::default(),
            Vec::new(),
        )
    }

    #[test]
    fn test_full_update_path() {
        let r = Readiness::new("ui");
        r.transition(Syncing).unwrap();
        r.transition(Updated).unwrap();
        r.transition(Merging).unwrap();
        assert!(r.current().is_none());
        r.publish(entry()).unwrap();

        assert_eq!(r.history(), vec![NotStarted, Syncing, Updated, Merging, Ready]);
        assert!(r.is_ready());
        assert!(r.current().is_some());
    }

    #[test]
    fn test_up_to_date_goes_straight_to_ready() {
        let r = Readiness::new("ui");
        r.transition(Syncing).unwrap();
        r.transition(UpToDate).unwrap();
        r.publish(entry()).unwrap();
        assert_eq!(r.history(), vec![NotStarted, Syncing, UpToDate, Ready]);
    }

    #[test]
    fn test_illegal_moves_are_rejected() {
        let r = Readiness::new("ui");
        assert!(matches!(
            r.transition(Merging),
            Err(Error::InvalidTransition { .. })
        ));
        assert!(r.publish(entry()).is_err());

        r.transition(Syncing).unwrap();
        assert!(r.transition(Ready).is_err());
        r.transition(Updated).unwrap();
        assert!(r.transition(UpToDate).is_err());
        assert!(r.publish(entry()).is_err());
        assert_eq!(r.state(), Updated);
        assert!(r.current().is_none());
    }

    #[test]
    fn test_every_intermediate_state_can_fail() {
        for path in [vec![Syncing], vec![Syncing, UpToDate], vec![Syncing, Updated]] {
            let r = Readiness::new("ui");
            for state in path {
                r.transition(state).unwrap();
            }
            r.fail(ErrorKind::Internal).unwrap();
            assert!(r.state().is_terminal());
            assert_eq!(
                r.wait_until_settled(Duration::from_millis(5), Duration::from_millis(50)),
                Failed(ErrorKind::Internal)
            );
        }

        let r = Readiness::new("ui");
        assert!(r.fail(ErrorKind::Internal).is_err());
    }

    #[test]
    fn test_failed_is_terminal() {
        let r = Readiness::new("ui");
        r.transition(Syncing).unwrap();
        r.fail(ErrorKind::Network).unwrap();

        assert_eq!(r.state(), Failed(ErrorKind::Network));
        assert!(r.state().is_terminal());
        assert!(r.transition(Syncing).is_err());
        assert!(r.current().is_none());
    }

    #[test]
    fn test_wait_until_settled_times_out() {
        let r = Readiness::new("ui");
        let state = r.wait_until_settled(Duration::from_millis(10), Duration::from_millis(30));
        assert_eq!(state, NotStarted);
    }

    #[test]
    fn test_wait_sees_publish_from_other_thread() {
        let r = Arc::new(Readiness::new("ui"));
        let worker = {
            let r = r.clone();
            std::thread::spawn(move || {
                r.transition(Syncing).unwrap();
                std::thread::sleep(Duration::from_millis(20));
                r.transition(UpToDate).unwrap();
                r.publish(entry()).unwrap();
            })
        };

        let state = r.wait_until_settled(Duration::from_millis(5), Duration::from_secs(5));
        worker.join().unwrap();
        assert_eq!(state, Ready);
        assert!(r.current().is_some());
    }
}
