//! One background worker per artifact, one shared gate.

use crate::cache::OverlayCache;
use crate::config::EngineConfig;
use crate::descriptor::ArtifactDescriptor;
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::gate::InterceptionGate;
use crate::host::HostContentSource;
use crate::pipeline::{PipelineSettings, ProgressCallback, SyncPipeline, SyncReport};
use crate::readiness::ReadinessState;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Owns the sync workers and the [`InterceptionGate`] they feed.
///
/// [`start`](Self::start) returns immediately; each enabled artifact syncs on
/// its own thread while the gate passes through until that artifact is ready.
pub struct OverlayEngine {
    cache: Arc<OverlayCache>,
    gate: InterceptionGate,
    descriptors: Vec<ArtifactDescriptor>,
    poll_interval: Duration,
    workers: Mutex<Vec<(String, JoinHandle<SyncReport>)>>,
}

impl OverlayEngine {
    pub fn start(
        config: &EngineConfig,
        fetcher: Arc<dyn Fetcher>,
        host: Arc<dyn HostContentSource>,
        progress: Option<ProgressCallback>,
    ) -> Result<Self> {
        config.validate()?;

        let descriptors = config.descriptors();
        let cache = Arc::new(OverlayCache::new(&descriptors));
        let gate = InterceptionGate::new(
            cache.clone(),
            config.disabled_artifacts().map(str::to_string),
        );
        let settings = PipelineSettings {
            manifest_timeout: config.manifest_timeout(),
            payload_timeout: config.payload_timeout(),
            poll_interval: config.poll_interval(),
            host_wait_timeout: config.host_wait_timeout(),
            fingerprint: config.fingerprint,
        };

        info!(
            "Starting overlay engine: {} artifact(s), data root {}",
            descriptors.len(),
            config.data_root
        );

        let mut workers = Vec::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            let Some(readiness) = cache.slot(descriptor.name()).cloned() else {
                continue;
            };
            let mut pipeline = SyncPipeline::new(
                descriptor.clone(),
                fetcher.clone(),
                host.clone(),
                readiness,
                settings,
            );
            if let Some(progress) = &progress {
                pipeline = pipeline.with_progress(progress.clone());
            }

            let handle = std::thread::Builder::new()
                .name(format!("overlay-sync-{}", descriptor.name()))
                .spawn(move || pipeline.run())?;
            workers.push((descriptor.name().to_string(), handle));
        }

        Ok(Self {
            cache,
            gate,
            descriptors,
            poll_interval: settings.poll_interval,
            workers: Mutex::new(workers),
        })
    }

    pub fn gate(&self) -> InterceptionGate {
        self.gate.clone()
    }

    pub fn descriptors(&self) -> &[ArtifactDescriptor] {
        &self.descriptors
    }

    pub fn state(&self, artifact: &str) -> Option<ReadinessState> {
        self.cache.slot(artifact).map(|slot| slot.state())
    }

    pub fn history(&self, artifact: &str) -> Option<Vec<ReadinessState>> {
        self.cache.slot(artifact).map(|slot| slot.history())
    }

    /// Poll until every artifact is `Ready` or `Failed`, or `timeout` elapses.
    /// Returns `true` if everything settled.
    pub fn wait_until_settled(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let settled = self
                .descriptors
                .iter()
                .filter_map(|d| self.state(d.name()))
                .all(ReadinessState::is_terminal);
            if settled {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(self.poll_interval);
        }
    }

    /// Wait for every worker to finish and collect their reports.
    pub fn join(&self) -> Vec<SyncReport> {
        let workers = match self.workers.lock() {
            Ok(mut workers) => std::mem::take(&mut *workers),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };

        workers
            .into_iter()
            .filter_map(|(name, handle)| match handle.join() {
                Ok(report) => Some(report),
                Err(_) => {
                    error!("Sync worker for '{}' panicked", name);
                    None
                }
            })
            .collect()
    }
}
