//! The fetch -> compare -> merge -> cache pipeline for a single artifact.
//!
//! # Sync Algorithm
//!
//! Version marker strategy:
//!
//! 1. Fetch the remote marker. A network failure fails the artifact; the gate
//!    keeps passing the host's own content through.
//! 2. Remote marker equals the local one and `overlay.json` exists: load it and
//!    go `UpToDate -> Ready` without touching the payload endpoint.
//! 3. Markers equal, payload on disk but no overlay: `UpToDate -> Merging`
//!    using the local payload.
//! 4. Otherwise fetch the payload, check that it decodes, write it, then write
//!    the marker (`Updated -> Merging`).
//!
//! Payload digest strategy fetches the payload every time and compares its
//! fingerprint with the local copy; the rest is identical.
//!
//! Merging always starts from `original.json`. On first run it is exported from
//! the host, polling until the host produces content. A patch that does not
//! decode is rejected as a whole.
//!
//! A failed fetch or a rejected payload never discards what an earlier run
//! stored: when a local marker exists together with its overlay or a decodable
//! payload, the artifact goes `UpToDate` and keeps serving that version. Only
//! without such local state does a fetch failure end in `Failed`, and a
//! rejected payload fall back to the unmodified original.

use crate::cache::{ArtifactFiles, CacheEntry};
use crate::codec::{codec_for, ContentCodec};
use crate::descriptor::{ArtifactDescriptor, SyncStrategy};
use crate::document::ContentDocument;
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::host::{wait_for_snapshot, HostContentSource};
use crate::integrity::{digest_with, needs_sync, normalize_marker, FingerprintAlgorithm};
use crate::merge::{merge_with_report, MergeReport};
use crate::readiness::{Readiness, ReadinessState};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Progress event, emitted on every readiness transition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    pub artifact: String,
    pub stage: ReadinessState,
}

pub type ProgressCallback = Arc<dyn Fn(SyncProgress) + Send + Sync>;

/// Timing and hashing knobs shared by all pipelines of an engine.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub manifest_timeout: Duration,
    pub payload_timeout: Duration,
    pub poll_interval: Duration,
    pub host_wait_timeout: Duration,
    pub fingerprint: FingerprintAlgorithm,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            manifest_timeout: Duration::from_secs(10),
            payload_timeout: Duration::from_secs(15),
            poll_interval: Duration::from_millis(100),
            host_wait_timeout: Duration::from_secs(30),
            fingerprint: FingerprintAlgorithm::Sha256,
        }
    }
}

/// What one pipeline run did.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub artifact: String,
    pub outcome: ReadinessState,
    /// Marker (or digest) the served overlay corresponds to.
    pub marker: Option<String>,
    pub payload_fetched: bool,
    pub original_exported: bool,
    pub merge: Option<MergeReport>,
    /// Why the patch was discarded, if it was.
    pub patch_rejected: Option<String>,
    /// Why the previously stored version was kept instead of updating.
    pub kept_local: Option<String>,
    pub error: Option<String>,
    pub elapsed: Duration,
}

impl SyncReport {
    fn new(artifact: &str) -> Self {
        Self {
            artifact: artifact.to_string(),
            outcome: ReadinessState::NotStarted,
            marker: None,
            payload_fetched: false,
            original_exported: false,
            merge: None,
            patch_rejected: None,
            kept_local: None,
            error: None,
            elapsed: Duration::ZERO,
        }
    }
}

enum Patch {
    Decoded(ContentDocument),
    Rejected(String),
}

/// Outcome of the compare step.
struct Plan {
    state: ReadinessState,
    marker: Option<String>,
    reuse_overlay: bool,
    /// `None`: read the payload already on disk when needed.
    patch: Option<Patch>,
}

pub struct SyncPipeline {
    files: ArtifactFiles,
    codec: Box<dyn ContentCodec>,
    fetcher: Arc<dyn Fetcher>,
    host: Arc<dyn HostContentSource>,
    readiness: Arc<Readiness>,
    settings: PipelineSettings,
    progress: Option<ProgressCallback>,
}

impl SyncPipeline {
    pub fn new(
        descriptor: ArtifactDescriptor,
        fetcher: Arc<dyn Fetcher>,
        host: Arc<dyn HostContentSource>,
        readiness: Arc<Readiness>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            codec: codec_for(descriptor.kind()),
            files: ArtifactFiles::new(descriptor),
            fetcher,
            host,
            readiness,
            settings,
            progress: None,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    fn descriptor(&self) -> &ArtifactDescriptor {
        self.files.descriptor()
    }

    fn name(&self) -> &str {
        self.files.descriptor().name()
    }

    /// Run to a terminal state. Never returns an error: failures are logged,
    /// recorded on the readiness slot and in the report.
    pub fn run(&self) -> SyncReport {
        let start = Instant::now();
        let mut report = SyncReport::new(self.name());

        if let Err(e) = self.run_inner(&mut report) {
            warn!("Sync of '{}' failed: {}", self.name(), e);
            report.error = Some(e.to_string());
            match self.readiness.fail(e.kind()) {
                Ok(()) => self.emit(self.readiness.state()),
                Err(inner) => warn!("{}", inner),
            }
        }

        report.outcome = self.readiness.state();
        report.elapsed = start.elapsed();
        info!(
            "Artifact '{}' settled as {} in {:?}",
            self.name(),
            report.outcome,
            report.elapsed
        );
        report
    }

    fn run_inner(&self, report: &mut SyncReport) -> Result<()> {
        self.enter(ReadinessState::Syncing)?;

        let plan = match self.descriptor().strategy() {
            SyncStrategy::VersionMarker => self.check_marker(report)?,
            SyncStrategy::PayloadDigest => self.check_digest(report)?,
        };
        report.marker = plan.marker.clone();
        self.enter(plan.state)?;

        if plan.reuse_overlay {
            match self.load_overlay(plan.marker.clone()) {
                Ok(entry) => return self.publish(entry),
                Err(e) => warn!(
                    "Cached overlay for '{}' is unusable ({}), rebuilding",
                    self.name(),
                    e
                ),
            }
        }

        self.enter(ReadinessState::Merging)?;
        let patch = match plan.patch {
            Some(patch) => patch,
            None => self.local_patch(),
        };
        let entry = self.build_overlay(plan.marker, patch, report)?;
        self.publish(entry)
    }

    fn check_marker(&self, report: &mut SyncReport) -> Result<Plan> {
        let url = self
            .descriptor()
            .manifest_url()
            .ok_or_else(|| Error::IntegrityUnresolvable {
                artifact: self.name().to_string(),
                reason: "no manifest URL configured".into(),
            })?;

        let raw = match self.fetcher.fetch(url, self.settings.manifest_timeout) {
            Ok(raw) => raw,
            Err(e) => return self.keep_local_or(e, report),
        };
        let remote = normalize_marker(&String::from_utf8_lossy(&raw)).ok_or_else(|| {
            Error::IntegrityUnresolvable {
                artifact: self.name().to_string(),
                reason: "remote marker is empty".into(),
            }
        })?;
        let local = self.files.read_marker()?;

        if !needs_sync(local.as_deref(), Some(&remote)) {
            if self.files.has_overlay() {
                info!("'{}' is up to date ({})", self.name(), remote);
                return Ok(Plan {
                    state: ReadinessState::UpToDate,
                    marker: Some(remote),
                    reuse_overlay: true,
                    patch: None,
                });
            }
            if self.files.read_payload()?.is_some() {
                info!("'{}' is up to date ({}), overlay missing", self.name(), remote);
                return Ok(Plan {
                    state: ReadinessState::UpToDate,
                    marker: Some(remote),
                    reuse_overlay: false,
                    patch: None,
                });
            }
        }

        info!(
            "'{}' needs sync: local {:?}, remote {}",
            self.name(),
            local,
            remote
        );
        let payload = match self.fetch_payload(report) {
            Ok(payload) => payload,
            Err(e) => return self.keep_local_or(e, report),
        };
        self.store_payload(payload, remote, report)
    }

    fn check_digest(&self, report: &mut SyncReport) -> Result<Plan> {
        let payload = match self.fetch_payload(report) {
            Ok(payload) => payload,
            Err(e) => return self.keep_local_or(e, report),
        };
        let remote = digest_with(self.settings.fingerprint, &payload).into_string();
        let local = self
            .files
            .read_payload()?
            .map(|bytes| digest_with(self.settings.fingerprint, &bytes).into_string());

        if !needs_sync(local.as_deref(), Some(&remote)) {
            let reuse_overlay = self.files.has_overlay();
            info!("'{}' payload unchanged ({})", self.name(), remote);
            return Ok(Plan {
                state: ReadinessState::UpToDate,
                marker: Some(remote),
                reuse_overlay,
                patch: None,
            });
        }

        self.store_payload(payload, remote, report)
    }

    fn fetch_payload(&self, report: &mut SyncReport) -> Result<Vec<u8>> {
        let bytes = self
            .fetcher
            .fetch(self.descriptor().payload_url(), self.settings.payload_timeout)?;
        report.payload_fetched = true;
        Ok(bytes)
    }

    /// Persist a freshly fetched payload and its marker, payload first. A payload
    /// that does not decode is not persisted, so the next run fetches again.
    fn store_payload(
        &self,
        payload: Vec<u8>,
        marker: String,
        report: &mut SyncReport,
    ) -> Result<Plan> {
        match self.codec.decode_patch(self.name(), &payload) {
            Ok(document) => {
                self.files.write_payload(&payload)?;
                self.files.write_marker(&marker)?;
                info!("Stored payload for '{}' at {}", self.name(), marker);
                Ok(Plan {
                    state: ReadinessState::Updated,
                    marker: Some(marker),
                    reuse_overlay: false,
                    patch: Some(Patch::Decoded(document)),
                })
            }
            Err(e) => {
                warn!("Rejecting payload {} for '{}': {}", marker, self.name(), e);
                report.patch_rejected = Some(e.to_string());
                let reason = format!("payload {} rejected", marker);
                if let Some(plan) = self.keep_local(reason, report)? {
                    return Ok(plan);
                }
                Ok(Plan {
                    state: ReadinessState::Updated,
                    marker: None,
                    reuse_overlay: false,
                    patch: Some(Patch::Rejected(e.to_string())),
                })
            }
        }
    }

    /// Plan for serving the version stored by an earlier run, if one is usable:
    /// a local marker plus either its overlay or a payload that still decodes.
    fn keep_local(&self, reason: String, report: &mut SyncReport) -> Result<Option<Plan>> {
        let Some(marker) = self.files.read_marker()? else {
            return Ok(None);
        };
        let reuse_overlay = self.files.has_overlay();
        let patch = if reuse_overlay {
            None
        } else {
            match self.local_patch() {
                Patch::Decoded(document) => Some(Patch::Decoded(document)),
                Patch::Rejected(_) => return Ok(None),
            }
        };

        warn!("Keeping '{}' at {}: {}", self.name(), marker, reason);
        report.kept_local = Some(reason);
        Ok(Some(Plan {
            state: ReadinessState::UpToDate,
            marker: Some(marker),
            reuse_overlay,
            patch,
        }))
    }

    fn keep_local_or(&self, error: Error, report: &mut SyncReport) -> Result<Plan> {
        match self.keep_local(error.to_string(), report)? {
            Some(plan) => Ok(plan),
            None => Err(error),
        }
    }

    fn local_patch(&self) -> Patch {
        match self.files.read_payload() {
            Ok(Some(bytes)) => match self.codec.decode_patch(self.name(), &bytes) {
                Ok(document) => Patch::Decoded(document),
                Err(e) => Patch::Rejected(e.to_string()),
            },
            Ok(None) => Patch::Rejected("no local payload".into()),
            Err(e) => Patch::Rejected(e.to_string()),
        }
    }

    fn load_overlay(&self, marker: Option<String>) -> Result<CacheEntry> {
        let bytes = self.files.load_overlay()?.ok_or_else(|| {
            Error::Other(format!("overlay for '{}' disappeared", self.name()))
        })?;
        let document = self.codec.decode_original(self.name(), &bytes)?;
        Ok(CacheEntry::new(
            self.descriptor().clone(),
            marker,
            document,
            bytes,
        ))
    }

    fn original_bytes(&self, report: &mut SyncReport) -> Result<Vec<u8>> {
        if let Some(bytes) = self.files.read_original()? {
            return Ok(bytes);
        }

        info!("Exporting original content of '{}' from host", self.name());
        let snapshot = wait_for_snapshot(
            self.host.as_ref(),
            self.descriptor(),
            self.settings.poll_interval,
            self.settings.host_wait_timeout,
        )?;
        report.original_exported = self.files.export_original(&snapshot)?;
        // Another writer may have won the race; the file on disk is authoritative.
        Ok(self.files.read_original()?.unwrap_or(snapshot))
    }

    fn build_overlay(
        &self,
        marker: Option<String>,
        patch: Patch,
        report: &mut SyncReport,
    ) -> Result<CacheEntry> {
        let original_bytes = self.original_bytes(report)?;
        let original = self.codec.decode_original(self.name(), &original_bytes)?;

        let (merged, marker, persist) = match patch {
            Patch::Decoded(patch) => {
                let (merged, merge_report) = merge_with_report(&original, &patch);
                info!(
                    "Merged '{}': {} of {} entries matched, {} fields overridden",
                    self.name(),
                    merge_report.matched_entries,
                    merge_report.original_entries,
                    merge_report.overridden_fields
                );
                report.merge = Some(merge_report);
                (merged, marker, true)
            }
            Patch::Rejected(reason) => {
                warn!(
                    "Patch for '{}' rejected, serving original content: {}",
                    self.name(),
                    reason
                );
                report.patch_rejected = Some(reason);
                // The unmodified original belongs to no marker.
                report.marker = None;
                (original, None, false)
            }
        };

        let rendered = self.codec.encode(self.name(), &original_bytes, &merged)?;
        if persist {
            self.files.save_overlay(&rendered)?;
        }

        Ok(CacheEntry::new(
            self.descriptor().clone(),
            marker,
            merged,
            rendered,
        ))
    }

    fn enter(&self, state: ReadinessState) -> Result<()> {
        self.readiness.transition(state)?;
        self.emit(state);
        Ok(())
    }

    fn publish(&self, entry: CacheEntry) -> Result<()> {
        self.readiness.publish(entry)?;
        self.emit(ReadinessState::Ready);
        Ok(())
    }

    fn emit(&self, stage: ReadinessState) {
        if let Some(callback) = &self.progress {
            callback(SyncProgress {
                artifact: self.name().to_string(),
                stage,
            });
        }
    }
}
