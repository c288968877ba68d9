//! Versioned content overlay engine.
//!
//! Keeps replacement content for a host application in sync with a remote
//! source and serves it in place of the host's own content:
//!
//! - **Sync**: compare a published version marker (or the payload digest) with
//!   the local copy and download only on change
//! - **Merge**: overlay patch values onto the host's original content, never
//!   adding keys and never blanking a value with an empty translation
//! - **Cache**: persist the merged overlay atomically and reuse it across runs
//! - **Intercept**: answer host lookups from memory, passing through until the
//!   overlay is ready
//!
//! # Example
//!
//! ```no_run
//! use overlay_engine::{EngineConfig, FileHostSource, HttpFetcher, OverlayEngine};
//! use camino::Utf8Path;
//! use std::sync::Arc;
//!
//! # fn main() -> overlay_engine::Result<()> {
//! let config = EngineConfig::load(Utf8Path::new("overlay.toml"))?;
//! let engine = OverlayEngine::start(
//!     &config,
//!     Arc::new(HttpFetcher::new(&config.user_agent)?),
//!     Arc::new(FileHostSource::new("host-export")),
//!     None,
//! )?;
//!
//! let gate = engine.gate();
//! let text = gate
//!     .provide_field("scenes", "[MainMenu] Canvas/Play", "text")
//!     .or_else(|| "Play".to_string());
//! println!("{}", text);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod codec;
pub mod config;
pub mod descriptor;
pub mod document;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod gate;
pub mod host;
pub mod integrity;
pub mod merge;
pub mod pipeline;
pub mod readiness;

pub use cache::{write_atomic, ArtifactFiles, CacheEntry, OverlayCache};
pub use codec::{codec_for, ContentCodec};
pub use config::{ArtifactConfig, EngineConfig};
pub use descriptor::{ArtifactDescriptor, ArtifactKind, SyncStrategy};
pub use document::{ContentDocument, Entry, Field};
pub use engine::OverlayEngine;
pub use error::{Error, ErrorKind, Result};
pub use fetch::{Fetcher, HttpFetcher};
pub use gate::{InterceptionGate, Provision};
pub use host::{FileHostSource, HostContentSource};
pub use integrity::{digest, digest_with, needs_sync, Fingerprint, FingerprintAlgorithm};
pub use merge::{merge, merge_with_report, MergeReport};
pub use pipeline::{PipelineSettings, ProgressCallback, SyncPipeline, SyncProgress, SyncReport};
pub use readiness::{Readiness, ReadinessState};
