//! Orchestration of one capture invocation
//!
//! Order of work:
//!
//! 1. create the session directory (nothing else is touched if this fails)
//! 2. build the document
//! 3. open a surface, measure, capture the full image, release the surface
//! 4. slice into chunks, then delete the full image
//!
//! The surface is held in a [`SurfaceLease`], so it is closed exactly once
//! whichever stage fails. A fatal failure also removes the session
//! directory: callers never see a partial session.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, FixedOffset, Local};
use log::{error, info, warn};

use crate::document::build_document;
use crate::renderer;
use crate::session::CaptureSession;
use crate::slicer::{self, plan_chunks, ChunkGeometry, DirectorySink, SliceReport};
use crate::surface::{Surface, SurfaceLease};
use crate::{CaptureRequest, Error, Measurement, RenderConfig, Result};

type Clock = Arc<dyn Fn() -> DateTime<FixedOffset> + Send + Sync>;

/// Outcome of a successful invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSummary {
    /// Chunks actually written
    pub chunk_count: usize,
    /// The up-front estimate; may differ from `chunk_count` in either direction
    pub planned_count: usize,
    /// Session directory
    pub location: PathBuf,
    pub session_id: String,
    /// Written chunk files in index order
    pub chunks: Vec<PathBuf>,
    /// Indices of tail chunks that failed and were skipped
    pub failed: Vec<usize>,
    pub measurement: Measurement,
}

/// Runs transcripts through render, capture and slice
#[derive(Clone)]
pub struct Pipeline {
    config: RenderConfig,
    clock: Clock,
}

impl Pipeline {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            clock: Arc::new(|| Local::now().fixed_offset()),
        }
    }

    /// Replace the wall clock used for "Today"/"Yesterday" labels and the status bar.
    pub fn with_clock<F>(mut self, now: F) -> Self
    where
        F: Fn() -> DateTime<FixedOffset> + Send + Sync + 'static,
    {
        self.clock = Arc::new(now);
        self
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Run one invocation; `open` acquires a fresh surface for it.
    pub fn capture<S, F>(&self, request: &CaptureRequest, open: F) -> Result<CaptureSummary>
    where
        S: Surface,
        F: FnOnce(&RenderConfig) -> Result<S>,
    {
        self.config.validate()?;
        let started = Instant::now();
        info!(
            "Received screenshot request for contact: {} with {} messages.",
            request.contact_name,
            request.messages.len()
        );

        let session = CaptureSession::create(&self.config.output_root)?;

        match self.run(&session, request, open) {
            Ok((measurement, report)) => {
                let summary = CaptureSummary {
                    chunk_count: report.written_count(),
                    planned_count: report.planned_count,
                    location: session.dir().to_path_buf(),
                    session_id: session.id().to_string(),
                    chunks: report.written_paths(),
                    failed: report.failures().map(|(rect, _)| rect.index).collect(),
                    measurement,
                };
                info!(
                    "Generated {} screenshots in {} ({} ms)",
                    summary.chunk_count,
                    summary.location.display(),
                    started.elapsed().as_millis()
                );
                Ok(summary)
            }
            Err(e) => {
                error!("Error generating screenshots: {}", e);
                let dir = session.dir().to_path_buf();
                if let Err(discard_err) = session.discard() {
                    warn!("Failed to remove session {}: {}", dir.display(), discard_err);
                }
                Err(e)
            }
        }
    }

    fn run<S, F>(&self, session: &CaptureSession, request: &CaptureRequest, open: F) -> Result<(Measurement, SliceReport)>
    where
        S: Surface,
        F: FnOnce(&RenderConfig) -> Result<S>,
    {
        let now = (self.clock)();
        let document = build_document(request, self.config.chunk_width, &now);

        let surface = open(&self.config).map_err(|e| match e {
            Error::Render(_) => e,
            other => Error::Render(format!("Failed to open rendering surface: {}", other)),
        })?;
        let mut lease = SurfaceLease::new(surface);

        let measurement = renderer::measure(&mut *lease, &document, &self.config)?;
        let full = renderer::capture(&mut *lease, &measurement, &self.config, session.dir())?;

        // Slicing only needs the stored image.
        if let Err(e) = lease.release() {
            warn!("Failed to release rendering surface: {}", e);
        }

        let image = full.load()?;
        let geometry = ChunkGeometry {
            width: self.config.chunk_width,
            height: self.config.chunk_height(),
        };
        info!(
            "Using {}:{} aspect ratio: {}x{}",
            self.config.aspect_ratio.1, self.config.aspect_ratio.0, geometry.width, geometry.height
        );

        let plan = plan_chunks(measurement, geometry);
        let mut sink = DirectorySink::new(session.dir());
        let report = slicer::slice(&image, &plan, &mut sink)?;

        if let Err(e) = full.remove() {
            warn!("Failed to remove full capture: {}", e);
        }

        Ok((measurement, report))
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("config", &self.config).finish_non_exhaustive()
    }
}
