//! Header-aware partition of the full capture into phone-sized chunks
//!
//! Chunk 1 always starts at the top of the document, so it is the only chunk
//! that shows the sticky header. Every later "screen" assumes the reader has
//! scrolled past the header: tail chunk `i` starts at
//! `i * chunk_height - header_height` and is at most `chunk_height` tall.
//! Iteration stops once an offset reaches the end of the content.
//!
//! Planning ([`plan_chunks`]) is pure arithmetic. Extraction ([`slice`])
//! crops each planned rectangle out of the full image and hands it to a
//! [`ChunkSink`]. A failed first chunk aborts the slice; a failed tail chunk
//! is recorded and the remaining chunks are still attempted.

use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView, ImageFormat};
use log::{debug, error, info, warn};

use crate::session::chunk_path;
use crate::{Error, Measurement, Result};

/// One output rectangle, in full-image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRect {
    /// 1-based artifact index
    pub index: usize,
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl ChunkRect {
    /// Exclusive bottom edge
    pub fn bottom(&self) -> u32 {
        self.top + self.height
    }
}

/// Fixed chunk dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkGeometry {
    pub width: u32,
    pub height: u32,
}

/// Ordered partition of one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    /// `ceil((content - header) / chunk_height) + 1`; an estimate only. It
    /// can be above or below `chunks.len()`: tail chunks that add no rows
    /// are skipped, and a header taller than half a chunk needs extra tail
    /// chunks to stay gap-free.
    pub planned_count: usize,
    /// Chunks in index order; empty only for a zero-height document
    pub chunks: Vec<ChunkRect>,
}

impl ChunkPlan {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Chunk count estimate reported alongside the real count.
pub fn planned_count(content_height: u32, header_height: u32, chunk_height: u32) -> usize {
    if chunk_height == 0 {
        return 0;
    }
    let body = content_height.saturating_sub(header_height) as u64;
    let chunk = chunk_height as u64;
    (body.div_ceil(chunk) + 1) as usize
}

/// Compute the chunk rectangles for a measured document.
///
/// A header taller than the content is clamped to the content. Tail chunks
/// that would start above the top of the image, or that add no rows beyond
/// what earlier chunks already cover, are skipped; that is what makes a
/// document no taller than one chunk produce exactly one chunk.
pub fn plan_chunks(measurement: Measurement, geometry: ChunkGeometry) -> ChunkPlan {
    let content = measurement.content_height as i64;
    let header = measurement.header_height.min(measurement.content_height) as i64;
    let chunk = geometry.height as i64;

    let planned = planned_count(measurement.content_height, measurement.header_height, geometry.height);
    let mut chunks = Vec::with_capacity(planned);

    let first_height = chunk.min(content);
    if first_height <= 0 || geometry.width == 0 {
        return ChunkPlan { planned_count: planned, chunks };
    }
    chunks.push(rect(1, 0, first_height, geometry.width));
    let mut covered = first_height;

    let mut i: i64 = 1;
    loop {
        let offset = i * chunk - header;
        if offset >= content {
            break;
        }

        let height = chunk.min(content - offset);
        let end = offset + height;
        if offset < 0 || height <= 0 || end <= covered {
            debug!("Skipping tail chunk {}: y={} h={} adds no content", i + 1, offset, height);
        } else {
            chunks.push(rect(i as usize + 1, offset, height, geometry.width));
            covered = end;
        }
        i += 1;
    }

    ChunkPlan {
        planned_count: planned,
        chunks,
    }
}

fn rect(index: usize, top: i64, height: i64, width: u32) -> ChunkRect {
    ChunkRect {
        index,
        left: 0,
        top: top as u32,
        width,
        height: height as u32,
    }
}

/// Destination for extracted chunks
pub trait ChunkSink {
    /// Persist chunk `index` and return where it was written.
    fn store(&mut self, index: usize, chunk: &DynamicImage) -> Result<PathBuf>;
}

/// Writes chunks as `<index>.png` into a directory
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

impl ChunkSink for DirectorySink {
    fn store(&mut self, index: usize, chunk: &DynamicImage) -> Result<PathBuf> {
        let path = chunk_path(&self.dir, index);
        chunk.save_with_format(&path, ImageFormat::Png)?;
        Ok(path)
    }
}

/// What happened to one planned chunk
#[derive(Debug)]
pub enum ChunkOutcome {
    Written { rect: ChunkRect, path: PathBuf },
    Failed { rect: ChunkRect, error: Error },
}

impl ChunkOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, ChunkOutcome::Written { .. })
    }
}

/// Result of slicing one image
#[derive(Debug)]
pub struct SliceReport {
    pub planned_count: usize,
    pub outcomes: Vec<ChunkOutcome>,
}

impl SliceReport {
    /// Number of chunks actually persisted
    pub fn written_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_written()).count()
    }

    pub fn written_paths(&self) -> Vec<PathBuf> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                ChunkOutcome::Written { path, .. } => Some(path.clone()),
                ChunkOutcome::Failed { .. } => None,
            })
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&ChunkRect, &Error)> {
        self.outcomes.iter().filter_map(|o| match o {
            ChunkOutcome::Failed { rect, error } => Some((rect, error)),
            ChunkOutcome::Written { .. } => None,
        })
    }
}

/// Crop one rectangle out of the full image.
pub fn extract(image: &DynamicImage, rect: &ChunkRect) -> Result<DynamicImage> {
    let (width, height) = image.dimensions();
    if rect.height == 0 || rect.width == 0 {
        return Err(Error::Slice {
            index: rect.index,
            reason: "empty rectangle".into(),
        });
    }
    if rect.left + rect.width > width || rect.bottom() > height {
        return Err(Error::Slice {
            index: rect.index,
            reason: format!(
                "rectangle {}x{}+{}+{} exceeds image {}x{}",
                rect.width, rect.height, rect.left, rect.top, width, height
            ),
        });
    }
    Ok(image.crop_imm(rect.left, rect.top, rect.width, rect.height))
}

/// Extract and persist every chunk of `plan`.
///
/// Fails only when the plan is empty or chunk 1 cannot be produced. Tail
/// failures are logged and collected in the report.
pub fn slice<K: ChunkSink + ?Sized>(image: &DynamicImage, plan: &ChunkPlan, sink: &mut K) -> Result<SliceReport> {
    let (first, tail) = plan
        .chunks
        .split_first()
        .ok_or_else(|| Error::Slice {
            index: 1,
            reason: "nothing to slice".into(),
        })?;

    info!(
        "Splitting into {} chunks (planned {})",
        plan.len(),
        plan.planned_count
    );

    info!("Creating chunk {} with header", first.index);
    let path = extract(image, first)
        .and_then(|chunk| sink.store(first.index, &chunk))
        .map_err(|e| {
            error!("Error creating chunk {}: {}", first.index, e);
            into_slice(first.index, e)
        })?;

    let mut outcomes = vec![ChunkOutcome::Written { rect: *first, path }];

    outcomes.extend(tail.iter().map(|rect| {
        debug!("Creating chunk {}: y={}, height={}", rect.index, rect.top, rect.height);
        match extract(image, rect).and_then(|chunk| sink.store(rect.index, &chunk)) {
            Ok(path) => ChunkOutcome::Written { rect: *rect, path },
            Err(e) => {
                warn!("Error creating chunk {}: {}; continuing", rect.index, e);
                ChunkOutcome::Failed {
                    rect: *rect,
                    error: into_slice(rect.index, e),
                }
            }
        }
    }));

    Ok(SliceReport {
        planned_count: plan.planned_count,
        outcomes,
    })
}

fn into_slice(index: usize, err: Error) -> Error {
    match err {
        Error::Slice { .. } => err,
        other => Error::Slice {
            index,
            reason: other.to_string(),
        },
    }
}
