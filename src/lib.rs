//! Chatshot
//!
//! Renders a chat transcript into a sequence of phone-sized screenshots that
//! together reproduce one continuous scroll through a simulated chat screen.
//!
//! # Pipeline
//!
//! - **Document**: the transcript becomes one self-contained HTML page
//!   ([`document`], [`template`])
//! - **Render**: a headless rendering surface lays the page out at a fixed
//!   width and reports content and header heights ([`renderer`])
//! - **Capture**: the whole page is captured as one full-height raster
//! - **Slice**: the raster is cut into fixed-aspect chunks; only the first
//!   chunk shows the sticky header ([`slicer`])
//!
//! [`pipeline::Pipeline`] sequences the stages and owns the surface lifetime.
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "cdp")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use chatshot::{CaptureRequest, Message, RenderConfig};
//! use chatshot::pipeline::Pipeline;
//!
//! let request = CaptureRequest {
//!     messages: vec![Message {
//!         timestamp: "2024-03-01T09:15:00Z".into(),
//!         sender: "ayse".into(),
//!         content: "Good morning!".into(),
//!     }],
//!     current_user: "ayse".into(),
//!     contact_name: "Mehmet Yilmaz".into(),
//!     location: None,
//! };
//!
//! let pipeline = Pipeline::new(RenderConfig::default());
//! let summary = pipeline.capture(&request, chatshot::cdp::CdpSurface::open)?;
//! println!("{} chunks in {}", summary.chunk_count, summary.location.display());
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "cdp"))]
//! # fn main() {}
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod error;
pub use error::{Error, Result};

pub mod document;
pub mod template;

pub mod surface;
pub use surface::{Surface, SurfaceLease};

// CDP backend (headless Chrome)
#[cfg(feature = "cdp")]
pub mod cdp;

pub mod renderer;
pub mod slicer;
pub mod session;
pub mod pipeline;

pub mod request;
pub use request::{CaptureRequest, CaptureResponse};

pub mod server;

// Async-friendly facade (worker-thread backed)
pub mod async_api;

/// Logical width of the simulated phone screen
pub const CHUNK_WIDTH: u32 = 390;

/// Phone aspect ratio as height:width
pub const ASPECT_RATIO: (u32, u32) = (19, 9);

/// A single chat message as supplied by the caller
///
/// `timestamp` is kept as the caller's raw string; it is parsed when the
/// document is built and shown verbatim when it cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub timestamp: String,
    pub sender: String,
    pub content: String,
}

/// Heights read back from the laid-out document, in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Measurement {
    /// Bounding height of the root chat container
    pub content_height: u32,
    /// Bounding height of the sticky header
    pub header_height: u32,
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: CHUNK_WIDTH,
            height: chunk_height_for(CHUNK_WIDTH, ASPECT_RATIO),
        }
    }
}

/// Height of one chunk for the given width, `round(width * h / w)`.
pub fn chunk_height_for(width: u32, ratio: (u32, u32)) -> u32 {
    let (num, den) = ratio;
    let den = den.max(1) as u64;
    ((width as u64 * num as u64 + den / 2) / den) as u32
}

/// Configuration for one capture pipeline
///
/// The defaults reproduce a 390px wide phone at a 9:19 aspect ratio:
///
/// ```
/// let cfg = chatshot::RenderConfig::default();
/// assert_eq!(cfg.chunk_width, 390);
/// assert_eq!(cfg.chunk_height(), 823);
/// ```
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Content and chunk width in CSS pixels
    pub chunk_width: u32,
    /// Chunk aspect ratio as (height, width)
    pub aspect_ratio: (u32, u32),
    /// Upper bound on the layout stability wait, in milliseconds
    pub ready_timeout_ms: u64,
    /// Interval between stability probes, in milliseconds
    pub ready_poll_ms: u64,
    /// Directory under which one session directory is created per invocation
    pub output_root: PathBuf,
    /// Explicit browser executable; auto-detected when `None`
    pub chrome_path: Option<PathBuf>,
    /// Whether to keep the browser's process sandbox enabled
    pub sandbox: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            chunk_width: CHUNK_WIDTH,
            aspect_ratio: ASPECT_RATIO,
            ready_timeout_ms: 10_000,
            ready_poll_ms: 50,
            output_root: PathBuf::from("screenshots"),
            chrome_path: None,
            sandbox: false,
        }
    }
}

impl RenderConfig {
    /// Height of one output chunk
    pub fn chunk_height(&self) -> u32 {
        chunk_height_for(self.chunk_width, self.aspect_ratio)
    }

    /// Viewport the surface is opened with before the document is measured
    pub fn viewport(&self) -> Viewport {
        Viewport {
            width: self.chunk_width,
            height: self.chunk_height(),
        }
    }

    /// Reject configurations that cannot produce a chunk.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_width == 0 {
            return Err(Error::Config("chunk_width must be positive".into()));
        }
        if self.aspect_ratio.0 == 0 || self.aspect_ratio.1 == 0 {
            return Err(Error::Config("aspect ratio terms must be positive".into()));
        }
        if self.ready_timeout_ms == 0 {
            return Err(Error::Config("ready_timeout_ms must be positive".into()));
        }
        Ok(())
    }
}
