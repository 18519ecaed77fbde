//! Render and capture stages
//!
//! [`measure`] loads the document into a surface at the fixed content width,
//! waits for the stability probe and reads back the content and header
//! heights. [`capture`] then resizes the output frame to the full content
//! height and captures everything as one PNG at scale 1.

use std::path::Path;
use std::time::Duration;

use log::{info, warn};

use crate::document::Document;
use crate::session::FullImage;
use crate::surface::{wait_until_ready, Surface};
use crate::template::{CONTAINER_SELECTOR, HEADER_SELECTOR};
use crate::{Error, Measurement, RenderConfig, Result};

/// Load `document` and measure it.
///
/// Any surface failure here, including a stability probe that never passes
/// within `ready_timeout_ms`, is reported as [`Error::Render`].
pub fn measure<S: Surface + ?Sized>(surface: &mut S, document: &Document, config: &RenderConfig) -> Result<Measurement> {
    surface
        .load_html(document.html(), config.chunk_width)
        .map_err(into_render)?;

    let ready = wait_until_ready(
        surface,
        Duration::from_millis(config.ready_timeout_ms),
        Duration::from_millis(config.ready_poll_ms.max(1)),
    )
    .map_err(into_render)?;
    if !ready {
        return Err(Error::Render(format!(
            "layout did not stabilize within {}ms",
            config.ready_timeout_ms
        )));
    }

    let content_height = surface.element_height(CONTAINER_SELECTOR).map_err(into_render)?;
    let header_height = surface.element_height(HEADER_SELECTOR).map_err(into_render)?;

    info!("Container height: {}px, Header height: {}px", content_height, header_height);

    if content_height == 0 {
        return Err(Error::Render("rendered document has zero height".into()));
    }
    if header_height > content_height {
        warn!(
            "Header ({}px) is taller than the content ({}px); slicing will clamp it",
            header_height, content_height
        );
    }

    Ok(Measurement {
        content_height,
        header_height,
    })
}

/// Capture the whole measured document as one transient PNG inside `dir`.
pub fn capture<S: Surface + ?Sized>(surface: &mut S, measurement: &Measurement, config: &RenderConfig, dir: &Path) -> Result<FullImage> {
    let png = surface
        .capture_png(config.chunk_width, measurement.content_height)
        .map_err(into_capture)?;

    if png.is_empty() {
        return Err(Error::Capture("surface returned an empty image".into()));
    }

    info!(
        "Captured full image {}x{} ({} bytes)",
        config.chunk_width,
        measurement.content_height,
        png.len()
    );
    FullImage::write(dir, &png).map_err(into_capture)
}

fn into_render(err: Error) -> Error {
    match err {
        Error::Render(_) => err,
        other => Error::Render(other.to_string()),
    }
}

fn into_capture(err: Error) -> Error {
    match err {
        Error::Capture(_) => err,
        other => Error::Capture(other.to_string()),
    }
}
