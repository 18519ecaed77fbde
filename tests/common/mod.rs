//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chatshot::{CaptureRequest, Message, RenderConfig, Result, Surface};
use chrono::{DateTime, FixedOffset};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

/// Observations shared between a test and the surfaces it opens
#[derive(Debug, Default)]
pub struct Probe {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub html: Mutex<Option<String>>,
    pub captured: Mutex<Option<(u32, u32)>>,
}

impl Probe {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn html(&self) -> String {
        self.html.lock().unwrap().clone().unwrap_or_default()
    }
}

/// Scripted layout answers for a [`FakeSurface`]
#[derive(Debug, Clone)]
pub struct Script {
    pub content_height: u32,
    pub header_height: u32,
    /// Height of the produced raster; defaults to the requested height
    pub image_height: Option<u32>,
    pub ready: bool,
}

impl Script {
    pub fn new(content_height: u32, header_height: u32) -> Self {
        Self {
            content_height,
            header_height,
            image_height: None,
            ready: true,
        }
    }
}

/// In-process surface whose raster encodes each row's y coordinate
pub struct FakeSurface {
    script: Script,
    probe: Arc<Probe>,
}

impl Surface for FakeSurface {
    fn load_html(&mut self, html: &str, _width: u32) -> Result<()> {
        *self.probe.html.lock().unwrap() = Some(html.to_string());
        Ok(())
    }

    fn is_ready(&mut self) -> Result<bool> {
        Ok(self.script.ready)
    }

    fn element_height(&mut self, selector: &str) -> Result<u32> {
        Ok(match selector {
            "#chat-to-capture" => self.script.content_height,
            "#chat-header" => self.script.header_height,
            _ => 0,
        })
    }

    fn capture_png(&mut self, width: u32, height: u32) -> Result<Vec<u8>> {
        *self.probe.captured.lock().unwrap() = Some((width, height));
        let height = self.script.image_height.unwrap_or(height);
        Ok(striped_png(width, height))
    }

    fn close(&mut self) -> Result<()> {
        self.probe.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// An opener producing [`FakeSurface`]s that report into `probe`.
pub fn opener(script: Script, probe: Arc<Probe>) -> impl Fn(&RenderConfig) -> Result<FakeSurface> + Send + Sync + 'static {
    move |_config: &RenderConfig| {
        probe.opened.fetch_add(1, Ordering::SeqCst);
        Ok(FakeSurface {
            script: script.clone(),
            probe: probe.clone(),
        })
    }
}

/// Row y is painted with (y & 0xff, y >> 8, 0x80).
pub fn row_color(y: u32) -> Rgba<u8> {
    Rgba([(y & 0xff) as u8, ((y >> 8) & 0xff) as u8, 0x80, 0xff])
}

pub fn striped_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |_, y| row_color(y));
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

/// Source row a chunk pixel was cut from.
pub fn source_row(px: Rgba<u8>) -> u32 {
    px.0[0] as u32 | ((px.0[1] as u32) << 8)
}

pub fn config(root: &std::path::Path) -> RenderConfig {
    RenderConfig {
        output_root: root.to_path_buf(),
        ready_timeout_ms: 200,
        ready_poll_ms: 5,
        ..Default::default()
    }
}

pub fn fixed_now() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2024-03-10T15:30:00+03:00").unwrap()
}

pub fn message(timestamp: &str, sender: &str, content: &str) -> Message {
    Message {
        timestamp: timestamp.into(),
        sender: sender.into(),
        content: content.into(),
    }
}

pub fn transcript() -> CaptureRequest {
    CaptureRequest {
        messages: vec![
            message("2024-03-09T21:00:00+03:00", "mehmet", "Are we still on for tomorrow?"),
            message("2024-03-09T21:02:00+03:00", "ayse", "Yes! 10 o'clock <sharp>"),
            message("2024-03-10T09:58:00+03:00", "mehmet", "On my way"),
        ],
        current_user: "ayse".into(),
        contact_name: "Mehmet Yilmaz".into(),
        location: None,
    }
}
