//! Rendering surface abstraction
//!
//! A surface is an off-process layout engine (headless Chrome in production)
//! that can load a document, answer geometry queries and produce a raster.
//! Each capture owns exactly one surface for its whole lifetime; it is opened
//! once and must be released exactly once. [`SurfaceLease`] enforces the
//! release on every exit path, including early returns and panics.

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use log::{debug, warn};

use crate::Result;

/// Core trait for rendering surface implementations
pub trait Surface {
    /// Replace the surface's content with `html`, laid out at `width` CSS pixels.
    fn load_html(&mut self, html: &str, width: u32) -> Result<()>;

    /// Single probe of layout readiness; `true` once computed style is
    /// available for the document root.
    fn is_ready(&mut self) -> Result<bool>;

    /// Ceiling of the bounding-box height of the first element matching
    /// `selector`, or 0 when nothing matches.
    fn element_height(&mut self, selector: &str) -> Result<u32>;

    /// Resize the output frame and capture it as a PNG at device scale 1.
    fn capture_png(&mut self, width: u32, height: u32) -> Result<Vec<u8>>;

    /// Release the underlying engine. Called at most once, by [`SurfaceLease`].
    fn close(&mut self) -> Result<()>;
}

/// Poll [`Surface::is_ready`] until it reports readiness or `timeout` passes.
///
/// A failed probe counts as "not ready yet". When the deadline passes, the
/// last probe's error is returned if it failed, otherwise `Ok(false)`.
pub fn wait_until_ready<S: Surface + ?Sized>(surface: &mut S, timeout: Duration, poll: Duration) -> Result<bool> {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        let last_err = match surface.is_ready() {
            Ok(true) => return Ok(true),
            Ok(false) => None,
            Err(e) => {
                debug!("Readiness probe failed: {}", e);
                Some(e)
            }
        };
        if std::time::Instant::now() >= deadline {
            return match last_err {
                Some(e) => Err(e),
                None => Ok(false),
            };
        }
        std::thread::sleep(poll);
    }
}

/// Scoped ownership of an open surface.
///
/// Dereferences to the surface. [`SurfaceLease::release`] closes it and
/// reports the outcome; if the lease is dropped instead, the surface is closed
/// in `Drop` and any error is logged.
pub struct SurfaceLease<S: Surface> {
    inner: Option<S>,
}

impl<S: Surface> SurfaceLease<S> {
    pub fn new(surface: S) -> Self {
        Self { inner: Some(surface) }
    }

    /// Close the surface now.
    pub fn release(mut self) -> Result<()> {
        match self.inner.take() {
            Some(mut surface) => {
                debug!("Releasing rendering surface");
                surface.close()
            }
            None => Ok(()),
        }
    }
}

impl<S: Surface> Deref for SurfaceLease<S> {
    type Target = S;

    fn deref(&self) -> &S {
        // Only `release` and `drop` take the surface, and both consume the lease.
        match self.inner.as_ref() {
            Some(s) => s,
            None => unreachable!("surface lease used after release"),
        }
    }
}

impl<S: Surface> DerefMut for SurfaceLease<S> {
    fn deref_mut(&mut self) -> &mut S {
        match self.inner.as_mut() {
            Some(s) => s,
            None => unreachable!("surface lease used after release"),
        }
    }
}

impl<S: Surface> Drop for SurfaceLease<S> {
    fn drop(&mut self) {
        if let Some(mut surface) = self.inner.take() {
            debug!("Releasing rendering surface on unwind");
            if let Err(e) = surface.close() {
                warn!("Failed to release rendering surface: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        closes: Arc<AtomicUsize>,
        ready_after: usize,
        failing: usize,
        probes: usize,
    }

    impl Surface for Counting {
        fn load_html(&mut self, _html: &str, _width: u32) -> Result<()> {
            Ok(())
        }

        fn is_ready(&mut self) -> Result<bool> {
            self.probes += 1;
            if self.probes <= self.failing {
                return Err(crate::Error::Render("probe evaluation failed".into()));
            }
            Ok(self.probes > self.ready_after)
        }

        fn element_height(&mut self, _selector: &str) -> Result<u32> {
            Ok(0)
        }

        fn capture_png(&mut self, _width: u32, _height: u32) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }

        fn close(&mut self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn counting(ready_after: usize) -> (Counting, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        (
            Counting {
                closes: closes.clone(),
                ready_after,
                failing: 0,
                probes: 0,
            },
            closes,
        )
    }

    #[test]
    fn release_closes_once() {
        let (s, closes) = counting(0);
        let lease = SurfaceLease::new(s);
        lease.release().unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_closes_once() {
        let (s, closes) = counting(0);
        {
            let _lease = SurfaceLease::new(s);
        }
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panic_still_closes() {
        let (s, closes) = counting(0);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _lease = SurfaceLease::new(s);
            panic!("stage blew up");
        }));
        assert!(result.is_err());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wait_polls_until_ready() {
        let (mut s, _) = counting(3);
        let ok = wait_until_ready(&mut s, Duration::from_secs(5), Duration::from_millis(1)).unwrap();
        assert!(ok);
        assert_eq!(s.probes, 4);
    }

    #[test]
    fn wait_gives_up_at_deadline() {
        let (mut s, _) = counting(usize::MAX);
        let ok = wait_until_ready(&mut s, Duration::from_millis(20), Duration::from_millis(5)).unwrap();
        assert!(!ok);
    }

    #[test]
    fn wait_keeps_polling_after_probe_errors() {
        let (mut s, _) = counting(3);
        s.failing = 2;
        let ok = wait_until_ready(&mut s, Duration::from_secs(5), Duration::from_millis(1)).unwrap();
        assert!(ok);
        assert_eq!(s.probes, 4);
    }

    #[test]
    fn wait_reports_last_probe_error_at_deadline() {
        let (mut s, _) = counting(usize::MAX);
        s.failing = usize::MAX;
        let err = wait_until_ready(&mut s, Duration::from_millis(20), Duration::from_millis(5)).unwrap_err();
        assert!(matches!(err, crate::Error::Render(_)));
        assert!(s.probes > 1);
    }
}
