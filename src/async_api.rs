use crate::pipeline::{CaptureSummary, Pipeline};
use crate::surface::Surface;
use crate::{CaptureRequest, Error, RenderConfig, Result};
use std::sync::mpsc::{self, Sender};
use std::thread;
use tokio::sync::oneshot;

enum Command {
    Capture(CaptureRequest, oneshot::Sender<Result<CaptureSummary>>),
    Close(oneshot::Sender<Result<()>>),
}

/// An async-friendly capture service backed by a dedicated worker thread.
///
/// The worker thread owns the pipeline and runs invocations one after
/// another, so async callers never block their runtime on browser I/O. Each
/// invocation still opens and releases its own surface.
#[derive(Clone)]
pub struct Screenshotter {
    cmd_tx: Sender<Command>,
}

impl Screenshotter {
    /// Start the worker. Fails if the pipeline configuration is invalid.
    pub async fn new<S, F>(pipeline: Pipeline, open: F) -> Result<Self>
    where
        S: Surface + 'static,
        F: Fn(&RenderConfig) -> Result<S> + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx): (oneshot::Sender<Result<()>>, oneshot::Receiver<Result<()>>) =
            oneshot::channel();

        thread::Builder::new()
            .name("chatshot-async".into())
            .spawn(move || {
                if let Err(err) = pipeline.config().validate() {
                    let _ = init_tx.send(Err(err));
                    return;
                }
                let _ = init_tx.send(Ok(()));

                while let Ok(cmd) = cmd_rx.recv() {
                    match cmd {
                        Command::Capture(request, resp) => {
                            let res = pipeline.capture(&request, &open);
                            let _ = resp.send(res);
                        }
                        Command::Close(resp) => {
                            let _ = resp.send(Ok(()));
                            break;
                        }
                    }
                }
            })?;

        // Wait for the worker to report initialization success or failure
        let init_res = init_rx
            .await
            .map_err(|e| Error::Render(format!("Worker init canceled: {}", e)))?;
        init_res?;

        Ok(Self { cmd_tx })
    }

    /// Start a worker that launches headless Chrome for every capture.
    #[cfg(feature = "cdp")]
    pub async fn with_chrome(pipeline: Pipeline) -> Result<Self> {
        Self::new(pipeline, crate::cdp::CdpSurface::open).await
    }

    /// Run one capture on the worker.
    pub async fn capture(&self, request: CaptureRequest) -> Result<CaptureSummary> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Capture(request, tx))
            .map_err(|_| Error::Render("capture worker has shut down".into()))?;
        rx.await
            .map_err(|e| Error::Render(format!("Capture canceled: {}", e)))?
    }

    /// Shut the worker down after in-flight captures finish.
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Close(tx));
        rx.await
            .map_err(|e| Error::Render(format!("Close canceled: {}", e)))?
    }
}
