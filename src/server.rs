//! HTTP boundary
//!
//! `POST /api/screenshot` with a JSON [`CaptureRequest`] body runs one
//! pipeline invocation and answers with a [`CaptureResponse`]. A fixed pool
//! of worker threads pulls requests from one listener; each request opens
//! its own rendering surface, so concurrent requests never share one.

use std::io::Read;
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread;

use log::{error, info, warn};
use tiny_http::{Header, Method, Request, Response};

use crate::pipeline::Pipeline;
use crate::surface::Surface;
use crate::{CaptureRequest, CaptureResponse, Error, RenderConfig, Result};

/// Route served by [`ScreenshotServer`]
pub const SCREENSHOT_ROUTE: &str = "/api/screenshot";

/// Port used when `PORT` is not set
pub const DEFAULT_PORT: u16 = 9090;

/// Listener configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Number of request-handling threads
    pub workers: usize,
    /// Largest accepted request body
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            workers: num_cpus::get(),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A bound listener plus the pipeline it drives
pub struct ScreenshotServer<S, F> {
    listener: Arc<tiny_http::Server>,
    pipeline: Arc<Pipeline>,
    open: Arc<F>,
    config: ServerConfig,
    _surface: PhantomData<fn() -> S>,
}

impl<S, F> ScreenshotServer<S, F>
where
    S: Surface + 'static,
    F: Fn(&RenderConfig) -> Result<S> + Send + Sync + 'static,
{
    /// Bind the listener. Port 0 picks a free port.
    pub fn bind(config: ServerConfig, pipeline: Pipeline, open: F) -> Result<Self> {
        let listener = tiny_http::Server::http(config.bind_address())
            .map_err(|e| Error::Config(format!("cannot listen on {}: {}", config.bind_address(), e)))?;
        Ok(Self {
            listener: Arc::new(listener),
            pipeline: Arc::new(pipeline),
            open: Arc::new(open),
            config,
            _surface: PhantomData,
        })
    }

    /// Address actually bound, e.g. `127.0.0.1:40123`.
    pub fn local_addr(&self) -> String {
        self.listener.server_addr().to_string()
    }

    /// Serve until the listener shuts down. Blocks the calling thread.
    pub fn run(self) -> Result<()> {
        let workers = self.config.workers.max(1);
        info!("Server listening on {}", self.local_addr());
        info!("API endpoint available at http://{}{}", self.local_addr(), SCREENSHOT_ROUTE);

        let handles: Vec<_> = (0..workers)
            .map(|n| {
                let listener = self.listener.clone();
                let pipeline = self.pipeline.clone();
                let open = self.open.clone();
                let max_body = self.config.max_body_bytes;
                thread::Builder::new()
                    .name(format!("chatshot-worker-{}", n))
                    .spawn(move || {
                        for request in listener.incoming_requests() {
                            handle(request, &pipeline, open.as_ref(), max_body);
                        }
                    })
            })
            .collect::<std::io::Result<_>>()?;

        for handle in handles {
            if handle.join().is_err() {
                error!("Worker thread panicked");
            }
        }
        Ok(())
    }
}

fn handle<S, F>(mut request: Request, pipeline: &Pipeline, open: &F, max_body: usize)
where
    S: Surface,
    F: Fn(&RenderConfig) -> Result<S>,
{
    let method = request.method().clone();
    let url = request.url().to_string();

    let body = if method == Method::Post {
        match read_body(&mut request, max_body) {
            Ok(body) => Some(body),
            Err((status, message)) => {
                respond(request, status, &failure(message));
                return;
            }
        }
    } else {
        None
    };

    let (status, response) = route(&method, &url, body.as_deref(), pipeline, open);
    respond(request, status, &response);
}

/// Dispatch one request. Separate from the socket so it can be tested directly.
pub fn route<S, F>(method: &Method, url: &str, body: Option<&[u8]>, pipeline: &Pipeline, open: &F) -> (u16, CaptureResponse)
where
    S: Surface,
    F: Fn(&RenderConfig) -> Result<S>,
{
    let path = url.split('?').next().unwrap_or("");
    if path != SCREENSHOT_ROUTE {
        return (404, failure("Not found".into()));
    }
    if *method != Method::Post {
        return (405, failure(format!("Method {} not allowed", method)));
    }

    let request = match CaptureRequest::from_json(body.unwrap_or_default()) {
        Ok(r) => r,
        Err(e) => {
            warn!("Rejected request: {}", e);
            return (e.status_code(), CaptureResponse::failure(&e));
        }
    };

    CaptureResponse::from_result(&pipeline.capture(&request, open))
}

fn read_body(request: &mut Request, max_body: usize) -> std::result::Result<Vec<u8>, (u16, String)> {
    if request.body_length().map(|len| len > max_body).unwrap_or(false) {
        return Err((413, format!("Request body exceeds {} bytes", max_body)));
    }
    let mut body = Vec::new();
    request
        .as_reader()
        .take(max_body as u64 + 1)
        .read_to_end(&mut body)
        .map_err(|e| (400, format!("Could not read request body: {}", e)))?;
    if body.len() > max_body {
        return Err((413, format!("Request body exceeds {} bytes", max_body)));
    }
    Ok(body)
}

fn failure(message: String) -> CaptureResponse {
    CaptureResponse {
        success: false,
        message,
        chunk_count: None,
        planned_count: None,
        location: None,
    }
}

fn respond(request: Request, status: u16, body: &CaptureResponse) {
    let json = serde_json::to_string(body)
        .unwrap_or_else(|_| r#"{"success":false,"message":"serialization failed"}"#.to_string());
    let mut response = Response::from_string(json).with_status_code(status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        response = response.with_header(header);
    }
    if let Err(e) = request.respond(response) {
        warn!("Failed to send response: {}", e);
    }
}
