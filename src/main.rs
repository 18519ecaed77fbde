use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use chatshot::server::DEFAULT_PORT;
use chatshot::RenderConfig;

#[derive(Parser, Debug)]
#[command(name = "chatshot", version, about = "Render chat transcripts into phone-sized screenshots")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the screenshot API over HTTP.
    Serve(ServeArgs),
    /// Render one request file and print the JSON response.
    Render(RenderArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Interface to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Request worker threads (defaults to the number of CPUs).
    #[arg(long)]
    workers: Option<usize>,

    #[command(flatten)]
    render: RenderOpts,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Request JSON: {"messages": [...], "currentUser": "...", "contactName": "..."}.
    #[arg(long = "input")]
    input: PathBuf,

    #[command(flatten)]
    render: RenderOpts,
}

#[derive(Args, Debug)]
struct RenderOpts {
    /// Directory that receives one session directory per capture.
    #[arg(long, default_value = "screenshots")]
    output: PathBuf,

    /// Browser executable (auto-detected when omitted).
    #[arg(long)]
    chrome: Option<PathBuf>,

    /// Maximum wait for the page layout to settle, in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    ready_timeout_ms: u64,

    /// Keep Chrome's process sandbox enabled.
    #[arg(long)]
    sandbox: bool,
}

impl RenderOpts {
    #[cfg_attr(not(feature = "cdp"), allow(dead_code))]
    fn to_config(&self) -> RenderConfig {
        RenderConfig {
            output_root: self.output.clone(),
            chrome_path: self.chrome.clone(),
            ready_timeout_ms: self.ready_timeout_ms,
            sandbox: self.sandbox,
            ..Default::default()
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Serve(args) => serve(args),
        Command::Render(args) => render(args),
    }
}

#[cfg(feature = "cdp")]
fn serve(args: ServeArgs) -> anyhow::Result<()> {
    use chatshot::pipeline::Pipeline;
    use chatshot::server::{ScreenshotServer, ServerConfig};

    let defaults = ServerConfig::default();
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        workers: args.workers.unwrap_or(defaults.workers),
        ..defaults
    };
    let pipeline = Pipeline::new(args.render.to_config());

    let server = ScreenshotServer::bind(config, pipeline, chatshot::cdp::CdpSurface::open)?;
    server.run()?;
    Ok(())
}

#[cfg(feature = "cdp")]
fn render(args: RenderArgs) -> anyhow::Result<()> {
    use anyhow::Context as _;
    use chatshot::pipeline::Pipeline;
    use chatshot::{CaptureRequest, CaptureResponse};

    let body = std::fs::read(&args.input).with_context(|| format!("reading {}", args.input.display()))?;

    let result = CaptureRequest::from_json(&body)
        .and_then(|request| Pipeline::new(args.render.to_config()).capture(&request, chatshot::cdp::CdpSurface::open));
    let (status, response) = CaptureResponse::from_result(&result);

    println!("{}", serde_json::to_string_pretty(&response)?);
    if status != 200 {
        anyhow::bail!("capture failed with status {}", status);
    }
    Ok(())
}

#[cfg(not(feature = "cdp"))]
fn serve(_args: ServeArgs) -> anyhow::Result<()> {
    anyhow::bail!("chatshot was built without a rendering backend; enable the `cdp` feature")
}

#[cfg(not(feature = "cdp"))]
fn render(_args: RenderArgs) -> anyhow::Result<()> {
    anyhow::bail!("chatshot was built without a rendering backend; enable the `cdp` feature")
}
