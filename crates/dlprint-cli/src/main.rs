//! dlprint CLI - drive a DLP resin printer
//!
//! Slices a binary STL (or a built-in test shape) layer by layer, serves each
//! layer image to the browser that feeds the projector, and steps the build
//! stage between exposures.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use dlprint_control::{
    AckMode, Actuator, FrameStore, LineStepper, PrintConfig, PrintController, SimulatedActuator,
    StopHandle,
};
use dlprint_slicer::{
    Cylinder, LayerColor, LayerRasterizer, Mesh, MeshModel, Model, Octahedron,
};
use std::future::Future;
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod keys;
mod server;

/// Display grace period used with `--manual` unless one is given.
const MANUAL_DISPLAY_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Longest wait at exit for blocking work, such as a stage move the board
/// never answered.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "dlprint")]
#[command(about = "Slice STL solids and drive a DLP resin printer", long_about = None)]
struct Cli {
    /// Verbose logging
    #[arg(short = 'D', long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a print job
    Print(PrintArgs),
    /// Rasterize one layer and write raw RGB bytes to stdout
    Slice {
        /// Binary STL file
        #[arg(long)]
        stl: PathBuf,
        /// Slice height
        #[arg(short)]
        z: f64,
        /// Draw lit pixels red instead of white
        #[arg(short, long)]
        red: bool,
        /// Frame width in pixels
        #[arg(long, default_value_t = dlprint_slicer::DEFAULT_WIDTH)]
        width: usize,
        /// Frame height in pixels
        #[arg(long, default_value_t = dlprint_slicer::DEFAULT_HEIGHT)]
        height: usize,
    },
    /// Display information about an STL file
    Info {
        /// Path to the binary STL file
        file: PathBuf,
    },
}

/// Built-in print shapes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum Shape {
    /// Stacked rectangles around a hollow diamond, 80 unit layers
    Octahedron,
    /// Solid disc of radius 20 on each of 40 unit layers
    Cylinder,
}

#[derive(Args, Debug)]
struct PrintArgs {
    /// Binary STL file to print
    #[arg(long, conflicts_with = "shape", required_unless_present = "shape")]
    stl: Option<PathBuf>,
    /// Print a built-in shape instead of a file
    #[arg(long, value_enum)]
    shape: Option<Shape>,
    /// TOML file with job settings; flags override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Height of the first layer
    #[arg(long)]
    start: Option<f64>,
    /// Last height to print
    #[arg(long)]
    end: Option<f64>,
    /// Distance between layers
    #[arg(long)]
    step: Option<f64>,
    /// Exposure per layer in milliseconds
    #[arg(short, long)]
    duration: Option<u64>,
    /// Draw lit pixels red instead of white
    #[arg(short, long)]
    red: bool,
    /// Serve frames to a browser; the browser acknowledges exposures
    #[arg(short, long)]
    server: bool,
    /// Port for the frame server
    #[arg(long, default_value_t = server::DEFAULT_PORT)]
    port: u16,
    /// Use a simulated stage instead of hardware
    #[arg(short = 'T', long)]
    test: bool,
    /// Acknowledge exposures by key press ('n' next layer, 'q' stop)
    #[arg(long)]
    manual: bool,
    /// Stepper board device, e.g. /dev/ttyACM0
    #[arg(long, conflicts_with = "test")]
    device: Option<PathBuf>,
    /// Stepper steps per layer
    #[arg(long)]
    steps_per_layer: Option<i64>,
    /// Frame width in pixels
    #[arg(long)]
    width: Option<usize>,
    /// Frame height in pixels
    #[arg(long)]
    height: Option<usize>,
    /// Seconds beyond the exposure to wait for an acknowledgment
    #[arg(long)]
    display_timeout: Option<f64>,
    /// Seconds one stage move may take
    #[arg(long)]
    actuator_timeout: Option<f64>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.debug);
    block_on(run(cli.command))?
}

/// Drive `fut` on a fresh runtime, then shut it down without waiting more
/// than [`SHUTDOWN_GRACE`] for blocking tasks still in flight.
fn block_on<F: Future>(fut: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let output = runtime.block_on(fut);
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    Ok(output)
}

async fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Print(args) => run_print(args).await,
        Commands::Slice {
            stl,
            z,
            red,
            width,
            height,
        } => {
            slice_to_stdout(&stl, z, LayerColor::from_red_flag(red), width, height)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Info { file } => {
            show_info(&file)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Layer the TOML file (if any) and the command-line flags into one config.
fn build_config(args: &PrintArgs) -> Result<PrintConfig> {
    let mut config = match &args.config {
        Some(path) => PrintConfig::from_toml_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PrintConfig::default(),
    };

    if let Some(start) = args.start {
        config.start_height = start;
    }
    if args.end.is_some() {
        config.end_height = args.end;
    }
    match args.step {
        Some(step) => config.layer_step = step,
        // The built-in shape is drawn in whole layers.
        None if args.shape.is_some() && args.config.is_none() => config.layer_step = 1.0,
        None => {}
    }
    if let Some(ms) = args.duration {
        config.exposure_ms = ms;
    }
    if args.red {
        config.color = LayerColor::Highlight;
    }
    if let Some(steps) = args.steps_per_layer {
        config.steps_per_layer = steps;
    }
    if let Some(width) = args.width {
        config.width = width;
    }
    if let Some(height) = args.height {
        config.height = height;
    }
    match args.display_timeout {
        Some(secs) => config.display_timeout_ms = seconds_to_ms(secs)?,
        None if args.manual => config.display_timeout_ms = MANUAL_DISPLAY_TIMEOUT.as_millis() as u64,
        None => {}
    }
    if let Some(secs) = args.actuator_timeout {
        config.actuator_timeout_ms = seconds_to_ms(secs)?;
    }

    config.validate()?;
    Ok(config)
}

fn seconds_to_ms(secs: f64) -> Result<u64> {
    if !(secs.is_finite() && secs > 0.0) {
        bail!("timeout must be a positive number of seconds, got {secs}");
    }
    Ok((secs * 1000.0).round() as u64)
}

fn ack_mode(args: &PrintArgs) -> AckMode {
    if args.manual {
        AckMode::Manual
    } else if args.server {
        AckMode::Client
    } else {
        AckMode::Timer
    }
}

fn load_model(args: &PrintArgs) -> Result<Arc<dyn Model>> {
    match args.shape {
        Some(Shape::Octahedron) => return Ok(Arc::new(Octahedron)),
        Some(Shape::Cylinder) => return Ok(Arc::new(Cylinder::default())),
        None => {}
    }
    let Some(path) = &args.stl else {
        bail!("either --stl or --shape is required");
    };
    let mesh = Mesh::load(path).with_context(|| format!("failed to load {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Arc::new(MeshModel::new(name, mesh)?))
}

fn open_actuator(args: &PrintArgs) -> Result<Arc<dyn Actuator>> {
    if args.test {
        return Ok(Arc::new(SimulatedActuator::new()));
    }
    let Some(device) = &args.device else {
        bail!("no stage to drive: pass --device PATH, or --test to simulate one");
    };
    let stepper = LineStepper::open(device)
        .with_context(|| format!("failed to open stepper device {}", device.display()))?;
    Ok(Arc::new(stepper))
}

async fn run_print(args: PrintArgs) -> Result<ExitCode> {
    let config = build_config(&args)?;
    let model = load_model(&args)?;
    let actuator = open_actuator(&args)?;
    let frames = Arc::new(FrameStore::new(ack_mode(&args)));
    let stop = StopHandle::new();

    let controller = PrintController::new(
        config,
        model,
        frames.clone(),
        actuator,
        &stop,
    )?;
    let states = controller.subscribe_state();

    if args.server {
        let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        info!("Serving frames on http://{}", addr);
        let app = server::router(server::AppState {
            frames: frames.clone(),
            state: states.clone(),
        });
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                warn!(error = %e, "frame server stopped");
            }
        });
    }

    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, stopping");
                stop.request_stop();
            }
        });
    }

    let keys = args.manual.then(|| {
        let frames = frames.clone();
        let stop = stop.clone();
        let states = states.clone();
        tokio::task::spawn_blocking(move || keys::run(&frames, &stop, &states))
    });

    let report = controller.run().await;

    if let Some(keys) = keys {
        match keys.await {
            Ok(Err(e)) => warn!(error = %e, "key input failed"),
            Err(e) => warn!(error = %e, "key input task panicked"),
            Ok(Ok(())) => {}
        }
    }

    println!("{}", serde_json::to_string(&report)?);
    Ok(ExitCode::from(report.exit_code() as u8))
}

fn slice_to_stdout(
    path: &Path,
    z: f64,
    color: LayerColor,
    width: usize,
    height: usize,
) -> Result<()> {
    let mesh = Mesh::load(path).with_context(|| format!("failed to load {}", path.display()))?;
    let rasterizer = LayerRasterizer::for_mesh(&mesh, width, height, color)?;
    let layer = rasterizer.rasterize(&mesh, z)?;
    if layer.truncated_scanlines > 0 {
        warn!(
            truncated = layer.truncated_scanlines,
            "mesh is not watertight at this height"
        );
    }

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(layer.canvas.as_rgb())?;
    stdout.flush()?;
    Ok(())
}

fn show_info(file: &Path) -> Result<()> {
    let mesh = Mesh::load(file).with_context(|| format!("failed to load {}", file.display()))?;

    println!("STL file: {}", file.display());
    println!("  Preamble: {}", mesh.preamble());
    println!("  Triangles: {}", mesh.len());
    let degenerate = mesh.degenerate_count();
    if degenerate > 0 {
        println!("  Degenerate triangles: {}", degenerate);
    }

    let bbox = mesh.bbox();
    match (bbox.min(), bbox.max(), bbox.size()) {
        (Some(min), Some(max), Some(size)) => {
            println!("\nBounds:");
            println!("  Min: {}", min);
            println!("  Max: {}", max);
            println!("  Size: {}", size);
        }
        _ => println!("\nBounds: empty"),
    }

    Ok(())
}
