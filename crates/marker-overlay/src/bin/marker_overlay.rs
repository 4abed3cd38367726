//! Render one frame with marker overlays and write the composite.

use std::{
    fs,
    path::{Path, PathBuf},
};

use clap::Parser;
use image::RgbImage;
use marker_overlay::render::{Capability, Color, MatrixMode, Primitive, Vertex};
use marker_overlay::{
    ImageSize, InputOrder, MarkerOverlay, OverlayConfig, RecordingContext, RenderContext,
    ReplayDetector, SoftwareContext,
};
use nalgebra::Matrix4;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "marker-overlay")]
#[command(about = "Composite 3D marker overlays over a camera frame")]
#[command(version)]
struct Cli {
    /// Overlay configuration (JSON).
    #[arg(long)]
    config: PathBuf,

    /// Input frame.
    #[arg(long)]
    image: PathBuf,

    /// Recorded detections to replay (JSON); without it no markers are found.
    #[arg(long)]
    detections: Option<PathBuf>,

    /// Where to write the composite image.
    #[arg(long, default_value = "overlay.png")]
    output: PathBuf,

    /// Also write the recorded render commands (JSON).
    #[arg(long)]
    commands: Option<PathBuf>,

    /// Render target width; defaults to the frame width.
    #[arg(long, requires = "height")]
    width: Option<u32>,

    /// Render target height; defaults to the frame height.
    #[arg(long, requires = "width")]
    height: Option<u32>,

    /// Log at debug level.
    #[arg(long, short)]
    verbose: bool,

    /// Emit JSON log lines (only with the `tracing` feature).
    #[arg(long)]
    json_logs: bool,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs)?;
    run(&cli)
}

#[cfg(feature = "tracing")]
fn init_logging(_verbose: bool, json: bool) -> CliResult<()> {
    use marker_overlay::core::LogFormat;
    let format = if json { LogFormat::Json } else { LogFormat::Text };
    marker_overlay::core::init_tracing(format)?;
    Ok(())
}

#[cfg(not(feature = "tracing"))]
fn init_logging(verbose: bool, json: bool) -> CliResult<()> {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    marker_overlay::core::init_with_level(level)?;
    if json {
        log::warn!("--json-logs needs the `tracing` feature; using plain logs");
    }
    Ok(())
}

fn run(cli: &Cli) -> CliResult<()> {
    let mut config = OverlayConfig::load_json(&cli.config)?;
    config.camera_path = resolve_relative(&cli.config, &config.camera_path);
    config.label_font_path = config
        .label_font_path
        .as_deref()
        .map(|p| resolve_relative(&cli.config, p));
    // Decoded files are RGB regardless of how the camera delivers frames.
    config.input_order = InputOrder::Rgb;

    let detector = match &cli.detections {
        Some(path) => ReplayDetector::load_json(path)?,
        None => ReplayDetector::default(),
    };

    let frame = image::open(&cli.image)
        .map_err(|e| -> CliError { format!("failed to open {}: {e}", cli.image.display()).into() })?
        .to_rgb8();
    log::info!(
        "frame {}: {}x{}",
        cli.image.display(),
        frame.width(),
        frame.height()
    );

    let mut overlay = MarkerOverlay::new(config, detector)?;
    overlay.do_work(&frame);
    if let (Some(w), Some(h)) = (cli.width, cli.height) {
        overlay.resize(w, h);
    }
    let markers = overlay.process_frame(&frame).len();

    let mut software = SoftwareContext::new(overlay.window_size());
    let mut recording = RecordingContext::new();
    let stats = {
        let mut tee = Tee {
            first: &mut software,
            second: &mut recording,
        };
        overlay.draw_scene(&mut tee)
    };

    let ImageSize { width, height } = overlay.window_size();
    software.image().save(&cli.output)?;
    println!(
        "{markers} marker(s), {} overlay(s) drawn, {} excluded; wrote {width}x{height} composite to {}",
        stats.drawn,
        stats.excluded,
        cli.output.display()
    );

    if let Some(path) = &cli.commands {
        let json = serde_json::to_string_pretty(recording.commands())?;
        fs::write(path, json)?;
        println!(
            "wrote {} render command(s) to {}",
            recording.commands().len(),
            path.display()
        );
    }
    Ok(())
}

/// Paths inside the config are relative to the config file.
fn resolve_relative(config_path: &Path, path: &str) -> String {
    let p = Path::new(path);
    if p.is_absolute() {
        return path.to_string();
    }
    match config_path.parent() {
        Some(dir) => dir.join(p).to_string_lossy().into_owned(),
        None => path.to_string(),
    }
}

/// Forwards every call to two contexts, so one pass both composites and
/// records the frame.
struct Tee<'a> {
    first: &'a mut SoftwareContext,
    second: &'a mut RecordingContext,
}

impl RenderContext for Tee<'_> {
    fn matrix_mode(&mut self, mode: MatrixMode) {
        self.first.matrix_mode(mode);
        self.second.matrix_mode(mode);
    }

    fn load_identity(&mut self) {
        self.first.load_identity();
        self.second.load_identity();
    }

    fn load_matrix(&mut self, m: &Matrix4<f64>) {
        self.first.load_matrix(m);
        self.second.load_matrix(m);
    }

    fn ortho(&mut self, left: f64, right: f64, bottom: f64, top: f64, near: f64, far: f64) {
        self.first.ortho(left, right, bottom, top, near, far);
        self.second.ortho(left, right, bottom, top, near, far);
    }

    fn translate(&mut self, x: f64, y: f64, z: f64) {
        self.first.translate(x, y, z);
        self.second.translate(x, y, z);
    }

    fn push_matrix(&mut self) {
        self.first.push_matrix();
        self.second.push_matrix();
    }

    fn pop_matrix(&mut self) {
        self.first.pop_matrix();
        self.second.pop_matrix();
    }

    fn viewport(&mut self, x: i32, y: i32, size: ImageSize) {
        self.first.viewport(x, y, size);
        self.second.viewport(x, y, size);
    }

    fn enable(&mut self, cap: Capability) {
        self.first.enable(cap);
        self.second.enable(cap);
    }

    fn disable(&mut self, cap: Capability) {
        self.first.disable(cap);
        self.second.disable(cap);
    }

    fn pixel_zoom(&mut self, x: f32, y: f32) {
        self.first.pixel_zoom(x, y);
        self.second.pixel_zoom(x, y);
    }

    fn raster_pos(&mut self, x: f64, y: f64, z: f64) {
        self.first.raster_pos(x, y, z);
        self.second.raster_pos(x, y, z);
    }

    fn draw_pixels(&mut self, image: &RgbImage) {
        self.first.draw_pixels(image);
        self.second.draw_pixels(image);
    }

    fn color(&mut self, color: Color) {
        self.first.color(color);
        self.second.color(color);
    }

    fn draw(&mut self, primitive: Primitive, vertices: &[Vertex]) {
        self.first.draw(primitive, vertices);
        self.second.draw(primitive, vertices);
    }
}
