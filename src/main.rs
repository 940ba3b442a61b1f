//! Player entry point.
//!
//! Opens a window (or a headless target in dump mode), loads the tune, the
//! tracks and the assets, then runs the session loop until the demo ends.

use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Fullscreen, Window, WindowId};

use vlee::assets::{DemoAssets, FsAssets};
use vlee::audio::{CpalTransport, Pcm};
use vlee::camera::{CameraRig, Projection};
use vlee::export::{dump_frames, DumpSettings};
use vlee::particles::ParticleCloud;
use vlee::playback::{FrameClock, FrameOutcome, OfflineClock, Session};
use vlee::render::{letterbox, GpuBackend, Renderer, SurfacePlan, Viewport, WgpuBackend};
use vlee::sync::{channel_link, load_tracks, EditorCommand, EditorEndpoint, EditorLink, Standalone, TimelineEvaluator};
use vlee::{Config, PlayerError};

#[derive(Parser, Debug)]
#[command(name = "vlee", version, about = "Synchronised real-time demo player")]
struct Cli {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Accept editor commands as JSON lines on stdin and report rows on stdout.
    #[arg(long)]
    live: bool,

    /// Render frames offline into this directory instead of opening a window.
    #[arg(long)]
    dump: Option<PathBuf>,

    /// Frame rate of the dump.
    #[arg(long, default_value_t = 60.0)]
    fps: f64,

    /// Stop the dump after this many frames.
    #[arg(long)]
    frames: Option<u64>,

    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    config.live |= cli.live;
    config.validate()?;

    let timeline = load_tracks(&config.tracks_path())
        .with_context(|| format!("loading tracks from {}", config.tracks_path().display()))?;
    let pcm = Pcm::load_raw_f32(&config.tune_path(), config.tune_sample_rate, config.tune_channels)?;
    tracing::info!(
        tracks = timeline.len(),
        seconds = pcm.duration_seconds(),
        bpm = config.bpm,
        live = config.live,
        "demo data loaded"
    );

    if let Some(dir) = cli.dump {
        let settings = DumpSettings {
            fps: cli.fps,
            max_frames: cli.frames,
        };
        return run_dump(&config, timeline, &pcm, &dir, &settings);
    }

    if config.live {
        let (link, endpoint) = channel_link();
        spawn_stdio_bridge(endpoint);
        run_window(config, timeline, pcm, link)
    } else {
        run_window(config, timeline, pcm, Standalone)
    }
}

/// Viewport inside a `width` x `height` output
fn viewport_for(config: &Config, width: u32, height: u32) -> Viewport {
    let monitor_aspect = config
        .monitor_aspect
        .unwrap_or(width as f32 / height.max(1) as f32);
    letterbox(width, height, monitor_aspect, config.demo_aspect)
}

/// Allocate surfaces, upload assets and assemble the renderer
fn build_renderer<B: GpuBackend + 'static>(
    mut backend: B,
    viewport: Viewport,
    config: &Config,
) -> Result<Renderer<B>, PlayerError> {
    let plan = SurfacePlan::new(viewport);
    backend.create_surfaces(&plan)?;
    let assets = FsAssets::new(&config.data_dir);
    let demo = DemoAssets::load(&assets, &mut backend, config.color_maps.as_deref())?;
    let cloud = ParticleCloud::generate(config.cloud_particles);
    Ok(Renderer::new(
        backend,
        plan,
        demo.scene,
        demo.post,
        cloud,
        config.particle_capacity,
    )?)
}

fn camera_rig(config: &Config) -> CameraRig {
    CameraRig::new(Projection::new(config.demo_aspect))
}

fn run_dump(
    config: &Config,
    timeline: TimelineEvaluator,
    pcm: &Pcm,
    dir: &std::path::Path,
    settings: &DumpSettings,
) -> anyhow::Result<()> {
    let viewport = viewport_for(config, config.width, config.height);
    let backend = WgpuBackend::headless(config.width, config.height, config.particle_capacity)?;
    let renderer = build_renderer(backend, viewport, config)?;

    let clock = FrameClock::new(
        OfflineClock::new(Some(pcm.duration_seconds())),
        config.bpm,
        config.rows_per_beat,
    );
    let mut session = Session::new(clock, Standalone, timeline, camera_rig(config), renderer)?;
    dump_frames(&mut session, dir, settings)?;
    Ok(())
}

/// Forward JSON editor commands from stdin and print playhead rows to stdout
fn spawn_stdio_bridge(endpoint: EditorEndpoint) {
    let EditorEndpoint { commands, rows } = endpoint;
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<EditorCommand>(&line) {
                Ok(command) => {
                    if commands.send(command).is_err() {
                        break;
                    }
                }
                Err(err) => tracing::warn!(%err, line = %line, "ignoring editor command"),
            }
        }
    });
    std::thread::spawn(move || {
        for row in rows.iter() {
            println!("{}", row);
        }
    });
}

fn run_window<L: EditorLink>(
    config: Config,
    timeline: TimelineEvaluator,
    pcm: Pcm,
    link: L,
) -> anyhow::Result<()> {
    let event_loop = EventLoop::new().context("creating event loop")?;
    let mut app = App {
        config,
        pending: Some((timeline, pcm, link)),
        window: None,
        session: None,
        error: None,
    };
    event_loop.run_app(&mut app).context("running event loop")?;

    match app.error {
        Some(err) => Err(err.into()),
        None => {
            if let Some(session) = &app.session {
                tracing::info!(frames = session.frames(), "playback finished");
            }
            Ok(())
        }
    }
}

struct App<L: EditorLink> {
    config: Config,
    /// Demo data waiting for the window to exist
    pending: Option<(TimelineEvaluator, Pcm, L)>,
    window: Option<Arc<Window>>,
    session: Option<Session<CpalTransport, L, WgpuBackend>>,
    error: Option<PlayerError>,
}

impl<L: EditorLink> App<L> {
    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<(), PlayerError> {
        let Some((timeline, pcm, link)) = self.pending.take() else {
            return Ok(());
        };

        let mut attributes = Window::default_attributes()
            .with_title("vlee")
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height))
            .with_resizable(false);
        if self.config.fullscreen {
            attributes = attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|e| PlayerError::Window(e.to_string()))?,
        );
        window.set_cursor_visible(!self.config.fullscreen);

        let size = window.inner_size();
        let viewport = viewport_for(&self.config, size.width, size.height);
        let backend = WgpuBackend::new(Arc::clone(&window), self.config.vsync, self.config.particle_capacity)?;
        let renderer = build_renderer(backend, viewport, &self.config)?;

        let mut clock = FrameClock::new(CpalTransport::new(pcm)?, self.config.bpm, self.config.rows_per_beat);
        if self.config.live {
            clock = clock.with_lookahead(self.config.live_lookahead_rows);
        }
        let mut session = Session::new(clock, link, timeline, camera_rig(&self.config), renderer)?;
        session.clock_mut().audio_mut().play()?;

        window.request_redraw();
        self.window = Some(window);
        self.session = Some(session);
        Ok(())
    }

    /// Follow the window size, which a fullscreen window may only report
    /// after creation
    fn resize(&mut self, size: PhysicalSize<u32>) -> Result<(), PlayerError> {
        let Some(session) = &mut self.session else {
            return Ok(());
        };
        if size.width == 0 || size.height == 0 {
            return Ok(());
        }
        let viewport = viewport_for(&self.config, size.width, size.height);
        let renderer = session.renderer_mut();
        renderer.backend_mut().resize(size.width, size.height);
        renderer.resize(viewport)?;
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: PlayerError) {
        self.error = Some(err);
        self.stop(event_loop);
    }

    fn stop(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(session) = &mut self.session {
            session.terminate();
            session.clock_mut().audio_mut().stop();
        }
        event_loop.exit();
    }
}

impl<L: EditorLink> ApplicationHandler for App<L> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(err) = self.start(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.stop(event_loop),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => self.stop(event_loop),
            WindowEvent::Resized(size) => {
                if let Err(err) = self.resize(size) {
                    self.fail(event_loop, err);
                }
            }
            WindowEvent::RedrawRequested => {
                let Some(session) = &mut self.session else {
                    return;
                };
                match session.frame() {
                    Ok(FrameOutcome::Rendered { .. }) => {
                        if let Some(window) = &self.window {
                            window.request_redraw();
                        }
                    }
                    Ok(FrameOutcome::Finished) => self.stop(event_loop),
                    Err(err) => self.fail(event_loop, err.into()),
                }
            }
            _ => {}
        }
    }
}
