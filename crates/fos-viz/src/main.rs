//! fOS-Viz: Terminal Compositor Viewer
//!
//! Main entry point. Initializes the global allocator, sets up logging,
//! starts the display host and serves compositor clients on a Unix socket.
//! The terminal on stdout is the rendering surface, so logs go to stderr.

mod config;
mod transport;

use anyhow::{Context, Result};
use config::ViewerConfig;
use fos_display::{default_hooks, DisplayEvent, DisplayHost, PaintCallback};
use fos_gfx::{Bitmap, Rect};
use fos_render::{Painter, RenderCommandService, RendererHandle, TerminalRenderer};
use std::sync::Arc;
use std::thread;
use tokio::net::UnixListener;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

// Use mimalloc as the global allocator for reduced memory fragmentation
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ViewerConfig::load()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("Invalid log level")?;
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    info!("fOS-Viz starting...");
    info!("Using mimalloc allocator");

    let (columns, rows) = config.grid_size();
    let true_color = config.true_color();
    info!(
        "Terminal surface {}x{} cells, true color: {}",
        columns, rows, true_color
    );

    let renderer = RendererHandle::with_renderer(TerminalRenderer::new(
        columns,
        rows,
        config.cell,
        Painter::new(std::io::stdout(), true_color),
    ));

    let paint_target = renderer.clone();
    let paint: PaintCallback = Arc::new(move |rect: Rect, bitmap: &Bitmap| {
        if let Err(e) = paint_target.present_bitmap(rect, bitmap) {
            warn!("Failed to present {}: {}", rect, e);
        }
    });

    let host = DisplayHost::spawn(config.updater(), paint, default_hooks());
    let events = host.events().clone();
    thread::Builder::new()
        .name("display-events".to_string())
        .spawn(move || {
            for event in events.iter() {
                match event {
                    DisplayEvent::ConnectionClosed { connection, reason } => {
                        warn!("{} closed: {}", connection, reason);
                    }
                }
            }
        })
        .context("Failed to spawn event thread")?;

    let service = Arc::new(RenderCommandService::new(renderer.clone()));

    // A previous run may have left its socket behind
    let _ = std::fs::remove_file(&config.socket_path);
    let listener = UnixListener::bind(&config.socket_path)
        .with_context(|| format!("Failed to bind {}", config.socket_path.display()))?;
    info!("Listening on {}", config.socket_path.display());

    let outcome = tokio::select! {
        result = transport::serve(listener, host.handle(), service) => {
            if let Err(e) = &result {
                error!("Transport failed: {:#}", e);
            }
            result
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            Ok(())
        }
    };

    host.shutdown();
    if let Err(e) = renderer.finish() {
        warn!("Failed to restore terminal: {}", e);
    }
    let _ = std::fs::remove_file(&config.socket_path);

    info!("fOS-Viz shutting down");
    outcome
}
