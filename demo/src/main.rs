use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use common::StatusEvent;
use view::cache::MediaCache;
use view::config::PlayerConfig;
use view::player::MediaPlayer;
use view::player::gst::GstPlayer;
use view::{Surface, VideoView};

#[derive(Parser)]
#[command(name = "nagi")]
#[command(about = "Minimal host playing a media URL through the video view", long_about = None)]
#[command(version)]
struct Cli {
    /// Media URL or local file to play
    url: String,

    /// Prepare only; playback starts on the first explicit resume
    #[arg(long)]
    paused: bool,

    /// Container size used for surface layout, WIDTHxHEIGHT
    #[arg(long, default_value = "1080x1920")]
    container: String,

    /// Stop after this many seconds instead of running until Ctrl-C
    #[arg(long)]
    run_for: Option<u64>,

    /// Config file path (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    log::info!("Starting Nagi demo player v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => PlayerConfig::load_from(path)?,
        None => PlayerConfig::load()?,
    };
    log::info!(
        "  Buffer window: {}-{}ms (playback {}ms, rebuffer {}ms)",
        config.buffer.min_buffer_ms,
        config.buffer.max_buffer_ms,
        config.buffer.playback_buffer_ms,
        config.buffer.rebuffer_ms
    );
    log::info!(
        "  Media cache: {} ({} MiB window, {} MiB per file)",
        config.cache.resolved_dir().display(),
        config.cache.max_cache_bytes / (1024 * 1024),
        config.cache.max_file_bytes / (1024 * 1024)
    );

    let (container_w, container_h) = parse_container(&cli.container)?;

    let cache = MediaCache::shared(&config.cache)?;
    let buffer = config.buffer.clone();
    let mut view = VideoView::new(Box::new(move || {
        Box::new(GstPlayer::new(cache.clone(), buffer.clone())) as Box<dyn MediaPlayer>
    }));

    let (status_tx, mut status_rx) = tokio::sync::mpsc::unbounded_channel();
    view.set_status_sink(status_tx);
    view.set_container_size(container_w, container_h);
    view.set_source(&cli.url, !cli.paused);
    view.surface_created(Surface::new());

    let deadline = cli.run_for.map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut failure = None;

    'host: loop {
        view.drive();

        while let Ok(event) = status_rx.try_recv() {
            match event {
                StatusEvent::Prepared {
                    geometry,
                    duration_ms,
                } => {
                    log::info!(
                        "prepared: {}x{} rotation={} duration={}ms",
                        geometry.width,
                        geometry.height,
                        geometry.rotation_degrees,
                        duration_ms
                    );
                    if let Some(layout) = view.layout() {
                        log::info!(
                            "surface: {}x{} at ({}, {})",
                            layout.width,
                            layout.height,
                            layout.x,
                            layout.y
                        );
                    }
                }
                StatusEvent::PlayStart => log::info!("playback started"),
                StatusEvent::PlayPause => log::info!("playback paused"),
                StatusEvent::Progress { position_ms } => {
                    let seconds = position_ms / 1000;
                    let tenths = (position_ms % 1000) / 100;
                    print!("\r{}.{}  ", seconds, tenths);
                    let _ = std::io::stdout().flush();
                }
                StatusEvent::PlayError(error) => {
                    log::error!("playback failed: {}", error);
                    failure = Some(error);
                    break 'host;
                }
            }
        }

        if let Some(deadline) = deadline
            && Instant::now() >= deadline
        {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(10)) => {}
            _ = tokio::signal::ctrl_c() => {
                log::info!("interrupted");
                break;
            }
        }
    }

    println!();
    view.pause();
    view.release_player();

    if let Some(error) = failure {
        anyhow::bail!("playback failed: {error}");
    }
    Ok(())
}

fn parse_container(spec: &str) -> Result<(u32, u32)> {
    let (w, h) = spec
        .split_once('x')
        .with_context(|| format!("invalid container size: {spec} (expected WIDTHxHEIGHT)"))?;
    let width = w
        .parse()
        .with_context(|| format!("invalid container width: {w}"))?;
    let height = h
        .parse()
        .with_context(|| format!("invalid container height: {h}"))?;
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_container() {
        assert_eq!(parse_container("1080x1920").unwrap(), (1080, 1920));
        assert_eq!(parse_container("800x600").unwrap(), (800, 600));
        assert!(parse_container("1080").is_err());
        assert!(parse_container("ax1920").is_err());
    }
}
