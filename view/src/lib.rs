//! Embeddable video playback view.
//!
//! This crate provides [`VideoView`], a container that owns a frame-delivery
//! [`Surface`], delegates decoding/buffering/demuxing to GStreamer, and
//! exposes a small playback state machine to a hosting application through
//! [`common::StatusEvent`] messages.
//!
//! It consists of several submodules:
//!
//! - `player`: the [`MediaPlayer`] abstraction and the GStreamer adapter
//! - `cache`: bounded LRU disk cache for HTTP media sources
//! - `surface`: the frame sink the engine writes decoded frames into
//! - `ticker`: cancellable cooperative progress timer
//! - `layout`: aspect-preserving surface sizing math
//! - `view`: the [`VideoView`] state machine itself
//! - `config`: TOML-backed buffer/cache configuration
//!
//! # Architecture
//!
//! All view state lives on the host task: engine callbacks and the progress
//! ticker only push messages into the view's queue, which the host drains by
//! calling [`VideoView::drive`] from its event loop. The only cross-thread
//! state is the shared media cache and the surface frame slot.
//!
//! # Examples
//!
//! ```no_run
//! use view::{MediaPlayer, Surface, VideoView};
//! use view::player::gst::GstPlayer;
//! use view::cache::MediaCache;
//! use view::config::PlayerConfig;
//!
//! # async fn host() -> anyhow::Result<()> {
//! let config = PlayerConfig::load()?;
//! let cache = MediaCache::shared(&config.cache)?;
//! let buffer = config.buffer.clone();
//!
//! let (status_tx, mut status_rx) = tokio::sync::mpsc::unbounded_channel();
//! let mut view = VideoView::new(Box::new(move || {
//!     Box::new(GstPlayer::new(cache.clone(), buffer.clone())) as Box<dyn MediaPlayer>
//! }));
//! view.set_status_sink(status_tx);
//! view.set_container_size(1080, 1920);
//! view.set_source("https://example.com/clip.mp4", true);
//! view.surface_created(Surface::new());
//!
//! loop {
//!     view.drive();
//!     while let Ok(event) = status_rx.try_recv() {
//!         log::info!("status: {:?}", event);
//!     }
//!     tokio::time::sleep(std::time::Duration::from_millis(10)).await;
//! }
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod layout;
mod macros;
pub mod player;
pub mod surface;
pub mod ticker;
pub mod view;

pub use layout::TextureLayout;
pub use player::MediaPlayer;
pub use surface::Surface;
pub use view::{VideoView, ViewMessage};
