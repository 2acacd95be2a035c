//! The video view state machine.
//!
//! [`VideoView`] owns one player adapter, one rendering surface, and a
//! six-state lifecycle driven by host calls, engine events, and progress
//! ticks. Everything arrives through one message queue the host drains by
//! calling [`VideoView::drive`] from its event loop, so all transitions
//! happen on a single task and the view needs no locks.
//!
//! The target state records an intent to reach playing once a prerequisite
//! state is reached: `set_source(url, true)` before a surface exists parks
//! the intent, and the surface-created event completes it.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use common::{PlaybackState, PlayerEvent, StatusEvent, VideoGeometry};

use crate::layout::{TextureLayout, calc_texture_layout};
use crate::log_and_continue;
use crate::player::MediaPlayer;
use crate::surface::Surface;
use crate::ticker::ProgressTicker;

/// Messages drained by [`VideoView::drive`]
#[derive(Debug, Clone)]
pub enum ViewMessage {
    /// An engine event reported by the adapter
    Player(PlayerEvent),
    /// A progress ticker firing
    Tick,
}

/// Creates the player adapter when the view first needs one
pub type PlayerFactory = Box<dyn Fn() -> Box<dyn MediaPlayer> + Send>;

/// A video playback view.
///
/// Hosts call the public methods, feed surface lifecycle events in, and
/// drain status events from the channel registered with
/// [`set_status_sink`](Self::set_status_sink). The adapter is created
/// lazily on the first [`set_source`](Self::set_source) and dropped on
/// [`release_player`](Self::release_player).
pub struct VideoView {
    state: PlaybackState,
    target: PlaybackState,

    url: Option<String>,
    /// Seek applied once prepared, for reopening a source at an offset
    pending_seek_ms: Option<u64>,

    geometry: VideoGeometry,
    /// Container pixel size as last reported by the host
    container: Option<(u32, u32)>,
    layout: Option<TextureLayout>,

    surface: Option<Surface>,
    player: Option<Box<dyn MediaPlayer>>,
    factory: PlayerFactory,

    queue_tx: UnboundedSender<ViewMessage>,
    queue_rx: UnboundedReceiver<ViewMessage>,
    status: Option<UnboundedSender<StatusEvent>>,
    ticker: Option<ProgressTicker>,

    /// Whether the host should inhibit display sleep (true while playing)
    keep_awake: bool,
}

impl VideoView {
    pub fn new(factory: PlayerFactory) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        Self {
            state: PlaybackState::Idle,
            target: PlaybackState::Idle,
            url: None,
            pending_seek_ms: None,
            geometry: VideoGeometry::default(),
            container: None,
            layout: None,
            surface: None,
            player: None,
            factory,
            queue_tx,
            queue_rx,
            status: None,
            ticker: None,
            keep_awake: false,
        }
    }

    /// Register the channel status events are delivered through
    pub fn set_status_sink(&mut self, sink: UnboundedSender<StatusEvent>) {
        self.status = Some(sink);
    }

    /// Report the container's pixel size. The surface layout is recomputed
    /// once geometry is known.
    pub fn set_container_size(&mut self, width: u32, height: u32) {
        self.container = Some((width, height));
        if self.geometry.width > 0 {
            self.layout_surface();
        }
    }

    /// Set the source URL and begin preparing it.
    ///
    /// Creates the adapter on first use. Calls made while a source is
    /// already in flight never trigger a second prepare: they only update
    /// the target state (and start playback where the state allows it).
    pub fn set_source(&mut self, url: &str, auto_start: bool) {
        log::info!("set_source: {}", url);
        if url.is_empty() {
            return;
        }

        if self.player.is_none() {
            let mut player = (self.factory)();
            log_and_continue!(player.init(), "initialize playback engine");
            self.player = Some(player);
            self.set_state(PlaybackState::Idle);
            self.target = PlaybackState::Idle;
        }

        match self.state {
            PlaybackState::Playing => return,
            PlaybackState::Paused => {
                self.target = PlaybackState::Playing;
                self.start();
                return;
            }
            PlaybackState::Preparing | PlaybackState::Prepared => {
                if auto_start {
                    self.target = PlaybackState::Playing;
                }
                return;
            }
            PlaybackState::SurfaceAvailable => {
                if auto_start {
                    self.target = PlaybackState::Playing;
                    self.start();
                }
                return;
            }
            PlaybackState::Idle | PlaybackState::Error => {}
        }

        self.url = Some(url.to_string());
        if let Some(player) = self.player.as_mut() {
            player.set_event_sink(self.queue_tx.clone());
        }

        self.target = if auto_start {
            PlaybackState::Playing
        } else {
            PlaybackState::SurfaceAvailable
        };
        self.set_state(PlaybackState::Preparing);
        if let Some(player) = self.player.as_mut() {
            log_and_continue!(player.prepare(url), "prepare media source");
        }
    }

    /// Start (or resume) playback.
    ///
    /// From idle or error this re-prepares the previously set URL; while
    /// preparing it only records the intent; from paused or
    /// surface-available it starts the engine and the progress ticker.
    pub fn start(&mut self) {
        let Some(url) = self.url.clone() else {
            return;
        };

        match self.state {
            PlaybackState::Idle | PlaybackState::Error => {
                self.target = PlaybackState::Playing;
                self.release_player();
                self.set_source(&url, true);
            }

            PlaybackState::Preparing | PlaybackState::Prepared | PlaybackState::Playing => {
                if self.player.is_some() {
                    self.target = PlaybackState::Playing;
                }
            }

            PlaybackState::Paused | PlaybackState::SurfaceAvailable => {
                if self.player.is_some() {
                    self.set_state(PlaybackState::Playing);
                    self.target = PlaybackState::Playing;
                    if let Some(player) = self.player.as_mut() {
                        log_and_continue!(player.start(), "start playback");
                    }
                    self.emit(StatusEvent::PlayStart);
                    self.start_progress_updates();
                }
            }
        }
    }

    /// Pause playback. A no-op while already paused or idle.
    pub fn pause(&mut self) {
        if self.player.is_none() {
            return;
        }
        if matches!(self.state, PlaybackState::Paused | PlaybackState::Idle) {
            return;
        }

        if let Some(player) = self.player.as_mut() {
            log_and_continue!(player.stop(), "pause playback");
        }
        self.set_state(PlaybackState::Paused);
        self.target = PlaybackState::Paused;
        self.stop_progress_updates();
        self.emit(StatusEvent::PlayPause);
    }

    /// Seek to `position_ms`. Honored in the prepared, surface-available,
    /// playing, and paused states; silently ignored elsewhere.
    pub fn seek(&mut self, position_ms: u64) {
        self.pending_seek_ms = None;
        if self.state.can_seek()
            && let Some(player) = self.player.as_mut()
        {
            log_and_continue!(player.seek(position_ms), "seek");
        }
    }

    /// Position to restore once the source is prepared, for reopening the
    /// same URL at a remembered offset
    pub fn set_pending_seek(&mut self, position_ms: u64) {
        self.pending_seek_ms = Some(position_ms);
    }

    pub fn current_position(&self) -> u64 {
        self.player.as_ref().map_or(0, |p| p.current_position())
    }

    pub fn duration(&self) -> u64 {
        self.player.as_ref().map_or(0, |p| p.duration())
    }

    pub fn is_playing(&self) -> bool {
        self.player.as_ref().is_some_and(|p| p.is_playing())
    }

    /// A rendering surface became available. Attaches it to the adapter
    /// and completes a parked play intent.
    pub fn surface_created(&mut self, surface: Surface) {
        self.surface = Some(surface.clone());
        if let Some(player) = self.player.as_mut() {
            player.set_surface(Some(surface));
            self.set_state(PlaybackState::SurfaceAvailable);
            if self.target == PlaybackState::Playing {
                self.start();
            }
        }
    }

    /// The rendering surface went away. Only the reference is cleared; the
    /// playback state is not affected.
    pub fn surface_destroyed(&mut self) {
        self.surface = None;
    }

    /// Release the adapter and every transient field, returning to idle.
    /// Unconditionally safe, including from the error state, and
    /// idempotent. The URL survives so `start()` can re-prepare.
    pub fn release_player(&mut self) {
        self.set_state(PlaybackState::Idle);
        self.target = PlaybackState::Idle;
        if let Some(mut player) = self.player.take() {
            player.release();
        }
        log::info!("release_player");
        self.stop_progress_updates();
        // Drop queued ticks and events from the released adapter
        while self.queue_rx.try_recv().is_ok() {}
        self.surface = None;
        self.layout = None;
        self.geometry = VideoGeometry::default();
        self.pending_seek_ms = None;
        self.status = None;
    }

    /// Drain pending engine events and ticks and advance the state
    /// machine. Called by the host from its event loop.
    pub fn drive(&mut self) {
        if let Some(player) = self.player.as_mut() {
            player.poll();
        }
        while let Ok(message) = self.queue_rx.try_recv() {
            match message {
                ViewMessage::Player(event) => self.handle_player_event(event),
                ViewMessage::Tick => self.handle_tick(),
            }
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn target_state(&self) -> PlaybackState {
        self.target
    }

    pub fn geometry(&self) -> VideoGeometry {
        self.geometry
    }

    /// Current surface layout, if the source and container are measured
    pub fn layout(&self) -> Option<TextureLayout> {
        self.layout
    }

    pub fn surface(&self) -> Option<&Surface> {
        self.surface.as_ref()
    }

    /// Whether the host should inhibit display sleep
    pub fn keep_awake(&self) -> bool {
        self.keep_awake
    }

    fn handle_player_event(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::Prepared {
                geometry,
                duration_ms,
            } => self.handle_prepared(geometry, duration_ms),

            PlayerEvent::Started => {
                log::debug!("engine reported playback start");
            }

            PlayerEvent::Error(error) => {
                log::error!("playback error (url: {:?}): {}", self.url, error);
                // The error alone does not move the state machine;
                // recovery is caller-initiated
                self.emit(StatusEvent::PlayError(error));
            }
        }
    }

    fn handle_prepared(&mut self, geometry: VideoGeometry, duration_ms: u64) {
        if self.player.is_none() {
            return;
        }
        self.geometry = geometry;
        self.emit(StatusEvent::Prepared {
            geometry,
            duration_ms,
        });
        self.layout_surface();
        self.set_state(PlaybackState::Prepared);
        if let Some(position_ms) = self.pending_seek_ms
            && position_ms > 0
        {
            self.seek(position_ms);
        }
    }

    fn handle_tick(&mut self) {
        if let Some(player) = &self.player
            && self.state == PlaybackState::Playing
            && self.status.is_some()
        {
            let position_ms = player.current_position();
            self.emit(StatusEvent::Progress { position_ms });
        }
    }

    fn layout_surface(&mut self) {
        let Some((container_w, container_h)) = self.container else {
            return;
        };
        self.layout = calc_texture_layout(
            self.geometry.width,
            self.geometry.height,
            self.geometry.rotation_degrees,
            container_w,
            container_h,
        );
        if let Some(layout) = self.layout {
            log::debug!(
                "surface layout {}x{} at ({}, {}) in {}x{}",
                layout.width,
                layout.height,
                layout.x,
                layout.y,
                container_w,
                container_h
            );
        }
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            log::debug!("state {} -> {}", self.state.name(), state.name());
        }
        self.state = state;
        self.keep_awake = state == PlaybackState::Playing;
    }

    fn start_progress_updates(&mut self) {
        log::info!("start_progress_updates");
        self.stop_progress_updates();
        self.ticker = Some(ProgressTicker::spawn(
            self.queue_tx.clone(),
            ViewMessage::Tick,
        ));
    }

    fn stop_progress_updates(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            log::info!("stop_progress_updates");
            ticker.cancel();
        }
    }

    fn emit(&self, event: StatusEvent) {
        if let Some(status) = &self.status {
            let _ = status.send(event);
        }
    }
}

impl Drop for VideoView {
    fn drop(&mut self) {
        self.stop_progress_updates();
        if let Some(mut player) = self.player.take() {
            player.release();
        }
    }
}
