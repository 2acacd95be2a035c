//! GStreamer-backed media player adapter.
//!
//! Translates the abstract transport/geometry contract onto a `playbin`
//! pipeline. Decoding, demuxing, network access, and adaptive buffering all
//! belong to the engine; this adapter only configures it, feeds it a
//! (possibly cache-resolved) source URI, and translates bus messages into
//! [`PlayerEvent`]s:
//!
//! 1. Preroll completes (`AsyncDone`) → capture geometry → `Prepared`,
//!    exactly once per prepare cycle
//! 2. Preroll without a video stream → synthetic no-video-track error
//! 3. Pipeline reaches the playing state → `Started`
//! 4. Bus error → `Error` with the engine-defined code, verbatim
//! 5. End of stream → seek back to zero while looping is on

use anyhow::{Context, Result};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use std::sync::{Arc, Mutex};

use common::{PlayerError, PlayerEvent, VideoGeometry};

use crate::cache::{MediaCache, SourceLocation};
use crate::config::BufferConfig;
use crate::player::{EventSink, MediaPlayer};
use crate::surface::Surface;

/// Initialize GStreamer (idempotent, safe to call multiple times)
pub fn initialize_gstreamer() {
    static GSTREAMER_INITIALIZED: std::sync::Once = std::sync::Once::new();

    GSTREAMER_INITIALIZED.call_once(|| {
        gst::init().expect("Failed to initialize GStreamer");
        log::info!("GStreamer initialized");
    });
}

/// Media player adapter driving a `playbin` pipeline.
///
/// All fields are owned by the view's task; the only state shared with
/// engine threads is the surface slot the sample callback writes into.
pub struct GstPlayer {
    playbin: Option<gst::Element>,
    app_sink: Option<gst_app::AppSink>,

    /// Frame sink handed to the engine's sample callback. Interior slot so
    /// the surface can be attached or detached after pipeline creation.
    surface_slot: Arc<Mutex<Option<Surface>>>,

    sink: Option<EventSink>,
    cache: MediaCache,
    buffer: BufferConfig,

    geometry: VideoGeometry,
    /// Rotation reported through stream tags, folded into the geometry
    /// when preroll completes
    rotation_tag: u32,

    /// Guard making the prepared callback idempotent per prepare cycle
    prepared_reported: bool,

    /// The play-when-ready intent. The pipeline may be held in the paused
    /// state during rebuffering while this stays true.
    want_playing: bool,

    looping: bool,
}

impl GstPlayer {
    pub fn new(cache: MediaCache, buffer: BufferConfig) -> Self {
        Self {
            playbin: None,
            app_sink: None,
            surface_slot: Arc::new(Mutex::new(None)),
            sink: None,
            cache,
            buffer,
            geometry: VideoGeometry::default(),
            rotation_tag: 0,
            prepared_reported: false,
            want_playing: false,
            looping: true,
        }
    }

    fn emit(&self, event: PlayerEvent) {
        if let Some(sink) = &self.sink {
            let _ = sink.send(event);
        }
    }

    /// Resolve the source through the media cache: fully cached HTTP media
    /// plays from disk, everything else from its original location.
    fn source_uri(&self, url: &str) -> Result<String> {
        match self.cache.resolve(url) {
            SourceLocation::Local(path) => gst::glib::filename_to_uri(&path, None)
                .map(|uri| uri.to_string())
                .with_context(|| format!("convert {} to a file URI", path.display())),
            SourceLocation::Remote(uri) => Ok(uri),
        }
    }

    /// Preroll completed: capture geometry and report prepared, or the
    /// synthetic no-video-track error when the source has no video stream
    fn handle_async_done(&mut self, playbin: &gst::Element) {
        if self.prepared_reported {
            return;
        }

        let n_video: i32 = playbin.property("n-video");
        if n_video <= 0 {
            log::error!("source prerolled without a decodable video track");
            self.emit(PlayerEvent::Error(PlayerError::NoVideoTrack));
            return;
        }

        let (width, height) = self
            .app_sink
            .as_ref()
            .and_then(|s| s.static_pad("sink"))
            .and_then(|pad| pad.current_caps())
            .and_then(|caps| gst_video::VideoInfo::from_caps(&caps).ok())
            .map(|info| (info.width(), info.height()))
            .unwrap_or((0, 0));

        self.geometry = VideoGeometry {
            width,
            height,
            rotation_degrees: self.rotation_tag,
        };

        let duration_ms = playbin
            .query_duration::<gst::ClockTime>()
            .map(|d| d.mseconds())
            .unwrap_or(0);

        log::info!(
            "ready: {}x{} rotation={} duration={}ms",
            width,
            height,
            self.rotation_tag,
            duration_ms
        );

        self.prepared_reported = true;
        self.emit(PlayerEvent::Prepared {
            geometry: self.geometry,
            duration_ms,
        });
    }
}

impl MediaPlayer for GstPlayer {
    fn init(&mut self) -> Result<()> {
        if self.playbin.is_some() {
            return Ok(());
        }

        initialize_gstreamer();

        let playbin = gst::ElementFactory::make("playbin")
            .build()
            .context("Failed to create playbin element")?;

        // Time-bound buffering window; the engine's own defaults cover the
        // byte bound
        playbin.set_property(
            "buffer-duration",
            (self.buffer.max_buffer_ms as i64) * 1_000_000,
        );

        // Decoded frames leave the pipeline through an appsink configured
        // for low-latency RGBA delivery
        let app_sink = gst_app::AppSink::builder()
            .caps(
                &gst::Caps::builder("video/x-raw")
                    .field("format", "RGBA")
                    .build(),
            )
            .sync(true)
            .max_buffers(1)
            .drop(true)
            .build();
        install_frame_callback(&app_sink, Arc::clone(&self.surface_slot));
        playbin.set_property("video-sink", &app_sink);

        log::info!(
            "engine initialized (buffer {}-{}ms, playback {}ms, rebuffer {}ms)",
            self.buffer.min_buffer_ms,
            self.buffer.max_buffer_ms,
            self.buffer.playback_buffer_ms,
            self.buffer.rebuffer_ms,
        );

        self.playbin = Some(playbin);
        self.app_sink = Some(app_sink);
        self.prepared_reported = false;
        Ok(())
    }

    fn prepare(&mut self, url: &str) -> Result<()> {
        let Some(playbin) = self.playbin.clone() else {
            return Ok(());
        };

        self.prepared_reported = false;
        self.rotation_tag = 0;
        self.geometry = VideoGeometry::default();

        let uri = self.source_uri(url)?;

        // The uri property is only writable below the ready state
        playbin
            .set_state(gst::State::Ready)
            .context("Failed to reset pipeline for a new source")?;
        playbin.set_property("uri", &uri);
        playbin
            .set_state(gst::State::Paused)
            .context("Failed to preroll media source")?;

        log::info!("prepare: {}", url);
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        let Some(playbin) = &self.playbin else {
            return Ok(());
        };
        self.want_playing = true;
        playbin
            .set_state(gst::State::Playing)
            .context("Failed to set pipeline to Playing state")?;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let Some(playbin) = &self.playbin else {
            return Ok(());
        };
        self.want_playing = false;
        playbin
            .set_state(gst::State::Paused)
            .context("Failed to set pipeline to Paused state")?;
        Ok(())
    }

    fn seek(&mut self, position_ms: u64) -> Result<()> {
        let Some(playbin) = &self.playbin else {
            return Ok(());
        };
        playbin
            .seek_simple(
                gst::SeekFlags::FLUSH | gst::SeekFlags::ACCURATE,
                gst::ClockTime::from_mseconds(position_ms),
            )
            .with_context(|| format!("Failed to seek to {position_ms}ms"))?;
        Ok(())
    }

    fn set_loop(&mut self, looping: bool) {
        self.looping = looping;
    }

    fn release(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        if let Some(playbin) = self.playbin.take() {
            if let Err(e) = playbin.set_state(gst::State::Null) {
                log::warn!("Failed to tear down pipeline: {}", e);
            }
        }
        self.app_sink = None;
        if let Ok(mut slot) = self.surface_slot.lock() {
            *slot = None;
        }
        self.geometry = VideoGeometry::default();
        self.rotation_tag = 0;
        self.prepared_reported = false;
        self.want_playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playbin.is_some() && self.want_playing
    }

    fn current_position(&self) -> u64 {
        self.playbin
            .as_ref()
            .and_then(|p| p.query_position::<gst::ClockTime>())
            .map(|pos| pos.mseconds())
            .unwrap_or(0)
    }

    fn duration(&self) -> u64 {
        self.playbin
            .as_ref()
            .and_then(|p| p.query_duration::<gst::ClockTime>())
            .map(|d| d.mseconds())
            .unwrap_or(0)
    }

    fn width(&self) -> u32 {
        if self.playbin.is_none() {
            return 0;
        }
        self.geometry.width
    }

    fn height(&self) -> u32 {
        if self.playbin.is_none() {
            return 0;
        }
        self.geometry.height
    }

    fn rotation_degrees(&self) -> u32 {
        if self.playbin.is_none() {
            return 0;
        }
        self.geometry.rotation_degrees
    }

    fn set_surface(&mut self, surface: Option<Surface>) {
        if let Ok(mut slot) = self.surface_slot.lock() {
            *slot = surface;
        }
    }

    fn set_event_sink(&mut self, sink: EventSink) {
        self.sink = Some(sink);
    }

    /// Drain the bus and translate engine messages into player events.
    /// Drains everything, even messages nobody reacts to, so the bus queue
    /// cannot grow unbounded.
    fn poll(&mut self) {
        let Some(playbin) = self.playbin.clone() else {
            return;
        };
        let Some(bus) = playbin.bus() else {
            return;
        };

        while let Some(msg) = bus.pop() {
            match msg.view() {
                gst::MessageView::AsyncDone(_) => {
                    self.handle_async_done(&playbin);
                }

                gst::MessageView::Tag(tag) => {
                    if let Some(orientation) = tag.tags().get::<gst::tags::ImageOrientation>() {
                        self.rotation_tag = parse_image_orientation(orientation.get());
                    }
                }

                gst::MessageView::StateChanged(sc) => {
                    if msg.src() == Some(playbin.upcast_ref::<gst::Object>())
                        && sc.current() == gst::State::Playing
                        && sc.pending() == gst::State::VoidPending
                    {
                        self.emit(PlayerEvent::Started);
                    }
                }

                gst::MessageView::Buffering(buffering) => {
                    // Hold playback while the engine refills its window;
                    // want_playing survives so playback resumes by itself
                    let percent = buffering.percent();
                    if self.want_playing {
                        if percent < 100 {
                            log::debug!("buffering {}%", percent);
                            let _ = playbin.set_state(gst::State::Paused);
                        } else {
                            let _ = playbin.set_state(gst::State::Playing);
                        }
                    }
                }

                gst::MessageView::Eos(_) => {
                    if self.looping {
                        log::debug!("reached EOS, looping");
                        let _ = playbin.seek_simple(
                            gst::SeekFlags::FLUSH | gst::SeekFlags::KEY_UNIT,
                            gst::ClockTime::ZERO,
                        );
                    } else {
                        log::info!("playback finished");
                        self.want_playing = false;
                        let _ = playbin.set_state(gst::State::Paused);
                    }
                }

                gst::MessageView::Error(err) => {
                    let error = err.error();
                    // Code grouping mirrors the engine's error taxonomy:
                    // 0 = source, 1 = decode, 2 = unexpected
                    let code = if error.is::<gst::ResourceError>() {
                        0
                    } else if error.is::<gst::StreamError>() {
                        1
                    } else {
                        2
                    };
                    log::error!("engine error: {} (debug: {:?})", error, err.debug());
                    self.want_playing = false;
                    self.emit(PlayerEvent::Error(PlayerError::Engine {
                        code,
                        message: error.to_string(),
                    }));
                }

                _ => {
                    // Drain other messages to prevent memory growth
                }
            }
        }
    }
}

impl Drop for GstPlayer {
    fn drop(&mut self) {
        self.reset();
    }
}

/// Install the sample callback writing decoded RGBA frames into whatever
/// surface is currently attached. Frames arriving while no surface is
/// attached are discarded.
fn install_frame_callback(app_sink: &gst_app::AppSink, slot: Arc<Mutex<Option<Surface>>>) {
    app_sink.set_callbacks(
        gst_app::AppSinkCallbacks::builder()
            .new_sample(move |sink| {
                let sample = sink.pull_sample().map_err(|_| gst::FlowError::Eos)?;

                let surface = match slot.lock() {
                    Ok(guard) => guard.clone(),
                    Err(_) => None,
                };
                let Some(surface) = surface else {
                    return Ok(gst::FlowSuccess::Ok);
                };

                let buffer = sample.buffer().ok_or(gst::FlowError::Error)?;
                let map = buffer.map_readable().map_err(|_| gst::FlowError::Error)?;

                let (width, height) = sample
                    .caps()
                    .and_then(|caps| gst_video::VideoInfo::from_caps(caps).ok())
                    .map(|info| (info.width(), info.height()))
                    .unwrap_or((0, 0));

                if surface.push_frame(map.as_slice().to_vec(), width, height) {
                    log::trace!("video frame dropped (previous frame not consumed in time)");
                }

                Ok(gst::FlowSuccess::Ok)
            })
            .build(),
    );
}

/// Parse the image-orientation stream tag into rotation degrees
fn parse_image_orientation(orientation: &str) -> u32 {
    match orientation {
        "rotate-90" => 90,
        "rotate-180" => 180,
        "rotate-270" => 270,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_image_orientation() {
        assert_eq!(parse_image_orientation("rotate-0"), 0);
        assert_eq!(parse_image_orientation("rotate-90"), 90);
        assert_eq!(parse_image_orientation("rotate-180"), 180);
        assert_eq!(parse_image_orientation("rotate-270"), 270);
        // Flips and unknown values fall back to no rotation
        assert_eq!(parse_image_orientation("flip-rotate-90"), 0);
        assert_eq!(parse_image_orientation(""), 0);
    }
}
