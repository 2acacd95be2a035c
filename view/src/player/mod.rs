//! Player abstraction over the embedded playback engine.
//!
//! [`MediaPlayer`] is the transport/geometry contract the view drives;
//! `gst` binds it to GStreamer. Engine callbacks never call back into the
//! view directly: adapters report [`PlayerEvent`]s through the sink channel
//! registered with [`MediaPlayer::set_event_sink`], and the view drains
//! them on its own task.

pub mod gst;

use anyhow::Result;
use common::PlayerEvent;
use tokio::sync::mpsc::UnboundedSender;

use crate::surface::Surface;

/// Channel the adapter reports engine events through
pub type EventSink = UnboundedSender<PlayerEvent>;

/// Transport and geometry contract implemented by playback engine adapters.
///
/// Transport methods are no-ops while the underlying engine handle is
/// absent; geometry queries return zero until the engine reports ready.
/// Fatal engine errors travel through the event sink, not return values.
pub trait MediaPlayer {
    /// Create the engine instance. Idempotent; a second call while an
    /// engine exists does nothing.
    fn init(&mut self) -> Result<()>;

    /// Build a media source for `url` and begin asynchronous preparation.
    /// Completion is reported as [`PlayerEvent::Prepared`] exactly once per
    /// prepare cycle.
    fn prepare(&mut self, url: &str) -> Result<()>;

    /// Ask the engine to play as soon as it is ready
    fn start(&mut self) -> Result<()>;

    /// Ask the engine to hold playback (the source stays prepared)
    fn stop(&mut self) -> Result<()>;

    fn seek(&mut self, position_ms: u64) -> Result<()>;

    /// Playback-rate control. The GStreamer adapter does not implement
    /// this; the default is a no-op.
    fn set_speed(&mut self, _factor: f32) {}

    /// Continuous single-item repeat. On by default.
    fn set_loop(&mut self, looping: bool);

    /// Tear down the engine instance. Safe to call multiple times.
    fn release(&mut self);

    /// Tear down the engine instance and drop cached geometry and the
    /// surface reference. Safe to call multiple times.
    fn reset(&mut self);

    fn is_playing(&self) -> bool;

    /// Current position in milliseconds, 0 when the engine is absent
    fn current_position(&self) -> u64;

    /// Duration in milliseconds, 0 when the engine is absent or unknown
    fn duration(&self) -> u64;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn rotation_degrees(&self) -> u32;

    /// Attach (or detach, with `None`) the frame sink the engine writes
    /// decoded frames into. The adapter keeps only a clone.
    fn set_surface(&mut self, surface: Option<Surface>);

    /// Register the channel engine events are reported through
    fn set_event_sink(&mut self, sink: EventSink);

    /// Drain pending engine messages and report them through the event
    /// sink. Called from the view's message pump; adapters whose engines
    /// deliver events by callback may leave this as the default no-op.
    fn poll(&mut self) {}
}
