//! Common types for Nagi.
//!
//! This crate defines the shared playback contracts used between the video
//! view (`view`) and a hosting application such as the demo player (`nagi`).
//!
//! # Event flow
//!
//! The playback engine adapter reports [`PlayerEvent`] variants into the
//! view's message queue; the view translates them (together with its own
//! transitions) into [`StatusEvent`] variants for the host. Both are
//! serializable so hosts can log or forward them across process boundaries.
//!
//! # Examples
//!
//! ```
//! use common::{PlaybackState, StatusEvent};
//!
//! let event = StatusEvent::Progress { position_ms: 1500 };
//! let json = serde_json::to_string(&event).unwrap();
//!
//! assert!(PlaybackState::Paused.can_seek());
//! assert!(!PlaybackState::Idle.can_seek());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Engine-defined code reported for the synthetic "no video track" error.
pub const NO_VIDEO_TRACK_CODE: i32 = 999;

/// Playback errors reported to the host.
///
/// All errors are serializable so hosts can log or forward them.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum PlayerError {
    /// Fatal error surfaced verbatim from the playback engine
    /// (unreachable source, decode failure, ...).
    #[error("engine error {code}: {message}")]
    Engine { code: i32, message: String },

    /// The source reached a ready state without a decodable video track.
    #[error("no decodable video track in source")]
    NoVideoTrack,

    /// Media cache failure. Never surfaced through the status channel;
    /// cache errors degrade to direct network playback.
    #[error("cache error: {0}")]
    Cache(String),

    /// The source descriptor could not be used at all.
    #[error("invalid source: {0}")]
    InvalidSource(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for PlayerError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl PlayerError {
    /// Numeric code matching what the engine (or the adapter, for synthetic
    /// errors) reported. Non-engine errors have no code.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Engine { code, .. } => Some(*code),
            Self::NoVideoTrack => Some(NO_VIDEO_TRACK_CODE),
            Self::Cache(_) | Self::InvalidSource(_) | Self::Io(_) => None,
        }
    }
}

/// Lifecycle state of a video view.
///
/// Exactly one current and one target value are held by the view. The
/// target records an intent to reach [`Playing`](Self::Playing) once a
/// prerequisite state (usually [`SurfaceAvailable`](Self::SurfaceAvailable))
/// is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    /// A fatal engine error was reported; recovery is caller-initiated.
    Error,
    /// No source set, or the player was released.
    Idle,
    /// A prepare request is in flight.
    Preparing,
    /// The engine reported the source ready; geometry is known.
    Prepared,
    /// A rendering surface is attached and the engine can draw.
    SurfaceAvailable,
    Playing,
    Paused,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::Idle
    }
}

impl PlaybackState {
    /// Whether a seek request is honored in this state. Seeks outside these
    /// states are silent no-ops.
    pub fn can_seek(&self) -> bool {
        matches!(
            self,
            Self::Paused | Self::SurfaceAvailable | Self::Playing | Self::Prepared
        )
    }

    /// State name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Idle => "idle",
            Self::Preparing => "preparing",
            Self::Prepared => "prepared",
            Self::SurfaceAvailable => "surface-available",
            Self::Playing => "playing",
            Self::Paused => "paused",
        }
    }
}

/// Video dimensions and rotation, captured once per successful prepare from
/// the engine's ready event. Immutable until the next prepare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoGeometry {
    pub width: u32,
    pub height: u32,
    /// Rotation metadata in degrees (0, 90, 180, 270).
    pub rotation_degrees: u32,
}

impl VideoGeometry {
    /// Width and height with the rotation applied: sources rotated by an
    /// odd multiple of 90 degrees display with swapped dimensions.
    pub fn display_size(&self) -> (u32, u32) {
        if self.rotation_degrees % 180 == 90 {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }
}

/// Events the playback engine adapter reports into the view's message
/// queue. Closed set; the view handles every variant exhaustively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PlayerEvent {
    /// The engine reached its ready state with a decodable video track.
    /// Fired exactly once per prepare cycle.
    Prepared {
        geometry: VideoGeometry,
        duration_ms: u64,
    },
    /// Playback actually started (first transition to the engine's playing
    /// state after a start request).
    Started,
    /// A fatal engine error, or the synthetic no-video-track error.
    Error(PlayerError),
}

/// Status events delivered to the hosting application.
///
/// This is the host-facing observer contract: the host registers a channel
/// sender and receives every variant in the order the view produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StatusEvent {
    /// The source is prepared; geometry and duration are known.
    Prepared {
        geometry: VideoGeometry,
        duration_ms: u64,
    },
    /// Playback started (initial start or resume from pause).
    PlayStart,
    /// Playback paused.
    PlayPause,
    /// Periodic progress while playing, roughly every 50 ms.
    Progress { position_ms: u64 },
    /// A playback error. The view's state is not changed by the error
    /// itself; recovery must be initiated by the host.
    PlayError(PlayerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_idle() {
        assert_eq!(PlaybackState::default(), PlaybackState::Idle);
    }

    #[test]
    fn test_can_seek() {
        assert!(PlaybackState::Paused.can_seek());
        assert!(PlaybackState::SurfaceAvailable.can_seek());
        assert!(PlaybackState::Playing.can_seek());
        assert!(PlaybackState::Prepared.can_seek());
        assert!(!PlaybackState::Idle.can_seek());
        assert!(!PlaybackState::Preparing.can_seek());
        assert!(!PlaybackState::Error.can_seek());
    }

    #[test]
    fn test_display_size_swaps_on_quarter_rotation() {
        let geo = VideoGeometry {
            width: 1920,
            height: 1080,
            rotation_degrees: 90,
        };
        assert_eq!(geo.display_size(), (1080, 1920));

        let geo = VideoGeometry {
            rotation_degrees: 270,
            ..geo
        };
        assert_eq!(geo.display_size(), (1080, 1920));

        let geo = VideoGeometry {
            rotation_degrees: 180,
            ..geo
        };
        assert_eq!(geo.display_size(), (1920, 1080));
    }

    #[test]
    fn test_error_codes() {
        let err = PlayerError::Engine {
            code: 2,
            message: "source error".to_string(),
        };
        assert_eq!(err.code(), Some(2));
        assert_eq!(PlayerError::NoVideoTrack.code(), Some(NO_VIDEO_TRACK_CODE));
        assert_eq!(PlayerError::Cache("disk full".to_string()).code(), None);
    }

    #[test]
    fn test_status_event_roundtrip() {
        let event = StatusEvent::Prepared {
            geometry: VideoGeometry {
                width: 1920,
                height: 1080,
                rotation_degrees: 0,
            },
            duration_ms: 60_000,
        };

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: StatusEvent = serde_json::from_str(&json).unwrap();

        match deserialized {
            StatusEvent::Prepared {
                geometry,
                duration_ms,
            } => {
                assert_eq!(geometry.width, 1920);
                assert_eq!(geometry.height, 1080);
                assert_eq!(duration_ms, 60_000);
            }
            _ => panic!("Wrong event type"),
        }
    }
}
