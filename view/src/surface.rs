//! Frame sink the playback engine writes decoded frames into.
//!
//! A [`Surface`] is the crate's rendering-surface analog: the host creates
//! one, attaches it to the view, and the engine's sample callback writes
//! RGBA frames into its shared slot. The adapter only ever holds a clone
//! (the slot is shared, not owned), so dropping the view's reference never
//! invalidates an in-flight engine write.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A drawable target for decoded video frames.
///
/// Cheap to clone; all clones share the same frame slot.
#[derive(Clone, Default)]
pub struct Surface {
    /// Most recent decoded frame (tightly packed RGBA)
    frame: Arc<Mutex<Option<Vec<u8>>>>,

    /// Dimensions of the frame currently in the slot
    frame_size: Arc<Mutex<Option<(u32, u32)>>>,

    /// Flag indicating a new frame is available
    new_frame_available: Arc<AtomicBool>,
}

impl Surface {
    /// Create a new, empty surface
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a decoded frame. Called from the engine's sample callback;
    /// returns whether the previous frame was still unconsumed (dropped).
    pub fn push_frame(&self, data: Vec<u8>, width: u32, height: u32) -> bool {
        let dropped = self.new_frame_available.load(Ordering::Relaxed);

        if let Ok(mut frame) = self.frame.lock() {
            *frame = Some(data);
        }
        if let Ok(mut size) = self.frame_size.lock() {
            *size = Some((width, height));
        }
        self.new_frame_available.store(true, Ordering::Release);

        dropped
    }

    /// Check if a new frame is available
    pub fn has_new_frame(&self) -> bool {
        self.new_frame_available.load(Ordering::Acquire)
    }

    /// Mark the current frame as consumed
    pub fn consume_frame(&self) {
        self.new_frame_available.store(false, Ordering::Release);
    }

    /// Get the current frame data (RGBA)
    pub fn current_frame(&self) -> Option<Vec<u8>> {
        self.frame.lock().ok()?.clone()
    }

    /// Dimensions of the frame currently in the slot
    pub fn frame_size(&self) -> Option<(u32, u32)> {
        *self.frame_size.lock().ok()?
    }

    /// Drop any stored frame and reset the new-frame flag
    pub fn clear(&self) {
        if let Ok(mut frame) = self.frame.lock() {
            *frame = None;
        }
        if let Ok(mut size) = self.frame_size.lock() {
            *size = None;
        }
        self.new_frame_available.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("frame_size", &self.frame_size())
            .field("has_new_frame", &self.has_new_frame())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_consume() {
        let surface = Surface::new();
        assert!(!surface.has_new_frame());
        assert!(surface.current_frame().is_none());

        let dropped = surface.push_frame(vec![0u8; 16], 2, 2);
        assert!(!dropped);
        assert!(surface.has_new_frame());
        assert_eq!(surface.frame_size(), Some((2, 2)));

        surface.consume_frame();
        assert!(!surface.has_new_frame());
        // Frame data stays until the next push
        assert_eq!(surface.current_frame().unwrap().len(), 16);
    }

    #[test]
    fn test_unconsumed_frame_counts_as_dropped() {
        let surface = Surface::new();
        surface.push_frame(vec![0u8; 4], 1, 1);
        assert!(surface.push_frame(vec![1u8; 4], 1, 1));
    }

    #[test]
    fn test_clones_share_the_slot() {
        let surface = Surface::new();
        let engine_side = surface.clone();

        engine_side.push_frame(vec![7u8; 4], 1, 1);
        assert!(surface.has_new_frame());
        assert_eq!(surface.current_frame().unwrap(), vec![7u8; 4]);

        surface.clear();
        assert!(!engine_side.has_new_frame());
        assert!(engine_side.current_frame().is_none());
    }
}
