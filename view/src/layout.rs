//! Surface sizing math.
//!
//! Computes the letterboxed, aspect-preserving size of the rendering surface
//! inside its container: the video keeps its (possibly rotation-swapped)
//! aspect ratio and is fitted to whichever container edge binds first, then
//! centered. Pure integer-in/integer-out; no windowing toolkit involved.

/// Size and centered placement of the rendering surface within a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureLayout {
    pub width: u32,
    pub height: u32,
    /// Horizontal offset centering the surface in the container
    pub x: u32,
    /// Vertical offset centering the surface in the container
    pub y: u32,
}

/// Compute the surface layout for a video inside a container.
///
/// Sources rotated by an odd multiple of 90 degrees display with swapped
/// dimensions, so the effective ratio is height/width for those rotations.
/// When the video ratio is at least the container ratio the width is fitted
/// and the height derived (`round(container_w / ratio)`); otherwise the
/// height is fitted and the width derived (`round(container_h * ratio)`).
///
/// Returns `None` while either the source or the container has not been
/// measured yet (any dimension zero).
pub fn calc_texture_layout(
    video_width: u32,
    video_height: u32,
    rotation_degrees: u32,
    container_width: u32,
    container_height: u32,
) -> Option<TextureLayout> {
    if video_width == 0 || video_height == 0 {
        return None;
    }
    if container_width == 0 || container_height == 0 {
        return None;
    }

    let rotation = rotation_degrees % 360;
    let (mut v_w, mut v_h) = (video_width as f32, video_height as f32);
    if rotation % 180 == 90 {
        (v_w, v_h) = (v_h, v_w);
    }

    let video_ratio = v_w / v_h;
    let screen_ratio = container_width as f32 / container_height as f32;

    let (width, height) = if video_ratio >= screen_ratio {
        let h = (container_width as f32 / video_ratio + 0.5) as u32;
        (container_width, h)
    } else {
        let w = (container_height as f32 * video_ratio + 0.5) as u32;
        (w, container_height)
    };

    Some(TextureLayout {
        width,
        height,
        x: container_width.saturating_sub(width) / 2,
        y: container_height.saturating_sub(height) / 2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landscape_video_in_portrait_container() {
        // 1920x1080 at rotation 0 in a 1080x1920 container: video ratio
        // 1.778 >= screen ratio 0.5625, so width is fitted
        let layout = calc_texture_layout(1920, 1080, 0, 1080, 1920).unwrap();
        assert_eq!(layout.width, 1080);
        assert_eq!(layout.height, 608); // round(1080 / 1.778)
        assert_eq!(layout.x, 0);
        assert_eq!(layout.y, (1920 - 608) / 2);
    }

    #[test]
    fn test_rotated_video_fills_portrait_container() {
        // Same source rotated 90 degrees: effective 1080x1920, ratio equals
        // the container ratio exactly
        let layout = calc_texture_layout(1920, 1080, 90, 1080, 1920).unwrap();
        assert_eq!(layout.width, 1080);
        assert_eq!(layout.height, 1920);
        assert_eq!((layout.x, layout.y), (0, 0));
    }

    #[test]
    fn test_rotation_270_also_swaps() {
        let plain = calc_texture_layout(1920, 1080, 0, 1000, 1000).unwrap();
        let rot90 = calc_texture_layout(1920, 1080, 90, 1000, 1000).unwrap();
        let rot270 = calc_texture_layout(1920, 1080, 270, 1000, 1000).unwrap();
        assert_eq!(rot90, rot270);
        assert_ne!(plain, rot90);
        // Swapped source is taller than wide, so height is fitted
        assert_eq!(rot90.height, 1000);
        assert_eq!(rot90.width, 563); // round(1000 * 1080/1920)
    }

    #[test]
    fn test_rotation_180_does_not_swap() {
        assert_eq!(
            calc_texture_layout(1920, 1080, 180, 1080, 1920),
            calc_texture_layout(1920, 1080, 0, 1080, 1920)
        );
    }

    #[test]
    fn test_unmeasured_dimensions_return_none() {
        assert!(calc_texture_layout(0, 1080, 0, 1080, 1920).is_none());
        assert!(calc_texture_layout(1920, 0, 0, 1080, 1920).is_none());
        assert!(calc_texture_layout(1920, 1080, 0, 0, 1920).is_none());
        assert!(calc_texture_layout(1920, 1080, 0, 1080, 0).is_none());
    }

    #[test]
    fn test_fits_within_container() {
        let cases = [
            (1920u32, 1080u32, 0u32),
            (1080, 1920, 0),
            (640, 480, 90),
            (854, 480, 270),
            (720, 720, 0),
            (3840, 2160, 180),
        ];
        for (w, h, rot) in cases {
            for (cw, ch) in [(1080u32, 1920u32), (1920, 1080), (800, 600)] {
                let layout = calc_texture_layout(w, h, rot, cw, ch).unwrap();
                assert!(layout.width <= cw, "{w}x{h}@{rot} in {cw}x{ch}");
                assert!(layout.height <= ch, "{w}x{h}@{rot} in {cw}x{ch}");
                // At least one edge is flush against the container
                assert!(layout.width == cw || layout.height == ch);
            }
        }
    }

    #[test]
    fn test_preserves_aspect_ratio_within_rounding() {
        let cases = [(1920u32, 1080u32), (1280, 720), (640, 360), (480, 854)];
        for (w, h) in cases {
            let layout = calc_texture_layout(w, h, 0, 1080, 1920).unwrap();
            let source_ratio = w as f64 / h as f64;
            let layout_ratio = layout.width as f64 / layout.height as f64;
            // Off by at most one pixel of rounding on the derived edge
            let derived = layout.height.min(layout.width) as f64;
            assert!(
                (source_ratio - layout_ratio).abs() <= source_ratio / derived,
                "{w}x{h}: {source_ratio} vs {layout_ratio}"
            );
        }
    }

    #[test]
    fn test_equal_ratios_fill_container_exactly() {
        let layout = calc_texture_layout(960, 540, 0, 1920, 1080).unwrap();
        assert_eq!((layout.width, layout.height), (1920, 1080));
    }
}
