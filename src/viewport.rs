//! Canvas viewport: the zoom/pan triple and the transform math that keeps
//! the world point under the cursor fixed while zooming.
//!
//! Screen and world coordinates relate by `screen = (world + pan) * zoom`,
//! so `world = screen / zoom - pan`.

pub const MIN_ZOOM: f64 = 0.25;
pub const MAX_ZOOM: f64 = 2.5;
pub const ZOOM_STEP: f64 = 1.1;

/// Wheel delta used by the button-driven zoom wrappers.
const BUTTON_WHEEL_DELTA: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    /// World coordinates of a screen position under the current
    /// transform.
    pub fn screen_to_world(&self, screen_x: f64, screen_y: f64) -> (f64, f64) {
        (
            screen_x / self.zoom - self.pan_x,
            screen_y / self.zoom - self.pan_y,
        )
    }

    /// Screen position of a world coordinate under the current transform.
    pub fn world_to_screen(&self, world_x: f64, world_y: f64) -> (f64, f64) {
        (
            (world_x + self.pan_x) * self.zoom,
            (world_y + self.pan_y) * self.zoom,
        )
    }

    /// Step the zoom level in response to a wheel delta, keeping
    /// `(world_x, world_y)` under the same screen position. Wheel up
    /// (negative delta) zooms in. At the zoom bounds this is a no-op,
    /// pan included.
    pub fn zoom_at(&mut self, delta_y: f64, world_x: f64, world_y: f64) {
        let current = self.zoom;
        let target = if delta_y < 0.0 {
            current * ZOOM_STEP
        } else {
            current / ZOOM_STEP
        };
        let target = target.clamp(MIN_ZOOM, MAX_ZOOM);
        if target == current {
            return;
        }
        let scale_ratio = current / target;
        self.pan_x = (self.pan_x + world_x) * scale_ratio - world_x;
        self.pan_y = (self.pan_y + world_y) * scale_ratio - world_y;
        self.zoom = target;
    }

    /// Wheel zoom anchored at a screen position.
    pub fn zoom_at_screen(&mut self, delta_y: f64, screen_x: f64, screen_y: f64) {
        let (world_x, world_y) = self.screen_to_world(screen_x, screen_y);
        self.zoom_at(delta_y, world_x, world_y);
    }

    /// One zoom step in, anchored at the world origin.
    pub fn zoom_in(&mut self) {
        self.zoom_at(-BUTTON_WHEEL_DELTA, 0.0, 0.0);
    }

    /// One zoom step out, anchored at the world origin.
    pub fn zoom_out(&mut self) {
        self.zoom_at(BUTTON_WHEEL_DELTA, 0.0, 0.0);
    }
}

/// An in-progress canvas pan: the screen anchor where the gesture began
/// and the pan offsets at that moment. Pointer motion maps to pan by raw
/// screen delta.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanGesture {
    start_x: f64,
    start_y: f64,
    last_pan_x: f64,
    last_pan_y: f64,
}

impl PanGesture {
    pub fn begin(viewport: &Viewport, screen_x: f64, screen_y: f64) -> Self {
        Self {
            start_x: screen_x,
            start_y: screen_y,
            last_pan_x: viewport.pan_x,
            last_pan_y: viewport.pan_y,
        }
    }

    /// Pan offsets for the current pointer position.
    pub fn pan_for(&self, screen_x: f64, screen_y: f64) -> (f64, f64) {
        (
            self.last_pan_x + (screen_x - self.start_x),
            self.last_pan_y + (screen_y - self.start_y),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-6, "{a} vs {b}");
    }

    #[test]
    fn zoom_keeps_the_anchor_point_fixed_on_screen() {
        let cases = [
            (-100.0, 40.0, -25.0),
            (100.0, 40.0, -25.0),
            (-1.0, 0.0, 0.0),
            (-3.0, 817.5, 402.25),
            (5.0, -12.0, 300.0),
        ];
        for (delta, wx, wy) in cases {
            let mut vp = Viewport {
                zoom: 1.3,
                pan_x: 17.0,
                pan_y: -4.0,
            };
            let (sx_before, sy_before) = vp.world_to_screen(wx, wy);
            vp.zoom_at(delta, wx, wy);
            let (sx_after, sy_after) = vp.world_to_screen(wx, wy);
            assert_close(sx_before, sx_after);
            assert_close(sy_before, sy_after);
        }
    }

    #[test]
    fn zoom_clamps_at_both_bounds() {
        let mut vp = Viewport::new();
        for _ in 0..40 {
            vp.zoom_in();
        }
        assert_eq!(vp.zoom, MAX_ZOOM);
        // At the ceiling another step must not move the pan either.
        let pan_before = (vp.pan_x, vp.pan_y);
        vp.zoom_at(-100.0, 55.0, 70.0);
        assert_eq!(vp.zoom, MAX_ZOOM);
        assert_eq!((vp.pan_x, vp.pan_y), pan_before);

        let mut vp = Viewport::new();
        for _ in 0..60 {
            vp.zoom_out();
        }
        assert_eq!(vp.zoom, MIN_ZOOM);
        let pan_before = (vp.pan_x, vp.pan_y);
        vp.zoom_out();
        assert_eq!((vp.pan_x, vp.pan_y), pan_before);
    }

    #[test]
    fn zoom_direction_follows_wheel_sign() {
        let mut vp = Viewport::new();
        vp.zoom_at(-100.0, 0.0, 0.0);
        assert_close(vp.zoom, 1.1);
        vp.zoom_at(100.0, 0.0, 0.0);
        assert_close(vp.zoom, 1.0);
        // A zero delta counts as wheel down.
        vp.zoom_at(0.0, 0.0, 0.0);
        assert!(vp.zoom < 1.0);
    }

    #[test]
    fn origin_anchored_wrappers_scale_pan_by_ratio() {
        let mut vp = Viewport {
            zoom: 1.0,
            pan_x: 33.0,
            pan_y: -8.0,
        };
        vp.zoom_in();
        assert_close(vp.zoom, 1.1);
        assert_close(vp.pan_x, 33.0 / 1.1);
        assert_close(vp.pan_y, -8.0 / 1.1);
    }

    #[test]
    fn screen_world_round_trip() {
        let vp = Viewport {
            zoom: 1.75,
            pan_x: -120.0,
            pan_y: 42.0,
        };
        let (wx, wy) = vp.screen_to_world(310.0, -44.0);
        let (sx, sy) = vp.world_to_screen(wx, wy);
        assert_close(sx, 310.0);
        assert_close(sy, -44.0);
    }

    #[test]
    fn pan_gesture_applies_raw_screen_delta() {
        let vp = Viewport {
            zoom: 2.0,
            pan_x: 10.0,
            pan_y: 20.0,
        };
        let gesture = PanGesture::begin(&vp, 100.0, 100.0);
        assert_eq!(gesture.pan_for(130.0, 80.0), (40.0, 0.0));
        // Returning to the anchor restores the original offsets.
        assert_eq!(gesture.pan_for(100.0, 100.0), (10.0, 20.0));
    }
}
