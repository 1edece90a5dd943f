//! Camera for pan/zoom.
//!
//! Board to screen mapping is `screen = (board + offset) * zoom`.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// View state of the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    pub offset_x: f64,
    pub offset_y: f64,
    pub zoom: f64,
    #[serde(skip, default = "default_min_zoom")]
    pub min_zoom: f64,
    #[serde(skip, default = "default_max_zoom")]
    pub max_zoom: f64,
}

fn default_min_zoom() -> f64 {
    0.1
}

fn default_max_zoom() -> f64 {
    8.0
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            zoom: 1.0,
            min_zoom: default_min_zoom(),
            max_zoom: default_max_zoom(),
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Camera with custom zoom limits.
    pub fn with_limits(min_zoom: f64, max_zoom: f64) -> Self {
        Self {
            min_zoom,
            max_zoom,
            ..Self::default()
        }
    }

    pub fn offset(&self) -> Vec2 {
        Vec2::new(self.offset_x, self.offset_y)
    }

    /// Board to screen transform.
    pub fn transform(&self) -> Affine {
        Affine::scale(self.zoom) * Affine::translate(self.offset())
    }

    /// Screen to board transform.
    pub fn inverse_transform(&self) -> Affine {
        Affine::translate(-self.offset()) * Affine::scale(1.0 / self.zoom)
    }

    pub fn screen_to_board(&self, screen: Point) -> Point {
        self.inverse_transform() * screen
    }

    pub fn board_to_screen(&self, board: Point) -> Point {
        self.transform() * board
    }

    /// Convert a screen-pixel distance to board units.
    pub fn px_to_board(&self, px: f64) -> f64 {
        px / self.zoom
    }

    /// Pan by a delta in screen pixels.
    pub fn pan(&mut self, screen_delta: Vec2) {
        self.offset_x += screen_delta.x / self.zoom;
        self.offset_y += screen_delta.y / self.zoom;
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
    }

    /// Zoom by `factor`, keeping the board point under `screen_point` fixed.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        let new_zoom = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }
        let anchor = self.screen_to_board(screen_point);
        self.zoom = new_zoom;
        // screen / zoom - board
        self.offset_x = screen_point.x / new_zoom - anchor.x;
        self.offset_y = screen_point.y / new_zoom - anchor.y;
    }

    pub fn reset(&mut self) {
        self.offset_x = 0.0;
        self.offset_y = 0.0;
        self.zoom = 1.0;
    }

    /// Visible board area for a viewport of `viewport` screen pixels.
    pub fn visible_rect(&self, viewport: Size) -> Rect {
        Rect::from_points(
            self.screen_to_board(Point::ZERO),
            self.screen_to_board(Point::new(viewport.width, viewport.height)),
        )
    }

    /// Fit the camera to show `bounds` inside `viewport` with `padding` pixels around.
    pub fn fit_to_bounds(&mut self, bounds: Rect, viewport: Size, padding: f64) {
        if bounds.is_zero_area() {
            self.reset();
            return;
        }
        let avail = Size::new(
            (viewport.width - padding * 2.0).max(1.0),
            (viewport.height - padding * 2.0).max(1.0),
        );
        let zoom = (avail.width / bounds.width()).min(avail.height / bounds.height());
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);

        let center = bounds.center();
        self.offset_x = viewport.width / 2.0 / self.zoom - center.x;
        self.offset_y = viewport.height / 2.0 / self.zoom - center.y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    #[test]
    fn test_offset_applies_before_zoom() {
        let camera = Camera {
            offset_x: 10.0,
            offset_y: -5.0,
            zoom: 2.0,
            ..Camera::default()
        };
        assert!(close(
            camera.board_to_screen(Point::new(1.0, 1.0)),
            Point::new(22.0, -8.0)
        ));
    }

    #[test]
    fn test_roundtrip_conversion() {
        let camera = Camera {
            offset_x: 30.0,
            offset_y: -20.0,
            zoom: 1.5,
            ..Camera::default()
        };
        let original = Point::new(123.0, 456.0);
        let back = camera.board_to_screen(camera.screen_to_board(original));
        assert!(close(back, original));
    }

    #[test]
    fn test_zoom_at_keeps_cursor_fixed() {
        let mut camera = Camera::new();
        camera.pan(Vec2::new(40.0, 10.0));
        let cursor = Point::new(200.0, 150.0);
        let before = camera.screen_to_board(cursor);
        camera.zoom_at(cursor, 2.5);
        assert!((camera.zoom - 2.5).abs() < 1e-12);
        assert!(close(camera.screen_to_board(cursor), before));
    }

    #[test]
    fn test_zoom_clamp() {
        let mut camera = Camera::with_limits(0.5, 4.0);
        camera.zoom_at(Point::ZERO, 0.001);
        assert_eq!(camera.zoom, 0.5);
        camera.zoom_at(Point::ZERO, 1000.0);
        assert_eq!(camera.zoom, 4.0);
    }

    #[test]
    fn test_pan_is_in_screen_pixels() {
        let mut camera = Camera::new();
        camera.set_zoom(2.0);
        camera.pan(Vec2::new(10.0, 20.0));
        let screen = camera.board_to_screen(Point::ZERO);
        assert!(close(screen, Point::new(10.0, 20.0)));
    }

    #[test]
    fn test_fit_to_bounds_centers_content() {
        let mut camera = Camera::new();
        let bounds = Rect::new(100.0, 100.0, 300.0, 200.0);
        camera.fit_to_bounds(bounds, Size::new(800.0, 600.0), 0.0);
        assert!((camera.zoom - 4.0).abs() < 1e-9);
        assert!(close(
            camera.board_to_screen(bounds.center()),
            Point::new(400.0, 300.0)
        ));
    }
}
