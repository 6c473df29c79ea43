use serde::Serialize;

/// Axis-aligned rectangle in document pixel space: origin top-left,
/// y grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Rect {
        Rect { x, y, w, h }
    }
}

/// Bounding box in recognizer space: unit square, origin bottom-left,
/// y grows upward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedBox {
    pub origin_x: f32,
    pub origin_y: f32,
    pub width: f32,
    pub height: f32,
}

impl NormalizedBox {
    /// Maps a recognizer box onto a raster of `raster_w` x `raster_h`
    /// pixels. The y flip must subtract the box height as well as the
    /// origin; dropping the height term shifts every box down by its own
    /// height.
    pub fn to_rect(&self, raster_w: f32, raster_h: f32) -> Rect {
        Rect {
            x: self.origin_x * raster_w,
            y: (1.0 - self.origin_y - self.height) * raster_h,
            w: self.width * raster_w,
            h: self.height * raster_h,
        }
    }

    /// Inverse of [`NormalizedBox::to_rect`].
    pub fn from_rect(rect: &Rect, raster_w: f32, raster_h: f32) -> NormalizedBox {
        NormalizedBox {
            origin_x: rect.x / raster_w,
            origin_y: 1.0 - rect.y / raster_h - rect.h / raster_h,
            width: rect.w / raster_w,
            height: rect.h / raster_h,
        }
    }
}
