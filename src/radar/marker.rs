use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_filled_circle_mut;

// Linear calibration of WGS84 degrees to the vrijeme.hr composite raster.
const X_REF_PX: f64 = 668.0;
const X_REF_LON: f64 = 19.0833;
const PX_PER_DEG_LON: f64 = 55.0;
const Y_REF_PX: f64 = 480.0;
const Y_REF_LAT: f64 = 42.1667;
const PX_PER_DEG_LAT: f64 = 81.0;

const MARKER_RADIUS: i32 = 5;
const MARKER_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Configured geographic point, precomputed to raster coordinates.
#[derive(Debug, Clone, Copy)]
pub struct LocationMarker {
    x: i32,
    y: i32,
}

impl LocationMarker {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        let (x, y) = raster_position(latitude, longitude);
        Self { x, y }
    }

    /// Draw a filled circle at the marker position on a decoded frame.
    pub fn draw(&self, image: &mut RgbaImage) {
        draw_filled_circle_mut(image, (self.x, self.y), MARKER_RADIUS, MARKER_COLOR);
    }
}

/// Fixed linear transform from latitude/longitude to composite pixels.
pub(crate) fn raster_position(latitude: f64, longitude: f64) -> (i32, i32) {
    let x = X_REF_PX - (X_REF_LON - longitude) * PX_PER_DEG_LON;
    let y = Y_REF_PX - (latitude - Y_REF_LAT) * PX_PER_DEG_LAT;
    (x.round() as i32, y.round() as i32)
}
