//! RGB pixel buffers, exposure frames and drawing primitives.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bytes per pixel.
pub const CHANNELS: usize = 3;

/// Background color of every frame.
pub const BLACK: [u8; 3] = [0x00, 0x00, 0x00];

/// Color used to mark solid pixels in a layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerColor {
    /// White, for printing.
    #[default]
    Normal,
    /// Red, for checking alignment without curing resin.
    Highlight,
}

impl LayerColor {
    /// RGB bytes for this color.
    pub fn rgb(self) -> [u8; 3] {
        match self {
            LayerColor::Normal => [0xff, 0xff, 0xff],
            LayerColor::Highlight => [0xff, 0x00, 0x00],
        }
    }

    /// `Highlight` when `red` is set.
    pub fn from_red_flag(red: bool) -> Self {
        if red {
            LayerColor::Highlight
        } else {
            LayerColor::Normal
        }
    }
}

/// A black-initialized RGB raster.
///
/// The shape helpers take model coordinates and map them to pixels with
/// `px = width/2 + scale·x` and `py = height/2 − scale·y`, so positive y is
/// up on the projected image.
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    width: usize,
    height: usize,
    scale: f64,
    pixels: Vec<u8>,
}

impl Canvas {
    /// Create a black canvas with unit scale.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            scale: 1.0,
            pixels: vec![0; width * height * CHANNELS],
        }
    }

    /// Set the model-to-pixel scale used by the shape helpers.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw RGB bytes, row-major.
    pub fn as_rgb(&self) -> &[u8] {
        &self.pixels
    }

    /// Consume the canvas, returning its RGB bytes.
    pub fn into_rgb(self) -> Vec<u8> {
        self.pixels
    }

    /// Color at `(x, y)`, if inside the canvas.
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * CHANNELS;
        Some([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]])
    }

    /// Paint one pixel; out-of-range coordinates are ignored.
    pub fn set_pixel(&mut self, x: usize, y: usize, color: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = (y * self.width + x) * CHANNELS;
        self.pixels[i..i + CHANNELS].copy_from_slice(&color);
    }

    /// Paint the half-open pixel range `[x1, x2)` of row `y`, clipped.
    pub fn run(&mut self, x1: i64, x2: i64, y: i64, color: [u8; 3]) {
        if y < 0 || y >= self.height as i64 {
            return;
        }
        let x1 = x1.max(0);
        let x2 = x2.min(self.width as i64);
        if x1 >= x2 {
            return;
        }
        let row = y as usize * self.width;
        let begin = (row + x1 as usize) * CHANNELS;
        let end = (row + x2 as usize) * CHANNELS;
        for px in self.pixels[begin..end].chunks_exact_mut(CHANNELS) {
            px.copy_from_slice(&color);
        }
    }

    /// Number of non-black pixels.
    pub fn count_marked(&self) -> usize {
        self.pixels
            .chunks_exact(CHANNELS)
            .filter(|px| *px != BLACK)
            .count()
    }

    /// Filled axis-aligned rectangle centered at `(xc, yc)`.
    pub fn rectangle(&mut self, xc: f64, yc: f64, xsize: f64, ysize: f64, color: [u8; 3]) {
        let (cx, cy) = self.to_pixel(xc, yc);
        let xsize = (xsize * self.scale) as i64;
        let ysize = (ysize * self.scale) as i64;
        let (xh, yh) = (xsize / 2, ysize / 2);
        for i in 0..ysize {
            self.run(cx - xh, cx + xh, cy - yh + i, color);
        }
    }

    /// Filled circle centered at `(xc, yc)`.
    pub fn circle(&mut self, xc: f64, yc: f64, radius: f64, color: [u8; 3]) {
        let (cx, cy) = self.to_pixel(xc, yc);
        let (cx, cy) = (cx as f64, cy as f64);
        let r = radius * self.scale;
        for y in (cy - r - 1.0) as i64..(cy + r + 1.0) as i64 {
            let d = r * r - (y as f64 - cy).powi(2);
            if d >= 0.0 {
                let half = d.sqrt();
                self.run((cx - half) as i64, (cx + half) as i64, y, color);
            }
        }
    }

    /// Diamond outline with corners `size` from the center and arms
    /// `width` thick.
    pub fn hollow_diamond(&mut self, xc: f64, yc: f64, size: f64, width: f64, color: [u8; 3]) {
        let (cx, cy) = self.to_pixel(xc, yc);
        let s = (size * self.scale) as i64;
        let w = (width * self.scale) as i64;

        // Top cap.
        for i in 0..w {
            self.run(cx - i, cx + i, cy - s + i, color);
        }
        // Upper arms.
        for i in 0..(s - w) {
            let y = cy + w - s + i;
            self.run(cx - w - i, cx - i, y, color);
            self.run(cx + i, cx + w + i, y, color);
        }
        // Lower arms.
        for i in 0..(s - w) {
            let y = cy + i;
            self.run(cx - s + i, cx - s + w + i, y, color);
            self.run(cx + s - w - i, cx + s - i, y, color);
        }
        // Bottom cap.
        for i in 0..w {
            self.run(cx - w + i, cx + w - i, cy + s - w + i, color);
        }
    }

    fn to_pixel(&self, x: f64, y: f64) -> (i64, i64) {
        let px = (self.width / 2) as f64 + self.scale * x;
        let py = (self.height / 2) as f64 - self.scale * y;
        (px as i64, py as i64)
    }
}

/// One exposure: a finished layer image with its sequence id, exposure
/// duration and the height it was sliced at.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    sequence_id: u64,
    duration: Duration,
    z: f64,
    canvas: Canvas,
}

impl Frame {
    /// Wrap a rendered canvas.
    pub fn new(sequence_id: u64, duration: Duration, z: f64, canvas: Canvas) -> Self {
        Self {
            sequence_id,
            duration,
            z,
            canvas,
        }
    }

    /// Monotonically increasing id assigned by the controller.
    pub fn sequence_id(&self) -> u64 {
        self.sequence_id
    }

    /// How long the frame should be shown.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Slice height.
    pub fn z(&self) -> f64 {
        self.z
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.canvas.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.canvas.height()
    }

    /// Raw RGB bytes.
    pub fn rgb(&self) -> &[u8] {
        self.canvas.as_rgb()
    }

    /// The underlying canvas.
    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: [u8; 3] = [0xff, 0xff, 0xff];

    #[test]
    fn test_new_is_black() {
        let c = Canvas::new(4, 3);
        assert_eq!(c.as_rgb().len(), 36);
        assert_eq!(c.count_marked(), 0);
    }

    #[test]
    fn test_run_is_half_open() {
        let mut c = Canvas::new(10, 2);
        c.run(2, 5, 1, WHITE);
        assert_eq!(c.count_marked(), 3);
        assert_eq!(c.pixel(1, 1), Some(BLACK));
        assert_eq!(c.pixel(2, 1), Some(WHITE));
        assert_eq!(c.pixel(4, 1), Some(WHITE));
        assert_eq!(c.pixel(5, 1), Some(BLACK));
        c.run(3, 3, 0, WHITE);
        assert_eq!(c.count_marked(), 3);
    }

    #[test]
    fn test_run_clips() {
        let mut c = Canvas::new(10, 2);
        c.run(-5, 3, 0, WHITE);
        c.run(8, 50, 0, WHITE);
        c.run(0, 10, 7, WHITE);
        c.run(0, 10, -1, WHITE);
        assert_eq!(c.count_marked(), 5);
    }

    #[test]
    fn test_rectangle_at_scale() {
        let mut c = Canvas::new(1024, 768).with_scale(3.0);
        c.rectangle(0.0, 0.0, 10.0, 7.0, WHITE);
        // 30 pixels wide, 21 rows.
        assert_eq!(c.count_marked(), 30 * 21);
        assert_eq!(c.pixel(512 - 15, 384), Some(WHITE));
        assert_eq!(c.pixel(512 + 15, 384), Some(BLACK));
    }

    #[test]
    fn test_positive_y_is_up() {
        let mut c = Canvas::new(100, 100);
        c.rectangle(0.0, 20.0, 2.0, 2.0, WHITE);
        assert_eq!(c.pixel(50, 30), Some(WHITE));
        assert_eq!(c.pixel(50, 70), Some(BLACK));
    }

    #[test]
    fn test_circle_is_symmetric() {
        let mut c = Canvas::new(200, 200);
        c.circle(0.0, 0.0, 20.0, WHITE);
        assert!(c.count_marked() > 0);
        assert_eq!(c.pixel(100, 100), Some(WHITE));
        assert_eq!(c.pixel(100, 85), Some(WHITE));
        assert_eq!(c.pixel(100, 115), Some(WHITE));
        assert_eq!(c.pixel(100, 125), Some(BLACK));
    }

    #[test]
    fn test_hollow_diamond_has_empty_center() {
        let mut c = Canvas::new(1024, 768).with_scale(3.0);
        c.hollow_diamond(0.0, 0.0, 40.0, 7.0, WHITE);
        assert!(c.count_marked() > 0);
        assert_eq!(c.pixel(512, 384), Some(BLACK));
        // Left and right corners are on the outline.
        assert_eq!(c.pixel(512 - 115, 384), Some(WHITE));
        assert_eq!(c.pixel(512 + 115, 384), Some(WHITE));
        assert_eq!(c.pixel(512 - 125, 384), Some(BLACK));
    }

    #[test]
    fn test_layer_color_rgb() {
        assert_eq!(LayerColor::Normal.rgb(), WHITE);
        assert_eq!(LayerColor::Highlight.rgb(), [0xff, 0, 0]);
        assert_eq!(LayerColor::from_red_flag(true), LayerColor::Highlight);
        assert_eq!(LayerColor::default(), LayerColor::Normal);
    }

    #[test]
    fn test_frame_accessors() {
        let f = Frame::new(7, Duration::from_millis(1500), 0.25, Canvas::new(8, 6));
        assert_eq!(f.sequence_id(), 7);
        assert_eq!(f.duration(), Duration::from_millis(1500));
        assert_eq!((f.width(), f.height()), (8, 6));
        assert_eq!(f.rgb().len(), 8 * 6 * 3);
    }
}
