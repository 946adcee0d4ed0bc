// ============================================================
// Layer 7 — Pixel Canvas
// ============================================================
// Minimal raster drawing over an RGB image buffer: lines, rects,
// and scaled polylines. Enough surface for the comparison charts;
// anything fancier belongs in a plotting crate, not here.

use std::path::Path;

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
pub const GRID_GRAY: Rgb<u8> = Rgb([210, 210, 210]);

/// Curve colors, cycled per task/series.
pub const PALETTE: [Rgb<u8>; 8] = [
    Rgb([31, 119, 180]),
    Rgb([255, 127, 14]),
    Rgb([44, 160, 44]),
    Rgb([214, 39, 40]),
    Rgb([148, 103, 189]),
    Rgb([140, 86, 75]),
    Rgb([227, 119, 194]),
    Rgb([127, 127, 127]),
];

pub struct Canvas {
    img: RgbImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            img: RgbImage::from_pixel(width, height, WHITE),
        }
    }

    pub fn width(&self) -> u32 {
        self.img.width()
    }

    pub fn height(&self) -> u32 {
        self.img.height()
    }

    pub fn put(&mut self, x: i64, y: i64, color: Rgb<u8>) {
        if x >= 0 && y >= 0 && (x as u32) < self.img.width() && (y as u32) < self.img.height() {
            self.img.put_pixel(x as u32, y as u32, color);
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgb<u8> {
        *self.img.get_pixel(x, y)
    }

    /// Bresenham line, clipped at the canvas edges.
    pub fn line(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let (mut x, mut y) = (x0, y0);

        loop {
            self.put(x, y, color);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Axis-aligned rectangle outline.
    pub fn rect(&mut self, x: i64, y: i64, width: i64, height: i64, color: Rgb<u8>) {
        self.line(x, y, x + width - 1, y, color);
        self.line(x, y + height - 1, x + width - 1, y + height - 1, color);
        self.line(x, y, x, y + height - 1, color);
        self.line(x + width - 1, y, x + width - 1, y + height - 1, color);
    }

    pub fn fill_rect(&mut self, x: i64, y: i64, width: i64, height: i64, color: Rgb<u8>) {
        for yy in y..y + height {
            for xx in x..x + width {
                self.put(xx, yy, color);
            }
        }
    }

    /// Draw (x, y) data points as a connected polyline inside a
    /// pixel region, scaling x over [0, x_max] and y over y_range.
    /// y grows upward in data space, downward in pixel space.
    #[allow(clippy::too_many_arguments)]
    pub fn polyline(
        &mut self,
        region_x: i64,
        region_y: i64,
        region_w: i64,
        region_h: i64,
        points: &[(f64, f64)],
        x_max: f64,
        y_range: (f64, f64),
        color: Rgb<u8>,
    ) {
        let (y_lo, y_hi) = y_range;
        let y_span = (y_hi - y_lo).max(f64::EPSILON);
        let x_span = x_max.max(f64::EPSILON);

        let project = |&(px, py): &(f64, f64)| {
            let x = region_x + ((px / x_span) * (region_w - 1) as f64).round() as i64;
            let clamped = py.clamp(y_lo, y_hi);
            let y = region_y + region_h - 1
                - (((clamped - y_lo) / y_span) * (region_h - 1) as f64).round() as i64;
            (x, y)
        };

        let projected: Vec<(i64, i64)> = points
            .iter()
            .filter(|(_, py)| py.is_finite())
            .map(|p| project(p))
            .collect();

        match projected.as_slice() {
            [] => {}
            [(x, y)] => self.put(*x, *y, color),
            segments => {
                for pair in segments.windows(2) {
                    self.line(pair[0].0, pair[0].1, pair[1].0, pair[1].1, color);
                }
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.img
            .save(path)
            .with_context(|| format!("writing figure '{}'", path.display()))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canvas_starts_white() {
        let canvas = Canvas::new(8, 8);
        assert_eq!(canvas.pixel(0, 0), WHITE);
        assert_eq!(canvas.pixel(7, 7), WHITE);
    }

    #[test]
    fn line_colors_both_endpoints() {
        let mut canvas = Canvas::new(16, 16);
        canvas.line(2, 3, 12, 9, BLACK);
        assert_eq!(canvas.pixel(2, 3), BLACK);
        assert_eq!(canvas.pixel(12, 9), BLACK);
    }

    #[test]
    fn drawing_outside_the_canvas_is_a_no_op() {
        let mut canvas = Canvas::new(4, 4);
        canvas.put(-1, 0, BLACK);
        canvas.put(0, 100, BLACK);
        canvas.line(-5, -5, 10, 10, BLACK);
        // In-bounds part of the diagonal was drawn.
        assert_eq!(canvas.pixel(2, 2), BLACK);
    }

    #[test]
    fn polyline_projects_into_the_region() {
        let mut canvas = Canvas::new(40, 40);
        // A flat line at the bottom of the y-range lands on the
        // region's bottom row.
        canvas.polyline(10, 10, 20, 20, &[(0.0, 0.0), (4.0, 0.0)], 4.0, (0.0, 1.0), BLACK);
        assert_eq!(canvas.pixel(10, 29), BLACK);
        assert_eq!(canvas.pixel(29, 29), BLACK);
        // Nothing above the region's top row.
        assert_eq!(canvas.pixel(10, 9), WHITE);
    }

    #[test]
    fn polyline_skips_non_finite_points() {
        let mut canvas = Canvas::new(20, 20);
        canvas.polyline(
            0,
            0,
            20,
            20,
            &[(0.0, f64::NAN), (1.0, 0.5)],
            1.0,
            (0.0, 1.0),
            BLACK,
        );
        // The finite point was still drawn: x = 19, y = 19 - round(0.5 * 19).
        assert_eq!(canvas.pixel(19, 9), BLACK);
    }
}
