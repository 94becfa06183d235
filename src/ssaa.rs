//! SSAA — rotated-grid supersampling (RGSS), the reference-quality engine
//! the other four are compared against.
//!
//! Unlike the scanline/flux engines, SSAA does no edge-table bookkeeping at
//! all: for every pixel in a polygon's (clipped) bounding box it counts how
//! many of a fixed, rotated 8x8 sample grid fall inside the polygon via a
//! ray-casting point-in-polygon test, the textbook approach also used by
//! the sibling pack crate `oniproject-kiss2d` for its software rasterizer's
//! coverage estimation. A tile-opaque bitmap short-circuits resampling for
//! tiles already known to be fully covered by an earlier polygon in the
//! same `draw_polygon` call... in practice each call only ever draws one
//! polygon, so the bitmap is scoped per-call and mainly earns its keep by
//! letting a single large polygon skip its own interior once a tile is
//! found solid.

use crate::color::{blend_pix, coverage_to_u8};
use crate::geometry::{self, Point};

const GRID: usize = 8;
const SAMPLE_COUNT: usize = GRID * GRID;

/// Construction-time tunables for [`Ssaa`].
#[derive(Debug, Clone, Copy)]
pub struct SsaaOptions {
    /// Rotation angle (radians) of the regular sample grid. Default
    /// `atan(0.5)` (~26.565 degrees), the classic RGSS angle that
    /// decorrelates horizontal/vertical edges from the sample lattice.
    pub rotation_angle: f64,
    /// Side length, in pixels, of the opaque-tracking tile bitmap.
    pub tile_size: u32,
    /// Distance tolerance for the on-edge case in the ray-cast
    /// point-in-polygon test.
    pub edge_eps: f64,
}

impl Default for SsaaOptions {
    fn default() -> Self {
        Self {
            rotation_angle: 0.5f64.atan(),
            tile_size: 8,
            edge_eps: 1e-9,
        }
    }
}

/// Rotated-grid supersampling rasterizer (reference quality).
pub struct Ssaa {
    width: i32,
    height: i32,
    buffer: Vec<u32>,
    options: SsaaOptions,
    /// Sample offsets within a unit pixel, `[0,1)^2`, already rotated and
    /// clamped.
    samples: [(f64, f64); SAMPLE_COUNT],
    /// `sample_count + 1` entries: `alpha_lut[n]` is the blend alpha for
    /// `n` samples inside the polygon.
    alpha_lut: [u8; SAMPLE_COUNT + 1],
}

impl Ssaa {
    pub fn new(width: i32, height: i32) -> Self {
        Self::with_options(width, height, SsaaOptions::default())
    }

    pub fn with_options(width: i32, height: i32, options: SsaaOptions) -> Self {
        assert!(width > 0 && height > 0, "Ssaa dimensions must be positive");
        let n = (width as usize) * (height as usize);
        let samples = build_rotated_grid(options.rotation_angle);
        let mut alpha_lut = [0u8; SAMPLE_COUNT + 1];
        for (n_covered, slot) in alpha_lut.iter_mut().enumerate() {
            *slot = coverage_to_u8(n_covered as f64 / SAMPLE_COUNT as f64);
        }
        Self {
            width,
            height,
            buffer: vec![0xFF00_0000; n],
            options,
            samples,
            alpha_lut,
        }
    }

    pub fn clear(&mut self, argb: u32) {
        self.buffer.fill(argb);
    }

    pub fn buffer(&self) -> &[u32] {
        &self.buffer
    }

    pub fn draw_polygon(&mut self, vertices: &[f64], color: u32) {
        if !geometry::is_valid_polygon(vertices) {
            return;
        }
        let bbox = geometry::bounding_box(vertices);
        if geometry::bbox_entirely_outside(&bbox, self.width, self.height) {
            return;
        }
        let points = geometry::unpack_points(vertices);

        let x0 = (bbox.x1.floor() as i32).max(0);
        let x1 = (bbox.x2.ceil() as i32).min(self.width);
        let y0 = (bbox.y1.floor() as i32).max(0);
        let y1 = (bbox.y2.ceil() as i32).min(self.height);
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        let tile = self.options.tile_size.max(1) as i32;
        let tiles_x = (((x1 - x0) + tile - 1) / tile) as usize;
        let tiles_y = (((y1 - y0) + tile - 1) / tile) as usize;
        let mut tile_opaque = vec![false; tiles_x * tiles_y];

        let src_opaque = (color & 0x00FF_FFFF) | 0xFF00_0000;
        let src_alpha = (color >> 24) as u8;

        for y in y0..y1 {
            let ty = ((y - y0) / tile) as usize;
            for x in x0..x1 {
                let tx = ((x - x0) / tile) as usize;
                let tile_idx = ty * tiles_x + tx;
                if tile_opaque[tile_idx] {
                    let idx = (y as usize) * (self.width as usize) + x as usize;
                    let dst = &mut self.buffer[idx];
                    *dst = blend_pix(*dst, src_opaque, src_alpha);
                    continue;
                }

                let covered = self.count_covered_samples(&points, x, y);
                if covered == 0 {
                    continue;
                }
                let cov = self.alpha_lut[covered];
                let idx = (y as usize) * (self.width as usize) + x as usize;
                let dst = &mut self.buffer[idx];
                *dst = blend_pix(*dst, color, cov);

                if covered == SAMPLE_COUNT && self.tile_fully_solid(&points, x0, x1, y0, y1, tx, ty, tile) {
                    tile_opaque[tile_idx] = true;
                }
            }
        }
    }

    fn count_covered_samples(&self, points: &[Point], x: i32, y: i32) -> usize {
        let mut n = 0usize;
        for &(sx, sy) in &self.samples {
            let px = x as f64 + sx;
            let py = y as f64 + sy;
            if point_in_polygon(points, px, py, self.options.edge_eps) {
                n += 1;
            }
        }
        n
    }

    /// Check whether every pixel in the tile containing `(tx, ty)` (clipped
    /// to the polygon's bbox) is fully covered, to seed the opaque bitmap
    /// early and skip resampling the rest of that tile.
    #[allow(clippy::too_many_arguments)]
    fn tile_fully_solid(
        &self,
        points: &[Point],
        x0: i32,
        x1: i32,
        y0: i32,
        y1: i32,
        tx: usize,
        ty: usize,
        tile: i32,
    ) -> bool {
        let tile_x0 = x0 + tx as i32 * tile;
        let tile_y0 = y0 + ty as i32 * tile;
        let tile_x1 = (tile_x0 + tile).min(x1);
        let tile_y1 = (tile_y0 + tile).min(y1);
        for y in tile_y0..tile_y1 {
            for x in tile_x0..tile_x1 {
                if self.count_covered_samples(points, x, y) != SAMPLE_COUNT {
                    return false;
                }
            }
        }
        true
    }
}

/// Build the 64 rotated-grid sample offsets within `[0,1)^2`: a regular
/// 8x8 lattice centered on the pixel, rotated by `angle` about the pixel
/// center and clamped back into the unit square.
fn build_rotated_grid(angle: f64) -> [(f64, f64); SAMPLE_COUNT] {
    let (sin_a, cos_a) = angle.sin_cos();
    let mut out = [(0.0, 0.0); SAMPLE_COUNT];
    let mut i = 0;
    for gy in 0..GRID {
        for gx in 0..GRID {
            let ux = (gx as f64 + 0.5) / GRID as f64 - 0.5;
            let uy = (gy as f64 + 0.5) / GRID as f64 - 0.5;
            let rx = ux * cos_a - uy * sin_a;
            let ry = ux * sin_a + uy * cos_a;
            let wx = (rx + 0.5).clamp(0.0, 1.0 - 1e-12);
            let wy = (ry + 0.5).clamp(0.0, 1.0 - 1e-12);
            out[i] = (wx, wy);
            i += 1;
        }
    }
    out
}

/// Ray-cast point-in-polygon test: count crossings of a horizontal ray
/// from `(px, py)` to `+infinity` with the polygon's edges.
fn point_in_polygon(points: &[Point], px: f64, py: f64, edge_eps: f64) -> bool {
    let n = points.len();
    let mut inside = false;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        if on_edge(a, b, px, py, edge_eps) {
            return true;
        }
        let (ya, yb) = (a.y, b.y);
        if (ya > py) != (yb > py) {
            let t = (py - ya) / (yb - ya);
            let x_cross = a.x + t * (b.x - a.x);
            if x_cross > px {
                inside = !inside;
            }
        }
    }
    inside
}

/// Returns `true` if `(px, py)` lies within `eps` of segment `a-b`
/// (treated as "inside", matching how AA rasterizers conventionally
/// resolve exact-boundary samples toward coverage rather than away from
/// it).
fn on_edge(a: Point, b: Point, px: f64, py: f64, eps: f64) -> bool {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return false;
    }
    let t = ((px - a.x) * dx + (py - a.y) * dy) / len_sq;
    if !(0.0..=1.0).contains(&t) {
        return false;
    }
    let cx = a.x + t * dx;
    let cy = a.y + t * dy;
    let dist_sq = (px - cx).powi(2) + (py - cy).powi(2);
    dist_sq <= eps * eps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color;

    #[test]
    fn test_clear_idempotent() {
        let mut r = Ssaa::new(8, 8);
        r.clear(0xFF102030);
        let a = r.buffer().to_vec();
        r.clear(0xFF102030);
        assert_eq!(a, r.buffer());
    }

    #[test]
    fn test_empty_polygon_is_noop() {
        let mut r = Ssaa::new(8, 8);
        r.clear(0xFF000000);
        let before = r.buffer().to_vec();
        r.draw_polygon(&[0.0, 0.0, 1.0, 1.0], 0xFFFFFFFF);
        assert_eq!(before, r.buffer());
    }

    #[test]
    fn test_offscreen_polygon_is_noop() {
        let mut r = Ssaa::new(8, 8);
        r.clear(0xFF000000);
        let before = r.buffer().to_vec();
        r.draw_polygon(&[100.0, 100.0, 110.0, 100.0, 105.0, 110.0], 0xFFFFFFFF);
        assert_eq!(before, r.buffer());
    }

    #[test]
    fn test_full_frame_rectangle_via_two_triangles() {
        let mut r = Ssaa::new(8, 8);
        r.clear(0xFF000000);
        r.draw_polygon(&[0.0, 0.0, 8.0, 0.0, 8.0, 8.0], 0xFFFF0000);
        r.draw_polygon(&[0.0, 0.0, 8.0, 8.0, 0.0, 8.0], 0xFFFF0000);
        for &p in r.buffer() {
            assert_eq!(p, 0xFFFF0000);
        }
    }

    #[test]
    fn test_solid_triangle_centroid_and_corner() {
        let mut r = Ssaa::new(8, 8);
        r.clear(0xFF000000);
        r.draw_polygon(&[1.0, 1.0, 7.0, 1.0, 4.0, 7.0], 0xFFFFFFFF);
        let idx = |x: i32, y: i32| (y * 8 + x) as usize;
        assert_eq!(r.buffer()[idx(4, 4)], 0xFFFFFFFF);
        assert_eq!(r.buffer()[idx(0, 0)], 0xFF000000);
    }

    #[test]
    fn test_axis_aligned_rect_full_alpha_interior() {
        let mut r = Ssaa::new(8, 8);
        r.clear(0xFF000000);
        r.draw_polygon(&[0.0, 0.0, 8.0, 0.0, 8.0, 8.0, 0.0, 8.0], 0xFFFF00FF);
        for &p in r.buffer() {
            assert_eq!(p, 0xFFFF00FF);
        }
    }

    #[test]
    fn test_half_alpha_blend_interior() {
        let mut r = Ssaa::new(8, 8);
        r.clear(0xFF000000);
        r.draw_polygon(&[0.0, 0.0, 8.0, 0.0, 8.0, 8.0, 0.0, 8.0], 0x80FFFFFF);
        let c = color::Rgba8::from_argb_u32(r.buffer()[4 * 8 + 4]);
        assert!((c.r as i32 - 128).abs() <= 2);
        assert!((c.g as i32 - 128).abs() <= 2);
        assert!((c.b as i32 - 128).abs() <= 2);
    }

    #[test]
    fn test_draw_twice_opaque_is_idempotent() {
        let mut r = Ssaa::new(8, 8);
        r.clear(0xFF000000);
        let verts = [1.0, 1.0, 7.0, 1.0, 4.0, 7.0];
        r.draw_polygon(&verts, 0xFFFFFFFF);
        let once = r.buffer().to_vec();
        r.draw_polygon(&verts, 0xFFFFFFFF);
        assert_eq!(once, r.buffer());
    }

    #[test]
    fn test_rotated_grid_samples_stay_in_unit_square() {
        let grid = build_rotated_grid(0.5f64.atan());
        for &(x, y) in &grid {
            assert!((0.0..1.0).contains(&x));
            assert!((0.0..1.0).contains(&y));
        }
    }

    #[test]
    fn test_alpha_lut_endpoints() {
        let r = Ssaa::new(4, 4);
        assert_eq!(r.alpha_lut[0], 0);
        assert_eq!(r.alpha_lut[SAMPLE_COUNT], 255);
    }

    #[test]
    fn test_mirror_symmetry_within_quantization_floor() {
        // The rotated sample grid is built once at a fixed angle and
        // reused unmirrored at every pixel, so mirroring a polygon about
        // a column axis is not the same as mirroring the sample grid
        // itself (a pure x-reflection of a rotated grid is the grid
        // rotated the other way, not the same grid back). An exact
        // 2-level match isn't guaranteed here the way it is for the
        // analytic engines; the achievable floor is about two sample
        // steps (255 / SAMPLE_COUNT per sample, doubled for slack).
        const SSAA_MIRROR_TOLERANCE: i32 = 2 * (255 / SAMPLE_COUNT as i32);

        let mut left = Ssaa::new(8, 8);
        left.clear(0xFF000000);
        left.draw_polygon(&[1.0, 1.0, 5.0, 1.0, 2.0, 7.0], 0xFFFFFFFF);

        let mut right = Ssaa::new(8, 8);
        right.clear(0xFF000000);
        // Mirror about column width/2 = 4: x' = 8 - x.
        right.draw_polygon(&[7.0, 1.0, 3.0, 1.0, 6.0, 7.0], 0xFFFFFFFF);

        for y in 0..8 {
            for x in 0..8 {
                let l = color::Rgba8::from_argb_u32(left.buffer()[y * 8 + x]);
                let r_px = color::Rgba8::from_argb_u32(right.buffer()[y * 8 + (7 - x)]);
                assert!((l.r as i32 - r_px.r as i32).abs() <= SSAA_MIRROR_TOLERANCE);
            }
        }
    }
}
