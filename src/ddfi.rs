//! DDFI — Discrete Differential Flux Integration.
//!
//! Applies Green's theorem: each polygon edge deposits a signed horizontal
//! "flux" delta at the scanlines it crosses. Prefix-summing (integrating)
//! those deltas along a scanline recovers the accumulated winding/coverage
//! fraction at every pixel — the same idea as AGG's cell area/cover
//! integration in `rasterizer_cells_aa.rs`/`rasterizer_scanline_aa.rs`, but
//! collapsed to a single signed accumulator per pixel instead of a
//! cover+area pair, since DDFI only needs the coverage fraction, not a
//! fractional sub-cell position.
//!
//! Triangles only: polygons with more than 3 vertices are fan-triangulated
//! from vertex 0 (see [`crate::geometry::fan_triangulate`]), which is exact
//! for convex polygons and a documented limitation for concave ones.

use crate::basics::{iceil, ifloor, FillingRule};
use crate::color::blend_pix;
use crate::geometry::{self, Point};

/// Q16.16 fixed-point shift used for flux x-positions and slopes.
const SHIFT: u32 = 16;
/// One full unit of coverage in Q16.16 (a fully-covered pixel run).
const ONE: i64 = 1 << SHIFT;

/// Convert a continuous coordinate to Q16.16 fixed point.
#[inline]
fn to_fixed(v: f64) -> i64 {
    (v * ONE as f64).round() as i64
}

/// Discrete Differential Flux Integration rasterizer.
pub struct Ddfi {
    width: i32,
    height: i32,
    buffer: Vec<u32>,
    /// Signed flux accumulator, row-major, `width * height` entries.
    /// Zero-equivalent outside any polygon's bounding box at all times:
    /// each `draw_polygon` call clears exactly the cells it touched as part
    /// of its resolve pass.
    flux: Vec<i64>,
    filling_rule: FillingRule,
}

impl Ddfi {
    pub fn new(width: i32, height: i32) -> Self {
        assert!(width > 0 && height > 0, "Ddfi dimensions must be positive");
        let n = (width as usize) * (height as usize);
        Self {
            width,
            height,
            buffer: vec![0xFF00_0000; n],
            flux: vec![0; n],
            filling_rule: FillingRule::NonZero,
        }
    }

    pub fn filling_rule(&mut self, rule: FillingRule) {
        self.filling_rule = rule;
    }

    pub fn clear(&mut self, argb: u32) {
        self.buffer.fill(argb);
        // The flux buffer is already zero-equivalent between draws; nothing
        // to reset there.
    }

    pub fn buffer(&self) -> &[u32] {
        &self.buffer
    }

    /// Rasterize a closed polygon (`vertices.len() >= 6`, even) into the
    /// buffer with source-over alpha compositing.
    pub fn draw_polygon(&mut self, vertices: &[f64], color: u32) {
        if !geometry::is_valid_polygon(vertices) {
            return;
        }
        let bbox = geometry::bounding_box(vertices);
        if geometry::bbox_entirely_outside(&bbox, self.width, self.height) {
            return;
        }

        let points = geometry::unpack_points(vertices);
        for tri in geometry::fan_triangulate(&points) {
            self.draw_triangle(&tri, color);
        }
    }

    fn draw_triangle(&mut self, tri: &[Point; 3], color: u32) {
        let min_x = tri[0].x.min(tri[1].x).min(tri[2].x);
        let max_x = tri[0].x.max(tri[1].x).max(tri[2].x);
        let min_y = tri[0].y.min(tri[1].y).min(tri[2].y);
        let max_y = tri[0].y.max(tri[1].y).max(tri[2].y);

        // Clip the triangle's bbox to the framebuffer; anything outside is
        // simply never deposited into (edges still walked in full so the
        // deposits that do land in-bounds stay correct).
        let x1 = (ifloor(min_x)).max(0);
        let x2 = (iceil(max_x)).min(self.width - 1);
        let y1 = (ifloor(min_y)).max(0);
        let y2 = (iceil(max_y)).min(self.height - 1);
        if x1 > x2 || y1 > y2 {
            return;
        }

        self.deposit_edge(tri[0], tri[1], y1, y2);
        self.deposit_edge(tri[1], tri[2], y1, y2);
        self.deposit_edge(tri[2], tri[0], y1, y2);

        self.resolve(x1, x2, y1, y2, color);
    }

    /// Deposit one edge's flux contribution into `self.flux`, restricted to
    /// scanlines `[clip_y1, clip_y2]` (the triangle's clipped bbox).
    fn deposit_edge(&mut self, a: Point, b: Point, clip_y1: i32, clip_y2: i32) {
        if a.y == b.y {
            return; // horizontal edge: no scanline crossings
        }
        // winding: +1 for a top-to-bottom edge, -1 for bottom-to-top,
        // recorded before normalizing the traversal direction below.
        let winding: i64 = if b.y > a.y { 1 } else { -1 };
        let (top, bot) = if a.y < b.y { (a, b) } else { (b, a) };

        let y_start = iceil(top.y);
        let y_end = ifloor(bot.y);
        if y_start > y_end {
            return;
        }
        let y_lo = y_start.max(clip_y1).max(0);
        let y_hi = y_end.min(clip_y2).min(self.height - 1);
        if y_lo > y_hi {
            return;
        }

        let dy = bot.y - top.y;
        let slope = (bot.x - top.x) / dy;
        let slope_fixed = to_fixed(slope);

        // x at the sampling center of scanline y_lo, computed directly
        // (rather than stepped in from y_start) so a triangle whose true
        // y-range reaches far off-screen doesn't force a long unclipped walk.
        let x_at_first = top.x + slope * ((y_lo as f64 + 0.5) - top.y);
        let mut x = to_fixed(x_at_first);

        for y in y_lo..=y_hi {
            let row = (y as usize) * (self.width as usize);
            let px = (x >> SHIFT) as i32;
            let frac = x - ((px as i64) << SHIFT);

            if px >= 0 && (px as usize) < self.width as usize {
                self.flux[row + px as usize] += winding * (ONE - frac);
            }
            if px + 1 >= 0 && ((px + 1) as usize) < self.width as usize {
                self.flux[row + (px + 1) as usize] += winding * frac;
            }
            x += slope_fixed;
        }
    }

    /// Prefix-sum each touched row into pixel coverage, blend, and zero the
    /// flux cells as they're consumed.
    fn resolve(&mut self, x1: i32, x2: i32, y1: i32, y2: i32, color: u32) {
        let src_opaque = (color & 0x00FF_FFFF) | 0xFF00_0000;
        let src_alpha = (color >> 24) as u8;

        for y in y1..=y2 {
            let row = (y as usize) * (self.width as usize);
            let mut acc: i64 = 0;
            for x in x1..=(x2 + 1).min(self.width - 1) {
                let idx = row + x as usize;
                acc += self.flux[idx];
                self.flux[idx] = 0;
                if x > x2 {
                    // This trailing column exists only to absorb a px+1
                    // deposit from the rightmost edge crossing; it is never
                    // itself a pixel inside the triangle's column range.
                    continue;
                }
                let cov = self.coverage_alpha(acc);
                if cov == 0 {
                    continue;
                }
                let alpha = (((cov as u32) * (src_alpha as u32 + 1)) >> 8) as u8;
                let dst = &mut self.buffer[idx];
                *dst = blend_pix(*dst, src_opaque, alpha.min(255));
            }
        }
    }

    /// Fold a signed Q16.16 flux accumulator into a `0..=255` coverage
    /// byte, honoring the fill rule. Structurally the same fold as AGG's
    /// `RasterizerScanlineAa::calculate_alpha` (`rasterizer_scanline_aa.rs`),
    /// rescaled from AGG's 8-bit AA_SHIFT to this engine's 16-bit fixed
    /// point.
    #[inline]
    fn coverage_alpha(&self, acc: i64) -> u8 {
        let mut cover = acc.abs();
        if self.filling_rule == FillingRule::EvenOdd {
            cover &= (2 * ONE) - 1;
            if cover > ONE {
                cover = 2 * ONE - cover;
            }
        }
        if cover > ONE {
            cover = ONE;
        }
        ((cover * 255) >> SHIFT) as u8
    }
}
