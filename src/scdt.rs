//! SCDT — Spectral Coverage Decomposition with Ternary encoding.
//!
//! A per-integer-scanline active-edge-list rasterizer, much like
//! [`crate::efaa::Efaa`]'s scanline loop but without EFAA's 8-sample
//! sub-scanline stratification: instead of stratifying *rows*, SCDT
//! stratifies *columns* at LCD-subpixel granularity, driven by a
//! precomputed 27-entry balanced-ternary lookup table that maps a boundary
//! edge's fractional x-position to independent R/G/B coverage bytes (the
//! same "precompute a small LUT, index it per-pixel" shape AGG's gamma
//! tables use in `src/gamma.rs`, just keyed on trits instead of a gamma
//! curve).
//!
//! Edge records are a distinct concrete type from EFAA's and HSGR's:
//! each engine's edge shape is genuinely different, and unifying them
//! behind a polymorphic interface would cost more in the inner loop than
//! it saves.

use crate::basics::iceil;
use crate::geometry::{self, Point};

const SHIFT: u32 = 8;
const ONE: i32 = 1 << SHIFT;

#[inline]
fn to_fixed(v: f64) -> i32 {
    (v * ONE as f64).round() as i32
}

/// Size of the ternary LUT: 27 ternary-digit triples x 3 RGB coverage bytes.
const LUT_LEN: usize = 81;

/// Build the 27-entry x 3-byte balanced-ternary coverage LUT.
///
/// For each triple `(t0, t1, t2)` of balanced trits (`{-1, 0, 1}`), the
/// implied boundary fraction is `f = t0/3 + t1/9 + t2/27 + 0.5`; each RGB
/// subpixel sampled at `{-1/6, 0, +1/6}` around the pixel center gets a
/// trapezoidal coverage value of ramp-width `1/3` centered on `f`.
fn build_ternary_lut() -> [u8; LUT_LEN] {
    let mut lut = [0u8; LUT_LEN];
    const SUBPIXEL_OFFSETS: [f64; 3] = [-1.0 / 6.0, 0.0, 1.0 / 6.0];
    const RAMP_HALF_WIDTH: f64 = 1.0 / 6.0;

    for t0 in -1i32..=1 {
        for t1 in -1i32..=1 {
            for t2 in -1i32..=1 {
                let f = t0 as f64 / 3.0 + t1 as f64 / 9.0 + t2 as f64 / 27.0 + 0.5;
                let index = (((t0 + 1) * 9 + (t1 + 1) * 3 + (t2 + 1)) * 3) as usize;
                for (ch, &off) in SUBPIXEL_OFFSETS.iter().enumerate() {
                    let sample = 0.5 + off;
                    // Trapezoidal ramp: 0 below f-w, 1 above f+w, linear
                    // between. `f` is the position of the covered/uncovered
                    // boundary; coverage here is "how much of this subpixel
                    // lies left of the boundary" (interior is to the left).
                    let lo = f - RAMP_HALF_WIDTH;
                    let hi = f + RAMP_HALF_WIDTH;
                    let cov = if sample <= lo {
                        1.0
                    } else if sample >= hi {
                        0.0
                    } else {
                        (hi - sample) / (2.0 * RAMP_HALF_WIDTH)
                    };
                    lut[index + ch] = crate::color::coverage_to_u8(cov);
                }
            }
        }
    }
    lut
}

/// Map a `[0,1)` fractional x (as a double) to a ternary LUT index
/// (`0, 3, 6, .. 78`), i.e. the base index of that fraction's 3-byte entry.
/// Public alongside [`Scdt::ternary_lut`] as the double-precision sibling
/// of the Q8.8 conversion the scanline loop itself uses internally.
#[inline]
pub fn fraction_to_ternary_base(frac: f64) -> usize {
    let idx = (frac * 27.0).floor() as i32;
    (idx.clamp(0, 26) as usize) * 3
}

/// Map a Q8.8 fractional x to a ternary LUT index, same convention.
#[inline]
fn ternary_index_q8(frac_q8: i32) -> usize {
    let idx = (frac_q8 * 27) >> SHIFT;
    (idx.clamp(0, 26) as usize) * 3
}

struct ScdtEdge {
    x: i32,
    slope: i32,
    y_first: i32,
    y_last: i32,
    winding: i32,
}

/// Spectral Coverage Decomposition with Ternary encoding rasterizer.
pub struct Scdt {
    width: i32,
    height: i32,
    buffer: Vec<u32>,
    ternary_lut: [u8; LUT_LEN],
    /// width*height*3 bytes, one per RGB subpixel; resolved to ARGB on
    /// export but not persisted between `draw_polygon` calls — each call's
    /// scanline loop writes directly into the pixel buffer except at
    /// boundary columns, which it stages here before resolving so adjacent
    /// partial-coverage columns on the same scanline don't clobber each
    /// other's channel-independent blends.
    subpixel: Vec<[u8; 3]>,
    edges: Vec<ScdtEdge>,
    ael_idx: Vec<usize>,
}

impl Scdt {
    pub fn new(width: i32, height: i32) -> Self {
        assert!(width > 0 && height > 0, "Scdt dimensions must be positive");
        let n = (width as usize) * (height as usize);
        Self {
            width,
            height,
            buffer: vec![0xFF00_0000; n],
            ternary_lut: build_ternary_lut(),
            subpixel: Vec::new(),
            edges: Vec::new(),
            ael_idx: Vec::new(),
        }
    }

    pub fn clear(&mut self, argb: u32) {
        self.buffer.fill(argb);
    }

    pub fn buffer(&self) -> &[u32] {
        &self.buffer
    }

    /// The 81-byte (27 entries x 3 channels) balanced-ternary coverage
    /// lookup table, exposed for inspection/testing.
    pub fn ternary_lut(&self) -> &[u8; LUT_LEN] {
        &self.ternary_lut
    }

    pub fn draw_polygon(&mut self, vertices: &[f64], color: u32) {
        if !geometry::is_valid_polygon(vertices) {
            return;
        }
        let bbox = geometry::bounding_box(vertices);
        if geometry::bbox_entirely_outside(&bbox, self.width, self.height) {
            return;
        }
        let y0 = (bbox.y1.floor() as i32).max(0);
        let y1 = (iceil(bbox.y2) - 1).min(self.height - 1);
        if y0 > y1 {
            return;
        }

        let points = geometry::unpack_points(vertices);
        let n = points.len();

        self.edges.clear();
        for i in 0..n {
            self.insert_edge(points[i], points[(i + 1) % n]);
        }
        if self.edges.is_empty() {
            return;
        }

        let row_w = self.width as usize;
        self.subpixel.clear();
        self.subpixel.resize(row_w, [0u8; 3]);

        self.ael_idx.clear();
        // Edges are appended to `self.edges` in polygon-edge order, which
        // is not y-sorted; scan all of them each scanline for activation
        // (polygon edge counts in this crate's scope are small enough that
        // a linear scan beats maintaining a separate y-sorted index).

        for y in y0..=y1 {
            self.ael_idx.retain(|&i| self.edges[i].y_last >= y);
            for (i, e) in self.edges.iter().enumerate() {
                if e.y_first == y && !self.ael_idx.contains(&i) {
                    self.ael_idx.push(i);
                }
            }

            self.ael_idx.sort_by_key(|&i| self.edges[i].x);

            self.render_scanline(y, color);

            for &i in &self.ael_idx {
                self.edges[i].x += self.edges[i].slope;
            }
        }
    }

    fn insert_edge(&mut self, a: Point, b: Point) {
        if a.y == b.y {
            return;
        }
        let winding: i32 = if b.y > a.y { 1 } else { -1 };
        let (top, bot) = if a.y < b.y { (a, b) } else { (b, a) };

        let y_first = (top.y.ceil() as i32).max(0);
        let y_last = ((bot.y.ceil() as i32) - 1).min(self.height - 1);
        if y_first > y_last {
            return;
        }

        let dy = bot.y - top.y;
        let slope = (bot.x - top.x) / dy;
        if !slope.is_finite() {
            return;
        }
        let slope_fixed = to_fixed(slope);
        let x_at_first = top.x + slope * (y_first as f64 - top.y);
        let x_fixed = to_fixed(x_at_first);

        self.edges.push(ScdtEdge {
            x: x_fixed,
            slope: slope_fixed,
            y_first,
            y_last,
            winding,
        });
    }

    /// Walk the active edge list left to right for scanline `y`: fill
    /// interior columns solid where winding != 0, and resolve RGB subpixel
    /// coverage at each edge's boundary column.
    fn render_scanline(&mut self, y: i32, color: u32) {
        for px in self.subpixel.iter_mut() {
            *px = [0; 3];
        }
        let mut touched_min = self.width;
        let mut touched_max = -1i32;

        let mut winding = 0i32;
        for k in 0..self.ael_idx.len() {
            let idx = self.ael_idx[k];
            let x_fixed = self.edges[idx].x;
            let edge_winding = self.edges[idx].winding;
            let x_col = x_fixed >> SHIFT;
            let frac_q8 = x_fixed & (ONE - 1);

            let was_outside = winding == 0;
            winding += edge_winding;
            let now_outside = winding == 0;
            // Opening edge (outside->inside) biases the fractional index
            // down by one trit step; closing (inside->outside) biases up.
            // A heuristic, not derived from first principles.
            let biased_q8 = if was_outside && !now_outside {
                (frac_q8 - (ONE / 27)).max(0)
            } else if !was_outside && now_outside {
                (frac_q8 + (ONE / 27)).min(ONE - 1)
            } else {
                frac_q8
            };

            if x_col >= 0 && x_col < self.width {
                let lut_base = ternary_index_q8(biased_q8);
                let cov = [
                    self.ternary_lut[lut_base],
                    self.ternary_lut[lut_base + 1],
                    self.ternary_lut[lut_base + 2],
                ];
                let slot = &mut self.subpixel[x_col as usize];
                for ch in 0..3 {
                    slot[ch] = slot[ch].saturating_add(cov[ch]);
                }
                touched_min = touched_min.min(x_col);
                touched_max = touched_max.max(x_col);
            }

            if winding != 0 && k + 1 < self.ael_idx.len() {
                let next_x = self.edges[self.ael_idx[k + 1]].x >> SHIFT;
                let fill_from = (x_col + 1).max(0);
                let fill_to = next_x.min(self.width);
                if fill_from < fill_to {
                    touched_min = touched_min.min(fill_from);
                    touched_max = touched_max.max(fill_to - 1);
                    let row = (y as usize) * (self.width as usize);
                    let src_opaque = (color & 0x00FF_FFFF) | 0xFF00_0000;
                    let src_alpha = (color >> 24) as u8;
                    for x in fill_from..fill_to {
                        let dst = &mut self.buffer[row + x as usize];
                        *dst = crate::color::blend_pix(*dst, src_opaque, src_alpha);
                    }
                }
            }
        }

        if touched_max < touched_min {
            return;
        }
        let row = (y as usize) * (self.width as usize);
        let src_rgb = [
            ((color >> 16) & 0xFF) as u8,
            ((color >> 8) & 0xFF) as u8,
            (color & 0xFF) as u8,
        ];
        let src_alpha = (color >> 24) as u8;
        for x in touched_min..=touched_max {
            let cov = self.subpixel[x as usize];
            if cov == [0, 0, 0] {
                continue;
            }
            let dst = &mut self.buffer[row + x as usize];
            let dst_c = crate::color::Rgba8::from_argb_u32(*dst);
            let blend_ch = |d: u8, s: u8, c: u8| -> u8 {
                if c == 0 {
                    return d;
                }
                let alpha = if c == 255 {
                    src_alpha
                } else {
                    crate::color::Rgba8::multiply(src_alpha, c)
                };
                crate::color::Rgba8::lerp(d, s, alpha)
            };
            let out = crate::color::Rgba8 {
                r: blend_ch(dst_c.r, src_rgb[0], cov[0]),
                g: blend_ch(dst_c.g, src_rgb[1], cov[1]),
                b: blend_ch(dst_c.b, src_rgb[2], cov[2]),
                a: 255,
            };
            *dst = out.to_argb_u32();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color;

    #[test]
    fn test_clear_idempotent() {
        let mut r = Scdt::new(8, 8);
        r.clear(0xFF102030);
        let a = r.buffer().to_vec();
        r.clear(0xFF102030);
        assert_eq!(a, r.buffer());
    }

    #[test]
    fn test_empty_polygon_is_noop() {
        let mut r = Scdt::new(8, 8);
        r.clear(0xFF000000);
        let before = r.buffer().to_vec();
        r.draw_polygon(&[0.0, 0.0, 1.0, 1.0], 0xFFFFFFFF);
        assert_eq!(before, r.buffer());
    }

    #[test]
    fn test_offscreen_polygon_is_noop() {
        let mut r = Scdt::new(8, 8);
        r.clear(0xFF000000);
        let before = r.buffer().to_vec();
        r.draw_polygon(&[100.0, 100.0, 110.0, 100.0, 105.0, 110.0], 0xFFFFFFFF);
        assert_eq!(before, r.buffer());
    }

    #[test]
    fn test_degenerate_collinear_triangle_is_noop() {
        let mut r = Scdt::new(8, 8);
        r.clear(0xFF000000);
        let before = r.buffer().to_vec();
        r.draw_polygon(&[0.0, 0.0, 4.0, 0.0, 8.0, 0.0], 0xFFFFFFFF);
        assert_eq!(before, r.buffer());
    }

    #[test]
    fn test_full_frame_rectangle_via_two_triangles() {
        let mut r = Scdt::new(8, 8);
        r.clear(0xFF000000);
        r.draw_polygon(&[0.0, 0.0, 8.0, 0.0, 8.0, 8.0], 0xFFFF0000);
        r.draw_polygon(&[0.0, 0.0, 8.0, 8.0, 0.0, 8.0], 0xFFFF0000);
        for &p in r.buffer() {
            assert_eq!(p, 0xFFFF0000);
        }
    }

    #[test]
    fn test_solid_triangle_centroid_and_corner() {
        let mut r = Scdt::new(8, 8);
        r.clear(0xFF000000);
        r.draw_polygon(&[1.0, 1.0, 7.0, 1.0, 4.0, 7.0], 0xFFFFFFFF);
        let idx = |x: i32, y: i32| (y * 8 + x) as usize;
        assert_eq!(r.buffer()[idx(4, 4)], 0xFFFFFFFF);
        assert_eq!(r.buffer()[idx(0, 0)], 0xFF000000);
    }

    #[test]
    fn test_axis_aligned_rect_full_alpha_interior() {
        let mut r = Scdt::new(8, 8);
        r.clear(0xFF000000);
        r.draw_polygon(&[0.0, 0.0, 8.0, 0.0, 8.0, 8.0, 0.0, 8.0], 0xFFFF00FF);
        for &p in r.buffer() {
            assert_eq!(p, 0xFFFF00FF);
        }
    }

    #[test]
    fn test_half_alpha_blend_interior() {
        let mut r = Scdt::new(8, 8);
        r.clear(0xFF000000);
        r.draw_polygon(&[0.0, 0.0, 8.0, 0.0, 8.0, 8.0, 0.0, 8.0], 0x80FFFFFF);
        let c = color::Rgba8::from_argb_u32(r.buffer()[4 * 8 + 4]);
        assert!((c.r as i32 - 128).abs() <= 2);
        assert!((c.g as i32 - 128).abs() <= 2);
        assert!((c.b as i32 - 128).abs() <= 2);
    }

    #[test]
    fn test_ternary_lut_size_is_81_bytes() {
        let r = Scdt::new(4, 4);
        assert_eq!(r.ternary_lut().len(), 81);
    }

    #[test]
    fn test_ternary_lut_center_entry_is_half_coverage() {
        // t0=t1=t2=0 -> f = 0.5, the pixel-center boundary: every channel's
        // coverage should land near the midpoint of the ramp.
        let r = Scdt::new(4, 4);
        let lut = r.ternary_lut();
        let base = fraction_to_ternary_base(0.5);
        for ch in 0..3 {
            let v = lut[base + ch] as i32;
            assert!((v - 128).abs() <= 10, "channel {ch} = {v}");
        }
    }

    #[test]
    fn test_ternary_lut_monotonic_in_fraction() {
        // As the boundary fraction increases (edge moves right), the
        // green-channel (offset 0, no horizontal bias) coverage should be
        // monotonically non-increasing (less of the subpixel is covered).
        let r = Scdt::new(4, 4);
        let lut = r.ternary_lut();
        let mut prev = 255i32;
        for t in 0..27 {
            let base = t * 3;
            let v = lut[base + 1] as i32; // green channel, zero bias
            assert!(v <= prev + 1, "coverage increased at trit {t}");
            prev = v;
        }
    }

    #[test]
    fn test_mirror_symmetry_within_quantization_floor() {
        // SCDT's boundary coverage comes from the ternary LUT indexed by
        // an edge's own fractional x position, not a fixed point-sampling
        // grid; the opening/closing bias swaps roles under reflection
        // (an opening edge becomes a closing edge and vice versa), so
        // mirroring the polygon about column width/2 should still
        // reproduce a column-mirrored buffer within the 2-gray-level
        // floor.
        let mut left = Scdt::new(8, 8);
        left.clear(0xFF000000);
        left.draw_polygon(&[1.0, 1.0, 5.0, 1.0, 2.0, 7.0], 0xFFFFFFFF);

        let mut right = Scdt::new(8, 8);
        right.clear(0xFF000000);
        // Mirror about column width/2 = 4: x' = 8 - x.
        right.draw_polygon(&[7.0, 1.0, 3.0, 1.0, 6.0, 7.0], 0xFFFFFFFF);

        for y in 0..8 {
            for x in 0..8 {
                let l = color::Rgba8::from_argb_u32(left.buffer()[y * 8 + x]);
                let r_px = color::Rgba8::from_argb_u32(right.buffer()[y * 8 + (7 - x)]);
                assert!((l.r as i32 - r_px.r as i32).abs() <= 2);
            }
        }
    }

    #[test]
    fn test_two_overlapping_opaque_triangles_second_wins() {
        let mut r = Scdt::new(8, 8);
        r.clear(0xFF000000);
        r.draw_polygon(&[1.0, 1.0, 7.0, 1.0, 4.0, 7.0], 0xFFFF0000);
        r.draw_polygon(&[1.0, 1.0, 7.0, 1.0, 4.0, 7.0], 0xFF00FF00);
        let idx = |x: i32, y: i32| (y * 8 + x) as usize;
        assert_eq!(r.buffer()[idx(4, 4)], 0xFF00FF00);
    }
}
