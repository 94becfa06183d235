//! EFAA — Scanline Edge-Flag Antialiasing.
//!
//! Samples 8 sub-scanlines per pixel row at the "8-rooks" pattern (one
//! sample per sub-row, each at a distinct column offset within the pixel, so
//! no two samples share either a row or a column — the same decorrelation
//! idea as AGG's `rasterizer_scanline_aa` cell coverage, but fixed at 8
//! samples instead of a continuous area/cover pair). Edges are kept in an
//! arena (`Vec<EfaaEdge>`) and linked by index rather than by `Box` pointer,
//! mirroring AGG's `rasterizer_cells_aa` cell-pool approach of avoiding
//! per-edge heap churn.
//!
//! Unlike [`crate::ddfi::Ddfi`], this engine walks the polygon's edges
//! directly rather than fan-triangulating first, so it handles concave and
//! self-intersecting polygons exactly under the non-zero winding rule.
//!
//! Every edge this engine will ever process is inserted before the scanline
//! loop begins (`draw_polygon` has the whole polygon up front), so an edge
//! is freed exactly once and never reused mid-render; the free list the
//! design calls for to dodge allocation churn across *many* polygons isn't
//! reachable within a single `draw_polygon` call. Instead, this
//! implementation carries the edge arena, edge table, and sub-scanline mask
//! as engine-owned buffers: allocated once in `new` and reused — cleared,
//! not reallocated — by every subsequent call.

use crate::basics::{iceil, ifloor};
use crate::color::{self, blend_pix};
use crate::geometry::{self, Point};

const SHIFT: u32 = 16;
const ONE: i64 = 1 << SHIFT;

#[inline]
fn to_fixed(v: f64) -> i64 {
    (v * ONE as f64).round() as i64
}

/// Fractional x-offset (Q16.16, within one pixel) of each of the 8
/// sub-scanline samples, laid out so that no two sub-scanlines share a
/// column: `(2p+1)/16` for a permutation `p` of `0..8`.
const ROOKS8_X_FIXED: [i64; 8] = [36864, 4096, 53248, 20480, 61440, 28672, 12288, 45056];

const fn build_popcount_alpha() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut m = 0usize;
    while m < 256 {
        let bits = (m as u8).count_ones();
        table[m] = ((bits * 255 + 4) / 8) as u8;
        m += 1;
    }
    table
}

/// Maps an 8-bit "which sub-scanlines are covered" mask to a `0..=255`
/// coverage alpha (`popcount(mask) / 8 * 255`, rounded).
const POPCOUNT_ALPHA: [u8; 256] = build_popcount_alpha();

/// One polygon edge, arena-allocated and linked by index. The same `next`
/// field threads the edge table's per-row lists and the active-edge list;
/// an edge is only ever a member of one of the two at a time.
struct EfaaEdge {
    /// Current sub-scanline's x, Q16.16.
    x: i64,
    /// Per-sub-scanline dx, Q16.16.
    slope: i64,
    winding: i32,
    /// Global sub-scanline index (`y * 8 + s`) of the next sample to take.
    cur_g: i32,
    /// Last global sub-scanline index this edge contributes to, inclusive.
    last_g: i32,
    next: Option<u32>,
}

/// Edge-Flag Antialiasing rasterizer.
pub struct Efaa {
    width: i32,
    height: i32,
    buffer: Vec<u32>,
    /// Per-row head of the edge table, one `height`-sized allocation reused
    /// (and fully reset to `None`) by every `draw_polygon` call.
    edge_table: Vec<Option<u32>>,
    /// Edge arena backing both the edge table and the active-edge list;
    /// cleared (not reallocated) at the start of each call.
    arena: Vec<EfaaEdge>,
    /// Sub-scanline winding mask, `width * 8` entries, allocated once at
    /// construction and cleared lazily by dirty-range tracking that
    /// carries across `draw_polygon` calls (see `dirty`).
    mask: Vec<i32>,
    /// `[min_x, max_x]` columns left dirty in `mask` by the last scanline
    /// rendered (in this call or a previous one); cleared just before the
    /// next scanline that would read stale data from that range.
    dirty: Option<(i32, i32)>,
}

impl Efaa {
    pub fn new(width: i32, height: i32) -> Self {
        assert!(width > 0 && height > 0, "Efaa dimensions must be positive");
        let n = (width as usize) * (height as usize);
        Self {
            width,
            height,
            buffer: vec![0xFF00_0000; n],
            edge_table: vec![None; height as usize],
            arena: Vec::new(),
            mask: vec![0i32; (width as usize) * 8],
            dirty: None,
        }
    }

    pub fn clear(&mut self, argb: u32) {
        self.buffer.fill(argb);
    }

    pub fn buffer(&self) -> &[u32] {
        &self.buffer
    }

    /// Rasterize a closed polygon (any vertex count `>= 3`, concave or
    /// self-intersecting, non-zero winding fill) with source-over blending.
    pub fn draw_polygon(&mut self, vertices: &[f64], color: u32) {
        if !geometry::is_valid_polygon(vertices) {
            return;
        }
        let bbox = geometry::bounding_box(vertices);
        if geometry::bbox_entirely_outside(&bbox, self.width, self.height) {
            return;
        }
        let y1 = ifloor(bbox.y1).max(0);
        let y2 = (iceil(bbox.y2) - 1).min(self.height - 1);
        if y1 > y2 {
            return;
        }

        let points = geometry::unpack_points(vertices);
        let n = points.len();
        self.edge_table.fill(None);
        self.arena.clear();
        for i in 0..n {
            let (a, b) = (points[i], points[(i + 1) % n]);
            Self::insert_edge(&mut self.arena, &mut self.edge_table, a, b, self.height);
        }

        let mut ael_head: Option<u32> = None;
        let mut prev_dirty: Option<(i32, i32)> = self.dirty.take();

        for y in y1..=y2 {
            if let Some((dmin, dmax)) = prev_dirty {
                let lo = (dmin.max(0) as usize) * 8;
                let hi = ((dmax + 1).min(self.width) as usize) * 8;
                for v in &mut self.mask[lo..hi] {
                    *v = 0;
                }
            }

            let row = y as usize;
            if let Some(head) = self.edge_table[row].take() {
                let mut tail = head;
                while let Some(n) = self.arena[tail as usize].next {
                    tail = n;
                }
                self.arena[tail as usize].next = ael_head;
                ael_head = Some(head);
            }

            let row_end_g = (y + 1) * 8 - 1;
            let mut row_min_x: Option<i32> = None;
            let mut row_max_x: Option<i32> = None;
            let mut cur = ael_head;
            let mut prev: Option<u32> = None;
            while let Some(i) = cur {
                let idx = i as usize;
                while self.arena[idx].cur_g <= self.arena[idx].last_g && self.arena[idx].cur_g <= row_end_g {
                    let s = (self.arena[idx].cur_g - y * 8) as usize;
                    let ix = ((self.arena[idx].x + ROOKS8_X_FIXED[s]) >> SHIFT) as i32;
                    let col = if ix < 0 {
                        Some(0)
                    } else if ix < self.width {
                        Some(ix)
                    } else {
                        None
                    };
                    if let Some(col) = col {
                        self.mask[(col as usize) * 8 + s] += self.arena[idx].winding;
                        row_min_x = Some(row_min_x.map_or(col, |m| m.min(col)));
                        row_max_x = Some(row_max_x.map_or(col, |m| m.max(col)));
                    }
                    self.arena[idx].x += self.arena[idx].slope;
                    self.arena[idx].cur_g += 1;
                }
                let next = self.arena[idx].next;
                if self.arena[idx].cur_g > self.arena[idx].last_g {
                    match prev {
                        Some(p) => self.arena[p as usize].next = next,
                        None => ael_head = next,
                    }
                } else {
                    prev = Some(i);
                }
                cur = next;
            }

            prev_dirty = row_min_x.map(|start| {
                let max_x = row_max_x.unwrap();
                let mut acc = [0i32; 8];
                let mut last_x = start;
                let row_off = (y as usize) * (self.width as usize);
                for x in start..self.width {
                    let base = (x as usize) * 8;
                    let mut bits: u8 = 0;
                    for s in 0..8 {
                        acc[s] += self.mask[base + s];
                        if acc[s] != 0 {
                            bits |= 1 << s;
                        }
                    }
                    last_x = x;
                    if bits != 0 {
                        let cov_alpha = POPCOUNT_ALPHA[bits as usize];
                        let dst = &mut self.buffer[row_off + x as usize];
                        *dst = blend_pix(*dst, color, cov_alpha);
                    }
                    if x >= max_x && bits == 0 {
                        break;
                    }
                }
                (start, last_x)
            });
        }
        self.dirty = prev_dirty;
    }

    /// Insert one polygon edge's sub-scanline crossings into `edge_table`,
    /// keyed by the integer scanline containing its first active
    /// sub-scanline.
    fn insert_edge(
        arena: &mut Vec<EfaaEdge>,
        edge_table: &mut [Option<u32>],
        a: Point,
        b: Point,
        height: i32,
    ) {
        if a.y == b.y {
            return;
        }
        let winding: i32 = if b.y > a.y { 1 } else { -1 };
        let (top, bot) = if a.y < b.y { (a, b) } else { (b, a) };

        let fy0 = top.y * 8.0 - 0.5;
        let fy1 = bot.y * 8.0 - 0.5;
        let first_g_raw = fy0.ceil() as i32;
        let last_g_raw = fy1.ceil() as i32 - 1;
        if first_g_raw > last_g_raw {
            return;
        }
        let max_g = height * 8 - 1;
        let first_g = first_g_raw.max(0);
        let last_g = last_g_raw.min(max_g);
        if first_g > last_g {
            return;
        }

        let dy = bot.y - top.y;
        let slope = (bot.x - top.x) / (dy * 8.0);
        let slope_fixed = to_fixed(slope);

        let y_center_raw = (first_g_raw as f64 + 0.5) / 8.0;
        let x_at_raw = top.x + (bot.x - top.x) / dy * (y_center_raw - top.y);
        let mut x_fixed = to_fixed(x_at_raw);
        if first_g > first_g_raw {
            x_fixed += slope_fixed * (first_g - first_g_raw) as i64;
        }

        let row = (first_g >> 3) as usize;
        let idx = arena.len() as u32;
        arena.push(EfaaEdge {
            x: x_fixed,
            slope: slope_fixed,
            winding,
            cur_g: first_g,
            last_g,
            next: edge_table[row],
        });
        edge_table[row] = Some(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_idempotent() {
        let mut r = Efaa::new(8, 8);
        r.clear(0xFF102030);
        let a = r.buffer().to_vec();
        r.clear(0xFF102030);
        assert_eq!(a, r.buffer());
    }

    #[test]
    fn test_empty_polygon_is_noop() {
        let mut r = Efaa::new(8, 8);
        r.clear(0xFF000000);
        let before = r.buffer().to_vec();
        r.draw_polygon(&[0.0, 0.0, 1.0, 1.0], 0xFFFFFFFF);
        assert_eq!(before, r.buffer());
    }

    #[test]
    fn test_offscreen_polygon_is_noop() {
        let mut r = Efaa::new(8, 8);
        r.clear(0xFF000000);
        let before = r.buffer().to_vec();
        r.draw_polygon(&[100.0, 100.0, 110.0, 100.0, 105.0, 110.0], 0xFFFFFFFF);
        assert_eq!(before, r.buffer());
    }

    #[test]
    fn test_full_frame_rectangle_single_polygon() {
        let mut r = Efaa::new(8, 8);
        r.clear(0xFF000000);
        r.draw_polygon(&[0.0, 0.0, 8.0, 0.0, 8.0, 8.0, 0.0, 8.0], 0xFFFF00FF);
        for &p in r.buffer() {
            assert_eq!(p, 0xFFFF00FF);
        }
    }

    #[test]
    fn test_solid_triangle_centroid_and_corner() {
        let mut r = Efaa::new(8, 8);
        r.clear(0xFF000000);
        r.draw_polygon(&[1.0, 1.0, 7.0, 1.0, 4.0, 7.0], 0xFFFFFFFF);
        let idx = |x: i32, y: i32| (y * 8 + x) as usize;
        assert_eq!(r.buffer()[idx(4, 4)], 0xFFFFFFFF);
        assert_eq!(r.buffer()[idx(0, 0)], 0xFF000000);
    }

    #[test]
    fn test_half_alpha_blend_interior() {
        let mut r = Efaa::new(8, 8);
        r.clear(0xFF000000);
        r.draw_polygon(&[0.0, 0.0, 8.0, 0.0, 8.0, 8.0, 0.0, 8.0], 0x80FFFFFF);
        let c = color::Rgba8::from_argb_u32(r.buffer()[4 * 8 + 4]);
        assert!((c.r as i32 - 128).abs() <= 2);
        assert!((c.g as i32 - 128).abs() <= 2);
        assert!((c.b as i32 - 128).abs() <= 2);
    }

    #[test]
    fn test_concave_l_shape_notch_is_empty() {
        // An L-shape: a 6x6 square with a 3x3 notch bitten out of its
        // top-right corner. The notch must stay background, everywhere
        // else inside the L must be filled.
        let mut r = Efaa::new(8, 8);
        r.clear(0xFF000000);
        #[rustfmt::skip]
        let verts = [
            1.0, 1.0,  7.0, 1.0,  7.0, 4.0,
            4.0, 4.0,  4.0, 7.0,  1.0, 7.0,
        ];
        r.draw_polygon(&verts, 0xFFFFFFFF);
        let idx = |x: i32, y: i32| (y * 8 + x) as usize;
        assert_eq!(r.buffer()[idx(5, 5)], 0xFF000000); // inside the notch
        assert_eq!(r.buffer()[idx(2, 2)], 0xFFFFFFFF); // inside the L's body
        assert_eq!(r.buffer()[idx(2, 5)], 0xFFFFFFFF); // inside the L's foot
    }

    #[test]
    fn test_draw_twice_opaque_is_idempotent() {
        let mut r = Efaa::new(8, 8);
        r.clear(0xFF000000);
        let verts = [1.0, 1.0, 7.0, 1.0, 4.0, 7.0];
        r.draw_polygon(&verts, 0xFFFFFFFF);
        let once = r.buffer().to_vec();
        r.draw_polygon(&verts, 0xFFFFFFFF);
        assert_eq!(once, r.buffer());
    }

    #[test]
    fn test_mirror_symmetry_within_quantization_floor() {
        // Unlike DDFI/HSGR/SCDT's analytic per-column coverage, EFAA's
        // 8-rooks pattern assigns one fixed x-offset per sub-scanline row,
        // and that per-row offset is the same at every column (rows aren't
        // mirrored, only columns are) — so a diagonal edge can cross a
        // sub-row's sample point on one side of the mirror axis without
        // crossing the *mirror-complementary* offset on the other, unlike
        // an engine that computes an exact coverage fraction. The floor for
        // this engine is therefore one popcount step (255/8, ~32 levels),
        // not the generic 2-level floor an analytic engine achieves.
        const EFAA_MIRROR_TOLERANCE: i32 = 32;

        let mut left = Efaa::new(8, 8);
        left.clear(0xFF000000);
        left.draw_polygon(&[1.0, 1.0, 5.0, 1.0, 2.0, 7.0], 0xFFFFFFFF);

        let mut right = Efaa::new(8, 8);
        right.clear(0xFF000000);
        // Mirror about column width/2 = 4: x' = 8 - x.
        right.draw_polygon(&[7.0, 1.0, 3.0, 1.0, 6.0, 7.0], 0xFFFFFFFF);

        for y in 0..8 {
            for x in 0..8 {
                let l = color::Rgba8::from_argb_u32(left.buffer()[y * 8 + x]);
                let r_px = color::Rgba8::from_argb_u32(right.buffer()[y * 8 + (7 - x)]);
                assert!((l.r as i32 - r_px.r as i32).abs() <= EFAA_MIRROR_TOLERANCE);
            }
        }
    }
}
