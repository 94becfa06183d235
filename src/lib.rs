//! # rasterlab
//!
//! A laboratory of independent CPU polygon rasterizer engines, each
//! converting flat polygon vertex data plus an ARGB color into a pixel
//! buffer via a distinct antialiasing technique:
//!
//! - [`ddfi::Ddfi`] — Discrete Differential Flux Integration: Green's
//!   theorem edge-flux deltas, prefix-summed per scanline.
//! - [`efaa::Efaa`] — Edge-Flag Antialiasing: an 8-rooks subpixel sampling
//!   pattern driven by a scanline edge table and active-edge list.
//! - [`hsgr::Hsgr`] — Hilbert-Space Guided Rasterization: per-triangle edge
//!   functions walked in Hilbert-curve order within coarse tiles.
//! - [`scdt::Scdt`] — Spectral Coverage Decomposition with Ternary
//!   encoding: a 27-entry balanced-ternary LUT driving per-subpixel RGB
//!   coverage.
//! - [`ssaa::Ssaa`] — rotated-grid supersampling (RGSS), the
//!   reference-quality engine the other four are compared against.
//!
//! Every engine shares one contract (`new`, `clear`, `draw_polygon`,
//! `buffer`); see each module for its own algorithm notes. The engines are
//! independent: build several over the same dimensions to compare their
//! antialiasing quality on identical input.
//!
//! Out of scope, by design: curve flattening,
//! stroking, gradients, text, arbitrary-path clipping, caller-side
//! transforms, multithreading, GPU acceleration, and PNG/file I/O.

pub mod basics;
pub mod color;
pub mod geometry;

pub mod ddfi;
pub mod efaa;
pub mod hsgr;
pub mod scdt;
pub mod ssaa;
