//! Pipeline stages for photo analysis.
//!
//! Each submodule implements exactly one transformation step, so each is
//! independently testable and swappable (a different render surface, a
//! different inference backend) without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! load ──▶ normalize ──▶ request ──▶ inference ──▶ classify
//! (decode)  (≤1024px JPEG) (data URI)  (VLM)        (taxonomy)
//! ```
//!
//! 1. [`load`]      — check mime and size, decode in `spawn_blocking`
//! 2. [`normalize`] — bound the longest edge, re-encode at quality 0.7;
//!    falls back to the original bytes rather than failing
//! 3. [`request`]   — validate the data-URI grammar before any network I/O
//! 4. [`inference`] — the typed VLM seam and its `edgequake-llm` adapter;
//!    the only stage with network I/O
//! 5. [`classify`]  — map provider failures onto [`crate::error::ErrorKind`]

pub mod classify;
pub mod inference;
pub mod load;
pub mod normalize;
pub mod request;
