//! Power-of-two-choices (P2C) load balancer.
//!
//! ## Contents
//! - [`P2c`] node membership, selection and load bookkeeping
//! - [`KeyHasher`], [`Crc32`], [`Fnv1a32`] candidate hash families
//!
//! ```text
//! get(key) ─► key empty? ──yes──► two random indices
//!                │no
//!                ▼
//!        h1(key) % n, h2(key) % n
//!                │
//!                ▼
//!     lower load wins (tie → first) ─► load += 1 ─► addr
//! ```

mod hash;
mod p2c;

pub use hash::{Crc32, Fnv1a32, KeyHasher};
pub use p2c::P2c;
