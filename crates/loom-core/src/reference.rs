//! # Reference Numbers
//!
//! Human-readable order and transaction numbers.
//!
//! ## Format
//! ```text
//! ORD-20261019143005123-9f3a07c2
//! ─┬─ ────────┬──────── ───┬────
//!  │          │            └── 32 random bits (UUID v4)
//!  │          └── UTC timestamp, millisecond resolution
//!  └── ORD (storefront order) / POS (counter transaction)
//! ```
//!
//! Fixed width, so string order equals creation order. The random suffix
//! makes same-millisecond collisions negligible; the UNIQUE index and a
//! retry in loom-db cover the remainder.

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Order,
    PosTransaction,
}

impl ReferenceKind {
    pub const fn prefix(&self) -> &'static str {
        match self {
            ReferenceKind::Order => "ORD",
            ReferenceKind::PosTransaction => "POS",
        }
    }
}

/// Formats a reference from a timestamp and 32 bits of entropy.
pub fn format_reference(kind: ReferenceKind, at: DateTime<Utc>, entropy: u32) -> String {
    format!(
        "{}-{}-{:08x}",
        kind.prefix(),
        at.format("%Y%m%d%H%M%S%3f"),
        entropy
    )
}

/// Generates a fresh reference for now.
pub fn generate_reference(kind: ReferenceKind) -> String {
    let entropy = (Uuid::new_v4().as_u128() & u32::MAX as u128) as u32;
    format_reference(kind, Utc::now(), entropy)
}
