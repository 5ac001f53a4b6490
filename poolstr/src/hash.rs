// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Hash families for [PoolStr] keys.
//!
//! Two independent families, selected by the caller through [HashFamily] or
//! called directly. Both are deterministic pure functions of the content
//! bytes and length only, never of the buffer's address or of which
//! allocator produced it. Both are non-cryptographic hash-table hashes,
//! unsuitable for security or deduplication purposes.

use crate::PoolStr;
use twox_hash::XxHash32;

/// Which hash family to apply to a value. The choice is caller policy (speed
/// and distribution trade-offs), not a property of the value type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HashFamily {
    /// `h = h * 31 + byte`, order-sensitive and collision-prone by design
    /// for speed.
    Polynomial,
    /// [HashFamily::Polynomial] with bytes folded to ASCII uppercase, so
    /// values equal under [PoolStr::cmp_ignore_case] hash equal.
    PolynomialIgnoreCase,
    /// xxHash32 with seed 0. No case-insensitive variant is defined for
    /// this family.
    Stream,
}

impl HashFamily {
    /// Hashes the value's content with the selected family. The 32-bit
    /// stream family is zero-extended.
    #[must_use]
    pub fn hash_of(self, value: &PoolStr) -> u64 {
        match self {
            HashFamily::Polynomial => polynomial(value.as_bytes()),
            HashFamily::PolynomialIgnoreCase => polynomial_ignore_case(value.as_bytes()),
            HashFamily::Stream => u64::from(stream32(value.as_bytes())),
        }
    }
}

/// The classic multiply-by-31 polynomial hash, wrapping on overflow.
#[must_use]
pub fn polynomial(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0u64, |h, &b| h.wrapping_mul(31).wrapping_add(u64::from(b)))
}

/// [polynomial] over the ASCII-uppercase folding of the content.
#[must_use]
pub fn polynomial_ignore_case(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |h, &b| {
        h.wrapping_mul(31).wrapping_add(u64::from(b.to_ascii_uppercase()))
    })
}

/// xxHash32 of the content, seeded with 0.
#[must_use]
pub fn stream32(bytes: &[u8]) -> u32 {
    XxHash32::oneshot(0, bytes)
}
