// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Length-prefixed, mutable byte strings whose storage comes from either the
//! global allocator or a caller-owned arena.
//!
//! [PoolStr] is meant to be embedded by value in larger records (headers,
//! keys) that need explicitly owned, resizable, comparable and hashable
//! string storage without relying on null termination for length. The
//! allocation backend is an [AllocScope] passed to every allocating call;
//! it is never stored on the value, so a whole record full of them can live
//! in one arena and be released in bulk.
//!
//! ```
//! use poolstr::{AllocScope, PoolStr, ScopedArena};
//!
//! # fn main() -> Result<(), poolstr::AllocError> {
//! let arena = ScopedArena::new();
//! let scope = AllocScope::Scoped(&arena);
//!
//! let mut value = PoolStr::new_in(b"hello", scope)?;
//! // SAFETY: same scope the value was created in.
//! unsafe { value.append_in(b"!", scope)? };
//! assert_eq!(b"hello!", value.as_bytes());
//!
//! // No release needed: dropping the arena frees every value in it.
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod hash;
mod pool_str;

pub use pool_str::*;

// Expose the allocation seam for our users.
pub use poolstr_alloc::{AllocError, AllocScope, Allocator, Global, ScopedArena};
