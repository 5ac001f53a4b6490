// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::{AllocError, Allocator, Global};
use core::alloc::Layout;
use core::ptr::NonNull;

/// [AllocScope] selects where the memory behind a value comes from: either
/// the process-wide global allocator, or a caller-owned arena. It is passed
/// by value to every operation that allocates or frees; values never store
/// the scope they were created in.
///
/// Callers are responsible for threading the *same* scope through every call
/// made on behalf of a given allocation. Freeing or growing an allocation
/// under a different scope than the one that produced it is undefined
/// behavior, which is why the freeing/growing operations built on top of
/// this type are `unsafe`.
pub enum AllocScope<'a, A: Allocator = Global> {
    /// Route allocations to the global allocator.
    Default,
    /// Route allocations to a caller-owned arena. The arena may be released
    /// in bulk independently of any individual value allocated within it.
    Scoped(&'a A),
}

// Derived Clone/Copy would bound `A: Clone`/`A: Copy`, but only a shared
// reference is held.
impl<A: Allocator> Clone for AllocScope<'_, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A: Allocator> Copy for AllocScope<'_, A> {}

impl<A: Allocator> Default for AllocScope<'_, A> {
    fn default() -> Self {
        AllocScope::Default
    }
}

unsafe impl<A: Allocator> Allocator for AllocScope<'_, A> {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        match self {
            AllocScope::Default => Global.allocate(layout),
            AllocScope::Scoped(arena) => arena.allocate(layout),
        }
    }

    #[inline]
    fn allocate_zeroed(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        match self {
            AllocScope::Default => Global.allocate_zeroed(layout),
            AllocScope::Scoped(arena) => arena.allocate_zeroed(layout),
        }
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        match self {
            AllocScope::Default => Global.deallocate(ptr, layout),
            AllocScope::Scoped(arena) => arena.deallocate(ptr, layout),
        }
    }

    #[inline]
    unsafe fn grow(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> Result<NonNull<[u8]>, AllocError> {
        match self {
            AllocScope::Default => Global.grow(ptr, old_layout, new_layout),
            AllocScope::Scoped(arena) => arena.grow(ptr, old_layout, new_layout),
        }
    }

    #[inline]
    unsafe fn shrink(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> Result<NonNull<[u8]>, AllocError> {
        match self {
            AllocScope::Default => Global.shrink(ptr, old_layout, new_layout),
            AllocScope::Scoped(arena) => arena.shrink(ptr, old_layout, new_layout),
        }
    }
}
