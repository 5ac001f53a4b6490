// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helpers shared by the allocator tests.

use crate::Allocator;
use core::alloc::Layout;

/// https://doc.rust-lang.org/beta/std/primitive.pointer.html#method.is_aligned_to
/// Convenience until the std lib stabilizes this; test code doesn't need the
/// power-of-two bit tricks the stdlib version does.
pub(crate) fn is_aligned_to<T: ?Sized>(p: *const T, align: usize) -> bool {
    (p as *const u8 as usize) % align == 0
}

/// One step of an allocator fuzz run: allocate, check alignment, write and
/// read back a byte at a random index, deallocate. Requests the fuzzer
/// produces that no allocator could honor (bogus layouts, giant paddings)
/// are skipped.
pub(crate) fn exercise_allocator<A: Allocator>(
    allocator: &A,
    size: usize,
    align_bits: u32,
    idx: usize,
    val: u8,
    max_size: usize,
) {
    let idx = if size > 0 { idx % size } else { 0 };
    let align = 1usize << align_bits;
    let Ok(layout) = Layout::from_size_align(size, align) else {
        return;
    };

    if layout.pad_to_align().size() > max_size {
        return;
    }

    if let Ok(mut ptr) = allocator.allocate(layout) {
        assert!(is_aligned_to(ptr.as_ptr(), align));
        let obj = unsafe { ptr.as_mut() };
        // The allocation is guaranteed to be at least size, but can be larger.
        assert!(obj.len() >= size);

        obj[idx] = val;
        assert_eq!(obj[idx], val);

        unsafe { allocator.deallocate(ptr.cast(), layout) };
    }
}

#[cfg(test)]
mod tests {
    use super::is_aligned_to;

    #[test]
    fn test_is_aligned_to() {
        assert!(is_aligned_to(8 as *const u8, 1));
        assert!(is_aligned_to(8 as *const u8, 2));
        assert!(is_aligned_to(8 as *const u8, 4));
        assert!(is_aligned_to(8 as *const u8, 8));
        assert!(!is_aligned_to(12 as *const u8, 8));
        assert!(!is_aligned_to(7 as *const u8, 2));
    }
}
