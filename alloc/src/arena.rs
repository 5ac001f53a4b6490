// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::{AllocError, Allocator, Global};
use core::alloc::Layout;
use core::cell::{Cell, RefCell};
use core::ptr::{slice_from_raw_parts_mut, NonNull};

/// [ScopedArena] is an arena allocator: deallocating an individual
/// allocation does nothing, and the whole backing memory is released at once
/// when the arena is dropped. Destructors for objects placed in the arena
/// are not run automatically; if that matters, the caller has to run them.
///
/// Memory is bump-allocated out of chunks requested from the global
/// allocator. When the newest chunk cannot satisfy a request, a new chunk of
/// at least the requested size is opened; previous chunks are considered
/// full from then on, even if they have unused space at the end.
pub struct ScopedArena {
    chunks: RefCell<Vec<Chunk>>,
    /// Bump offset into the newest chunk.
    cursor: Cell<usize>,
    /// Reserved bytes across retired chunks (everything but the newest).
    retired: Cell<usize>,
    /// Size hint for new chunks.
    chunk_size: usize,
}

struct Chunk {
    ptr: NonNull<u8>,
    layout: Layout,
}

// The arena can move to another thread as a whole; it just can't be shared,
// which the missing Sync impl enforces.
unsafe impl Send for ScopedArena {}

impl ScopedArena {
    /// Default chunk size hint, in bytes.
    pub const DEFAULT_CHUNK_SIZE: usize = 4096;

    /// Chunks smaller than this aren't worth their bookkeeping.
    const MIN_CHUNK_SIZE: usize = 64;

    /// Creates an arena with [Self::DEFAULT_CHUNK_SIZE] chunks. Does not
    /// allocate until the first allocation is requested.
    pub const fn new() -> Self {
        Self::with_chunk_size(Self::DEFAULT_CHUNK_SIZE)
    }

    /// Creates an arena whose chunks are roughly `chunk_size_hint` bytes.
    /// The hint is clamped to a minimum; individual allocations larger than
    /// the hint get a dedicated chunk.
    pub const fn with_chunk_size(chunk_size_hint: usize) -> Self {
        Self {
            chunks: RefCell::new(Vec::new()),
            cursor: Cell::new(0),
            retired: Cell::new(0),
            // max is not a const fn, do it manually.
            chunk_size: if chunk_size_hint < Self::MIN_CHUNK_SIZE {
                Self::MIN_CHUNK_SIZE
            } else {
                chunk_size_hint
            },
        }
    }

    /// Get the number of bytes handed out plus the unusable tail of every
    /// retired chunk. Retired chunks count as full: space left at their end
    /// will never be used again.
    pub fn used_bytes(&self) -> usize {
        self.retired.get() + self.cursor.get()
    }

    /// Get the number of bytes requested from the underlying allocator.
    /// This number is greater than or equal to [Self::used_bytes].
    pub fn reserved_bytes(&self) -> usize {
        self.chunks
            .borrow()
            .iter()
            .map(|chunk| chunk.layout.size())
            .sum()
    }

    /// Gets the number of bytes that can be allocated without opening a new
    /// chunk.
    pub fn remaining_capacity(&self) -> usize {
        match self.chunks.borrow().last() {
            Some(top) => top.layout.size() - self.cursor.get(),
            None => 0,
        }
    }

    /// Determine if the given layout fits in the newest chunk.
    pub fn has_capacity_for(&self, layout: Layout) -> bool {
        self.has_capacity_for_locked(&self.chunks.borrow(), layout)
    }

    #[cold]
    #[inline(never)]
    fn open_chunk(&self, chunks: &mut Vec<Chunk>, layout: Layout) -> Result<(), AllocError> {
        let chunk_layout = Layout::from_size_align(
            layout.size().max(self.chunk_size),
            layout.align(),
        )
        .map_err(|_| AllocError)?
        .pad_to_align();

        let allocation = Global.allocate(chunk_layout)?;
        // SAFETY: this is the size/align of the actual allocation, so it
        // must be valid since the object exists.
        let layout = unsafe {
            Layout::from_size_align(allocation.len(), chunk_layout.align()).unwrap_unchecked()
        };

        if let Some(prev) = chunks.last() {
            self.retired.set(self.retired.get() + prev.layout.size());
        }
        chunks.push(Chunk {
            ptr: allocation.cast(),
            layout,
        });
        self.cursor.set(0);
        Ok(())
    }
}

impl Default for ScopedArena {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl Allocator for ScopedArena {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        if layout.size() == 0 {
            return Err(AllocError);
        }
        let layout = layout.pad_to_align();

        let mut chunks = self.chunks.borrow_mut();
        if !self.has_capacity_for_locked(&chunks, layout) {
            self.open_chunk(&mut chunks, layout)?;
        }

        // At this point there is a top chunk with room for the layout.
        // SAFETY: open_chunk pushed one if there wasn't.
        let top = unsafe { chunks.last().unwrap_unchecked() };
        let cursor = self.cursor.get();
        // SAFETY: cursor is within the chunk, or one past its end.
        let align_offset =
            unsafe { top.ptr.as_ptr().add(cursor) }.align_offset(layout.align());
        let needed = align_offset.checked_add(layout.size()).ok_or(AllocError)?;
        debug_assert!(needed <= top.layout.size() - cursor);

        // SAFETY: cursor + needed was just checked to fit in the chunk.
        let thin_ptr = unsafe { top.ptr.as_ptr().add(cursor + align_offset) };
        debug_assert_eq!(0, thin_ptr.align_offset(layout.align()));
        self.cursor.set(cursor + needed);

        let wide_ptr = slice_from_raw_parts_mut(thin_ptr, layout.size());
        // SAFETY: derived from the chunk's allocation pointer, so it is
        // inherently not null.
        Ok(unsafe { NonNull::new_unchecked(wide_ptr) })
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {
        // This is an arena. It does batch de-allocation when dropped.
    }
}

impl ScopedArena {
    // Same check as [Self::has_capacity_for], for use while the chunk list
    // is already borrowed.
    fn has_capacity_for_locked(&self, chunks: &[Chunk], layout: Layout) -> bool {
        let Some(top) = chunks.last() else {
            return false;
        };
        let cursor = self.cursor.get();
        // SAFETY: cursor is within the chunk, or one past its end.
        let align_offset =
            unsafe { top.ptr.as_ptr().add(cursor) }.align_offset(layout.align());
        match align_offset.checked_add(layout.size()) {
            Some(needed) => needed <= top.layout.size() - cursor,
            None => false,
        }
    }
}

impl Drop for ScopedArena {
    fn drop(&mut self) {
        for chunk in self.chunks.get_mut().drain(..) {
            // SAFETY: passing back exactly what Global handed out.
            unsafe { Global.deallocate(chunk.ptr, chunk.layout) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::*;

    #[test]
    fn fuzz() {
        // avoid SUMMARY: libFuzzer: out-of-memory
        const MAX_SIZE: usize = 0x1000000;

        use bolero::generator::TypeGenerator;
        let chunk_hint = 0..=MAX_SIZE;
        let align_bits = 0..=24u32;
        let size = 0..=MAX_SIZE;
        let idx = 0..=MAX_SIZE;
        let val = u8::produce();
        let allocs = Vec::<(usize, u32, usize, u8)>::produce()
            .with()
            .values((size, align_bits, idx, val));
        bolero::check!()
            .with_generator((chunk_hint, allocs))
            .for_each(|(chunk_hint, size_align_vec)| {
                let arena = ScopedArena::with_chunk_size(*chunk_hint);
                for (size, align_bits, idx, val) in size_align_vec {
                    exercise_allocator(&arena, *size, *align_bits, *idx, *val, MAX_SIZE)
                }
            })
    }

    #[test]
    fn test_basics() -> Result<(), AllocError> {
        let arena = ScopedArena::new();
        const WIDTH: usize = 8;
        let layout = Layout::new::<[u8; WIDTH]>();

        let first = arena.allocate(layout)?;
        let second = arena.allocate(layout)?;
        let third = arena.allocate(layout)?;

        assert_ne!(first.as_ptr(), second.as_ptr());
        assert_ne!(first.as_ptr(), third.as_ptr());
        assert_ne!(second.as_ptr(), third.as_ptr());

        assert_eq!(WIDTH, first.len());
        assert_eq!(WIDTH, second.len());
        assert_eq!(WIDTH, third.len());

        let first = first.as_ptr() as *mut u8;
        let second = second.as_ptr() as *mut u8;
        let third = third.as_ptr() as *mut u8;

        unsafe {
            assert_eq!(WIDTH, second.offset_from(first) as usize);
            assert_eq!(WIDTH, third.offset_from(second) as usize);
        }

        // deallocate doesn't return memory to the arena, but it shouldn't
        // panic, as that prevents its use in containers.
        unsafe { arena.deallocate(NonNull::new(first).unwrap(), layout) };

        Ok(())
    }

    #[test]
    fn test_zero_size_fails() {
        let arena = ScopedArena::new();
        arena.allocate(Layout::new::<()>()).unwrap_err();
    }

    #[test]
    fn test_lazy_first_chunk() {
        let arena = ScopedArena::new();
        assert_eq!(0, arena.reserved_bytes());
        assert_eq!(0, arena.used_bytes());
        assert_eq!(0, arena.remaining_capacity());
        assert!(!arena.has_capacity_for(Layout::new::<u8>()));
    }

    #[test]
    fn test_opens_new_chunk_when_full() {
        let arena = ScopedArena::with_chunk_size(ScopedArena::MIN_CHUNK_SIZE);
        let chunk = arena
            .allocate(Layout::array::<u8>(ScopedArena::MIN_CHUNK_SIZE).unwrap())
            .unwrap();
        assert_eq!(0, arena.remaining_capacity());

        // The first chunk is exactly full; this has to open a second one.
        let more = arena.allocate(Layout::new::<u8>()).unwrap();
        assert_ne!(chunk.as_ptr() as *mut u8, more.as_ptr() as *mut u8);
        assert!(arena.reserved_bytes() >= 2 * ScopedArena::MIN_CHUNK_SIZE);

        // The retired chunk counts as full in the accounting.
        assert_eq!(ScopedArena::MIN_CHUNK_SIZE + 1, arena.used_bytes());
    }

    #[test]
    fn test_oversized_allocation_gets_own_chunk() {
        let arena = ScopedArena::with_chunk_size(ScopedArena::MIN_CHUNK_SIZE);
        let size = 16 * ScopedArena::MIN_CHUNK_SIZE;
        let big = arena.allocate(Layout::array::<u8>(size).unwrap()).unwrap();
        assert!(big.len() >= size);
        assert!(arena.reserved_bytes() >= size);
    }

    #[test]
    fn test_alignment() {
        let arena = ScopedArena::new();
        // Allocate smallest to largest so bump offsets get misaligned.
        let a = arena.allocate(Layout::new::<u8>()).unwrap();
        let b = arena.allocate(Layout::new::<u16>()).unwrap();
        let c = arena.allocate(Layout::new::<u32>()).unwrap();
        let d = arena.allocate(Layout::new::<u64>()).unwrap();
        assert!(is_aligned_to(a.as_ptr(), 1));
        assert!(is_aligned_to(b.as_ptr(), 2));
        assert!(is_aligned_to(c.as_ptr(), 4));
        assert!(is_aligned_to(d.as_ptr(), 8));
    }

    #[test]
    fn test_capacity_probe_matches_allocate() {
        let arena = ScopedArena::with_chunk_size(ScopedArena::MIN_CHUNK_SIZE);
        arena.allocate(Layout::new::<u8>()).unwrap();

        let layout = Layout::array::<u8>(arena.remaining_capacity()).unwrap();
        assert!(arena.has_capacity_for(layout));
        arena.allocate(layout).unwrap();
        assert!(!arena.has_capacity_for(Layout::new::<u8>()));
    }
}
