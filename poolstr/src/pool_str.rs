// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use core::alloc::Layout;
use core::cmp::Ordering;
use core::ptr::{self, NonNull};
use core::{fmt, slice};
use poolstr_alloc::{AllocError, AllocScope, Allocator};
use std::borrow::Borrow;
use std::hash;

/// A length-prefixed, mutable byte string. The buffer is owned exclusively
/// by the value; creating one always copies the input bytes, so the source
/// is never aliased.
///
/// The allocation scope is deliberately *not* stored. Every operation that
/// allocates, grows or frees takes an [AllocScope], and the caller has to
/// pass the same scope for the lifetime of a given value; see the `# Safety`
/// sections. In exchange, the value is pointer-plus-two-words small and an
/// arena full of them can be dropped in bulk without walking the values.
///
/// The buffer always holds one zero byte past `len` as an interop
/// convenience. It is not authoritative: content may contain embedded zeros,
/// and `len` is the only source of truth for the value's length.
pub struct PoolStr {
    data: Option<NonNull<u8>>,
    len: usize,
    /// Byte capacity of the live buffer; 0 when blank. Always >= len + 1
    /// when `data` is present.
    cap: usize,
}

#[inline]
fn buf_layout(size: usize) -> Result<Layout, AllocError> {
    Layout::array::<u8>(size).map_err(|_| AllocError)
}

/// Duplicate `bytes` into a fresh `len + 1` buffer from `scope`, with a
/// trailing zero. Returns the buffer and its actual capacity, which may
/// exceed the request if the allocator over-allocates.
fn dup_bytes<A: Allocator>(
    bytes: &[u8],
    scope: AllocScope<'_, A>,
) -> Result<(NonNull<u8>, usize), AllocError> {
    let total = bytes.len().checked_add(1).ok_or(AllocError)?;
    let allocation = scope.allocate(buf_layout(total)?)?;
    let cap = allocation.len();
    let data = allocation.cast::<u8>();
    // SAFETY: the allocation is fresh and at least bytes.len() + 1 wide, so
    // the copy fits and cannot overlap the source.
    unsafe {
        ptr::copy_nonoverlapping(bytes.as_ptr(), data.as_ptr(), bytes.len());
        data.as_ptr().add(bytes.len()).write(0);
    }
    Ok((data, cap))
}

impl PoolStr {
    /// Creates a blank value: no buffer, length 0. Does not allocate.
    #[inline]
    #[must_use]
    pub const fn blank() -> Self {
        Self {
            data: None,
            len: 0,
            cap: 0,
        }
    }

    /// Creates a value holding a copy of `bytes`, allocated from `scope`.
    ///
    /// An empty slice still allocates: the result is non-blank with length
    /// 0, which keeps "created from bytes" distinguishable from
    /// [PoolStr::blank].
    ///
    /// # Errors
    /// Returns [AllocError] if the scope cannot satisfy the allocation; in
    /// that case nothing was allocated.
    pub fn new_in<A: Allocator>(bytes: &[u8], scope: AllocScope<'_, A>) -> Result<Self, AllocError> {
        let (data, cap) = dup_bytes(bytes, scope)?;
        Ok(Self {
            data: Some(data),
            len: bytes.len(),
            cap,
        })
    }

    /// Creates a standalone heap value: the record itself is also allocated
    /// from `scope`. Pair with [PoolStr::delete_in]; values embedded in
    /// other structures by value should use [PoolStr::new_in] instead.
    ///
    /// # Errors
    /// Returns [AllocError] if either allocation fails. The record does not
    /// leak if the buffer allocation fails.
    pub fn boxed_in<A: Allocator>(
        bytes: &[u8],
        scope: AllocScope<'_, A>,
    ) -> Result<NonNull<PoolStr>, AllocError> {
        let record_layout = Layout::new::<PoolStr>();
        let record = scope.allocate(record_layout)?.cast::<PoolStr>();
        let value = match PoolStr::new_in(bytes, scope) {
            Ok(value) => value,
            Err(err) => {
                // SAFETY: allocated just above from the same scope.
                unsafe { scope.deallocate(record.cast(), record_layout) };
                return Err(err);
            }
        };
        // SAFETY: fresh, properly aligned storage for a PoolStr.
        unsafe { record.write(value) };
        Ok(record)
    }

    /// Releases the buffer and the record of a standalone value created by
    /// [PoolStr::boxed_in].
    ///
    /// # Safety
    /// `this` must come from [PoolStr::boxed_in], must not be used again,
    /// and `scope` must be the scope every allocating call on it used.
    pub unsafe fn delete_in<A: Allocator>(this: NonNull<PoolStr>, scope: AllocScope<'_, A>) {
        // SAFETY: `this` is live per the caller's contract.
        unsafe {
            (*this.as_ptr()).release_in(scope);
            scope.deallocate(this.cast(), Layout::new::<PoolStr>());
        }
    }

    /// Replaces the content with a copy of `bytes` and returns the new
    /// length. The old buffer, if any, is freed first.
    ///
    /// # Errors
    /// Returns [AllocError] if duplicating `bytes` fails. The old buffer has
    /// already been freed at that point, so the value is left *blank*, never
    /// dangling.
    ///
    /// # Safety
    /// `scope` must be the same scope every previous allocating call on this
    /// value used.
    pub unsafe fn set_in<A: Allocator>(
        &mut self,
        bytes: &[u8],
        scope: AllocScope<'_, A>,
    ) -> Result<usize, AllocError> {
        // SAFETY: forwarding the caller's scope contract.
        unsafe { self.release_in(scope) };
        let (data, cap) = dup_bytes(bytes, scope)?;
        self.data = Some(data);
        self.len = bytes.len();
        self.cap = cap;
        Ok(bytes.len())
    }

    /// Appends a copy of `bytes` to the content. All-or-nothing: the copy
    /// happens only after a successful grow, so on error the value is
    /// byte-for-byte unchanged.
    ///
    /// # Errors
    /// Returns [AllocError] if the buffer cannot be grown; the value keeps
    /// its previous buffer and length.
    ///
    /// # Safety
    /// `scope` must be the same scope every previous allocating call on this
    /// value used.
    pub unsafe fn append_in<A: Allocator>(
        &mut self,
        bytes: &[u8],
        scope: AllocScope<'_, A>,
    ) -> Result<(), AllocError> {
        let needed = self
            .len
            .checked_add(bytes.len())
            .and_then(|n| n.checked_add(1))
            .ok_or(AllocError)?;
        if needed > self.cap {
            // SAFETY: forwarding the caller's scope contract.
            unsafe { self.grow_buf(needed, scope)? };
        }

        // SAFETY: cap >= len + bytes.len() + 1 now, which implies data is
        // present (cap > 0).
        let data = unsafe { self.data.unwrap_unchecked() };
        // SAFETY: the copy lands in the buffer's spare capacity, which a
        // shared input slice cannot alias.
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), data.as_ptr().add(self.len), bytes.len());
            data.as_ptr().add(self.len + bytes.len()).write(0);
        }
        self.len += bytes.len();
        Ok(())
    }

    /// Replaces the content with a copy of `src`'s content, like
    /// [PoolStr::set_in]. A blank `src` leaves `self` blank.
    ///
    /// # Errors
    /// See [PoolStr::set_in].
    ///
    /// # Safety
    /// `scope` must be the same scope every previous allocating call on
    /// `self` used. (`src` only needs to be readable; its own scope is not
    /// involved.)
    pub unsafe fn copy_from_in<A: Allocator>(
        &mut self,
        src: &PoolStr,
        scope: AllocScope<'_, A>,
    ) -> Result<usize, AllocError> {
        // SAFETY: forwarding the caller's scope contract.
        unsafe {
            if src.is_blank() {
                self.release_in(scope);
                Ok(0)
            } else {
                self.set_in(src.as_bytes(), scope)
            }
        }
    }

    /// Frees the buffer, if any, and resets the value to blank. Idempotent:
    /// releasing an already-blank value is a no-op. The record itself is
    /// untouched; standalone records go through [PoolStr::delete_in].
    ///
    /// # Safety
    /// `scope` must be the same scope every previous allocating call on this
    /// value used.
    pub unsafe fn release_in<A: Allocator>(&mut self, scope: AllocScope<'_, A>) {
        if let Some(data) = self.data.take() {
            // SAFETY: cap is the exact capacity of the live allocation, and
            // the layout a byte buffer was allocated with is always valid.
            unsafe {
                let layout = Layout::array::<u8>(self.cap).unwrap_unchecked();
                scope.deallocate(data, layout);
            }
        }
        self.len = 0;
        self.cap = 0;
    }

    /// Reallocates the buffer to exactly `new_size` bytes without touching
    /// the length, preserving content up to `min(old, new)` bytes. Escape
    /// hatch for callers that fill the buffer directly and manage the length
    /// through [PoolStr::set_len].
    ///
    /// # Errors
    /// Returns [AllocError] for `new_size == 0` or if the reallocation
    /// fails; the buffer is left unchanged.
    ///
    /// # Safety
    /// `scope` must be the same scope every previous allocating call on this
    /// value used. Shrinking below `len() + 1` breaks the value's capacity
    /// invariant; the caller must restore it with [PoolStr::set_len] before
    /// using any other operation.
    pub unsafe fn prealloc_in<A: Allocator>(
        &mut self,
        new_size: usize,
        scope: AllocScope<'_, A>,
    ) -> Result<NonNull<u8>, AllocError> {
        if new_size == 0 {
            return Err(AllocError);
        }
        let new_layout = buf_layout(new_size)?;
        let allocation = match self.data {
            None => scope.allocate(new_layout)?,
            Some(data) => {
                // SAFETY: cap is the exact capacity of the live allocation.
                let old_layout = unsafe { Layout::array::<u8>(self.cap).unwrap_unchecked() };
                match new_size.cmp(&self.cap) {
                    // SAFETY: old layout fits the allocation; the size
                    // ordering matches grow's/shrink's contract.
                    Ordering::Greater => unsafe { scope.grow(data, old_layout, new_layout)? },
                    Ordering::Less => unsafe { scope.shrink(data, old_layout, new_layout)? },
                    Ordering::Equal => return Ok(data),
                }
            }
        };
        self.cap = allocation.len();
        let data = allocation.cast::<u8>();
        self.data = Some(data);
        Ok(data)
    }

    /// Sets the length directly. Companion to [PoolStr::prealloc_in].
    ///
    /// # Safety
    /// `len + 1` must not exceed the current capacity, and the first `len`
    /// bytes of the buffer must be initialized. Note this does not write the
    /// trailing zero byte.
    pub unsafe fn set_len(&mut self, len: usize) {
        debug_assert!(self.data.is_some() || len == 0);
        debug_assert!(self.data.is_none() || len < self.cap);
        self.len = len;
    }

    /// The number of meaningful bytes. Excludes the trailing zero byte.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the length is 0. A blank value is empty, but an
    /// empty value is not necessarily blank.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` if the value has no buffer at all.
    #[inline]
    #[must_use]
    pub const fn is_blank(&self) -> bool {
        self.data.is_none()
    }

    /// Byte capacity of the live buffer; 0 for a blank value.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.cap
    }

    /// The content as a slice. Empty for a blank value.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self.data {
            None => &[],
            // SAFETY: a live buffer has at least len + 1 bytes and the first
            // len of them are initialized content.
            Some(data) => unsafe { slice::from_raw_parts(data.as_ptr(), self.len) },
        }
    }

    /// The content plus the trailing zero byte, or `None` for a blank value.
    /// Only meaningful for interop with zero-terminated consumers, and only
    /// when the content has no embedded zeros.
    #[must_use]
    pub fn as_bytes_with_nul(&self) -> Option<&[u8]> {
        // SAFETY: a live buffer has len + 1 initialized bytes, the last one
        // being the zero terminator.
        self.data
            .map(|data| unsafe { slice::from_raw_parts(data.as_ptr(), self.len + 1) })
    }

    /// Raw handle to the buffer, if any.
    #[inline]
    #[must_use]
    pub const fn as_ptr(&self) -> Option<NonNull<u8>> {
        self.data
    }

    /// Byte-wise comparison of the first `self.len()` bytes, like a raw
    /// memory compare. For a meaningful total order the two values must have
    /// equal lengths; with unequal lengths only `self.len()` bytes are
    /// inspected (a shorter `other` that is a prefix orders `Less` via its
    /// trailing zero). Compare lengths first if a length-aware ordering is
    /// needed.
    #[must_use]
    pub fn cmp_exact(&self, other: &PoolStr) -> Ordering {
        cmp_window(self.as_bytes(), other.as_bytes(), |b| b)
    }

    /// [PoolStr::cmp_exact] with each byte folded to ASCII uppercase.
    #[must_use]
    pub fn cmp_ignore_case(&self, other: &PoolStr) -> Ordering {
        cmp_window(self.as_bytes(), other.as_bytes(), |b| b.to_ascii_uppercase())
    }

    #[cold]
    #[inline(never)]
    unsafe fn grow_buf<A: Allocator>(
        &mut self,
        needed: usize,
        scope: AllocScope<'_, A>,
    ) -> Result<(), AllocError> {
        let new_layout = buf_layout(needed)?;
        let allocation = match self.data {
            None => scope.allocate(new_layout)?,
            Some(data) => {
                // SAFETY: cap is the exact capacity of the live allocation,
                // and callers only grow (needed > cap).
                unsafe {
                    let old_layout = Layout::array::<u8>(self.cap).unwrap_unchecked();
                    scope.grow(data, old_layout, new_layout)?
                }
            }
        };
        // Use the full capacity returned by the allocator.
        self.cap = allocation.len();
        self.data = Some(allocation.cast::<u8>());
        Ok(())
    }
}

/// Orders `lhs` against `rhs` over at most `lhs.len()` byte positions,
/// treating each side as its content followed by a virtual zero byte. This
/// is the safe rendition of `memcmp(lhs, rhs, lhs_len)`: it never reads past
/// a shorter `rhs`.
fn cmp_window(lhs: &[u8], rhs: &[u8], fold: impl Fn(u8) -> u8) -> Ordering {
    let window = lhs.len().min(rhs.len());
    for i in 0..window {
        match fold(lhs[i]).cmp(&fold(rhs[i])) {
            Ordering::Equal => (),
            ord => return ord,
        }
    }
    if rhs.len() >= lhs.len() {
        Ordering::Equal
    } else {
        // rhs ended inside the window: its virtual trailing zero loses to
        // lhs's next content byte.
        Ordering::Greater
    }
}

impl Default for PoolStr {
    fn default() -> Self {
        Self::blank()
    }
}

impl fmt::Debug for PoolStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_blank() {
            f.write_str("PoolStr(blank)")
        } else {
            write!(f, "PoolStr({:?})", String::from_utf8_lossy(self.as_bytes()))
        }
    }
}

// Content equality; a blank value and a non-blank empty value compare equal.
impl PartialEq for PoolStr {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for PoolStr {}

impl hash::Hash for PoolStr {
    #[inline]
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl AsRef<[u8]> for PoolStr {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl Borrow<[u8]> for PoolStr {
    fn borrow(&self) -> &[u8] {
        self.as_bytes()
    }
}
