//! Register access primitives shared by every register block in [`crate::pac`].

use core::ops::Deref;
use core::ptr::NonNull;

pub use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};

/// A pointer to a register block that lives for the whole program.
///
/// Register blocks sit at fixed addresses, so a `StaticRef` is just a
/// non-null pointer that dereferences to the block. It is `Copy` so that
/// drivers sharing a block (GPIO pins on the same port) can each hold one.
#[derive(Debug)]
pub struct StaticRef<T> {
    ptr: NonNull<T>,
}

impl<T> StaticRef<T> {
    /// # Safety
    ///
    /// `ptr` must be non-null, aligned, and point to memory that stays valid
    /// for the rest of the program (a peripheral's MMIO window).
    pub const unsafe fn new(ptr: *const T) -> StaticRef<T> {
        StaticRef {
            ptr: NonNull::new_unchecked(ptr as *mut T),
        }
    }

    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }
}

impl<T> Clone for StaticRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StaticRef<T> {}

impl<T> Deref for StaticRef<T> {
    type Target = T;
    fn deref(&self) -> &T {
        // Safety: the constructor's contract guarantees a valid 'static block.
        unsafe { self.ptr.as_ref() }
    }
}

// Register handles move between the main context and interrupt handlers.
unsafe impl<T> Send for StaticRef<T> {}

/// Orders a multi-register sequence: every write issued before the barrier
/// completes before any access after it.
#[inline(always)]
pub fn barrier() {
    #[cfg(target_arch = "arm")]
    cortex_m::asm::dsb();
    #[cfg(not(target_arch = "arm"))]
    core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
}

/// Polls `ready` at most `limit` times. Returns whether it became true.
#[inline]
pub(crate) fn spin_until(limit: u32, mut ready: impl FnMut() -> bool) -> bool {
    for _ in 0..limit {
        if ready() {
            return true;
        }
        core::hint::spin_loop();
    }
    false
}
