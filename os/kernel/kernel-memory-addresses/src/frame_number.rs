use crate::{PAGE_SHIFT, PhysicalAddress};
use core::fmt;
use core::ops::Add;

/// Physical frame number.
///
/// A `FrameNumber` is the index of a 4 KiB physical frame, i.e. the physical
/// base address shifted right by 12. This is the unit frame pools hand out
/// and the quantity stored in the upper 20 bits of a paging entry.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let f = FrameNumber::new(512);
/// assert_eq!(f.base().as_u32(), 0x0020_0000);
/// assert_eq!(f + 1, FrameNumber::new(513));
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FrameNumber(u32);

impl FrameNumber {
    /// Largest frame number addressable with 32-bit physical addresses.
    pub const MAX: Self = Self(u32::MAX >> PAGE_SHIFT);

    #[inline]
    #[must_use]
    pub const fn new(n: u32) -> Self {
        debug_assert!(n <= u32::MAX >> PAGE_SHIFT);
        Self(n)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Physical base address of the frame.
    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress::new(self.0 << PAGE_SHIFT)
    }
}

impl fmt::Debug for FrameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({:#X})", self.0)
    }
}

impl fmt::Display for FrameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl Add<u32> for FrameNumber {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u32) -> Self::Output {
        Self::new(self.0 + rhs)
    }
}
