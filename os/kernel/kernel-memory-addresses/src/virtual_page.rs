use crate::{PAGE_OFFSET_MASK, PAGE_SHIFT, PAGE_SIZE, VirtualAddress};
use core::fmt;

/// Virtual memory page.
///
/// A `VirtualPage` represents the **page-aligned base** of a 4 KiB virtual
/// page. Its [`number`](Self::number) is the 20-bit virtual page number that
/// the paging hardware splits into a directory and a table index.
///
/// ### Invariants
/// - The low 12 bits of the base are always zero (page aligned).
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let va = VirtualAddress::new(0x4000_0FFF);
/// let vp = va.page();
/// assert_eq!(vp.base().as_u32(), 0x4000_0000);
/// assert_eq!(vp.number(), 0x40000);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualPage(VirtualAddress);

impl VirtualPage {
    /// The page containing `addr` (rounds down).
    #[inline]
    #[must_use]
    pub const fn containing(addr: VirtualAddress) -> Self {
        Self(VirtualAddress::new(addr.as_u32() & !PAGE_OFFSET_MASK))
    }

    /// Build a page from its virtual page number.
    #[inline]
    #[must_use]
    pub const fn from_number(number: u32) -> Self {
        debug_assert!(number <= u32::MAX >> PAGE_SHIFT);
        Self(VirtualAddress::new(number << PAGE_SHIFT))
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        self.0
    }

    /// Virtual page number (`base >> 12`).
    #[inline]
    #[must_use]
    pub const fn number(self) -> u32 {
        self.0.as_u32() >> PAGE_SHIFT
    }

    /// The following page.
    ///
    /// ### Debug assertions
    /// - Panics in debug builds when called on the last page of the address space.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(VirtualAddress::new(self.0.as_u32() + PAGE_SIZE))
    }

    /// The following page, or `None` past the end of the 4 GiB address space.
    #[inline]
    #[must_use]
    pub const fn checked_next(self) -> Option<Self> {
        match self.0.checked_add(PAGE_SIZE) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }
}

impl fmt::Display for VirtualPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for VirtualPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualPage({:#010X})", self.0.as_u32())
    }
}

impl TryFrom<VirtualAddress> for VirtualPage {
    type Error = VirtualAddress;

    /// Accepts only page-aligned addresses.
    fn try_from(value: VirtualAddress) -> Result<Self, Self::Error> {
        if value.is_page_aligned() {
            Ok(Self(value))
        } else {
            Err(value)
        }
    }
}
