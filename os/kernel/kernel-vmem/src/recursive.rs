//! # Recursive self-mapping
//!
//! The last directory slot ([`RECURSIVE_SLOT`], index 1023) points at the page
//! directory itself. The MMU then treats the directory as a page table for the
//! top 4 MiB of the address space, which makes every paging structure of the
//! *active* address space reachable through fixed virtual addresses:
//!
//! ```text
//! table_view(i)    = 0xFFC0_0000 | (i << 12)   page table behind directory slot i
//! directory_view() = 0xFFFF_F000               == table_view(1023)
//! ```
//!
//! Reading through a table view whose directory slot is not present faults,
//! so callers check the directory entry first.
//!
//! The window `0xFFC0_0000..=0xFFFF_FFFF` therefore never holds ordinary data
//! and is not available to VM pools.

use crate::addresses::VirtualAddress;
use crate::page_table::pd::DirIndex;

/// Directory slot that maps the directory onto itself.
pub const RECURSIVE_SLOT: DirIndex = DirIndex::new(1023);

/// First address of the recursive window (`1023 << 22`).
pub const WINDOW_BASE: VirtualAddress = RECURSIVE_SLOT.base();

/// Virtual address of the page table referenced by directory slot `dir`.
#[inline]
#[must_use]
pub const fn table_view(dir: DirIndex) -> VirtualAddress {
    VirtualAddress::new(WINDOW_BASE.as_u32() | ((dir.as_usize() as u32) << 12))
}

/// Virtual address of the active page directory.
#[inline]
#[must_use]
pub const fn directory_view() -> VirtualAddress {
    table_view(RECURSIVE_SLOT)
}

/// Whether `va` lies in the recursive window.
#[inline]
#[must_use]
pub const fn in_window(va: VirtualAddress) -> bool {
    DirIndex::from(va).as_usize() == RECURSIVE_SLOT.as_usize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_addresses() {
        assert_eq!(directory_view(), VirtualAddress::new(0xFFFF_F000));
        assert_eq!(table_view(DirIndex::new(0)), VirtualAddress::new(0xFFC0_0000));
        assert_eq!(table_view(DirIndex::new(1)), VirtualAddress::new(0xFFC0_1000));
        assert_eq!(table_view(DirIndex::new(256)), VirtualAddress::new(0xFFD0_0000));
        assert_eq!(WINDOW_BASE, kernel_info::memory::RECURSIVE_WINDOW_BASE);
    }

    #[test]
    fn window_membership() {
        assert!(in_window(VirtualAddress::new(0xFFC0_0000)));
        assert!(in_window(VirtualAddress::new(0xFFFF_FFFF)));
        assert!(!in_window(VirtualAddress::new(0xFFBF_FFFF)));
    }
}
