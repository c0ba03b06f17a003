//! # Memory Page Table
//!
//! Two-level i386 (non-PAE) translation structures.
//!
//! ```text
//! | 31‒22 | 21‒12 | 11‒0   |
//! |  PD   |  PT   | Offset |
//! ```
//!
//! Both levels hold 1024 entries of 4 bytes and fill exactly one frame.

pub mod pd;
pub mod pt;

use crate::addresses::VirtualAddress;
use crate::page_table::pd::DirIndex;
use crate::page_table::pt::TableIndex;

/// Number of entries in a page directory or page table.
pub const ENTRIES_PER_TABLE: usize = 1024;

/// Bytes of address space covered by one page directory entry (4 MiB).
pub const BYTES_PER_TABLE: u32 = 1 << 22;

#[inline]
#[must_use]
pub const fn split_indices(va: VirtualAddress) -> (DirIndex, TableIndex) {
    (DirIndex::from(va), TableIndex::from(va))
}
