//! # i386 Page Table (PT)
//!
//! This module models the lower paging level.
//!
//! - [`TableIndex`]: index type for VA bits `[21:12]`.
//! - [`PtEntry`]: a PT entry (PTE). Every present entry maps one 4 KiB frame.
//! - [`PageTable`]: a 4 KiB-aligned array of 1024 PTEs.
//!
//! ## Invariants & Notes
//!
//! - [`PtEntry::make_page`] forces `present=1` and clears bit 7 (PAT).
//! - Raw constructors do not validate consistency; prefer typed helpers.
//! - After modifying active mappings, the caller must perform any required TLB maintenance.

use crate::PageEntryBits;
use crate::addresses::{FrameNumber, VirtualAddress};
use crate::page_table::ENTRIES_PER_TABLE;

/// Index into the Page Table (derived from VA bits `[21:12]`).
///
/// Range is `0..1024` (checked in debug builds).
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct TableIndex(u16);

/// A single Page Table entry (PTE).
#[doc(alias = "PTE")]
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct PtEntry(PageEntryBits);

/// The Page Table: 1024 entries, 4 KiB-aligned.
#[doc(alias = "PT")]
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PtEntry; ENTRIES_PER_TABLE],
}

impl TableIndex {
    /// Build an index from a virtual address (extracts bits `[21:12]`).
    #[inline]
    #[must_use]
    pub const fn from(va: VirtualAddress) -> Self {
        Self::new(((va.as_u32() >> 12) & 0x3FF) as u16)
    }

    /// Construct from a raw `u16`.
    ///
    /// ### Debug assertions
    /// - Asserts `v < 1024` in debug builds.
    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Self {
        debug_assert!((v as usize) < ENTRIES_PER_TABLE);
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl PtEntry {
    /// Create a zero (non-present) entry.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(PageEntryBits::new())
    }

    #[inline]
    #[must_use]
    pub const fn is_present(self) -> bool {
        self.0.present()
    }

    /// Expose the underlying bitfield for advanced inspection/masking.
    #[inline]
    #[must_use]
    pub const fn flags(self) -> PageEntryBits {
        self.0
    }

    /// If present, return the mapped frame and its flags.
    #[inline]
    #[must_use]
    pub const fn page(self) -> Option<(FrameNumber, PageEntryBits)> {
        if !self.is_present() {
            return None;
        }
        Some((self.0.frame_number(), self.0))
    }

    /// Create a leaf PTE mapping `frame`.
    ///
    /// Sets `present=1` and clears bit 7.
    #[inline]
    #[must_use]
    pub const fn make_page(frame: FrameNumber, mut flags: PageEntryBits) -> Self {
        flags.set_large_page(false);
        flags.set_present(true);
        flags.set_frame_number(frame);
        Self(flags)
    }

    /// Create a not-present PTE carrying `flags` as a marker.
    #[inline]
    #[must_use]
    pub const fn absent(flags: PageEntryBits) -> Self {
        Self(flags.with_present(false))
    }

    /// The same entry with only the present bit cleared.
    ///
    /// Frame number and remaining flags are kept as they were.
    #[inline]
    #[must_use]
    pub const fn cleared(self) -> Self {
        Self(self.0.with_present(false))
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0.into_bits()
    }

    /// Construct from a raw 32-bit value. No validation is performed.
    #[inline]
    #[must_use]
    pub const fn from_raw(v: u32) -> Self {
        Self(PageEntryBits::from_bits(v))
    }
}

impl PageTable {
    /// Create a fully zeroed Page Table (all entries non-present).
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [PtEntry::zero(); ENTRIES_PER_TABLE],
        }
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, i: TableIndex) -> PtEntry {
        self.entries[i.as_usize()]
    }

    /// Write the entry at `i`.
    ///
    /// Caller is responsible for necessary TLB invalidations if this affects an
    /// active address space.
    #[inline]
    pub const fn set(&mut self, i: TableIndex, e: PtEntry) {
        self.entries[i.as_usize()] = e;
    }

    /// Overwrite every entry with `e`.
    #[inline]
    pub fn fill(&mut self, e: PtEntry) {
        self.entries.fill(e);
    }

    /// Derive the PT index from a virtual address.
    #[inline]
    #[must_use]
    pub const fn index_of(va: VirtualAddress) -> TableIndex {
        TableIndex::from(va)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TableIndex, PtEntry)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (TableIndex::new(i as u16), *e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_page_sets_present() {
        let e = PtEntry::make_page(FrameNumber::new(0x400), PageEntryBits::kernel_rw());
        assert!(e.is_present());
        let (frame, flags) = e.page().unwrap();
        assert_eq!(frame, FrameNumber::new(0x400));
        assert!(flags.writable());
        assert!(!flags.user_access());
    }

    #[test]
    fn cleared_keeps_frame_and_flags() {
        let e = PtEntry::make_page(FrameNumber::new(0x401), PageEntryBits::kernel_rw());
        let c = e.cleared();
        assert!(!c.is_present());
        assert_eq!(c.page(), None);
        assert_eq!(c.raw(), 0x0040_1002);
    }

    #[test]
    fn fill_with_user_marker() {
        let mut pt = PageTable::zeroed();
        pt.fill(PtEntry::absent(PageEntryBits::absent_user()));
        assert!(pt.iter().all(|(_, e)| e.raw() == 0b100));
        assert_eq!(
            PageTable::index_of(VirtualAddress::new(0x2000_3000)),
            TableIndex::new(3)
        );
    }
}
