//! # i386 Page Directory (PD)
//!
//! This module models the upper paging level.
//!
//! - [`DirIndex`]: index type for VA bits `[31:22]`.
//! - [`PdEntry`]: a PD entry (PDE). Entries written here always point to a
//!   page table; 4 MiB pages are never created (`PS=0`).
//! - [`PageDirectory`]: a 4 KiB-aligned array of 1024 PDEs.
//!
//! ## Invariants & Notes
//!
//! - The slot at [`RECURSIVE_SLOT`](crate::recursive::RECURSIVE_SLOT) may point
//!   back at the directory itself; see [`recursive`](crate::recursive).
//! - After modifying active mappings, the caller must perform any required TLB maintenance.

use crate::PageEntryBits;
use crate::addresses::{FrameNumber, VirtualAddress};
use crate::page_table::ENTRIES_PER_TABLE;

/// Index into the Page Directory (derived from VA bits `[31:22]`).
///
/// Range is `0..1024` (checked in debug builds).
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct DirIndex(u16);

/// A single Page Directory entry (PDE).
#[doc(alias = "PDE")]
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct PdEntry(PageEntryBits);

/// The Page Directory: 1024 entries, 4 KiB-aligned.
#[doc(alias = "PD")]
#[repr(C, align(4096))]
pub struct PageDirectory {
    entries: [PdEntry; ENTRIES_PER_TABLE],
}

impl DirIndex {
    /// Build an index from a virtual address (extracts bits `[31:22]`).
    #[inline]
    #[must_use]
    pub const fn from(va: VirtualAddress) -> Self {
        Self::new((va.as_u32() >> 22) as u16)
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

    /// First virtual address covered by this directory slot.
    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        VirtualAddress::new((self.0 as u32) << 22)
    }
}

impl PdEntry {
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

    /// Expose the underlying bitfield.
    #[inline]
    #[must_use]
    pub const fn flags(self) -> PageEntryBits {
        self.0
    }

    /// If present, return the frame of the referenced page table.
    #[inline]
    #[must_use]
    pub const fn table(self) -> Option<FrameNumber> {
        if !self.is_present() {
            return None;
        }
        Some(self.0.frame_number())
    }

    /// Create a PDE referencing the page table in `table`.
    ///
    /// Sets `present=1` and forces `PS=0`.
    #[inline]
    #[must_use]
    pub const fn make_table(table: FrameNumber, mut flags: PageEntryBits) -> Self {
        flags.set_large_page(false);
        flags.set_present(true);
        flags.set_frame_number(table);
        Self(flags)
    }

    /// Create a not-present PDE carrying `flags` as a marker.
    #[inline]
    #[must_use]
    pub const fn absent(flags: PageEntryBits) -> Self {
        Self(flags.with_present(false))
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

impl PageDirectory {
    /// Create a fully zeroed Page Directory (all entries non-present).
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [PdEntry::zero(); ENTRIES_PER_TABLE],
        }
    }

    /// Read the entry at `i`.
    #[inline]
    #[must_use]
    pub const fn get(&self, i: DirIndex) -> PdEntry {
        self.entries[i.as_usize()]
    }

    /// Write the entry at `i`.
    ///
    /// Caller is responsible for necessary TLB invalidations if this affects an
    /// active address space.
    #[inline]
    pub const fn set(&mut self, i: DirIndex, e: PdEntry) {
        self.entries[i.as_usize()] = e;
    }

    /// Overwrite every entry with `e`.
    #[inline]
    pub fn fill(&mut self, e: PdEntry) {
        self.entries.fill(e);
    }

    /// Derive the PD index from a virtual address.
    #[inline]
    #[must_use]
    pub const fn index_of(va: VirtualAddress) -> DirIndex {
        DirIndex::from(va)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DirIndex, PdEntry)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (DirIndex::new(i as u16), *e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_table_forces_present_and_small_pages() {
        let e = PdEntry::make_table(
            FrameNumber::new(0x1234),
            PageEntryBits::kernel_rw().with_large_page(true),
        );
        assert!(e.is_present());
        assert!(!e.flags().large_page());
        assert_eq!(e.table(), Some(FrameNumber::new(0x1234)));
        assert_eq!(e.raw(), 0x0123_4003);
    }

    #[test]
    fn absent_keeps_marker_bits() {
        let e = PdEntry::absent(PageEntryBits::absent_rw());
        assert!(!e.is_present());
        assert_eq!(e.table(), None);
        assert_eq!(e.raw(), 0b010);
    }

    #[test]
    fn directory_get_set() {
        let mut pd = PageDirectory::zeroed();
        let i = PageDirectory::index_of(VirtualAddress::new(0x4000_0000));
        assert_eq!(i, DirIndex::new(256));
        assert!(!pd.get(i).is_present());
        pd.set(i, PdEntry::make_table(FrameNumber::new(7), PageEntryBits::kernel_rw()));
        assert_eq!(pd.get(i).table(), Some(FrameNumber::new(7)));
        assert_eq!(pd.iter().filter(|(_, e)| e.is_present()).count(), 1);
    }
}
