//! # Address Space (i386, page-directory rooted)
//!
//! An [`AddressSpace`] is one page directory plus everything reachable from it.
//! The handle only stores the directory frame; all work goes through the
//! shared [`Paging`] context.
//!
//! ## Layout of a fresh address space
//!
//! - Directory slot 0 references a page table that identity-maps the shared
//!   region (`shared_size` bytes from address 0), present/writable/privileged.
//! - In [`PagingMode::Recursive`], slot 1023 references the directory itself.
//! - Every other slot is not present (and carries the writable marker).
//!
//! ## Safety
//!
//! - Mutating active mappings requires TLB maintenance; [`AddressSpace::free_page`]
//!   reloads CR3 after clearing an entry.

use crate::addresses::{FrameNumber, PhysicalAddress, VirtualAddress, VirtualPage};
use crate::frame_pool::FramePool;
use crate::mmu::Mmu;
use crate::page_table::pd::{DirIndex, PageDirectory, PdEntry};
use crate::page_table::pt::{PageTable, PtEntry, TableIndex};
use crate::page_table::split_indices;
use crate::paging::{Paging, PagingError, PagingMode};
use crate::recursive::RECURSIVE_SLOT;
use crate::PageEntryBits;
use kernel_registers::cr3::Cr3;
use kernel_sync::IrqGuard;
use log::{info, trace};

/// Handle to a single, concrete address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressSpace {
    directory: FrameNumber,
}

impl AddressSpace {
    /// Build a new address space before paging is enabled.
    ///
    /// Takes the directory frame from the kernel pool and the shared page
    /// table from the process pool ([`PagingMode::Recursive`]) or the kernel
    /// pool ([`PagingMode::Identity`]).
    ///
    /// # Errors
    /// - [`PagingError::AlreadyEnabled`] once paging is on; frames can then
    ///   no longer be written through their physical address.
    /// - [`PagingError::FramePool`] if a pool runs dry.
    pub fn new<K: FramePool, P: FramePool, M: Mmu>(
        paging: &mut Paging<K, P, M>,
    ) -> Result<Self, PagingError> {
        if paging.is_enabled() {
            return Err(PagingError::AlreadyEnabled);
        }
        let _irq = IrqGuard::<M::Interrupts>::new();

        let directory_frame = paging.kernel_pool.get_frames(1)?;
        let table_frame = match paging.config.mode {
            PagingMode::Recursive => paging.process_pool.get_frames(1)?,
            PagingMode::Identity => paging.kernel_pool.get_frames(1)?,
        };

        let shared_pages = paging.config.shared_pages();
        let table: &mut PageTable = unsafe { paging.physical_mut(table_frame) };
        for i in 0..crate::page_table::ENTRIES_PER_TABLE as u16 {
            let entry = if u32::from(i) < shared_pages {
                PtEntry::make_page(FrameNumber::new(u32::from(i)), PageEntryBits::kernel_rw())
            } else {
                PtEntry::absent(PageEntryBits::absent_rw())
            };
            table.set(TableIndex::new(i), entry);
        }

        let directory: &mut PageDirectory = unsafe { paging.physical_mut(directory_frame) };
        directory.fill(PdEntry::absent(PageEntryBits::absent_rw()));
        directory.set(
            DirIndex::new(0),
            PdEntry::make_table(table_frame, PageEntryBits::kernel_rw()),
        );
        if paging.config.mode == PagingMode::Recursive {
            directory.set(
                RECURSIVE_SLOT,
                PdEntry::make_table(directory_frame, PageEntryBits::kernel_rw()),
            );
        }

        info!("Constructed page table object: directory {directory_frame}, shared table {table_frame}");
        Ok(Self {
            directory: directory_frame,
        })
    }

    /// Physical frame of the page directory.
    #[inline]
    #[must_use]
    pub const fn directory_frame(&self) -> FrameNumber {
        self.directory
    }

    #[inline]
    #[must_use]
    pub const fn directory_address(&self) -> PhysicalAddress {
        self.directory.base()
    }

    /// Whether this is the address space currently loaded into CR3.
    #[inline]
    #[must_use]
    pub fn is_current<K, P, M>(&self, paging: &Paging<K, P, M>) -> bool {
        paging.current == Some(self.directory)
    }

    /// Make this the current address space by loading its directory into CR3.
    ///
    /// Reloading the active space is how stale translations get flushed.
    pub fn load<K: FramePool, P: FramePool, M: Mmu>(&self, paging: &mut Paging<K, P, M>) {
        unsafe { paging.mmu.write_cr3(Cr3::from_directory(self.directory)) };
        if paging.current.replace(self.directory) == Some(self.directory) {
            trace!("Reloaded page directory {}", self.directory);
        } else {
            info!("Loaded page table: directory {}", self.directory);
        }
    }

    /// Unmap `page` and return its frame to the process pool.
    ///
    /// Returns the released frame, or `None` if the page was never backed.
    /// The TLB is flushed after the entry is cleared.
    ///
    /// # Errors
    /// - [`PagingError::NotActive`] if this is not the current address space.
    /// - [`PagingError::PagingDisabled`] if the paging structures are not reachable.
    /// - [`PagingError::FramePool`] if the process pool rejects the frame.
    pub fn free_page<K: FramePool, P: FramePool, M: Mmu>(
        &self,
        paging: &mut Paging<K, P, M>,
        page: VirtualPage,
    ) -> Result<Option<FrameNumber>, PagingError> {
        let _irq = IrqGuard::<M::Interrupts>::new();
        let root = self.reachable_root(paging)?;

        let (dir, index) = split_indices(page.base());
        let directory = unsafe { paging.directory_mut(root) };
        let Some(table) = (unsafe { paging.table_mut(dir, directory.get(dir)) }) else {
            return Ok(None);
        };
        let entry = table.get(index);
        let Some((frame, _)) = entry.page() else {
            return Ok(None);
        };

        paging.process_pool.release_frames(frame)?;
        table.set(index, entry.cleared());
        self.load(paging);

        trace!("Freed page {} (frame {frame})", page.base());
        Ok(Some(frame))
    }

    /// Translate `address` through this address space.
    ///
    /// # Errors
    /// Same as [`AddressSpace::free_page`], minus pool errors.
    pub fn query<K: FramePool, P: FramePool, M: Mmu>(
        &self,
        paging: &Paging<K, P, M>,
        address: VirtualAddress,
    ) -> Result<Option<PhysicalAddress>, PagingError> {
        self.reachable_root(paging)?;
        Ok(paging.translate(address))
    }

    fn reachable_root<K: FramePool, P: FramePool, M: Mmu>(
        &self,
        paging: &Paging<K, P, M>,
    ) -> Result<FrameNumber, PagingError> {
        if !self.is_current(paging) {
            return Err(PagingError::NotActive(self.directory));
        }
        paging.reachable_root().ok_or(PagingError::PagingDisabled)
    }
}
