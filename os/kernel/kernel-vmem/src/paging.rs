//! # Paging context
//!
//! [`Paging`] owns the state that the paging subsystem shares across address
//! spaces: the frame pools, the MMU, the VM pool registry, which address space
//! is current, and whether paging is switched on. Address spaces
//! ([`AddressSpace`](crate::AddressSpace)) only remember their directory frame
//! and borrow the context for every operation.
//!
//! ## Reaching paging structures
//!
//! Once paging is on, page directories and tables are only reachable through
//! virtual addresses. How those addresses are formed is a [`PagingMode`]:
//!
//! - [`PagingMode::Recursive`]: through the [`recursive`](crate::recursive)
//!   window of the current address space. Tables may live anywhere in
//!   physical memory and come from the process pool.
//! - [`PagingMode::Identity`]: directly at their physical address. Tables
//!   come from the kernel pool so that they stay inside the identity-mapped
//!   shared region.
//!
//! ## Demand paging
//!
//! A not-present fault inside a registered VM pool window installs a page
//! table (if the directory slot is empty) and one data frame, both
//! present/writable/privileged. The faulting instruction can then simply be
//! restarted.

use crate::addresses::{FrameNumber, PAGE_SIZE, PhysicalAddress, VirtualAddress};
use crate::fault::{FaultError, FaultOutcome, PageFaultError};
use crate::frame_pool::{FramePool, FramePoolError};
use crate::mmu::Mmu;
use crate::page_table::pd::{DirIndex, PageDirectory, PdEntry};
use crate::page_table::pt::{PageTable, PtEntry};
use crate::page_table::{BYTES_PER_TABLE, split_indices};
use crate::recursive;
use crate::registry::{PoolExtent, PoolHandle, VmPoolRegistry};
use crate::PageEntryBits;
use kernel_sync::IrqGuard;
use log::{debug, error, info, trace};

/// How paging structures are addressed once paging is enabled.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum PagingMode {
    /// Directory slot 1023 maps the directory itself.
    #[default]
    Recursive,
    /// Paging structures are accessed at their (identity-mapped) physical address.
    Identity,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PagingConfig {
    /// Bytes at the bottom of every address space that are identity-mapped.
    pub shared_size: u32,
    pub mode: PagingMode,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            shared_size: kernel_info::memory::SHARED_SIZE,
            mode: PagingMode::default(),
        }
    }
}

impl PagingConfig {
    #[must_use]
    pub const fn new(shared_size: u32, mode: PagingMode) -> Self {
        Self { shared_size, mode }
    }

    /// Number of identity-mapped pages.
    #[inline]
    #[must_use]
    pub const fn shared_pages(&self) -> u32 {
        self.shared_size / PAGE_SIZE
    }
}

#[derive(Debug, thiserror::Error, Copy, Clone, PartialEq, Eq)]
pub enum PagingError {
    #[error("frame pool: {0}")]
    FramePool(#[from] FramePoolError),
    #[error("shared size {0:#x} must be a non-zero page multiple of at most 4 MiB")]
    SharedSizeInvalid(u32),
    #[error("paging is already enabled")]
    AlreadyEnabled,
    #[error("no address space has been loaded")]
    NoActiveAddressSpace,
    #[error("address space {0} is not the current one")]
    NotActive(FrameNumber),
    #[error("paging structures are not reachable while paging is disabled")]
    PagingDisabled,
}

/// Shared paging state.
///
/// - `K`: kernel frame pool.
/// - `P`: process frame pool.
/// - `M`: the MMU.
pub struct Paging<K, P, M> {
    pub(crate) config: PagingConfig,
    pub(crate) kernel_pool: K,
    pub(crate) process_pool: P,
    pub(crate) mmu: M,
    pub(crate) registry: VmPoolRegistry,
    pub(crate) current: Option<FrameNumber>,
    pub(crate) enabled: bool,
}

impl<K: FramePool, P: FramePool, M: Mmu> Paging<K, P, M> {
    /// Record the frame pools and the shared size. Nothing is allocated yet.
    ///
    /// # Errors
    /// [`PagingError::SharedSizeInvalid`] unless `shared_size` is a non-zero
    /// multiple of the page size that fits in one page table.
    pub fn new(
        config: PagingConfig,
        kernel_pool: K,
        process_pool: P,
        mmu: M,
    ) -> Result<Self, PagingError> {
        let shared = config.shared_size;
        if shared == 0 || !shared.is_multiple_of(PAGE_SIZE) || shared > BYTES_PER_TABLE {
            return Err(PagingError::SharedSizeInvalid(shared));
        }

        let enabled = mmu.read_cr0().pg_paging();
        info!(
            "Initialized paging system: shared {shared:#x} bytes, {:?} table access",
            config.mode
        );
        Ok(Self {
            config,
            kernel_pool,
            process_pool,
            mmu,
            registry: VmPoolRegistry::new(),
            current: None,
            enabled,
        })
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &PagingConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Directory frame of the current address space.
    #[inline]
    #[must_use]
    pub const fn current(&self) -> Option<FrameNumber> {
        self.current
    }

    #[inline]
    #[must_use]
    pub const fn kernel_pool(&self) -> &K {
        &self.kernel_pool
    }

    #[inline]
    #[must_use]
    pub const fn process_pool(&self) -> &P {
        &self.process_pool
    }

    #[inline]
    pub const fn process_pool_mut(&mut self) -> &mut P {
        &mut self.process_pool
    }

    #[inline]
    #[must_use]
    pub const fn mmu(&self) -> &M {
        &self.mmu
    }

    #[inline]
    pub const fn mmu_mut(&mut self) -> &mut M {
        &mut self.mmu
    }

    #[inline]
    #[must_use]
    pub const fn registry(&self) -> &VmPoolRegistry {
        &self.registry
    }

    /// Set the paging bit in CR0.
    ///
    /// # Errors
    /// - [`PagingError::AlreadyEnabled`] if paging is on.
    /// - [`PagingError::NoActiveAddressSpace`] if nothing was loaded into CR3.
    pub fn enable(&mut self) -> Result<(), PagingError> {
        if self.enabled {
            return Err(PagingError::AlreadyEnabled);
        }
        if self.current.is_none() {
            return Err(PagingError::NoActiveAddressSpace);
        }

        let cr0 = self.mmu.read_cr0().with_pg_paging(true);
        unsafe { self.mmu.write_cr0(cr0) };
        self.enabled = true;
        info!("Enabled paging");
        Ok(())
    }

    /// Add a VM pool window to the registry.
    pub fn register_pool(&mut self, extent: PoolExtent) -> PoolHandle {
        let _irq = IrqGuard::<M::Interrupts>::new();
        let handle = self.registry.register(extent);
        info!(
            "Registered VM pool #{}: {}..+{:#x}",
            handle.index(),
            extent.base,
            extent.size
        );
        handle
    }

    /// Resolve the page fault described by `code` at the address in CR2.
    ///
    /// # Errors
    /// - [`FaultError::ProtectionViolation`] for faults on present pages.
    /// - [`FaultError::PagingDisabled`] if paging is off.
    /// - [`FaultError::IllegitimateAddress`] if pools are registered and none
    ///   of them accepts the address.
    /// - [`FaultError::RecursiveWindow`] for addresses in the recursive window.
    /// - [`FaultError::OutOfFrames`] if a table or data frame cannot be allocated.
    pub fn handle_fault(&mut self, code: PageFaultError) -> Result<FaultOutcome, FaultError> {
        let address = self.mmu.read_cr2().fault_address();
        if code.present() {
            error!("Page fault at {address}: {}", code.explain());
            return Err(FaultError::ProtectionViolation { address, code });
        }
        if !self.enabled {
            error!("Page fault at {address} with paging disabled");
            return Err(FaultError::PagingDisabled);
        }
        self.resolve(address)
    }

    /// Make sure `address` is backed by a frame, as if it had just faulted.
    ///
    /// Does nothing while paging is disabled.
    ///
    /// # Errors
    /// Same as [`Paging::handle_fault`] for not-present faults.
    pub fn prefault(&mut self, address: VirtualAddress) -> Result<FaultOutcome, FaultError> {
        if !self.enabled || self.translate(address).is_some() {
            return Ok(FaultOutcome::AlreadyMapped);
        }
        self.resolve(address)
    }

    /// Borrow the `T` stored at `address` in the current address space,
    /// backing the page with a frame first if needed.
    ///
    /// # Errors
    /// Same as [`Paging::prefault`].
    ///
    /// # Safety
    /// `address` must be aligned for `T` and `T` must not cross the page end.
    /// The caller picks the lifetime and must not alias the result.
    pub unsafe fn access<'a, T>(&mut self, address: VirtualAddress) -> Result<&'a mut T, FaultError> {
        debug_assert!(address.page_offset() as usize + size_of::<T>() <= PAGE_SIZE as usize);
        self.prefault(address)?;
        Ok(unsafe { self.mmu.virt_to_mut(address) })
    }

    /// Software walk of the current address space.
    ///
    /// While paging is disabled every address translates to itself.
    #[must_use]
    pub fn translate(&self, address: VirtualAddress) -> Option<PhysicalAddress> {
        if !self.enabled {
            return Some(PhysicalAddress::new(address.as_u32()));
        }
        let root = self.reachable_root()?;
        let (dir, index) = split_indices(address);
        let directory = unsafe { self.directory_mut(root) };
        let table = unsafe { self.table_mut(dir, directory.get(dir)) }?;
        let (frame, _) = table.get(index).page()?;
        Some(frame.base() + address.page_offset())
    }

    fn resolve(&mut self, address: VirtualAddress) -> Result<FaultOutcome, FaultError> {
        let _irq = IrqGuard::<M::Interrupts>::new();

        let Some(root) = self.reachable_root() else {
            return Err(FaultError::PagingDisabled);
        };
        if self.config.mode == PagingMode::Recursive && recursive::in_window(address) {
            error!("Page fault at {address} inside the recursive window");
            return Err(FaultError::RecursiveWindow(address));
        }
        if !self.registry.is_empty() && self.registry.find_legitimate(address).is_none() {
            error!("Page fault at {address} outside of every VM pool");
            return Err(FaultError::IllegitimateAddress(address));
        }

        let (dir, index) = split_indices(address);
        let directory = unsafe { self.directory_mut(root) };

        let mut new_table = None;
        let mut pde = directory.get(dir);
        if !pde.is_present() {
            let frame = self.table_frame()?;
            pde = PdEntry::make_table(frame, PageEntryBits::kernel_rw());
            directory.set(dir, pde);

            let table = unsafe { self.table_at(dir, frame) };
            table.fill(PtEntry::absent(PageEntryBits::absent_user()));
            trace!("Installed page table {frame} for {}", dir.base());
            new_table = Some(frame);
        }

        let table = unsafe { self.table_at(dir, pde.flags().frame_number()) };
        if table.get(index).is_present() {
            trace!("Page fault at {address} was already resolved");
            return Ok(FaultOutcome::AlreadyMapped);
        }

        let page = self.process_pool.get_frames(1)?;
        table.set(index, PtEntry::make_page(page, PageEntryBits::kernel_rw()));
        debug!("Handled page fault at {address}: mapped frame {page}");

        Ok(match new_table {
            Some(table) => FaultOutcome::TableAndPageMapped { table, page },
            None => FaultOutcome::PageMapped { page },
        })
    }

    /// Frame for a new page table.
    pub(crate) fn table_frame(&mut self) -> Result<FrameNumber, FramePoolError> {
        match self.config.mode {
            PagingMode::Recursive => self.process_pool.get_frames(1),
            PagingMode::Identity => self.kernel_pool.get_frames(1),
        }
    }

    /// Directory frame of the current address space, if its paging
    /// structures can be reached right now.
    pub(crate) const fn reachable_root(&self) -> Option<FrameNumber> {
        match self.config.mode {
            PagingMode::Recursive if !self.enabled => None,
            _ => self.current,
        }
    }

    /// The page directory of the current address space.
    ///
    /// # Safety
    /// `root` must come from [`Paging::reachable_root`]. The caller must not
    /// hold another reference to the same directory.
    pub(crate) unsafe fn directory_mut<'a>(&self, root: FrameNumber) -> &'a mut PageDirectory {
        let view = match self.config.mode {
            PagingMode::Recursive => recursive::directory_view(),
            PagingMode::Identity => identity(root.base()),
        };
        unsafe { self.mmu.virt_to_mut(view) }
    }

    /// The page table behind directory slot `dir`, if `pde` is present.
    ///
    /// # Safety
    /// `pde` must be the current value of slot `dir` of a reachable directory.
    /// `dir` must not be the recursive slot.
    pub(crate) unsafe fn table_mut<'a>(
        &self,
        dir: DirIndex,
        pde: PdEntry,
    ) -> Option<&'a mut PageTable> {
        let frame = pde.table()?;
        Some(unsafe { self.table_at(dir, frame) })
    }

    /// The page table in `frame`, installed at directory slot `dir`.
    ///
    /// # Safety
    /// Same as [`Paging::table_mut`].
    unsafe fn table_at<'a>(&self, dir: DirIndex, frame: FrameNumber) -> &'a mut PageTable {
        let view = match self.config.mode {
            PagingMode::Recursive => recursive::table_view(dir),
            PagingMode::Identity => identity(frame.base()),
        };
        unsafe { self.mmu.virt_to_mut(view) }
    }

    /// Reference a frame by its physical address while paging is still off.
    ///
    /// # Safety
    /// Paging must be disabled, and `frame` must be RAM that nothing else references.
    pub(crate) unsafe fn physical_mut<'a, T>(&self, frame: FrameNumber) -> &'a mut T {
        debug_assert!(!self.enabled);
        unsafe { self.mmu.virt_to_mut(identity(frame.base())) }
    }
}

#[inline]
const fn identity(pa: PhysicalAddress) -> VirtualAddress {
    VirtualAddress::new(pa.as_u32())
}
