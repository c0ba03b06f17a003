//! # Virtual Memory Pool
//!
//! A [`VmPool`] hands out page-granular regions of one virtual window of an
//! address space. Regions get no frames when they are allocated: the first
//! touch of each page faults, and the fault handler backs it because the
//! window is registered as legitimate. Releasing a region returns the frames
//! of every page that was actually touched.
//!
//! ## Region table
//!
//! The bookkeeping lives *inside* the window, in its first page:
//!
//! ```text
//! base            base + 4 KiB                                   base + size
//! ┌───────────────┬───────────┬──────────────┬───────────────────┐
//! │ region table  │ region 1  │ region 2     │   (never used)    │
//! └───────────────┴───────────┴──────────────┴───────────────────┘
//! ```
//!
//! Record 0 always describes the table page itself. New regions are appended
//! right after the last live region (a bump pointer), so space freed in the
//! middle of the window is only reclaimed in the `available` counter.

use kernel_vmem::addresses::{PAGE_SIZE, VirtualAddress, VirtualPage, pages_for};
use kernel_vmem::{
    AddressSpace, FaultError, FramePool, Mmu, Paging, PagingConfig, PagingError, PagingMode,
    PoolExtent, PoolHandle, recursive,
};
use kernel_sync::IrqGuard;
use log::{debug, info};

/// One allocated region as stored in the region table.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Region {
    base_address: u32,
    length: u32,
}

/// Number of region records that fit in the table page.
pub const MAX_REGIONS: usize = PAGE_SIZE as usize / size_of::<Region>();

#[repr(C, align(4096))]
struct RegionTable {
    records: [Region; MAX_REGIONS],
}

const _: () = assert!(size_of::<RegionTable>() == PAGE_SIZE as usize);

impl Region {
    #[must_use]
    pub const fn new(base: VirtualAddress, length: u32) -> Self {
        Self {
            base_address: base.as_u32(),
            length,
        }
    }

    #[must_use]
    pub const fn base(&self) -> VirtualAddress {
        VirtualAddress::new(self.base_address)
    }

    /// Length in bytes, always a multiple of the page size.
    #[must_use]
    pub const fn length(&self) -> u32 {
        self.length
    }

    /// The pages covered by the region, in ascending order.
    pub fn pages(&self) -> impl Iterator<Item = VirtualPage> + use<> {
        let first = VirtualPage::containing(self.base()).number();
        (first..first + self.length / PAGE_SIZE).map(VirtualPage::from_number)
    }
}

#[derive(Debug, thiserror::Error, Copy, Clone, PartialEq, Eq)]
pub enum VmPoolError {
    #[error("a VM pool needs at least one page, got {size:#x} bytes")]
    TooSmall { size: u32 },
    #[error("window {base}..+{size:#x} is unaligned, wraps past 4 GiB or overlaps a reserved range")]
    InvalidWindow { base: VirtualAddress, size: u32 },
    #[error("cannot allocate a region of zero bytes")]
    ZeroSized,
    #[error("requested {requested:#x} bytes, pool has {available:#x} left")]
    OutOfSpace { requested: u32, available: u32 },
    #[error("region table is full")]
    RegionTableFull,
    #[error("{0} is the pool's own region table")]
    ReservedRegion(VirtualAddress),
    #[error("no region starts at {0}")]
    UnknownRegion(VirtualAddress),
    #[error(transparent)]
    Fault(#[from] FaultError),
    #[error(transparent)]
    Paging(#[from] PagingError),
}

/// Whether `[base, base + size)` touches the shared region or, in recursive
/// mode, the recursive window.
fn overlaps_reserved(config: &PagingConfig, base: VirtualAddress, size: u32) -> bool {
    let last = base.as_u32() + (size - 1);
    base.as_u32() < config.shared_size
        || (config.mode == PagingMode::Recursive && last >= recursive::WINDOW_BASE.as_u32())
}

/// Region allocator over one window of an address space.
#[derive(Debug)]
pub struct VmPool<'s> {
    space: &'s AddressSpace,
    handle: PoolHandle,
    base: VirtualAddress,
    size: u32,
    region_count: u32,
    available: u32,
}

impl<'s> VmPool<'s> {
    /// Register the window `[base, base + size)` and set up its region table.
    ///
    /// `space` must be the current address space and paging must be enabled;
    /// the table page is faulted in right away. The window may end exactly at
    /// 4 GiB, but it must stay clear of the identity-mapped shared region and,
    /// with [`PagingMode::Recursive`], of the recursive window.
    ///
    /// # Errors
    /// - [`VmPoolError::TooSmall`] if the window cannot hold the table page.
    /// - [`VmPoolError::InvalidWindow`] for an unaligned base, a window that
    ///   wraps around the top of the address space, or one that overlaps a
    ///   reserved range.
    /// - [`VmPoolError::Paging`] if paging is disabled or `space` is not the
    ///   current address space.
    /// - [`VmPoolError::Fault`] if the table page cannot be backed.
    pub fn new<K: FramePool, P: FramePool, M: Mmu>(
        paging: &mut Paging<K, P, M>,
        space: &'s AddressSpace,
        base: VirtualAddress,
        size: u32,
    ) -> Result<Self, VmPoolError> {
        if size < PAGE_SIZE {
            return Err(VmPoolError::TooSmall { size });
        }
        if !base.is_page_aligned()
            || size - 1 > u32::MAX - base.as_u32()
            || overlaps_reserved(paging.config(), base, size)
        {
            return Err(VmPoolError::InvalidWindow { base, size });
        }
        if !paging.is_enabled() {
            return Err(PagingError::PagingDisabled.into());
        }
        if !space.is_current(paging) {
            return Err(PagingError::NotActive(space.directory_frame()).into());
        }

        let _irq = IrqGuard::<M::Interrupts>::new();
        let handle = paging.register_pool(PoolExtent::new(base, size));
        let table: &mut RegionTable = unsafe { paging.access(base)? };
        table.records[0] = Region::new(base, PAGE_SIZE);

        info!("Constructed VM pool at {base}..+{size:#x}");
        Ok(Self {
            space,
            handle,
            base,
            size,
            region_count: 1,
            available: size - PAGE_SIZE,
        })
    }

    #[inline]
    #[must_use]
    pub const fn base(&self) -> VirtualAddress {
        self.base
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Bytes not currently handed out.
    #[inline]
    #[must_use]
    pub const fn available(&self) -> u32 {
        self.available
    }

    /// Number of live records, including the table page.
    #[inline]
    #[must_use]
    pub const fn region_count(&self) -> u32 {
        self.region_count
    }

    #[inline]
    #[must_use]
    pub const fn handle(&self) -> PoolHandle {
        self.handle
    }

    /// Reserve a region of at least `bytes` bytes, rounded up to whole pages.
    ///
    /// No frames are allocated; pages are backed on first touch.
    ///
    /// # Errors
    /// - [`VmPoolError::ZeroSized`] for `bytes == 0`.
    /// - [`VmPoolError::OutOfSpace`] if the rounded size exceeds what is left,
    ///   or would run past the end of the window.
    /// - [`VmPoolError::RegionTableFull`] if no record is free.
    pub fn allocate<K: FramePool, P: FramePool, M: Mmu>(
        &mut self,
        paging: &mut Paging<K, P, M>,
        bytes: u32,
    ) -> Result<VirtualAddress, VmPoolError> {
        if bytes == 0 {
            return Err(VmPoolError::ZeroSized);
        }
        let out_of_space = VmPoolError::OutOfSpace {
            requested: bytes,
            available: self.available,
        };
        let Some(length) = pages_for(bytes).checked_mul(PAGE_SIZE) else {
            return Err(out_of_space);
        };
        if length > self.available {
            return Err(out_of_space);
        }
        if self.region_count as usize >= MAX_REGIONS {
            return Err(VmPoolError::RegionTableFull);
        }

        let _irq = IrqGuard::<M::Interrupts>::new();
        let table = unsafe { self.table(paging)? };
        let count = self.region_count as usize;
        let last = table.records[count - 1];
        let used = last.base_address - self.base.as_u32() + last.length;
        if length > self.size - used {
            return Err(out_of_space);
        }

        let region = Region::new(self.base + used, length);
        table.records[count] = region;
        self.region_count += 1;
        self.available -= length;

        debug!(
            "Allocated region {}..+{length:#x} ({} pages) from pool at {}",
            region.base(),
            length / PAGE_SIZE,
            self.base
        );
        Ok(region.base())
    }

    /// Release the region that starts at `start` and return its frames.
    ///
    /// Pages of the region that were never touched have no frame and are
    /// skipped. Returns the number of frames given back to the process pool.
    ///
    /// # Errors
    /// - [`VmPoolError::ReservedRegion`] for the pool's own table page.
    /// - [`VmPoolError::UnknownRegion`] if no live region starts at `start`.
    /// - [`VmPoolError::Paging`] if a page cannot be freed.
    pub fn release<K: FramePool, P: FramePool, M: Mmu>(
        &mut self,
        paging: &mut Paging<K, P, M>,
        start: VirtualAddress,
    ) -> Result<u32, VmPoolError> {
        if start == self.base {
            return Err(VmPoolError::ReservedRegion(start));
        }

        let _irq = IrqGuard::<M::Interrupts>::new();
        let table = unsafe { self.table(paging)? };
        let count = self.region_count as usize;
        let Some(index) = table.records[1..count]
            .iter()
            .position(|r| r.base() == start)
            .map(|i| i + 1)
        else {
            return Err(VmPoolError::UnknownRegion(start));
        };

        let region = table.records[index];
        let mut freed = 0;
        for page in region.pages() {
            if self.space.free_page(paging, page)?.is_some() {
                freed += 1;
            }
        }

        table.records.copy_within(index + 1..count, index);
        table.records[count - 1] = Region::default();
        self.region_count -= 1;
        self.available += region.length();

        debug!(
            "Released region {start}..+{:#x}: {freed} frames returned",
            region.length()
        );
        Ok(freed)
    }

    /// Whether the fault handler may back `address` for this pool.
    ///
    /// The window's upper bound is inclusive, see [`PoolExtent::is_legitimate`].
    #[must_use]
    pub const fn is_legitimate(&self, address: VirtualAddress) -> bool {
        PoolExtent::new(self.base, self.size).is_legitimate(address)
    }

    /// The live region records, table page first.
    ///
    /// # Errors
    /// [`VmPoolError::Fault`] if the table page cannot be reached.
    pub fn regions<'p, K: FramePool, P: FramePool, M: Mmu>(
        &self,
        paging: &'p mut Paging<K, P, M>,
    ) -> Result<&'p [Region], VmPoolError> {
        let table = unsafe { self.table(paging)? };
        Ok(&table.records[..self.region_count as usize])
    }

    /// The region table page, faulted in if needed.
    ///
    /// # Safety
    /// The caller picks the lifetime and must not hold two references at once.
    unsafe fn table<'t, K: FramePool, P: FramePool, M: Mmu>(
        &self,
        paging: &mut Paging<K, P, M>,
    ) -> Result<&'t mut RegionTable, VmPoolError> {
        Ok(unsafe { paging.access(self.base)? })
    }
}
