//! # Software MMU
//!
//! A tiny in-memory "RAM" plus a two-level page walk, for running the paging
//! code on a development host.
//!
//! Physical memory is a vector of 4 KiB-aligned frames; physical addresses are
//! byte offsets from 0. While `CR0.PG` is clear, virtual addresses are used as
//! physical addresses. Once it is set, every access walks the directory in
//! CR3 exactly like the hardware would, including the recursive slot.
//!
//! There is no TLB: a changed entry takes effect immediately. CR3 writes are
//! counted so tests can still observe flushes.

use crate::addresses::{PAGE_SIZE, PhysicalAddress, VirtualAddress};
use crate::mmu::Mmu;
use crate::page_table::pd::PdEntry;
use crate::page_table::pt::PtEntry;
use crate::page_table::split_indices;
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::{Cell, UnsafeCell};
use kernel_registers::cr0::Cr0;
use kernel_registers::cr2::Cr2;
use kernel_registers::cr3::Cr3;
use kernel_sync::InterruptControl;

/// A 4 KiB-aligned raw frame.
#[repr(C, align(4096))]
struct Frame([u8; PAGE_SIZE as usize]);

/// Simulated processor: RAM, CR0, CR2 and CR3.
pub struct SoftMmu {
    ram: Box<[UnsafeCell<Frame>]>,
    cr0: Cr0,
    cr2: Cr2,
    cr3: Cr3,
    root_loads: usize,
}

impl SoftMmu {
    /// A machine with `frames` zeroed frames of RAM and paging disabled.
    #[must_use]
    pub fn with_frames(frames: u32) -> Self {
        let ram: Vec<_> = (0..frames)
            .map(|_| UnsafeCell::new(Frame([0; PAGE_SIZE as usize])))
            .collect();
        Self {
            ram: ram.into_boxed_slice(),
            cr0: Cr0::new().with_pe_protection_enable(true),
            cr2: Cr2::default(),
            cr3: Cr3::new(),
            root_loads: 0,
        }
    }

    /// How often CR3 was written.
    #[must_use]
    pub fn root_loads(&self) -> usize {
        self.root_loads
    }

    /// Record `address` in CR2, as the processor does when delivering #PF.
    pub fn raise_fault(&mut self, address: VirtualAddress) {
        self.cr2 = Cr2::from(address);
    }

    /// The hardware page walk.
    ///
    /// Returns `None` where the processor would raise a not-present fault.
    #[must_use]
    pub fn translate(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        if !self.cr0.pg_paging() {
            return Some(PhysicalAddress::new(va.as_u32()));
        }
        let (dir, index) = split_indices(va);
        let directory = self.cr3.directory_phys();
        let pde = PdEntry::from_raw(self.read_phys_u32(directory + dir.as_usize() as u32 * 4));
        let table = pde.table()?;
        let pte = PtEntry::from_raw(self.read_phys_u32(table.base() + index.as_usize() as u32 * 4));
        let (frame, _) = pte.page()?;
        Some(frame.base() + va.page_offset())
    }

    /// Read a 32-bit word of physical memory.
    ///
    /// # Panics
    /// If `pa` is outside the simulated RAM or not 4-byte aligned.
    #[must_use]
    pub fn read_phys_u32(&self, pa: PhysicalAddress) -> u32 {
        unsafe { *self.phys_ptr::<u32>(pa) }
    }

    /// Write a 32-bit word of physical memory.
    ///
    /// # Panics
    /// If `pa` is outside the simulated RAM or not 4-byte aligned.
    pub fn write_phys_u32(&mut self, pa: PhysicalAddress, value: u32) {
        unsafe { *self.phys_ptr::<u32>(pa) = value }
    }

    fn phys_ptr<T>(&self, pa: PhysicalAddress) -> *mut T {
        let frame = pa.frame().as_u32() as usize;
        let offset = pa.frame_offset() as usize;
        assert!(
            frame < self.ram.len(),
            "physical access at {pa:?} beyond simulated RAM"
        );
        assert!(offset + size_of::<T>() <= PAGE_SIZE as usize);
        assert_eq!(offset % align_of::<T>(), 0, "misaligned access at {pa:?}");
        unsafe { self.ram[frame].get().cast::<u8>().add(offset).cast::<T>() }
    }
}

impl Mmu for SoftMmu {
    type Interrupts = SoftInterrupts;

    fn read_cr0(&self) -> Cr0 {
        self.cr0
    }

    unsafe fn write_cr0(&mut self, value: Cr0) {
        self.cr0 = value;
    }

    fn read_cr2(&self) -> Cr2 {
        self.cr2
    }

    fn read_cr3(&self) -> Cr3 {
        self.cr3
    }

    unsafe fn write_cr3(&mut self, value: Cr3) {
        self.cr3 = value;
        self.root_loads += 1;
    }

    /// # Panics
    /// On an access the hardware would fault on. The paging code must have
    /// resolved the fault before dereferencing.
    unsafe fn virt_to_mut<'a, T>(&self, va: VirtualAddress) -> &'a mut T {
        let Some(pa) = self.translate(va) else {
            panic!("unhandled page fault at {va}");
        };
        unsafe { &mut *self.phys_ptr::<T>(pa) }
    }
}

std::thread_local! {
    static IF_FLAG: Cell<bool> = const { Cell::new(true) };
    static DISABLES: Cell<usize> = const { Cell::new(0) };
}

/// Interrupt flag of the simulated processor (one per host thread).
#[derive(Debug, Copy, Clone, Default)]
pub struct SoftInterrupts;

impl SoftInterrupts {
    pub fn set_enabled(enabled: bool) {
        IF_FLAG.with(|f| f.set(enabled));
    }

    /// How often interrupts were switched off on this thread.
    #[must_use]
    pub fn disable_count() -> usize {
        DISABLES.with(Cell::get)
    }
}

impl InterruptControl for SoftInterrupts {
    fn interrupts_enabled() -> bool {
        IF_FLAG.with(Cell::get)
    }

    fn disable_interrupts() {
        IF_FLAG.with(|f| f.set(false));
        DISABLES.with(|d| d.set(d.get() + 1));
    }

    fn enable_interrupts() {
        IF_FLAG.with(|f| f.set(true));
    }
}
