//! # MMU access
//!
//! Everything the paging code needs from the processor, behind one trait:
//! the three control registers, turning a virtual address
//! into a reference, and the interrupt flag. [`X86Mmu`] is the real thing on
//! 32-bit x86; [`SoftMmu`](crate::soft_mmu::SoftMmu) models it in software for
//! host tests.

use crate::addresses::VirtualAddress;
use kernel_registers::cr0::Cr0;
use kernel_registers::cr2::Cr2;
use kernel_registers::cr3::Cr3;
use kernel_sync::InterruptControl;

pub trait Mmu {
    /// Interrupt flag of the CPU this MMU belongs to.
    type Interrupts: InterruptControl;

    fn read_cr0(&self) -> Cr0;

    /// # Safety
    /// Setting or clearing `PG` changes the meaning of every address in use.
    /// The caller must have an identity-mapped execution context.
    unsafe fn write_cr0(&mut self, value: Cr0);

    /// Address of the most recent page fault.
    fn read_cr2(&self) -> Cr2;

    fn read_cr3(&self) -> Cr3;

    /// Install a new translation root. Flushes all non-global TLB entries.
    ///
    /// # Safety
    /// `value` must reference a valid page directory that keeps the running
    /// code and stack mapped.
    unsafe fn write_cr3(&mut self, value: Cr3);

    /// Turn a virtual address of the current address space into a reference.
    ///
    /// # Safety
    /// `va` must be mapped (or paging disabled and `va` backed by RAM), aligned
    /// for `T`, and `T` must fit in the page. The caller picks the lifetime
    /// and must not create aliasing mutable references.
    unsafe fn virt_to_mut<'a, T>(&self, va: VirtualAddress) -> &'a mut T;
}

/// The executing 32-bit x86 processor.
#[cfg(target_arch = "x86")]
#[derive(Debug)]
pub struct X86Mmu(());

#[cfg(target_arch = "x86")]
impl X86Mmu {
    /// # Safety
    /// Must run in ring 0; every method executes privileged instructions.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self(())
    }
}

#[cfg(target_arch = "x86")]
impl Mmu for X86Mmu {
    type Interrupts = kernel_sync::CpuInterrupts;

    #[inline]
    fn read_cr0(&self) -> Cr0 {
        use kernel_registers::LoadRegisterUnsafe;
        unsafe { Cr0::load_unsafe() }
    }

    #[inline]
    unsafe fn write_cr0(&mut self, value: Cr0) {
        use kernel_registers::StoreRegisterUnsafe;
        unsafe { value.store_unsafe() }
    }

    #[inline]
    fn read_cr2(&self) -> Cr2 {
        use kernel_registers::LoadRegisterUnsafe;
        unsafe { Cr2::load_unsafe() }
    }

    #[inline]
    fn read_cr3(&self) -> Cr3 {
        use kernel_registers::LoadRegisterUnsafe;
        unsafe { Cr3::load_unsafe() }
    }

    #[inline]
    unsafe fn write_cr3(&mut self, value: Cr3) {
        use kernel_registers::StoreRegisterUnsafe;
        unsafe { value.store_unsafe() }
    }

    #[inline]
    unsafe fn virt_to_mut<'a, T>(&self, va: VirtualAddress) -> &'a mut T {
        debug_assert!(va.as_u32() as usize % align_of::<T>() == 0);
        unsafe { &mut *(va.as_u32() as usize as *mut T) }
    }
}
