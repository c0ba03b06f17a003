//! # Virtual Memory Support
//!
//! Two-level i386 paging for a small teaching kernel: page directories and
//! tables, demand paging driven by the page fault handler, and a registry of
//! the virtual memory pools that are allowed to fault pages in.
//!
//! ## What you get
//! - A [`Paging`] context that owns the frame pools, the MMU and the
//!   [`VmPoolRegistry`], and resolves page faults.
//! - An [`AddressSpace`] describing one page directory.
//! - x86 paging entries ([`PageEntryBits`]) with the typed
//!   [`PageDirectory`](page_table::pd::PageDirectory) and
//!   [`PageTable`](page_table::pt::PageTable) wrappers.
//! - A tiny frame source interface ([`FramePool`]) and an MMU interface ([`Mmu`]).
//!
//! ## i386 Virtual Address → Physical Address Walk
//!
//! Each 32-bit virtual address is divided into three fields:
//!
//! ```text
//! | 31‒22 | 21‒12 | 11‒0   |
//! |  PD   |  PT   | Offset |
//! ```
//!
//! ```text
//!  CR3 → PD  →  PT  →  Physical Page
//!         │      │
//!         │      └───► PTE (Page Table Entry)     → maps 4 KiB page
//!         └──────────► PDE (Page Directory Entry) → points to a PT
//! ```
//!
//! Both tables hold 1024 (2¹⁰) entries of 4 bytes. One directory entry covers
//! 4 MiB of address space; one table entry covers 4 KiB.
//!
//! ### Demand paging
//!
//! Address spaces start out with only the shared region mapped. Every other
//! page gets its frame the first time it is touched: the CPU raises a
//! not-present page fault, [`Paging::handle_fault`] installs the missing table
//! and frame, and the instruction is restarted.
//!
//! ### Reaching the tables
//!
//! With paging on, the kernel can only touch what is mapped. In the default
//! [`PagingMode::Recursive`] the directory maps itself in its last slot (see
//! [`recursive`]); in [`PagingMode::Identity`] the tables stay in the
//! identity-mapped shared region.

#![cfg_attr(not(any(test, feature = "soft-mmu")), no_std)]
#![allow(unsafe_code)]

pub mod address_space;
pub mod fault;
pub mod frame_pool;
pub mod mmu;
mod page_entry_bits;
pub mod page_table;
pub mod paging;
pub mod recursive;
pub mod registry;

#[cfg(any(test, feature = "soft-mmu"))]
pub mod soft_mmu;

extern crate alloc;

pub use crate::address_space::AddressSpace;
pub use crate::fault::{FaultError, FaultOutcome, PageFaultError};
pub use crate::frame_pool::{FramePool, FramePoolError};
pub use crate::mmu::Mmu;
pub use crate::page_entry_bits::PageEntryBits;
pub use crate::paging::{Paging, PagingConfig, PagingError, PagingMode};
pub use crate::registry::{PoolExtent, PoolHandle, VmPoolRegistry};
pub use kernel_info::memory as info;
pub use kernel_memory_addresses as addresses;

#[cfg(target_arch = "x86")]
pub use crate::mmu::X86Mmu;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addresses::{FrameNumber, PhysicalAddress, VirtualAddress, VirtualPage};
    use crate::soft_mmu::{SoftInterrupts, SoftMmu};
    use alloc::vec::Vec;
    use kernel_sync::InterruptControl;

    /// Hands out single frames from `[next, end)` and takes them back in any order.
    struct TestPool {
        start: u32,
        next: u32,
        end: u32,
        returned: Vec<FrameNumber>,
    }

    impl TestPool {
        fn new(start: u32, frames: u32) -> Self {
            Self {
                start,
                next: start,
                end: start + frames,
                returned: Vec::new(),
            }
        }

        fn handed_out(&self) -> u32 {
            self.next - self.start - self.returned.len() as u32
        }
    }

    impl FramePool for TestPool {
        fn get_frames(&mut self, count: u32) -> Result<FrameNumber, FramePoolError> {
            if count == 1
                && let Some(f) = self.returned.pop()
            {
                return Ok(f);
            }
            if self.next + count > self.end {
                return Err(FramePoolError::Exhausted { requested: count });
            }
            let f = FrameNumber::new(self.next);
            self.next += count;
            Ok(f)
        }

        fn release_frames(&mut self, first: FrameNumber) -> Result<(), FramePoolError> {
            if !(self.start..self.end).contains(&first.as_u32()) {
                return Err(FramePoolError::OutOfRange(first));
            }
            self.returned.push(first);
            Ok(())
        }
    }

    // 2..4 MiB kernel pool, 4..6 MiB process pool
    const KERNEL: (u32, u32) = (512, 512);
    const PROCESS: (u32, u32) = (1024, 512);

    type TestPaging = Paging<TestPool, TestPool, SoftMmu>;

    fn boot(mode: PagingMode) -> (TestPaging, AddressSpace) {
        SoftInterrupts::set_enabled(true);
        let mut paging = Paging::new(
            PagingConfig::new(info::SHARED_SIZE, mode),
            TestPool::new(KERNEL.0, KERNEL.1),
            TestPool::new(PROCESS.0, PROCESS.1),
            SoftMmu::with_frames(PROCESS.0 + PROCESS.1),
        )
        .unwrap();
        let space = AddressSpace::new(&mut paging).unwrap();
        space.load(&mut paging);
        paging.enable().unwrap();
        (paging, space)
    }

    fn not_present() -> PageFaultError {
        PageFaultError::new()
    }

    fn fault_at(paging: &mut TestPaging, va: u32) -> Result<FaultOutcome, FaultError> {
        paging.mmu_mut().raise_fault(VirtualAddress::new(va));
        paging.handle_fault(not_present())
    }

    #[test]
    fn shared_region_is_identity_mapped() {
        for mode in [PagingMode::Recursive, PagingMode::Identity] {
            let (paging, space) = boot(mode);
            for va in [0x0000_0000, 0x0000_1234, 0x0020_0000, 0x003F_FFFF] {
                assert_eq!(
                    paging.mmu().translate(VirtualAddress::new(va)),
                    Some(PhysicalAddress::new(va))
                );
                assert_eq!(
                    space.query(&paging, VirtualAddress::new(va)),
                    Ok(Some(PhysicalAddress::new(va)))
                );
            }
            assert_eq!(paging.mmu().translate(VirtualAddress::new(0x0040_0000)), None);
        }
    }

    #[test]
    fn construction_layout() {
        let (paging, space) = boot(PagingMode::Recursive);
        let dir = space.directory_address();
        let mmu = paging.mmu();

        let pde0 = mmu.read_phys_u32(dir);
        assert_eq!(pde0 & 0xFFF, 0b011);
        assert_eq!(pde0 >> 12, PROCESS.0, "shared table comes from the process pool");
        assert_eq!(mmu.read_phys_u32(dir + 4), 0b010);
        assert_eq!(mmu.read_phys_u32(dir + 1022 * 4), 0b010);
        assert_eq!(
            mmu.read_phys_u32(dir + 1023 * 4),
            space.directory_frame().base().as_u32() | 0b011
        );
        assert_eq!(space.directory_frame(), FrameNumber::new(KERNEL.0));
        assert_eq!(mmu.read_cr3().directory(), space.directory_frame());
        assert!(mmu.read_cr0().pg_paging());
    }

    #[test]
    fn identity_mode_keeps_tables_in_the_kernel_pool() {
        let (paging, space) = boot(PagingMode::Identity);
        let dir = space.directory_address();
        let mmu = paging.mmu();
        assert_eq!(mmu.read_phys_u32(dir) >> 12, KERNEL.0 + 1);
        assert_eq!(mmu.read_phys_u32(dir + 1023 * 4), 0b010);
        assert_eq!(paging.kernel_pool().handed_out(), 2);
        assert_eq!(paging.process_pool().handed_out(), 0);
    }

    #[test]
    fn recursive_views_reach_the_directory() {
        let (paging, space) = boot(PagingMode::Recursive);
        let view = paging.mmu().translate(recursive::directory_view());
        assert_eq!(view, Some(space.directory_address()));
        let table0 = paging
            .mmu()
            .translate(recursive::table_view(page_table::pd::DirIndex::new(0)));
        assert_eq!(table0, Some(FrameNumber::new(PROCESS.0).base()));
    }

    #[test]
    fn first_fault_in_a_slot_installs_table_and_page() {
        for mode in [PagingMode::Recursive, PagingMode::Identity] {
            let (mut paging, space) = boot(mode);
            let outcome = fault_at(&mut paging, 0x4000_0000).unwrap();
            let FaultOutcome::TableAndPageMapped { table, page } = outcome else {
                panic!("expected a new table, got {outcome:?}");
            };
            assert_ne!(table, page);

            let pde = paging.mmu().read_phys_u32(space.directory_address() + 256 * 4);
            assert_eq!(pde, table.base().as_u32() | 0b011);
            // untouched neighbours carry the user marker
            assert_eq!(paging.mmu().read_phys_u32(table.base() + 4), 0b100);
            assert_eq!(
                paging.translate(VirtualAddress::new(0x4000_0ABC)),
                Some(page.base() + 0xABC)
            );

            let outcome = fault_at(&mut paging, 0x4000_1000).unwrap();
            assert!(matches!(outcome, FaultOutcome::PageMapped { .. }));
        }
    }

    #[test]
    fn repeated_fault_is_harmless() {
        let (mut paging, _space) = boot(PagingMode::Recursive);
        fault_at(&mut paging, 0x4000_0000).unwrap();
        let before = paging.process_pool().handed_out();
        assert_eq!(fault_at(&mut paging, 0x4000_0010), Ok(FaultOutcome::AlreadyMapped));
        assert_eq!(paging.process_pool().handed_out(), before);
    }

    #[test]
    fn protection_faults_are_rejected() {
        let (mut paging, _space) = boot(PagingMode::Recursive);
        paging.mmu_mut().raise_fault(VirtualAddress::new(0x1000));
        let code = PageFaultError::new().with_present(true).with_write(true);
        assert_eq!(
            paging.handle_fault(code),
            Err(FaultError::ProtectionViolation {
                address: VirtualAddress::new(0x1000),
                code
            })
        );
    }

    #[test]
    fn recursive_window_is_off_limits() {
        let (mut paging, _space) = boot(PagingMode::Recursive);
        assert_eq!(
            fault_at(&mut paging, 0xFFC0_1000),
            Err(FaultError::RecursiveWindow(VirtualAddress::new(0xFFC0_1000)))
        );
    }

    #[test]
    fn registry_gates_fault_resolution() {
        let (mut paging, _space) = boot(PagingMode::Recursive);
        // with no pools registered every address is accepted
        assert!(fault_at(&mut paging, 0x8000_0000).is_ok());

        paging.register_pool(PoolExtent::new(VirtualAddress::new(0x4000_0000), 0x10_0000));
        assert!(fault_at(&mut paging, 0x4000_2000).is_ok());
        assert_eq!(
            fault_at(&mut paging, 0x9000_0000),
            Err(FaultError::IllegitimateAddress(VirtualAddress::new(0x9000_0000)))
        );
    }

    #[test]
    fn exhausted_pool_surfaces_as_fault_error() {
        let (mut paging, _space) = boot(PagingMode::Recursive);
        while paging.process_pool_mut().get_frames(1).is_ok() {}
        assert_eq!(
            fault_at(&mut paging, 0x4000_0000),
            Err(FaultError::OutOfFrames(FramePoolError::Exhausted { requested: 1 }))
        );
    }

    #[test]
    fn faults_before_enable_are_rejected() {
        let mut paging = Paging::new(
            PagingConfig::default(),
            TestPool::new(KERNEL.0, KERNEL.1),
            TestPool::new(PROCESS.0, PROCESS.1),
            SoftMmu::with_frames(PROCESS.0 + PROCESS.1),
        )
        .unwrap();
        assert_eq!(paging.enable(), Err(PagingError::NoActiveAddressSpace));
        paging.mmu_mut().raise_fault(VirtualAddress::new(0x4000_0000));
        assert_eq!(paging.handle_fault(not_present()), Err(FaultError::PagingDisabled));
    }

    #[test]
    fn enable_twice_fails() {
        let (mut paging, _space) = boot(PagingMode::Recursive);
        assert_eq!(paging.enable(), Err(PagingError::AlreadyEnabled));
        assert_eq!(
            AddressSpace::new(&mut paging).map(|_| ()),
            Err(PagingError::AlreadyEnabled)
        );
    }

    #[test]
    fn shared_size_must_fit_one_table() {
        let make = |size| {
            Paging::new(
                PagingConfig::new(size, PagingMode::Recursive),
                TestPool::new(KERNEL.0, KERNEL.1),
                TestPool::new(PROCESS.0, PROCESS.1),
                SoftMmu::with_frames(1),
            )
            .map(|_| ())
        };
        assert_eq!(make(0), Err(PagingError::SharedSizeInvalid(0)));
        assert_eq!(make(4097), Err(PagingError::SharedSizeInvalid(4097)));
        assert_eq!(make(8 << 20), Err(PagingError::SharedSizeInvalid(8 << 20)));
        assert_eq!(make(2 << 20), Ok(()));
    }

    #[test]
    fn smaller_shared_region_leaves_the_rest_unmapped() {
        let mut paging = Paging::new(
            PagingConfig::new(1 << 20, PagingMode::Recursive),
            TestPool::new(KERNEL.0, KERNEL.1),
            TestPool::new(PROCESS.0, PROCESS.1),
            SoftMmu::with_frames(PROCESS.0 + PROCESS.1),
        )
        .unwrap();
        let space = AddressSpace::new(&mut paging).unwrap();
        space.load(&mut paging);
        paging.enable().unwrap();
        assert!(paging.translate(VirtualAddress::new(0x000F_F000)).is_some());
        assert_eq!(paging.translate(VirtualAddress::new(0x0010_0000)), None);
    }

    #[test]
    fn free_page_returns_the_frame_and_flushes() {
        for mode in [PagingMode::Recursive, PagingMode::Identity] {
            let (mut paging, space) = boot(mode);
            let page = VirtualPage::containing(VirtualAddress::new(0x4000_3000));
            let frame = fault_at(&mut paging, 0x4000_3000).unwrap().page().unwrap();
            let loads = paging.mmu().root_loads();

            assert_eq!(space.free_page(&mut paging, page), Ok(Some(frame)));
            assert_eq!(paging.process_pool().returned, [frame]);
            assert_eq!(paging.mmu().root_loads(), loads + 1);
            assert_eq!(paging.translate(page.base()), None);

            // entry keeps its frame bits, only present is cleared
            let (dir, index) = page_table::split_indices(page.base());
            let pde = paging
                .mmu()
                .read_phys_u32(space.directory_address() + dir.as_usize() as u32 * 4);
            let pte = paging
                .mmu()
                .read_phys_u32(PhysicalAddress::new(pde & !0xFFF) + index.as_usize() as u32 * 4);
            assert_eq!(pte, frame.base().as_u32() | 0b010);
        }
    }

    #[test]
    fn free_page_of_untouched_page_is_a_no_op() {
        let (mut paging, space) = boot(PagingMode::Recursive);
        let never = VirtualPage::containing(VirtualAddress::new(0x4000_0000));
        assert_eq!(space.free_page(&mut paging, never), Ok(None));

        fault_at(&mut paging, 0x4000_0000).unwrap();
        let neighbour = VirtualPage::containing(VirtualAddress::new(0x4000_1000));
        assert_eq!(space.free_page(&mut paging, neighbour), Ok(None));
        assert!(paging.process_pool().returned.is_empty());
    }

    #[test]
    fn free_page_requires_the_current_space() {
        let mut paging = Paging::new(
            PagingConfig::default(),
            TestPool::new(KERNEL.0, KERNEL.1),
            TestPool::new(PROCESS.0, PROCESS.1),
            SoftMmu::with_frames(PROCESS.0 + PROCESS.1),
        )
        .unwrap();
        let first = AddressSpace::new(&mut paging).unwrap();
        let second = AddressSpace::new(&mut paging).unwrap();
        second.load(&mut paging);
        paging.enable().unwrap();
        let page = VirtualPage::containing(VirtualAddress::new(0x4000_0000));
        assert_eq!(
            first.free_page(&mut paging, page),
            Err(PagingError::NotActive(first.directory_frame()))
        );
        assert!(second.is_current(&paging));
    }

    #[test]
    fn access_backs_the_page_on_demand() {
        let (mut paging, _space) = boot(PagingMode::Recursive);
        let va = VirtualAddress::new(0x4000_0040);
        assert_eq!(paging.translate(va), None);
        let word: &mut u32 = unsafe { paging.access(va) }.unwrap();
        *word = 0xDEAD_BEEF;
        let pa = paging.translate(va).unwrap();
        assert_eq!(paging.mmu().read_phys_u32(pa), 0xDEAD_BEEF);
        assert_eq!(paging.prefault(va), Ok(FaultOutcome::AlreadyMapped));
    }

    #[test]
    fn fault_resolution_restores_interrupts() {
        let (mut paging, _space) = boot(PagingMode::Recursive);
        let before = SoftInterrupts::disable_count();
        fault_at(&mut paging, 0x4000_0000).unwrap();
        assert!(SoftInterrupts::interrupts_enabled());
        assert!(SoftInterrupts::disable_count() > before);

        SoftInterrupts::set_enabled(false);
        fault_at(&mut paging, 0x4000_1000).unwrap();
        assert!(!SoftInterrupts::interrupts_enabled());
        SoftInterrupts::set_enabled(true);
    }
}
