//! # Memory Layout

use kernel_memory_addresses::{FrameNumber, PAGE_SIZE, VirtualAddress};

const MIB: u32 = 1024 * 1024;

/// Size of the statically identity-mapped region at the bottom of the
/// address space (virtual == physical). Covered by exactly one page table.
pub const SHARED_SIZE: u32 = 4 * MIB;

/// First frame of the kernel frame pool (2 MiB).
pub const KERNEL_POOL_START_FRAME: FrameNumber = FrameNumber::new(2 * MIB / PAGE_SIZE);

/// Number of frames in the kernel frame pool (2 MiB worth).
pub const KERNEL_POOL_SIZE: u32 = 2 * MIB / PAGE_SIZE;

/// First frame of the process frame pool (4 MiB).
pub const PROCESS_POOL_START_FRAME: FrameNumber = FrameNumber::new(4 * MIB / PAGE_SIZE);

/// Number of frames in the process frame pool (28 MiB worth).
pub const PROCESS_POOL_SIZE: u32 = 28 * MIB / PAGE_SIZE;

/// First frame of the legacy ISA memory hole (15 MiB).
pub const MEM_HOLE_START_FRAME: FrameNumber = FrameNumber::new(15 * MIB / PAGE_SIZE);

/// Number of frames in the memory hole (1 MiB worth).
pub const MEM_HOLE_SIZE: u32 = MIB / PAGE_SIZE;

/// Base of the virtual-memory pool used for code.
pub const CODE_POOL_BASE: VirtualAddress = VirtualAddress::new(512 * MIB);

/// Size of the code pool window.
pub const CODE_POOL_SIZE: u32 = 256 * MIB;

/// Base of the virtual-memory pool used for the heap.
pub const HEAP_POOL_BASE: VirtualAddress = VirtualAddress::new(1024 * MIB);

/// Size of the heap pool window.
pub const HEAP_POOL_SIZE: u32 = 256 * MIB;

/// Directory slot reserved for the recursive self-mapping; the top 4 MiB of
/// the virtual address space are never handed to pools.
pub const RECURSIVE_WINDOW_BASE: VirtualAddress = VirtualAddress::new(0xFFC0_0000);

const _: () = {
    assert!(SHARED_SIZE.is_multiple_of(PAGE_SIZE));
    assert!(SHARED_SIZE <= 4 * MIB, "shared region must fit one page table");
    assert!(
        KERNEL_POOL_START_FRAME.as_u32() + KERNEL_POOL_SIZE <= PROCESS_POOL_START_FRAME.as_u32()
    );
    // kernel pool frames must be reachable through the identity map
    assert!((KERNEL_POOL_START_FRAME.as_u32() + KERNEL_POOL_SIZE) * PAGE_SIZE <= SHARED_SIZE);
    assert!(MEM_HOLE_START_FRAME.as_u32() >= PROCESS_POOL_START_FRAME.as_u32());
    assert!(
        MEM_HOLE_START_FRAME.as_u32() + MEM_HOLE_SIZE
            <= PROCESS_POOL_START_FRAME.as_u32() + PROCESS_POOL_SIZE
    );
    assert!(CODE_POOL_BASE.as_u32() >= SHARED_SIZE);
    assert!(CODE_POOL_BASE.as_u32() + CODE_POOL_SIZE <= HEAP_POOL_BASE.as_u32());
    assert!(HEAP_POOL_BASE.as_u32() + HEAP_POOL_SIZE <= RECURSIVE_WINDOW_BASE.as_u32());
};
