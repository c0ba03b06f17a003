#![allow(dead_code)]

use kernel_alloc::ContFramePool;
use kernel_vmem::addresses::{FrameNumber, VirtualAddress};
use kernel_vmem::soft_mmu::{SoftInterrupts, SoftMmu};
use kernel_vmem::{AddressSpace, FaultError, FaultOutcome, PageFaultError, Paging, PagingConfig, PagingMode, info};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::cell::RefCell;
use std::sync::Once;

pub type Machine = Paging<ContFramePool<'static>, ContFramePool<'static>, SoftMmu>;

/// Physical frame ranges `(first, count)` of a simulated machine.
#[derive(Debug, Copy, Clone)]
pub struct Layout {
    pub kernel: (u32, u32),
    pub process: (u32, u32),
    pub hole: Option<(u32, u32)>,
}

impl Layout {
    /// 2..4 MiB kernel pool, 4..8 MiB process pool, no hole.
    pub const SMALL: Self = Self {
        kernel: (512, 512),
        process: (1024, 1024),
        hole: None,
    };

    /// The layout the kernel boots with.
    pub fn full() -> Self {
        Self {
            kernel: (
                info::KERNEL_POOL_START_FRAME.as_u32(),
                info::KERNEL_POOL_SIZE,
            ),
            process: (
                info::PROCESS_POOL_START_FRAME.as_u32(),
                info::PROCESS_POOL_SIZE,
            ),
            hole: Some((info::MEM_HOLE_START_FRAME.as_u32(), info::MEM_HOLE_SIZE)),
        }
    }

    fn ram_frames(&self) -> u32 {
        (self.kernel.0 + self.kernel.1).max(self.process.0 + self.process.1)
    }
}

fn frame_pool(first: u32, count: u32) -> ContFramePool<'static> {
    let info = vec![0u8; ContFramePool::needed_info_bytes(count)].leak();
    ContFramePool::new(FrameNumber::new(first), count, info).unwrap()
}

/// Boot a simulated machine: pools, one address space, paging on.
pub fn boot(layout: Layout, mode: PagingMode) -> (Machine, AddressSpace) {
    let (mut paging, space) = machine(layout, mode);
    space.load(&mut paging);
    paging.enable().unwrap();
    (paging, space)
}

/// Like [`boot`], but paging is left off after loading the address space.
pub fn boot_disabled(layout: Layout, mode: PagingMode) -> (Machine, AddressSpace) {
    let (mut paging, space) = machine(layout, mode);
    space.load(&mut paging);
    (paging, space)
}

/// Like [`boot`], plus a second address space that is never loaded.
pub fn boot_pair(layout: Layout, mode: PagingMode) -> (Machine, AddressSpace, AddressSpace) {
    let (mut paging, space) = machine(layout, mode);
    let other = AddressSpace::new(&mut paging).unwrap();
    space.load(&mut paging);
    paging.enable().unwrap();
    (paging, space, other)
}

fn machine(layout: Layout, mode: PagingMode) -> (Machine, AddressSpace) {
    init_logging();
    SoftInterrupts::set_enabled(true);

    let kernel = frame_pool(layout.kernel.0, layout.kernel.1);
    let mut process = frame_pool(layout.process.0, layout.process.1);
    if let Some((first, count)) = layout.hole {
        process
            .mark_inaccessible(FrameNumber::new(first), count)
            .unwrap();
    }

    let mut paging = Paging::new(
        PagingConfig::new(info::SHARED_SIZE, mode),
        kernel,
        process,
        SoftMmu::with_frames(layout.ram_frames()),
    )
    .unwrap();
    let space = AddressSpace::new(&mut paging).unwrap();
    (paging, space)
}

/// Raise a not-present write fault at `va` the way the processor would.
pub fn fault(m: &mut Machine, va: VirtualAddress) -> Result<FaultOutcome, FaultError> {
    m.mmu_mut().raise_fault(va);
    m.handle_fault(PageFaultError::new().with_write(true))
}

/// Write `value` to `va`, taking a page fault first if the page is not mapped.
pub fn touch(m: &mut Machine, va: VirtualAddress, value: u8) {
    if m.mmu().translate(va).is_none() {
        fault(m, va).unwrap();
    }
    let byte: &mut u8 = unsafe { m.access(va) }.unwrap();
    *byte = value;
}

/// Read the byte at `va` without faulting.
pub fn peek(m: &Machine, va: VirtualAddress) -> Option<u8> {
    let pa = m.mmu().translate(va)?;
    let word = m.mmu().read_phys_u32(kernel_vmem::addresses::PhysicalAddress::new(pa.as_u32() & !3));
    Some(word.to_ne_bytes()[(pa.as_u32() & 3) as usize])
}

/// Captures log records per test thread.
struct CaptureLogger;

thread_local! {
    static RECORDS: RefCell<Vec<(Level, String)>> = const { RefCell::new(Vec::new()) };
}

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        RECORDS.with(|r| {
            r.borrow_mut()
                .push((record.level(), record.args().to_string()));
        });
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        log::set_logger(&LOGGER).unwrap();
        log::set_max_level(LevelFilter::Trace);
    });
}

/// Drain the records logged on this thread so far.
pub fn take_logs() -> Vec<(Level, String)> {
    RECORDS.with(|r| r.take())
}
