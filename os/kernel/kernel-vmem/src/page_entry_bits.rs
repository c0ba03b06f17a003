use crate::addresses::{FrameNumber, PhysicalAddress};
use bitfield_struct::bitfield;

/// A single 32-bit i386 paging entry in its raw bitfield form.
///
/// Page directory entries (PDE) and page table entries (PTE) share the same
/// shape: flag bits in the low 12 bits and a frame number in the upper 20.
/// For a PDE the frame is a page table; for a PTE it is a data frame.
///
/// The type allows read/write access to individual bits without manual masking
/// or shifting, using the [`bitfield_struct`](https://docs.rs/bitfield-struct/)
/// derive.
///
/// ### Bit layout
///
/// | Bits  | Name / Mnemonic | Meaning |
/// |-------|-----------------|---------|
/// | 0     | `P` (present)   | Valid entry if set |
/// | 1     | `RW`            | Writable if set |
/// | 2     | `US`            | User-mode accessible if set; clear = privileged |
/// | 3     | `PWT`           | Write-through caching |
/// | 4     | `PCD`           | Disable caching |
/// | 5     | `A`             | Accessed |
/// | 6     | `D`             | Dirty (PTE only) |
/// | 7     | `PS` / `PAT`    | 4 MiB page in a PDE (unused here), PAT in a PTE |
/// | 8     | `G`             | Global (PTE only) |
/// | 9–11  | OS avail        | Ignored by hardware |
/// | 12–31 | frame           | Physical frame number |
///
/// ### Not-present entries
/// When `present` is clear the hardware ignores every other bit. The paging
/// code still keeps a marker in the flag bits: unused directory slots are
/// written *writable*, and freshly created page tables mark every slot
/// *user*, which distinguishes "no mapping yet" from a zeroed frame.
///
/// ### Example
/// ```rust
/// # use kernel_vmem::addresses::FrameNumber;
/// # use kernel_vmem::PageEntryBits;
/// let e = PageEntryBits::kernel_rw().with_frame_number(FrameNumber::new(0x400));
/// assert!(e.present());
/// assert_eq!(e.into_bits(), 0x0040_0003);
/// ```
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PageEntryBits {
    /// Present (P, bit 0).
    ///
    /// Set if the entry points to a valid page table (PDE) or data frame
    /// (PTE). Clear implies a not-present entry; touching it faults.
    pub present: bool,

    /// Writable (RW, bit 1).
    pub writable: bool,

    /// User/Supervisor (US, bit 2).
    ///
    /// Set to allow user-mode access; clear restricts to supervisor only.
    pub user_access: bool,

    /// Page Write-Through (PWT, bit 3).
    pub write_through: bool,

    /// Page Cache Disable (PCD, bit 4).
    pub cache_disabled: bool,

    /// Accessed (A, bit 5). Set by the CPU on first access.
    pub accessed: bool,

    /// Dirty (D, bit 6). Set by the CPU on first write through a PTE.
    pub dirty: bool,

    /// Page Size (PS, bit 7) in a PDE; PAT in a PTE.
    ///
    /// This system never creates 4 MiB pages, so the paging code forces it
    /// clear in every PDE it writes.
    pub large_page: bool,

    /// Global (G, bit 8). PTE only.
    pub global_translation: bool,

    /// OS-available (bits 9..=11).
    #[bits(3)]
    pub os_available: u8,

    /// Frame number (bits 12..=31).
    #[bits(20)]
    frame_bits: u32,
}

impl PageEntryBits {
    #[inline]
    pub const fn set_frame_number(&mut self, frame: FrameNumber) {
        self.set_frame_bits(frame.as_u32());
    }

    #[inline]
    #[must_use]
    pub const fn with_frame_number(self, frame: FrameNumber) -> Self {
        self.with_frame_bits(frame.as_u32())
    }

    #[inline]
    #[must_use]
    pub const fn frame_number(&self) -> FrameNumber {
        FrameNumber::new(self.frame_bits())
    }

    #[inline]
    #[must_use]
    pub const fn physical_address(&self) -> PhysicalAddress {
        self.frame_number().base()
    }

    /// Present, writable, privileged (`0b011`).
    ///
    /// Used for every table and data frame the paging code installs.
    #[inline]
    #[must_use]
    pub const fn kernel_rw() -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_user_access(false)
    }

    /// Not present, writable, privileged (`0b010`).
    ///
    /// Marker for directory slots that have no table yet.
    #[inline]
    #[must_use]
    pub const fn absent_rw() -> Self {
        Self::new().with_writable(true)
    }

    /// Not present, user-flagged (`0b100`).
    ///
    /// Marker for the slots of a freshly created page table.
    #[inline]
    #[must_use]
    pub const fn absent_user() -> Self {
        Self::new().with_user_access(true)
    }
}
