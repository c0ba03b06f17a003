//! # Page faults
//!
//! Decoding of the #PF error code and the outcome/error types of fault
//! resolution. The resolution itself lives in
//! [`Paging::handle_fault`](crate::Paging::handle_fault).

use crate::addresses::{FrameNumber, VirtualAddress};
use crate::frame_pool::FramePoolError;
use bitfield_struct::bitfield;

/// Interrupt vector of the page fault exception.
pub const PAGE_FAULT_VECTOR: u8 = 0x0E;

/// Page-fault error code layout (i386).
///
/// Each bit describes the condition that caused the page fault.
/// Reference: Intel SDM Vol. 3A, §6.15 "Page-Fault Exception (#PF)".
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PageFaultError {
    /// 0 = non-present page.
    /// 1 = protection violation (page present but access disallowed).
    pub present: bool, // bit 0

    /// 0 = read or execute.
    /// 1 = write access.
    pub write: bool, // bit 1

    /// 0 = supervisor (CPL 0–2).
    /// 1 = user mode (CPL 3).
    pub user: bool, // bit 2

    /// 1 = caused by reserved bit set in a paging structure.
    pub reserved_bit: bool, // bit 3

    /// 1 = instruction fetch (execute access).
    pub instruction_fetch: bool, // bit 4

    #[bits(27)]
    __: u32, // reserved / ignored bits
}

impl PageFaultError {
    /// Whether the fault was raised for a missing translation.
    #[inline]
    #[must_use]
    pub const fn is_not_present(&self) -> bool {
        !self.present()
    }

    #[must_use]
    pub const fn explain(&self) -> &'static str {
        if !self.present() {
            "Non-present page (page not mapped yet)"
        } else if self.instruction_fetch() {
            if self.user() {
                "User-mode instruction fetch on protected page"
            } else {
                "Kernel instruction fetch on protected page"
            }
        } else if self.write() {
            "Write access to protected page"
        } else {
            "Read access to protected page"
        }
    }
}

/// What a successful fault resolution changed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FaultOutcome {
    /// The directory slot was empty: a page table and a data frame were installed.
    TableAndPageMapped { table: FrameNumber, page: FrameNumber },
    /// The page table existed: a data frame was installed.
    PageMapped { page: FrameNumber },
    /// Nothing was missing; no frame was allocated.
    AlreadyMapped,
}

impl FaultOutcome {
    /// The data frame installed by this resolution, if any.
    #[inline]
    #[must_use]
    pub const fn page(&self) -> Option<FrameNumber> {
        match self {
            Self::TableAndPageMapped { page, .. } | Self::PageMapped { page } => Some(*page),
            Self::AlreadyMapped => None,
        }
    }
}

#[derive(Debug, thiserror::Error, Copy, Clone, PartialEq, Eq)]
pub enum FaultError {
    #[error("page fault while paging is disabled")]
    PagingDisabled,
    #[error("protection violation at {address}: {}", .code.explain())]
    ProtectionViolation {
        address: VirtualAddress,
        code: PageFaultError,
    },
    #[error("address {0} is not part of any registered VM pool")]
    IllegitimateAddress(VirtualAddress),
    #[error("address {0} lies in the recursive page table window")]
    RecursiveWindow(VirtualAddress),
    #[error("no frame available to resolve the fault: {0}")]
    OutOfFrames(#[from] FramePoolError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_bits() {
        let code = PageFaultError::from_bits(0b011);
        assert!(code.present());
        assert!(code.write());
        assert!(!code.user());
        assert!(!code.is_not_present());
        assert_eq!(code.explain(), "Write access to protected page");

        let code = PageFaultError::from_bits(0b110);
        assert!(code.is_not_present());
        assert!(code.user());
    }

    #[test]
    fn outcome_reports_installed_page() {
        let page = FrameNumber::new(9);
        assert_eq!(FaultOutcome::PageMapped { page }.page(), Some(page));
        assert_eq!(FaultOutcome::AlreadyMapped.page(), None);
    }
}
