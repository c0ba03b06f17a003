//! # Virtual and Physical Memory Address Types (32-bit)
//!
//! Strongly typed wrappers for raw memory addresses, physical frame numbers
//! and virtual page numbers used by the two-level paging code.
//!
//! ## Overview
//!
//! These types prevent mixing virtual and physical quantities at compile time
//! while remaining zero-cost wrappers around `u32` values.
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`PhysicalAddress`] | A byte address on the physical bus (RAM / MMIO). |
//! | [`FrameNumber`] | The index of a 4 KiB physical frame (`address >> 12`). |
//! | [`VirtualAddress`] | A byte address as seen by the CPU after translation. |
//! | [`VirtualPage`] | The page-aligned base of a 4 KiB virtual page. |
//!
//! All pages and frames are [`PAGE_SIZE`] bytes; the system does not use
//! large pages.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0x4000_1234);
//! let page = va.page();
//! assert_eq!(page.base().as_u32(), 0x4000_1000);
//! assert_eq!(va.page_offset(), 0x234);
//!
//! let frame = FrameNumber::new(1024);
//! assert_eq!(frame.base(), PhysicalAddress::new(0x0040_0000));
//! assert_eq!(frame.base().frame(), frame);
//! ```
//!
//! ## Design Notes
//!
//! - The types are `#[repr(transparent)]` and implement `Copy`, `Eq`, `Ord`, and
//!   `Hash`.
//! - All alignment and offset calculations are `const fn`.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod frame_number;
mod physical_address;
mod virtual_address;
mod virtual_page;

pub use frame_number::FrameNumber;
pub use physical_address::PhysicalAddress;
pub use virtual_address::VirtualAddress;
pub use virtual_page::VirtualPage;

/// Size of a page (virtual) and of a frame (physical) in bytes.
pub const PAGE_SIZE: u32 = 4096;

/// `log2(PAGE_SIZE)`: number of low address bits that form the in-page offset.
pub const PAGE_SHIFT: u32 = 12;

/// Mask selecting the in-page offset bits.
pub const PAGE_OFFSET_MASK: u32 = PAGE_SIZE - 1;

const _: () = assert!(1 << PAGE_SHIFT == PAGE_SIZE);

/// Number of pages (rounded up) required to hold `bytes` bytes.
///
/// ```rust
/// # use kernel_memory_addresses::pages_for;
/// assert_eq!(pages_for(0), 0);
/// assert_eq!(pages_for(1), 1);
/// assert_eq!(pages_for(4096), 1);
/// assert_eq!(pages_for(4097), 2);
/// ```
#[inline]
#[must_use]
pub const fn pages_for(bytes: u32) -> u32 {
    bytes.div_ceil(PAGE_SIZE)
}
