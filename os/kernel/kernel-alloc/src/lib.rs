//! # Kernel Memory Allocation
//!
//! Allocators layered on top of [`kernel_vmem`]'s demand-paged address spaces:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │               Virtual Memory Pools                  │
//! │    • Page-granular regions of a virtual window      │
//! │    • Frames appear on first touch, leave on release │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ page faults, free_page
//! ┌─────────────────▼───────────────────────────────────┐
//! │         Paging context (kernel-vmem)                │
//! │    • Page directory / tables, fault handling        │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ get_frames / release_frames
//! ┌─────────────────▼───────────────────────────────────┐
//! │           Contiguous Frame Pools                    │
//! │    • 2-bit per frame bookkeeping in caller storage  │
//! │    • First-fit runs, release by head frame          │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Memory Layout Integration
//!
//! The default pools and windows come from `kernel-info`:
//!
//! ```text
//! Physical:                          Virtual (every address space):
//! 0 MiB ┌──────────────────┐         0 MiB    ┌──────────────────┐
//!       │ kernel image     │                  │ shared, identity │
//! 2 MiB ├──────────────────┤         4 MiB    ├──────────────────┤
//!       │ kernel pool      │                  │        ...       │
//! 4 MiB ├──────────────────┤         512 MiB  ├──────────────────┤
//!       │ process pool     │                  │ code pool        │
//!       │ (hole 15..16MiB) │         1 GiB    ├──────────────────┤
//!32 MiB └──────────────────┘                  │ heap pool        │
//!                                    4 GiB-4M ├──────────────────┤
//!                                             │ recursive window │
//!                                             └──────────────────┘
//! ```
//!
//! ## Concurrency
//!
//! Every mutation of a pool runs with interrupts disabled through
//! [`kernel_sync::IrqGuard`] and restores the previous interrupt state.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod frame_pool;
pub mod vm_pool;

pub use crate::frame_pool::{ContFramePool, FrameState};
pub use crate::vm_pool::{MAX_REGIONS, Region, VmPool, VmPoolError};
