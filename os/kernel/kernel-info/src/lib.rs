//! # Kernel Memory Layout Configuration
//!
//! This crate is the single source of truth for the physical and virtual
//! memory layout the paging subsystem is configured with. The frame pools,
//! the identity-mapped shared region and the default virtual-memory pool
//! windows are all derived from the constants in [`memory`].
//!
//! ## Physical Memory Layout
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │  Low memory, kernel image       │
//! 0x0020_0000 ├─────────────────────────────────┤ KERNEL_POOL_START_FRAME (2 MiB)
//!             │  Kernel frame pool              │
//!             │  (page directories, tables)     │
//! 0x0040_0000 ├─────────────────────────────────┤ PROCESS_POOL_START_FRAME (4 MiB)
//!             │  Process frame pool             │  = SHARED_SIZE: everything below
//!             │  (data frames, demand tables)   │    is identity mapped
//! 0x00F0_0000 ├─────────────────────────────────┤ MEM_HOLE_START_FRAME (15 MiB)
//!             │  ISA memory hole (inaccessible) │
//! 0x0100_0000 ├─────────────────────────────────┤
//!             │  Process frame pool (cont.)     │
//! 0x0200_0000 └─────────────────────────────────┘ 32 MiB
//! ```
//!
//! ## Virtual Memory Layout
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │  Shared region (identity)       │
//! 0x0040_0000 ├─────────────────────────────────┤
//!             │  unmapped                       │
//! 0x2000_0000 ├─────────────────────────────────┤ CODE_POOL_BASE (512 MiB)
//!             │  Code VM pool                   │
//! 0x3000_0000 ├─────────────────────────────────┤
//!             │  unmapped                       │
//! 0x4000_0000 ├─────────────────────────────────┤ HEAP_POOL_BASE (1 GiB)
//!             │  Heap VM pool                   │
//! 0x5000_0000 ├─────────────────────────────────┤
//!             │  unmapped                       │
//! 0xFFC0_0000 ├─────────────────────────────────┤ directory slot 1023
//!             │  Recursive window (tables)      │
//! 0xFFFF_F000 │  Directory view                 │
//!             └─────────────────────────────────┘
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
