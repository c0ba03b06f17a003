//! # Kernel synchronization primitives
//!
//! The paging code runs on a single hardware thread. Its only hazard is
//! re-entrancy: a page fault or timer interrupt that arrives while a
//! directory, table, registry or region array is half-written. Every such
//! mutation therefore runs inside an [`IrqGuard`], which disables interrupts
//! and restores the *previous* state on drop, so guards nest correctly.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod irq;

pub use irq::{InterruptControl, IrqGuard, without_interrupts};

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub use irq::CpuInterrupts;
