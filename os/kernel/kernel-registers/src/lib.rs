//! # Typed i386 Control Registers
//!
//! Models of the three control registers the paging code touches:
//!
//! - [`Cr0`](cr0::Cr0): holds the paging-enable bit (`PG`, bit 31).
//! - [`Cr2`](cr2::Cr2): the linear address of the most recent page fault.
//! - [`Cr3`](cr3::Cr3): the translation root (page directory base).
//!
//! The register values are plain bitfields and can be built and inspected
//! anywhere. Actually loading/storing them requires the `asm` feature and a
//! 32-bit x86 target; everything else (host tests, software MMU models) just
//! uses the value types.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(feature = "cr0")]
pub mod cr0;

#[cfg(feature = "cr2")]
pub mod cr2;

#[cfg(feature = "cr3")]
pub mod cr3;

pub trait LoadRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// Control register access is privileged and requires ring 0.
    unsafe fn load_unsafe() -> Self;
}

pub trait StoreRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// Control register access is privileged and requires ring 0, and writing
    /// CR0/CR3 changes how every subsequent memory access is translated.
    unsafe fn store_unsafe(self);
}
