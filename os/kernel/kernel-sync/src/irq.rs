use core::marker::PhantomData;

/// Access to the local interrupt-enable flag.
///
/// Implemented by a zero-sized marker per platform so guards carry no
/// runtime state beyond the saved flag. The hardware implementation is
/// [`CpuInterrupts`]; software MMU models provide their own for host tests.
pub trait InterruptControl {
    /// Return `true` if maskable interrupts are currently enabled.
    fn interrupts_enabled() -> bool;

    /// Disable maskable interrupts (`cli`).
    fn disable_interrupts();

    /// Enable maskable interrupts (`sti`).
    fn enable_interrupts();
}

/// The executing CPU's `IF` flag.
///
/// # Platform
///
/// Uses `cli/sti` and `pushf/pop` and therefore targets `x86/x86_64`.
///
/// # Safety & Privilege
///
/// These operations must run in a context where `cli`/`sti` are legal
/// (kernel mode, ring 0). Calling from user space raises #GP.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[derive(Debug, Copy, Clone, Default)]
pub struct CpuInterrupts;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
impl CpuInterrupts {
    /// Bit 9 (`IF`) of `EFLAGS`/`RFLAGS`.
    const IF_BIT: usize = 1 << 9;

    /// Returns the current flags register (via `pushf/pop`).
    #[inline]
    #[must_use]
    pub fn flags() -> usize {
        let r: usize;
        #[cfg(target_arch = "x86")]
        unsafe {
            core::arch::asm!("pushfd; pop {}", out(reg) r, options(preserves_flags));
        }
        #[cfg(target_arch = "x86_64")]
        unsafe {
            core::arch::asm!("pushfq; pop {}", out(reg) r, options(preserves_flags));
        }
        r
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
impl InterruptControl for CpuInterrupts {
    #[inline]
    fn interrupts_enabled() -> bool {
        Self::flags() & Self::IF_BIT != 0
    }

    #[inline]
    fn disable_interrupts() {
        unsafe { core::arch::asm!("cli", options(nomem, nostack, preserves_flags)) }
    }

    #[inline]
    fn enable_interrupts() {
        unsafe { core::arch::asm!("sti", options(nomem, nostack, preserves_flags)) }
    }
}

/// RAII guard that disables interrupts on creation and restores them on drop.
///
/// `IrqGuard::new()` snapshots the interrupt-enable flag. If interrupts
/// were enabled, it disables them. On drop, it re-enables them **only** if
/// they were previously enabled, preserving the original state. Nested
/// guards therefore never turn interrupts on early.
///
/// # Examples
///
/// ```no_run
/// use kernel_sync::{CpuInterrupts, IrqGuard};
///
/// {
///     let _g = IrqGuard::<CpuInterrupts>::new(); // interrupts disabled here
///     // directory entry and its table are written together
/// }
/// // IF restored to its prior state
/// ```
#[must_use = "interrupts are restored as soon as the guard is dropped"]
pub struct IrqGuard<I: InterruptControl> {
    /// Whether interrupts were enabled when the guard was created.
    were_enabled: bool,
    _irq: PhantomData<I>,
}

impl<I: InterruptControl> Default for IrqGuard<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: InterruptControl> IrqGuard<I> {
    /// Disables interrupts if they are currently enabled and remembers the state.
    #[inline]
    pub fn new() -> Self {
        let enabled = I::interrupts_enabled();
        if enabled {
            I::disable_interrupts();
        }
        Self {
            were_enabled: enabled,
            _irq: PhantomData,
        }
    }

    /// Whether interrupts will be re-enabled when this guard drops.
    #[inline]
    #[must_use]
    pub const fn restores_enabled(&self) -> bool {
        self.were_enabled
    }
}

impl<I: InterruptControl> Drop for IrqGuard<I> {
    /// Restores interrupts only if they were previously enabled.
    fn drop(&mut self) {
        if self.were_enabled {
            I::enable_interrupts();
        }
    }
}

/// Run `f` with interrupts disabled, restoring the previous state afterwards.
#[inline]
pub fn without_interrupts<I: InterruptControl, R>(f: impl FnOnce() -> R) -> R {
    let _guard = IrqGuard::<I>::new();
    f()
}
