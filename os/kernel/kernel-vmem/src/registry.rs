//! # VM pool registry
//!
//! Every virtual memory pool announces its window here. The fault handler
//! only backs an address with memory if some registered window accepts it.
//!
//! Pools never hold a reference into the registry: registration returns a
//! [`PoolHandle`] (an index into an append-only table), and lookups go the
//! other way through [`VmPoolRegistry::find_legitimate`].

use crate::addresses::VirtualAddress;
use alloc::vec::Vec;

/// The virtual window of one VM pool.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PoolExtent {
    pub base: VirtualAddress,
    pub size: u32,
}

/// Stable identifier of a registered pool.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolHandle(usize);

/// Ordered list of registered pool windows.
#[derive(Debug, Default)]
pub struct VmPoolRegistry {
    pools: Vec<PoolExtent>,
}

impl PoolExtent {
    #[must_use]
    pub const fn new(base: VirtualAddress, size: u32) -> Self {
        Self { base, size }
    }

    /// Whether the fault handler may back `address` for this pool.
    ///
    /// Accepts `base <= address <= base + size`. The upper bound is
    /// inclusive: the address one past the window is still accepted.
    #[must_use]
    pub const fn is_legitimate(&self, address: VirtualAddress) -> bool {
        let a = address.as_u32();
        let base = self.base.as_u32();
        a >= base && a - base <= self.size
    }
}

impl PoolHandle {
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl VmPoolRegistry {
    #[must_use]
    pub const fn new() -> Self {
        Self { pools: Vec::new() }
    }

    /// Append a pool window. Windows are never removed.
    pub fn register(&mut self, extent: PoolExtent) -> PoolHandle {
        self.pools.push(extent);
        PoolHandle(self.pools.len() - 1)
    }

    #[must_use]
    pub fn get(&self, handle: PoolHandle) -> Option<&PoolExtent> {
        self.pools.get(handle.0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PoolHandle, &PoolExtent)> + '_ {
        self.pools
            .iter()
            .enumerate()
            .map(|(i, e)| (PoolHandle(i), e))
    }

    /// The first pool, in registration order, that accepts `address`.
    #[must_use]
    pub fn find_legitimate(&self, address: VirtualAddress) -> Option<PoolHandle> {
        self.iter()
            .find(|(_, e)| e.is_legitimate(address))
            .map(|(h, _)| h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upper_bound_is_inclusive() {
        let e = PoolExtent::new(VirtualAddress::new(0x4000_0000), 0x1000_0000);
        assert!(e.is_legitimate(VirtualAddress::new(0x4000_0000)));
        assert!(e.is_legitimate(VirtualAddress::new(0x4FFF_FFFF)));
        assert!(e.is_legitimate(VirtualAddress::new(0x5000_0000)));
        assert!(!e.is_legitimate(VirtualAddress::new(0x5000_0001)));
        assert!(!e.is_legitimate(VirtualAddress::new(0x3FFF_FFFF)));
    }

    #[test]
    fn lookup_in_registration_order() {
        let mut r = VmPoolRegistry::new();
        assert!(r.is_empty());
        let code = r.register(PoolExtent::new(VirtualAddress::new(0x2000_0000), 0x1000_0000));
        let heap = r.register(PoolExtent::new(VirtualAddress::new(0x4000_0000), 0x1000_0000));
        assert_eq!(r.len(), 2);
        assert_eq!(r.find_legitimate(VirtualAddress::new(0x2000_1000)), Some(code));
        assert_eq!(r.find_legitimate(VirtualAddress::new(0x4000_1000)), Some(heap));
        assert_eq!(r.find_legitimate(VirtualAddress::new(0x8000_0000)), None);
        assert_eq!(r.get(heap).map(|e| e.base), Some(VirtualAddress::new(0x4000_0000)));
    }
}
