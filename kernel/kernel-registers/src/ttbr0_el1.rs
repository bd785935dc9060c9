#[cfg(all(feature = "asm", target_arch = "aarch64"))]
use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalAddress;

/// TTBR0_EL1 — Translation Table Base Register 0.
///
/// Holds the physical base address of the level-0 translation table for the
/// low (userspace) half of the address space, plus the ASID tagging TLB
/// entries for this address space. Installing a new root table is a single
/// write of this register.
#[bitfield(u64)]
pub struct Ttbr0El1 {
    /// Bit 0 — CnP: Common not Private.
    ///
    /// When set, the translation tables may be shared with other PEs in the
    /// same Inner Shareable domain. Left clear for per-core roots.
    pub cnp: bool,

    /// Bits 1–47 — BADDR: level-0 table physical base, bits \[47:1\].
    ///
    /// With 4 KiB-aligned root tables, bits 11:1 of the stored value are
    /// zero. To get the full physical address: `base_phys = baddr << 1`.
    #[bits(47)]
    baddr: u64,

    /// Bits 48–63 — ASID for this address space (TCR_EL1.A1 = 0).
    #[bits(16)]
    pub asid: u16,
}

impl Ttbr0El1 {
    /// Create a `Ttbr0El1` value from a root-table physical base and ASID.
    ///
    /// `root_phys` must be 4 KiB-aligned.
    #[must_use]
    pub fn from_root_phys(root_phys: PhysicalAddress, asid: u16) -> Self {
        debug_assert_eq!(
            root_phys.as_u64() & 0xFFF,
            0,
            "root table base must be 4K-aligned"
        );
        let mut ttbr = Self::new();
        ttbr.set_baddr(root_phys.as_u64() >> 1);
        ttbr.set_asid(asid);
        ttbr
    }

    /// Return the full physical address of the root-table base.
    #[must_use]
    pub fn root_phys(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.baddr() << 1)
    }
}

#[cfg(all(feature = "asm", target_arch = "aarch64"))]
impl LoadRegisterUnsafe for Ttbr0El1 {
    unsafe fn load_unsafe() -> Self {
        let mut ttbr: u64;
        unsafe {
            core::arch::asm!("mrs {}, ttbr0_el1", out(reg) ttbr, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(ttbr)
    }
}

#[cfg(all(feature = "asm", target_arch = "aarch64"))]
impl StoreRegisterUnsafe for Ttbr0El1 {
    unsafe fn store_unsafe(self) {
        let ttbr = self.into_bits();
        unsafe {
            core::arch::asm!(
                "msr ttbr0_el1, {}",
                "isb",
                in(reg) ttbr,
                options(nostack, preserves_flags),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_root_base() {
        let root = PhysicalAddress::new(0x4000_7000);
        let ttbr = Ttbr0El1::from_root_phys(root, 7);
        assert_eq!(ttbr.root_phys(), root);
        assert_eq!(ttbr.asid(), 7);
        assert!(!ttbr.cnp());
    }
}
