//! # Translation Tables
//!
//! Typed wrappers for the four table levels of the VMSAv8-A walk (4 KiB
//! granule):
//!
//! - [`l0`]: root level, table entries only.
//! - [`l1`]: table entries or 1 GiB block leaves.
//! - [`l2`]: table entries or 2 MiB block leaves.
//! - [`l3`]: 4 KiB page leaves only.
//!
//! Each module defines a strongly-typed index (derived from the matching
//! virtual-address bit slice), an entry union over the raw 64-bit storage,
//! a decoded entry-kind enum, and the 4 KiB-aligned 512-entry table itself.
//!
//! Unlike x86-64, the **table** form of an entry is bit-identical at every
//! level that supports it, so a single [`TableDescriptor`] serves L0–L2.

pub mod l0;
pub mod l1;
pub mod l2;
pub mod l3;

use crate::translation_table::l0::L0Index;
use crate::translation_table::l1::L1Index;
use crate::translation_table::l2::L2Index;
use crate::translation_table::l3::L3Index;
use bitfield_struct::bitfield;
use kernel_memory_addresses::{
    Granule, PhysicalAddress, PhysicalPage, Size1G, Size2M, Size4K, VirtualAddress,
};

/// Hardware **valid** bit position shared across levels (bit 0).
pub(crate) const VALID_BIT: u64 = 1 << 0;

/// Hardware **type** bit position shared across levels (bit 1).
///
/// - At L0–L2: set means *table*, clear means *block* (invalid at L0).
/// - At L3: must be set for a page descriptor; clear is reserved.
pub(crate) const TYPE_BIT: u64 = 1 << 1;

/// Number of entries in one translation table page.
pub const TABLE_ENTRIES: usize = kernel_info::memory::TABLE_ENTRIES;

/// Bytes of virtual address space covered by one L0 entry (512 GiB).
pub const L0_ENTRY_SPAN: u64 = Size1G::SIZE * TABLE_ENTRIES as u64;

/// Bytes of virtual address space covered by one L1 entry (1 GiB).
pub const L1_ENTRY_SPAN: u64 = Size1G::SIZE;

/// Bytes of virtual address space covered by one L2 entry (2 MiB).
pub const L2_ENTRY_SPAN: u64 = Size2M::SIZE;

/// **Table descriptor** — points to the next-level translation table
/// (bits 1:0 = `0b11`; valid at levels 0–2).
///
/// - The next-level table physical address lives in bits **47:12**
///   (4 KiB-aligned).
/// - The hierarchical-control fields (`APTable`, `XNTable`, `PXNTable`,
///   `NSTable`) are left clear: permissions are decided entirely at the
///   leaf.
#[bitfield(u64)]
pub struct TableDescriptor {
    /// Valid (bit 0): entry participates in translation if set.
    pub valid: bool,
    /// Type (bit 1): **must be 1** for the table form.
    #[bits(default = true)]
    table: bool,
    /// Ignored by hardware in the table form (bits 2..11).
    #[bits(10)]
    __ignored_low: u16,
    /// Next-level table physical address (bits 12..47, 4 KiB-aligned).
    #[bits(36)]
    next_table_addr: u64,
    /// Reserved, must be zero (bits 48..50).
    #[bits(3)]
    __res0: u8,
    /// Ignored (bits 51..58).
    #[bits(8)]
    __ignored_high: u8,
    /// PXNTable (bit 59): hierarchical privileged-execute-never. Unused.
    pub pxn_table: bool,
    /// XNTable (bit 60): hierarchical execute-never. Unused.
    pub xn_table: bool,
    /// APTable (bits 61..62): hierarchical access-permission limit. Unused.
    #[bits(2)]
    pub ap_table: u8,
    /// NSTable (bit 63): security-state split. Unused.
    pub ns_table: bool,
}

impl TableDescriptor {
    /// Set the next-level table base (4 KiB-aligned).
    #[inline]
    pub const fn set_physical_address(&mut self, phys: PhysicalAddress) {
        debug_assert!(phys.is_aligned_to(Size4K::SIZE));
        self.set_next_table_addr(phys.as_u64() >> Size4K::SHIFT);
    }

    /// Get the next-level table base (4 KiB-aligned).
    #[inline]
    #[must_use]
    pub const fn physical_address(self) -> PhysicalAddress {
        PhysicalAddress::new(self.next_table_addr() << Size4K::SHIFT)
    }

    /// The next-level table as a typed physical page.
    #[inline]
    #[must_use]
    pub const fn next_table(self) -> PhysicalPage<Size4K> {
        PhysicalPage::<Size4K>::from_addr(self.physical_address())
    }
}

/// Split a virtual address into the four per-level table indices.
#[inline]
#[must_use]
pub const fn split_indices(va: VirtualAddress) -> (L0Index, L1Index, L2Index, L3Index) {
    (
        L0Index::from(va),
        L1Index::from(va),
        L2Index::from(va),
        L3Index::from(va),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_ok() {
        let va = VirtualAddress::new(0x0000_8888_0123_4567);
        let (i0, i1, i2, i3) = split_indices(va);
        assert!(i0.as_usize() < TABLE_ENTRIES);
        assert!(i1.as_usize() < TABLE_ENTRIES);
        assert!(i2.as_usize() < TABLE_ENTRIES);
        assert!(i3.as_usize() < TABLE_ENTRIES);
    }

    #[test]
    fn table_descriptor_addr_round_trip() {
        let mut d = TableDescriptor::new().with_valid(true);
        d.set_physical_address(PhysicalAddress::new(0x4000_3000));
        assert_eq!(d.physical_address().as_u64(), 0x4000_3000);
        assert_eq!(d.into_bits() & 0b11, 0b11, "valid+table bits");
    }
}
