//! # Level 1 translation table
//!
//! This module wraps the second level of the walk:
//!
//! - [`L1Index`]: index type for VA bits `[38:30]`.
//! - [`L1Entry`]: a single L1 entry; may be a next-level pointer or a
//!   1 GiB block leaf.
//! - [`L1EntryKind`]: decoded view of an entry (next L2 table or block).
//! - [`TranslationTableL1`]: a 4 KiB-aligned array of 512 entries.
//!
//! ## Semantics
//!
//! At level 1, the type bit (bit 1) controls whether a valid entry points to
//! a level-2 table (`1`) or maps a 1 GiB block (`0`). Block entries carry
//! the full leaf attribute set and require 1 GiB physical alignment of the
//! output base. Table entries hold the physical base of the next-level
//! table (4 KiB aligned).
//!
//! ## Invariants & Safety Notes
//!
//! - [`TranslationTableL1`] is 4 KiB-aligned and contains exactly 512 entries.
//! - [`L1Entry::make_next`] produces the table form;
//!   [`L1Entry::make_block`] the block form.
//! - Callers must handle TLB maintenance after changing active mappings.
//! - Raw constructors perform no validation; use with care.

use crate::attributes::{AccessPermission, Shareability};
use crate::translation_table::{TABLE_ENTRIES, TYPE_BIT, TableDescriptor, VALID_BIT};
use bitfield_struct::bitfield;
use kernel_memory_addresses::{Granule, PhysicalAddress, PhysicalPage, Size1G, Size4K, VirtualAddress};
use kernel_registers::mair_el1::MemoryAttributeIndex;

/// **Borrowed view** into an L1 entry.
///
/// Returned by [`L1Entry::view`].
pub enum L1View {
    /// Table form (type bit set).
    Table(TableDescriptor),
    /// 1 GiB block leaf (type bit clear).
    Block1G(BlockDescriptor1G),
}

/// **L1 entry union** — overlays the table form and the 1 GiB block leaf
/// on the same 64-bit storage.
///
/// Use [`L1Entry::view`] or [`L1Entry::kind`] to obtain a typed view. These
/// inspect the type bit to decide which variant is active and return a safe
/// decoded value.
#[derive(Copy, Clone)]
#[repr(C)]
pub union L1Entry {
    /// Raw 64-bit storage of the entry.
    bits: u64,
    /// Table form: next-level L2 table (type bit = 1).
    table: TableDescriptor,
    /// Leaf form: 1 GiB block mapping (type bit = 0).
    block: BlockDescriptor1G,
}

/// **1 GiB block descriptor** — maps a single 1 GiB region (level 1,
/// bits 1:0 = `0b01`).
///
/// - The output address uses bits **47:30** and must be **1 GiB aligned**.
/// - Carries the full leaf attribute set: memory-attribute index, access
///   permission, shareability, access flag, not-global, and the two
///   execute-never bits.
///
/// This is a terminal mapping (leaf).
#[bitfield(u64)]
pub struct BlockDescriptor1G {
    /// Valid (bit 0).
    pub valid: bool,
    /// Type (bit 1): **must be 0** for the block form.
    #[bits(1)]
    __table_must_be_0: u8,
    /// AttrIndx (bits 2..4): MAIR_EL1 attribute slot.
    #[bits(3)]
    pub attr_index: MemoryAttributeIndex,
    /// NS (bit 5): non-secure output. Unused.
    pub non_secure: bool,
    /// AP\[2:1\] (bits 6..7): access permission.
    #[bits(2)]
    pub access_permission: AccessPermission,
    /// SH (bits 8..9): shareability domain.
    #[bits(2)]
    pub shareability: Shareability,
    /// AF (bit 10): access flag; clear faults on first access.
    pub access_flag: bool,
    /// nG (bit 11): not-global, TLB entries tagged with the ASID.
    pub not_global: bool,
    /// Reserved, must be zero (bits 12..29).
    #[bits(18)]
    __res0_low: u32,
    /// Output address bits **47:30** (1 GiB-aligned base).
    #[bits(18)]
    output_addr_47_30: u32,
    /// Reserved, must be zero (bits 48..51).
    #[bits(4)]
    __res0_high: u8,
    /// Contiguous hint (bit 52). Unused.
    pub contiguous: bool,
    /// PXN (bit 53): privileged execute-never.
    pub privileged_execute_never: bool,
    /// UXN (bit 54): unprivileged execute-never.
    pub user_execute_never: bool,
    /// Software-use bits (55..58).
    #[bits(4)]
    pub software: u8,
    /// Ignored by hardware (bits 59..63).
    #[bits(5)]
    __ignored: u8,
}

impl BlockDescriptor1G {
    /// Set the 1 GiB block base (must be 1 GiB-aligned).
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn set_physical_address(&mut self, phys: PhysicalAddress) {
        debug_assert!(phys.is_aligned_to(Size1G::SIZE));
        self.set_output_addr_47_30((phys.as_u64() >> Size1G::SHIFT) as u32);
    }

    /// Get the 1 GiB block base.
    #[inline]
    #[must_use]
    pub const fn physical_address(self) -> PhysicalAddress {
        PhysicalAddress::new((self.output_addr_47_30() as u64) << Size1G::SHIFT)
    }
}

/// Index into the L1 table (derived from virtual-address bits `[38:30]`).
///
/// This strongly-typed index avoids mixing levels and constrains the range
/// to `0..512` (checked in debug builds).
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct L1Index(usize);

/// Decoded L1 entry kind.
///
/// - [`NextTable`](L1EntryKind::NextTable): non-leaf; holds the
///   4 KiB-aligned L2 table base.
/// - [`Block1GiB`](L1EntryKind::Block1GiB): leaf; holds the 1 GiB-aligned
///   block base.
pub enum L1EntryKind {
    NextTable(PhysicalPage<Size4K>, TableDescriptor),
    Block1GiB(PhysicalPage<Size1G>, BlockDescriptor1G),
}

/// The L1 table: 512 entries, 4 KiB aligned.
#[repr(C, align(4096))]
pub struct TranslationTableL1 {
    entries: [L1Entry; TABLE_ENTRIES],
}

impl L1Index {
    /// Build an index from a virtual address (extracts bits `[38:30]`).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from(va: VirtualAddress) -> Self {
        Self::new(((va.as_u64() >> 30) & 0x1FF) as usize)
    }

    /// Construct from a raw index.
    ///
    /// ### Debug assertions
    /// - Asserts `v < 512` in debug builds.
    #[inline]
    #[must_use]
    pub const fn new(v: usize) -> Self {
        debug_assert!(v < TABLE_ENTRIES);
        Self(v)
    }

    /// Return the index as `usize` for table access.
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl Default for L1Entry {
    #[inline]
    fn default() -> Self {
        Self::zero()
    }
}

impl L1Entry {
    /// Create a zero (invalid) entry.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self { bits: 0 }
    }

    /// Construct union from raw `bits` (no validation).
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self { bits }
    }

    /// Extract raw `bits` back from the union.
    #[inline]
    #[must_use]
    pub const fn into_bits(self) -> u64 {
        unsafe { self.bits }
    }

    /// Whether the entry participates in translation.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        unsafe { self.bits & VALID_BIT != 0 }
    }

    /// **Typed read-only view** chosen by the type bit.
    ///
    /// This function is safe: it returns a view consistent with the bit.
    #[inline]
    #[must_use]
    pub const fn view(self) -> L1View {
        unsafe {
            if (self.bits & TYPE_BIT) != 0 {
                L1View::Table(self.table)
            } else {
                L1View::Block1G(self.block)
            }
        }
    }

    /// Decode the entry into its semantic kind, or `None` if not valid.
    #[inline]
    #[must_use]
    pub const fn kind(self) -> Option<L1EntryKind> {
        if !self.is_valid() {
            return None;
        }

        Some(match self.view() {
            L1View::Table(table) => L1EntryKind::NextTable(table.next_table(), table),
            L1View::Block1G(block) => {
                let base = block.physical_address();
                L1EntryKind::Block1GiB(PhysicalPage::<Size1G>::from_addr(base), block)
            }
        })
    }

    /// Create a table entry pointing to an L2 table.
    ///
    /// Sets `valid=1`, the table type bit, and the 4 KiB-aligned base.
    #[inline]
    #[must_use]
    pub const fn make_next(l2_page: PhysicalPage<Size4K>) -> Self {
        let mut table = TableDescriptor::new().with_valid(true);
        table.set_physical_address(l2_page.base());
        Self { table }
    }

    /// Create a 1 GiB block leaf.
    ///
    /// Sets `valid=1` and writes the block base address into the supplied
    /// attribute template. The base must be 1 GiB-aligned.
    #[inline]
    #[must_use]
    pub const fn make_block(page: PhysicalPage<Size1G>, mut attrs: BlockDescriptor1G) -> Self {
        attrs.set_valid(true);
        attrs.set_physical_address(page.base());
        Self { block: attrs }
    }
}

impl From<TableDescriptor> for L1Entry {
    #[inline]
    fn from(table: TableDescriptor) -> Self {
        Self { table }
    }
}

impl From<BlockDescriptor1G> for L1Entry {
    #[inline]
    fn from(block: BlockDescriptor1G) -> Self {
        Self { block }
    }
}

impl TranslationTableL1 {
    /// Create a fully zeroed L1 table (all entries invalid).
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [L1Entry::zero(); TABLE_ENTRIES],
        }
    }

    /// Reset every entry to invalid.
    #[inline]
    pub fn zero(&mut self) {
        self.entries = [L1Entry::zero(); TABLE_ENTRIES];
    }

    /// Read an entry at `i`.
    ///
    /// Plain load; does not imply any TLB maintenance.
    #[inline]
    #[must_use]
    pub const fn get(&self, i: L1Index) -> L1Entry {
        self.entries[i.as_usize()]
    }

    /// Write an entry at `i` with a single 64-bit store.
    ///
    /// Caller is responsible for necessary TLB invalidations if this affects
    /// an active address space.
    #[inline]
    pub const fn set(&mut self, i: L1Index, e: L1Entry) {
        self.entries[i.as_usize()] = e;
    }

    /// Set the entry at `i` to [`L1Entry::zero`].
    #[inline]
    pub const fn set_zero(&mut self, i: L1Index) {
        self.set(i, L1Entry::zero());
    }

    /// Derive the L1 index from a virtual address.
    #[inline]
    #[must_use]
    pub const fn index_of(va: VirtualAddress) -> L1Index {
        L1Index::from(va)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MapFlags;
    use crate::attributes::LeafAttributes;

    #[test]
    fn l1_table_vs_1g_block() {
        // next-level L2 table
        let l2 = PhysicalPage::<Size4K>::from_addr(PhysicalAddress::new(0x2000_0000));
        let e_tbl = L1Entry::make_next(l2);
        match e_tbl.kind().unwrap() {
            L1EntryKind::NextTable(p, d) => {
                assert_eq!(p.base().as_u64(), 0x2000_0000);
                assert_eq!(d.into_bits() & 0b11, 0b11, "must be the table form");
            }
            L1EntryKind::Block1GiB(_, _) => panic!("expected next table"),
        }

        // 1 GiB block leaf
        let attrs = LeafAttributes::from_flags(MapFlags::WRITE);
        let g1 = PhysicalPage::<Size1G>::from_addr(PhysicalAddress::new(0x8000_0000));
        let e_1g = L1Entry::make_block(g1, attrs.to_block_1g());
        match e_1g.kind().unwrap() {
            L1EntryKind::Block1GiB(p, d) => {
                assert_eq!(p.base().as_u64(), 0x8000_0000);
                assert_eq!(d.into_bits() & 0b11, 0b01, "must be the block form");
                assert_eq!(d.access_permission(), AccessPermission::ReadWrite);
            }
            L1EntryKind::NextTable(_, _) => panic!("expected 1 GiB block"),
        }
    }
}
