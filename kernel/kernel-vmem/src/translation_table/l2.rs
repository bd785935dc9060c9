//! # Level 2 translation table
//!
//! This module wraps the third level of the walk:
//!
//! - [`L2Index`]: index type for VA bits `[29:21]`.
//! - [`L2Entry`]: a single L2 entry; may be a next-level pointer or a
//!   2 MiB block leaf.
//! - [`L2EntryKind`]: decoded view of an entry (next L3 table or block).
//! - [`TranslationTableL2`]: a 4 KiB-aligned array of 512 entries.
//!
//! ## Semantics
//!
//! At level 2, the type bit (bit 1) controls whether a valid entry points to
//! a level-3 table (`1`) or maps a 2 MiB block (`0`). Block entries carry
//! the full leaf attribute set and require 2 MiB physical alignment of the
//! output base.

use crate::attributes::{AccessPermission, Shareability};
use crate::translation_table::{TABLE_ENTRIES, TYPE_BIT, TableDescriptor, VALID_BIT};
use bitfield_struct::bitfield;
use kernel_memory_addresses::{Granule, PhysicalAddress, PhysicalPage, Size2M, Size4K, VirtualAddress};
use kernel_registers::mair_el1::MemoryAttributeIndex;

/// **Borrowed view** into an L2 entry.
///
/// Returned by [`L2Entry::view`].
pub enum L2View {
    /// Table form (type bit set).
    Table(TableDescriptor),
    /// 2 MiB block leaf (type bit clear).
    Block2M(BlockDescriptor2M),
}

/// **L2 entry union** — overlays the table form and the 2 MiB block leaf
/// on the same 64-bit storage.
#[derive(Copy, Clone)]
#[repr(C)]
pub union L2Entry {
    /// Raw 64-bit storage of the entry.
    bits: u64,
    /// Table form: next-level L3 table (type bit = 1).
    table: TableDescriptor,
    /// Leaf form: 2 MiB block mapping (type bit = 0).
    block: BlockDescriptor2M,
}

/// **2 MiB block descriptor** — maps a single 2 MiB region (level 2,
/// bits 1:0 = `0b01`).
///
/// - The output address uses bits **47:21** and must be **2 MiB aligned**.
/// - Attribute fields are identical to the 1 GiB block form.
///
/// This is a terminal mapping (leaf).
#[bitfield(u64)]
pub struct BlockDescriptor2M {
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
    /// Reserved, must be zero (bits 12..20).
    #[bits(9)]
    __res0_low: u16,
    /// Output address bits **47:21** (2 MiB-aligned base).
    #[bits(27)]
    output_addr_47_21: u32,
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

impl BlockDescriptor2M {
    /// Set the 2 MiB block base (must be 2 MiB-aligned).
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn set_physical_address(&mut self, phys: PhysicalAddress) {
        debug_assert!(phys.is_aligned_to(Size2M::SIZE));
        self.set_output_addr_47_21((phys.as_u64() >> Size2M::SHIFT) as u32);
    }

    /// Get the 2 MiB block base.
    #[inline]
    #[must_use]
    pub const fn physical_address(self) -> PhysicalAddress {
        PhysicalAddress::new((self.output_addr_47_21() as u64) << Size2M::SHIFT)
    }
}

/// Index into the L2 table (derived from virtual-address bits `[29:21]`).
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct L2Index(usize);

/// Decoded L2 entry kind.
///
/// - [`NextTable`](L2EntryKind::NextTable): non-leaf; holds the
///   4 KiB-aligned L3 table base.
/// - [`Block2MiB`](L2EntryKind::Block2MiB): leaf; holds the 2 MiB-aligned
///   block base.
pub enum L2EntryKind {
    NextTable(PhysicalPage<Size4K>, TableDescriptor),
    Block2MiB(PhysicalPage<Size2M>, BlockDescriptor2M),
}

/// The L2 table: 512 entries, 4 KiB aligned.
#[repr(C, align(4096))]
pub struct TranslationTableL2 {
    entries: [L2Entry; TABLE_ENTRIES],
}

impl L2Index {
    /// Build an index from a virtual address (extracts bits `[29:21]`).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from(va: VirtualAddress) -> Self {
        Self::new(((va.as_u64() >> 21) & 0x1FF) as usize)
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

impl Default for L2Entry {
    #[inline]
    fn default() -> Self {
        Self::zero()
    }
}

impl L2Entry {
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
    pub const fn view(self) -> L2View {
        unsafe {
            if (self.bits & TYPE_BIT) != 0 {
                L2View::Table(self.table)
            } else {
                L2View::Block2M(self.block)
            }
        }
    }

    /// Decode the entry into its semantic kind, or `None` if not valid.
    #[inline]
    #[must_use]
    pub const fn kind(self) -> Option<L2EntryKind> {
        if !self.is_valid() {
            return None;
        }

        Some(match self.view() {
            L2View::Table(table) => L2EntryKind::NextTable(table.next_table(), table),
            L2View::Block2M(block) => {
                let base = block.physical_address();
                L2EntryKind::Block2MiB(PhysicalPage::<Size2M>::from_addr(base), block)
            }
        })
    }

    /// Create a table entry pointing to an L3 table.
    ///
    /// Sets `valid=1`, the table type bit, and the 4 KiB-aligned base.
    #[inline]
    #[must_use]
    pub const fn make_next(l3_page: PhysicalPage<Size4K>) -> Self {
        let mut table = TableDescriptor::new().with_valid(true);
        table.set_physical_address(l3_page.base());
        Self { table }
    }

    /// Create a 2 MiB block leaf.
    ///
    /// Sets `valid=1` and writes the block base address into the supplied
    /// attribute template. The base must be 2 MiB-aligned.
    #[inline]
    #[must_use]
    pub const fn make_block(page: PhysicalPage<Size2M>, mut attrs: BlockDescriptor2M) -> Self {
        attrs.set_valid(true);
        attrs.set_physical_address(page.base());
        Self { block: attrs }
    }
}

impl From<TableDescriptor> for L2Entry {
    #[inline]
    fn from(table: TableDescriptor) -> Self {
        Self { table }
    }
}

impl From<BlockDescriptor2M> for L2Entry {
    #[inline]
    fn from(block: BlockDescriptor2M) -> Self {
        Self { block }
    }
}

impl TranslationTableL2 {
    /// Create a fully zeroed L2 table (all entries invalid).
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [L2Entry::zero(); TABLE_ENTRIES],
        }
    }

    /// Reset every entry to invalid.
    #[inline]
    pub fn zero(&mut self) {
        self.entries = [L2Entry::zero(); TABLE_ENTRIES];
    }

    /// Read an entry at `i`.
    ///
    /// Plain load; does not imply any TLB maintenance.
    #[inline]
    #[must_use]
    pub const fn get(&self, i: L2Index) -> L2Entry {
        self.entries[i.as_usize()]
    }

    /// Write an entry at `i` with a single 64-bit store.
    ///
    /// Caller is responsible for necessary TLB invalidations if this affects
    /// an active address space.
    #[inline]
    pub const fn set(&mut self, i: L2Index, e: L2Entry) {
        self.entries[i.as_usize()] = e;
    }

    /// Set the entry at `i` to [`L2Entry::zero`].
    #[inline]
    pub const fn set_zero(&mut self, i: L2Index) {
        self.set(i, L2Entry::zero());
    }

    /// Derive the L2 index from a virtual address.
    #[inline]
    #[must_use]
    pub const fn index_of(va: VirtualAddress) -> L2Index {
        L2Index::from(va)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MapFlags;
    use crate::attributes::LeafAttributes;

    #[test]
    fn l2_table_vs_2m_block() {
        let l3 = PhysicalPage::<Size4K>::from_addr(PhysicalAddress::new(0x1234_5000));
        let e_tbl = L2Entry::make_next(l3);
        match e_tbl.kind().unwrap() {
            L2EntryKind::NextTable(p, d) => {
                assert_eq!(p.base().as_u64(), 0x1234_5000);
                assert_eq!(d.into_bits() & 0b11, 0b11, "must be the table form");
            }
            L2EntryKind::Block2MiB(_, _) => panic!("expected next table"),
        }

        let attrs = LeafAttributes::from_flags(MapFlags::empty());
        let m2 = PhysicalPage::<Size2M>::from_addr(PhysicalAddress::new(0x0040_0000));
        let e_2m = L2Entry::make_block(m2, attrs.to_block_2m());
        match e_2m.kind().unwrap() {
            L2EntryKind::Block2MiB(p, d) => {
                assert_eq!(p.base().as_u64(), 0x0040_0000);
                assert_eq!(d.into_bits() & 0b11, 0b01, "must be the block form");
                assert_eq!(d.access_permission(), AccessPermission::ReadOnly);
            }
            L2EntryKind::NextTable(_, _) => panic!("expected 2 MiB block"),
        }
    }
}
