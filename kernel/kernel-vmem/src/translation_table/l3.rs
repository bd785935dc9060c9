//! # Level 3 (leaf) translation table
//!
//! This module wraps the final level of the walk:
//!
//! - [`L3Index`]: index type for VA bits `[20:12]`.
//! - [`L3Entry`]: a single L3 entry; always a 4 KiB page leaf when valid.
//! - [`L3EntryKind`]: decoded view of an entry.
//! - [`TranslationTableL3`]: a 4 KiB-aligned array of 512 entries.
//!
//! ## Semantics
//!
//! At level 3 the type bit (bit 1) **must be set** for a valid mapping; a
//! valid entry with the bit clear is architecturally reserved and decodes
//! as no mapping. Page entries carry the same leaf attribute set as block
//! entries and a 4 KiB-aligned output base in bits 47:12.

use crate::attributes::{AccessPermission, Shareability};
use crate::translation_table::{TABLE_ENTRIES, TYPE_BIT, VALID_BIT};
use bitfield_struct::bitfield;
use kernel_memory_addresses::{Granule, PhysicalAddress, PhysicalPage, Size4K, VirtualAddress};
use kernel_registers::mair_el1::MemoryAttributeIndex;

/// **L3 entry** — overlays the raw 64-bit storage and the page form.
#[derive(Copy, Clone)]
#[repr(C)]
pub union L3Entry {
    /// Raw 64-bit storage of the entry.
    bits: u64,
    /// Page form: 4 KiB leaf (type bit = 1).
    page: PageDescriptor,
}

/// **4 KiB page descriptor** — maps a single page (level 3,
/// bits 1:0 = `0b11`).
///
/// - The output address uses bits **47:12** and must be **4 KiB aligned**.
/// - Attribute fields are identical to the block forms.
///
/// This is a terminal mapping (leaf).
#[bitfield(u64)]
pub struct PageDescriptor {
    /// Valid (bit 0).
    pub valid: bool,
    /// Type (bit 1): **must be 1** for the page form.
    #[bits(default = true)]
    page: bool,
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
    /// Output address bits **47:12** (4 KiB-aligned base).
    #[bits(36)]
    output_addr_47_12: u64,
    /// Reserved, must be zero (bits 48..51).
    #[bits(4)]
    __res0: u8,
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

impl PageDescriptor {
    /// Set the page base (must be 4 KiB-aligned).
    #[inline]
    pub const fn set_physical_address(&mut self, phys: PhysicalAddress) {
        debug_assert!(phys.is_aligned_to(Size4K::SIZE));
        self.set_output_addr_47_12(phys.as_u64() >> Size4K::SHIFT);
    }

    /// Get the page base.
    #[inline]
    #[must_use]
    pub const fn physical_address(self) -> PhysicalAddress {
        PhysicalAddress::new(self.output_addr_47_12() << Size4K::SHIFT)
    }
}

/// Index into the L3 table (derived from virtual-address bits `[20:12]`).
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct L3Index(usize);

/// Decoded L3 entry kind.
pub enum L3EntryKind {
    /// Leaf; holds the 4 KiB-aligned page base.
    Page4KiB(PhysicalPage<Size4K>, PageDescriptor),
}

/// The L3 (leaf) table: 512 entries, 4 KiB aligned.
#[repr(C, align(4096))]
pub struct TranslationTableL3 {
    entries: [L3Entry; TABLE_ENTRIES],
}

impl L3Index {
    /// Build an index from a virtual address (extracts bits `[20:12]`).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from(va: VirtualAddress) -> Self {
        Self::new(((va.as_u64() >> 12) & 0x1FF) as usize)
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

impl Default for L3Entry {
    #[inline]
    fn default() -> Self {
        Self::zero()
    }
}

impl L3Entry {
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

    /// Decode the entry into its semantic kind, or `None` if it maps
    /// nothing (invalid, or the reserved valid-with-block-type form).
    #[inline]
    #[must_use]
    pub const fn kind(self) -> Option<L3EntryKind> {
        if !self.is_valid() || unsafe { self.bits & TYPE_BIT == 0 } {
            return None;
        }
        let page = unsafe { self.page };
        let base = page.physical_address();
        Some(L3EntryKind::Page4KiB(
            PhysicalPage::<Size4K>::from_addr(base),
            page,
        ))
    }

    /// Create a 4 KiB page leaf.
    ///
    /// Sets `valid=1` and writes the page base address into the supplied
    /// attribute template. The base must be 4 KiB-aligned.
    #[inline]
    #[must_use]
    pub const fn make_page(page: PhysicalPage<Size4K>, mut attrs: PageDescriptor) -> Self {
        attrs.set_valid(true);
        attrs.set_physical_address(page.base());
        Self { page: attrs }
    }
}

impl From<PageDescriptor> for L3Entry {
    #[inline]
    fn from(page: PageDescriptor) -> Self {
        Self { page }
    }
}

impl TranslationTableL3 {
    /// Create a fully zeroed L3 table (all entries invalid).
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [L3Entry::zero(); TABLE_ENTRIES],
        }
    }

    /// Reset every entry to invalid.
    #[inline]
    pub fn zero(&mut self) {
        self.entries = [L3Entry::zero(); TABLE_ENTRIES];
    }

    /// Read an entry at `i`.
    ///
    /// Plain load; does not imply any TLB maintenance.
    #[inline]
    #[must_use]
    pub const fn get(&self, i: L3Index) -> L3Entry {
        self.entries[i.as_usize()]
    }

    /// Write an entry at `i` with a single 64-bit store.
    ///
    /// Caller is responsible for necessary TLB invalidations if this affects
    /// an active address space.
    #[inline]
    pub const fn set(&mut self, i: L3Index, e: L3Entry) {
        self.entries[i.as_usize()] = e;
    }

    /// Set the entry at `i` to [`L3Entry::zero`].
    #[inline]
    pub const fn set_zero(&mut self, i: L3Index) {
        self.set(i, L3Entry::zero());
    }

    /// Derive the L3 index from a virtual address.
    #[inline]
    #[must_use]
    pub const fn index_of(va: VirtualAddress) -> L3Index {
        L3Index::from(va)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MapFlags;
    use crate::attributes::LeafAttributes;

    #[test]
    fn l3_page_leaf_round_trip() {
        let attrs = LeafAttributes::from_flags(MapFlags::WRITE | MapFlags::EXEC);
        let frame = PhysicalPage::<Size4K>::from_addr(PhysicalAddress::new(0x1234_5000));
        let e = L3Entry::make_page(frame, attrs.to_page());
        match e.kind().unwrap() {
            L3EntryKind::Page4KiB(p, d) => {
                assert_eq!(p.base().as_u64(), 0x1234_5000);
                assert_eq!(d.into_bits() & 0b11, 0b11, "must be the page form");
                assert_eq!(d.access_permission(), AccessPermission::ReadWrite);
                assert!(!d.user_execute_never());
                assert!(d.privileged_execute_never());
            }
        }

        // reserved valid-with-block-type form decodes as no mapping
        assert!(L3Entry::from_bits(VALID_BIT).kind().is_none());
        assert!(L3Entry::zero().kind().is_none());
    }
}
