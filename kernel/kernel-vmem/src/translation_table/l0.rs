//! # Level 0 (root) translation table
//!
//! This module wraps the root level of the walk:
//!
//! - [`L0Index`]: index type for VA bits `[47:39]`.
//! - [`L0Entry`]: a single L0 entry; only the table form exists here.
//! - [`L0EntryKind`]: decoded view of an entry.
//! - [`TranslationTableL0`]: a 4 KiB-aligned array of 512 entries.
//!
//! ## Semantics
//!
//! Level 0 cannot hold block leaves: a valid entry with the type bit clear
//! is architecturally reserved and decodes as no mapping. One L0 table
//! identifies an entire address space; its physical base is what gets
//! installed into `TTBR0_EL1`.

use crate::translation_table::{TABLE_ENTRIES, TYPE_BIT, TableDescriptor, VALID_BIT};
use kernel_memory_addresses::{PhysicalPage, Size4K, VirtualAddress};

/// **L0 entry** — overlays the raw 64-bit storage and the table form.
///
/// Use [`L0Entry::kind`] to obtain a decoded view. Storing/retrieving raw
/// bits is possible via `from_bits`/`into_bits`.
#[derive(Copy, Clone)]
#[repr(C)]
pub union L0Entry {
    /// Raw 64-bit storage of the entry.
    bits: u64,
    /// Table form: next-level L1 table.
    table: TableDescriptor,
}

/// Decoded L0 entry kind.
pub enum L0EntryKind {
    /// Non-leaf; holds the 4 KiB-aligned L1 table base.
    NextTable(PhysicalPage<Size4K>, TableDescriptor),
}

/// Index into the L0 table (derived from virtual-address bits `[47:39]`).
///
/// This strongly-typed index avoids mixing levels and constrains the range
/// to `0..512` (checked in debug builds).
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct L0Index(usize);

/// The L0 (root) table: 512 entries, 4 KiB aligned.
#[repr(C, align(4096))]
pub struct TranslationTableL0 {
    entries: [L0Entry; TABLE_ENTRIES],
}

impl L0Index {
    /// Build an index from a virtual address (extracts bits `[47:39]`).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from(va: VirtualAddress) -> Self {
        Self::new(((va.as_u64() >> 39) & 0x1FF) as usize)
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

impl Default for L0Entry {
    #[inline]
    fn default() -> Self {
        Self::zero()
    }
}

impl L0Entry {
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
    pub const fn kind(self) -> Option<L0EntryKind> {
        if !self.is_valid() || unsafe { self.bits & TYPE_BIT == 0 } {
            return None;
        }
        let table = unsafe { self.table };
        Some(L0EntryKind::NextTable(table.next_table(), table))
    }

    /// Create a table entry pointing to an L1 table.
    ///
    /// Sets `valid=1`, the table type bit, and the 4 KiB-aligned base.
    #[inline]
    #[must_use]
    pub const fn make_next(l1_page: PhysicalPage<Size4K>) -> Self {
        let mut table = TableDescriptor::new().with_valid(true);
        table.set_physical_address(l1_page.base());
        Self { table }
    }
}

impl From<TableDescriptor> for L0Entry {
    #[inline]
    fn from(table: TableDescriptor) -> Self {
        Self { table }
    }
}

impl TranslationTableL0 {
    /// Create a fully zeroed L0 table (all entries invalid).
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [L0Entry::zero(); TABLE_ENTRIES],
        }
    }

    /// Reset every entry to invalid.
    #[inline]
    pub fn zero(&mut self) {
        self.entries = [L0Entry::zero(); TABLE_ENTRIES];
    }

    /// Read an entry at `i`.
    ///
    /// Plain load; does not imply any TLB maintenance.
    #[inline]
    #[must_use]
    pub const fn get(&self, i: L0Index) -> L0Entry {
        self.entries[i.as_usize()]
    }

    /// Write an entry at `i` with a single 64-bit store.
    ///
    /// Caller is responsible for necessary TLB invalidations if this affects
    /// an active address space.
    #[inline]
    pub const fn set(&mut self, i: L0Index, e: L0Entry) {
        self.entries[i.as_usize()] = e;
    }

    /// Set the entry at `i` to [`L0Entry::zero`].
    #[inline]
    pub const fn set_zero(&mut self, i: L0Index) {
        self.set(i, L0Entry::zero());
    }

    /// Derive the L0 index from a virtual address.
    #[inline]
    #[must_use]
    pub const fn index_of(va: VirtualAddress) -> L0Index {
        L0Index::from(va)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_memory_addresses::PhysicalAddress;

    #[test]
    fn l0_table_entry() {
        let l1 = PhysicalPage::<Size4K>::from_addr(PhysicalAddress::new(0x2000_0000));
        let e = L0Entry::make_next(l1);
        match e.kind().unwrap() {
            L0EntryKind::NextTable(p, d) => {
                assert_eq!(p.base().as_u64(), 0x2000_0000);
                assert_eq!(d.into_bits() & 0b11, 0b11);
            }
        }

        // reserved valid-with-block-type form decodes as no mapping
        assert!(L0Entry::from_bits(VALID_BIT).kind().is_none());
        assert!(L0Entry::zero().kind().is_none());
    }
}
