//! # Address Space (AArch64, L0-rooted)
//!
//! Strongly-typed helpers to build and manipulate a **single** virtual
//! address space (tree rooted at a level-0 table). This complements the
//! typed table layers ([`TranslationTableL0`] … [`TranslationTableL3`]).
//!
//! ## Highlights
//!
//! - [`AddressSpace::map_range`] / [`AddressSpace::map_range_huge`] to
//!   install page- or block-granularity mappings over a range.
//! - [`AddressSpace::unmap_range`] / [`AddressSpace::unmap_range_huge`] to
//!   clear them again, skipping unpopulated subtrees.
//! - [`AddressSpace::translate`] to resolve a VA to a PA (handles blocks).
//! - [`AddressSpace::free_tree`] to return the whole tree to the allocator.
//! - [`AddressSpace::activate`] to install the root into `TTBR0_EL1`
//!   (aarch64 targets).
//!
//! ## Design
//!
//! - The tree lives in raw physical pages reached through a [`PhysMapper`];
//!   ownership of a table belongs exclusively to its parent entry.
//! - Descriptors are assembled in a local value and published with a single
//!   64-bit store; a concurrently walking MMU never observes a half-built
//!   descriptor.
//! - Missing intermediate tables are created on demand while mapping.
//!   Failure to obtain a frame is **fatal**: translation-table construction
//!   cannot be unwound safely, so the allocator running dry aborts instead
//!   of surfacing an error value.
//!
//! ## Safety
//!
//! - Exactly one logical owner may mutate a given tree at a time; callers
//!   serialize access and perform all TLB maintenance (none is issued here).
//! - The provided [`PhysMapper`] must yield **writable** references to
//!   table frames.

use crate::attributes::LeafAttributes;
use crate::translation_table::l0::{L0Entry, L0EntryKind, L0Index, TranslationTableL0};
use crate::translation_table::l1::{
    BlockDescriptor1G, L1Entry, L1EntryKind, L1Index, TranslationTableL1,
};
use crate::translation_table::l2::{
    BlockDescriptor2M, L2Entry, L2EntryKind, L2Index, TranslationTableL2,
};
use crate::translation_table::l3::{L3Entry, L3EntryKind, L3Index, PageDescriptor, TranslationTableL3};
use crate::translation_table::{
    L0_ENTRY_SPAN, L1_ENTRY_SPAN, L2_ENTRY_SPAN, TABLE_ENTRIES, split_indices,
};
use crate::{FrameAlloc, MapFlags, PhysMapper};
use kernel_memory_addresses::{
    Granule, PhysicalAddress, PhysicalPage, Size1G, Size2M, Size4K, VirtualAddress,
};

#[cfg(target_arch = "aarch64")]
use kernel_registers::ttbr0_el1::Ttbr0El1;
#[cfg(target_arch = "aarch64")]
use kernel_registers::{LoadRegisterUnsafe, StoreRegisterUnsafe};

/// Handle to a single, concrete address space.
pub struct AddressSpace<'m, M: PhysMapper> {
    root: PhysicalPage<Size4K>, // L0 frame
    mapper: &'m M,
}

/// The L0 root page for an [`AddressSpace`].
pub type RootPage = PhysicalPage<Size4K>;

/// Error returned by [`AddressSpace::translate`] for unmapped addresses.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslateError {
    /// No leaf descriptor covers the requested virtual address.
    #[error("virtual address is not mapped")]
    NoMapping,
}

/// The leaf descriptor that terminated a successful
/// [`translate`](AddressSpace::translate), at whichever level the walk
/// stopped.
#[derive(Copy, Clone)]
pub enum LeafEntry {
    /// 1 GiB block mapping installed at level 1.
    Block1GiB(BlockDescriptor1G),
    /// 2 MiB block mapping installed at level 2.
    Block2MiB(BlockDescriptor2M),
    /// 4 KiB page mapping installed at level 3.
    Page4KiB(PageDescriptor),
}

impl LeafEntry {
    /// Whether the mapping permits writes.
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        match self {
            Self::Block1GiB(d) => d.access_permission().is_writable(),
            Self::Block2MiB(d) => d.access_permission().is_writable(),
            Self::Page4KiB(d) => d.access_permission().is_writable(),
        }
    }

    /// Whether EL0 may execute from the mapping.
    #[must_use]
    pub const fn is_user_executable(&self) -> bool {
        match self {
            Self::Block1GiB(d) => !d.user_execute_never(),
            Self::Block2MiB(d) => !d.user_execute_never(),
            Self::Page4KiB(d) => !d.user_execute_never(),
        }
    }
}

/// Advance past the remainder of a missing entry's span.
///
/// Returns the span-aligned successor of `va` and the page count reduced by
/// exactly the pages the missing subtree covered within the remaining range
/// (saturating, since the range may end inside the span).
const fn skip_span(va: VirtualAddress, remaining: u64, span: u64) -> (VirtualAddress, u64) {
    let next = (va.as_u64() & !(span - 1)) + span;
    let skipped_pages = (next - va.as_u64()) / Size4K::SIZE;
    (
        VirtualAddress::new(next),
        remaining.saturating_sub(skipped_pages),
    )
}

impl<'m, M: PhysMapper> AddressSpace<'m, M> {
    /// Wrap an existing root table (allocated and zeroed by the caller).
    #[inline]
    pub const fn from_root(mapper: &'m M, root: RootPage) -> Self {
        Self { root, mapper }
    }

    /// Allocate and zero a fresh root table, returning the address space
    /// rooted at it.
    ///
    /// # Panics
    /// Aborts if the frame allocator is exhausted.
    pub fn create<A: FrameAlloc>(mapper: &'m M, alloc: &mut A) -> Self {
        let root = alloc_table_page(alloc);
        let aspace = Self::from_root(mapper, root);
        aspace.l0_mut().zero();
        aspace
    }

    /// View the **currently active** low-half address space by reading
    /// `TTBR0_EL1`.
    ///
    /// # Safety
    /// - Must run at EL1 with the MMU enabled.
    /// - Assumes `TTBR0_EL1` points at a valid L0 frame.
    #[cfg(target_arch = "aarch64")]
    #[inline]
    pub unsafe fn from_current(mapper: &'m M) -> Self {
        let ttbr = unsafe { Ttbr0El1::load_unsafe() };
        Self::from_root(mapper, RootPage::from_addr(ttbr.root_phys()))
    }

    /// Install this address space's root into `TTBR0_EL1` with `asid`.
    ///
    /// # Safety
    /// You must ensure the tree is complete enough for the code that runs
    /// next, and perform the required TLB maintenance for the outgoing
    /// address space (none is issued here).
    #[cfg(target_arch = "aarch64")]
    #[inline]
    pub unsafe fn activate(&self, asid: u16) {
        unsafe { Ttbr0El1::from_root_phys(self.root.base(), asid).store_unsafe() };
    }

    /// Physical page of the L0 root table.
    #[inline]
    #[must_use]
    pub const fn root_page(&self) -> RootPage {
        self.root
    }

    /// Borrow the root [`TranslationTableL0`] as a typed table.
    #[inline]
    fn l0_mut(&self) -> &mut TranslationTableL0 {
        unsafe { self.mapper.phys_to_mut(self.root.base()) }
    }

    /// Borrow a [`TranslationTableL1`] in this frame.
    #[inline]
    fn l1_mut(&self, page: PhysicalPage<Size4K>) -> &mut TranslationTableL1 {
        unsafe { self.mapper.phys_to_mut(page.base()) }
    }

    /// Borrow a [`TranslationTableL2`] in this frame.
    #[inline]
    fn l2_mut(&self, page: PhysicalPage<Size4K>) -> &mut TranslationTableL2 {
        unsafe { self.mapper.phys_to_mut(page.base()) }
    }

    /// Borrow a [`TranslationTableL3`] in this frame.
    #[inline]
    fn l3_mut(&self, page: PhysicalPage<Size4K>) -> &mut TranslationTableL3 {
        unsafe { self.mapper.phys_to_mut(page.base()) }
    }

    /// One allocating step of the walk: L0 entry for `va` → L1 table,
    /// creating and linking it if missing.
    fn descend_l0<A: FrameAlloc>(&self, alloc: &mut A, va: VirtualAddress) -> PhysicalPage<Size4K> {
        let l0 = self.l0_mut();
        let i0 = L0Index::from(va);
        match l0.get(i0).kind() {
            Some(L0EntryKind::NextTable(page, _)) => page,
            None => {
                let page = alloc_table_page(alloc);
                self.l1_mut(page).zero();
                l0.set(i0, L0Entry::make_next(page));
                log::trace!("allocated L1 table {page} for {va}");
                page
            }
        }
    }

    /// One allocating step of the walk: L1 entry for `va` → L2 table,
    /// creating and linking it if missing.
    ///
    /// Aborts on an installed 1 GiB block: descending *through* a leaf
    /// would reinterpret mapped payload memory as a table.
    fn descend_l1<A: FrameAlloc>(
        &self,
        alloc: &mut A,
        l1_page: PhysicalPage<Size4K>,
        va: VirtualAddress,
    ) -> PhysicalPage<Size4K> {
        let l1 = self.l1_mut(l1_page);
        let i1 = L1Index::from(va);
        match l1.get(i1).kind() {
            Some(L1EntryKind::NextTable(page, _)) => page,
            Some(L1EntryKind::Block1GiB(_, _)) => {
                panic!("cannot descend past a 1 GiB block mapping at {va}")
            }
            None => {
                let page = alloc_table_page(alloc);
                self.l2_mut(page).zero();
                l1.set(i1, L1Entry::make_next(page));
                log::trace!("allocated L2 table {page} for {va}");
                page
            }
        }
    }

    /// One allocating step of the walk: L2 entry for `va` → L3 table,
    /// creating and linking it if missing.
    ///
    /// Aborts on an installed 2 MiB block, as in
    /// [`descend_l1`](Self::descend_l1).
    fn descend_l2<A: FrameAlloc>(
        &self,
        alloc: &mut A,
        l2_page: PhysicalPage<Size4K>,
        va: VirtualAddress,
    ) -> PhysicalPage<Size4K> {
        let l2 = self.l2_mut(l2_page);
        let i2 = L2Index::from(va);
        match l2.get(i2).kind() {
            Some(L2EntryKind::NextTable(page, _)) => page,
            Some(L2EntryKind::Block2MiB(_, _)) => {
                panic!("cannot descend past a 2 MiB block mapping at {va}")
            }
            None => {
                let page = alloc_table_page(alloc);
                self.l3_mut(page).zero();
                l2.set(i2, L2Entry::make_next(page));
                log::trace!("allocated L3 table {page} for {va}");
                page
            }
        }
    }

    /// Translate a [`VirtualAddress`] to its [`PhysicalAddress`] and the
    /// leaf descriptor that maps it.
    ///
    /// Walks read-only and stops at the first leaf (a 1 GiB block at L1, a
    /// 2 MiB block at L2, or a 4 KiB page at L3), joining the leaf base
    /// with the appropriate in-granule offset of `va`. Never allocates.
    ///
    /// # Errors
    /// [`TranslateError::NoMapping`] as soon as any level holds no valid
    /// entry for `va`.
    pub fn translate(
        &self,
        va: VirtualAddress,
    ) -> Result<(PhysicalAddress, LeafEntry), TranslateError> {
        let (i0, i1, i2, i3) = split_indices(va);

        // L0
        let Some(L0EntryKind::NextTable(l1_page, _)) = self.l0_mut().get(i0).kind() else {
            return Err(TranslateError::NoMapping);
        };

        // L1
        let l2_page = match self.l1_mut(l1_page).get(i1).kind() {
            None => return Err(TranslateError::NoMapping),
            Some(L1EntryKind::Block1GiB(base, desc)) => {
                return Ok((
                    base.join(va.offset::<Size1G>()),
                    LeafEntry::Block1GiB(desc),
                ));
            }
            Some(L1EntryKind::NextTable(page, _)) => page,
        };

        // L2
        let l3_page = match self.l2_mut(l2_page).get(i2).kind() {
            None => return Err(TranslateError::NoMapping),
            Some(L2EntryKind::Block2MiB(base, desc)) => {
                return Ok((
                    base.join(va.offset::<Size2M>()),
                    LeafEntry::Block2MiB(desc),
                ));
            }
            Some(L2EntryKind::NextTable(page, _)) => page,
        };

        // L3
        match self.l3_mut(l3_page).get(i3).kind() {
            Some(L3EntryKind::Page4KiB(base, desc)) => Ok((
                base.join(va.offset::<Size4K>()),
                LeafEntry::Page4KiB(desc),
            )),
            None => Err(TranslateError::NoMapping),
        }
    }

    /// Map `[va .. va+len)` to `[pa .. pa+len)` with 4 KiB pages.
    ///
    /// `len` is rounded up to a whole number of pages. Intermediate tables
    /// are created as needed; consecutive leaf slots within one L3 table
    /// are filled without re-walking from the root. Page leaves only —
    /// never merges runs into blocks.
    ///
    /// `va` and `pa` must be 4 KiB-aligned.
    ///
    /// # Panics
    /// Aborts if the frame allocator is exhausted, or if the walk hits an
    /// installed block mapping (huge and page-granularity mappings may not
    /// overlap).
    pub fn map_range<A: FrameAlloc>(
        &self,
        alloc: &mut A,
        va: VirtualAddress,
        pa: PhysicalAddress,
        len: u64,
        flags: MapFlags,
    ) {
        debug_assert!(
            va.is_aligned_to(Size4K::SIZE) && pa.is_aligned_to(Size4K::SIZE),
            "page mapping requires 4 KiB-aligned va/pa"
        );

        let attrs = LeafAttributes::from_flags(flags);
        let mut remaining = len.div_ceil(Size4K::SIZE);
        let mut va = va;
        let mut pa = pa;

        while remaining > 0 {
            let l1_page = self.descend_l0(alloc, va);
            let l2_page = self.descend_l1(alloc, l1_page, va);
            let l3_page = self.descend_l2(alloc, l2_page, va);

            let l3 = self.l3_mut(l3_page);
            let mut index = L3Index::from(va).as_usize();
            while index < TABLE_ENTRIES && remaining > 0 {
                let frame = PhysicalPage::<Size4K>::from_addr(pa);
                l3.set(L3Index::new(index), L3Entry::make_page(frame, attrs.to_page()));

                va += Size4K::SIZE;
                pa += Size4K::SIZE;
                remaining -= 1;
                index += 1;
            }
        }
    }

    /// Map `[va .. va+len)` to `[pa .. pa+len)` using the largest granule
    /// each prefix admits: whole 1 GiB chunks as L1 blocks first, then
    /// whole 2 MiB chunks as L2 blocks, then the sub-2 MiB tail as 4 KiB
    /// pages.
    ///
    /// This ordering keeps the structural overhead of arbitrarily large,
    /// naturally-aligned ranges at a small constant number of table pages
    /// instead of one L3 table per 2 MiB.
    ///
    /// **Alignment is the caller's responsibility**: `va` and `pa` must be
    /// aligned to the granule selected for each segment (checked only in
    /// debug builds). Misaligned calls silently truncate low address bits
    /// into the block's output-address field in release builds.
    ///
    /// # Panics
    /// Aborts if the frame allocator is exhausted, or if the walk hits an
    /// installed block mapping.
    pub fn map_range_huge<A: FrameAlloc>(
        &self,
        alloc: &mut A,
        va: VirtualAddress,
        pa: PhysicalAddress,
        len: u64,
        flags: MapFlags,
    ) {
        let attrs = LeafAttributes::from_flags(flags);
        let mut va = va;
        let mut pa = pa;
        let mut len = len;

        // 1 GiB blocks at level 1
        let mut blocks = len / Size1G::SIZE;
        if blocks > 0 {
            debug_assert!(
                va.is_aligned_to(Size1G::SIZE) && pa.is_aligned_to(Size1G::SIZE),
                "1 GiB segment requires 1 GiB-aligned va/pa"
            );
            len -= blocks * Size1G::SIZE;

            while blocks > 0 {
                let l1 = self.l1_mut(self.descend_l0(alloc, va));
                let mut index = L1Index::from(va).as_usize();
                while index < TABLE_ENTRIES && blocks > 0 {
                    let block = PhysicalPage::<Size1G>::from_addr(pa);
                    l1.set(
                        L1Index::new(index),
                        L1Entry::make_block(block, attrs.to_block_1g()),
                    );

                    va += Size1G::SIZE;
                    pa += Size1G::SIZE;
                    blocks -= 1;
                    index += 1;
                }
            }
        }

        // 2 MiB blocks at level 2
        let mut blocks = len / Size2M::SIZE;
        if blocks > 0 {
            debug_assert!(
                va.is_aligned_to(Size2M::SIZE) && pa.is_aligned_to(Size2M::SIZE),
                "2 MiB segment requires 2 MiB-aligned va/pa"
            );
            len -= blocks * Size2M::SIZE;

            while blocks > 0 {
                let l1_page = self.descend_l0(alloc, va);
                let l2 = self.l2_mut(self.descend_l1(alloc, l1_page, va));
                let mut index = L2Index::from(va).as_usize();
                while index < TABLE_ENTRIES && blocks > 0 {
                    let block = PhysicalPage::<Size2M>::from_addr(pa);
                    l2.set(
                        L2Index::new(index),
                        L2Entry::make_block(block, attrs.to_block_2m()),
                    );

                    va += Size2M::SIZE;
                    pa += Size2M::SIZE;
                    blocks -= 1;
                    index += 1;
                }
            }
        }

        // 4 KiB tail
        if len > 0 {
            self.map_range(alloc, va, pa, len, flags);
        }
    }

    /// Unmap `[va .. va+len)` at page granularity.
    ///
    /// Walks read-only. A missing subtree at any level does not fail the
    /// call: the walk skips forward past the remainder of that entry's
    /// span and resumes, so sparse or never-mapped ranges unmap without
    /// probing every leaf and without allocating.
    ///
    /// # Panics
    /// Aborts if the walk hits an installed block mapping; page- and
    /// block-granularity mappings of the same region must be torn down via
    /// [`unmap_range_huge`](Self::unmap_range_huge).
    pub fn unmap_range(&self, va: VirtualAddress, len: u64) {
        let mut remaining = len.div_ceil(Size4K::SIZE);
        let mut va = va;

        while remaining > 0 {
            let (i0, i1, i2, _) = split_indices(va);

            let Some(L0EntryKind::NextTable(l1_page, _)) = self.l0_mut().get(i0).kind() else {
                (va, remaining) = skip_span(va, remaining, L0_ENTRY_SPAN);
                continue;
            };

            let l2_page = match self.l1_mut(l1_page).get(i1).kind() {
                None => {
                    (va, remaining) = skip_span(va, remaining, L1_ENTRY_SPAN);
                    continue;
                }
                Some(L1EntryKind::Block1GiB(_, _)) => {
                    panic!("page-granularity unmap hit a 1 GiB block mapping at {va}")
                }
                Some(L1EntryKind::NextTable(page, _)) => page,
            };

            let l3_page = match self.l2_mut(l2_page).get(i2).kind() {
                None => {
                    (va, remaining) = skip_span(va, remaining, L2_ENTRY_SPAN);
                    continue;
                }
                Some(L2EntryKind::Block2MiB(_, _)) => {
                    panic!("page-granularity unmap hit a 2 MiB block mapping at {va}")
                }
                Some(L2EntryKind::NextTable(page, _)) => page,
            };

            let l3 = self.l3_mut(l3_page);
            let mut index = L3Index::from(va).as_usize();
            while index < TABLE_ENTRIES && remaining > 0 {
                l3.set_zero(L3Index::new(index));

                va += Size4K::SIZE;
                remaining -= 1;
                index += 1;
            }
        }
    }

    /// Unmap `[va .. va+len)`, recognizing block mappings.
    ///
    /// Like [`unmap_range`](Self::unmap_range), but a 1 GiB or 2 MiB block
    /// leaf encountered at L1/L2 is invalidated with a single store and the
    /// walk advances past the block's span — no assumption of uniform
    /// granularity within the range.
    pub fn unmap_range_huge(&self, va: VirtualAddress, len: u64) {
        let mut remaining = len.div_ceil(Size4K::SIZE);
        let mut va = va;

        while remaining > 0 {
            let (i0, i1, i2, _) = split_indices(va);

            let Some(L0EntryKind::NextTable(l1_page, _)) = self.l0_mut().get(i0).kind() else {
                (va, remaining) = skip_span(va, remaining, L0_ENTRY_SPAN);
                continue;
            };

            let l1 = self.l1_mut(l1_page);
            let l2_page = match l1.get(i1).kind() {
                None => {
                    (va, remaining) = skip_span(va, remaining, L1_ENTRY_SPAN);
                    continue;
                }
                Some(L1EntryKind::Block1GiB(_, _)) => {
                    l1.set_zero(i1);
                    (va, remaining) = skip_span(va, remaining, L1_ENTRY_SPAN);
                    continue;
                }
                Some(L1EntryKind::NextTable(page, _)) => page,
            };

            let l2 = self.l2_mut(l2_page);
            let l3_page = match l2.get(i2).kind() {
                None => {
                    (va, remaining) = skip_span(va, remaining, L2_ENTRY_SPAN);
                    continue;
                }
                Some(L2EntryKind::Block2MiB(_, _)) => {
                    l2.set_zero(i2);
                    (va, remaining) = skip_span(va, remaining, L2_ENTRY_SPAN);
                    continue;
                }
                Some(L2EntryKind::NextTable(page, _)) => page,
            };

            let l3 = self.l3_mut(l3_page);
            let mut index = L3Index::from(va).as_usize();
            while index < TABLE_ENTRIES && remaining > 0 {
                l3.set_zero(L3Index::new(index));

                va += Size4K::SIZE;
                remaining -= 1;
                index += 1;
            }
        }
    }

    /// Return every translation table of this tree to the allocator.
    ///
    /// Depth-first, post-order: each L3 table is freed after its parent L2
    /// entry is visited, then the L2 tables, the L1 tables, and finally the
    /// root. Invalid entries and leaf entries are skipped — the physical
    /// frames referenced by leaves belong to the mapping's caller and are
    /// never touched.
    ///
    /// Consumes the address space; the tree no longer exists afterwards.
    pub fn free_tree<A: FrameAlloc>(self, alloc: &mut A) {
        let l0 = self.l0_mut();
        let mut freed = 0usize;

        for i0 in 0..TABLE_ENTRIES {
            let Some(L0EntryKind::NextTable(l1_page, _)) = l0.get(L0Index::new(i0)).kind() else {
                continue;
            };

            let l1 = self.l1_mut(l1_page);
            for i1 in 0..TABLE_ENTRIES {
                let Some(L1EntryKind::NextTable(l2_page, _)) = l1.get(L1Index::new(i1)).kind()
                else {
                    continue;
                };

                let l2 = self.l2_mut(l2_page);
                for i2 in 0..TABLE_ENTRIES {
                    let Some(L2EntryKind::NextTable(l3_page, _)) = l2.get(L2Index::new(i2)).kind()
                    else {
                        continue;
                    };

                    alloc.free_4k(l3_page);
                    freed += 1;
                }

                alloc.free_4k(l2_page);
                freed += 1;
            }

            alloc.free_4k(l1_page);
            freed += 1;
        }

        alloc.free_4k(self.root);
        log::debug!("released translation tree: {freed} table pages + root");
    }
}

/// Obtain one table frame or abort.
///
/// Running out of memory while building translation tables is not
/// something this layer can continue past; the tree may already hold a
/// partially written range and cannot be unwound here.
fn alloc_table_page<A: FrameAlloc>(alloc: &mut A) -> PhysicalPage<Size4K> {
    let Some(page) = alloc.alloc_4k() else {
        panic!("translation-table allocation failed: frame allocator exhausted");
    };
    page
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AccessPermission;

    /// A trivial **bump** allocator: always hands out the next 4 KiB frame.
    ///
    /// No free list, no reuse — perfect for table tests. Frees are counted
    /// so teardown can be balanced against allocations.
    struct BumpAlloc {
        /// Next free physical byte address (must remain 4 KiB aligned)
        next: u64,
        /// Exclusive end (bounds check)
        end: u64,
        /// Number of frames handed out.
        allocated: usize,
        /// Number of frames returned via `free_4k`.
        freed: usize,
    }

    impl BumpAlloc {
        fn new(start: u64, end: u64) -> Self {
            Self {
                next: start,
                end,
                allocated: 0,
                freed: 0,
            }
        }
    }

    impl FrameAlloc for BumpAlloc {
        fn alloc_4k(&mut self) -> Option<PhysicalPage<Size4K>> {
            if self.next + 4096 > self.end {
                return None;
            }
            let p = self.next;
            self.next += 4096;
            self.allocated += 1;
            Some(PhysicalPage::from_addr(PhysicalAddress::new(p)))
        }

        fn free_4k(&mut self, _frame: PhysicalPage<Size4K>) {
            self.freed += 1;
        }
    }

    /// A 4 KiB-aligned raw frame. We use this as our "physical RAM" backing
    /// store in tests.
    #[repr(align(4096))]
    struct Aligned4K(#[allow(dead_code)] [u8; 4096]);

    impl Aligned4K {
        fn new_zeroed() -> Self {
            Self([0u8; 4096])
        }
    }

    /// A tiny in-memory "RAM" plus a linear-map style mapper.
    ///
    /// We simulate physical memory as a vector of 4 KiB-aligned frames.
    /// Physical addresses are simple byte offsets from 0. Only table frames
    /// are ever dereferenced, so leaf output addresses may lie far outside
    /// the backing store.
    struct TestPhys {
        frames: Vec<Aligned4K>,
    }

    impl TestPhys {
        fn with_frames(n: usize) -> Self {
            let mut v = Vec::with_capacity(n);
            for _ in 0..n {
                v.push(Aligned4K::new_zeroed());
            }
            Self { frames: v }
        }

        fn frame_mut_ptr(&self, idx: usize) -> *mut u8 {
            // SAFETY: frames are 4 KiB aligned; we return a pointer into the
            // owned buffer.
            &self.frames[idx] as *const Aligned4K as *mut u8
        }
    }

    impl PhysMapper for TestPhys {
        unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
            let idx = (pa.as_u64() >> 12) as usize;
            let off = (pa.as_u64() & 0xFFF) as usize;
            // For table frames we expect offset==0; assert to catch misuse.
            debug_assert_eq!(off, 0);

            // SAFETY: The caller promises `T` matches the bytes in the frame.
            unsafe { &mut *(self.frame_mut_ptr(idx).cast::<T>()) }
        }
    }

    const PAGE: u64 = Size4K::SIZE;

    #[test]
    fn maps_and_translates_one_page() {
        let phys = TestPhys::with_frames(64);
        let mut alloc = BumpAlloc::new(0, 64 << 12);
        let aspace = AddressSpace::create(&phys, &mut alloc);

        aspace.map_range(
            &mut alloc,
            VirtualAddress::new(0x100_1000),
            PhysicalAddress::new(0x1000),
            PAGE,
            MapFlags::WRITE,
        );

        let (pa, leaf) = aspace
            .translate(VirtualAddress::new(0x100_1000))
            .expect("mapped page");
        assert_eq!(pa.as_u64(), 0x1000);
        let LeafEntry::Page4KiB(desc) = leaf else {
            panic!("expected a 4 KiB page leaf");
        };
        assert_eq!(desc.access_permission(), AccessPermission::ReadWrite);
        assert!(desc.user_execute_never(), "EXEC was not requested");
        assert!(desc.access_flag());
        assert!(desc.not_global());

        // offsets within the page resolve to the same frame
        let (pa, leaf) = aspace
            .translate(VirtualAddress::new(0x100_1050))
            .expect("mapped page");
        assert_eq!(pa.as_u64(), 0x1050);
        assert!(leaf.is_writable());
        assert!(!leaf.is_user_executable());

        aspace.unmap_range(VirtualAddress::new(0x100_1000), PAGE);
        assert_eq!(
            aspace.translate(VirtualAddress::new(0x100_1000)),
            Err(TranslateError::NoMapping)
        );

        let allocated = alloc.allocated;
        aspace.free_tree(&mut alloc);
        assert_eq!(alloc.freed, allocated, "every table page returned");
    }

    // PartialEq on the Result requires dropping the descriptor payload.
    impl PartialEq for LeafEntry {
        fn eq(&self, other: &Self) -> bool {
            match (self, other) {
                (Self::Block1GiB(a), Self::Block1GiB(b)) => a.into_bits() == b.into_bits(),
                (Self::Block2MiB(a), Self::Block2MiB(b)) => a.into_bits() == b.into_bits(),
                (Self::Page4KiB(a), Self::Page4KiB(b)) => a.into_bits() == b.into_bits(),
                _ => false,
            }
        }
    }

    impl core::fmt::Debug for LeafEntry {
        fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            match self {
                Self::Block1GiB(d) => write!(f, "Block1GiB({:#x})", d.into_bits()),
                Self::Block2MiB(d) => write!(f, "Block2MiB({:#x})", d.into_bits()),
                Self::Page4KiB(d) => write!(f, "Page4KiB({:#x})", d.into_bits()),
            }
        }
    }

    #[test]
    fn maps_and_unmaps_multiple_pages() {
        let phys = TestPhys::with_frames(64);
        let mut alloc = BumpAlloc::new(0, 64 << 12);
        let aspace = AddressSpace::create(&phys, &mut alloc);

        let nr_pages = 10u64;
        let len = nr_pages * PAGE;
        aspace.map_range(
            &mut alloc,
            VirtualAddress::new(0x100_1000),
            PhysicalAddress::new(0x1000),
            len,
            MapFlags::WRITE,
        );
        aspace.map_range(
            &mut alloc,
            VirtualAddress::new(0x100_1000 + len),
            PhysicalAddress::new(0x1000 + len),
            len,
            MapFlags::WRITE,
        );

        for i in 0..nr_pages * 2 {
            let (pa, _) = aspace
                .translate(VirtualAddress::new(0x100_1050 + i * PAGE))
                .expect("mapped page");
            assert_eq!(pa.as_u64(), 0x1050 + i * PAGE);
        }

        aspace.unmap_range(VirtualAddress::new(0x100_1000), len);
        aspace.unmap_range(VirtualAddress::new(0x100_1000 + len), len);

        for i in 0..nr_pages * 2 {
            assert_eq!(
                aspace.translate(VirtualAddress::new(0x100_1050 + i * PAGE)),
                Err(TranslateError::NoMapping)
            );
        }

        aspace.free_tree(&mut alloc);
    }

    #[test]
    fn length_rounds_up_to_whole_pages() {
        let phys = TestPhys::with_frames(64);
        let mut alloc = BumpAlloc::new(0, 64 << 12);
        let aspace = AddressSpace::create(&phys, &mut alloc);

        aspace.map_range(
            &mut alloc,
            VirtualAddress::new(0x20_0000),
            PhysicalAddress::new(0x8000),
            1, // a single byte still maps a whole page
            MapFlags::empty(),
        );

        assert!(aspace.translate(VirtualAddress::new(0x20_0FFF)).is_ok());
        assert_eq!(
            aspace.translate(VirtualAddress::new(0x20_1000)),
            Err(TranslateError::NoMapping)
        );

        aspace.free_tree(&mut alloc);
    }

    #[test]
    fn disjoint_ranges_are_independent() {
        let phys = TestPhys::with_frames(64);
        let mut alloc = BumpAlloc::new(0, 64 << 12);
        let aspace = AddressSpace::create(&phys, &mut alloc);

        let len = 4 * PAGE;
        aspace.map_range(
            &mut alloc,
            VirtualAddress::new(0x100_0000),
            PhysicalAddress::new(0x40_0000),
            len,
            MapFlags::WRITE,
        );
        // a second range under a different L2 subtree
        aspace.map_range(
            &mut alloc,
            VirtualAddress::new(0x4000_0000),
            PhysicalAddress::new(0x80_0000),
            len,
            MapFlags::empty(),
        );

        let (pa, _) = aspace.translate(VirtualAddress::new(0x100_2000)).unwrap();
        assert_eq!(pa.as_u64(), 0x40_2000);
        let (pa, leaf) = aspace.translate(VirtualAddress::new(0x4000_1000)).unwrap();
        assert_eq!(pa.as_u64(), 0x80_1000);
        assert!(!leaf.is_writable());

        aspace.unmap_range(VirtualAddress::new(0x100_0000), len);
        assert_eq!(
            aspace.translate(VirtualAddress::new(0x100_0000)),
            Err(TranslateError::NoMapping)
        );
        // the other range is untouched
        let (pa, _) = aspace.translate(VirtualAddress::new(0x4000_3000)).unwrap();
        assert_eq!(pa.as_u64(), 0x80_3000);

        aspace.free_tree(&mut alloc);
    }

    #[test]
    fn sparse_unmap_completes_without_touching_allocator() {
        let phys = TestPhys::with_frames(8);
        let mut alloc = BumpAlloc::new(0, 8 << 12);
        let aspace = AddressSpace::create(&phys, &mut alloc);
        assert_eq!(alloc.allocated, 1, "root only");

        // nothing mapped: a huge range unmaps by skipping whole subtrees
        aspace.unmap_range(VirtualAddress::new(0), 64 << 30);
        aspace.unmap_range_huge(VirtualAddress::new(0x1234_5000), 64 << 30);

        assert_eq!(alloc.allocated, 1, "unmap never allocates");
        aspace.free_tree(&mut alloc);
        assert_eq!(alloc.freed, 1);
    }

    #[test]
    fn huge_mapping_has_constant_table_overhead() {
        let phys = TestPhys::with_frames(64);
        let mut alloc = BumpAlloc::new(0, 64 << 12);
        let aspace = AddressSpace::create(&phys, &mut alloc);

        // 1 GiB + 4 MiB + 40 KiB, identity-style va == pa
        let base = 0x1_0000_0000u64;
        let len = (1 << 30) + (4 << 20) + 10 * PAGE;
        aspace.map_range_huge(
            &mut alloc,
            VirtualAddress::new(base),
            PhysicalAddress::new(base),
            len,
            MapFlags::WRITE,
        );

        // one L1 + one L2 + one L3 table beyond the root
        let table_pages = alloc.allocated - 1;
        assert!(
            table_pages <= 8,
            "structural overhead must stay constant, used {table_pages} pages"
        );

        // sample across all three granularities
        let mut va = base;
        while va < base + len {
            let (pa, _) = aspace
                .translate(VirtualAddress::new(va))
                .expect("mapped address");
            assert_eq!(pa.as_u64(), va);
            va += 5 * PAGE + 0x100;
        }

        aspace.unmap_range_huge(VirtualAddress::new(base), len);

        let mut va = base;
        while va < base + len {
            assert_eq!(
                aspace.translate(VirtualAddress::new(va)),
                Err(TranslateError::NoMapping)
            );
            va += 5 * PAGE + 0x100;
        }

        let allocated = alloc.allocated;
        aspace.free_tree(&mut alloc);
        assert_eq!(alloc.freed, allocated, "every table page returned");
    }

    #[test]
    fn block_leaves_report_their_granule() {
        let phys = TestPhys::with_frames(64);
        let mut alloc = BumpAlloc::new(0, 64 << 12);
        let aspace = AddressSpace::create(&phys, &mut alloc);

        let base = 0x40_0000_0000u64; // 256 GiB, 1 GiB aligned
        aspace.map_range_huge(
            &mut alloc,
            VirtualAddress::new(base),
            PhysicalAddress::new(0x1_0000_0000),
            Size1G::SIZE + Size2M::SIZE,
            MapFlags::WRITE | MapFlags::EXEC,
        );

        let (pa, leaf) = aspace
            .translate(VirtualAddress::new(base + 0x1234_5678))
            .unwrap();
        assert_eq!(pa.as_u64(), 0x1_0000_0000 + 0x1234_5678);
        assert!(matches!(leaf, LeafEntry::Block1GiB(_)));
        assert!(leaf.is_user_executable());

        let (pa, leaf) = aspace
            .translate(VirtualAddress::new(base + Size1G::SIZE + 0x1_2345))
            .unwrap();
        assert_eq!(pa.as_u64(), 0x1_0000_0000 + Size1G::SIZE + 0x1_2345);
        assert!(matches!(leaf, LeafEntry::Block2MiB(_)));

        aspace.free_tree(&mut alloc);
    }
}
