//! # Virtual Memory Translation Tables
//!
//! AArch64 (VMSAv8-A) translation-table management for a microkernel:
//! building, querying, and tearing down the four-level tree that maps
//! virtual to physical addresses, including 2 MiB and 1 GiB block mappings.
//!
//! ## What you get
//! - An [`address space`](address_space) handle rooted at a level-0 table.
//! - Bit-exact [descriptor types](translation_table) for table, block, and
//!   page entries, plus a [unified attribute view](attributes) derived from
//!   caller-facing [`MapFlags`].
//! - Range operations: [`map_range`](AddressSpace::map_range),
//!   [`map_range_huge`](AddressSpace::map_range_huge),
//!   [`unmap_range`](AddressSpace::unmap_range),
//!   [`unmap_range_huge`](AddressSpace::unmap_range_huge),
//!   [`translate`](AddressSpace::translate),
//!   [`free_tree`](AddressSpace::free_tree).
//! - A tiny allocator/mapper interface ([`FrameAlloc`], [`PhysMapper`]) and a
//!   fixed-offset [`DirectMapMapper`](direct_map::DirectMapMapper).
//!
//! ## AArch64 Virtual Address → Physical Address Walk
//!
//! With the 4 KiB granule and 48-bit addresses, each virtual address is
//! divided into five fields:
//!
//! ```text
//! | 47‒39 | 38‒30 | 29‒21 | 20‒12 | 11‒0   |
//! |  L0   |  L1   |  L2   |  L3   | Offset |
//! ```
//!
//! The MMU uses these fields as **indices** into four levels of translation
//! tables, each level containing 512 (2⁹) entries of 8 bytes (64 bits) each.
//!
//! ```text
//!  L0  →  L1  →  L2  →  L3  →  Physical Page
//!   │      │      │      │
//!   │      │      │      └───► Page descriptor          → maps 4 KiB page
//!   │      │      └──────────► Block descriptor (L2)    → maps 2 MiB block
//!   │      └─────────────────► Block descriptor (L1)    → maps 1 GiB block
//!   └────────────────────────► Table descriptor only
//! ```
//!
//! ### Levels and their roles
//!
//! | Level | Indexed by | Entry forms | Description |
//! |:------|:-----------|:------------|:-------------|
//! | 0 | VA\[47:39\] | table | Root table; one per address space, installed in `TTBR0_EL1`/`TTBR1_EL1`. |
//! | 1 | VA\[38:30\] | table or 1 GiB block | Block form terminates the walk early. |
//! | 2 | VA\[29:21\] | table or 2 MiB block | Block form terminates the walk early. |
//! | 3 | VA\[20:12\] | 4 KiB page | Always a leaf. |
//!
//! ### Leaf vs. table entries
//!
//! - A **leaf entry** (page or block) terminates translation — it contains
//!   the output physical base and the attribute bits (access permission,
//!   execute-never, shareability, memory-attribute index).
//! - A **table entry** points to the next lower table level and continues
//!   the walk. Bit 1 discriminates the two forms at levels 1–2; at level 3
//!   it must be set, at level 0 the block form does not exist.
//!
//! The final **Offset** field selects the byte inside the 4 KiB page (or the
//! wider low-bit slice inside a 2 MiB / 1 GiB block).
//!
//! ## Ownership and concurrency contract
//!
//! Exactly one logical owner mutates a given tree at a time; callers above
//! this layer serialize access and perform all TLB maintenance. The only
//! guarantee this layer gives a concurrently walking MMU is that every
//! descriptor is assembled in a local value and published with a single
//! 64-bit store — no half-built descriptor is ever observable.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

pub mod address_space;
pub mod attributes;
pub mod direct_map;
pub mod mmu;
pub mod translation_table;

pub use crate::address_space::{AddressSpace, LeafEntry, TranslateError};
pub use crate::attributes::{AccessPermission, LeafAttributes, Shareability};

use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

/// Re-export constants as info module.
pub use kernel_info::memory as info;

bitflags::bitflags! {
    /// Caller-facing protection and memory-type flags for mapping requests.
    ///
    /// Read access is implicit: every mapping is at least readable. Exactly
    /// one memory-type class is derived from [`DEVICE`](MapFlags::DEVICE)
    /// and [`NOCACHE`](MapFlags::NOCACHE); see
    /// [`LeafAttributes::from_flags`](attributes::LeafAttributes::from_flags).
    #[derive(Copy, Clone)]
    pub struct MapFlags: u32 {
        /// Mapping is writable.
        ///
        /// If cleared, the range is mapped read-only and writes fault.
        const WRITE = 1 << 0;

        /// Mapping is executable from user mode.
        ///
        /// If cleared, instruction fetches from EL0 fault. Kernel execution
        /// of user-mapped code is always forbidden regardless of this flag.
        const EXEC = 1 << 1;

        /// Device memory (MMIO).
        ///
        /// Selects the Device-nGnRnE attribute and forces the mapping
        /// non-shareable. Takes precedence over [`NOCACHE`](MapFlags::NOCACHE).
        const DEVICE = 1 << 2;

        /// Normal memory with caching disabled.
        ///
        /// Used for buffers shared with non-coherent agents.
        const NOCACHE = 1 << 3;
    }
}

/// Minimal frame allocator used to obtain and return **physical** 4 KiB
/// frames for translation tables.
///
/// The implementation decides where frames come from (boot pool, bitmap,
/// buddy, etc.). Returned frames **must** be 4 KiB aligned.
///
/// Returns `None` on out-of-memory; this layer treats that as fatal while
/// building mappings (see [`AddressSpace`]).
pub trait FrameAlloc {
    /// Allocate one 4 KiB *physical* frame for translation tables.
    fn alloc_4k(&mut self) -> Option<PhysicalPage<Size4K>>;

    /// Return a frame previously obtained from
    /// [`alloc_4k`](FrameAlloc::alloc_4k).
    fn free_4k(&mut self, frame: PhysicalPage<Size4K>);
}

/// Converts physical addresses to usable pointers in the current virtual
/// address space (e.g., via the kernel's fixed linear map).
///
/// Typical patterns:
/// - **Early boot**: identity-maps low memory; returns direct pointers.
/// - **Kernel**: adds the linear-map base before returning a pointer
///   (see [`DirectMapMapper`](direct_map::DirectMapMapper)).
///
/// # Safety
/// - You must ensure `pa` is mapped as writable in the current translation
///   tables for `&mut T`.
/// - Lifetime `'a` is purely borrow-checked; the mapping must remain valid
///   for `'a`.
/// - Type `T` must match the bytes at `pa` (no aliasing UB).
pub trait PhysMapper {
    /// Convert a *physical* address to a usable mutable pointer in the
    /// current address space.
    ///
    /// # Safety
    /// See the trait-level contract.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;
}

/// Align `x` down to the nearest multiple of `a`.
///
/// This returns the greatest value `y <= x` such that `y % a == 0`.
///
/// ### Preconditions
/// - `a` must be **non-zero** and a **power of two** (e.g., 1, 2, 4, 8, …).
///   These bit-trick formulas rely on that property.
/// - No additional constraints on `x`.
///
/// ### Examples
/// ```rust
/// # use kernel_vmem::align_down;
/// assert_eq!(align_down(0,      4096), 0);
/// assert_eq!(align_down(1,      4096), 0);
/// assert_eq!(align_down(4095,   4096), 0);
/// assert_eq!(align_down(4096,   4096), 4096);
/// assert_eq!(align_down(8191,   4096), 4096);
/// assert_eq!(align_down(0x12345,  16), 0x12340);
/// ```
#[inline(always)]
#[must_use]
pub const fn align_down(x: u64, a: u64) -> u64 {
    x & !(a - 1)
}

/// Align `x` up to the nearest multiple of `a`.
///
/// This returns the smallest value `y >= x` such that `y % a == 0`.
///
/// ### Preconditions
/// - `a` must be **non-zero** and a **power of two**.
/// - `x + (a - 1)` must **not overflow** `u64`.
///
/// ### Examples
/// ```rust
/// # use kernel_vmem::align_up;
/// assert_eq!(align_up(0,       4096), 0);
/// assert_eq!(align_up(1,       4096), 4096);
/// assert_eq!(align_up(4095,    4096), 4096);
/// assert_eq!(align_up(4096,    4096), 4096);
/// assert_eq!(align_up(4097,    4096), 8192);
/// assert_eq!(align_up(0x12345,   16), 0x12350);
/// ```
#[inline(always)]
#[must_use]
pub const fn align_up(x: u64, a: u64) -> u64 {
    (x + a - 1) & !(a - 1)
}
