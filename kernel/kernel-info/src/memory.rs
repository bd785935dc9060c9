//! # Memory Layout

/// End of the userspace VA range (inclusive); the low half translated by
/// `TTBR0_EL1` with `T0SZ = 16`.
pub const USERSPACE_END: u64 = 0x0000_FFFF_FFFF_FFFF;

/// Base of the fixed linear mapping of physical memory.
///
/// Anything mapped at [`DIRECT_MAP_BASE`] + `pa` lets the kernel access
/// physical memory — translation-table pages in particular — via a fixed
/// offset. First address of the high half translated by `TTBR1_EL1`
/// with `T1SZ = 16`.
pub const DIRECT_MAP_BASE: u64 = 0xFFFF_0000_0000_0000;

/// Bytes of physical memory covered by the linear mapping.
pub const DIRECT_MAP_SIZE: u64 = 1 << 40; // 1 TiB

/// Where the kernel image executes (VMA), matches the linker script.
pub const KERNEL_BASE: u64 = 0xFFFF_FF00_0000_0000;

/// Number of 64-bit entries in one translation table page.
pub const TABLE_ENTRIES: usize = 512;

/// Bits of virtual address consumed by one table level (log2 of
/// [`TABLE_ENTRIES`]).
pub const TABLE_INDEX_BITS: u32 = 9;

const _: () = {
    assert!(DIRECT_MAP_BASE > USERSPACE_END);
    assert!(KERNEL_BASE >= DIRECT_MAP_BASE + DIRECT_MAP_SIZE);
    assert!(TABLE_ENTRIES == 1 << TABLE_INDEX_BITS);
};
