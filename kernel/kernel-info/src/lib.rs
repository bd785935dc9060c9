//! # Kernel Configuration
//!
//! Authoritative memory-layout constants shared across kernel subsystems.
//! Centralizing them here keeps the translation-table code, the physical
//! allocator, and early boot in agreement about where the kernel sees
//! physical memory and how the 48-bit virtual address space is carved up.
//!
//! ## Virtual Memory Architecture
//!
//! The kernel uses the standard VMSAv8-A split: `TTBR0_EL1` translates the
//! low half (userspace), `TTBR1_EL1` the high half (kernel). Physical memory
//! is reachable from kernel context through a fixed linear mapping at
//! [`memory::DIRECT_MAP_BASE`].
//!
//! ```text
//! Virtual Address Space Layout (48-bit VA, 4 KiB granule):
//!
//! 0x0000_0000_0000_0000 ┌─────────────────────────────────┐
//!                       │         User Space              │
//!                       │    (per-process, TTBR0_EL1)     │
//! USERSPACE_END         ├─────────────────────────────────┤ 0x0000_FFFF_FFFF_FFFF
//!                       │     (non-canonical hole)        │
//! DIRECT_MAP_BASE       ├─────────────────────────────────┤ 0xFFFF_0000_0000_0000
//!                       │      Linear Physical Map        │
//!                       │  (kernel access to phys memory) │
//! KERNEL_BASE           ├─────────────────────────────────┤ 0xFFFF_FF00_0000_0000
//!                       │       Kernel Text & Data        │
//! 0xFFFF_FFFF_FFFF_FFFF └─────────────────────────────────┘
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod memory;
