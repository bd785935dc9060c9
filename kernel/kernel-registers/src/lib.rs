//! # Typed AArch64 System Registers
//!
//! Bit-exact wrappers for the EL1 system registers the memory-management
//! code programs: `TTBR0_EL1` (translation-table base), `MAIR_EL1`
//! (memory-attribute indirection), and `TCR_EL1` (translation control).
//!
//! The register *types* are target-independent and host-testable; the
//! `mrs`/`msr` access paths are only compiled with the `asm` feature on
//! `aarch64` targets.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(feature = "mair")]
pub mod mair_el1;

#[cfg(feature = "tcr")]
pub mod tcr_el1;

#[cfg(feature = "ttbr0")]
pub mod ttbr0_el1;

pub trait LoadRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, the register access might be privileged and require EL1.
    unsafe fn load_unsafe() -> Self;
}

pub trait StoreRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, the register access might be privileged and require EL1.
    unsafe fn store_unsafe(self);
}

pub trait LoadRegister {
    /// # Safety
    /// It is generally safe to load this register even from user mode.
    fn load() -> Self;
}

pub trait StoreRegister {
    /// # Safety
    /// It is generally safe to store this register even from user mode.
    fn store(self);
}

impl<T> LoadRegisterUnsafe for T
where
    T: LoadRegister,
{
    #[inline]
    unsafe fn load_unsafe() -> Self {
        <Self as LoadRegister>::load()
    }
}

impl<T> StoreRegisterUnsafe for T
where
    T: StoreRegister,
{
    #[inline]
    unsafe fn store_unsafe(self) {
        <Self as StoreRegister>::store(self);
    }
}
