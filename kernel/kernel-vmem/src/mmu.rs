//! # MMU Configuration (VMSAv8-A)
//!
//! Programs the translation-control state that the table walk depends on:
//! `MAIR_EL1` (so the `AttrIndx` values encoded by
//! [`attributes`](crate::attributes) select the intended memory types) and
//! `TCR_EL1` (48-bit VA in both halves, 4 KiB granule).
//!
//! Installing a root table afterwards is
//! [`AddressSpace::activate`](crate::AddressSpace::activate).

/// Program `MAIR_EL1` and `TCR_EL1` with the kernel configuration.
///
/// Must run early in boot, before the MMU is enabled (or with full TLB
/// maintenance if it already is).
///
/// # Safety
/// - Must run at EL1.
/// - Changing these registers under a live MMU invalidates the meaning of
///   every installed descriptor; the caller owns the required barriers and
///   TLB maintenance beyond the `isb` issued per store.
#[cfg(target_arch = "aarch64")]
pub unsafe fn configure() {
    use kernel_registers::StoreRegisterUnsafe;
    use kernel_registers::mair_el1::MairEl1;
    use kernel_registers::tcr_el1::TcrEl1;

    let mair = MairEl1::kernel_default();
    let tcr = TcrEl1::kernel_default();
    unsafe {
        mair.store_unsafe();
        tcr.store_unsafe();
    }

    log::info!(
        "MMU configured: TCR={:#018x} MAIR={:#018x}",
        tcr.into_bits(),
        mair.into_bits()
    );
}
