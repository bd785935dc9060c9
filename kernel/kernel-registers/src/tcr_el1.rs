#[cfg(all(feature = "asm", target_arch = "aarch64"))]
use crate::StoreRegisterUnsafe;
use bitfield_struct::bitfield;

/// TCR_EL1 — Translation Control Register.
///
/// Configures the size, granule, shareability, and cacheability of the two
/// translation-table walks (TTBR0 low half, TTBR1 high half).
#[bitfield(u64)]
pub struct TcrEl1 {
    /// Bits 0–5 — T0SZ: 64 minus the TTBR0 VA width. 16 → 48-bit VA.
    #[bits(6)]
    pub t0sz: u8,

    /// Bit 6 — Reserved.
    #[bits(1)]
    __res0: u8,

    /// Bit 7 — EPD0: disable TTBR0 walks when set.
    pub epd0: bool,

    /// Bits 8–9 — IRGN0: inner cacheability for TTBR0 walks (0b01 = WB-RW-Alloc).
    #[bits(2)]
    pub irgn0: u8,

    /// Bits 10–11 — ORGN0: outer cacheability for TTBR0 walks.
    #[bits(2)]
    pub orgn0: u8,

    /// Bits 12–13 — SH0: shareability for TTBR0 walks (0b11 = Inner Shareable).
    #[bits(2)]
    pub sh0: u8,

    /// Bits 14–15 — TG0: TTBR0 granule (0b00 = 4 KiB).
    #[bits(2)]
    pub tg0: u8,

    /// Bits 16–21 — T1SZ: 64 minus the TTBR1 VA width. 16 → 48-bit VA.
    #[bits(6)]
    pub t1sz: u8,

    /// Bit 22 — A1: ASID comes from TTBR1 when set.
    pub a1: bool,

    /// Bit 23 — EPD1: disable TTBR1 walks when set.
    pub epd1: bool,

    /// Bits 24–25 — IRGN1: inner cacheability for TTBR1 walks.
    #[bits(2)]
    pub irgn1: u8,

    /// Bits 26–27 — ORGN1: outer cacheability for TTBR1 walks.
    #[bits(2)]
    pub orgn1: u8,

    /// Bits 28–29 — SH1: shareability for TTBR1 walks.
    #[bits(2)]
    pub sh1: u8,

    /// Bits 30–31 — TG1: TTBR1 granule (0b10 = 4 KiB).
    #[bits(2)]
    pub tg1: u8,

    /// Bits 32–34 — IPS: intermediate physical address size (0b101 = 48-bit).
    #[bits(3)]
    pub ips: u8,

    /// Bit 35 — Reserved.
    #[bits(1)]
    __res1: u8,

    /// Bit 36 — AS: 16-bit ASIDs when set.
    pub asid16: bool,

    /// Bit 37 — TBI0: top-byte-ignore for TTBR0 addresses.
    pub tbi0: bool,

    /// Bit 38 — TBI1: top-byte-ignore for TTBR1 addresses.
    pub tbi1: bool,

    /// Bits 39–63 — Reserved / unused features.
    #[bits(25)]
    __res2: u32,
}

impl TcrEl1 {
    /// Configuration for 48-bit VA in both halves, 4 KiB granule,
    /// inner-shareable write-back walks, 48-bit PA.
    #[must_use]
    pub const fn kernel_default() -> Self {
        Self::new()
            .with_t0sz(16)
            .with_t1sz(16)
            .with_tg0(0b00) // 4 KiB
            .with_tg1(0b10) // 4 KiB
            .with_sh0(0b11) // Inner Shareable
            .with_sh1(0b11)
            .with_irgn0(0b01) // WB-RW-Alloc
            .with_orgn0(0b01)
            .with_irgn1(0b01)
            .with_orgn1(0b01)
            .with_ips(0b101) // 48-bit PA (256 TiB)
    }
}

#[cfg(all(feature = "asm", target_arch = "aarch64"))]
impl StoreRegisterUnsafe for TcrEl1 {
    unsafe fn store_unsafe(self) {
        let tcr = self.into_bits();
        unsafe {
            core::arch::asm!(
                "msr tcr_el1, {}",
                "isb",
                in(reg) tcr,
                options(nostack, preserves_flags),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_default_field_placement() {
        let tcr = TcrEl1::kernel_default();
        let bits = tcr.into_bits();
        assert_eq!(bits & 0x3F, 16); // T0SZ
        assert_eq!((bits >> 16) & 0x3F, 16); // T1SZ
        assert_eq!((bits >> 14) & 0b11, 0b00); // TG0
        assert_eq!((bits >> 30) & 0b11, 0b10); // TG1
        assert_eq!((bits >> 12) & 0b11, 0b11); // SH0
        assert_eq!((bits >> 32) & 0b111, 0b101); // IPS
    }
}
