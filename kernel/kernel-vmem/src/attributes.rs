//! # Leaf Attribute Encoding
//!
//! The single place where caller-facing [`MapFlags`] become hardware
//! attribute bits. [`LeafAttributes`] models the semantic superset of the
//! leaf fields shared by all three leaf forms:
//!
//! - L1: [`BlockDescriptor1G`] (1 GiB block)
//! - L2: [`BlockDescriptor2M`] (2 MiB block)
//! - L3: [`PageDescriptor`] (4 KiB page)
//!
//! Use [`LeafAttributes::from_flags`] to derive the view and the `to_*`
//! helpers to encode it for a concrete level. Encoding is deterministic and
//! pure; the output addresses and valid bits are added later by the entry
//! constructors (`make_page` / `make_block`).
//!
//! ## Fixed policy bits
//!
//! Some fields are not caller-controllable; they encode kernel-wide policy:
//!
//! - **PXN is always set** — the kernel never executes code reachable
//!   through user mappings.
//! - **AF is always set** — there is no software access-flag management, so
//!   a cleared flag would fault on first touch.
//! - **nG is always set** — mappings belong to one address space and are
//!   tagged with its ASID.

use crate::MapFlags;
use crate::translation_table::l1::BlockDescriptor1G;
use crate::translation_table::l2::BlockDescriptor2M;
use crate::translation_table::l3::PageDescriptor;
use kernel_registers::mair_el1::MemoryAttributeIndex;

/// AP\[2:1\] — data-access permission of a leaf descriptor.
///
/// Mapped pages are always at least readable, and EL1 can access whatever
/// EL0 can (no SMAP-style restriction in this microkernel), so only the
/// all-RW and all-RO encodings are produced by [`LeafAttributes`]. The
/// privileged-only encodings exist so decoding is total.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum AccessPermission {
    /// EL1 read-write, EL0 no access (`0b00`).
    PrivilegedReadWrite = 0b00,
    /// EL1 and EL0 read-write (`0b01`).
    ReadWrite = 0b01,
    /// EL1 read-only, EL0 no access (`0b10`).
    PrivilegedReadOnly = 0b10,
    /// EL1 and EL0 read-only (`0b11`).
    ReadOnly = 0b11,
}

impl AccessPermission {
    /// Conversion used by `bitfield-struct` fields of this type.
    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }

    /// Conversion used by `bitfield-struct` fields of this type.
    #[must_use]
    pub const fn from_bits(value: u8) -> Self {
        match value & 0b11 {
            0b00 => Self::PrivilegedReadWrite,
            0b01 => Self::ReadWrite,
            0b10 => Self::PrivilegedReadOnly,
            _ => Self::ReadOnly,
        }
    }

    /// Whether writes are permitted (at any exception level).
    #[inline]
    #[must_use]
    pub const fn is_writable(self) -> bool {
        matches!(self, Self::ReadWrite | Self::PrivilegedReadWrite)
    }
}

/// SH — shareability domain of a leaf descriptor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Shareability {
    /// Non-shareable (`0b00`); used for Device memory.
    NonShareable = 0b00,
    /// Reserved encoding (`0b01`).
    Reserved = 0b01,
    /// Outer Shareable (`0b10`).
    OuterShareable = 0b10,
    /// Inner Shareable (`0b11`); the default for Normal memory.
    InnerShareable = 0b11,
}

impl Shareability {
    /// Conversion used by `bitfield-struct` fields of this type.
    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }

    /// Conversion used by `bitfield-struct` fields of this type.
    #[must_use]
    pub const fn from_bits(value: u8) -> Self {
        match value & 0b11 {
            0b00 => Self::NonShareable,
            0b01 => Self::Reserved,
            0b10 => Self::OuterShareable,
            _ => Self::InnerShareable,
        }
    }
}

/// Unified, ergonomic view over the leaf attribute fields (all levels).
///
/// This type deliberately does **not** use bit-packing. It models the
/// caller-relevant subset of a leaf descriptor; the fixed policy bits
/// (AF, nG, PXN — see the module docs) are applied during encoding and do
/// not appear here.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LeafAttributes {
    /// Data-access permission.
    pub access: AccessPermission,
    /// Memory type via the MAIR_EL1 attribute slot.
    pub memory: MemoryAttributeIndex,
    /// Shareability domain.
    pub shareability: Shareability,
    /// Whether EL0 may execute from the mapping (clear UXN).
    pub user_executable: bool,
}

impl LeafAttributes {
    /// Derive the attribute view from caller-facing [`MapFlags`].
    ///
    /// Rules:
    /// - `WRITE` present → read-write, else read-only.
    /// - `EXEC` present → user-executable, else user-execute-never.
    /// - `DEVICE` present → Device-nGnRnE memory, shareability forced off.
    /// - else `NOCACHE` present → Normal non-cacheable, inner-shareable.
    /// - else → Normal write-back cacheable, inner-shareable.
    #[must_use]
    pub const fn from_flags(flags: MapFlags) -> Self {
        let access = if flags.contains(MapFlags::WRITE) {
            AccessPermission::ReadWrite
        } else {
            AccessPermission::ReadOnly
        };

        let (memory, shareability) = if flags.contains(MapFlags::DEVICE) {
            (MemoryAttributeIndex::DeviceNGnRnE, Shareability::NonShareable)
        } else if flags.contains(MapFlags::NOCACHE) {
            (
                MemoryAttributeIndex::NormalNonCacheable,
                Shareability::InnerShareable,
            )
        } else {
            (MemoryAttributeIndex::Normal, Shareability::InnerShareable)
        };

        Self {
            access,
            memory,
            shareability,
            user_executable: flags.contains(MapFlags::EXEC),
        }
    }

    /// Builder-style access override.
    #[inline]
    #[must_use]
    pub const fn with_access(mut self, access: AccessPermission) -> Self {
        self.access = access;
        self
    }

    /// Builder-style shareability override.
    #[inline]
    #[must_use]
    pub const fn with_shareability(mut self, shareability: Shareability) -> Self {
        self.shareability = shareability;
        self
    }

    /// Encode into a [`PageDescriptor`] attribute template (4 KiB leaf).
    ///
    /// The valid bit and output address are left for
    /// [`L3Entry::make_page`](crate::translation_table::l3::L3Entry::make_page).
    #[must_use]
    pub const fn to_page(self) -> PageDescriptor {
        PageDescriptor::new()
            .with_attr_index(self.memory)
            .with_access_permission(self.access)
            .with_shareability(self.shareability)
            .with_access_flag(true)
            .with_not_global(true)
            .with_privileged_execute_never(true)
            .with_user_execute_never(!self.user_executable)
    }

    /// Encode into a [`BlockDescriptor2M`] attribute template (2 MiB leaf).
    #[must_use]
    pub const fn to_block_2m(self) -> BlockDescriptor2M {
        BlockDescriptor2M::new()
            .with_attr_index(self.memory)
            .with_access_permission(self.access)
            .with_shareability(self.shareability)
            .with_access_flag(true)
            .with_not_global(true)
            .with_privileged_execute_never(true)
            .with_user_execute_never(!self.user_executable)
    }

    /// Encode into a [`BlockDescriptor1G`] attribute template (1 GiB leaf).
    #[must_use]
    pub const fn to_block_1g(self) -> BlockDescriptor1G {
        BlockDescriptor1G::new()
            .with_attr_index(self.memory)
            .with_access_permission(self.access)
            .with_shareability(self.shareability)
            .with_access_flag(true)
            .with_not_global(true)
            .with_privileged_execute_never(true)
            .with_user_execute_never(!self.user_executable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_flag_selects_permission() {
        let rw = LeafAttributes::from_flags(MapFlags::WRITE);
        assert_eq!(rw.access, AccessPermission::ReadWrite);
        assert!(rw.access.is_writable());

        let ro = LeafAttributes::from_flags(MapFlags::empty());
        assert_eq!(ro.access, AccessPermission::ReadOnly);
        assert!(!ro.access.is_writable());
    }

    #[test]
    fn memory_type_derivation() {
        let normal = LeafAttributes::from_flags(MapFlags::WRITE);
        assert_eq!(normal.memory, MemoryAttributeIndex::Normal);
        assert_eq!(normal.shareability, Shareability::InnerShareable);

        let nocache = LeafAttributes::from_flags(MapFlags::NOCACHE);
        assert_eq!(nocache.memory, MemoryAttributeIndex::NormalNonCacheable);
        assert_eq!(nocache.shareability, Shareability::InnerShareable);

        // DEVICE wins over NOCACHE and forces the mapping non-shareable
        let device = LeafAttributes::from_flags(MapFlags::DEVICE | MapFlags::NOCACHE);
        assert_eq!(device.memory, MemoryAttributeIndex::DeviceNGnRnE);
        assert_eq!(device.shareability, Shareability::NonShareable);
    }

    #[test]
    fn fixed_policy_bits_always_encoded() {
        for flags in [
            MapFlags::empty(),
            MapFlags::WRITE,
            MapFlags::WRITE | MapFlags::EXEC,
            MapFlags::DEVICE,
        ] {
            let page = LeafAttributes::from_flags(flags).to_page();
            assert!(page.access_flag());
            assert!(page.not_global());
            assert!(page.privileged_execute_never());
            assert!(!page.valid(), "valid is set by the entry constructor");
        }
    }

    #[test]
    fn exec_flag_clears_uxn() {
        let exec = LeafAttributes::from_flags(MapFlags::EXEC);
        assert!(!exec.to_page().user_execute_never());
        assert!(!exec.to_block_2m().user_execute_never());
        assert!(!exec.to_block_1g().user_execute_never());

        let noexec = LeafAttributes::from_flags(MapFlags::WRITE);
        assert!(noexec.to_page().user_execute_never());
        assert!(noexec.to_block_2m().user_execute_never());
        assert!(noexec.to_block_1g().user_execute_never());
    }

    #[test]
    fn bit_exact_page_encoding() {
        // Normal WB (AttrIndx=2), RW, inner-shareable, AF, nG, PXN, UXN:
        // bits: attr=2<<2, AP=0b01<<6, SH=0b11<<8, AF=1<<10, nG=1<<11,
        // PXN=1<<53, UXN=1<<54.
        let page = LeafAttributes::from_flags(MapFlags::WRITE).to_page();
        let expected = (2 << 2) | (0b01 << 6) | (0b11 << 8) | (1 << 10) | (1 << 11)
            | (1u64 << 53)
            | (1u64 << 54);
        // the page-type bit (bit 1) is a construction default
        assert_eq!(page.into_bits() & !0b10, expected);
    }
}
