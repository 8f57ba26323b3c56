//! FIT entry types
//!
//! See the Intel Firmware Interface Table BIOS Specification, document 338505,
//! section "FIT Entry Types". Types 0x30 up to 0x70 are left to OEMs, every
//! other value not listed here is reserved by Intel.

use serde::{Deserialize, Serialize};
use strum::Display as StrDisplay;

/// Only the lower 7 bits of the type byte hold the type.
pub const TYPE_MASK: u8 = 0x7f;

pub const OEM_RESERVED_START: u8 = 0x30;
pub const OEM_RESERVED_END: u8 = 0x70;
/// Entries of this type are to be ignored by consumers. There is no separate
/// name for it, it is classified as reserved by Intel.
pub const SKIP: u8 = 0x7f;

#[derive(StrDisplay, Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[serde(from = "u8", into = "u8")]
#[repr(u8)]
pub enum FitType {
    #[strum(serialize = "FIT_HEADER")]
    Header = 0x00,
    #[strum(serialize = "MICROCODE_UPDATE")]
    MicrocodeUpdate = 0x01,
    #[strum(serialize = "STARTUP_AC_MODULE")]
    StartupAcm = 0x02,
    #[strum(serialize = "BIOS_STARTUP_MODULE")]
    BiosStartupModule = 0x07,
    #[strum(serialize = "TPM_POLICY")]
    TpmPolicy = 0x08,
    #[strum(serialize = "BIOS_POLICY")]
    BiosPolicy = 0x09,
    #[strum(serialize = "TXT_POLICY")]
    TxtPolicy = 0x0a,
    #[strum(serialize = "KEY_MANIFEST")]
    KeyManifest = 0x0b,
    #[strum(serialize = "BOOT_POLICY")]
    BootPolicy = 0x0c,
    #[strum(serialize = "CSE_SECURE_BOOT")]
    CseSecureBoot = 0x10,
    #[strum(serialize = "FEATURE_POLICY_DELIVERY")]
    FeaturePolicyDelivery = 0x2d,
    #[strum(serialize = "JMP_DEBUG")]
    JmpDebug = 0x2f,
    #[strum(serialize = "OEM_RESERVED")]
    OemReserved(u8),
    #[strum(serialize = "INTEL_RESERVED")]
    IntelReserved(u8),
}

impl From<u8> for FitType {
    fn from(t: u8) -> Self {
        match t & TYPE_MASK {
            0x00 => Self::Header,
            0x01 => Self::MicrocodeUpdate,
            0x02 => Self::StartupAcm,
            0x07 => Self::BiosStartupModule,
            0x08 => Self::TpmPolicy,
            0x09 => Self::BiosPolicy,
            0x0a => Self::TxtPolicy,
            0x0b => Self::KeyManifest,
            0x0c => Self::BootPolicy,
            0x10 => Self::CseSecureBoot,
            0x2d => Self::FeaturePolicyDelivery,
            0x2f => Self::JmpDebug,
            t @ OEM_RESERVED_START..=OEM_RESERVED_END => Self::OemReserved(t),
            t => Self::IntelReserved(t),
        }
    }
}

impl From<FitType> for u8 {
    fn from(t: FitType) -> Self {
        match t {
            FitType::Header => 0x00,
            FitType::MicrocodeUpdate => 0x01,
            FitType::StartupAcm => 0x02,
            FitType::BiosStartupModule => 0x07,
            FitType::TpmPolicy => 0x08,
            FitType::BiosPolicy => 0x09,
            FitType::TxtPolicy => 0x0a,
            FitType::KeyManifest => 0x0b,
            FitType::BootPolicy => 0x0c,
            FitType::CseSecureBoot => 0x10,
            FitType::FeaturePolicyDelivery => 0x2d,
            FitType::JmpDebug => 0x2f,
            FitType::OemReserved(t) => t,
            FitType::IntelReserved(t) => t,
        }
    }
}

#[test]
fn names() {
    let expected = [
        (0x00, "FIT_HEADER"),
        (0x01, "MICROCODE_UPDATE"),
        (0x02, "STARTUP_AC_MODULE"),
        (0x07, "BIOS_STARTUP_MODULE"),
        (0x08, "TPM_POLICY"),
        (0x09, "BIOS_POLICY"),
        (0x0a, "TXT_POLICY"),
        (0x0b, "KEY_MANIFEST"),
        (0x0c, "BOOT_POLICY"),
        (0x10, "CSE_SECURE_BOOT"),
        (0x2d, "FEATURE_POLICY_DELIVERY"),
        (0x2f, "JMP_DEBUG"),
    ];
    for (t, n) in expected {
        assert_eq!(FitType::from(t).to_string(), n);
    }
}

#[test]
fn reserved_ranges() {
    assert_eq!(FitType::from(0x31).to_string(), "OEM_RESERVED");
    assert_eq!(FitType::from(OEM_RESERVED_START), FitType::OemReserved(0x30));
    assert_eq!(FitType::from(OEM_RESERVED_END), FitType::OemReserved(0x70));
    assert_eq!(FitType::from(0x71), FitType::IntelReserved(0x71));
    assert_eq!(FitType::from(0x03).to_string(), "INTEL_RESERVED");
    assert_eq!(FitType::from(0x2e).to_string(), "INTEL_RESERVED");
    // SKIP has no name of its own.
    assert_eq!(FitType::from(SKIP).to_string(), "INTEL_RESERVED");
}

#[test]
fn value_survives_classification() {
    for t in 0..=TYPE_MASK {
        assert_eq!(u8::from(FitType::from(t)), t);
    }
}

#[test]
fn checksum_bit_is_not_a_type() {
    assert_eq!(FitType::from(0x80), FitType::Header);
    assert_eq!(FitType::from(0xb1), FitType::OemReserved(0x31));
}

#[test]
fn serializes_as_number() {
    let t = FitType::from(0x31);
    assert_eq!(serde_json::to_string(&t).unwrap(), "49");
    let t: FitType = serde_json::from_str("1").unwrap();
    assert_eq!(t, FitType::MicrocodeUpdate);
}
