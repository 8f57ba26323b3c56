//! FIT entry records
//!
//! Every record in the table, including the header, is 16 bytes:
//!
//! | bytes | field                                              |
//! | ----- | -------------------------------------------------- |
//! | 0..8  | address                                            |
//! | 8..11 | size, 24 bits                                      |
//! | 11    | reserved                                           |
//! | 12..14| version                                            |
//! | 14    | bit 7: checksum available, bits 0..6: type         |
//! | 15    | checksum                                           |
//!
//! All multi-byte fields are little-endian.

use core::fmt::{self, Display};

use bitfield_struct::bitfield;
use serde::{Deserialize, Serialize};
use zerocopy::FromBytes;
use zerocopy::byteorder::{LittleEndian, U16, U64};
use zerocopy_derive::{FromBytes, Immutable, IntoBytes};

use crate::addr;
use crate::fit::{FitError, kind::FitType};

type LU16 = U16<LittleEndian>;
type LU64 = U64<LittleEndian>;

pub const ENTRY_SIZE: usize = 16;

#[bitfield(u8)]
#[derive(Immutable, IntoBytes, FromBytes)]
struct ChecksumAndType {
    #[bits(7)]
    kind: u8,
    checksum_available: bool,
}

/// The record as it is laid out in flash.
#[derive(Immutable, IntoBytes, FromBytes, Clone, Copy, Debug)]
#[repr(C)]
struct RawEntry {
    address: LU64,
    size: [u8; 3],
    reserved: u8,
    version: LU16,
    checksum_and_type: ChecksumAndType,
    checksum: u8,
}

const _: () = assert!(core::mem::size_of::<RawEntry>() == ENTRY_SIZE);

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq)]
pub struct FitEntry {
    /// Already translated, see [`addr::address_to_offset`].
    pub address: u64,
    /// For the header, this is the number of entries including itself.
    pub size: u32,
    pub reserved: u8,
    pub version: u16,
    pub entry_type: FitType,
    pub checksum_available: bool,
    /// Only meaningful if `checksum_available` is set.
    pub checksum: u8,
}

impl FitEntry {
    fn decode(raw: RawEntry, mask: u64) -> Self {
        let [s0, s1, s2] = raw.size;
        // 24 bits, zero-extended
        let size = u32::from_le_bytes([s0, s1, s2, 0]);
        let ct = raw.checksum_and_type;
        Self {
            address: addr::address_to_offset(raw.address.get(), mask),
            size,
            reserved: raw.reserved,
            version: raw.version.get(),
            entry_type: FitType::from(ct.kind()),
            checksum_available: ct.checksum_available(),
            checksum: raw.checksum,
        }
    }

    /// Decode the record at the start of `data`. `index` is the position in
    /// the table and `offset` where `data` starts in the image, both only used
    /// for error reporting.
    pub fn parse(data: &[u8], index: usize, offset: usize, mask: u64) -> Result<Self, FitError> {
        match RawEntry::read_from_prefix(data) {
            Ok((raw, _)) => Ok(Self::decode(raw, mask)),
            Err(_) => Err(FitError::TruncatedEntry { index, offset }),
        }
    }

    /// Offset of the referenced data in an image of the given size, if the
    /// address points into the image at all.
    pub fn image_offset(&self, image_len: usize) -> Option<usize> {
        let o = usize::try_from(self.address).ok()?;
        (o < image_len).then_some(o)
    }
}

impl Display for FitEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = self.address;
        let s = self.size;
        let v = self.version;
        let t = self.entry_type.to_string();
        let tv = u8::from(self.entry_type);
        let cs = if self.checksum_available {
            format!("{:02x}", self.checksum)
        } else {
            "--".to_string()
        };
        write!(
            f,
            "{t:<23} ({tv:02x}) @ 0x{a:08x} size 0x{s:06x} version 0x{v:04x} checksum {cs}"
        )
    }
}

#[cfg(test)]
pub(crate) fn record(address: u64, size: [u8; 3], version: u16, ct: u8, checksum: u8) -> [u8; 16] {
    let mut r = [0u8; ENTRY_SIZE];
    r[0..8].copy_from_slice(&address.to_le_bytes());
    r[8..11].copy_from_slice(&size);
    r[11] = 0xa5;
    r[12..14].copy_from_slice(&version.to_le_bytes());
    r[14] = ct;
    r[15] = checksum;
    r
}

#[test]
fn decode_fields() {
    let mask = addr::mask(0x0100_0000);
    let r = record(0xffe0_0000, [0x01, 0x02, 0x03], 0x0100, 0x81, 0x5a);
    let e = FitEntry::parse(&r, 1, 0, mask).unwrap();
    assert_eq!(e.address, 0x00e0_0000);
    assert_eq!(e.size, 0x0003_0201);
    assert_eq!(e.reserved, 0xa5);
    assert_eq!(e.version, 0x0100);
    assert_eq!(e.entry_type, FitType::MicrocodeUpdate);
    assert!(e.checksum_available);
    assert_eq!(e.checksum, 0x5a);
}

#[test]
fn size_is_not_sign_extended() {
    let r = record(0, [0xff, 0xff, 0xff], 0, 0, 0);
    let e = FitEntry::parse(&r, 0, 0, 0).unwrap();
    assert_eq!(e.size, 0x00ff_ffff);
}

#[test]
fn type_and_checksum_flag_are_independent() {
    for b in 0..=u8::MAX {
        let r = record(0, [0; 3], 0, b, 0);
        let e = FitEntry::parse(&r, 0, 0, 0).unwrap();
        assert_eq!(u8::from(e.entry_type), b & 0x7f);
        assert_eq!(e.checksum_available, b & 0x80 != 0);
    }
}

#[test]
fn checksum_kept_without_flag() {
    let r = record(0, [0; 3], 0, 0x01, 0x42);
    let e = FitEntry::parse(&r, 0, 0, 0).unwrap();
    assert!(!e.checksum_available);
    assert_eq!(e.checksum, 0x42);
}

#[test]
fn checksum_flag_on_type_zero() {
    let r = record(0, [0; 3], 0, 0x80, 0);
    let e = FitEntry::parse(&r, 3, 0, 0).unwrap();
    assert_eq!(e.entry_type.to_string(), "FIT_HEADER");
    assert!(e.checksum_available);
}

#[test]
fn truncated() {
    let r = record(0, [0; 3], 0, 0, 0);
    let res = FitEntry::parse(&r[..15], 2, 0x1020, 0);
    assert_eq!(
        res,
        Err(FitError::TruncatedEntry {
            index: 2,
            offset: 0x1020
        })
    );
}

#[test]
fn offset_in_image() {
    let mask = addr::mask(0x1000);
    let r = record(0xffff_f800, [0; 3], 0, 1, 0);
    let e = FitEntry::parse(&r, 1, 0, mask).unwrap();
    assert_eq!(e.image_offset(0x1000), Some(0x800));
    let r = record(0xfeff_0000, [0; 3], 0, 1, 0);
    let e = FitEntry::parse(&r, 1, 0, mask).unwrap();
    assert_eq!(e.image_offset(0x1000), None);
}
