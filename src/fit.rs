//! Firmware Interface Table (FIT)
//!
//! The FIT lists boot-critical components, such as microcode updates, the
//! Startup ACM and Boot Guard manifests, for the CPU to find before any
//! firmware code runs. A pointer to it is found 0x40 bytes below the end of the
//! image (i.e. at 0xffff_ffc0 when mapped), see [`crate::addr`].
//!
//! For reference, see the Intel Firmware Interface Table BIOS Specification,
//! document 338505, and coreboot `src/cpu/intel/fit/`
//! and <https://github.com/linuxboot/fiano/tree/main/pkg/intel/metadata/fit>.
//!
//! The table is a linear array of 16-byte records. The first one is the header:
//! its address field holds the signature, and its size field is the number of
//! records in the table, including the header itself.

use core::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::addr;

pub mod entry;
pub mod kind;

use entry::{ENTRY_SIZE, FitEntry};
use kind::FitType;

pub const FIT_SIGNATURE: &[u8; 8] = b"_FIT_   ";
const SIGNATURE_SIZE: usize = FIT_SIGNATURE.len();

/// Distance of the FIT pointer from the end of the image
pub const POINTER_OFFSET: usize = 0x40;
const POINTER_SIZE: usize = 4;

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub enum FitError {
    /// Not even room for the FIT pointer
    TooShort { size: usize },
    /// The FIT pointer points past the end of the image
    OutOfRange { offset: u32, size: usize },
    InvalidSignature { offset: u32, found: Vec<u8> },
    /// The first record is not of the header type
    MissingHeader { found: u8 },
    /// The header declares more records than the image can hold
    TableOverflow { entries: u32, offset: u32, size: usize },
    TruncatedEntry { index: usize, offset: usize },
}

impl Display for FitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { size } => write!(
                f,
                "image too small for a FIT pointer: 0x{size:x} bytes, need at least 0x{POINTER_OFFSET:x}"
            ),
            Self::OutOfRange { offset, size } => write!(
                f,
                "FIT @ 0x{offset:08x} is outside of the image (0x{size:08x} bytes)"
            ),
            Self::InvalidSignature { offset, found } => {
                let s = String::from_utf8_lossy(found);
                write!(
                    f,
                    "FIT signature @ 0x{offset:08x} not as expected, got: {s:?} ({found:02x?})"
                )
            }
            Self::MissingHeader { found } => {
                let t = FitType::from(*found);
                write!(
                    f,
                    "FIT does not begin with a header entry, got type 0x{found:02x} ({t})"
                )
            }
            Self::TableOverflow {
                entries,
                offset,
                size,
            } => write!(
                f,
                "FIT @ 0x{offset:08x} with {entries} entries does not fit into the image (0x{size:08x} bytes)"
            ),
            Self::TruncatedEntry { index, offset } => {
                write!(f, "FIT entry {index} @ 0x{offset:08x} is truncated")
            }
        }
    }
}

impl std::error::Error for FitError {}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct FitHeader {
    pub signature: String,
    pub entry: FitEntry,
}

impl Display for FitHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.signature.trim_end();
        let n = self.entry.size;
        let v = self.entry.version;
        let cs = if self.entry.checksum_available {
            format!("{:02x}", self.entry.checksum)
        } else {
            "--".to_string()
        };
        write!(f, "{s} {n} entries, version 0x{v:04x}, checksum {cs}")
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct Fit {
    /// Offset of the table in the image
    pub offset: u32,
    /// Mapped base address of the image, see [`addr::mask`]
    pub mask: u64,
    pub header: FitHeader,
    /// All records following the header, in on-disk order
    pub entries: Vec<FitEntry>,
}

/// Read the raw FIT pointer from the end of the image.
pub fn pointer(data: &[u8]) -> Result<u32, FitError> {
    let size = data.len();
    let Some(o) = size.checked_sub(POINTER_OFFSET) else {
        return Err(FitError::TooShort { size });
    };
    let b = &data[o..o + POINTER_SIZE];
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

impl Fit {
    /// Get the offset of the FIT in the image, based on the FIT pointer.
    pub fn locate(data: &[u8]) -> Result<u32, FitError> {
        let size = data.len();
        let p = pointer(data)?;
        let offset = addr::pointer_to_offset(p, addr::mask(size));
        if offset as usize > size {
            return Err(FitError::OutOfRange { offset, size });
        }
        Ok(offset)
    }

    fn parse_header(data: &[u8], offset: u32, mask: u64) -> Result<FitHeader, FitError> {
        let size = data.len();
        let o = offset as usize;
        let sig = &data[o..size.min(o + SIGNATURE_SIZE)];
        if sig != FIT_SIGNATURE {
            return Err(FitError::InvalidSignature {
                offset,
                found: sig.to_vec(),
            });
        }

        let entry = FitEntry::parse(&data[o..], 0, o, mask)?;
        if entry.entry_type != FitType::Header {
            return Err(FitError::MissingHeader {
                found: entry.entry_type.into(),
            });
        }
        // NOTE: The size of the header is the number of entries.
        let entries = entry.size;
        if entries as usize * ENTRY_SIZE > size - o {
            return Err(FitError::TableOverflow {
                entries,
                offset,
                size,
            });
        }

        Ok(FitHeader {
            signature: String::from_utf8_lossy(sig).to_string(),
            entry,
        })
    }

    pub fn parse(data: &[u8]) -> Result<Self, FitError> {
        let offset = Self::locate(data)?;
        let mask = addr::mask(data.len());
        let header = Self::parse_header(data, offset, mask)?;

        // NOTE: Skip the header itself. A header claiming no entries at all
        // yields an empty table.
        let base = offset as usize;
        let entries = (1..header.entry.size as usize)
            .map(|i| {
                let o = base + i * ENTRY_SIZE;
                FitEntry::parse(&data[o..], i, o, mask)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            offset,
            mask,
            header,
            entries,
        })
    }

    /// Number of records as declared by the header, including the header.
    pub fn entry_count(&self) -> usize {
        self.header.entry.size as usize
    }

    pub fn entries_of_type(&self, t: FitType) -> impl Iterator<Item = &FitEntry> {
        self.entries.iter().filter(move |e| e.entry_type == t)
    }
}

#[cfg(test)]
use crate::EMPTY;

#[cfg(test)]
use entry::record;

#[cfg(test)]
static DATA: &[u8] = include_bytes!("../tests/fit.bin");

/// Create an erased image with the given records at `table_offset` and the
/// FIT pointer referring to them.
#[cfg(test)]
fn image(size: usize, table_offset: usize, records: &[[u8; ENTRY_SIZE]]) -> Vec<u8> {
    let mut d = vec![EMPTY; size];
    let p = addr::offset_to_pointer(table_offset as u32, addr::mask(size));
    let po = size - POINTER_OFFSET;
    d[po..po + POINTER_SIZE].copy_from_slice(&p.to_le_bytes());
    for (i, r) in records.iter().enumerate() {
        let o = table_offset + i * ENTRY_SIZE;
        d[o..o + ENTRY_SIZE].copy_from_slice(r);
    }
    d
}

#[cfg(test)]
fn header(entries: u32, ct: u8) -> [u8; ENTRY_SIZE] {
    let [s0, s1, s2, _] = entries.to_le_bytes();
    let sig = u64::from_le_bytes(*FIT_SIGNATURE);
    record(sig, [s0, s1, s2], 0x0100, ct, 0)
}

#[test]
fn parse_fixture() {
    let fit = Fit::parse(DATA).unwrap();
    assert_eq!(fit.offset, 0xe00);
    assert_eq!(fit.mask, 0xffff_f000);
    assert_eq!(fit.header.signature, "_FIT_   ");
    assert_eq!(fit.entry_count(), 5);
    assert_eq!(fit.entries.len() + 1, fit.entry_count());

    let types: Vec<String> = fit.entries.iter().map(|e| e.entry_type.to_string()).collect();
    assert_eq!(
        types,
        [
            "MICROCODE_UPDATE",
            "MICROCODE_UPDATE",
            "STARTUP_AC_MODULE",
            "BIOS_STARTUP_MODULE"
        ]
    );

    let ucode: Vec<u64> = fit
        .entries_of_type(FitType::MicrocodeUpdate)
        .map(|e| e.address)
        .collect();
    assert_eq!(ucode, [0x100, 0x400]);

    let acm = &fit.entries[2];
    assert_eq!(acm.image_offset(DATA.len()), Some(0x800));
    assert_eq!(acm.version, 0x0100);
    assert!(!acm.checksum_available);

    let bsm = &fit.entries[3];
    assert_eq!(bsm.size, 0x0000_0020);
    assert!(bsm.checksum_available);
    assert_eq!(bsm.checksum, 0x3c);
}

#[test]
fn locate_fixture() {
    assert_eq!(pointer(DATA).unwrap(), 0xffff_fe00);
    assert_eq!(Fit::locate(DATA).unwrap(), 0xe00);
}

#[test]
fn parse_is_idempotent() {
    assert_eq!(Fit::parse(DATA), Fit::parse(DATA));
}

#[test]
fn too_short() {
    let d = vec![EMPTY; 0x3f];
    assert_eq!(Fit::parse(&d), Err(FitError::TooShort { size: 0x3f }));
    assert_eq!(Fit::parse(&[]), Err(FitError::TooShort { size: 0 }));
}

#[test]
fn smallest_image() {
    // The pointer occupies the first 4 bytes, the table the remaining 48.
    let r1 = record(0xffff_ffc0, [0; 3], 0x0100, 0x01, 0);
    let r2 = record(0xffff_ffc4, [0; 3], 0x0100, 0x02, 0);
    let d = image(0x40, 0x10, &[header(3, 0), r1, r2]);
    let fit = Fit::parse(&d).unwrap();
    assert_eq!(fit.offset, 0x10);
    assert_eq!(fit.mask, 0xffff_ffc0);
    assert_eq!(fit.entries.len(), 2);
    assert_eq!(fit.entries[0].address, 0);
    assert_eq!(fit.entries[1].address, 4);
}

#[test]
fn pointer_out_of_range() {
    let mut d = vec![EMPTY; 0x1000];
    // translates to 0x1010
    d[0xfc0..0xfc4].copy_from_slice(&0x10u32.to_le_bytes());
    assert_eq!(
        Fit::parse(&d),
        Err(FitError::OutOfRange {
            offset: 0x1010,
            size: 0x1000
        })
    );
}

#[test]
fn pointer_to_end_of_image() {
    let mut d = vec![EMPTY; 0x1000];
    // translates to 0x1000, which is in range, but there is nothing left
    d[0xfc0..0xfc4].copy_from_slice(&0u32.to_le_bytes());
    assert_eq!(
        Fit::parse(&d),
        Err(FitError::InvalidSignature {
            offset: 0x1000,
            found: vec![]
        })
    );
}

#[test]
fn bad_signature() {
    let sig = u64::from_le_bytes(*b"BADSIGN!");
    let d = image(0x1000, 0x800, &[record(sig, [1, 0, 0], 0x0100, 0, 0)]);
    assert_eq!(
        Fit::parse(&d),
        Err(FitError::InvalidSignature {
            offset: 0x800,
            found: b"BADSIGN!".to_vec()
        })
    );
}

#[test]
fn signature_is_exact() {
    for s in [b"_fit_   ", b"_FIT_\0\0\0", b" _FIT_  "] {
        let sig = u64::from_le_bytes(*s);
        let d = image(0x1000, 0x800, &[record(sig, [1, 0, 0], 0x0100, 0, 0)]);
        assert!(matches!(
            Fit::parse(&d),
            Err(FitError::InvalidSignature { .. })
        ));
    }
}

#[test]
fn missing_header() {
    let d = image(0x1000, 0x800, &[header(1, 0x01)]);
    assert_eq!(Fit::parse(&d), Err(FitError::MissingHeader { found: 0x01 }));
}

#[test]
fn header_with_checksum() {
    // Bit 7 is the checksum flag, the type is still 0.
    let d = image(0x1000, 0x800, &[header(1, 0x80)]);
    let fit = Fit::parse(&d).unwrap();
    assert_eq!(fit.header.entry.entry_type, FitType::Header);
    assert!(fit.header.entry.checksum_available);
    assert!(fit.entries.is_empty());
}

#[test]
fn table_overflow() {
    // Only 3 records fit between 0xfd0 and the end of the image.
    let r = record(0xffff_f100, [0; 3], 0x0100, 0x01, 0);
    let d = image(0x1000, 0xfd0, &[header(5, 0), r, r]);
    assert_eq!(
        Fit::parse(&d),
        Err(FitError::TableOverflow {
            entries: 5,
            offset: 0xfd0,
            size: 0x1000
        })
    );
}

#[test]
fn table_up_to_the_end() {
    let r = record(0xffff_f100, [0; 3], 0x0100, 0x01, 0);
    let d = image(0x1000, 0xfd0, &[header(3, 0), r, r]);
    let fit = Fit::parse(&d).unwrap();
    assert_eq!(fit.entries.len(), 2);
}

#[test]
fn header_type_in_entry() {
    let r1 = record(0xffff_f100, [0; 3], 0x0100, 0x01, 0);
    let r2 = record(0xffff_f200, [0; 3], 0x0100, 0x80, 0x11);
    let d = image(0x1000, 0x800, &[header(3, 0), r1, r2]);
    let fit = Fit::parse(&d).unwrap();
    let e = &fit.entries[1];
    assert_eq!(e.entry_type.to_string(), "FIT_HEADER");
    assert!(e.checksum_available);
    assert_eq!(e.checksum, 0x11);
}

#[test]
fn reserved_types_in_table() {
    let r1 = record(0xffff_f100, [0; 3], 0, 0x31, 0);
    let r2 = record(0xffff_f200, [0; 3], 0, 0x7f, 0);
    let d = image(0x1000, 0x800, &[header(3, 0), r1, r2]);
    let fit = Fit::parse(&d).unwrap();
    assert_eq!(fit.entries[0].entry_type.to_string(), "OEM_RESERVED");
    assert_eq!(fit.entries[1].entry_type.to_string(), "INTEL_RESERVED");
}

#[test]
fn empty_header() {
    let d = image(0x1000, 0x800, &[header(0, 0)]);
    let fit = Fit::parse(&d).unwrap();
    assert_eq!(fit.entry_count(), 0);
    assert!(fit.entries.is_empty());
}

#[test]
fn mask_is_shared() {
    // The same raw address decodes the same in every entry.
    let r = record(0xffff_f100, [0; 3], 0x0100, 0x01, 0);
    let d = image(0x1000, 0x800, &[header(4, 0), r, r, r]);
    let fit = Fit::parse(&d).unwrap();
    assert_eq!(fit.mask, addr::mask(d.len()));
    assert!(fit.entries.iter().all(|e| e.address == 0x100));
    let p = addr::offset_to_pointer(fit.offset, fit.mask);
    assert_eq!(pointer(&d).unwrap(), p);
}

#[test]
fn non_power_of_two_image() {
    let size = 0x3000;
    let mask = addr::mask(size);
    let r = record(addr::offset_to_address(0x2100, mask), [0; 3], 0x0100, 0x01, 0);
    let d = image(size, 0x1800, &[header(2, 0), r]);
    let fit = Fit::parse(&d).unwrap();
    assert_eq!(fit.entries[0].address, 0x2100);
    assert_eq!(fit.entries[0].image_offset(size), Some(0x2100));
}

#[test]
fn error_messages() {
    let e = FitError::InvalidSignature {
        offset: 0x800,
        found: b"BADSIGN!".to_vec(),
    };
    assert!(e.to_string().contains("\"BADSIGN!\""));
    let e = FitError::MissingHeader { found: 0x31 };
    assert!(e.to_string().contains("OEM_RESERVED"));
}
