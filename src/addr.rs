//! Top-down addressing
//!
//! The flash is mapped into the CPU address space such that the last byte of
//! the image lands at `0xffff_ffff`. Pointers stored in the image, like the
//! FIT pointer and the addresses in FIT entries, use that mapping. Converting
//! them into offsets into the image buffer is a matter of subtracting the
//! mapped base, which we call the mask.
//!
//! NOTE: Some tools XOR the mask instead. That only gives the same result for
//! images whose size is a power of two, so we always subtract.

/// Highest address covered by the flash mapping.
pub const TOP: u64 = 0xffff_ffff;

/// Mapped base address of an image of the given size, i.e. `2^32 - size`.
pub const fn mask(image_len: usize) -> u64 {
    TOP.wrapping_sub(image_len as u64).wrapping_add(1)
}

/// Translate the 32-bit FIT pointer into an offset into the image.
pub const fn pointer_to_offset(pointer: u32, mask: u64) -> u32 {
    (pointer as u64).wrapping_sub(mask) as u32
}

/// Translate an offset into the image back into a 32-bit pointer.
pub const fn offset_to_pointer(offset: u32, mask: u64) -> u32 {
    (offset as u64).wrapping_add(mask) as u32
}

/// Translate a 64-bit entry address into an offset into the image.
pub const fn address_to_offset(address: u64, mask: u64) -> u64 {
    address.wrapping_sub(mask)
}

/// Translate an offset into the image back into a 64-bit entry address.
pub const fn offset_to_address(offset: u64, mask: u64) -> u64 {
    offset.wrapping_add(mask)
}

#[test]
fn mask_for_common_sizes() {
    assert_eq!(mask(0x0100_0000), 0xff00_0000);
    assert_eq!(mask(0x0080_0000), 0xff80_0000);
    assert_eq!(mask(0x40), 0xffff_ffc0);
    // not a power of two
    assert_eq!(mask(0x00c0_0000), 0xff40_0000);
}

#[test]
fn pointer_translation() {
    let m = mask(0x0100_0000);
    assert_eq!(pointer_to_offset(0xffff_0000, m), 0x00ff_0000);
    assert_eq!(offset_to_pointer(0x00ff_0000, m), 0xffff_0000);
}

#[test]
fn pointer_round_trip_wraps_at_32_bits() {
    let m = mask(0x1000);
    for p in [0u32, 1, 0x1234_5678, 0xffff_f000, 0xffff_ffff] {
        assert_eq!(offset_to_pointer(pointer_to_offset(p, m), m), p);
    }
}

#[test]
fn address_round_trip_wraps_at_64_bits() {
    let m = mask(0x00c0_0000);
    for a in [0u64, 0xff40_0000, 0xffff_ffc0, u64::MAX] {
        assert_eq!(offset_to_address(address_to_offset(a, m), m), a);
    }
    // An unset (zero) address wraps around instead of failing.
    assert_eq!(address_to_offset(0, m), 0u64.wrapping_sub(0xff40_0000));
}
