#![doc = include_str!("../README.md")]

pub mod addr;
pub mod fit;

pub use fit::{Fit, FitError};

// An empty byte in a NOR flash is all-1's.
pub const EMPTY: u8 = 0xff;
