//! Utility module
//!
//! This module provides common utilities and helper functions used
//! throughout the library.

use crc32fast::Hasher;

/// Computes the IEEE CRC-32 of a byte slice
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}
