use std::ops::Range;
use std::sync::{Mutex, MutexGuard};

use crate::core::{Error, Result, UNFRAGMENTED_DATA_SIZE};
use crate::link::FragmentStore;
use crate::util;

/// Fixed-size buffer the fragment decoder reassembles downlink files into
pub struct ReassemblyBuffer {
    data: Mutex<Vec<u8>>,
    capacity: usize,
}

impl ReassemblyBuffer {
    pub fn new(capacity: usize) -> Self {
        ReassemblyBuffer {
            data: Mutex::new(vec![0; capacity]),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn span(&self, addr: u32, len: usize) -> Result<Range<usize>> {
        let start = addr as usize;
        match start.checked_add(len) {
            Some(end) if end <= self.capacity => Ok(start..end),
            _ => Err(Error::DecoderFault {
                addr,
                len,
                capacity: self.capacity,
            }),
        }
    }

    /// CRC-32 over the first `size` bytes of the reassembled file
    pub fn checksum(&self, size: u32) -> Result<u32> {
        let span = self.span(0, size as usize)?;
        Ok(util::crc32(&self.lock()[span]))
    }
}

impl Default for ReassemblyBuffer {
    fn default() -> Self {
        ReassemblyBuffer::new(UNFRAGMENTED_DATA_SIZE)
    }
}

impl FragmentStore for ReassemblyBuffer {
    fn write(&self, addr: u32, data: &[u8]) -> Result<()> {
        let span = self.span(addr, data.len())?;
        self.lock()[span].copy_from_slice(data);
        Ok(())
    }

    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<()> {
        let span = self.span(addr, buf.len())?;
        buf.copy_from_slice(&self.lock()[span]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}
