use crate::error::{Error, Result};

/// Protection summary of one committed memory region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionInfo {
    pub base: u64,
    pub size: u64,
    pub readable: bool,
    pub executable: bool,
}

impl RegionInfo {
    pub fn end(&self) -> u64 {
        self.base.saturating_add(self.size)
    }
}

/// Read-only access to another address space.
///
/// Implementations must never change page protections; unreadable memory is
/// reported as an error, not made readable.
pub trait ReadMemory {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>>;

    /// Regions covering `[base, base + size)`.
    ///
    /// The default treats the whole range as one readable, executable region,
    /// which suits flat dumps.
    fn regions(&self, base: u64, size: u64) -> Result<Vec<RegionInfo>> {
        Ok(vec![RegionInfo {
            base,
            size,
            readable: true,
            executable: true,
        }])
    }

    fn read_u32(&self, address: u64) -> Result<u32> {
        let bytes = self.read_bytes(address, 4)?;
        Ok(u32::from_le_bytes(fixed(&bytes, address)?))
    }

    fn read_u64(&self, address: u64) -> Result<u64> {
        let bytes = self.read_bytes(address, 8)?;
        Ok(u64::from_le_bytes(fixed(&bytes, address)?))
    }
}

fn fixed<const N: usize>(bytes: &[u8], address: u64) -> Result<[u8; N]> {
    bytes.try_into().map_err(|_| Error::MemoryReadFailed {
        address,
        message: format!("short read: expected {} bytes, got {}", N, bytes.len()),
    })
}

impl<T: ReadMemory + ?Sized> ReadMemory for &T {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        (**self).read_bytes(address, size)
    }

    fn regions(&self, base: u64, size: u64) -> Result<Vec<RegionInfo>> {
        (**self).regions(base, size)
    }
}
