//! In-memory stand-in for a target process, for tests.

use std::ops::Range;

use super::{ReadMemory, RegionInfo};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub struct MockMemoryBuilder {
    base: u64,
    data: Vec<u8>,
    regions: Vec<RegionInfo>,
    unreadable: Vec<Range<u64>>,
}

impl MockMemoryBuilder {
    pub fn new(base: u64) -> Self {
        Self {
            base,
            ..Default::default()
        }
    }

    /// Place `bytes` at `offset` from the base, growing the buffer as needed
    pub fn with_bytes(mut self, offset: usize, bytes: &[u8]) -> Self {
        let end = offset + bytes.len();
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
        self.data[offset..end].copy_from_slice(bytes);
        self
    }

    pub fn with_u32(self, offset: usize, value: u32) -> Self {
        self.with_bytes(offset, &value.to_le_bytes())
    }

    pub fn with_region(mut self, base: u64, size: u64, readable: bool, executable: bool) -> Self {
        self.regions.push(RegionInfo {
            base,
            size,
            readable,
            executable,
        });
        self
    }

    /// Make reads touching `range` fail even inside a readable region
    pub fn unreadable(mut self, range: Range<u64>) -> Self {
        self.unreadable.push(range);
        self
    }

    pub fn build(self) -> MockMemoryReader {
        MockMemoryReader {
            base: self.base,
            data: self.data,
            regions: self.regions,
            unreadable: self.unreadable,
        }
    }
}

#[derive(Debug)]
pub struct MockMemoryReader {
    base: u64,
    data: Vec<u8>,
    regions: Vec<RegionInfo>,
    unreadable: Vec<Range<u64>>,
}

impl MockMemoryReader {
    pub fn base_address(&self) -> u64 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }
}

impl ReadMemory for MockMemoryReader {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let end = address.saturating_add(size as u64);
        if self
            .unreadable
            .iter()
            .any(|r| address < r.end && r.start < end)
        {
            return Err(Error::MemoryReadFailed {
                address,
                message: "page is not readable".to_string(),
            });
        }

        let offset = address
            .checked_sub(self.base)
            .map(|o| o as usize)
            .ok_or_else(|| Error::MemoryReadFailed {
                address,
                message: "address below mock base".to_string(),
            })?;

        self.data
            .get(offset..offset + size)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| Error::MemoryReadFailed {
                address,
                message: "address beyond mock data".to_string(),
            })
    }

    fn regions(&self, base: u64, size: u64) -> Result<Vec<RegionInfo>> {
        if self.regions.is_empty() {
            return Ok(vec![RegionInfo {
                base,
                size,
                readable: true,
                executable: true,
            }]);
        }
        Ok(self.regions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_reads_and_failures() {
        let reader = MockMemoryBuilder::new(0x400000)
            .with_u32(4, 0xDEADBEEF)
            .unreadable(0x400000..0x400002)
            .build();

        assert_eq!(reader.base_address(), 0x400000);
        assert_eq!(reader.len(), 8);
        assert_eq!(reader.read_u32(0x400004).unwrap(), 0xDEADBEEF);
        assert!(reader.read_bytes(0x400001, 2).is_err());
        assert!(reader.read_bytes(0x3FFFFF, 1).is_err());
        assert!(reader.read_bytes(0x400006, 4).is_err());
    }
}
