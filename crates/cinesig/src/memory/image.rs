//! Bounds-checked snapshots of loaded module images.
//!
//! A [`ModuleImage`] is captured once per attach. Every later read goes through
//! [`ModuleImage::read`], which refuses anything that is not fully inside one
//! captured region. Pages that could not be read are left out as holes.

use std::borrow::Cow;

use tracing::debug;

use super::{ReadMemory, RegionInfo};
use crate::error::{Error, Result};
use crate::module::LoadedModule;
use crate::signature::{AddressClass, PointerWidth};

/// Default read granularity when capturing an image (1MB)
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Contiguous readable bytes of an image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRegion {
    start: u64,
    bytes: Vec<u8>,
    executable: bool,
}

impl ImageRegion {
    pub fn new(start: u64, bytes: Vec<u8>, executable: bool) -> Self {
        Self {
            start,
            bytes,
            executable,
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.start + self.bytes.len() as u64
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_executable(&self) -> bool {
        self.executable
    }

    fn slice(&self, address: u64, len: usize) -> Option<&[u8]> {
        let offset = usize::try_from(address.checked_sub(self.start)?).ok()?;
        self.bytes.get(offset..offset.checked_add(len)?)
    }
}

/// Snapshot of one module's address range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleImage {
    name: String,
    base: u64,
    size: u64,
    regions: Vec<ImageRegion>,
}

impl ModuleImage {
    /// Image backed by one flat, executable buffer (dumps and tests)
    pub fn from_bytes(name: impl Into<String>, base: u64, bytes: Vec<u8>) -> Self {
        let size = bytes.len() as u64;
        Self {
            name: name.into(),
            base,
            size,
            regions: vec![ImageRegion::new(base, bytes, true)],
        }
    }

    /// Image from pre-split regions; regions outside `[base, base + size)` are dropped
    pub fn from_regions(
        name: impl Into<String>,
        base: u64,
        size: u64,
        mut regions: Vec<ImageRegion>,
    ) -> Self {
        let end = base.saturating_add(size);
        regions.retain(|r| r.start >= base && r.end() <= end && !r.bytes.is_empty());
        regions.sort_by_key(|r| r.start);
        Self {
            name: name.into(),
            base,
            size,
            regions,
        }
    }

    /// Copy a loaded module out of the target process.
    ///
    /// Only regions reported readable are touched, in chunks of at most
    /// `chunk_size` bytes. A chunk that fails to read becomes a hole.
    pub fn capture<R: ReadMemory>(
        reader: &R,
        module: &LoadedModule,
        chunk_size: usize,
    ) -> Result<Self> {
        let chunk_size = chunk_size.max(1);
        let module_end = module.base.saturating_add(module.size);
        let mut regions: Vec<ImageRegion> = Vec::new();
        let mut holes: u64 = 0;

        for info in reader.regions(module.base, module.size)? {
            let start = info.base.max(module.base);
            let end = info.end().min(module_end);
            if start >= end {
                continue;
            }
            if !info.readable {
                holes += end - start;
                continue;
            }

            let mut addr = start;
            while addr < end {
                let len = chunk_size.min((end - addr) as usize);
                match reader.read_bytes(addr, len) {
                    Ok(bytes) if bytes.len() == len => {
                        push_chunk(&mut regions, addr, bytes, &info);
                    }
                    Ok(bytes) => {
                        debug!(
                            "Short read at 0x{:X}: wanted {} bytes, got {}",
                            addr,
                            len,
                            bytes.len()
                        );
                        holes += len as u64;
                    }
                    Err(e) => {
                        debug!("Skipping unreadable chunk at 0x{:X}: {}", addr, e);
                        holes += len as u64;
                    }
                }
                addr += len as u64;
            }
        }

        if regions.is_empty() {
            return Err(Error::MemoryReadFailed {
                address: module.base,
                message: format!("no readable bytes in module '{}'", module.name),
            });
        }

        let image = Self::from_regions(module.name.clone(), module.base, module.size, regions);
        debug!(
            "Captured {}: base 0x{:X}, size 0x{:X}, {} region(s), 0x{:X} bytes unreadable",
            image.name,
            image.base,
            image.size,
            image.regions.len(),
            holes
        );
        Ok(image)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn end(&self) -> u64 {
        self.base.saturating_add(self.size)
    }

    pub fn regions(&self) -> &[ImageRegion] {
        &self.regions
    }

    /// Whether `address` lies in the module's address range (captured or not)
    pub fn contains(&self, address: u64) -> bool {
        (self.base..self.end()).contains(&address)
    }

    /// Regions a pattern of the given class is matched against
    pub fn scan_regions(&self, class: AddressClass) -> impl Iterator<Item = &ImageRegion> {
        self.regions
            .iter()
            .filter(move |r| class == AddressClass::Data || r.executable)
    }

    /// Address-contiguous byte spans a pattern of the given class is matched against.
    ///
    /// Adjacent regions are joined whatever their protection, so a match may
    /// cross a section boundary but never a hole.
    pub fn scan_spans(&self, class: AddressClass) -> Vec<(u64, Cow<'_, [u8]>)> {
        let mut spans: Vec<(u64, Cow<'_, [u8]>)> = Vec::new();
        for region in self.scan_regions(class) {
            if let Some((start, bytes)) = spans.last_mut()
                && *start + bytes.len() as u64 == region.start
            {
                bytes.to_mut().extend_from_slice(&region.bytes);
                continue;
            }
            spans.push((region.start, Cow::Borrowed(region.bytes.as_slice())));
        }
        spans
    }

    /// Number of captured bytes
    pub fn captured_len(&self) -> usize {
        self.regions.iter().map(|r| r.bytes.len()).sum()
    }

    /// `len` bytes at `address`, only if they sit inside one captured region
    pub fn read(&self, address: u64, len: usize) -> Option<&[u8]> {
        let idx = self.regions.partition_point(|r| r.end() <= address);
        self.regions.get(idx)?.slice(address, len)
    }

    /// Pointer-sized little-endian value at `address`
    pub fn read_pointer(&self, address: u64, width: PointerWidth) -> Option<u64> {
        let bytes = self.read(address, width.bytes())?;
        match width {
            PointerWidth::Bits32 => Some(u32::from_le_bytes(bytes.try_into().ok()?) as u64),
            PointerWidth::Bits64 => Some(u64::from_le_bytes(bytes.try_into().ok()?)),
        }
    }
}

fn push_chunk(regions: &mut Vec<ImageRegion>, addr: u64, bytes: Vec<u8>, info: &RegionInfo) {
    if let Some(last) = regions.last_mut()
        && last.end() == addr
        && last.executable == info.executable
    {
        last.bytes.extend_from_slice(&bytes);
        return;
    }
    regions.push(ImageRegion::new(addr, bytes, info.executable));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MockMemoryBuilder;

    fn module(base: u64, size: u64) -> LoadedModule {
        LoadedModule::new("iw3mp.exe", base, size)
    }

    #[test]
    fn test_read_is_bounds_checked() {
        let image = ModuleImage::from_bytes("a", 0x1000, vec![1, 2, 3, 4, 5, 6, 7, 8]);

        assert_eq!(image.read(0x1000, 4), Some(&[1, 2, 3, 4][..]));
        assert_eq!(image.read(0x1004, 4), Some(&[5, 6, 7, 8][..]));
        assert_eq!(image.read(0x1005, 4), None);
        assert_eq!(image.read(0x0FFF, 2), None);
        assert_eq!(image.read(u64::MAX, 2), None);
        assert!(image.contains(0x1007));
        assert!(!image.contains(0x1008));
    }

    #[test]
    fn test_read_pointer_widths() {
        let bytes = vec![0x78, 0x56, 0x34, 0x12, 0xEF, 0xCD, 0xAB, 0x90];
        let image = ModuleImage::from_bytes("a", 0x400000, bytes);

        assert_eq!(
            image.read_pointer(0x400000, PointerWidth::Bits32),
            Some(0x12345678)
        );
        assert_eq!(
            image.read_pointer(0x400000, PointerWidth::Bits64),
            Some(0x90ABCDEF12345678)
        );
        assert_eq!(image.read_pointer(0x400004, PointerWidth::Bits64), None);
    }

    #[test]
    fn test_reads_do_not_cross_holes() {
        let image = ModuleImage::from_regions(
            "a",
            0x1000,
            0x30,
            vec![
                ImageRegion::new(0x1020, vec![0xBB; 0x10], false),
                ImageRegion::new(0x1000, vec![0xAA; 0x10], true),
            ],
        );

        assert_eq!(image.regions()[0].start(), 0x1000);
        assert!(image.read(0x100E, 2).is_some());
        assert!(image.read(0x100F, 2).is_none());
        assert!(image.read(0x1018, 1).is_none());
        assert_eq!(image.read(0x1020, 1), Some(&[0xBB][..]));
        assert_eq!(image.scan_regions(AddressClass::Code).count(), 1);
        assert_eq!(image.scan_regions(AddressClass::Data).count(), 2);
    }

    #[test]
    fn test_scan_spans_join_adjacent_sections() {
        let image = ModuleImage::from_regions(
            "a",
            0x1000,
            0x300,
            vec![
                ImageRegion::new(0x1000, vec![0xAA; 0x100], true),
                ImageRegion::new(0x1100, vec![0xBB; 0x100], false),
                ImageRegion::new(0x1280, vec![0xCC; 0x10], false),
            ],
        );

        let data = image.scan_spans(AddressClass::Data);
        assert_eq!(data.len(), 2);
        assert_eq!(data[0].0, 0x1000);
        assert_eq!(data[0].1.len(), 0x200);
        assert_eq!(data[0].1[0xFF..0x101], [0xAA, 0xBB]);
        assert_eq!(data[1].0, 0x1280);

        let code = image.scan_spans(AddressClass::Code);
        assert_eq!(code.len(), 1);
        assert_eq!(code[0].1.len(), 0x100);
    }

    #[test]
    fn test_capture_skips_unreadable_chunks_and_merges() {
        let reader = MockMemoryBuilder::new(0x10000)
            .with_bytes(0, &[0x90; 0x400])
            .with_region(0x10000, 0x200, true, true)
            .with_region(0x10200, 0x100, false, false)
            .with_region(0x10300, 0x100, true, false)
            .unreadable(0x10380..0x10390)
            .build();

        let image = ModuleImage::capture(&reader, &module(0x10000, 0x400), 0x80).unwrap();

        // executable chunks merge; the data region loses its failed second chunk
        assert_eq!(image.regions().len(), 2);
        assert_eq!(image.regions()[0].start(), 0x10000);
        assert_eq!(image.regions()[0].bytes().len(), 0x200);
        assert!(image.regions()[0].is_executable());
        assert_eq!(image.regions()[1].end(), 0x10380);
        assert!(!image.regions()[1].is_executable());
        assert!(image.read(0x10200, 1).is_none());
        assert!(image.read(0x10380, 1).is_none());
        assert_eq!(image.captured_len(), 0x200 + 0x80);
    }

    #[test]
    fn test_capture_fails_without_readable_bytes() {
        let reader = MockMemoryBuilder::new(0x10000)
            .with_bytes(0, &[0; 0x100])
            .with_region(0x10000, 0x100, false, false)
            .build();

        let err = ModuleImage::capture(&reader, &module(0x10000, 0x100), 0x80).unwrap_err();
        assert!(matches!(err, Error::MemoryReadFailed { address: 0x10000, .. }));
    }
}
