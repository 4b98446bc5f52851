//! Address Space Reader
//!
//! [`AddressSpace`] is the only way the walkers touch image memory. Every
//! read is bounds checked against the declared segments; a wild pointer turns
//! into [`Fault::OutOfRange`] instead of a host memory access.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{Address, Arch, Endian, Fault};

/// Byte-addressable, read-only view of a captured memory image.
pub trait AddressSpace: Send + Sync {
    /// Fill `buf` with the bytes at `address`.
    ///
    /// Fails with [`Fault::OutOfRange`] if `buf` is empty or the range is not
    /// entirely inside a single segment.
    fn read_into(&self, address: Address, buf: &mut [u8]) -> Result<(), Fault>;

    /// Whether `address` falls inside any segment.
    fn is_valid(&self, address: Address) -> bool;

    fn read(&self, address: Address, size: usize) -> Result<Vec<u8>, Fault> {
        let mut buf = vec![0u8; size];
        self.read_into(address, &mut buf)?;
        Ok(buf)
    }

    fn read_u64(&self, address: Address, endian: Endian) -> Result<u64, Fault> {
        let mut buf = [0u8; 8];
        self.read_into(address, &mut buf)?;
        Ok(endian.u64_from(buf))
    }

    fn read_u32(&self, address: Address, endian: Endian) -> Result<u32, Fault> {
        let mut buf = [0u8; 4];
        self.read_into(address, &mut buf)?;
        Ok(endian.u32_from(buf))
    }

    /// Read one pointer-sized word.
    fn read_word(&self, address: Address, arch: Arch) -> Result<u64, Fault> {
        match arch.word_size() {
            4 => self.read_u32(address, arch.endian()).map(u64::from),
            _ => self.read_u64(address, arch.endian()),
        }
    }

    fn read_pointer(&self, address: Address, arch: Arch) -> Result<Address, Fault> {
        self.read_word(address, arch).map(Address)
    }
}

impl<T: AddressSpace + ?Sized> AddressSpace for &T {
    fn read_into(&self, address: Address, buf: &mut [u8]) -> Result<(), Fault> {
        (**self).read_into(address, buf)
    }

    fn is_valid(&self, address: Address) -> bool {
        (**self).is_valid(address)
    }
}

impl<T: AddressSpace + ?Sized> AddressSpace for Arc<T> {
    fn read_into(&self, address: Address, buf: &mut [u8]) -> Result<(), Fault> {
        (**self).read_into(address, buf)
    }

    fn is_valid(&self, address: Address) -> bool {
        (**self).is_valid(address)
    }
}

/// Errors building a [`SegmentedImage`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageError {
    #[error("segment at {0} is empty")]
    EmptySegment(Address),

    #[error("segment at {start} with {len} bytes runs past the end of the address space")]
    AddressOverflow { start: Address, len: usize },

    #[error("segment at {start} overlaps segment at {existing}")]
    Overlap { start: Address, existing: Address },
}

/// One contiguous, readable range `[start, start + len)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    start: Address,
    bytes: Vec<u8>,
}

impl Segment {
    pub fn start(&self) -> Address {
        self.start
    }

    /// One past the last byte.
    pub fn end(&self) -> u64 {
        self.start.0 + self.bytes.len() as u64
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn contains(&self, address: Address) -> bool {
        self.start.0 <= address.0 && address.0 < self.end()
    }
}

/// In-memory image made of non-overlapping segments.
#[derive(Debug, Clone, Default)]
pub struct SegmentedImage {
    segments: BTreeMap<u64, Segment>,
}

impl SegmentedImage {
    pub fn builder() -> ImageBuilder {
        ImageBuilder::default()
    }

    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.values()
    }

    /// The segment containing `address`.
    pub fn segment_for(&self, address: Address) -> Option<&Segment> {
        self.segments
            .range(..=address.0)
            .next_back()
            .map(|(_, seg)| seg)
            .filter(|seg| seg.contains(address))
    }
}

impl AddressSpace for SegmentedImage {
    fn read_into(&self, address: Address, buf: &mut [u8]) -> Result<(), Fault> {
        let out_of_range = Fault::OutOfRange {
            address,
            len: buf.len(),
        };
        if buf.is_empty() {
            return Err(out_of_range);
        }
        let seg = self.segment_for(address).ok_or_else(|| out_of_range.clone())?;
        let start = (address.0 - seg.start.0) as usize;
        let end = start.checked_add(buf.len()).ok_or_else(|| out_of_range.clone())?;
        let src = seg.bytes.get(start..end).ok_or(out_of_range)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn is_valid(&self, address: Address) -> bool {
        self.segment_for(address).is_some()
    }
}

/// Builder for [`SegmentedImage`].
///
/// Segment validation is deferred to [`ImageBuilder::build`] so segments can
/// be added in any order.
#[derive(Debug, Default)]
pub struct ImageBuilder {
    segments: Vec<Segment>,
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segment(mut self, start: impl Into<Address>, bytes: impl Into<Vec<u8>>) -> Self {
        self.segments.push(Segment {
            start: start.into(),
            bytes: bytes.into(),
        });
        self
    }

    pub fn build(self) -> Result<SegmentedImage, ImageError> {
        let mut segments: BTreeMap<u64, Segment> = BTreeMap::new();
        for seg in self.segments {
            if seg.bytes.is_empty() {
                return Err(ImageError::EmptySegment(seg.start));
            }
            if seg.start.0.checked_add(seg.bytes.len() as u64).is_none() {
                return Err(ImageError::AddressOverflow {
                    start: seg.start,
                    len: seg.bytes.len(),
                });
            }
            let before = segments.range(..=seg.start.0).next_back().map(|(_, s)| s);
            let after = segments.range(seg.start.0..).next().map(|(_, s)| s);
            let clash = before
                .filter(|s| s.end() > seg.start.0)
                .or(after.filter(|s| s.start.0 < seg.end()));
            if let Some(existing) = clash {
                return Err(ImageError::Overlap {
                    start: seg.start,
                    existing: existing.start,
                });
            }
            tracing::trace!(start = %seg.start, len = seg.bytes.len(), "adding image segment");
            segments.insert(seg.start.0, seg);
        }
        Ok(SegmentedImage { segments })
    }
}
