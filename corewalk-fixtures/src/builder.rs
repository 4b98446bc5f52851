use std::collections::BTreeMap;

use corewalk_core::{Address, AddressSpace, Arch, Fault, ImageBuilder, SegmentedImage};

use crate::FixtureError;

#[derive(Debug)]
struct Section {
    name: &'static str,
    start: u64,
    bytes: Vec<u8>,
}

impl Section {
    fn end(&self) -> u64 {
        self.start + self.bytes.len() as u64
    }
}

/// Lays out named symbols in sections of a synthetic image, the way a
/// linker places C globals, and writes their initial values.
///
/// Write errors are remembered and reported by [`FixtureBuilder::build`] so
/// fixture code can stay a flat sequence of writes.
#[derive(Debug)]
pub struct FixtureBuilder {
    arch: Arch,
    sections: Vec<Section>,
    symbols: BTreeMap<String, Address>,
    error: Option<FixtureError>,
}

impl FixtureBuilder {
    pub fn new(arch: Arch) -> Self {
        Self {
            arch,
            sections: Vec::new(),
            symbols: BTreeMap::new(),
            error: None,
        }
    }

    pub fn arch(&self) -> Arch {
        self.arch
    }

    /// Start a new section at `start`; later allocations go there.
    pub fn section(&mut self, name: &'static str, start: u64) -> &mut Self {
        self.sections.push(Section {
            name,
            start,
            bytes: Vec::new(),
        });
        self
    }

    /// Next free address of the current section.
    pub fn here(&self) -> Address {
        Address(self.sections.last().map_or(0, Section::end))
    }

    fn record(&mut self, error: FixtureError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Bind `name` to `address` without reserving space.
    pub fn define(&mut self, name: &str, address: Address) -> Address {
        if self.symbols.insert(name.to_string(), address).is_some() {
            self.record(FixtureError::DuplicateSymbol(name.to_string()));
        }
        address
    }

    /// Reserve `size` zeroed bytes aligned to `align` in the current section.
    pub fn alloc(&mut self, name: &str, size: usize, align: usize) -> Address {
        let Some(section) = self.sections.last_mut() else {
            self.record(FixtureError::NoSection(name.to_string()));
            return Address::NULL;
        };
        let align = align.max(1) as u64;
        let at = section.end().div_ceil(align) * align;
        let len = (at - section.start) as usize + size;
        section.bytes.resize(len, 0);
        tracing::trace!(
            section = section.name,
            symbol = name,
            address = %Address(at),
            size,
            "allocated fixture symbol"
        );
        self.define(name, Address(at))
    }

    /// Copy `bytes` to `at`, which must lie inside one section.
    pub fn bytes(&mut self, at: Address, bytes: &[u8]) -> &mut Self {
        let end = at.0 + bytes.len() as u64;
        match self
            .sections
            .iter_mut()
            .find(|s| s.start <= at.0 && end <= s.end())
        {
            Some(section) => {
                let offset = (at.0 - section.start) as usize;
                section.bytes[offset..offset + bytes.len()].copy_from_slice(bytes);
            }
            None => self.record(FixtureError::UnmappedWrite {
                address: at,
                len: bytes.len(),
            }),
        }
        self
    }

    /// Store a pointer-sized word.
    pub fn word(&mut self, at: Address, value: u64) -> &mut Self {
        let bytes = self.arch.encode_word(value);
        self.bytes(at, &bytes)
    }

    pub fn pointer(&mut self, at: Address, value: Address) -> &mut Self {
        self.word(at, value.0)
    }

    pub fn u32(&mut self, at: Address, value: u32) -> &mut Self {
        let bytes = self.arch.endian().u32_to(value);
        self.bytes(at, &bytes)
    }

    pub fn u64(&mut self, at: Address, value: u64) -> &mut Self {
        let bytes = self.arch.endian().u64_to(value);
        self.bytes(at, &bytes)
    }

    pub fn build(self) -> Result<Fixture, FixtureError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let image = self
            .sections
            .into_iter()
            .filter(|s| !s.bytes.is_empty())
            .fold(ImageBuilder::new(), |image, s| image.segment(s.start, s.bytes))
            .build()?;
        Ok(Fixture {
            arch: self.arch,
            image,
            symbols: self.symbols,
        })
    }
}

/// A synthetic memory image with a symbol table.
#[derive(Debug, Clone)]
pub struct Fixture {
    arch: Arch,
    image: SegmentedImage,
    symbols: BTreeMap<String, Address>,
}

impl Fixture {
    pub fn arch(&self) -> Arch {
        self.arch
    }

    pub fn image(&self) -> &SegmentedImage {
        &self.image
    }

    pub fn symbol(&self, name: &str) -> Result<Address, FixtureError> {
        self.symbols
            .get(name)
            .copied()
            .ok_or_else(|| FixtureError::UnknownSymbol(name.to_string()))
    }

    /// Address of `name[index]` for elements of `size` bytes.
    pub fn element(&self, name: &str, index: usize, size: usize) -> Result<Address, FixtureError> {
        let base = self.symbol(name)?;
        Ok(Address(base.0 + (index * size) as u64))
    }

    pub fn symbols(&self) -> impl Iterator<Item = (&str, Address)> {
        self.symbols.iter().map(|(name, addr)| (name.as_str(), *addr))
    }
}

impl AddressSpace for Fixture {
    fn read_into(&self, address: Address, buf: &mut [u8]) -> Result<(), Fault> {
        self.image.read_into(address, buf)
    }

    fn is_valid(&self, address: Address) -> bool {
        self.image.is_valid(address)
    }
}

#[cfg(test)]
mod tests {
    use corewalk_core::Endian;

    use super::*;

    #[test]
    fn test_alloc_aligns_and_names() {
        let mut builder = FixtureBuilder::new(Arch::X86_64);
        builder.section(".data", 0x1000);
        let a = builder.alloc("a", 3, 1);
        let b = builder.alloc("b", 8, 8);
        assert_eq!(a, Address(0x1000));
        assert_eq!(b, Address(0x1008));
        assert_eq!(builder.here(), Address(0x1010));

        builder.word(b, 0x1122);
        let fixture = builder.build().unwrap();
        assert_eq!(fixture.symbol("b").unwrap(), b);
        assert_eq!(fixture.read_u64(b, Endian::Little).unwrap(), 0x1122);
        assert!(matches!(fixture.symbol("c"), Err(FixtureError::UnknownSymbol(_))));
    }

    #[test]
    fn test_sections_become_segments() {
        let mut builder = FixtureBuilder::new(Arch::I386);
        builder.section(".data", 0x1000);
        builder.alloc("x", 4, 4);
        builder.section(".bss", 0x8000);
        builder.section(".stack", 0x9000);
        builder.alloc("y", 4, 4);
        let fixture = builder.build().unwrap();
        assert_eq!(fixture.image().segments().count(), 2);
        assert!(fixture.is_valid(Address(0x9000)));
        assert!(!fixture.is_valid(Address(0x8000)));
    }

    #[test]
    fn test_unmapped_write_fails_build() {
        let mut builder = FixtureBuilder::new(Arch::X86_64);
        builder.section(".data", 0x1000);
        let x = builder.alloc("x", 4, 4);
        builder.word(x, 1);
        assert!(matches!(
            builder.build(),
            Err(FixtureError::UnmappedWrite { len: 8, .. })
        ));
    }

    #[test]
    fn test_duplicate_symbol() {
        let mut builder = FixtureBuilder::new(Arch::X86_64);
        builder.section(".data", 0x1000);
        builder.alloc("x", 4, 4);
        builder.alloc("x", 4, 4);
        assert!(matches!(builder.build(), Err(FixtureError::DuplicateSymbol(_))));
    }
}
