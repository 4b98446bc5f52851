//! Word size and byte order of the observed image

use serde::Serialize;

/// Byte order of multi-byte values in the image.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    /// Byte order of the host running the inspector.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endian::Big
        } else {
            Endian::Little
        }
    }

    pub fn u64_from(self, bytes: [u8; 8]) -> u64 {
        match self {
            Endian::Little => u64::from_le_bytes(bytes),
            Endian::Big => u64::from_be_bytes(bytes),
        }
    }

    pub fn u32_from(self, bytes: [u8; 4]) -> u32 {
        match self {
            Endian::Little => u32::from_le_bytes(bytes),
            Endian::Big => u32::from_be_bytes(bytes),
        }
    }

    pub fn u64_to(self, value: u64) -> [u8; 8] {
        match self {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        }
    }

    pub fn u32_to(self, value: u32) -> [u8; 4] {
        match self {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        }
    }
}

/// Pointer width and byte order.
///
/// Pointer fields in layout descriptors are always one word wide.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Arch {
    word_size: usize,
    endian: Endian,
}

impl Default for Arch {
    fn default() -> Self {
        Self::native()
    }
}

impl Arch {
    pub const X86_64: Arch = Arch {
        word_size: 8,
        endian: Endian::Little,
    };
    pub const PPC64: Arch = Arch {
        word_size: 8,
        endian: Endian::Big,
    };
    pub const S390X: Arch = Arch {
        word_size: 8,
        endian: Endian::Big,
    };
    pub const I386: Arch = Arch {
        word_size: 4,
        endian: Endian::Little,
    };

    /// Returns `None` unless `word_size` is 4 or 8.
    pub const fn new(word_size: usize, endian: Endian) -> Option<Self> {
        match word_size {
            4 | 8 => Some(Self { word_size, endian }),
            _ => None,
        }
    }

    /// The architecture the inspector itself runs on.
    pub const fn native() -> Self {
        Self {
            word_size: core::mem::size_of::<usize>(),
            endian: Endian::native(),
        }
    }

    pub const fn word_size(&self) -> usize {
        self.word_size
    }

    pub const fn endian(&self) -> Endian {
        self.endian
    }

    /// Decode one word. `bytes` must be exactly `word_size` long.
    pub fn decode_word(&self, bytes: &[u8]) -> Option<u64> {
        match self.word_size {
            8 => bytes.try_into().ok().map(|b| self.endian.u64_from(b)),
            4 => bytes
                .try_into()
                .ok()
                .map(|b| u64::from(self.endian.u32_from(b))),
            _ => None,
        }
    }

    /// Encode one word, truncating to the word size.
    pub fn encode_word(&self, value: u64) -> Vec<u8> {
        match self.word_size {
            4 => self.endian.u32_to(value as u32).to_vec(),
            _ => self.endian.u64_to(value).to_vec(),
        }
    }
}
