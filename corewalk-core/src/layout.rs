//! Layout descriptors
//!
//! Passive descriptions of where the link fields of a structure live. A
//! symbol/type collaborator (DWARF, BTF, or hand-written presets like the
//! ones below) supplies these; the walkers only consume them.

use serde::Serialize;

use crate::{Address, Arch};

/// Errors in a layout descriptor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("fields {first} and {second} overlap at offsets {first_offset} and {second_offset}")]
    OverlappingFields {
        first: &'static str,
        second: &'static str,
        first_offset: usize,
        second_offset: usize,
    },

    #[error("field {field} at offset {offset} is not aligned to the {word_size}-byte word")]
    Misaligned {
        field: &'static str,
        offset: usize,
        word_size: usize,
    },

    #[error("utsname field length must be at least 1")]
    EmptyField,

    #[error("utsname field length {0} overflows the structure size")]
    FieldTooLong(usize),
}

fn check_fields(arch: Arch, fields: &[(&'static str, usize)]) -> Result<(), LayoutError> {
    let word = arch.word_size();
    for (i, &(name, offset)) in fields.iter().enumerate() {
        if offset % word != 0 {
            return Err(LayoutError::Misaligned {
                field: name,
                offset,
                word_size: word,
            });
        }
        for &(other, other_offset) in &fields[i + 1..] {
            if offset.abs_diff(other_offset) < word {
                return Err(LayoutError::OverlappingFields {
                    first: name,
                    second: other,
                    first_offset: offset,
                    second_offset: other_offset,
                });
            }
        }
    }
    Ok(())
}

/// `struct list_head`: two pointer fields.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct ListNodeLayout {
    pub arch: Arch,
    pub next: usize,
    pub prev: usize,
}

impl ListNodeLayout {
    /// ```c
    /// struct list_head {
    ///     struct list_head *next, *prev;
    /// };
    /// ```
    pub const fn list_head(arch: Arch) -> Self {
        Self {
            arch,
            next: 0,
            prev: arch.word_size(),
        }
    }

    /// Same node with the roles of `next` and `prev` swapped, for walking a
    /// list backwards.
    pub const fn reversed(self) -> Self {
        Self {
            arch: self.arch,
            next: self.prev,
            prev: self.next,
        }
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        check_fields(self.arch, &[("next", self.next), ("prev", self.prev)])
    }
}

/// `struct rb_node`: packed parent/color word plus two child pointers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNodeLayout {
    pub arch: Arch,
    pub parent_color: usize,
    pub left: usize,
    pub right: usize,
}

impl TreeNodeLayout {
    /// Bit 0 of `__rb_parent_color` holds the color.
    pub const COLOR_MASK: u64 = 0x1;
    /// Bits masked off to recover the parent pointer.
    pub const PARENT_MASK: u64 = 0x3;

    /// ```c
    /// struct rb_node {
    ///     unsigned long  __rb_parent_color;
    ///     struct rb_node *rb_right;
    ///     struct rb_node *rb_left;
    /// };
    /// ```
    pub const fn rb_node(arch: Arch) -> Self {
        Self {
            arch,
            parent_color: 0,
            right: arch.word_size(),
            left: 2 * arch.word_size(),
        }
    }

    /// Split a raw `__rb_parent_color` word into `(parent, is_black)`.
    pub const fn decode_parent_color(raw: u64) -> (Address, bool) {
        (
            Address(raw).mask(Self::PARENT_MASK),
            raw & Self::COLOR_MASK != 0,
        )
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        check_fields(
            self.arch,
            &[
                ("parent_color", self.parent_color),
                ("left", self.left),
                ("right", self.right),
            ],
        )
    }
}

/// `struct rb_root`: a single pointer to the root node.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct RbRootLayout {
    pub arch: Arch,
    pub rb_node: usize,
}

impl RbRootLayout {
    pub const fn rb_root(arch: Arch) -> Self {
        Self { arch, rb_node: 0 }
    }
}

/// Where a list or tree node is embedded inside its owning object.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerLayout {
    /// `offsetof(container, member)`
    pub member_offset: usize,
}

impl ContainerLayout {
    pub const fn new(member_offset: usize) -> Self {
        Self { member_offset }
    }

    /// `container_of`: `None` if the subtraction underflows.
    pub fn container_of(&self, node: Address) -> Option<Address> {
        node.checked_sub(self.member_offset as u64)
    }
}

/// `struct new_utsname`: six fixed-width character arrays.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct UtsnameLayout {
    pub field_len: usize,
}

impl UtsnameLayout {
    pub const FIELDS: [&'static str; 6] = [
        "sysname",
        "nodename",
        "release",
        "version",
        "machine",
        "domainname",
    ];

    /// `__NEW_UTS_LEN + 1`
    pub const fn new_utsname() -> Self {
        Self { field_len: 65 }
    }

    /// Total size. Only meaningful for a layout that passed `validate()`.
    pub const fn size(&self) -> usize {
        self.field_len.saturating_mul(Self::FIELDS.len())
    }

    /// Total size, or `None` if it does not fit in `usize`.
    pub const fn checked_size(&self) -> Option<usize> {
        self.field_len.checked_mul(Self::FIELDS.len())
    }

    pub const fn offset_of(&self, index: usize) -> usize {
        self.field_len * index
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.field_len == 0 {
            return Err(LayoutError::EmptyField);
        }
        if self.checked_size().is_none() {
            return Err(LayoutError::FieldTooLong(self.field_len));
        }
        Ok(())
    }
}

impl Default for UtsnameLayout {
    fn default() -> Self {
        Self::new_utsname()
    }
}
