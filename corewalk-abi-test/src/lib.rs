//! Layout preset checks
//!
//! `#[repr(C)]` mirrors of the kernel structures the walkers understand.
//! The compiler lays these out with the C rules for the host, so comparing
//! them against the hand-written presets in `corewalk-core` catches a preset
//! whose offsets drifted from the real structure.

#![allow(non_camel_case_types)]
#![allow(dead_code)]

use core::mem::{align_of, size_of};

use corewalk_core::{Arch, ListNodeLayout, TreeNodeLayout, UtsnameLayout};
use memoffset::offset_of;

/// Verify at compile time that a mirror has the expected size.
#[macro_export]
macro_rules! verify_size {
    ($rust_type:ty, $expected_size:expr) => {
        const _: () = {
            const SIZE: usize = ::core::mem::size_of::<$rust_type>();
            const EXPECTED: usize = $expected_size;
            assert!(SIZE == EXPECTED, "Size mismatch");
        };
    };
}

/// Verify at compile time that a field sits at the expected offset.
#[macro_export]
macro_rules! verify_offset {
    ($type:ty, $field:ident, $expected_offset:expr) => {
        const _: () = {
            use memoffset::offset_of;
            const OFFSET: usize = offset_of!($type, $field);
            const EXPECTED: usize = $expected_offset;
            assert!(OFFSET == EXPECTED, "Offset mismatch");
        };
    };
}

/// ```c
/// struct list_head {
///     struct list_head *next, *prev;
/// };
/// ```
#[repr(C)]
pub struct list_head {
    pub next: *mut list_head,
    pub prev: *mut list_head,
}

/// ```c
/// struct rb_node {
///     unsigned long  __rb_parent_color;
///     struct rb_node *rb_right;
///     struct rb_node *rb_left;
/// };
/// ```
#[repr(C)]
pub struct rb_node {
    pub __rb_parent_color: usize,
    pub rb_right: *mut rb_node,
    pub rb_left: *mut rb_node,
}

#[repr(C)]
pub struct rb_root {
    pub rb_node: *mut rb_node,
}

pub const NEW_UTS_LEN: usize = 64;

#[repr(C)]
pub struct new_utsname {
    pub sysname: [u8; NEW_UTS_LEN + 1],
    pub nodename: [u8; NEW_UTS_LEN + 1],
    pub release: [u8; NEW_UTS_LEN + 1],
    pub version: [u8; NEW_UTS_LEN + 1],
    pub machine: [u8; NEW_UTS_LEN + 1],
    pub domainname: [u8; NEW_UTS_LEN + 1],
}

/// The list fixture's container type.
#[repr(C)]
pub struct container {
    pub someval: usize,
    pub list: list_head,
}

/// The tree fixture's node type.
#[repr(C)]
pub struct number_node {
    pub v: i32,
    pub rb: rb_node,
}

/// The per-CPU fixture's payload.
#[repr(C)]
pub struct test_struct {
    pub x: i32,
    pub ulong: usize,
    pub ptr: *mut core::ffi::c_void,
}

/// Outcome of comparing one preset against its mirror.
#[derive(Debug, PartialEq, Eq)]
pub struct LayoutCheck {
    pub struct_name: &'static str,
    pub size_match: bool,
    pub fields_match: bool,
}

impl LayoutCheck {
    pub fn is_compatible(&self) -> bool {
        self.size_match && self.fields_match
    }
}

pub fn check_list_head(preset: &ListNodeLayout) -> LayoutCheck {
    LayoutCheck {
        struct_name: "list_head",
        size_match: size_of::<list_head>() == 2 * preset.arch.word_size(),
        fields_match: preset.next == offset_of!(list_head, next)
            && preset.prev == offset_of!(list_head, prev),
    }
}

pub fn check_rb_node(preset: &TreeNodeLayout) -> LayoutCheck {
    LayoutCheck {
        struct_name: "rb_node",
        size_match: size_of::<rb_node>() == 3 * preset.arch.word_size(),
        fields_match: preset.parent_color == offset_of!(rb_node, __rb_parent_color)
            && preset.right == offset_of!(rb_node, rb_right)
            && preset.left == offset_of!(rb_node, rb_left),
    }
}

pub fn check_new_utsname(preset: &UtsnameLayout) -> LayoutCheck {
    LayoutCheck {
        struct_name: "new_utsname",
        size_match: size_of::<new_utsname>() == preset.size(),
        fields_match: [
            offset_of!(new_utsname, sysname),
            offset_of!(new_utsname, nodename),
            offset_of!(new_utsname, release),
            offset_of!(new_utsname, version),
            offset_of!(new_utsname, machine),
            offset_of!(new_utsname, domainname),
        ]
        .iter()
        .enumerate()
        .all(|(i, &offset)| offset == preset.offset_of(i)),
    }
}

/// Check every built-in preset for the host architecture.
pub fn native_preset_checks() -> Vec<LayoutCheck> {
    let arch = Arch::native();
    vec![
        check_list_head(&ListNodeLayout::list_head(arch)),
        check_rb_node(&TreeNodeLayout::rb_node(arch)),
        check_new_utsname(&UtsnameLayout::new_utsname()),
    ]
}

/// Pointer-sized alignment of the host, the alignment of every node type.
pub fn word_align() -> usize {
    align_of::<usize>()
}

verify_size!(list_head, 2 * size_of::<usize>());
verify_size!(rb_node, 3 * size_of::<usize>());
verify_size!(rb_root, size_of::<usize>());
verify_size!(new_utsname, 6 * (NEW_UTS_LEN + 1));
verify_offset!(rb_node, rb_left, 2 * size_of::<usize>());
verify_offset!(container, list, size_of::<usize>());
