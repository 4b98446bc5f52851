//! Presets and fixture layouts against the `#[repr(C)]` mirrors

use corewalk_abi_test::*;
use corewalk_core::{Arch, ListNodeLayout, TreeNodeLayout};
use corewalk_fixtures::{lists, percpu, trees};
use memoffset::offset_of;
use static_assertions::*;

assert_eq_size!(list_head, [usize; 2]);
assert_eq_align!(list_head, usize);
assert_eq_size!(rb_node, [usize; 3]);
assert_eq_align!(rb_node, usize);
assert_eq_size!(rb_root, usize);
assert_eq_size!(container, [usize; 3]);
assert_eq_size!(test_struct, [usize; 3]);

#[test]
fn test_list_head_preset() {
    let preset = ListNodeLayout::list_head(Arch::native());
    assert_eq!(preset.next, offset_of!(list_head, next));
    assert_eq!(preset.prev, offset_of!(list_head, prev));
    assert!(preset.validate().is_ok());
}

#[test]
fn test_rb_node_preset() {
    let preset = TreeNodeLayout::rb_node(Arch::native());
    assert_eq!(preset.parent_color, offset_of!(rb_node, __rb_parent_color));
    assert_eq!(preset.right, offset_of!(rb_node, rb_right));
    assert_eq!(preset.left, offset_of!(rb_node, rb_left));
    assert!(preset.validate().is_ok());
}

#[test]
fn test_fixture_container_layouts() {
    let arch = Arch::native();
    assert_eq!(lists::container_size(arch), core::mem::size_of::<container>());
    assert_eq!(lists::container_layout(arch).member_offset, offset_of!(container, list));

    assert_eq!(trees::number_node_size(arch), core::mem::size_of::<number_node>());
    assert_eq!(trees::number_node_layout(arch).member_offset, offset_of!(number_node, rb));
}

#[test]
fn test_fixture_percpu_struct() {
    let arch = Arch::native();
    assert_eq!(percpu::test_struct_size(arch), core::mem::size_of::<test_struct>());
    assert_eq!(percpu::test_struct_ulong(arch), offset_of!(test_struct, ulong));
    assert_eq!(percpu::test_struct_ptr(arch), offset_of!(test_struct, ptr));
}

#[test]
fn test_node_alignment_is_word() {
    assert_eq!(core::mem::align_of::<list_head>(), word_align());
    assert_eq!(core::mem::align_of::<number_node>(), word_align());
}
