//! `test-rbtree`: red-black trees of `struct number_node`
//!
//! ```c
//! struct number_node {
//!     int v;
//!     struct rb_node rb;
//! };
//! ```
//!
//! The `struct rb_root` globals live in `.bss`; the node arrays live on the
//! stack of the (aborted) test program, in a separate segment.

use corewalk_core::{Address, Arch, ContainerLayout, RbRootLayout, TreeNodeLayout};

use crate::{Fixture, FixtureBuilder, FixtureError};

pub const BSS_START: u64 = 0x0060_2000;
pub const STACK_START: u64 = 0x7ffd_0000;

const RB_RED: u64 = 0;
const RB_BLACK: u64 = 1;

/// In-order values of `full_binary_tree`.
pub const FULL_TREE_IN_ORDER: [u32; 7] = [3, 1, 4, 0, 5, 2, 6];
/// Post-order values of `full_binary_tree`.
pub const FULL_TREE_POST_ORDER: [u32; 7] = [3, 4, 1, 5, 6, 2, 0];

pub fn rb_node_size(arch: Arch) -> usize {
    3 * arch.word_size()
}

pub fn number_node_size(arch: Arch) -> usize {
    arch.word_size() + rb_node_size(arch)
}

/// `offsetof(struct number_node, rb)`
pub fn number_node_layout(arch: Arch) -> ContainerLayout {
    ContainerLayout::new(arch.word_size())
}

pub fn node_layout(arch: Arch) -> TreeNodeLayout {
    TreeNodeLayout::rb_node(arch)
}

pub fn root_layout(arch: Arch) -> RbRootLayout {
    RbRootLayout::rb_root(arch)
}

/// `(v, parent, color, left, right)` by array index.
type NumberNode = (u32, Option<usize>, u64, Option<usize>, Option<usize>);

fn write_numbers(b: &mut FixtureBuilder, array: Address, nodes: &[NumberNode]) {
    let arch = b.arch();
    let word = arch.word_size() as u64;
    let stride = number_node_size(arch) as u64;
    let rb = |i: usize| Address(array.0 + i as u64 * stride + word);
    let ptr = |i: Option<usize>| i.map_or(Address::NULL, rb);

    for (i, &(v, parent, color, left, right)) in nodes.iter().enumerate() {
        let node = rb(i);
        b.u32(Address(array.0 + i as u64 * stride), v)
            .word(node, ptr(parent).0 | color)
            .pointer(Address(node.0 + word), ptr(right))
            .pointer(Address(node.0 + 2 * word), ptr(left));
    }
}

/// Build the `test-rbtree` image.
pub fn rbtree_fixture(arch: Arch) -> Result<Fixture, FixtureError> {
    let word = arch.word_size();
    let number = number_node_size(arch);

    let mut b = FixtureBuilder::new(arch);
    b.section(".bss", BSS_START);
    b.alloc("naked_node", rb_node_size(arch), word);
    b.alloc("empty_tree_root", word, word);
    let singular_root = b.alloc("singular_tree_root", word, word);
    let full_root = b.alloc("full_binary_tree_root", word, word);
    let linear_root = b.alloc("linear_binary_tree_root", word, word);

    b.section("[stack]", STACK_START);
    let singular = b.alloc("singular_tree", rb_node_size(arch), word);
    let full = b.alloc("full_binary_tree", 7 * number, word);
    let linear = b.alloc("linear_binary_tree", 3 * number, word);

    b.word(singular, RB_BLACK);
    b.pointer(singular_root, singular);

    write_numbers(
        &mut b,
        full,
        &[
            (0, None, RB_BLACK, Some(1), Some(2)),
            (1, Some(0), RB_RED, Some(3), Some(4)),
            (2, Some(0), RB_RED, Some(5), Some(6)),
            (3, Some(1), RB_BLACK, None, None),
            (4, Some(1), RB_BLACK, None, None),
            (5, Some(2), RB_BLACK, None, None),
            (6, Some(2), RB_BLACK, None, None),
        ],
    );
    b.pointer(full_root, Address(full.0 + word as u64));

    // Not a true RB tree but good for testing
    write_numbers(
        &mut b,
        linear,
        &[
            (0, None, RB_BLACK, Some(1), None),
            (1, Some(0), RB_RED, None, Some(2)),
            (2, Some(1), RB_BLACK, None, None),
        ],
    );
    b.pointer(linear_root, Address(linear.0 + word as u64));

    b.build()
}
