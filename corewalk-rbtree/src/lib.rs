//! Linux kernel red-black tree walker
//!
//! Walks a `struct rb_node` tree inside a memory image and checks the
//! red-black invariants on the way:
//!
//! - every node's decoded parent is the node that points to it (null for the
//!   root) and no node is reached twice,
//! - no red node has a red child,
//! - every path from the root to a null child passes the same number of black
//!   nodes.
//!
//! Black-height follows the kernel definition: the root is not counted and
//! the null terminal counts as one black node.

mod node;
mod walker;

pub use node::{RbColor, RbNode};

use corewalk_core::{
    Address, AddressSpace, ContainerLayout, Fault, LinkField, RbRootLayout, TreeNodeLayout,
    TreeReport, WalkReport,
};
use walker::{Link, TreeWalk};

/// Order in which nodes are recorded in the report.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum TraversalOrder {
    /// Left, node, right: sorted for ordered trees.
    #[default]
    InOrder,
    /// Left, right, node: children before their parent.
    PostOrder,
}

/// Knobs for a tree walk.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct TreeWalkOptions {
    pub order: TraversalOrder,
    pub container: Option<ContainerLayout>,
}

impl TreeWalkOptions {
    pub const fn new() -> Self {
        Self {
            order: TraversalOrder::InOrder,
            container: None,
        }
    }

    pub const fn post_order(mut self) -> Self {
        self.order = TraversalOrder::PostOrder;
        self
    }

    pub const fn container(mut self, container: ContainerLayout) -> Self {
        self.container = Some(container);
        self
    }
}

/// Walk the tree whose root node is at `root` (null for an empty tree).
pub fn walk_tree<S>(space: &S, root: Address, layout: &TreeNodeLayout) -> TreeReport
where
    S: AddressSpace + ?Sized,
{
    walk_tree_with(space, root, layout, &TreeWalkOptions::new())
}

/// Walk the tree at `root`, resolving each node's container.
pub fn walk_tree_entries<S>(
    space: &S,
    root: Address,
    layout: &TreeNodeLayout,
    container: ContainerLayout,
) -> TreeReport
where
    S: AddressSpace + ?Sized,
{
    walk_tree_with(space, root, layout, &TreeWalkOptions::new().container(container))
}

pub fn walk_tree_with<S>(
    space: &S,
    root: Address,
    layout: &TreeNodeLayout,
    options: &TreeWalkOptions,
) -> TreeReport
where
    S: AddressSpace + ?Sized,
{
    TreeWalk::new(space, *layout, *options).run(Link::root(root))
}

/// Walk the tree anchored by the `struct rb_root` at `rb_root`.
pub fn walk_rb_root<S>(
    space: &S,
    rb_root: Address,
    root_layout: &RbRootLayout,
    node_layout: &TreeNodeLayout,
) -> TreeReport
where
    S: AddressSpace + ?Sized,
{
    walk_rb_root_with(space, rb_root, root_layout, node_layout, &TreeWalkOptions::new())
}

pub fn walk_rb_root_with<S>(
    space: &S,
    rb_root: Address,
    root_layout: &RbRootLayout,
    node_layout: &TreeNodeLayout,
    options: &TreeWalkOptions,
) -> TreeReport
where
    S: AddressSpace + ?Sized,
{
    let root = rb_root
        .field(root_layout.rb_node)
        .ok_or(Fault::OutOfRange {
            address: rb_root,
            len: root_layout.arch.word_size(),
        })
        .and_then(|field| space.read_pointer(field, root_layout.arch));

    match root {
        Ok(target) => TreeWalk::new(space, *node_layout, *options).run(Link {
            target,
            parent: Address::NULL,
            via: Some((rb_root, LinkField::Root)),
        }),
        Err(fault) => {
            tracing::warn!(rb_root = %rb_root, %fault, "unreadable rb_root");
            TreeReport {
                walk: WalkReport {
                    entries: Vec::new(),
                    fault: Some(fault),
                },
                black_height: None,
            }
        }
    }
}
