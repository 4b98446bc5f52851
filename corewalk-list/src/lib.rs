//! Linux kernel doubly-linked list walker
//!
//! Walks a circular `struct list_head` list inside a memory image and checks
//! that it is well formed: every `next` link can be followed, every node's
//! `prev` names its actual predecessor, and the walk returns to the head
//! without revisiting a node or exceeding the caller's node budget.

mod walker;

pub use walker::ListWalker;

use corewalk_core::{Address, AddressSpace, ContainerLayout, Fault, ListNodeLayout, WalkReport};

/// Knobs for a list walk.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ListWalkOptions {
    /// Upper bound on visited nodes, excluding the head.
    pub max_nodes: usize,
    /// Follow `prev` links instead of `next`.
    pub reverse: bool,
    /// Report the head as the first entry, for lists without an anchor.
    pub include_head: bool,
    /// Track visited nodes and fail on the first revisit.
    pub exact_cycles: bool,
    /// Resolve the owning object of every node.
    pub container: Option<ContainerLayout>,
}

impl ListWalkOptions {
    pub const fn new(max_nodes: usize) -> Self {
        Self {
            max_nodes,
            reverse: false,
            include_head: false,
            exact_cycles: true,
            container: None,
        }
    }

    pub const fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    pub const fn include_head(mut self) -> Self {
        self.include_head = true;
        self
    }

    pub const fn exact_cycles(mut self, exact: bool) -> Self {
        self.exact_cycles = exact;
        self
    }

    pub const fn container(mut self, container: ContainerLayout) -> Self {
        self.container = Some(container);
        self
    }
}

/// Walk the list anchored at `head`.
pub fn walk_list<S>(
    space: &S,
    head: Address,
    layout: &ListNodeLayout,
    max_nodes: usize,
) -> WalkReport
where
    S: AddressSpace + ?Sized,
{
    walk_list_with(space, head, layout, &ListWalkOptions::new(max_nodes))
}

/// Walk the list anchored at `head`, resolving each node's container.
pub fn walk_list_entries<S>(
    space: &S,
    head: Address,
    layout: &ListNodeLayout,
    container: ContainerLayout,
    max_nodes: usize,
) -> WalkReport
where
    S: AddressSpace + ?Sized,
{
    walk_list_with(
        space,
        head,
        layout,
        &ListWalkOptions::new(max_nodes).container(container),
    )
}

/// Walk with explicit options, collecting every entry up to the first fault.
pub fn walk_list_with<S>(
    space: &S,
    head: Address,
    layout: &ListNodeLayout,
    options: &ListWalkOptions,
) -> WalkReport
where
    S: AddressSpace + ?Sized,
{
    tracing::debug!(
        head = %head,
        max_nodes = options.max_nodes,
        reverse = options.reverse,
        "walking list"
    );

    let mut report = WalkReport::new();
    for item in ListWalker::new(space, head, *layout, *options) {
        match item {
            Ok(entry) => report.entries.push(entry),
            Err(fault) => {
                tracing::warn!(
                    head = %head,
                    visited = report.entries.len(),
                    %fault,
                    "corrupt list"
                );
                report.fault = Some(fault);
                break;
            }
        }
    }

    tracing::debug!(
        head = %head,
        nodes = report.entries.len(),
        status = ?report.status(),
        "list walk finished"
    );
    report
}

/// Whether the list at `head` has no entries (`head.next == head`).
pub fn list_is_empty<S>(space: &S, head: Address, layout: &ListNodeLayout) -> Result<bool, Fault>
where
    S: AddressSpace + ?Sized,
{
    let next_field = head.field(layout.next).ok_or(Fault::OutOfRange {
        address: head,
        len: layout.arch.word_size(),
    })?;
    Ok(space.read_pointer(next_field, layout.arch)? == head)
}

#[cfg(test)]
mod tests;
