use std::collections::HashSet;

use corewalk_core::{
    Address, AddressSpace, Entry, Fault, LinkField, TreeNodeLayout, TreeReport, WalkReport,
};

use crate::{RbNode, TraversalOrder, TreeWalkOptions};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Stage {
    Left,
    Right,
    Done,
}

impl Stage {
    fn next(self) -> Self {
        match self {
            Stage::Left => Stage::Right,
            Stage::Right | Stage::Done => Stage::Done,
        }
    }
}

/// A reference to a node that is about to be entered.
#[derive(Debug, Copy, Clone)]
pub(crate) struct Link {
    pub target: Address,
    /// What the target's decoded parent must be.
    pub parent: Address,
    /// The node and field the target was read from, if any.
    pub via: Option<(Address, LinkField)>,
}

impl Link {
    pub fn root(target: Address) -> Self {
        Self {
            target,
            parent: Address::NULL,
            via: None,
        }
    }
}

#[derive(Debug, Copy, Clone)]
struct Frame {
    node: RbNode,
    /// Black nodes from below the root down to and including this node.
    blacks: u32,
    entry: Entry,
    stage: Stage,
}

/// Depth-first walk with an explicit stack.
///
/// Every node is decoded and checked when it is first reached; it is recorded
/// in the report when the traversal order says so. The stack always holds the
/// path from the root to the current node, which is what black-height
/// mismatches report.
pub(crate) struct TreeWalk<'a, S: AddressSpace + ?Sized> {
    space: &'a S,
    layout: TreeNodeLayout,
    options: TreeWalkOptions,
    visited: HashSet<Address>,
    stack: Vec<Frame>,
    /// First null terminal seen: its black count and the path leading to it.
    black_height: Option<(u32, Vec<Address>)>,
    entries: Vec<Entry>,
}

impl<'a, S: AddressSpace + ?Sized> TreeWalk<'a, S> {
    pub fn new(space: &'a S, layout: TreeNodeLayout, options: TreeWalkOptions) -> Self {
        Self {
            space,
            layout,
            options,
            visited: HashSet::new(),
            stack: Vec::new(),
            black_height: None,
            entries: Vec::new(),
        }
    }

    pub fn run(mut self, root: Link) -> TreeReport {
        tracing::debug!(root = %root.target, order = ?self.options.order, "walking tree");

        if root.target.is_null() {
            return TreeReport {
                walk: WalkReport::new(),
                black_height: Some(0),
            };
        }

        let result = self.traverse(root);
        let report = match result {
            Ok(height) => TreeReport {
                walk: WalkReport {
                    entries: self.entries,
                    fault: None,
                },
                black_height: Some(height),
            },
            Err(fault) => {
                tracing::warn!(
                    root = %root.target,
                    visited = self.visited.len(),
                    %fault,
                    "corrupt tree"
                );
                TreeReport {
                    walk: WalkReport {
                        entries: self.entries,
                        fault: Some(fault),
                    },
                    black_height: None,
                }
            }
        };

        tracing::debug!(
            root = %root.target,
            nodes = report.len(),
            status = ?report.status(),
            "tree walk finished"
        );
        report
    }

    fn traverse(&mut self, root: Link) -> Result<u32, Fault> {
        self.enter(root)?;

        loop {
            let (node, entry, stage) = match self.stack.last_mut() {
                Some(frame) => {
                    let stage = frame.stage;
                    frame.stage = stage.next();
                    (frame.node, frame.entry, stage)
                }
                None => break,
            };

            match stage {
                Stage::Left => self.follow(&node, LinkField::Left)?,
                Stage::Right => {
                    if self.options.order == TraversalOrder::InOrder {
                        self.entries.push(entry);
                    }
                    self.follow(&node, LinkField::Right)?;
                }
                Stage::Done => {
                    self.stack.pop();
                    if self.options.order == TraversalOrder::PostOrder {
                        self.entries.push(entry);
                    }
                }
            }
        }

        Ok(self.black_height.as_ref().map_or(0, |(height, _)| *height))
    }

    /// Follow one child pointer of `parent`, the node on top of the stack.
    fn follow(&mut self, parent: &RbNode, field: LinkField) -> Result<(), Fault> {
        let target = match field {
            LinkField::Left => parent.left,
            _ => parent.right,
        };

        if target.is_null() {
            let blacks = self.stack.last().map_or(0, |frame| frame.blacks);
            return self.terminal(blacks + 1);
        }

        self.enter(Link {
            target,
            parent: parent.address,
            via: Some((parent.address, field)),
        })
    }

    fn enter(&mut self, link: Link) -> Result<(), Fault> {
        let target = link.target;
        if self.visited.contains(&target) {
            return Err(Fault::Cycle {
                node: target,
                visited: self.visited.len(),
            });
        }

        let node = RbNode::read(self.space, target, &self.layout).map_err(|fault| match link.via {
            Some((from, field)) => Fault::BadPointer {
                node: from,
                field,
                value: target,
            },
            None => fault,
        })?;
        self.visited.insert(target);

        if node.parent != link.parent {
            return Err(Fault::InconsistentBackPointer {
                node: target,
                field: LinkField::Parent,
                expected: link.parent,
                found: node.parent,
            });
        }

        let parent = self.stack.last();
        if let Some(parent) = parent {
            if parent.node.is_red() && node.is_red() {
                return Err(Fault::RedRedViolation {
                    node: parent.node.address,
                    child: target,
                });
            }
        }
        // The root itself does not count towards the black-height.
        let blacks = parent.map_or(0, |p| p.blacks + u32::from(node.is_black()));

        let entry = match self.options.container {
            Some(container) => {
                let (from, field) = link.via.unwrap_or((target, LinkField::Root));
                let owner = container.container_of(target).ok_or(Fault::BadPointer {
                    node: from,
                    field,
                    value: target,
                })?;
                Entry {
                    node: target,
                    container: Some(owner),
                }
            }
            None => Entry::node(target),
        };

        self.stack.push(Frame {
            node,
            blacks,
            entry,
            stage: Stage::Left,
        });
        Ok(())
    }

    /// Check the black count of a path that ends in a null child.
    fn terminal(&mut self, height: u32) -> Result<(), Fault> {
        match self.black_height.as_ref().map(|(expected, _)| *expected) {
            None => {
                self.black_height = Some((height, self.path()));
                Ok(())
            }
            Some(expected) if expected != height => {
                let found_path = self.path();
                let expected_path = self
                    .black_height
                    .take()
                    .map(|(_, path)| path)
                    .unwrap_or_default();
                Err(Fault::BlackHeightMismatch {
                    node: found_path.last().copied().unwrap_or_default(),
                    expected,
                    found: height,
                    expected_path,
                    found_path,
                })
            }
            Some(_) => Ok(()),
        }
    }

    fn path(&self) -> Vec<Address> {
        self.stack.iter().map(|frame| frame.node.address).collect()
    }
}
