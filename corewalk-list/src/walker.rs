use std::collections::HashSet;

use corewalk_core::{Address, AddressSpace, Entry, Fault, LinkField, ListNodeLayout};

use crate::ListWalkOptions;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum State {
    Start,
    Walking,
    Done,
}

/// Lazy list walk.
///
/// Yields one entry per node after the head and checks each link before the
/// node is yielded. The first fault is yielded as `Err` and ends the walk.
pub struct ListWalker<'a, S: AddressSpace + ?Sized> {
    space: &'a S,
    head: Address,
    layout: ListNodeLayout,
    options: ListWalkOptions,
    state: State,
    /// Back link stored in the head, checked when the walk closes.
    head_back: Address,
    current: Address,
    current_next: Address,
    visited: HashSet<Address>,
    count: usize,
    pending: Option<Fault>,
}

impl<'a, S: AddressSpace + ?Sized> ListWalker<'a, S> {
    pub fn new(
        space: &'a S,
        head: Address,
        layout: ListNodeLayout,
        options: ListWalkOptions,
    ) -> Self {
        let layout = if options.reverse {
            layout.reversed()
        } else {
            layout
        };
        Self {
            space,
            head,
            layout,
            options,
            state: State::Start,
            head_back: Address::NULL,
            current: head,
            current_next: Address::NULL,
            visited: HashSet::new(),
            count: 0,
            pending: None,
        }
    }

    /// Number of nodes yielded so far, excluding the head.
    pub fn visited(&self) -> usize {
        self.count
    }

    fn forward(&self) -> LinkField {
        if self.options.reverse {
            LinkField::Prev
        } else {
            LinkField::Next
        }
    }

    fn backward(&self) -> LinkField {
        if self.options.reverse {
            LinkField::Next
        } else {
            LinkField::Prev
        }
    }

    /// Read the link stored `offset` bytes into `node`.
    fn read_link(&self, node: Address, offset: usize) -> Result<Address, Fault> {
        let field = node.field(offset).ok_or(Fault::OutOfRange {
            address: node,
            len: self.layout.arch.word_size(),
        })?;
        self.space.read_pointer(field, self.layout.arch)
    }

    fn entry(&self, node: Address) -> Option<Entry> {
        match self.options.container {
            Some(container) => container.container_of(node).map(|c| Entry {
                node,
                container: Some(c),
            }),
            None => Some(Entry::node(node)),
        }
    }

    fn start(&mut self) -> Result<Option<Entry>, Fault> {
        let unreadable = Fault::BadPointer {
            node: self.head,
            field: self.forward(),
            value: self.head,
        };
        self.current_next = self
            .read_link(self.head, self.layout.next)
            .map_err(|_| unreadable.clone())?;
        self.head_back = self
            .read_link(self.head, self.layout.prev)
            .map_err(|_| unreadable)?;
        if !self.options.include_head {
            return Ok(None);
        }
        self.entry(self.head).map(Some).ok_or(Fault::BadPointer {
            node: self.head,
            field: self.forward(),
            value: self.head,
        })
    }

    fn step(&mut self) -> Result<Option<Entry>, Fault> {
        let current = self.current;
        let next = self.current_next;

        if next == self.head {
            if self.head_back != current {
                return Err(Fault::InconsistentBackPointer {
                    node: self.head,
                    field: self.backward(),
                    expected: current,
                    found: self.head_back,
                });
            }
            return Ok(None);
        }

        let bad_link = Fault::BadPointer {
            node: current,
            field: self.forward(),
            value: next,
        };
        if next.is_null() {
            return Err(bad_link);
        }
        if self.options.exact_cycles && self.visited.contains(&next) {
            return Err(Fault::Cycle {
                node: next,
                visited: self.count,
            });
        }
        if self.count >= self.options.max_nodes {
            return Err(Fault::Cycle {
                node: next,
                visited: self.count,
            });
        }

        let back = self
            .read_link(next, self.layout.prev)
            .map_err(|_| bad_link.clone())?;
        let next_next = self
            .read_link(next, self.layout.next)
            .map_err(|_| bad_link.clone())?;
        let entry = self.entry(next).ok_or(bad_link)?;

        if self.options.exact_cycles {
            self.visited.insert(next);
        }
        self.count += 1;
        self.current = next;
        self.current_next = next_next;

        if back != current {
            self.pending = Some(Fault::InconsistentBackPointer {
                node: next,
                field: self.backward(),
                expected: current,
                found: back,
            });
        }
        Ok(Some(entry))
    }
}

impl<S: AddressSpace + ?Sized> Iterator for ListWalker<'_, S> {
    type Item = Result<Entry, Fault>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(fault) = self.pending.take() {
            self.state = State::Done;
            return Some(Err(fault));
        }

        let result = match self.state {
            State::Done => return None,
            State::Start => {
                self.state = State::Walking;
                match self.start() {
                    Ok(None) => self.step(),
                    other => other,
                }
            }
            State::Walking => self.step(),
        };

        match result {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.state = State::Done;
                None
            }
            Err(fault) => {
                self.state = State::Done;
                Some(Err(fault))
            }
        }
    }
}

impl<S: AddressSpace + ?Sized> std::iter::FusedIterator for ListWalker<'_, S> {}
