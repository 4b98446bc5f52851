//! `test-list`: circular lists, intact and broken
//!
//! | head                  | nodes                      | shape                          |
//! |-----------------------|----------------------------|--------------------------------|
//! | `normal_head`         | `short_list`               | five nodes, well formed        |
//! | `cycle_head`          | `short_list_with_cycle`    | `[3].next` loops to `[1]`      |
//! | `bad_list_head`       | `short_list_with_bad_prev` | `[2].prev` names `[0]`         |
//! | `good_container_list` | `good_containers`          | five `struct container`s       |
//! | `cycle_container_list`| `cycle_containers`         | `[3].next` loops to `[1]`      |
//! | `bad_container_list`  | `bad_containers`           | `[3].prev` names `[1]`         |
//! | `bad_next_ptr_list`   |                            | `next = 0xdeadbeef`            |
//! | `bad_prev_ptr_list`   |                            | `prev = 0xdeadbeef`            |
//!
//! `bad_list_head` links into `short_list` instead of its own nodes.

use corewalk_core::{Address, Arch, ContainerLayout, ListNodeLayout};

use crate::{Fixture, FixtureBuilder, FixtureError};

/// Nodes in every fixture array.
pub const LIST_LEN: usize = 5;

/// Base of the `.data` section.
pub const DATA_START: u64 = 0x0060_1000;

/// `someval` of `good_containers[i]` and friends is `CONTAINER_MAGIC + i`.
pub const CONTAINER_MAGIC: u64 = 0xdead_0000;

/// The pointer planted in the wild-pointer heads.
pub const WILD_POINTER: u64 = 0xdead_beef;

/// `sizeof(struct list_head)`
pub fn list_head_size(arch: Arch) -> usize {
    2 * arch.word_size()
}

/// ```c
/// struct container {
///     unsigned long someval;
///     struct list_head list;
/// };
/// ```
pub fn container_size(arch: Arch) -> usize {
    3 * arch.word_size()
}

/// `offsetof(struct container, list)`
pub fn container_layout(arch: Arch) -> ContainerLayout {
    ContainerLayout::new(arch.word_size())
}

#[derive(Debug, Copy, Clone)]
enum Link {
    Head,
    Node(usize),
    At(Address),
}

/// One fixture array plus its head.
struct Chain {
    head: Address,
    nodes: Address,
    stride: usize,
    member: usize,
}

impl Chain {
    fn resolve(&self, link: Link) -> Address {
        match link {
            Link::Head => self.head,
            Link::Node(i) => Address(self.nodes.0 + (i * self.stride + self.member) as u64),
            Link::At(addr) => addr,
        }
    }

    fn node(&self, i: usize) -> Address {
        self.resolve(Link::Node(i))
    }

    /// Write the head and every node; `links[i]` is `(next, prev)` of node `i`.
    fn write(&self, b: &mut FixtureBuilder, head: (Link, Link), links: &[(Link, Link)]) {
        let word = b.arch().word_size();
        let set = |b: &mut FixtureBuilder, at: Address, (next, prev): (Link, Link)| {
            b.pointer(at, self.resolve(next));
            b.pointer(Address(at.0 + word as u64), self.resolve(prev));
        };
        set(b, self.head, head);
        for (i, &pair) in links.iter().enumerate() {
            set(b, self.node(i), pair);
        }
    }
}

/// `(next, prev)` of a well-formed five-node list.
fn well_formed() -> Vec<(Link, Link)> {
    (0..LIST_LEN)
        .map(|i| {
            let next = if i + 1 == LIST_LEN { Link::Head } else { Link::Node(i + 1) };
            let prev = if i == 0 { Link::Head } else { Link::Node(i - 1) };
            (next, prev)
        })
        .collect()
}

fn well_formed_head() -> (Link, Link) {
    (Link::Node(0), Link::Node(LIST_LEN - 1))
}

/// Build the `test-list` image.
pub fn list_fixture(arch: Arch) -> Result<Fixture, FixtureError> {
    let word = arch.word_size();
    let head_size = list_head_size(arch);
    let container = container_size(arch);

    let mut b = FixtureBuilder::new(arch);
    b.section(".data", DATA_START);

    let plain = |b: &mut FixtureBuilder, nodes: &str, head: &str| Chain {
        nodes: b.alloc(nodes, LIST_LEN * head_size, word),
        head: b.alloc(head, head_size, word),
        stride: head_size,
        member: 0,
    };
    let normal = plain(&mut b, "short_list", "normal_head");
    let cycle = plain(&mut b, "short_list_with_cycle", "cycle_head");
    let bad_prev = plain(&mut b, "short_list_with_bad_prev", "bad_list_head");

    let contained = |b: &mut FixtureBuilder, nodes: &str, head: &str| Chain {
        nodes: b.alloc(nodes, LIST_LEN * container, word),
        head: b.alloc(head, head_size, word),
        stride: container,
        member: word,
    };
    let good_containers = contained(&mut b, "good_containers", "good_container_list");
    let cycle_containers = contained(&mut b, "cycle_containers", "cycle_container_list");
    let bad_containers = contained(&mut b, "bad_containers", "bad_container_list");

    let bad_next = b.alloc("bad_next_ptr_list", head_size, word);
    let bad_prev_ptr = b.alloc("bad_prev_ptr_list", head_size, word);

    normal.write(&mut b, well_formed_head(), &well_formed());

    let mut links = well_formed();
    links[3].0 = Link::Node(1);
    cycle.write(&mut b, well_formed_head(), &links);

    let mut links = well_formed();
    links[2].1 = Link::Node(0);
    links[3].0 = Link::Node(1);
    bad_prev.write(
        &mut b,
        (Link::At(normal.node(0)), Link::At(normal.node(LIST_LEN - 1))),
        &links,
    );

    good_containers.write(&mut b, well_formed_head(), &well_formed());

    let mut links = well_formed();
    links[3].0 = Link::Node(1);
    cycle_containers.write(&mut b, well_formed_head(), &links);

    let mut links = well_formed();
    links[3].1 = Link::Node(1);
    bad_containers.write(&mut b, well_formed_head(), &links);

    for chain in [&good_containers, &cycle_containers, &bad_containers] {
        for i in 0..LIST_LEN {
            let owner = Address(chain.nodes.0 + (i * container) as u64);
            b.word(owner, CONTAINER_MAGIC + i as u64);
        }
    }

    b.word(bad_next, WILD_POINTER).pointer(Address(bad_next.0 + word as u64), bad_next);
    b.pointer(bad_prev_ptr, bad_prev_ptr)
        .word(Address(bad_prev_ptr.0 + word as u64), WILD_POINTER);

    b.build()
}

/// `struct list_head` layout for `arch`.
pub fn layout(arch: Arch) -> ListNodeLayout {
    ListNodeLayout::list_head(arch)
}
