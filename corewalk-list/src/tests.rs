use corewalk_core::{
    Address, Arch, ContainerLayout, Entry, Fault, ImageBuilder, LinkField, ListNodeLayout,
    SegmentedImage, Status,
};
use proptest::prelude::*;

use super::*;

const BASE: u64 = 0x1000;
const STRIDE: u64 = 0x20;
const LAYOUT: ListNodeLayout = ListNodeLayout::list_head(Arch::X86_64);

/// Node `i` lives at `BASE + i * STRIDE`; node 0 is the head.
fn node(i: usize) -> Address {
    Address(BASE + i as u64 * STRIDE)
}

/// Build an image from `(next, prev)` pairs, one per node.
fn image(links: &[(Address, Address)]) -> SegmentedImage {
    let mut bytes = vec![0u8; links.len() * STRIDE as usize];
    for (i, (next, prev)) in links.iter().enumerate() {
        let at = i * STRIDE as usize;
        bytes[at..at + 8].copy_from_slice(&next.0.to_le_bytes());
        bytes[at + 8..at + 16].copy_from_slice(&prev.0.to_le_bytes());
    }
    ImageBuilder::new().segment(BASE, bytes).build().unwrap()
}

/// A well-formed list: head plus `n` nodes.
fn well_formed(n: usize) -> Vec<(Address, Address)> {
    let total = n + 1;
    (0..total)
        .map(|i| (node((i + 1) % total), node((i + total - 1) % total)))
        .collect()
}

#[test]
fn test_well_formed_list() {
    let image = image(&well_formed(5));
    let report = walk_list(&image, node(0), &LAYOUT, 100);
    assert_eq!(report.status(), Status::Consistent);
    assert_eq!(report.nodes(), (1..=5).map(node).collect::<Vec<_>>());
}

#[test]
fn test_empty_list() {
    let image = image(&[(node(0), node(0))]);
    let report = walk_list(&image, node(0), &LAYOUT, 100);
    assert!(report.is_consistent());
    assert!(report.is_empty());
    assert!(list_is_empty(&image, node(0), &LAYOUT).unwrap());
}

#[test]
fn test_non_empty_list_is_not_empty() {
    let image = image(&well_formed(2));
    assert!(!list_is_empty(&image, node(0), &LAYOUT).unwrap());
}

#[test]
fn test_reverse_walk() {
    let image = image(&well_formed(3));
    let report = walk_list_with(&image, node(0), &LAYOUT, &ListWalkOptions::new(10).reverse());
    assert!(report.is_consistent());
    assert_eq!(report.nodes(), vec![node(3), node(2), node(1)]);
}

#[test]
fn test_include_head() {
    let image = image(&well_formed(2));
    let report = walk_list_with(&image, node(0), &LAYOUT, &ListWalkOptions::new(10).include_head());
    assert_eq!(report.nodes(), vec![node(0), node(1), node(2)]);
}

#[test]
fn test_cycle_not_involving_head() {
    let mut links = well_formed(4);
    // node 4 loops back to node 2 instead of closing through the head
    links[4].0 = node(2);
    let report = walk_list(&image(&links), node(0), &LAYOUT, 100);
    assert_eq!(
        report.fault,
        Some(Fault::Cycle {
            node: node(2),
            visited: 4
        })
    );
    assert_eq!(report.len(), 4);
}

#[test]
fn test_node_budget_exhausted() {
    let image = image(&well_formed(5));
    let report = walk_list(&image, node(0), &LAYOUT, 3);
    assert_eq!(
        report.fault,
        Some(Fault::Cycle {
            node: node(4),
            visited: 3
        })
    );
    assert_eq!(report.len(), 3);
}

#[test]
fn test_budget_equal_to_length_succeeds() {
    let image = image(&well_formed(5));
    assert!(walk_list(&image, node(0), &LAYOUT, 5).is_consistent());
}

#[test]
fn test_null_next_pointer() {
    let mut links = well_formed(3);
    links[2].0 = Address::NULL;
    let report = walk_list(&image(&links), node(0), &LAYOUT, 100);
    assert_eq!(
        report.fault,
        Some(Fault::BadPointer {
            node: node(2),
            field: LinkField::Next,
            value: Address::NULL
        })
    );
    assert_eq!(report.nodes(), vec![node(1), node(2)]);
}

#[test]
fn test_wild_next_pointer() {
    let image = image(&[(Address(0xdeadbeef), node(0))]);
    let report = walk_list(&image, node(0), &LAYOUT, 100);
    assert_eq!(
        report.fault,
        Some(Fault::BadPointer {
            node: node(0),
            field: LinkField::Next,
            value: Address(0xdeadbeef)
        })
    );
    assert!(report.is_empty());
}

#[test]
fn test_inconsistent_back_pointer_reports_offending_node() {
    let mut links = well_formed(4);
    links[3].1 = node(1);
    let report = walk_list(&image(&links), node(0), &LAYOUT, 100);
    assert_eq!(
        report.fault,
        Some(Fault::InconsistentBackPointer {
            node: node(3),
            field: LinkField::Prev,
            expected: node(2),
            found: node(1)
        })
    );
    assert_eq!(report.nodes(), vec![node(1), node(2), node(3)]);
}

#[test]
fn test_head_back_pointer_checked_on_close() {
    let image = image(&[(node(0), Address(0xdeadbeef))]);
    let report = walk_list(&image, node(0), &LAYOUT, 100);
    assert_eq!(
        report.fault,
        Some(Fault::InconsistentBackPointer {
            node: node(0),
            field: LinkField::Prev,
            expected: node(0),
            found: Address(0xdeadbeef)
        })
    );
}

#[test]
fn test_unreadable_head() {
    let image = image(&well_formed(1));
    let report = walk_list(&image, Address(0xdead0000), &LAYOUT, 100);
    assert_eq!(
        report.fault,
        Some(Fault::BadPointer {
            node: Address(0xdead0000),
            field: LinkField::Next,
            value: Address(0xdead0000)
        })
    );
    assert!(report.is_empty());

    let reverse = walk_list_with(
        &image,
        Address(0xdead0000),
        &LAYOUT,
        &ListWalkOptions::new(100).reverse(),
    );
    assert!(matches!(
        reverse.fault,
        Some(Fault::BadPointer {
            field: LinkField::Prev,
            ..
        })
    ));
    assert!(list_is_empty(&image, Address::NULL, &LAYOUT).is_err());
}

#[test]
fn test_container_addresses() {
    let image = image(&well_formed(3));
    let report = walk_list_entries(&image, node(0), &LAYOUT, ContainerLayout::new(0x10), 10);
    assert!(report.is_consistent());
    assert_eq!(
        report.entries[0],
        Entry {
            node: node(1),
            container: Some(Address(node(1).0 - 0x10))
        }
    );
    assert_eq!(report.containers().len(), 3);
}

#[test]
fn test_walker_is_fused_after_fault() {
    let mut links = well_formed(2);
    links[2].0 = Address::NULL;
    let image = image(&links);
    let mut walker = ListWalker::new(&image, node(0), LAYOUT, ListWalkOptions::new(10));
    assert!(walker.next().unwrap().is_ok());
    assert!(walker.next().unwrap().is_ok());
    assert!(walker.next().unwrap().is_err());
    assert!(walker.next().is_none());
    assert_eq!(walker.visited(), 2);
}

#[test]
fn test_back_pointer_cycle_without_exact_detection() {
    let mut links = well_formed(4);
    links[4].0 = node(2);
    let report = walk_list_with(
        &image(&links),
        node(0),
        &LAYOUT,
        &ListWalkOptions::new(100).exact_cycles(false),
    );
    assert!(matches!(
        report.fault,
        Some(Fault::InconsistentBackPointer { node: at, .. }) if at == node(2)
    ));
}

proptest! {
    #[test]
    fn prop_well_formed_lists_walk_in_order(n in 0usize..40) {
        let image = image(&well_formed(n));
        let report = walk_list(&image, node(0), &LAYOUT, n);
        prop_assert!(report.is_consistent());
        prop_assert_eq!(report.nodes(), (1..=n).map(node).collect::<Vec<_>>());
    }

    #[test]
    fn prop_corrupt_prev_is_caught_at_that_node(n in 2usize..30, victim in 1usize..30) {
        let victim = 1 + victim % n;
        let mut links = well_formed(n);
        // point the victim's prev somewhere other than its predecessor
        links[victim].1 = node((victim + 1) % (n + 1));
        let report = walk_list(&image(&links), node(0), &LAYOUT, n);
        let fault = report.fault.clone();
        prop_assert!(
            matches!(
                fault,
                Some(Fault::InconsistentBackPointer { node: at, .. }) if at == node(victim)
            ),
            "unexpected fault {:?}",
            fault
        );
        prop_assert_eq!(report.len(), victim);
    }
}
