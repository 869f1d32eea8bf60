//! Tree invariants of the taxonomy under many insertion orders.

use taxotag_core::{Taxonomy, TaxonomyNode};

/// ACM-CCS-like fragment used across the tests.
const PATHS: &[&[&str]] = &[
    &["Computing methodologies"],
    &["Computing methodologies", "Machine learning"],
    &["Computing methodologies", "Machine learning", "Learning paradigms"],
    &["Computing methodologies", "Artificial intelligence", "Natural language processing"],
    &["Applied computing", "Life and medical sciences"],
    &["Human-centered computing"],
    &["Human-centered computing", "Visualization", "Visualization techniques"],
    &["Security and privacy", "Cryptography"],
];

fn build(order: &[usize]) -> Taxonomy {
    let mut t = Taxonomy::new();
    for &i in order {
        t.add_node(PATHS[i], &format!("description {}", i));
    }
    t
}

fn check_depths(node: &TaxonomyNode) {
    for child in node.children() {
        assert_eq!(child.depth, node.depth + 1);
        check_depths(child);
    }
}

fn rotations() -> Vec<Vec<usize>> {
    let n = PATHS.len();
    let mut orders = Vec::new();
    for shift in 0..n {
        orders.push((0..n).map(|i| (i + shift) % n).collect());
        orders.push((0..n).rev().map(|i| (i + shift) % n).collect());
    }
    orders
}

#[test]
fn test_depth_invariant_for_every_insertion_order() {
    for order in rotations() {
        let t = build(&order);
        assert_eq!(t.root().depth, 0);
        check_depths(t.root());
        assert!(t.validate().is_ok());
    }
}

#[test]
fn test_every_inserted_path_resolves_to_its_last_name() {
    for order in rotations() {
        let t = build(&order);
        for &path in PATHS {
            let node = t.get_node(path).expect("inserted path must resolve");
            assert_eq!(node.name, *path.last().unwrap());
            assert_eq!(node.depth as usize, path.len());
        }
    }
}

#[test]
fn test_round_trip_for_every_insertion_order() {
    for order in rotations() {
        let t = build(&order);
        let back = Taxonomy::from_dict(&t.to_dict()).unwrap();
        assert_eq!(back, t);
        assert_eq!(back.depth(), t.depth());
        assert_eq!(back.len(), t.len());
    }
}

#[test]
fn test_depth_is_deepest_leaf() {
    let t = build(&(0..PATHS.len()).collect::<Vec<_>>());
    assert_eq!(t.depth(), 3);
}

#[test]
fn test_find_path_agrees_with_get_node() {
    let t = build(&(0..PATHS.len()).collect::<Vec<_>>());
    let path = t.find_path("Visualization techniques").unwrap();
    assert_eq!(path[0], "root");
    let node = t.get_node(&path[1..]).unwrap();
    assert_eq!(node.name, "Visualization techniques");
}
