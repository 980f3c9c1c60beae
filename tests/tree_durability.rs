//! End-to-end tree behavior against a real file: point reads and writes,
//! overwrite semantics, split cascades, rollback, and reopen durability.

use std::cmp::Ordering;

use tempfile::tempdir;
use zdb::{BTree, Pager};

type Value = [u8; 8];

fn u64_cmp(a: &u64, b: &u64) -> Ordering {
    a.cmp(b)
}

/// Packs a short string into a fixed-size value, zero-padded.
fn val(s: &str) -> Value {
    let mut out = [0u8; 8];
    out[..s.len()].copy_from_slice(s.as_bytes());
    out
}

#[test]
fn empty_tree_read() {
    let dir = tempdir().unwrap();
    let mut pager = Pager::open(dir.path().join("db.zdb")).unwrap();
    let tree = BTree::<u64, Value>::open(&mut pager).unwrap();

    assert_eq!(tree.get(&42, &u64_cmp), None);
    assert_ne!(tree.root_page(), 0);
    assert_eq!(tree.depth().unwrap(), 1);
}

#[test]
fn three_inserts_no_split() {
    let dir = tempdir().unwrap();
    let mut pager = Pager::open(dir.path().join("db.zdb")).unwrap();
    let mut tree = BTree::<u64, Value>::open(&mut pager).unwrap();

    tree.begin_tx().unwrap();
    tree.put(1, val("one"), &u64_cmp).unwrap();
    tree.put(2, val("two"), &u64_cmp).unwrap();
    tree.put(3, val("three"), &u64_cmp).unwrap();
    tree.commit_tx().unwrap();

    assert_eq!(tree.get(&1, &u64_cmp), Some(val("one")));
    assert_eq!(tree.get(&2, &u64_cmp), Some(val("two")));
    assert_eq!(tree.get(&3, &u64_cmp), Some(val("three")));
    assert_eq!(tree.get(&4, &u64_cmp), None);
    assert_eq!(tree.depth().unwrap(), 1);
}

#[test]
fn overwrite_after_commit() {
    let dir = tempdir().unwrap();
    let mut pager = Pager::open(dir.path().join("db.zdb")).unwrap();
    let mut tree = BTree::<u64, Value>::open(&mut pager).unwrap();

    tree.begin_tx().unwrap();
    tree.put(1, val("one"), &u64_cmp).unwrap();
    tree.put(2, val("two"), &u64_cmp).unwrap();
    tree.put(3, val("three"), &u64_cmp).unwrap();
    tree.commit_tx().unwrap();

    tree.begin_tx().unwrap();
    tree.put(2, val("TWO"), &u64_cmp).unwrap();
    tree.commit_tx().unwrap();

    assert_eq!(tree.get(&2, &u64_cmp), Some(val("TWO")));
    assert_eq!(tree.get(&1, &u64_cmp), Some(val("one")));
    assert_eq!(tree.get(&3, &u64_cmp), Some(val("three")));
}

#[test]
fn leaf_split_cascade() {
    let dir = tempdir().unwrap();
    let mut pager = Pager::open(dir.path().join("db.zdb")).unwrap();
    let mut tree = BTree::<u64, Value>::open(&mut pager).unwrap();

    tree.begin_tx().unwrap();
    for i in 0..800u64 {
        tree.put(i, val(&format!("v{}", i)), &u64_cmp).unwrap();
    }
    tree.commit_tx().unwrap();

    assert!(tree.depth().unwrap() >= 2);
    assert_eq!(tree.get(&0, &u64_cmp), Some(val("v0")));
    assert_eq!(tree.get(&400, &u64_cmp), Some(val("v400")));
    assert_eq!(tree.get(&799, &u64_cmp), Some(val("v799")));
    assert_eq!(tree.get(&800, &u64_cmp), None);
}

#[test]
fn rollback_after_overwrite() {
    let dir = tempdir().unwrap();
    let mut pager = Pager::open(dir.path().join("db.zdb")).unwrap();
    let mut tree = BTree::<u64, Value>::open(&mut pager).unwrap();

    tree.begin_tx().unwrap();
    tree.put(1, val("one"), &u64_cmp).unwrap();
    tree.put(2, val("two"), &u64_cmp).unwrap();
    tree.put(3, val("three"), &u64_cmp).unwrap();
    tree.commit_tx().unwrap();

    tree.begin_tx().unwrap();
    tree.put(2, val("XXX"), &u64_cmp).unwrap();
    tree.rollback_tx().unwrap();

    assert_eq!(tree.get(&2, &u64_cmp), Some(val("two")));
}

#[test]
fn rollback_of_fresh_insert_leaves_no_trace() {
    let dir = tempdir().unwrap();
    let mut pager = Pager::open(dir.path().join("db.zdb")).unwrap();
    let mut tree = BTree::<u64, Value>::open(&mut pager).unwrap();

    tree.begin_tx().unwrap();
    tree.put(9, val("nine"), &u64_cmp).unwrap();
    tree.rollback_tx().unwrap();

    assert_eq!(tree.get(&9, &u64_cmp), None);
}

#[test]
fn reopen_durability() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db.zdb");

    {
        let mut pager = Pager::open(&path).unwrap();
        let mut tree = BTree::<u64, Value>::open(&mut pager).unwrap();

        tree.begin_tx().unwrap();
        for i in 0..800u64 {
            tree.put(i, val(&format!("v{}", i)), &u64_cmp).unwrap();
        }
        tree.commit_tx().unwrap();
    }

    let mut pager = Pager::open(&path).unwrap();
    let tree = BTree::<u64, Value>::open(&mut pager).unwrap();

    assert!(tree.depth().unwrap() >= 2);
    for i in (0..800u64).step_by(37) {
        assert_eq!(
            tree.get(&i, &u64_cmp),
            Some(val(&format!("v{}", i))),
            "key {} lost across reopen",
            i
        );
    }
    assert_eq!(tree.get(&0, &u64_cmp), Some(val("v0")));
    assert_eq!(tree.get(&799, &u64_cmp), Some(val("v799")));
    assert_eq!(tree.get(&800, &u64_cmp), None);
}

#[test]
fn many_transactions_interleave_cleanly() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db.zdb");
    let mut pager = Pager::open(&path).unwrap();
    let mut tree = BTree::<u64, Value>::open(&mut pager).unwrap();

    for batch in 0..10u64 {
        tree.begin_tx().unwrap();
        for i in 0..50u64 {
            let key = batch * 50 + i;
            tree.put(key, val(&format!("b{}", batch)), &u64_cmp).unwrap();
        }
        tree.commit_tx().unwrap();
    }

    for batch in 0..10u64 {
        for i in 0..50u64 {
            let key = batch * 50 + i;
            assert_eq!(tree.get(&key, &u64_cmp), Some(val(&format!("b{}", batch))));
        }
    }
}
