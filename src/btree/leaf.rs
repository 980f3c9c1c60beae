//! Leaf node accessors.
//!
//! A leaf stores `key_count` sorted keys with their values in the flat arrays
//! described by [`NodeLayout`], plus the next-leaf pointer in the last 4
//! bytes of the page. [`LeafNode`] is the read-only view, [`LeafNodeMut`] the
//! mutable one; both borrow the page buffer and do no copying beyond the
//! individual fixed-size reads.

use std::cmp::Ordering;
use std::marker::PhantomData;

use eyre::{ensure, Result};

use crate::storage::{PageId, PAGE_SIZE};

use super::node::{self, NodeHeader, NodeKind, NodeLayout};
use super::Storable;

#[derive(Debug)]
pub(crate) struct LeafNode<'a, K, V> {
    data: &'a [u8],
    layout: &'a NodeLayout,
    _marker: PhantomData<(K, V)>,
}

pub(crate) struct LeafNodeMut<'a, K, V> {
    data: &'a mut [u8],
    layout: &'a NodeLayout,
    _marker: PhantomData<(K, V)>,
}

impl<'a, K: Storable, V: Storable> LeafNode<'a, K, V> {
    pub fn from_page(data: &'a [u8], layout: &'a NodeLayout) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );
        let header = NodeHeader::from_bytes(data)?;
        ensure!(
            header.kind() == NodeKind::Leaf,
            "expected leaf node, got {:?}",
            header.kind()
        );
        Ok(Self {
            data,
            layout,
            _marker: PhantomData,
        })
    }

    pub fn key_count(&self) -> usize {
        NodeHeader::from_bytes(self.data).unwrap().key_count() as usize
    }

    pub fn key_at(&self, index: usize) -> K {
        debug_assert!(index < self.layout.order_leaf);
        node::read_at(self.data, self.layout.keys_offset + index * self.layout.key_size)
    }

    pub fn value_at(&self, index: usize) -> V {
        debug_assert!(index < self.layout.order_leaf);
        node::read_at(
            self.data,
            self.layout.values_offset + index * self.layout.value_size,
        )
    }

    pub fn next_leaf(&self) -> PageId {
        let off = self.layout.next_leaf_offset;
        u32::from_le_bytes([
            self.data[off],
            self.data[off + 1],
            self.data[off + 2],
            self.data[off + 3],
        ])
    }

    /// First index whose key is `>= target`, or `key_count` if none.
    pub fn lower_bound<C>(&self, target: &K, cmp: &C) -> usize
    where
        C: Fn(&K, &K) -> Ordering,
    {
        node::lower_bound(self.key_count(), |i| self.key_at(i), target, cmp)
    }

    /// Copies entries `[from, key_count)` out of the page, for splits.
    pub fn collect_entries(&self, from: usize) -> Vec<(K, V)> {
        (from..self.key_count())
            .map(|i| (self.key_at(i), self.value_at(i)))
            .collect()
    }
}

impl<'a, K: Storable, V: Storable> LeafNodeMut<'a, K, V> {
    /// Zeroes the page and writes a fresh empty-leaf header.
    pub fn init(data: &'a mut [u8], layout: &'a NodeLayout) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );
        data.fill(0);
        NodeHeader::new(NodeKind::Leaf).write_to(data)?;
        Ok(Self {
            data,
            layout,
            _marker: PhantomData,
        })
    }

    pub fn from_page(data: &'a mut [u8], layout: &'a NodeLayout) -> Result<Self> {
        LeafNode::<K, V>::from_page(data, layout)?;
        Ok(Self {
            data,
            layout,
            _marker: PhantomData,
        })
    }

    pub fn as_ref(&self) -> LeafNode<'_, K, V> {
        LeafNode {
            data: self.data,
            layout: self.layout,
            _marker: PhantomData,
        }
    }

    pub fn set_key_count(&mut self, count: usize) {
        debug_assert!(count <= self.layout.order_leaf);
        NodeHeader::from_bytes_mut(self.data)
            .unwrap()
            .set_key_count(count as u16);
    }

    pub fn set_next_leaf(&mut self, page_no: PageId) {
        let off = self.layout.next_leaf_offset;
        self.data[off..off + 4].copy_from_slice(&page_no.to_le_bytes());
    }

    /// Writes an entry slot directly, without shifting. Used when refilling a
    /// freshly initialized sibling during a split; the caller sets the count.
    pub fn write_entry(&mut self, index: usize, key: &K, value: &V) {
        debug_assert!(index < self.layout.order_leaf);
        node::write_at(
            self.data,
            self.layout.keys_offset + index * self.layout.key_size,
            key,
        );
        node::write_at(
            self.data,
            self.layout.values_offset + index * self.layout.value_size,
            value,
        );
    }

    pub fn set_value_at(&mut self, index: usize, value: &V) {
        debug_assert!(index < self.layout.order_leaf);
        node::write_at(
            self.data,
            self.layout.values_offset + index * self.layout.value_size,
            value,
        );
    }

    /// Inserts at `index`, shifting the tail one slot right. The shift is an
    /// overlapping backwards move; the node must not be full.
    pub fn insert_at(&mut self, index: usize, key: &K, value: &V) {
        let count = self.as_ref().key_count();
        debug_assert!(count < self.layout.order_leaf);
        debug_assert!(index <= count);

        let ks = self.layout.key_size;
        let ko = self.layout.keys_offset;
        let vs = self.layout.value_size;
        let vo = self.layout.values_offset;

        self.data
            .copy_within(ko + index * ks..ko + count * ks, ko + (index + 1) * ks);
        self.data
            .copy_within(vo + index * vs..vo + count * vs, vo + (index + 1) * vs);

        node::write_at(self.data, ko + index * ks, key);
        node::write_at(self.data, vo + index * vs, value);
        self.set_key_count(count + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> NodeLayout {
        NodeLayout::new::<u64, u64>(4).unwrap()
    }

    #[test]
    fn init_produces_empty_leaf() {
        let layout = layout();
        let mut page = vec![0xFFu8; PAGE_SIZE];

        LeafNodeMut::<u64, u64>::init(&mut page, &layout).unwrap();

        let leaf = LeafNode::<u64, u64>::from_page(&page, &layout).unwrap();
        assert_eq!(leaf.key_count(), 0);
        assert_eq!(leaf.next_leaf(), 0);
    }

    #[test]
    fn from_page_rejects_wrong_kind() {
        let layout = layout();
        let page = vec![0u8; PAGE_SIZE];

        let result = LeafNode::<u64, u64>::from_page(&page, &layout);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("expected leaf"));
    }

    #[test]
    fn insert_at_keeps_sorted_order() {
        let layout = layout();
        let mut page = vec![0u8; PAGE_SIZE];
        let mut leaf = LeafNodeMut::<u64, u64>::init(&mut page, &layout).unwrap();

        leaf.insert_at(0, &20, &200);
        leaf.insert_at(0, &10, &100);
        leaf.insert_at(2, &30, &300);
        leaf.insert_at(1, &15, &150);

        let view = leaf.as_ref();
        assert_eq!(view.key_count(), 4);
        let keys: Vec<u64> = (0..4).map(|i| view.key_at(i)).collect();
        let values: Vec<u64> = (0..4).map(|i| view.value_at(i)).collect();
        assert_eq!(keys, vec![10, 15, 20, 30]);
        assert_eq!(values, vec![100, 150, 200, 300]);
    }

    #[test]
    fn next_leaf_roundtrip() {
        let layout = layout();
        let mut page = vec![0u8; PAGE_SIZE];
        let mut leaf = LeafNodeMut::<u64, u64>::init(&mut page, &layout).unwrap();

        leaf.set_next_leaf(77);
        assert_eq!(leaf.as_ref().next_leaf(), 77);
    }

    #[test]
    fn collect_entries_returns_tail() {
        let layout = layout();
        let mut page = vec![0u8; PAGE_SIZE];
        let mut leaf = LeafNodeMut::<u64, u64>::init(&mut page, &layout).unwrap();

        for (i, k) in [1u64, 2, 3, 4].iter().enumerate() {
            leaf.insert_at(i, k, &(k * 10));
        }

        let tail = leaf.as_ref().collect_entries(2);
        assert_eq!(tail, vec![(3, 30), (4, 40)]);
    }
}
