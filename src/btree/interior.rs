//! Interior node accessors.
//!
//! An interior node with `n` keys routes through `n + 1` children: the key at
//! position `i` separates subtree `i` (strictly below it) from subtree `i + 1`
//! (at or above it). Children are stored as little-endian PageIds in a flat
//! array after the keys.

use std::cmp::Ordering;
use std::marker::PhantomData;

use eyre::{ensure, Result};

use crate::storage::{PageId, PAGE_SIZE};

use super::node::{self, NodeHeader, NodeKind, NodeLayout, CHILD_PTR_SIZE};
use super::Storable;

#[derive(Debug)]
pub(crate) struct InteriorNode<'a, K> {
    data: &'a [u8],
    layout: &'a NodeLayout,
    _marker: PhantomData<K>,
}

pub(crate) struct InteriorNodeMut<'a, K> {
    data: &'a mut [u8],
    layout: &'a NodeLayout,
    _marker: PhantomData<K>,
}

impl<'a, K: Storable> InteriorNode<'a, K> {
    pub fn from_page(data: &'a [u8], layout: &'a NodeLayout) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );
        let header = NodeHeader::from_bytes(data)?;
        ensure!(
            header.kind() == NodeKind::Interior,
            "expected interior node, got {:?}",
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
        debug_assert!(index < self.layout.order_internal);
        node::read_at(self.data, self.layout.keys_offset + index * self.layout.key_size)
    }

    pub fn child_at(&self, index: usize) -> PageId {
        debug_assert!(index <= self.layout.order_internal);
        let off = self.layout.children_offset + index * CHILD_PTR_SIZE;
        u32::from_le_bytes([
            self.data[off],
            self.data[off + 1],
            self.data[off + 2],
            self.data[off + 3],
        ])
    }

    /// First index whose key is `> target`, or `key_count` if none: the child
    /// slot to descend into, with keys equal to a separator going right.
    pub fn upper_bound<C>(&self, target: &K, cmp: &C) -> usize
    where
        C: Fn(&K, &K) -> Ordering,
    {
        node::upper_bound(self.key_count(), |i| self.key_at(i), target, cmp)
    }

    pub fn collect_keys(&self, from: usize) -> Vec<K> {
        (from..self.key_count()).map(|i| self.key_at(i)).collect()
    }

    /// Copies children `[from, key_count + 1)` out of the page.
    pub fn collect_children(&self, from: usize) -> Vec<PageId> {
        (from..self.key_count() + 1)
            .map(|i| self.child_at(i))
            .collect()
    }
}

impl<'a, K: Storable> InteriorNodeMut<'a, K> {
    pub fn from_page(data: &'a mut [u8], layout: &'a NodeLayout) -> Result<Self> {
        InteriorNode::<K>::from_page(data, layout)?;
        Ok(Self {
            data,
            layout,
            _marker: PhantomData,
        })
    }

    pub fn as_ref(&self) -> InteriorNode<'_, K> {
        InteriorNode {
            data: self.data,
            layout: self.layout,
            _marker: PhantomData,
        }
    }

    pub fn set_key_count(&mut self, count: usize) {
        debug_assert!(count <= self.layout.order_internal);
        NodeHeader::from_bytes_mut(self.data)
            .unwrap()
            .set_key_count(count as u16);
    }

    pub fn write_key(&mut self, index: usize, key: &K) {
        debug_assert!(index < self.layout.order_internal);
        node::write_at(
            self.data,
            self.layout.keys_offset + index * self.layout.key_size,
            key,
        );
    }

    pub fn write_child(&mut self, index: usize, page_no: PageId) {
        debug_assert!(index <= self.layout.order_internal);
        let off = self.layout.children_offset + index * CHILD_PTR_SIZE;
        self.data[off..off + 4].copy_from_slice(&page_no.to_le_bytes());
    }

    /// Inserts `separator` at key slot `index` and `right_child` at child
    /// slot `index + 1`, shifting both tails one slot right. The node must
    /// not be full.
    pub fn insert_separator_at(&mut self, index: usize, separator: &K, right_child: PageId) {
        let count = self.as_ref().key_count();
        debug_assert!(count < self.layout.order_internal);
        debug_assert!(index <= count);

        let ks = self.layout.key_size;
        let ko = self.layout.keys_offset;
        let co = self.layout.children_offset;

        self.data
            .copy_within(ko + index * ks..ko + count * ks, ko + (index + 1) * ks);
        self.data.copy_within(
            co + (index + 1) * CHILD_PTR_SIZE..co + (count + 1) * CHILD_PTR_SIZE,
            co + (index + 2) * CHILD_PTR_SIZE,
        );

        node::write_at(self.data, ko + index * ks, separator);
        self.write_child(index + 1, right_child);
        self.set_key_count(count + 1);
    }
}
