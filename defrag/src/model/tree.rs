// voldefrag
// Copyright (C) 2026 the voldefrag contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! An ordered collection of items, keyed by first physical LCN (ties broken
//! by long path). The C original keeps this as a self-balancing binary tree
//! of nodes with sibling/parent pointers; an owned arena plus a `BTreeSet`
//! index gives the same ordered-traversal operations without unsafe pointer
//! juggling, at the cost of one extra lookup per detach/reinsert.

use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;

use super::item::{Item, ItemId, StreamId};
use crate::units::{Clusters64, Inode64};

type OrderKey = (Option<Clusters64>, String);

fn order_key(item: &Item) -> OrderKey {
    (item.first_lcn(), item.long_path.clone())
}

#[derive(Debug, Default)]
pub struct ItemTree {
    items: HashMap<ItemId, Item>,
    index: BTreeSet<(OrderKey, ItemId)>,
    current_key: HashMap<ItemId, OrderKey>,
    by_inode: HashMap<(Inode64, StreamId), ItemId>,
    next_id: u64,
}

impl ItemTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Adds a freshly scanned item to the tree, assigning it a stable
    /// `ItemId`.
    pub fn insert(&mut self, item: Item) -> ItemId {
        let id = ItemId(self.next_id);
        self.next_id += 1;

        let key = order_key(&item);
        self.by_inode.insert((item.inode, item.stream), id);
        self.items.insert(id, item);
        self.index.insert((key.clone(), id));
        self.current_key.insert(id, key);
        id
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.get_mut(&id)
    }

    pub fn find_by_inode(&self, inode: Inode64, stream: StreamId) -> Option<ItemId> {
        self.by_inode.get(&(inode, stream)).copied()
    }

    /// Removes `id` from the ordering index without dropping it from the
    /// arena. Must be called before mutating a field that `order_key`
    /// depends on (the fragment list or the long path); call `reinsert`
    /// afterwards to restore the ordering invariant.
    pub fn detach(&mut self, id: ItemId) {
        if let Some(key) = self.current_key.remove(&id) {
            self.index.remove(&(key, id));
        }
    }

    /// Recomputes `id`'s ordering key from its current state and reinserts
    /// it into the index. A no-op (aside from recomputing the key) if the
    /// item was never detached.
    pub fn reinsert(&mut self, id: ItemId) {
        if let Some(item) = self.items.get(&id) {
            let key = order_key(item);
            self.index.insert((key.clone(), id));
            self.current_key.insert(id, key);
        }
    }

    pub fn delete_tree(&mut self) {
        self.items.clear();
        self.index.clear();
        self.current_key.clear();
        self.by_inode.clear();
    }

    pub fn smallest(&self) -> Option<ItemId> {
        self.index.iter().next().map(|(_, id)| *id)
    }

    pub fn biggest(&self) -> Option<ItemId> {
        self.index.iter().next_back().map(|(_, id)| *id)
    }

    pub fn next(&self, id: ItemId) -> Option<ItemId> {
        let key = self.current_key.get(&id)?;
        self.index
            .range((Bound::Excluded((key.clone(), id)), Bound::Unbounded))
            .next()
            .map(|(_, id)| *id)
    }

    pub fn prev(&self, id: ItemId) -> Option<ItemId> {
        let key = self.current_key.get(&id)?;
        self.index
            .range((Bound::Unbounded, Bound::Excluded((key.clone(), id))))
            .next_back()
            .map(|(_, id)| *id)
    }

    /// In-order iteration from smallest to biggest.
    pub fn iter_ascending(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.index.iter().map(|(_, id)| *id)
    }

    /// In-order iteration from biggest to smallest.
    pub fn iter_descending(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.index.iter().rev().map(|(_, id)| *id)
    }

    /// Verifies invariant 2 (the `ItemTree` is ordered by first-LCN) holds by
    /// reconstruction; used by tests and by the `analyze` phase's optional
    /// consistency pass.
    pub fn is_well_ordered(&self) -> bool {
        let mut previous: Option<&OrderKey> = None;
        for (key, _) in &self.index {
            if let Some(previous) = previous {
                if previous > key {
                    return false;
                }
            }
            previous = Some(key);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fragment::Fragment;
    use crate::units::Bytes64;

    fn item(inode: u64, long_path: &str, lcn: u64) -> Item {
        let mut item = Item::new(
            Inode64::new(inode),
            0,
            None,
            long_path.into(),
            long_path.into(),
            Bytes64::new(10),
            false,
            vec![Fragment::new(Clusters64::new(1), Clusters64::new(lcn))],
        );
        item.long_path = long_path.to_string();
        item
    }

    #[test]
    fn ordering_follows_first_lcn_then_path() {
        let mut tree = ItemTree::new();
        let a = tree.insert(item(1, "b", 50));
        let b = tree.insert(item(2, "a", 10));
        let c = tree.insert(item(3, "z", 10));

        assert_eq!(tree.smallest(), Some(b));
        assert_eq!(tree.next(b), Some(c));
        assert_eq!(tree.next(c), Some(a));
        assert_eq!(tree.biggest(), Some(a));
        assert!(tree.is_well_ordered());
    }

    #[test]
    fn detach_and_reinsert_preserves_arena_slot_but_reorders() {
        let mut tree = ItemTree::new();
        let a = tree.insert(item(1, "a", 10));
        let b = tree.insert(item(2, "b", 20));

        assert_eq!(tree.smallest(), Some(a));

        tree.detach(a);
        tree.get_mut(a).unwrap().fragments[0].lcn = Clusters64::new(30);
        tree.reinsert(a);

        assert_eq!(tree.smallest(), Some(b));
        assert_eq!(tree.biggest(), Some(a));
        assert!(tree.is_well_ordered());
    }

    #[test]
    fn find_by_inode_round_trips() {
        let mut tree = ItemTree::new();
        let id = tree.insert(item(42, "x", 1));
        assert_eq!(tree.find_by_inode(Inode64::new(42), 0), Some(id));
        assert_eq!(tree.find_by_inode(Inode64::new(43), 0), None);
    }
}
