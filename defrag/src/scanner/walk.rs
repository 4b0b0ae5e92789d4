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

//! The fallback scanner for a file system neither `fat` nor `ntfs`
//! recognizes: a directory-tree walk producing items with no retrievable
//! physical placement. These items carry no fragments a mover could act
//! on, so they're unmovable by construction — the fallback can still
//! report what a volume holds, even though it can't defragment it.

use crate::model::fragment::{Fragment, VIRTUAL};
use crate::model::{Item, ItemTree};
use crate::observer::Observer;
use crate::units::{Bytes64, Clusters64, Inode64};

use super::ScanTotals;

/// One entry a directory enumerator hands back, independent of which file
/// system it came from.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    pub inode: u64,
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
}

/// The minimal directory-enumeration seam the walk fallback needs,
/// mirroring a plain `FileSystemReader`-shaped collaborator without
/// depending on any one file system's object representation.
pub trait DirectoryEnumerator {
    fn root(&self) -> Vec<DirectoryEntry>;

    fn children(&self, parent_inode: u64) -> Vec<DirectoryEntry>;
}

/// Walks `enumerator` breadth-first from the root, inserting one item per
/// entry with a single all-virtual fragment (no physical clusters, so
/// `clusters_count` is zero and the mover will never be asked to touch
/// it). `long_path` is the entry's full path for masking purposes.
pub fn scan<E: DirectoryEnumerator>(enumerator: &E, tree: &mut ItemTree, totals: &mut ScanTotals, observer: &mut dyn Observer) {
    let mut stack: Vec<(Option<Inode64>, String, DirectoryEntry)> = enumerator
        .root()
        .into_iter()
        .map(|entry| (None, String::new(), entry))
        .collect();

    while let Some((parent_inode, parent_path, entry)) = stack.pop() {
        let long_path = if parent_path.is_empty() {
            entry.name.clone()
        } else {
            format!("{parent_path}/{}", entry.name)
        };

        let mut item = Item::new(
            Inode64::new(entry.inode),
            0,
            parent_inode,
            long_path.clone(),
            long_path.clone(),
            Bytes64::new(entry.size),
            entry.is_dir,
            vec![Fragment::new(Clusters64::ZERO, VIRTUAL)],
        );
        item.flags.is_unmovable = true;

        super::finish_item(tree, totals, observer, item);

        if entry.is_dir {
            for child in enumerator.children(entry.inode) {
                stack.push((Some(Inode64::new(entry.inode)), long_path.clone(), child));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NullObserver;
    use std::collections::HashMap;

    struct FakeFs {
        root: Vec<DirectoryEntry>,
        children: HashMap<u64, Vec<DirectoryEntry>>,
    }

    impl DirectoryEnumerator for FakeFs {
        fn root(&self) -> Vec<DirectoryEntry> {
            self.root.clone()
        }

        fn children(&self, parent_inode: u64) -> Vec<DirectoryEntry> {
            self.children.get(&parent_inode).cloned().unwrap_or_default()
        }
    }

    #[test]
    fn scan_walks_nested_directories_and_marks_everything_unmovable() {
        let mut children = HashMap::new();
        children.insert(
            1,
            vec![DirectoryEntry {
                inode: 2,
                name: "child.txt".into(),
                size: 10,
                is_dir: false,
            }],
        );

        let fs = FakeFs {
            root: vec![DirectoryEntry {
                inode: 1,
                name: "dir".into(),
                size: 0,
                is_dir: true,
            }],
            children,
        };

        let mut tree = ItemTree::new();
        let mut totals = ScanTotals::default();
        let mut observer = NullObserver;
        scan(&fs, &mut tree, &mut totals, &mut observer);

        assert_eq!(totals.all_files, 2);
        assert_eq!(tree.len(), 2);
        for id in tree.iter_ascending() {
            assert!(tree.get(id).unwrap().flags.is_unmovable);
        }
    }
}
