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

//! One file or directory stream. The C original links an item to its parent
//! directory by pointer; here the link is a `parent_inode: Option<Inode64>`
//! plus an `inode -> ItemId` lookup table on the tree, since ownership in a
//! garbage-collected-free arena can't be a raw back-reference.

use super::fragment::{self, Fragment};
use crate::units::{Bytes64, Clusters64, FileTime64, Inode64};

/// An opaque handle into an `ItemTree`'s arena. Cheap to copy, stable across
/// a detach/reinsert (only the tree's ordering index changes; the arena slot
/// does not move).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemId(pub u64);

/// Which attribute stream of the inode this item represents. Non-zero for
/// alternate data streams on NTFS; always 0 on FAT, which has no concept of
/// multiple streams per inode.
pub type StreamId = u32;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ItemFlags {
    pub is_dir: bool,
    pub is_unmovable: bool,
    pub is_excluded: bool,
    pub is_hog: bool,
}

#[derive(Debug, Clone)]
pub struct Item {
    pub inode: Inode64,
    pub stream: StreamId,
    pub parent_inode: Option<Inode64>,
    pub long_path: String,
    pub short_path: String,
    pub long_name: String,
    pub short_name: String,
    pub bytes: Bytes64,
    pub created: FileTime64,
    pub last_access: FileTime64,
    pub last_write: FileTime64,
    pub mft_change: FileTime64,
    pub flags: ItemFlags,
    pub fragments: Vec<Fragment>,
}

impl Item {
    /// A new item straight off the scanner: unfragmented metadata, no flags
    /// set yet (the analyzer phase sets `is_excluded`/`is_hog`/`is_unmovable`).
    pub fn new(
        inode: Inode64,
        stream: StreamId,
        parent_inode: Option<Inode64>,
        long_name: String,
        short_name: String,
        bytes: Bytes64,
        is_dir: bool,
        fragments: Vec<Fragment>,
    ) -> Self {
        Self {
            inode,
            stream,
            parent_inode,
            long_path: long_name.clone(),
            short_path: short_name.clone(),
            long_name,
            short_name,
            bytes,
            created: FileTime64::ZERO,
            last_access: FileTime64::ZERO,
            last_write: FileTime64::ZERO,
            mft_change: FileTime64::ZERO,
            flags: ItemFlags {
                is_dir,
                ..ItemFlags::default()
            },
            fragments,
        }
    }

    pub fn is_movable(&self) -> bool {
        !self.flags.is_unmovable && !self.flags.is_excluded
    }

    pub fn is_fragmented(&self) -> bool {
        fragment::is_fragmented(&self.fragments)
    }

    pub fn clusters_count(&self) -> Clusters64 {
        fragment::physical_cluster_count(&self.fragments)
    }

    pub fn first_lcn(&self) -> Option<Clusters64> {
        fragment::first_physical_lcn(&self.fragments)
    }

    pub fn highest_lcn(&self) -> Option<Clusters64> {
        fragment::highest_physical_lcn(&self.fragments)
    }

    /// The zone an item of this kind prefers, per the zone calculator:
    /// directories -> 0, space-hogs -> 2, everything else -> 1.
    pub fn preferred_zone(&self) -> usize {
        if self.flags.is_dir {
            0
        } else if self.flags.is_hog {
            2
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::Clusters64 as C;

    fn item_with_fragments(fragments: Vec<Fragment>) -> Item {
        Item::new(
            Inode64::new(1),
            0,
            None,
            "file".into(),
            "FILE".into(),
            Bytes64::new(100),
            false,
            fragments,
        )
    }

    #[test]
    fn preferred_zone_follows_dir_hog_regular_order() {
        let mut item = item_with_fragments(vec![Fragment::new(C::new(1), C::new(0))]);
        assert_eq!(item.preferred_zone(), 1);

        item.flags.is_dir = true;
        assert_eq!(item.preferred_zone(), 0);

        item.flags.is_dir = false;
        item.flags.is_hog = true;
        assert_eq!(item.preferred_zone(), 2);
    }

    #[test]
    fn is_movable_requires_neither_unmovable_nor_excluded() {
        let mut item = item_with_fragments(vec![Fragment::new(C::new(1), C::new(0))]);
        assert!(item.is_movable());

        item.flags.is_unmovable = true;
        assert!(!item.is_movable());
    }
}
