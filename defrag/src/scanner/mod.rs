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

//! The scanner interface, per §4.5: the core only consumes a
//! fragment-producing pass over the volume's metadata, whichever concrete
//! parser recognized it. `fat` and `ntfs` are the two boot-sector-driven
//! parsers; `walk` is the directory-walk fallback when neither's cookie
//! checks out.

pub mod fat;
pub mod ntfs;
pub mod walk;

use crate::error::VolumeIoError;
use crate::model::{Item, ItemTree};
use crate::observer::{ClusterColor, Observer};
use crate::units::Clusters64;

/// Read access to raw volume bytes, byte-addressed. The seam a boot
/// sector / MFT / FAT table parser crosses to get bytes off the volume;
/// narrower than `VolumeDriver` (no item handles, no moves) because the
/// scanner never needs those operations.
pub trait RawVolumeReader {
    /// Reads `buffer.len()` bytes starting at `byte_offset`.
    fn read_at(&self, byte_offset: u64, buffer: &mut [u8]) -> Result<(), VolumeIoError>;
}

/// What a successful scan pass reports back to the session, before the
/// analyze phase applies masks and computes zones.
#[derive(Debug, Default)]
pub struct ScanTotals {
    pub all_files: u64,
    pub all_bytes: u64,
    pub all_clusters: u64,
    pub fragmented_items: u64,
    pub fragmented_clusters: u64,
}

/// Inserts a freshly built item into the tree, colorizing it exactly once
/// via the observer and folding its contribution into `totals` — the
/// per-scanner bookkeeping every concrete scanner must perform identically
/// (§4.5 (b), (c)).
pub fn finish_item(tree: &mut ItemTree, totals: &mut ScanTotals, observer: &mut dyn Observer, item: Item) {
    totals.all_files += 1;
    totals.all_bytes += item.bytes.get();
    let clusters = item.clusters_count();
    totals.all_clusters += clusters.get();

    let fragmented = item.is_fragmented();
    if fragmented {
        totals.fragmented_items += 1;
        totals.fragmented_clusters += clusters.get();
    }

    let color = color_for(&item, fragmented);
    if let (Some(first), Some(last)) = (item.first_lcn(), item.highest_lcn()) {
        observer.draw_cluster(first, Clusters64::new(last.get() + 1), color);
    }
    observer.show_analyze(&item);

    tree.insert(item);
}

fn color_for(item: &Item, fragmented: bool) -> ClusterColor {
    if item.flags.is_unmovable {
        ClusterColor::Unmovable
    } else if item.flags.is_dir {
        ClusterColor::Directory
    } else if item.flags.is_hog {
        ClusterColor::SpaceHog
    } else if fragmented {
        ClusterColor::Fragmented
    } else {
        ClusterColor::Unfragmented
    }
}
