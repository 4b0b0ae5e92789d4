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

//! Phase 2: the main defragmentation pass. Every fragmented, movable item
//! gets one chance at a single-shot move into a gap of its own size; if no
//! such gap exists anywhere, the item is relocated piecewise into whatever
//! gaps are available.

use crate::error::ItemError;
use crate::gap;
use crate::model::ItemId;
use crate::observer::{MoveDirection, Observer, Phase};
use crate::session::Session;
use crate::units::Clusters64;
use crate::volume::VolumeDriver;

pub fn run<D: VolumeDriver>(session: &mut Session, driver: &D, observer: &mut dyn Observer) {
    let ids: Vec<ItemId> = session.tree.iter_ascending().collect();

    for id in ids {
        if !super::keep_running(session, observer, Phase::Defragment, 0) {
            return;
        }

        let Some(item) = session.tree.get(id) else { continue };
        if !item.is_movable() || !item.is_fragmented() {
            continue;
        }
        let size = item.clusters_count();
        let zone = item.preferred_zone();

        let total_clusters = session.total_clusters;
        let (zone_start, zone_end) = (session.zones[zone], session.zones[zone + 1]);
        let mft_excludes = session.mft_excludes.clone();

        let preferred = gap::find_gap(&session.bitmap, &mft_excludes, zone_start, zone_end, size, true, false, false);
        let anywhere = preferred.or_else(|| gap::find_gap(&session.bitmap, &mft_excludes, Clusters64::ZERO, total_clusters, size, true, false, false));

        if let Some((gap_begin, _)) = anywhere {
            let _ = session.move_item(driver, id, gap_begin, Clusters64::ZERO, size, MoveDirection::ToGap, observer);
            continue;
        }

        // No single gap fits the whole item: move in segments, largest gap
        // first, until the item is whole or the volume is out of usable
        // space (fail-open: stop the phase entirely rather than fragment
        // every remaining item one cluster at a time).
        if !move_in_segments(session, driver, id, size, &mft_excludes, observer) {
            return;
        }
    }
}

/// Relocates `remaining` clusters of `item_id` piece by piece into whatever
/// gaps exist, largest first, stopping early if a segment's natural first
/// fragment is bigger than every available gap (moving part of it would
/// only fragment it further for no gain). Returns `false` if the volume
/// has no more usable gaps at all, signaling the phase to abort.
fn move_in_segments<D: VolumeDriver>(
    session: &mut Session,
    driver: &D,
    item_id: ItemId,
    mut remaining: Clusters64,
    mft_excludes: &[gap::LcnRange],
    observer: &mut dyn Observer,
) -> bool {
    let mut offset = Clusters64::ZERO;

    while remaining.get() > 0 {
        let total_clusters = session.total_clusters;
        let Some((gap_begin, gap_end)) =
            gap::find_gap(&session.bitmap, mft_excludes, Clusters64::ZERO, total_clusters, Clusters64::new(1), false, false, false)
        else {
            return false;
        };

        let gap_len = gap_end - gap_begin;
        let first_fragment_len = match session.tree.get(item_id) {
            Some(item) => first_fragment_length_at(&item.fragments, offset),
            None => return false,
        };

        if first_fragment_len.get() > gap_len.get() && gap_len.get() < remaining.get() {
            // This gap is too small to make progress on the next fragment
            // without fragmenting it further; the phase can't do better
            // with what's currently free, so stop here.
            return false;
        }

        let chunk = Clusters64::new(gap_len.get().min(remaining.get()));
        let result = session.move_item(driver, item_id, gap_begin, offset, chunk, MoveDirection::ToGap, observer);

        match result {
            Ok(true) => {
                offset += chunk;
                remaining = remaining.checked_sub(chunk).unwrap_or(Clusters64::ZERO);
            }
            Ok(false) | Err(ItemError::PartialMove) => return false,
            Err(_) => return false,
        }
    }

    true
}

/// Length of the physical fragment that contains absolute cluster `offset`
/// within the item, used to decide whether a candidate gap is worth using.
fn first_fragment_length_at(fragments: &[crate::model::Fragment], offset: Clusters64) -> Clusters64 {
    let mut physical_seen = Clusters64::ZERO;
    for (index, frag) in fragments.iter().enumerate() {
        if frag.is_virtual() {
            continue;
        }
        let len = crate::model::fragment::vcn_length(fragments, index);
        if offset.get() < physical_seen.get() + len.get() {
            return len;
        }
        physical_seen += len;
    }
    Clusters64::ZERO
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::VolumeBitmap;
    use crate::model::fragment::Fragment;
    use crate::model::Item;
    use crate::observer::NullObserver;
    use crate::session::Options;
    use crate::units::{Bytes64, Inode64};
    use crate::volume::mock::MockVolume;

    #[test]
    fn fragmented_item_is_relocated_into_a_single_sufficient_gap() {
        let mock = MockVolume::new(100, 4096);
        mock.register_item(
            Inode64::new(1),
            vec![Fragment::new(Clusters64::new(3), Clusters64::new(0)), Fragment::new(Clusters64::new(6), Clusters64::new(50))],
        );

        let bitmap = VolumeBitmap::load(&mock, Clusters64::new(100)).unwrap();
        let volume_data = mock.get_volume_data().unwrap();
        let mut session = Session::new(Options::default(), volume_data, bitmap);
        let id = session.tree.insert(Item::new(
            Inode64::new(1),
            0,
            None,
            "f".into(),
            "F".into(),
            Bytes64::new(6 * 4096),
            false,
            vec![Fragment::new(Clusters64::new(3), Clusters64::new(0)), Fragment::new(Clusters64::new(6), Clusters64::new(50))],
        ));
        session.recompute_zones();

        let mut observer = NullObserver;
        run(&mut session, &mock, &mut observer);

        let item = session.tree.get(id).unwrap();
        assert!(!item.is_fragmented());
    }
}
