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

//! Phase 3a: a second, narrower defragmentation pass that also pulls items
//! out of the MFT reserved zone and out of the wrong side of a zone
//! boundary. Unlike `defragment`, a missing gap here is per-item rather
//! than phase-fatal: the volume just gets rescanned for a gap on the next
//! item instead of aborting outright.

use crate::gap;
use crate::model::ItemId;
use crate::observer::{MoveDirection, Observer, Phase};
use crate::session::Session;
use crate::units::{Clusters64, FileTime64};
use crate::volume::VolumeDriver;

/// An item written within this many seconds of "now" is left alone: it's
/// still being actively written to, and moving it now would likely just
/// provoke another write-triggered fragmentation immediately after.
const RECENTLY_WRITTEN_SECONDS: u64 = 15 * 60;

pub fn run<D: VolumeDriver>(session: &mut Session, driver: &D, observer: &mut dyn Observer, now: FileTime64) {
    let ids: Vec<ItemId> = session.tree.iter_ascending().collect();

    for id in ids {
        if !super::keep_running(session, observer, Phase::Fixup, 0) {
            return;
        }

        let Some(item) = session.tree.get(id) else { continue };
        if !item.is_movable() {
            continue;
        }
        if recently_written(item.last_write, now) {
            continue;
        }

        let size = item.clusters_count();
        let Some(first_lcn) = item.first_lcn() else { continue };
        let in_mft_zone = is_in_mft_excludes(&session.mft_excludes, first_lcn) && !item.flags.is_dir;
        let below_zone1 = item.preferred_zone() == 1 && first_lcn.get() < session.zones[1].get();
        let below_zone2 = item.preferred_zone() == 2 && first_lcn.get() < session.zones[2].get();

        let needs_fixup = item.is_fragmented() || in_mft_zone || below_zone1 || below_zone2;
        if !needs_fixup {
            continue;
        }

        let zone = item.preferred_zone();
        let (zone_start, zone_end) = (session.zones[zone], session.zones[zone + 1]);
        let total_clusters = session.total_clusters;
        let mft_excludes = session.mft_excludes.clone();

        let gap_here = gap::find_gap(&session.bitmap, &mft_excludes, zone_start, zone_end, size, true, false, false)
            .or_else(|| gap::find_gap(&session.bitmap, &mft_excludes, Clusters64::ZERO, total_clusters, size, true, false, false));

        // No qualifying gap for this item: leave it and move on to the next
        // one rather than abort the whole phase (§7's NoGap handling for
        // this phase is "rescan", which in a single pass means "skip").
        let Some((gap_begin, _)) = gap_here else { continue };

        let _ = session.move_item(driver, id, gap_begin, Clusters64::ZERO, size, MoveDirection::ToGap, observer);
    }
}

fn is_in_mft_excludes(mft_excludes: &[(Clusters64, Clusters64)], lcn: Clusters64) -> bool {
    mft_excludes.iter().any(|(start, end)| lcn.get() >= start.get() && lcn.get() < end.get())
}

fn recently_written(last_write: FileTime64, now: FileTime64) -> bool {
    last_write != FileTime64::ZERO && last_write.plus_seconds(RECENTLY_WRITTEN_SECONDS) >= now
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
    fn fragmented_movable_item_is_relocated_into_an_available_gap() {
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
        run(&mut session, &mock, &mut observer, FileTime64::ZERO.plus_seconds(1_000_000));

        assert!(!session.tree.get(id).unwrap().is_fragmented());
    }

    #[test]
    fn item_written_moments_ago_is_left_alone() {
        let mock = MockVolume::new(100, 4096);
        mock.register_item(
            Inode64::new(1),
            vec![Fragment::new(Clusters64::new(3), Clusters64::new(0)), Fragment::new(Clusters64::new(6), Clusters64::new(50))],
        );
        let bitmap = VolumeBitmap::load(&mock, Clusters64::new(100)).unwrap();
        let volume_data = mock.get_volume_data().unwrap();
        let mut session = Session::new(Options::default(), volume_data, bitmap);
        let now = FileTime64::ZERO.plus_seconds(1_000_000);
        let id = session.tree.insert({
            let mut item = Item::new(
                Inode64::new(1),
                0,
                None,
                "f".into(),
                "F".into(),
                Bytes64::new(6 * 4096),
                false,
                vec![Fragment::new(Clusters64::new(3), Clusters64::new(0)), Fragment::new(Clusters64::new(6), Clusters64::new(50))],
            );
            item.last_write = now.plus_seconds(0);
            item
        });
        session.recompute_zones();

        let mut observer = NullObserver;
        run(&mut session, &mock, &mut observer, now.plus_seconds(60));

        assert!(session.tree.get(id).unwrap().is_fragmented());
    }
}
