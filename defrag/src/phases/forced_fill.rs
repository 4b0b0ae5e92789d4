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

//! `AnalyzeGroup` mode's forced-fill pass: walk gaps from the volume start
//! upward, and for each one pull in clusters from whichever item currently
//! sits highest on the disk, packing the front of the volume as tightly as
//! possible. Stops once the highest-placed item is already below the gap
//! being considered, since nothing left can move the gap-filling forward.

use crate::gap;
use crate::model::ItemId;
use crate::observer::{MoveDirection, Observer, Phase};
use crate::session::Session;
use crate::units::Clusters64;
use crate::volume::VolumeDriver;

pub fn run<D: VolumeDriver>(session: &mut Session, driver: &D, observer: &mut dyn Observer) {
    let mut cursor = Clusters64::ZERO;

    loop {
        if !super::keep_running(session, observer, Phase::ForcedFill, 0) {
            return;
        }

        let total_clusters = session.total_clusters;
        let mft_excludes = session.mft_excludes.clone();

        let Some((gap_begin, gap_end)) =
            gap::find_gap(&session.bitmap, &mft_excludes, cursor, total_clusters, Clusters64::new(1), false, false, false)
        else {
            return;
        };
        let gap_len = gap_end - gap_begin;

        let Some((item_id, highest_lcn)) = highest_movable_item(session) else {
            return;
        };
        if highest_lcn.get() < gap_begin.get() {
            // Nothing left above the gap to pull forward.
            return;
        }

        let size = session.tree.get(item_id).map(|i| i.clusters_count()).unwrap_or(Clusters64::ZERO);
        let chunk = Clusters64::new(gap_len.get().min(size.get()));
        if chunk.get() == 0 {
            return;
        }

        let offset = size.checked_sub(chunk).unwrap_or(Clusters64::ZERO);
        let moved = session.move_item(driver, item_id, gap_begin, offset, chunk, MoveDirection::ToGap, observer);

        match moved {
            Ok(true) | Ok(false) => cursor = gap_begin,
            Err(_) => return,
        }
    }
}

/// The movable item with the highest physical LCN anywhere on the volume.
fn highest_movable_item(session: &Session) -> Option<(ItemId, Clusters64)> {
    let mut best: Option<(ItemId, Clusters64)> = None;
    for id in session.tree.iter_ascending() {
        let Some(item) = session.tree.get(id) else { continue };
        if !item.is_movable() {
            continue;
        }
        let Some(highest) = item.highest_lcn() else { continue };
        if best.map(|(_, h)| highest.get() > h.get()).unwrap_or(true) {
            best = Some((id, highest));
        }
    }
    best
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
    fn fills_a_leading_gap_from_the_highest_item_on_disk() {
        let mock = MockVolume::new(20, 4096);
        mock.register_item(Inode64::new(1), vec![Fragment::new(Clusters64::new(4), Clusters64::new(16))]);

        let bitmap = VolumeBitmap::load(&mock, Clusters64::new(20)).unwrap();
        let volume_data = mock.get_volume_data().unwrap();
        let mut session = Session::new(Options::default(), volume_data, bitmap);
        session.tree.insert(Item::new(
            Inode64::new(1),
            0,
            None,
            "f".into(),
            "F".into(),
            Bytes64::new(4 * 4096),
            false,
            vec![Fragment::new(Clusters64::new(4), Clusters64::new(16))],
        ));
        session.recompute_zones();

        let mut observer = NullObserver;
        run(&mut session, &mock, &mut observer);

        assert!(session.bitmap.is_free(Clusters64::new(16)));
        assert!(!session.bitmap.is_free(Clusters64::ZERO));
    }
}
