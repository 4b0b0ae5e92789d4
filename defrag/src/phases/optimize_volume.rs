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

//! `AnalyzeFixupFastopt` mode's volume-wide pass: walk each of the three
//! zones independently, filling gaps from the zone's start upward with
//! whichever item that belongs in the zone and currently sits above the gap
//! fits best (best-fit first, falling back to the largest fitting item).

use crate::gap;
use crate::model::ItemId;
use crate::observer::{MoveDirection, Observer, Phase};
use crate::session::Session;
use crate::units::Clusters64;
use crate::volume::VolumeDriver;

pub fn run<D: VolumeDriver>(session: &mut Session, driver: &D, observer: &mut dyn Observer) {
    for zone in 0..3 {
        if !super::keep_running(session, observer, Phase::OptimizeVolume, zone) {
            return;
        }
        run_zone(session, driver, observer, zone);
    }
}

fn run_zone<D: VolumeDriver>(session: &mut Session, driver: &D, observer: &mut dyn Observer, zone: usize) {
    let mut cursor = session.zones[zone];

    loop {
        if !super::keep_running(session, observer, Phase::OptimizeVolume, zone) {
            return;
        }

        let zone_end = session.zones[zone + 1];
        let mft_excludes = session.mft_excludes.clone();
        let Some((gap_begin, gap_end)) =
            gap::find_gap(&session.bitmap, &mft_excludes, cursor, zone_end, Clusters64::new(1), false, false, false)
        else {
            return;
        };
        let gap_len = gap_end - gap_begin;

        let Some((item_id, item_size)) = best_fit_in_zone(session, zone, gap_begin, gap_len) else {
            // Nothing in this zone fits; nothing further up the zone will
            // help either until a different gap shows up, so stop.
            return;
        };

        let moved = session.move_item(driver, item_id, gap_begin, Clusters64::ZERO, item_size, MoveDirection::ToGap, observer);

        match moved {
            Ok(true) | Ok(false) => cursor = gap_begin,
            Err(_) => return,
        }
    }
}

/// Best-fit (smallest item that still fills the gap), falling back to the
/// largest fitting item, among movable items whose preferred zone is `zone`
/// and whose first physical LCN is above `gap_begin`.
fn best_fit_in_zone(session: &Session, zone: usize, gap_begin: Clusters64, gap_len: Clusters64) -> Option<(ItemId, Clusters64)> {
    let mut best_fit: Option<(ItemId, Clusters64)> = None;
    let mut largest: Option<(ItemId, Clusters64)> = None;

    for id in session.tree.iter_ascending() {
        let Some(item) = session.tree.get(id) else { continue };
        if !item.is_movable() || item.preferred_zone() != zone {
            continue;
        }
        let Some(first_lcn) = item.first_lcn() else { continue };
        if first_lcn.get() <= gap_begin.get() {
            continue;
        }
        let size = item.clusters_count();
        if size.get() == 0 || size.get() > gap_len.get() {
            continue;
        }
        if best_fit.map(|(_, s)| size.get() < s.get()).unwrap_or(true) {
            best_fit = Some((id, size));
        }
        if largest.map(|(_, s)| size.get() > s.get()).unwrap_or(true) {
            largest = Some((id, size));
        }
    }

    best_fit.or(largest)
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
    fn packs_a_zones_gap_with_the_best_fitting_item_in_that_zone() {
        let mock = MockVolume::new(20, 4096);
        mock.register_item(Inode64::new(1), vec![Fragment::new(Clusters64::new(2), Clusters64::new(10))]);

        let bitmap = VolumeBitmap::load(&mock, Clusters64::new(20)).unwrap();
        let volume_data = mock.get_volume_data().unwrap();
        let mut session = Session::new(Options::default(), volume_data, bitmap);
        session.zones = [Clusters64::ZERO, Clusters64::ZERO, Clusters64::new(20), Clusters64::new(20)];
        session.tree.insert(Item::new(
            Inode64::new(1),
            0,
            None,
            "f".into(),
            "F".into(),
            Bytes64::new(2 * 4096),
            false,
            vec![Fragment::new(Clusters64::new(2), Clusters64::new(10))],
        ));

        let mut observer = NullObserver;
        run(&mut session, &mock, &mut observer);

        assert!(session.bitmap.is_free(Clusters64::new(10)));
        assert!(!session.bitmap.is_free(Clusters64::ZERO));
    }
}
