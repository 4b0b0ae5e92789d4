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

//! The `AnalyzeSortBy*` modes: within each zone, place items in the order
//! given by the session's chosen sort field, vacating the front of the zone
//! as needed to make room. `SortField::LastAccess` sorts descending (most
//! recently used first); every other field sorts ascending — this asymmetry
//! is load-bearing, see `SortField`'s own doc comment.

use crate::gap;
use crate::model::{Item, ItemId};
use crate::observer::{MoveDirection, Observer, Phase};
use crate::session::{Session, SortField};
use crate::units::Clusters64;
use crate::volume::VolumeDriver;
use std::cmp::Ordering;

pub fn run<D: VolumeDriver>(session: &mut Session, driver: &D, observer: &mut dyn Observer, field: SortField) {
    for zone in 0..3 {
        if !super::keep_running(session, observer, Phase::OptimizeSort, zone) {
            return;
        }
        run_zone(session, driver, observer, zone, field);
    }
}

fn run_zone<D: VolumeDriver>(session: &mut Session, driver: &D, observer: &mut dyn Observer, zone: usize, field: SortField) {
    let mut ordered: Vec<ItemId> = session
        .tree
        .iter_ascending()
        .filter(|id| {
            session
                .tree
                .get(*id)
                .map(|item| item.is_movable() && item.preferred_zone() == zone)
                .unwrap_or(false)
        })
        .collect();

    ordered.sort_by(|a, b| {
        let item_a = session.tree.get(*a).unwrap();
        let item_b = session.tree.get(*b).unwrap();
        compare_items(item_a, item_b, field)
    });

    let mut cursor = session.zones[zone];

    for item_id in ordered {
        if !super::keep_running(session, observer, Phase::OptimizeSort, zone) {
            return;
        }

        let Some(item) = session.tree.get(item_id) else { continue };
        let size = item.clusters_count();
        if size.get() == 0 {
            continue;
        }
        if item.first_lcn() == Some(cursor) {
            // Already in place.
            cursor += size;
            continue;
        }

        let zone_end = session.zones[zone + 1];
        let mft_excludes = session.mft_excludes.clone();

        if gap::find_gap(&session.bitmap, &mft_excludes, cursor, cursor + size, size, true, false, false).is_none() {
            let zones = session.zones;
            if gap::vacate(session, driver, &mft_excludes, &zones, (cursor, (cursor + size).min(zone_end)), false, observer).is_err() {
                continue;
            }
        }

        let _ = session.move_item(driver, item_id, cursor, Clusters64::ZERO, size, MoveDirection::ToStrategy, observer);

        cursor += size;
    }
}

/// The tie-break chain from the sort order: the chosen `field` first, then
/// long path, bytes, last-access, mft-change, creation, and finally the
/// item's own current LCN, so the ordering is always total.
fn compare_items(a: &Item, b: &Item, field: SortField) -> Ordering {
    primary_key(a, b, field).then_with(|| a.long_path.cmp(&b.long_path)).then_with(|| a.bytes.get().cmp(&b.bytes.get())).then_with(|| b.last_access.0.cmp(&a.last_access.0)).then_with(|| a.mft_change.0.cmp(&b.mft_change.0)).then_with(|| a.created.0.cmp(&b.created.0)).then_with(|| a.first_lcn().map(|l| l.get()).cmp(&b.first_lcn().map(|l| l.get())))
}

fn primary_key(a: &Item, b: &Item, field: SortField) -> Ordering {
    match field {
        SortField::Filename => a.long_name.to_ascii_lowercase().cmp(&b.long_name.to_ascii_lowercase()),
        SortField::Size => a.bytes.get().cmp(&b.bytes.get()),
        SortField::LastAccess => b.last_access.0.cmp(&a.last_access.0),
        SortField::MftChange => a.mft_change.0.cmp(&b.mft_change.0),
        SortField::Creation => a.created.0.cmp(&b.created.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::VolumeBitmap;
    use crate::model::fragment::Fragment;
    use crate::observer::NullObserver;
    use crate::session::Options;
    use crate::units::{Bytes64, Inode64};
    use crate::volume::mock::MockVolume;

    #[test]
    fn places_items_by_name_in_ascending_order() {
        let mock = MockVolume::new(20, 4096);
        mock.register_item(Inode64::new(1), vec![Fragment::new(Clusters64::new(1), Clusters64::new(5))]);
        mock.register_item(Inode64::new(2), vec![Fragment::new(Clusters64::new(1), Clusters64::new(0))]);

        let bitmap = VolumeBitmap::load(&mock, Clusters64::new(20)).unwrap();
        let volume_data = mock.get_volume_data().unwrap();
        let mut session = Session::new(Options::default(), volume_data, bitmap);
        session.zones = [Clusters64::ZERO, Clusters64::ZERO, Clusters64::new(20), Clusters64::new(20)];

        session.tree.insert(Item::new(
            Inode64::new(1),
            0,
            None,
            "b.txt".into(),
            "B.TXT".into(),
            Bytes64::new(4096),
            false,
            vec![Fragment::new(Clusters64::new(1), Clusters64::new(5))],
        ));
        session.tree.insert(Item::new(
            Inode64::new(2),
            0,
            None,
            "a.txt".into(),
            "A.TXT".into(),
            Bytes64::new(4096),
            false,
            vec![Fragment::new(Clusters64::new(1), Clusters64::new(0))],
        ));

        let mut observer = NullObserver;
        run(&mut session, &mock, &mut observer, SortField::Filename);

        let ids: Vec<_> = session.tree.iter_ascending().collect();
        let first = session.tree.get(ids[0]).unwrap();
        assert_eq!(first.long_path, "a.txt");
    }

    #[test]
    fn filename_sort_folds_case() {
        let mock = MockVolume::new(20, 4096);
        mock.register_item(Inode64::new(1), vec![Fragment::new(Clusters64::new(1), Clusters64::new(5))]);
        mock.register_item(Inode64::new(2), vec![Fragment::new(Clusters64::new(1), Clusters64::new(0))]);

        let bitmap = VolumeBitmap::load(&mock, Clusters64::new(20)).unwrap();
        let volume_data = mock.get_volume_data().unwrap();
        let mut session = Session::new(Options::default(), volume_data, bitmap);
        session.zones = [Clusters64::ZERO, Clusters64::ZERO, Clusters64::new(20), Clusters64::new(20)];

        // An uppercase-leading name must still sort after a lowercase one
        // that's later in the alphabet once case is folded.
        session.tree.insert(Item::new(
            Inode64::new(1),
            0,
            None,
            "BIG.TXT".into(),
            "BIG.TXT".into(),
            Bytes64::new(4096),
            false,
            vec![Fragment::new(Clusters64::new(1), Clusters64::new(5))],
        ));
        session.tree.insert(Item::new(
            Inode64::new(2),
            0,
            None,
            "apple.txt".into(),
            "APPLE.TXT".into(),
            Bytes64::new(4096),
            false,
            vec![Fragment::new(Clusters64::new(1), Clusters64::new(0))],
        ));

        let mut observer = NullObserver;
        run(&mut session, &mock, &mut observer, SortField::Filename);

        let ids: Vec<_> = session.tree.iter_ascending().collect();
        let first = session.tree.get(ids[0]).unwrap();
        assert_eq!(first.long_path, "apple.txt");
    }
}
