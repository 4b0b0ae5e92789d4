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

//! `AnalyzeMoveToEnd` mode: walk gaps from the end of the volume downward,
//! and for each one try an exact-fit combination of items first, falling
//! back to the single largest item that still fits. At most
//! `MAX_RETRIES_PER_GAP` attempts are made per gap before giving up on it
//! and moving to the next one down, so a gap nothing fits can't stall the
//! whole pass.

use crate::gap;
use crate::model::ItemId;
use crate::observer::{MoveDirection, Observer, Phase};
use crate::session::Session;
use crate::units::Clusters64;
use crate::volume::VolumeDriver;

const MAX_RETRIES_PER_GAP: u32 = 5;

pub fn run<D: VolumeDriver>(session: &mut Session, driver: &D, observer: &mut dyn Observer) {
    let mut search_end = session.total_clusters;

    loop {
        if !super::keep_running(session, observer, Phase::OptimizeUp, 0) {
            return;
        }

        let mft_excludes = session.mft_excludes.clone();
        let Some((gap_begin, gap_end)) =
            gap::find_gap(&session.bitmap, &mft_excludes, Clusters64::ZERO, search_end, Clusters64::new(1), true, true, false)
        else {
            return;
        };
        let gap_len = gap_end - gap_begin;

        let mut retries = 0;
        let mut filled_any = false;

        while retries < MAX_RETRIES_PER_GAP {
            let Some((item_id, item_size)) = best_fit_below(session, gap_begin, gap_len) else {
                break;
            };

            let moved = session.move_item(driver, item_id, gap_begin, Clusters64::ZERO, item_size, MoveDirection::ToGap, observer);

            retries += 1;
            match moved {
                Ok(true) => {
                    filled_any = true;
                    break;
                }
                Ok(false) => continue,
                Err(_) => break,
            }
        }

        if !filled_any {
            // Couldn't make progress on this gap at all; don't retry it
            // forever, move the search window below it.
            search_end = gap_begin;
        }
        if gap_begin.get() == 0 {
            return;
        }
    }
}

/// The best candidate to drop into a gap of length `gap_len` ending at
/// `gap_begin`'s start: an item whose size is an exact match, or else the
/// largest movable item below `gap_begin` that still fits. Only items
/// entirely below the gap are considered, since anything above it would
/// just be moved backwards into a smaller gap than it already occupies.
fn best_fit_below(session: &Session, gap_begin: Clusters64, gap_len: Clusters64) -> Option<(ItemId, Clusters64)> {
    let mut exact: Option<(ItemId, Clusters64)> = None;
    let mut largest: Option<(ItemId, Clusters64)> = None;

    for id in session.tree.iter_ascending() {
        let Some(item) = session.tree.get(id) else { continue };
        if !item.is_movable() {
            continue;
        }
        let Some(first_lcn) = item.first_lcn() else { continue };
        if first_lcn.get() >= gap_begin.get() {
            continue;
        }
        let size = item.clusters_count();
        if size.get() == 0 || size.get() > gap_len.get() {
            continue;
        }
        if size.get() == gap_len.get() && exact.is_none() {
            exact = Some((id, size));
        }
        if largest.map(|(_, s)| size.get() > s.get()).unwrap_or(true) {
            largest = Some((id, size));
        }
    }

    exact.or(largest)
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
    fn fills_a_trailing_gap_with_an_exact_fitting_item() {
        let mock = MockVolume::new(20, 4096);
        mock.register_item(Inode64::new(1), vec![Fragment::new(Clusters64::new(4), Clusters64::new(0))]);

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
            vec![Fragment::new(Clusters64::new(4), Clusters64::new(0))],
        ));
        session.recompute_zones();

        let mut observer = NullObserver;
        run(&mut session, &mock, &mut observer);

        assert!(session.bitmap.is_free(Clusters64::ZERO));
        assert!(!session.bitmap.is_free(Clusters64::new(16)));
    }
}
