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

//! Best-effort relocation of `$MFT` itself towards the start of the volume.
//! The first `MFT_LOCKED_INODE_COUNT` clusters stay put (they hold the
//! records for the MFT's own metadata and can't be safely relocated while
//! the move is in flight); everything past that is vacated room for, then
//! moved in chunks that are a multiple of 8 clusters, matching the
//! alignment NTFS itself uses for MFT record clusters. Once done the item
//! is marked unmovable — a second pass should never try to move `$MFT`
//! again in the same session.

use crate::gap;
use crate::observer::{MoveDirection, Observer, Phase};
use crate::session::{Session, MFT_LOCKED_INODE_COUNT};
use crate::units::{Clusters64, Inode64};
use crate::volume::VolumeDriver;

const CHUNK_ALIGNMENT: u64 = 8;

pub fn run<D: VolumeDriver>(session: &mut Session, driver: &D, observer: &mut dyn Observer) {
    if !super::keep_running(session, observer, Phase::MoveMft, 0) {
        return;
    }

    let Some(mft_id) = session.tree.find_by_inode(Inode64::new(0), 0) else {
        return;
    };
    let Some(mft) = session.tree.get(mft_id) else { return };
    if !mft.is_movable() {
        return;
    }
    let total_size = mft.clusters_count();
    if total_size.get() <= MFT_LOCKED_INODE_COUNT {
        return;
    }

    let movable_size = total_size - Clusters64::new(MFT_LOCKED_INODE_COUNT);
    let chunk_size = Clusters64::new(CHUNK_ALIGNMENT.min(movable_size.get()));

    let mft_excludes = session.mft_excludes.clone();
    let zones = session.zones;
    if gap::vacate(session, driver, &mft_excludes, &zones, (Clusters64::ZERO, movable_size), true, observer).is_err() {
        mark_unmovable(session, mft_id);
        return;
    }

    let mut moved = Clusters64::ZERO;
    while moved.get() < movable_size.get() {
        if !super::keep_running(session, observer, Phase::MoveMft, 0) {
            break;
        }

        let remaining = movable_size - moved;
        let this_chunk = Clusters64::new(chunk_size.get().min(remaining.get()));
        let offset = Clusters64::new(MFT_LOCKED_INODE_COUNT) + moved;

        let result = session.move_item(driver, mft_id, moved, offset, this_chunk, MoveDirection::ToStrategy, observer);

        match result {
            Ok(true) | Ok(false) => moved += this_chunk,
            Err(_) => break,
        }
    }

    mark_unmovable(session, mft_id);
}

fn mark_unmovable(session: &mut Session, mft_id: crate::model::ItemId) {
    if let Some(item) = session.tree.get_mut(mft_id) {
        item.flags.is_unmovable = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::VolumeBitmap;
    use crate::model::fragment::Fragment;
    use crate::model::Item;
    use crate::observer::NullObserver;
    use crate::session::Options;
    use crate::units::Bytes64;
    use crate::volume::mock::MockVolume;

    #[test]
    fn mft_is_relocated_towards_the_start_and_then_latched_unmovable() {
        let mock = MockVolume::new(200, 4096);
        mock.register_item(Inode64::new(0), vec![Fragment::new(Clusters64::new(32), Clusters64::new(100))]);

        let bitmap = VolumeBitmap::load(&mock, Clusters64::new(200)).unwrap();
        let volume_data = mock.get_volume_data().unwrap();
        let mut session = Session::new(Options::default(), volume_data, bitmap);
        session.tree.insert(Item::new(
            Inode64::new(0),
            0,
            None,
            "$MFT".into(),
            "$MFT".into(),
            Bytes64::new(32 * 4096),
            false,
            vec![Fragment::new(Clusters64::new(32), Clusters64::new(100))],
        ));
        session.recompute_zones();

        let mut observer = NullObserver;
        run(&mut session, &mock, &mut observer);

        let mft_id = session.tree.find_by_inode(Inode64::new(0), 0).unwrap();
        let item = session.tree.get(mft_id).unwrap();
        assert!(item.flags.is_unmovable);
    }
}
