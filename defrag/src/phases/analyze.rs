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

//! Phase 1: classify every item the scanner produced, then compute zones.
//! Whichever scanner ran has already built paths and fragment lists (the
//! directory-walk fallback gives every item a single virtual fragment
//! instead of a real one); this phase only sets the mask-driven flags and
//! folds the final counters.

use crate::mask::MaskSet;
use crate::observer::{Observer, Phase};
use crate::session::Session;
use crate::units::FileTime64;

/// Well-known paths a real defragmenter must never touch, regardless of
/// user masks (§4.6).
const UNMOVABLE_MASKS: &[&str] = &[
    r"*\safeboot.fs",
    r"?:\bootwiz.sys",
    r"*\BOOTWIZ\*",
    r"?:\BootAuth?.sys",
    r"*\Gobackio.bin",
    r"*$BadClus",
    r"*$BadClus:$Bad:$DATA",
    r"*\voldefrag.log",
];

const SPACE_HOG_BYTES: u64 = 50 * 1024 * 1024;
const SPACE_HOG_STALE_DAYS: u64 = 30;

pub fn run(session: &mut Session, observer: &mut dyn Observer) {
    if !super::keep_running(session, observer, Phase::Analyze, 0) {
        return;
    }

    let unmovable_masks = MaskSet::from_masks(UNMOVABLE_MASKS.iter().map(|s| s.to_string()));
    let options = session.options.clone();
    let now = crate::now_filetime();

    let ids: Vec<_> = session.tree.iter_ascending().collect();
    let mut counters = session.counters;

    for id in ids {
        if !session.is_running() {
            break;
        }

        let Some(item) = session.tree.get_mut(id) else { continue };

        let included = options.include_mask.matches_any(&item.long_path) || options.include_mask.matches_any(&item.short_path);
        if !included {
            item.flags.is_excluded = true;
        }
        if options.excludes.matches_any(&item.long_path) || options.excludes.matches_any(&item.short_path) {
            item.flags.is_excluded = true;
        }

        let default_hog = options.use_default_space_hogs
            && (item.bytes.get() > SPACE_HOG_BYTES
                || (options.use_last_access_time && stale_by_days(item.last_access, now, SPACE_HOG_STALE_DAYS)));
        let masked_hog = options.space_hogs.matches_any(&item.long_path) || options.space_hogs.matches_any(&item.short_path);
        if default_hog || masked_hog {
            item.flags.is_hog = true;
        }

        if unmovable_masks.matches_any(&item.long_path) || unmovable_masks.matches_any(&item.short_path) {
            item.flags.is_unmovable = true;
        }

        counters.all_files += 1;
        counters.all_bytes += item.bytes.get();
        let clusters = item.clusters_count();
        counters.all_clusters += clusters.get();
        if item.is_fragmented() {
            counters.fragmented_items += 1;
            counters.fragmented_bytes += item.bytes.get();
            counters.fragmented_clusters += clusters.get();
        }
    }

    counters.free_clusters = session.bitmap.free_cluster_count().get();
    session.counters = counters;
    session.recompute_zones();
}

/// True if `timestamp + days` has already passed relative to `now`.
fn stale_by_days(timestamp: FileTime64, now: FileTime64, days: u64) -> bool {
    timestamp != FileTime64::ZERO && timestamp.plus_days(days) < now
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::VolumeBitmap;
    use crate::model::fragment::Fragment;
    use crate::observer::NullObserver;
    use crate::session::Options;
    use crate::units::{Bytes64, BytesPerSector, Clusters64, Inode64, Sectors64, SectorsPerCluster};
    use crate::volume::VolumeData;

    fn volume_data() -> VolumeData {
        VolumeData {
            total_sectors: Sectors64::new(1000),
            bytes_per_sector: BytesPerSector::new(512).unwrap(),
            sectors_per_cluster: SectorsPerCluster::new(1).unwrap(),
            mft_start_lcn: Clusters64::ZERO,
            mft_zone_start: Clusters64::ZERO,
            mft_zone_end: Clusters64::ZERO,
            mft2_start_lcn: Clusters64::ZERO,
            mft_valid_data_length: Clusters64::ZERO,
            bytes_per_mft_record: 1024,
        }
    }

    #[test]
    fn excluded_mask_and_unmovable_well_known_path_are_flagged() {
        let mut options = Options::default();
        options.excludes.push("*.tmp".to_string());

        let mut session = Session::new(options, volume_data(), VolumeBitmap::from_bits(vec![false; 1000]));
        session.tree.insert(crate::model::Item::new(
            Inode64::new(1),
            0,
            None,
            "a.tmp".into(),
            "A.TMP".into(),
            Bytes64::new(10),
            false,
            vec![Fragment::new(Clusters64::new(1), Clusters64::new(0))],
        ));
        session.tree.insert(crate::model::Item::new(
            Inode64::new(2),
            0,
            None,
            r"C:\bootwiz.sys".into(),
            r"C:\BOOTWIZ.SYS".into(),
            Bytes64::new(10),
            false,
            vec![Fragment::new(Clusters64::new(1), Clusters64::new(1))],
        ));

        let mut observer = NullObserver;
        run(&mut session, &mut observer);

        let ids: Vec<_> = session.tree.iter_ascending().collect();
        assert!(session.tree.get(ids[0]).unwrap().flags.is_excluded);
        assert!(session.tree.get(ids[1]).unwrap().flags.is_unmovable);
        assert_eq!(session.counters.all_files, 2);
    }

    #[test]
    fn large_file_is_flagged_a_space_hog_by_default() {
        let options = Options::default();
        let mut session = Session::new(options, volume_data(), VolumeBitmap::from_bits(vec![false; 1000]));
        let id = session.tree.insert(crate::model::Item::new(
            Inode64::new(1),
            0,
            None,
            "big.bin".into(),
            "BIG.BIN".into(),
            Bytes64::new(SPACE_HOG_BYTES + 1),
            false,
            vec![Fragment::new(Clusters64::new(1), Clusters64::new(0))],
        ));

        let mut observer = NullObserver;
        run(&mut session, &mut observer);
        assert!(session.tree.get(id).unwrap().flags.is_hog);
    }
}
