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

//! `Session` replaces the source's global singletons (logger, GUI, library
//! state) with one value that owns the volume handle and is threaded
//! through every phase. Single-threaded cooperative scheduling: phases
//! check `running` at every loop iteration that can exit and nowhere else
//! takes a lock.

use std::cell::Cell;

use crate::bitmap::VolumeBitmap;
use crate::mask::MaskSet;
use crate::model::ItemTree;
use crate::units::Clusters64;
use crate::volume::VolumeData;

/// The directory-move quota beyond which directories latch unmovable for
/// the rest of the session (§11, ported from `jkdefrag_evo`'s
/// `cannot_move_dirs` counter).
pub const DIRECTORY_MOVE_QUOTA: u32 = 20;

/// The first `mft_locked_clusters` inodes of the MFT can never be moved.
pub const MFT_LOCKED_INODE_COUNT: u64 = 16;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RunningState {
    Running,
    Stopping,
}

/// Caller-selected phase sequence, per §6's `-a` flag.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OptimizeMode {
    AnalyzeFixup,
    AnalyzeFixupFastopt,
    AnalyzeGroup,
    AnalyzeMoveToEnd,
    AnalyzeSortByName,
    AnalyzeSortBySize,
    AnalyzeSortByAccess,
    AnalyzeSortByChanged,
    AnalyzeSortByCreated,
}

impl OptimizeMode {
    /// `optimize_sort`'s field selector, for the modes that ask for it.
    pub fn sort_field(self) -> Option<SortField> {
        match self {
            OptimizeMode::AnalyzeSortByName => Some(SortField::Filename),
            OptimizeMode::AnalyzeSortBySize => Some(SortField::Size),
            OptimizeMode::AnalyzeSortByAccess => Some(SortField::LastAccess),
            OptimizeMode::AnalyzeSortByChanged => Some(SortField::MftChange),
            OptimizeMode::AnalyzeSortByCreated => Some(SortField::Creation),
            _ => None,
        }
    }
}

/// `compare_items`' sort key, §4.6 / §9. Field 2 (last-access) sorts
/// descending; the others sort ascending. This asymmetry is intentional
/// (§9's design notes) and must not be "corrected".
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SortField {
    Filename = 0,
    Size = 1,
    LastAccess = 2,
    MftChange = 3,
    Creation = 4,
}

/// Running totals maintained across the session, per §3's `DefragState`
/// counters list. Updated by the analyzer and kept informational
/// thereafter — nothing re-derives these from the tree on every read, since
/// `sum over tree == counters` is a checked invariant (§8 item 4), not a
/// recomputation strategy.
#[derive(Debug, Default, Clone, Copy)]
pub struct Counters {
    pub all_files: u64,
    pub all_bytes: u64,
    pub all_clusters: u64,
    pub fragmented_items: u64,
    pub fragmented_bytes: u64,
    pub fragmented_clusters: u64,
    pub free_clusters: u64,
}

/// User-selectable knobs from the CLI (§6), minus anything that would need
/// persisted state: this crate keeps none across runs.
#[derive(Debug, Clone)]
pub struct Options {
    pub mode: OptimizeMode,
    pub include_mask: MaskSet,
    pub excludes: MaskSet,
    pub space_hogs: MaskSet,
    pub use_default_space_hogs: bool,
    pub use_last_access_time: bool,
    pub free_space_pct: u64,
    pub slowdown_pct: u8,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            mode: OptimizeMode::AnalyzeFixup,
            include_mask: MaskSet::from_masks(["*".to_string()]),
            excludes: MaskSet::new(),
            space_hogs: MaskSet::new(),
            use_default_space_hogs: true,
            use_last_access_time: false,
            free_space_pct: 0,
            slowdown_pct: 0,
        }
    }
}

/// The session-scoped bag of mutable state every phase reads and writes,
/// replacing the source's `DefragState` global. Owns the `ItemTree`
/// exclusively for the life of the session.
pub struct Session {
    pub options: Options,
    pub tree: ItemTree,
    pub bitmap: VolumeBitmap,
    pub volume_data: VolumeData,
    pub total_clusters: Clusters64,
    pub mft_excludes: Vec<(Clusters64, Clusters64)>,
    pub zones: [Clusters64; 4],
    pub counters: Counters,
    running: Cell<RunningState>,
    cannot_move_dirs: Cell<u32>,
}

impl Session {
    pub fn new(options: Options, volume_data: VolumeData, bitmap: VolumeBitmap) -> Self {
        let total_clusters = Clusters64::new(bitmap.len());
        Self {
            options,
            tree: ItemTree::new(),
            bitmap,
            volume_data,
            total_clusters,
            mft_excludes: Vec::new(),
            zones: [Clusters64::ZERO, Clusters64::ZERO, Clusters64::ZERO, total_clusters],
            counters: Counters::default(),
            running: Cell::new(RunningState::Running),
            cannot_move_dirs: Cell::new(0),
        }
    }

    pub fn running_state(&self) -> RunningState {
        self.running.get()
    }

    pub fn is_running(&self) -> bool {
        self.running.get() == RunningState::Running
    }

    pub fn stop(&self) {
        self.running.set(RunningState::Stopping);
    }

    /// Records a failed directory move; once the session-wide quota is
    /// exceeded, `directories_latched` starts returning true for the rest
    /// of the session (§11).
    pub fn record_directory_move_failure(&self) {
        self.cannot_move_dirs.set(self.cannot_move_dirs.get() + 1);
    }

    pub fn directories_latched(&self) -> bool {
        self.cannot_move_dirs.get() > DIRECTORY_MOVE_QUOTA
    }

    /// Delegates to `mover::move_item` using this session's real cluster
    /// geometry, and records a failed directory relocation against the
    /// quota latch (§11) so `directories_latched` reflects it.
    #[allow(clippy::too_many_arguments)]
    pub fn move_item<D: crate::volume::VolumeDriver>(
        &mut self,
        driver: &D,
        item_id: crate::model::ItemId,
        target_lcn: Clusters64,
        offset: Clusters64,
        count: Clusters64,
        direction: crate::observer::MoveDirection,
        observer: &mut dyn crate::observer::Observer,
    ) -> Result<bool, crate::error::ItemError> {
        let is_dir = self.tree.get(item_id).map(|item| item.flags.is_dir).unwrap_or(false);
        let bytes_per_cluster = self.volume_data.bytes_per_cluster();

        let result = crate::mover::move_item(
            &mut self.tree,
            &mut self.bitmap,
            driver,
            item_id,
            target_lcn,
            offset,
            count,
            bytes_per_cluster,
            direction,
            observer,
        );

        if is_dir && !matches!(result, Ok(true)) {
            self.record_directory_move_failure();
        }

        result
    }

    pub fn recompute_zones(&mut self) {
        self.zones = crate::zones::compute_zones(
            &self.tree,
            self.total_clusters,
            self.options.free_space_pct,
            &self.mft_excludes,
            self.directories_latched(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{BytesPerSector, Sectors64, SectorsPerCluster};

    fn volume_data(total_clusters: u64) -> VolumeData {
        VolumeData {
            total_sectors: Sectors64::new(total_clusters),
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
    fn directory_move_quota_latches_after_twenty_failures() {
        let session = Session::new(Options::default(), volume_data(100), VolumeBitmap::from_bits(vec![false; 100]));
        for _ in 0..DIRECTORY_MOVE_QUOTA {
            session.record_directory_move_failure();
        }
        assert!(!session.directories_latched());
        session.record_directory_move_failure();
        assert!(session.directories_latched());
    }

    #[test]
    fn stopping_flips_running_state() {
        let session = Session::new(Options::default(), volume_data(10), VolumeBitmap::from_bits(vec![false; 10]));
        assert!(session.is_running());
        session.stop();
        assert!(!session.is_running());
        assert_eq!(session.running_state(), RunningState::Stopping);
    }

    #[test]
    fn sort_field_asymmetry_is_preserved() {
        assert_eq!(OptimizeMode::AnalyzeSortByAccess.sort_field(), Some(SortField::LastAccess));
        assert_eq!(OptimizeMode::AnalyzeFixup.sort_field(), None);
    }
}
