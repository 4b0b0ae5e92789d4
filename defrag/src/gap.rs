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

//! The gap engine: `find_gap` locates free cluster runs, `vacate` evacuates
//! an occupied range upward to grow one. This is the hottest path in the
//! core — `find_gap` runs millions of times on a large volume.

use crate::bitmap::VolumeBitmap;
use crate::error::ItemError;
use crate::model::fragment;
use crate::model::{ItemId, ItemTree};
use crate::mover::MoveStrategy;
use crate::observer::{MoveDirection, Observer};
use crate::session::Session;
use crate::units::Clusters64;
use crate::volume::VolumeDriver;

/// An `[start, end)` exclusive cluster range.
pub type LcnRange = (Clusters64, Clusters64);

fn is_excluded(mft_excludes: &[LcnRange], lcn: Clusters64) -> bool {
    mft_excludes.iter().any(|(s, e)| lcn.get() >= s.get() && lcn.get() < e.get())
}

/// Finds a run of free clusters in `[min_lcn, max_lcn)`, per §4.2:
///
/// - `min_size == 0`: the first (or, scanning from the end, last-in-LCN-order)
///   qualifying gap.
/// - `min_size > 0 && must_fit`: the first gap of length >= `min_size` in
///   scan order.
/// - `min_size > 0 && !must_fit`: the largest gap anywhere in the range;
///   `None` only if the range has no free cluster at all.
pub fn find_gap(
    bitmap: &VolumeBitmap,
    mft_excludes: &[LcnRange],
    min_lcn: Clusters64,
    max_lcn: Clusters64,
    min_size: Clusters64,
    must_fit: bool,
    scan_from_end: bool,
    ignore_mft_excludes: bool,
) -> Option<LcnRange> {
    if max_lcn.get() <= min_lcn.get() {
        return None;
    }

    let runs = free_runs(bitmap, mft_excludes, min_lcn, max_lcn, ignore_mft_excludes);
    if runs.is_empty() {
        return None;
    }

    let ordered: Box<dyn Iterator<Item = &LcnRange>> = if scan_from_end {
        Box::new(runs.iter().rev())
    } else {
        Box::new(runs.iter())
    };

    if min_size.get() == 0 {
        return ordered.into_iter().next().copied();
    }

    if must_fit {
        return ordered
            .into_iter()
            .find(|(begin, end)| end.get() - begin.get() >= min_size.get())
            .copied();
    }

    // must_fit == false: return the largest gap regardless of min_size,
    // first-found on a length tie.
    runs.iter().copied().max_by_key(|(begin, end)| end.get() - begin.get())
}

/// Collects every maximal free run in `[min_lcn, max_lcn)`, LCN-ascending.
/// MFT-exclude ranges are treated as occupied unless `ignore_mft_excludes`.
fn free_runs(
    bitmap: &VolumeBitmap,
    mft_excludes: &[LcnRange],
    min_lcn: Clusters64,
    max_lcn: Clusters64,
    ignore_mft_excludes: bool,
) -> Vec<LcnRange> {
    let mut runs = Vec::new();
    let mut run_start: Option<u64> = None;

    for lcn in min_lcn.get()..max_lcn.get() {
        let clusters_lcn = Clusters64::new(lcn);
        let occupied = !bitmap.is_free(clusters_lcn) || (!ignore_mft_excludes && is_excluded(mft_excludes, clusters_lcn));

        match (occupied, run_start) {
            (false, None) => run_start = Some(lcn),
            (true, Some(start)) => {
                runs.push((Clusters64::new(start), Clusters64::new(lcn)));
                run_start = None;
            }
            _ => {}
        }
    }

    if let Some(start) = run_start {
        runs.push((Clusters64::new(start), max_lcn));
    }

    runs
}

/// Picks a destination LCN past which relocated data shouldn't need to be
/// moved again by a later phase: the end of the zone containing `from`, or
/// the volume end if `from` falls past the last zone.
fn move_to_heuristic(zones: &[Clusters64; 4], total_clusters: Clusters64, from: Clusters64) -> Clusters64 {
    for boundary in &zones[1..] {
        if from.get() < boundary.get() {
            return *boundary;
        }
    }
    total_clusters
}

/// Finds which item (if any) owns the physical cluster at `lcn`, along with
/// the absolute-cluster offset into that item the run starts at and how many
/// contiguous clusters of the same item follow. A production implementation
/// would keep an LCN-indexed side table; this scans the tree in first-LCN
/// order, which is the data the tree already maintains.
fn item_owning_lcn(tree: &ItemTree, lcn: Clusters64) -> Option<(ItemId, Clusters64, Clusters64)> {
    for id in tree.iter_ascending() {
        let item = tree.get(id)?;
        let mut absolute = Clusters64::ZERO;
        for (index, frag) in item.fragments.iter().enumerate() {
            if frag.is_virtual() {
                continue;
            }
            let len = fragment::vcn_length(&item.fragments, index);
            if lcn.get() >= frag.lcn.get() && lcn.get() < frag.lcn.get() + len.get() {
                let into = Clusters64::new(lcn.get() - frag.lcn.get());
                let run_len = Clusters64::new(len.get() - into.get());
                return Some((id, absolute + into, run_len));
            }
            absolute += len;
        }
    }
    None
}

/// Grows the free space at `gap` by relocating whatever movable data
/// currently occupies it, per §4.2. Stops when the extent is clear, an
/// unmovable fragment blocks further progress inside it, or the heuristic
/// destination bound can no longer absorb anything (detected via the "worm"
/// check: never revisit the same source LCN without having made progress).
pub fn vacate<D: VolumeDriver>(
    session: &mut Session,
    driver: &D,
    mft_excludes: &[LcnRange],
    zones: &[Clusters64; 4],
    gap: LcnRange,
    ignore_mft_excludes: bool,
    observer: &mut dyn Observer,
) -> Result<(), ItemError> {
    let total_clusters = Clusters64::new(session.bitmap.len());
    let (gap_begin, gap_end) = gap;
    let move_to = move_to_heuristic(zones, total_clusters, gap_end);

    let mut last_moved_from: Option<Clusters64> = None;
    let mut cursor = gap_begin;

    while cursor.get() < gap_end.get() {
        if session.bitmap.is_free(cursor) && !(!ignore_mft_excludes && is_excluded(mft_excludes, cursor)) {
            cursor += Clusters64::new(1);
            continue;
        }

        if !ignore_mft_excludes && is_excluded(mft_excludes, cursor) {
            // MFT excludes are never traversed; can't clear past this point.
            break;
        }

        let Some((item_id, item_offset, run_len)) = item_owning_lcn(&session.tree, cursor) else {
            // Occupied but untracked by any item (shouldn't happen outside
            // tests); nothing we can do about it.
            break;
        };

        let item_unmovable = session.tree.get(item_id).map(|i| !i.is_movable()).unwrap_or(true);
        if item_unmovable {
            break;
        }

        if last_moved_from == Some(cursor) {
            // Worm detection: we're back at the same LCN with no progress.
            break;
        }

        let destination = find_gap(
            &session.bitmap,
            mft_excludes,
            gap_end,
            move_to.max(gap_end + Clusters64::new(1)),
            run_len,
            false,
            false,
            ignore_mft_excludes,
        )
        .or_else(|| find_gap(&session.bitmap, mft_excludes, move_to, total_clusters, run_len, false, false, ignore_mft_excludes));

        let Some((dest_begin, _)) = destination else {
            break;
        };

        if dest_begin.get() == cursor.get() {
            break;
        }

        last_moved_from = Some(cursor);

        let strategy_hint = if run_len.get() > 1 {
            MoveStrategy::Whole
        } else {
            MoveStrategy::InFragments
        };
        let _ = strategy_hint;

        let moved = session.move_item(driver, item_id, dest_begin, item_offset, run_len, MoveDirection::ToVacate, observer)?;

        if !moved {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitmap_from(bits: &[u8]) -> VolumeBitmap {
        VolumeBitmap::from_bits(bits.iter().map(|b| *b == 1).collect())
    }

    #[test]
    fn must_fit_false_returns_largest_gap() {
        let bitmap = bitmap_from(&[0, 0, 1, 0, 0, 0, 0, 1]);
        let gap = find_gap(
            &bitmap,
            &[],
            Clusters64::ZERO,
            Clusters64::new(8),
            Clusters64::new(1),
            false,
            false,
            true,
        );
        assert_eq!(gap, Some((Clusters64::new(3), Clusters64::new(7))));
    }

    #[test]
    fn must_fit_true_returns_first_gap_of_sufficient_size() {
        let bitmap = bitmap_from(&[0, 0, 1, 0, 0, 0, 0, 1]);
        let gap = find_gap(
            &bitmap,
            &[],
            Clusters64::ZERO,
            Clusters64::new(8),
            Clusters64::new(2),
            true,
            false,
            true,
        );
        // The first run [0,2) is length 2, satisfies min_size=2.
        assert_eq!(gap, Some((Clusters64::new(0), Clusters64::new(2))));
    }

    #[test]
    fn min_size_zero_returns_first_gap_in_scan_order() {
        let bitmap = bitmap_from(&[1, 0, 0, 1, 0, 0]);
        let forward = find_gap(
            &bitmap,
            &[],
            Clusters64::ZERO,
            Clusters64::new(6),
            Clusters64::ZERO,
            true,
            false,
            true,
        );
        assert_eq!(forward, Some((Clusters64::new(1), Clusters64::new(3))));

        let backward = find_gap(
            &bitmap,
            &[],
            Clusters64::ZERO,
            Clusters64::new(6),
            Clusters64::ZERO,
            true,
            true,
            true,
        );
        assert_eq!(backward, Some((Clusters64::new(4), Clusters64::new(6))));
    }

    #[test]
    fn mft_excludes_are_treated_as_occupied_unless_ignored() {
        let bitmap = bitmap_from(&[0, 0, 0, 0, 0]);
        let excludes = [(Clusters64::new(1), Clusters64::new(3))];

        let respecting = find_gap(
            &bitmap,
            &excludes,
            Clusters64::ZERO,
            Clusters64::new(5),
            Clusters64::new(3),
            true,
            false,
            false,
        );
        assert_eq!(respecting, None);

        let ignoring = find_gap(
            &bitmap,
            &excludes,
            Clusters64::ZERO,
            Clusters64::new(5),
            Clusters64::new(3),
            true,
            false,
            true,
        );
        assert_eq!(ignoring, Some((Clusters64::new(0), Clusters64::new(5))));
    }

    #[test]
    fn find_gap_of_total_size_fails_unless_volume_fully_free() {
        let bitmap = bitmap_from(&[0, 0, 1, 0]);
        let gap = find_gap(
            &bitmap,
            &[],
            Clusters64::ZERO,
            Clusters64::new(4),
            Clusters64::new(4),
            true,
            false,
            true,
        );
        assert_eq!(gap, None);

        let fully_free = bitmap_from(&[0, 0, 0, 0]);
        let gap = find_gap(
            &fully_free,
            &[],
            Clusters64::ZERO,
            Clusters64::new(4),
            Clusters64::new(4),
            true,
            false,
            true,
        );
        assert_eq!(gap, Some((Clusters64::ZERO, Clusters64::new(4))));
    }

    #[test]
    fn found_gaps_are_always_free_in_bounds_and_big_enough() {
        use rand::Rng;

        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let len = rng.gen_range(1..64);
            let bits: Vec<bool> = (0..len).map(|_| rng.gen_bool(0.4)).collect();
            let bitmap = VolumeBitmap::from_bits(bits.clone());
            let min_size = Clusters64::new(rng.gen_range(0..8));
            let must_fit = rng.gen_bool(0.5);
            let scan_from_end = rng.gen_bool(0.5);

            let gap = find_gap(&bitmap, &[], Clusters64::ZERO, Clusters64::new(len as u64), min_size, must_fit, scan_from_end, true);

            if let Some((start, end)) = gap {
                assert!(start.get() < end.get());
                assert!(end.get() <= len as u64);
                for lcn in start.get()..end.get() {
                    assert!(!bits[lcn as usize], "gap {:?} covers an occupied cluster {lcn}", (start, end));
                }
                if must_fit && min_size.get() > 0 {
                    assert!(end.get() - start.get() >= min_size.get());
                }
            } else {
                assert!(!bits.iter().any(|occupied| !occupied), "a free cluster exists but find_gap returned None");
            }
        }
    }
}
