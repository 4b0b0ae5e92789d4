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

//! The zone calculator: a fixed-point iteration over the tree that decides
//! three LCN regions (directories, regular files, space-hogs). Moving an
//! item can change which zone it reports as "in", which can change the
//! boundaries, so this runs to convergence rather than once.

use crate::model::{Item, ItemTree};
use crate::units::Clusters64;

/// `Zones[0] = 0` always; `Zones[3]` is always `total_clusters` (see
/// DESIGN.md for why the fourth boundary is never independently computed).
pub const MAX_ITERATIONS: u32 = 10;

struct MftExclude {
    start: Clusters64,
    end: Clusters64,
}

/// Recomputes `Zones[0..4]` from the tree's current item placement.
///
/// `cannot_move_dirs_latched`: once the session's directory-move quota is
/// exhausted (§11's `cannot_move_dirs` latch), directories are treated as
/// unmovable for zone-sizing purposes too, not just skipped by the mover.
pub fn compute_zones(
    tree: &ItemTree,
    total_clusters: Clusters64,
    free_space_pct: u64,
    mft_excludes: &[(Clusters64, Clusters64)],
    cannot_move_dirs_latched: bool,
) -> [Clusters64; 4] {
    let excludes: Vec<MftExclude> = mft_excludes
        .iter()
        .map(|(start, end)| MftExclude { start: *start, end: *end })
        .collect();

    let reserve = Clusters64::new(total_clusters.get() * free_space_pct.min(100) / 100);

    let sum_movable = partition_fixed_totals(tree, cannot_move_dirs_latched);

    // Starting point for the fixed-point search: no unmovable fragments
    // attributed to any zone yet. Each round can only grow the bounds.
    let mut zone_end = [Clusters64::ZERO; 3];

    for _ in 0..MAX_ITERATIONS {
        let sum_unmovable = sum_unmovable_by_previous_bounds(tree, &excludes, &zone_end, cannot_move_dirs_latched);

        let mut next = [Clusters64::ZERO; 3];
        next[0] = sum_movable[0] + sum_unmovable[0] + reserve;
        next[1] = next[0] + sum_movable[1] + sum_unmovable[1] + reserve;
        next[2] = next[1] + sum_movable[2] + sum_unmovable[2];

        if next == zone_end {
            break;
        }
        zone_end = next;
    }

    [
        Clusters64::ZERO,
        zone_end[0].min(total_clusters),
        zone_end[1].min(total_clusters),
        total_clusters,
    ]
}

fn item_is_unmovable_for_zoning(item: &Item, cannot_move_dirs_latched: bool) -> bool {
    item.flags.is_unmovable || item.flags.is_excluded || (item.flags.is_dir && cannot_move_dirs_latched)
}

/// Clusters of movable items, bucketed by preferred zone. These totals don't
/// depend on the previous iteration's zone bounds.
fn partition_fixed_totals(tree: &ItemTree, cannot_move_dirs_latched: bool) -> [Clusters64; 3] {
    let mut sum_movable = [Clusters64::ZERO; 3];

    for id in tree.iter_ascending() {
        let Some(item) = tree.get(id) else { continue };
        if item_is_unmovable_for_zoning(item, cannot_move_dirs_latched) {
            continue;
        }
        let zone = item.preferred_zone();
        sum_movable[zone] += item.clusters_count();
    }

    sum_movable
}

/// Clusters of unmovable items (plus MFT excludes) whose LCN falls in the
/// *previous* iteration's `[bound[z-1], bound[z])`, per the zone formula.
fn sum_unmovable_by_previous_bounds(
    tree: &ItemTree,
    excludes: &[MftExclude],
    previous_bounds: &[Clusters64; 3],
    cannot_move_dirs_latched: bool,
) -> [Clusters64; 3] {
    let mut totals = [Clusters64::ZERO; 3];
    let lower = |z: usize| if z == 0 { Clusters64::ZERO } else { previous_bounds[z - 1] };

    let bucket_of = |lcn: Clusters64| -> Option<usize> {
        (0..3).find(|&z| lcn.get() >= lower(z).get() && lcn.get() < previous_bounds[z].get())
    };

    for id in tree.iter_ascending() {
        let Some(item) = tree.get(id) else { continue };
        if !item_is_unmovable_for_zoning(item, cannot_move_dirs_latched) {
            continue;
        }
        let Some(lcn) = item.first_lcn() else { continue };
        if let Some(z) = bucket_of(lcn) {
            totals[z] += item.clusters_count();
        }
    }

    for exclude in excludes {
        if let Some(z) = bucket_of(exclude.start) {
            totals[z] += exclude.end - exclude.start;
        }
    }

    totals
}
