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

//! The mover is the only component allowed to update an item's fragment list
//! after it is first built (invariant-preserving boundary called out in the
//! design notes). It also translates between the item-relative *absolute
//! cluster* indices every other component thinks in, and the *VCN* the
//! volume driver's move primitive actually wants.

use crate::error::{ItemError, VolumeIoError};
use crate::gap;
use crate::model::fragment::{self, Fragment};
use crate::model::{ItemId, ItemTree};
use crate::observer::{MoveDirection, Observer};
use crate::units::Clusters64;
use crate::volume::{max_clusters_per_call, VolumeDriver};
use crate::bitmap::VolumeBitmap;

/// How a move is carried out at the volume level.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MoveStrategy {
    /// One volume call for the whole run; may come back fragmented.
    Whole,
    /// One volume call per source fragment, so the destination ends up
    /// contiguous even if the source wasn't.
    InFragments,
}

/// Translates an item-relative `[offset, offset + count)` window of absolute
/// (non-virtual) clusters into the starting VCN the volume driver needs, by
/// walking the item's fragment list. Returns `None` if the window runs past
/// the item's physical cluster count.
fn absolute_offset_to_vcn(fragments: &[Fragment], offset: Clusters64) -> Option<Clusters64> {
    let mut physical_seen = Clusters64::ZERO;
    for (index, frag) in fragments.iter().enumerate() {
        if frag.is_virtual() {
            continue;
        }
        let start_vcn = fragment::vcn_start(fragments, index);
        let len = fragment::vcn_length(fragments, index);
        if offset.get() < physical_seen.get() + len.get() {
            let into_fragment = offset.checked_sub(physical_seen)?;
            return Some(start_vcn + into_fragment);
        }
        physical_seen += len;
    }
    None
}

/// True if any physical cluster in the item-relative window
/// `[offset, offset+count)` is split across more than one fragment.
fn window_is_fragmented(fragments: &[Fragment], offset: Clusters64, count: Clusters64) -> bool {
    if count.get() == 0 {
        return false;
    }

    let mut physical_seen = Clusters64::ZERO;
    let mut fragments_touched = 0u32;
    for (index, frag) in fragments.iter().enumerate() {
        if frag.is_virtual() {
            continue;
        }
        let len = fragment::vcn_length(fragments, index);
        let frag_start = physical_seen;
        let frag_end = physical_seen + len;
        physical_seen = frag_end;

        let window_start = offset;
        let window_end = offset + count;
        if frag_start.get() < window_end.get() && frag_end.get() > window_start.get() {
            fragments_touched += 1;
        }
    }

    fragments_touched > 1
}

/// Runs `move_clusters` against the volume driver, splitting into
/// `max_clusters_per_call`-sized chunks as §4.3 requires for large moves.
fn move_whole<D: VolumeDriver>(
    driver: &D,
    handle: D::Handle,
    starting_vcn: Clusters64,
    target_lcn: Clusters64,
    count: Clusters64,
    bytes_per_cluster: u64,
) -> Result<(), VolumeIoError> {
    let cap = max_clusters_per_call(bytes_per_cluster);
    let mut done = Clusters64::ZERO;
    while done.get() < count.get() {
        let remaining = count - done;
        let chunk = if remaining.get() > cap.get() { cap } else { remaining };
        driver.move_clusters(handle, starting_vcn + done, target_lcn + done, chunk)?;
        done += chunk;
    }
    Ok(())
}

/// Relocates `count` absolute (non-virtual) clusters of `item`, starting at
/// its `offset`-th physical cluster, to `target_lcn`. `direction` is only
/// used to annotate the observer callback, per §6's `show_move` surface.
///
/// Returns `Ok(true)` if the item now has exactly one physical fragment in
/// the moved window, `Ok(false)` if the caller should treat this as a
/// non-fatal failure to move (gap exhausted, count==0 no-op counts as a
/// trivial success), and `Err` only for the unmovable/excluded/out-of-range
/// preconditions.
#[allow(clippy::too_many_arguments)]
pub fn move_item<D: VolumeDriver>(
    tree: &mut ItemTree,
    bitmap: &mut VolumeBitmap,
    driver: &D,
    item_id: ItemId,
    target_lcn: Clusters64,
    offset: Clusters64,
    count: Clusters64,
    bytes_per_cluster: u64,
    direction: MoveDirection,
    observer: &mut dyn Observer,
) -> Result<bool, ItemError> {
    if count.get() == 0 {
        return Ok(true);
    }

    let starting_vcn = {
        let item = tree.get(item_id).ok_or(ItemError::VolumeIo(VolumeIoError::NotFound))?;
        if !item.is_movable() {
            return Err(ItemError::VolumeIo(VolumeIoError::AccessDenied));
        }
        if count.get() > item.clusters_count().get() {
            return Err(ItemError::VolumeIo(VolumeIoError::Unsupported));
        }

        absolute_offset_to_vcn(&item.fragments, offset).ok_or(ItemError::VolumeIo(VolumeIoError::Unsupported))?
    };

    let handle = open_handle(tree, driver, item_id)?;

    observer.show_move(tree.get(item_id).unwrap(), count, starting_vcn, target_lcn, direction);

    let whole_result = move_whole(driver, handle, starting_vcn, target_lcn, count, bytes_per_cluster);
    refresh_after_move(tree, bitmap, driver, item_id, handle)?;

    if whole_result.is_err() {
        driver.close(handle);
        return Err(ItemError::VolumeIo(VolumeIoError::IoError));
    }

    if !window_is_fragmented_for(tree, item_id, offset, count) {
        driver.close(handle);
        return Ok(true);
    }

    // Step 4 of the post-move protocol: the volume silently partial-moved
    // us. Find another gap, move there fragment-by-fragment (so the
    // destination is contiguous), then move back to the originally
    // requested target.
    let run_len = count;
    let total_clusters = Clusters64::new(bitmap.len());
    let retry_gap = gap::find_gap(
        bitmap,
        &[],
        Clusters64::ZERO,
        total_clusters,
        run_len,
        true,
        false,
        true,
    );

    let Some((retry_begin, _retry_end)) = retry_gap else {
        driver.close(handle);
        mark_unmovable(tree, item_id);
        return Err(ItemError::NoGap);
    };

    let retry_ok = move_in_fragments(tree, bitmap, driver, item_id, handle, offset, count, retry_begin, observer)
        .and_then(|_| refresh_after_move(tree, bitmap, driver, item_id, handle).map_err(ItemError::from))
        .map(|_| !window_is_fragmented_for(tree, item_id, offset, count))
        .unwrap_or(false);

    if !retry_ok {
        driver.close(handle);
        mark_unmovable(tree, item_id);
        return Ok(false);
    }

    // Move back to the originally requested target, again per-fragment so it
    // lands contiguously.
    let back_ok = move_in_fragments(tree, bitmap, driver, item_id, handle, offset, count, target_lcn, observer)
        .and_then(|_| refresh_after_move(tree, bitmap, driver, item_id, handle).map_err(ItemError::from))
        .map(|_| !window_is_fragmented_for(tree, item_id, offset, count))
        .unwrap_or(false);

    driver.close(handle);

    if !back_ok {
        mark_unmovable(tree, item_id);
        return Ok(false);
    }

    Ok(true)
}

fn open_handle<D: VolumeDriver>(tree: &ItemTree, driver: &D, item_id: ItemId) -> Result<D::Handle, ItemError> {
    let item = tree.get(item_id).ok_or(ItemError::VolumeIo(VolumeIoError::NotFound))?;
    driver
        .open_item(item.inode, item.stream)
        .map_err(ItemError::from)
}

fn window_is_fragmented_for(tree: &ItemTree, item_id: ItemId, offset: Clusters64, count: Clusters64) -> bool {
    match tree.get(item_id) {
        Some(item) => window_is_fragmented(&item.fragments, offset, count),
        None => false,
    }
}

fn mark_unmovable(tree: &mut ItemTree, item_id: ItemId) {
    if let Some(item) = tree.get_mut(item_id) {
        item.flags.is_unmovable = true;
    }
}

/// Re-reads the item's extent map from the driver and re-indexes it in the
/// tree (detach under the old first-LCN key, reinsert under the new one),
/// keeping the bitmap in sync with what moved.
fn refresh_after_move<D: VolumeDriver>(
    tree: &mut ItemTree,
    bitmap: &mut VolumeBitmap,
    driver: &D,
    item_id: ItemId,
    handle: D::Handle,
) -> Result<(), ItemError> {
    let old_fragments = tree.get(item_id).map(|i| i.fragments.clone()).unwrap_or_default();
    for (index, frag) in old_fragments.iter().enumerate() {
        if frag.is_virtual() {
            continue;
        }
        let len = fragment::vcn_length(&old_fragments, index);
        bitmap.set_free(frag.lcn, len);
    }

    let new_fragments = driver.get_extents(handle).map_err(ItemError::from)?;
    for (index, frag) in new_fragments.iter().enumerate() {
        if frag.is_virtual() {
            continue;
        }
        let len = fragment::vcn_length(&new_fragments, index);
        bitmap.set_occupied(frag.lcn, len);
    }

    tree.detach(item_id);
    if let Some(item) = tree.get_mut(item_id) {
        item.fragments = new_fragments;
    }
    tree.reinsert(item_id);
    Ok(())
}

/// Strategy *InFragments*: one volume call per source fragment that
/// intersects `[offset, offset+count)`, placing them contiguously starting
/// at `target_lcn`.
#[allow(clippy::too_many_arguments)]
fn move_in_fragments<D: VolumeDriver>(
    tree: &ItemTree,
    _bitmap: &VolumeBitmap,
    driver: &D,
    item_id: ItemId,
    handle: D::Handle,
    offset: Clusters64,
    count: Clusters64,
    target_lcn: Clusters64,
    observer: &mut dyn Observer,
) -> Result<(), ItemError> {
    let item = tree.get(item_id).ok_or(ItemError::VolumeIo(VolumeIoError::NotFound))?;
    let fragments = item.fragments.clone();

    let mut physical_seen = Clusters64::ZERO;
    let mut placed = Clusters64::ZERO;
    let window_end = offset + count;

    for (index, frag) in fragments.iter().enumerate() {
        if frag.is_virtual() {
            continue;
        }
        let len = fragment::vcn_length(&fragments, index);
        let frag_start = physical_seen;
        let frag_end = physical_seen + len;
        physical_seen = frag_end;

        if frag_end.get() <= offset.get() || frag_start.get() >= window_end.get() {
            continue;
        }

        let clip_start = frag_start.max(offset);
        let clip_end = frag_end.min(window_end);
        let clip_len = clip_end - clip_start;
        let into_fragment = clip_start.checked_sub(frag_start).unwrap_or(Clusters64::ZERO);
        let source_vcn = fragment::vcn_start(&fragments, index) + into_fragment;
        let dest_lcn = target_lcn + placed;

        observer.show_move(item, clip_len, source_vcn, dest_lcn, MoveDirection::ToStrategy);
        driver
            .move_clusters(handle, source_vcn, dest_lcn, clip_len)
            .map_err(ItemError::from)?;
        placed += clip_len;
    }

    Ok(())
}
