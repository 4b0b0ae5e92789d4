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

//! A file's fragment list: an owned, ordered `Vec<Fragment>` rather than the
//! intrusive singly-linked list the C original used. `next_vcn` remains the
//! sole ordering key within an item.

use crate::units::Clusters64;

/// Sentinel `lcn` value meaning the fragment's VCN range is sparse or
/// compressed-away space: it occupies no physical clusters at all.
pub const VIRTUAL: Clusters64 = Clusters64(u64::MAX);

/// One maximal contiguous range of virtual cluster numbers (VCNs) backed by
/// a contiguous logical cluster number (LCN) range, or `VIRTUAL` for a
/// sparse/compressed hole. `next_vcn` is this fragment's exclusive upper VCN
/// bound; the fragment's range is `[prev.next_vcn, next_vcn)`, where
/// `prev.next_vcn` is 0 for the first fragment in a list.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub next_vcn: Clusters64,
    pub lcn: Clusters64,
}

impl Fragment {
    pub const fn new(next_vcn: Clusters64, lcn: Clusters64) -> Self {
        Self { next_vcn, lcn }
    }

    pub const fn is_virtual(&self) -> bool {
        self.lcn.get() == VIRTUAL.get()
    }
}

/// Computes the VCN-ordered `[start, next_vcn)` range of each fragment given
/// the fragment immediately before it (or `None` for the first fragment).
pub fn vcn_start(fragments: &[Fragment], index: usize) -> Clusters64 {
    if index == 0 {
        Clusters64::ZERO
    } else {
        fragments[index - 1].next_vcn
    }
}

/// The number of VCNs this fragment spans (physical or virtual).
pub fn vcn_length(fragments: &[Fragment], index: usize) -> Clusters64 {
    fragments[index].next_vcn - vcn_start(fragments, index)
}

/// Validates invariant 1: fragments are VCN-ordered, non-overlapping and
/// non-empty. Used by tests and by the analyzer's sanity pass.
pub fn is_well_formed(fragments: &[Fragment]) -> bool {
    if fragments.is_empty() {
        return false;
    }

    let mut previous_vcn = Clusters64::ZERO;
    for fragment in fragments {
        if fragment.next_vcn <= previous_vcn {
            return false;
        }
        previous_vcn = fragment.next_vcn;
    }

    true
}

/// The sum of non-virtual fragment lengths: the item's physical cluster
/// count (invariant 3).
pub fn physical_cluster_count(fragments: &[Fragment]) -> Clusters64 {
    let mut total = Clusters64::ZERO;
    for (index, fragment) in fragments.iter().enumerate() {
        if !fragment.is_virtual() {
            total += vcn_length(fragments, index);
        }
    }
    total
}

/// The item's first physical LCN, used as the `ItemTree`'s primary sort key.
/// `None` if every fragment is virtual (a fully sparse file has no physical
/// placement at all).
pub fn first_physical_lcn(fragments: &[Fragment]) -> Option<Clusters64> {
    fragments.iter().find(|f| !f.is_virtual()).map(|f| f.lcn)
}

/// The item's highest physical LCN (the end of its last fragment, minus one
/// cluster), used by the forced-fill and optimize-up phases.
pub fn highest_physical_lcn(fragments: &[Fragment]) -> Option<Clusters64> {
    fragments
        .iter()
        .filter(|f| !f.is_virtual())
        .enumerate()
        .map(|(i, f)| f.lcn + vcn_length(fragments, i) - Clusters64::new(1))
        .max()
}

/// True if the item has more than one physical fragment.
pub fn is_fragmented(fragments: &[Fragment]) -> bool {
    fragments.iter().filter(|f| !f.is_virtual()).count() > 1
}
