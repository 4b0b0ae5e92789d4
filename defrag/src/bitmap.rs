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

//! An in-core copy of the volume's free-space bitmap. `find_gap` runs
//! millions of times on a large volume and dominates total wall time, so the
//! bitmap is read once at session start and then kept in sync locally by the
//! mover (occupy the target run, free the source run) rather than re-read
//! from the volume driver before every scan.

use crate::error::VolumeIoError;
use crate::units::Clusters64;
use crate::volume::VolumeDriver;

/// The granularity `VolumeBitmap::load` requests windows in when a driver
/// implementation doesn't hand back full coverage in one call. Matches the
/// original's 64-cluster (one `u64`) scan window.
pub const BITMAP_WINDOW_BITS: u64 = 64;

#[derive(Debug, Clone)]
pub struct VolumeBitmap {
    bits: Vec<bool>,
}

impl VolumeBitmap {
    /// Reads the full bitmap up front, paging through `MORE_DATA` windows
    /// until `total_clusters` bits have been assembled.
    pub fn load<D: VolumeDriver>(driver: &D, total_clusters: Clusters64) -> Result<Self, VolumeIoError> {
        let mut bits = Vec::with_capacity(total_clusters.get() as usize);
        let mut lcn = Clusters64::ZERO;

        while lcn.get() < total_clusters.get() {
            let window = driver.read_volume_bitmap(lcn)?;
            if window.bits.is_empty() {
                break;
            }

            let remaining = (total_clusters.get() - lcn.get()) as usize;
            bits.extend(window.bits.iter().take(remaining));
            lcn = Clusters64::new(lcn.get() + window.bits.len() as u64);

            if !window.more_data {
                break;
            }
        }

        bits.resize(total_clusters.get() as usize, false);
        Ok(Self { bits })
    }

    #[cfg(test)]
    pub fn from_bits(bits: Vec<bool>) -> Self {
        Self { bits }
    }

    pub fn len(&self) -> u64 {
        self.bits.len() as u64
    }

    pub fn is_free(&self, lcn: Clusters64) -> bool {
        self.bits.get(lcn.get() as usize).map(|occupied| !occupied).unwrap_or(false)
    }

    pub fn set_occupied(&mut self, lcn: Clusters64, count: Clusters64) {
        for i in 0..count.get() {
            if let Some(bit) = self.bits.get_mut((lcn.get() + i) as usize) {
                *bit = true;
            }
        }
    }

    pub fn set_free(&mut self, lcn: Clusters64, count: Clusters64) {
        for i in 0..count.get() {
            if let Some(bit) = self.bits.get_mut((lcn.get() + i) as usize) {
                *bit = false;
            }
        }
    }

    pub fn free_cluster_count(&self) -> Clusters64 {
        Clusters64::new(self.bits.iter().filter(|occupied| !**occupied).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupy_then_free_round_trips() {
        let mut bitmap = VolumeBitmap::from_bits(vec![false; 10]);
        bitmap.set_occupied(Clusters64::new(2), Clusters64::new(3));
        assert!(!bitmap.is_free(Clusters64::new(2)));
        assert!(!bitmap.is_free(Clusters64::new(4)));
        assert!(bitmap.is_free(Clusters64::new(5)));

        bitmap.set_free(Clusters64::new(2), Clusters64::new(3));
        assert!(bitmap.is_free(Clusters64::new(2)));
    }

    #[test]
    fn free_cluster_count_matches_unset_bits() {
        let bitmap = VolumeBitmap::from_bits(vec![true, false, false, true]);
        assert_eq!(bitmap.free_cluster_count(), Clusters64::new(2));
    }
}
