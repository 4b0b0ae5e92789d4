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

//! Typed quantities for the units the core juggles: bytes, sectors, clusters
//! and inode numbers. Keeping these as distinct types (rather than raw
//! `u64`s, as the source this was ported from does) catches
//! `sectors * bytes_per_cluster`-style dimension mistakes at compile time.

use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

macro_rules! counter_type {
    ($name:ident) => {
        #[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u64);

        impl $name {
            pub const ZERO: Self = Self(0);

            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> u64 {
                self.0
            }

            pub fn checked_sub(self, rhs: Self) -> Option<Self> {
                self.0.checked_sub(rhs.0).map(Self)
            }

            pub const fn saturating_sub(self, rhs: Self) -> Self {
                Self(self.0.saturating_sub(rhs.0))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Add for $name {
            type Output = Self;

            fn add(self, rhs: Self) -> Self {
                Self(self.0 + rhs.0)
            }
        }

        impl AddAssign for $name {
            fn add_assign(&mut self, rhs: Self) {
                self.0 += rhs.0;
            }
        }

        impl Sub for $name {
            type Output = Self;

            fn sub(self, rhs: Self) -> Self {
                Self(self.0 - rhs.0)
            }
        }

        impl SubAssign for $name {
            fn sub_assign(&mut self, rhs: Self) {
                self.0 -= rhs.0;
            }
        }
    };
}

counter_type!(Bytes64);
counter_type!(Sectors64);
counter_type!(Clusters64);
counter_type!(Inode64);

impl Mul<u64> for Clusters64 {
    type Output = Clusters64;

    fn mul(self, rhs: u64) -> Clusters64 {
        Clusters64(self.0 * rhs)
    }
}

impl Mul<u64> for Sectors64 {
    type Output = Sectors64;

    fn mul(self, rhs: u64) -> Sectors64 {
        Sectors64(self.0 * rhs)
    }
}

/// Bytes per sector, as read from the volume's boot record. Always positive.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BytesPerSector(u32);

impl BytesPerSector {
    pub fn new(value: u32) -> Option<Self> {
        if value == 0 {
            None
        } else {
            Some(Self(value))
        }
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

/// Sectors per cluster, as read from the volume's boot record. Always positive.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SectorsPerCluster(u32);

impl SectorsPerCluster {
    pub fn new(value: u32) -> Option<Self> {
        if value == 0 {
            None
        } else {
            Some(Self(value))
        }
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

/// Converts between the volume's typed quantities. Every conversion needs the
/// volume's sector/cluster geometry, so they live together rather than as
/// inherent methods on the unit types themselves.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Geometry {
    bytes_per_sector: BytesPerSector,
    sectors_per_cluster: SectorsPerCluster,
}

impl Geometry {
    pub const fn new(bytes_per_sector: BytesPerSector, sectors_per_cluster: SectorsPerCluster) -> Self {
        Self {
            bytes_per_sector,
            sectors_per_cluster,
        }
    }

    pub const fn bytes_per_sector(&self) -> BytesPerSector {
        self.bytes_per_sector
    }

    pub const fn sectors_per_cluster(&self) -> SectorsPerCluster {
        self.sectors_per_cluster
    }

    pub fn bytes_per_cluster(&self) -> u64 {
        self.bytes_per_sector.get() as u64 * self.sectors_per_cluster.get() as u64
    }

    pub fn sectors_to_bytes(&self, sectors: Sectors64) -> Bytes64 {
        Bytes64(sectors.get() * self.bytes_per_sector.get() as u64)
    }

    pub fn clusters_to_bytes(&self, clusters: Clusters64) -> Bytes64 {
        Bytes64(clusters.get() * self.bytes_per_cluster())
    }

    pub fn clusters_to_sectors(&self, clusters: Clusters64) -> Sectors64 {
        Sectors64(clusters.get() * self.sectors_per_cluster.get() as u64)
    }

    /// Rounds a byte count up to the nearest whole cluster.
    pub fn bytes_to_clusters_ceil(&self, bytes: Bytes64) -> Clusters64 {
        let bpc = self.bytes_per_cluster();
        Clusters64((bytes.get() + bpc - 1) / bpc)
    }
}

/// 100-nanosecond ticks since the epoch the volume's file system uses for its
/// timestamps (creation / last-access / mft-change). Comparisons and
/// arithmetic stay in tick-space; conversion to wall-clock time happens only
/// at the edges (CLI / observer formatting), so the core never depends on a
/// particular calendar library.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileTime64(pub u64);

impl FileTime64 {
    pub const ZERO: Self = Self(0);

    /// One tick is 100ns; a second is 10_000_000 ticks.
    const TICKS_PER_SECOND: u64 = 10_000_000;

    pub const fn new(ticks: u64) -> Self {
        Self(ticks)
    }

    pub fn plus_seconds(self, seconds: u64) -> Self {
        Self(self.0 + seconds * Self::TICKS_PER_SECOND)
    }

    pub fn plus_days(self, days: u64) -> Self {
        self.plus_seconds(days * 86_400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_converts_clusters_to_bytes() {
        let geometry = Geometry::new(
            BytesPerSector::new(512).unwrap(),
            SectorsPerCluster::new(8).unwrap(),
        );

        assert_eq!(geometry.bytes_per_cluster(), 4096);
        assert_eq!(geometry.clusters_to_bytes(Clusters64::new(3)), Bytes64::new(12288));
    }

    #[test]
    fn bytes_to_clusters_rounds_up() {
        let geometry = Geometry::new(
            BytesPerSector::new(512).unwrap(),
            SectorsPerCluster::new(8).unwrap(),
        );

        assert_eq!(geometry.bytes_to_clusters_ceil(Bytes64::new(4097)), Clusters64::new(2));
        assert_eq!(geometry.bytes_to_clusters_ceil(Bytes64::new(4096)), Clusters64::new(1));
    }

    #[test]
    fn zero_geometry_values_rejected() {
        assert!(BytesPerSector::new(0).is_none());
        assert!(SectorsPerCluster::new(0).is_none());
    }
}
