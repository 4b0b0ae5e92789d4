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

//! The seam between the core and the operating system. A real implementation
//! backs this with platform calls (on Windows: `FSCTL_GET_VOLUME_BITMAP`,
//! `FSCTL_GET_RETRIEVAL_POINTERS`, `FSCTL_MOVE_FILE`, `DeviceIoControl` /
//! `FSCTL_GET_NTFS_VOLUME_DATA`); the core only ever talks to the
//! `VolumeDriver` trait below, never to the OS directly.

use crate::error::VolumeIoError;
use crate::model::Fragment;
use crate::units::{BytesPerSector, Clusters64, SectorsPerCluster, Sectors64};

/// A volume handle's description of a single file or directory stream,
/// opaque to everything except the driver that issued it.
pub trait ItemHandle: Copy + Eq + std::hash::Hash + std::fmt::Debug {}

/// One window of the volume's free-space bitmap: bit `n` set means LCN
/// `starting_lcn + n` is in use. `more_data` is the `MORE_DATA` signal of
/// §4.1 item 1 — the window didn't cover the full range the caller asked
/// for, and another call starting at `starting_lcn + bits.len()` is needed.
#[derive(Debug, Clone)]
pub struct BitmapWindow {
    pub starting_lcn: Clusters64,
    pub bits: Vec<bool>,
    pub more_data: bool,
}

/// The volume's geometry and MFT placement, as read from its boot record
/// and volume-data ioctl.
#[derive(Debug, Copy, Clone)]
pub struct VolumeData {
    pub total_sectors: Sectors64,
    pub bytes_per_sector: BytesPerSector,
    pub sectors_per_cluster: SectorsPerCluster,
    pub mft_start_lcn: Clusters64,
    pub mft_zone_start: Clusters64,
    pub mft_zone_end: Clusters64,
    pub mft2_start_lcn: Clusters64,
    pub mft_valid_data_length: Clusters64,
    pub bytes_per_mft_record: u32,
}

impl VolumeData {
    pub fn total_clusters(&self) -> Clusters64 {
        Clusters64::new(self.total_sectors.get() / self.sectors_per_cluster.get() as u64)
    }

    pub fn bytes_per_cluster(&self) -> u64 {
        self.bytes_per_sector.get() as u64 * self.sectors_per_cluster.get() as u64
    }
}

/// The operations the core needs from the underlying volume, per §4.1. This
/// is the only seam the core crosses to touch real storage; everything above
/// it (gap engine, mover, phases) is pure in-memory model manipulation plus
/// calls through this trait.
pub trait VolumeDriver {
    type Handle: ItemHandle;

    /// Yields one window of the cluster allocation bitmap starting at
    /// `starting_lcn`. Callers must keep calling with
    /// `window.starting_lcn + window.bits.len()` while `window.more_data` is
    /// set, to assemble full coverage.
    fn read_volume_bitmap(&self, starting_lcn: Clusters64) -> Result<BitmapWindow, VolumeIoError>;

    /// Re-reads the current on-disk extent map for an open item. Must
    /// internally page through `MORE_DATA` and return the fully assembled
    /// fragment list.
    fn get_extents(&self, handle: Self::Handle) -> Result<Vec<Fragment>, VolumeIoError>;

    /// Asks the volume to relocate `count` clusters of the file beginning at
    /// `starting_vcn` to `target_lcn`. May partially succeed (the file
    /// becomes fragmented) without returning an error — the caller always
    /// re-reads extents afterwards to find out what actually happened.
    fn move_clusters(
        &self,
        handle: Self::Handle,
        starting_vcn: Clusters64,
        target_lcn: Clusters64,
        count: Clusters64,
    ) -> Result<(), VolumeIoError>;

    fn get_volume_data(&self) -> Result<VolumeData, VolumeIoError>;

    fn open_item(&self, inode: crate::units::Inode64, stream: crate::model::StreamId) -> Result<Self::Handle, VolumeIoError>;

    fn close(&self, handle: Self::Handle);

    fn flush(&self, handle: Self::Handle) -> Result<(), VolumeIoError>;
}

/// The single-shot volume-call size cap from §4.3: a 1 GiB request window,
/// expressed in clusters given the volume's cluster size.
pub fn max_clusters_per_call(bytes_per_cluster: u64) -> Clusters64 {
    Clusters64::new(0x4000_0000 / bytes_per_cluster.max(1))
}

#[cfg(any(test, feature = "test-support"))]
pub mod mock {
    //! An in-memory `VolumeDriver` test double: a bitmap, a per-handle
    //! extent table, and injectable partial-move behavior for exercising the
    //! mover's fallback path (scenario S6).

    use super::*;
    use crate::units::Inode64;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct MockHandle(pub u64);
    impl ItemHandle for MockHandle {}

    /// What `move_clusters` should simulate for its next call(s).
    #[derive(Debug, Clone, Copy)]
    pub enum MoveBehavior {
        /// Moves exactly the requested clusters, contiguously.
        Succeed,
        /// Reports success but only relocates half the requested run,
        /// leaving the item fragmented — simulating the OS silently
        /// splitting a move (§4.3 post-move protocol step 4, scenario S6).
        PartialThenOk,
        /// Returns a volume I/O error outright.
        Fail(VolumeIoError),
    }

    pub struct MockVolume {
        pub bitmap: RefCell<Vec<bool>>,
        pub volume_data: VolumeData,
        pub extents: RefCell<HashMap<u64, Vec<Fragment>>>,
        pub next_handle: RefCell<u64>,
        pub handle_to_inode: RefCell<HashMap<u64, u64>>,
        pub move_behavior: RefCell<MoveBehavior>,
        pub move_calls: RefCell<Vec<(Clusters64, Clusters64, Clusters64)>>,
    }

    impl MockVolume {
        pub fn new(total_clusters: u64, bytes_per_cluster: u32) -> Self {
            let sectors_per_cluster = SectorsPerCluster::new(1).unwrap();
            let bytes_per_sector = BytesPerSector::new(bytes_per_cluster).unwrap();
            Self {
                bitmap: RefCell::new(vec![false; total_clusters as usize]),
                volume_data: VolumeData {
                    total_sectors: Sectors64::new(total_clusters),
                    bytes_per_sector,
                    sectors_per_cluster,
                    mft_start_lcn: Clusters64::ZERO,
                    mft_zone_start: Clusters64::ZERO,
                    mft_zone_end: Clusters64::ZERO,
                    mft2_start_lcn: Clusters64::ZERO,
                    mft_valid_data_length: Clusters64::ZERO,
                    bytes_per_mft_record: 1024,
                },
                extents: RefCell::new(HashMap::new()),
                next_handle: RefCell::new(1),
                handle_to_inode: RefCell::new(HashMap::new()),
                move_behavior: RefCell::new(MoveBehavior::Succeed),
                move_calls: RefCell::new(Vec::new()),
            }
        }

        /// Marks LCNs as occupied by a (non-movable) item that isn't tracked
        /// by the extent table, e.g. MFT excludes in a test bitmap.
        pub fn occupy(&self, lcn: Clusters64, count: Clusters64) {
            let mut bitmap = self.bitmap.borrow_mut();
            for i in 0..count.get() {
                bitmap[(lcn.get() + i) as usize] = true;
            }
        }

        pub fn free(&self, lcn: Clusters64, count: Clusters64) {
            let mut bitmap = self.bitmap.borrow_mut();
            for i in 0..count.get() {
                bitmap[(lcn.get() + i) as usize] = false;
            }
        }

        /// Registers an item's fragments under a fresh handle and marks its
        /// physical clusters occupied in the bitmap.
        pub fn register_item(&self, inode: Inode64, fragments: Vec<Fragment>) -> MockHandle {
            for (i, fragment) in fragments.iter().enumerate() {
                if fragment.is_virtual() {
                    continue;
                }
                let length = crate::model::fragment::vcn_length(&fragments, i);
                self.occupy(fragment.lcn, length);
            }

            let mut next = self.next_handle.borrow_mut();
            let handle = *next;
            *next += 1;
            self.handle_to_inode.borrow_mut().insert(handle, inode.get());
            self.extents.borrow_mut().insert(handle, fragments);
            MockHandle(handle)
        }

        pub fn extents_of(&self, handle: MockHandle) -> Vec<Fragment> {
            self.extents.borrow().get(&handle.0).cloned().unwrap_or_default()
        }
    }

    impl VolumeDriver for MockVolume {
        type Handle = MockHandle;

        fn read_volume_bitmap(&self, starting_lcn: Clusters64) -> Result<BitmapWindow, VolumeIoError> {
            let bitmap = self.bitmap.borrow();
            let start = starting_lcn.get() as usize;
            if start >= bitmap.len() {
                return Ok(BitmapWindow {
                    starting_lcn,
                    bits: Vec::new(),
                    more_data: false,
                });
            }
            Ok(BitmapWindow {
                starting_lcn,
                bits: bitmap[start..].to_vec(),
                more_data: false,
            })
        }

        fn get_extents(&self, handle: Self::Handle) -> Result<Vec<Fragment>, VolumeIoError> {
            self.extents
                .borrow()
                .get(&handle.0)
                .cloned()
                .ok_or(VolumeIoError::NotFound)
        }

        fn move_clusters(
            &self,
            handle: Self::Handle,
            starting_vcn: Clusters64,
            target_lcn: Clusters64,
            count: Clusters64,
        ) -> Result<(), VolumeIoError> {
            self.move_calls.borrow_mut().push((starting_vcn, target_lcn, count));

            let behavior = *self.move_behavior.borrow();
            let move_count = match behavior {
                MoveBehavior::Fail(e) => return Err(e),
                MoveBehavior::Succeed => count,
                MoveBehavior::PartialThenOk => {
                    *self.move_behavior.borrow_mut() = MoveBehavior::Succeed;
                    Clusters64::new((count.get() / 2).max(1))
                }
            };

            if !self.extents.borrow().contains_key(&handle.0) {
                return Err(VolumeIoError::NotFound);
            }

            // Free the clusters we're about to vacate and occupy the target run.
            self.free(target_lcn, move_count);

            let mut extents = self.extents.borrow_mut();
            let fragments = extents.get_mut(&handle.0).ok_or(VolumeIoError::NotFound)?;
            relocate_run(fragments, starting_vcn, target_lcn, move_count);
            drop(extents);
            self.occupy(target_lcn, move_count);
            Ok(())
        }

        fn get_volume_data(&self) -> Result<VolumeData, VolumeIoError> {
            Ok(self.volume_data)
        }

        fn open_item(&self, inode: Inode64, _stream: crate::model::StreamId) -> Result<Self::Handle, VolumeIoError> {
            let found = self
                .handle_to_inode
                .borrow()
                .iter()
                .find(|(_, v)| **v == inode.get())
                .map(|(k, _)| *k);
            found.map(MockHandle).ok_or(VolumeIoError::NotFound)
        }

        fn close(&self, _handle: Self::Handle) {}

        fn flush(&self, _handle: Self::Handle) -> Result<(), VolumeIoError> {
            Ok(())
        }
    }

    /// Rewrites `fragments` so that the absolute-cluster run starting at VCN
    /// `starting_vcn` of length `count` now sits at `target_lcn`, splitting
    /// fragments as needed. Used by the mock to keep its extent table
    /// consistent with simulated moves, mirroring what a real volume's
    /// `FSCTL_MOVE_FILE` would report on the next `get_extents` call.
    fn relocate_run(
        fragments: &mut Vec<Fragment>,
        starting_vcn: Clusters64,
        target_lcn: Clusters64,
        count: Clusters64,
    ) {
        // Expand to one (vcn_len, lcn) pair per single physical cluster, move
        // the requested absolute-cluster window, then recompress adjacent
        // runs back into fragments. Simple and correct; the mock never needs
        // to be fast.
        let mut clusters: Vec<Clusters64> = Vec::new();
        for (i, fragment) in fragments.iter().enumerate() {
            if fragment.is_virtual() {
                continue;
            }
            let len = crate::model::fragment::vcn_length(fragments, i).get();
            for k in 0..len {
                clusters.push(fragment.lcn + Clusters64::new(k));
            }
        }

        let start = starting_vcn.get() as usize;
        let end = (start + count.get() as usize).min(clusters.len());
        for (offset, slot) in clusters[start..end].iter_mut().enumerate() {
            *slot = target_lcn + Clusters64::new(offset as u64);
        }

        let mut rebuilt = Vec::new();
        let mut vcn = Clusters64::ZERO;
        let mut i = 0;
        while i < clusters.len() {
            let run_start = clusters[i];
            let mut run_len = 1u64;
            while i + (run_len as usize) < clusters.len()
                && clusters[i + run_len as usize].get() == run_start.get() + run_len
            {
                run_len += 1;
            }
            vcn += Clusters64::new(run_len);
            rebuilt.push(Fragment::new(vcn, run_start));
            i += run_len as usize;
        }

        *fragments = rebuilt;
    }
}
