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

//! The defragmentation core: a pure in-memory model (`model`, `units`,
//! `mask`), the volume seam (`volume`, `bitmap`), the gap-finding and
//! cluster-relocation engine (`gap`, `mover`, `zones`), the two file-system
//! scanners plus a directory-walk fallback (`scanner`), the session state
//! bag (`session`), the eight phase drivers (`phases`), and the ambient
//! logging/observer surface (`logging`, `observer`). `main.rs` is the only
//! consumer that knows about the command line or the local file system;
//! everything here is reachable without either.

pub mod bitmap;
pub mod error;
pub mod gap;
pub mod logging;
pub mod mask;
pub mod model;
pub mod mover;
pub mod observer;
pub mod phases;
pub mod scanner;
pub mod session;
pub mod units;
pub mod volume;
pub mod zones;

use observer::Observer;
use session::{OptimizeMode, Session};
use units::FileTime64;
use volume::VolumeDriver;

/// Seconds between the NTFS epoch (1601-01-01) and the Unix epoch
/// (1970-01-01); shared by `phases::analyze` and `phases::fixup`'s "now".
pub const NTFS_EPOCH_OFFSET_SECONDS: u64 = 11_644_473_600;

/// The current instant expressed as `FileTime64` ticks, computed once per
/// session run so every phase that needs "now" agrees on its value.
pub fn now_filetime() -> FileTime64 {
    let unix_seconds = chrono::Utc::now().timestamp().max(0) as u64;
    FileTime64::ZERO.plus_seconds(NTFS_EPOCH_OFFSET_SECONDS + unix_seconds)
}

/// Runs the session's configured phase sequence to completion or
/// cancellation, per §4.6's mode table: `AnalyzeFixup` stops after fixup,
/// `AnalyzeFixupFastopt` adds the volume-wide pass, `AnalyzeGroup` and
/// `AnalyzeMoveToEnd` run their own single placement pass after fixup, and
/// the `AnalyzeSortBy*` modes run the sort placement pass instead of
/// fixup's zone nudging.
pub fn run_session<D: VolumeDriver>(session: &mut Session, driver: &D, observer: &mut dyn Observer) {
    phases::analyze::run(session, observer);
    if !session.is_running() {
        return;
    }

    phases::defragment::run(session, driver, observer);
    if !session.is_running() {
        return;
    }

    let now = now_filetime();
    match session.options.mode {
        OptimizeMode::AnalyzeFixup => {
            phases::fixup::run(session, driver, observer, now);
        }
        OptimizeMode::AnalyzeFixupFastopt => {
            phases::fixup::run(session, driver, observer, now);
            if session.is_running() {
                phases::optimize_volume::run(session, driver, observer);
            }
        }
        OptimizeMode::AnalyzeGroup => {
            phases::fixup::run(session, driver, observer, now);
            if session.is_running() {
                phases::forced_fill::run(session, driver, observer);
            }
        }
        OptimizeMode::AnalyzeMoveToEnd => {
            phases::fixup::run(session, driver, observer, now);
            if session.is_running() {
                phases::optimize_up::run(session, driver, observer);
            }
        }
        OptimizeMode::AnalyzeSortByName
        | OptimizeMode::AnalyzeSortBySize
        | OptimizeMode::AnalyzeSortByAccess
        | OptimizeMode::AnalyzeSortByChanged
        | OptimizeMode::AnalyzeSortByCreated => {
            if let Some(field) = session.options.mode.sort_field() {
                phases::optimize_sort::run(session, driver, observer, field);
            }
        }
    }

    if !session.is_running() {
        return;
    }

    phases::move_mft::run(session, driver, observer);
}
