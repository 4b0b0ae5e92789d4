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

//! Phase drivers. Each phase takes the session and a volume driver and runs
//! to completion or until the session's running flag leaves `Running`; none
//! of them unwind on a per-item error (§7's propagation policy).

pub mod analyze;
pub mod defragment;
pub mod fixup;
pub mod forced_fill;
pub mod move_mft;
pub mod optimize_sort;
pub mod optimize_up;
pub mod optimize_volume;

use crate::observer::{Observer, Phase};
use crate::session::Session;

/// Reports status and checks the running-state flag. Phases call this at
/// every loop iteration that can exit; once `Stopping` is set this starts
/// returning `false` and the calling loop must return immediately.
pub(crate) fn keep_running(session: &Session, observer: &mut dyn Observer, phase: Phase, zone: usize) -> bool {
    observer.show_status(phase, zone);
    session.is_running()
}

/// Which zone index an item's first LCN currently falls in, given the
/// session's zone boundaries. Zone 3 is open-ended upward.
pub(crate) fn zone_of(zones: &[crate::units::Clusters64; 4], lcn: crate::units::Clusters64) -> usize {
    for (index, boundary) in zones[1..].iter().enumerate() {
        if lcn.get() < boundary.get() {
            return index;
        }
    }
    3
}
