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

//! The callback surface phases and the mover emit to. Observer calls are
//! one-way: nothing on this side of the trait may call back into the tree,
//! the bitmap, or the volume driver. A GUI, a TUI progress bar and a plain
//! logger are all just different `Observer` implementations.

use crate::model::Item;
use crate::units::Clusters64;
use log::{log, Level};

/// Which phase driver a `show_status` call is being made from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    Analyze,
    Defragment,
    Fixup,
    ForcedFill,
    OptimizeUp,
    OptimizeVolume,
    OptimizeSort,
    MoveMft,
}

impl Phase {
    pub const fn name(self) -> &'static str {
        match self {
            Phase::Analyze => "analyze",
            Phase::Defragment => "defragment",
            Phase::Fixup => "fixup",
            Phase::ForcedFill => "forced_fill",
            Phase::OptimizeUp => "optimize_up",
            Phase::OptimizeVolume => "optimize_volume",
            Phase::OptimizeSort => "optimize_sort",
            Phase::MoveMft => "move_mft",
        }
    }
}

/// Why a particular move is being made, for `show_move`'s annotation. The
/// mover doesn't act differently per direction; this is purely observational.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MoveDirection {
    /// Moving an item into a gap a phase chose directly.
    ToGap,
    /// A per-fragment leg of the `InFragments` retry strategy.
    ToStrategy,
    /// A relocation made to grow a gap (`gap::vacate`).
    ToVacate,
}

/// The color an observer should paint a cluster range, mirroring the
/// allocation-map legend every graphical defragmenter shows.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClusterColor {
    Free,
    Allocated,
    Unfragmented,
    Fragmented,
    Unmovable,
    SpaceHog,
    Directory,
    Mft,
}

/// The callback surface the core fires into, per the external interfaces
/// section. Implementations must treat every call as fire-and-forget: no
/// return value influences the core's behavior, and a call must not block
/// on anything that could itself wait on the core (no re-entrant locking).
pub trait Observer {
    fn clear_screen(&mut self);

    fn show_status(&mut self, phase: Phase, zone: usize);

    fn show_analyze(&mut self, item: &Item);

    /// `from_vcn` is the starting virtual cluster number of the moved
    /// window within `item`; `to_lcn` is where it landed.
    fn show_move(&mut self, item: &Item, count: Clusters64, from_vcn: Clusters64, to_lcn: Clusters64, direction: MoveDirection);

    fn draw_cluster(&mut self, lcn_begin: Clusters64, lcn_end: Clusters64, color: ClusterColor);

    fn show_debug(&mut self, level: Level, item: Option<&Item>, text: &str);

    /// Signals a session-terminating error. `exit_code`, if set, is what the
    /// CLI entry point should exit with.
    fn message_box_error(&mut self, text: &str, caption: &str, exit_code: Option<i32>);
}

/// An `Observer` that discards everything. Used by tests and by any caller
/// that only wants the side effects on the volume, not progress reporting.
pub struct NullObserver;

impl Observer for NullObserver {
    fn clear_screen(&mut self) {}
    fn show_status(&mut self, _phase: Phase, _zone: usize) {}
    fn show_analyze(&mut self, _item: &Item) {}
    fn show_move(&mut self, _item: &Item, _count: Clusters64, _from_vcn: Clusters64, _to_lcn: Clusters64, _direction: MoveDirection) {}
    fn draw_cluster(&mut self, _lcn_begin: Clusters64, _lcn_end: Clusters64, _color: ClusterColor) {}
    fn show_debug(&mut self, _level: Level, _item: Option<&Item>, _text: &str) {}
    fn message_box_error(&mut self, _text: &str, _caption: &str, _exit_code: Option<i32>) {}
}

/// The headless default: every callback becomes one structured `log` line.
/// No screen, no color map — just what a CLI run needs on stdout/a log file.
#[derive(Default)]
pub struct LoggingObserver {
    items_analyzed: u64,
    moves_made: u64,
}

impl LoggingObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Observer for LoggingObserver {
    fn clear_screen(&mut self) {
        self.items_analyzed = 0;
        self.moves_made = 0;
    }

    fn show_status(&mut self, phase: Phase, zone: usize) {
        log::info!("phase={} zone={}", phase.name(), zone);
    }

    fn show_analyze(&mut self, item: &Item) {
        self.items_analyzed += 1;
        log::debug!("analyze {} ({} clusters)", item.long_path, item.clusters_count());
    }

    fn show_move(&mut self, item: &Item, count: Clusters64, from_vcn: Clusters64, to_lcn: Clusters64, direction: MoveDirection) {
        self.moves_made += 1;
        log::info!(
            "move {} {} clusters vcn={} -> lcn={} ({:?})",
            item.long_path,
            count,
            from_vcn,
            to_lcn,
            direction
        );
    }

    fn draw_cluster(&mut self, lcn_begin: Clusters64, lcn_end: Clusters64, color: ClusterColor) {
        log::trace!("cluster [{}, {}) -> {:?}", lcn_begin, lcn_end, color);
    }

    fn show_debug(&mut self, level: Level, item: Option<&Item>, text: &str) {
        match item {
            Some(item) => log!(level, "{}: {}", item.long_path, text),
            None => log!(level, "{}", text),
        }
    }

    fn message_box_error(&mut self, text: &str, caption: &str, exit_code: Option<i32>) {
        log::error!("{caption}: {text} (exit_code={exit_code:?})");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fragment::Fragment;
    use crate::units::{Bytes64, Inode64};

    fn item() -> Item {
        Item::new(
            Inode64::new(1),
            0,
            None,
            "a".into(),
            "A".into(),
            Bytes64::new(0),
            false,
            vec![Fragment::new(Clusters64::new(1), Clusters64::new(0))],
        )
    }

    #[test]
    fn logging_observer_tracks_counts_and_resets_on_clear() {
        let mut observer = LoggingObserver::new();
        let item = item();
        observer.show_analyze(&item);
        observer.show_move(&item, Clusters64::new(1), Clusters64::ZERO, Clusters64::new(5), MoveDirection::ToGap);
        assert_eq!(observer.items_analyzed, 1);
        assert_eq!(observer.moves_made, 1);

        observer.clear_screen();
        assert_eq!(observer.items_analyzed, 0);
        assert_eq!(observer.moves_made, 0);
    }

    #[test]
    fn null_observer_accepts_every_call_without_panicking() {
        let mut observer = NullObserver;
        let item = item();
        observer.clear_screen();
        observer.show_status(Phase::Analyze, 0);
        observer.show_analyze(&item);
        observer.show_move(&item, Clusters64::new(1), Clusters64::ZERO, Clusters64::new(1), MoveDirection::ToVacate);
        observer.draw_cluster(Clusters64::ZERO, Clusters64::new(1), ClusterColor::Free);
        observer.show_debug(Level::Info, Some(&item), "hello");
        observer.message_box_error("oops", "caption", Some(1));
    }
}
