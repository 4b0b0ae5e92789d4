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

//! The error taxonomy the core distinguishes, per the error handling design.
//! Per-item errors never unwind a phase; only `SessionError` is allowed to
//! terminate a session.

use thiserror::Error;

/// Errors the volume driver can hand back from any of its five operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeIoError {
    #[error("item not found")]
    NotFound,
    #[error("access denied")]
    AccessDenied,
    #[error("I/O error")]
    IoError,
    #[error("more data available")]
    MoreData,
    #[error("resource locked")]
    Locked,
    #[error("operation unsupported")]
    Unsupported,
}

/// Per-item error kinds a phase or the mover can encounter. These never
/// propagate past the item they occurred on: the phase logs them, marks the
/// item appropriately, and continues the loop.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemError {
    #[error("MFT record failed its FILE cookie or update-sequence-array check")]
    CorruptMft,
    #[error("post-move fragment check still shows fragmentation")]
    PartialMove,
    #[error("no qualifying gap was found")]
    NoGap,
    #[error("volume call failed: {0}")]
    VolumeIo(#[from] VolumeIoError),
}

/// Errors that terminate a whole session. Surfaced once to the observer via
/// `Observer::message_box_error` and never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("volume does not carry a recognized NTFS or FAT boot sector")]
    NotAVolume,
    #[error("volume is hibernated (hiberfil.sys is non-zero)")]
    Hibernated,
    #[error("volume is mounted read-only")]
    ReadOnly,
    #[error("could not acquire the privilege needed to open the volume")]
    PrivilegeDenied,
    #[error("volume I/O error while opening the session: {0}")]
    VolumeIo(#[from] VolumeIoError),
}

pub type ItemResult<T> = Result<T, ItemError>;
pub type SessionResult<T> = Result<T, SessionError>;
