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

//! NTFS boot sector decode, MFT record fixup, and run-list decode. The
//! boot sector layout follows the common BIOS parameter block plus the
//! NTFS extension (`mft_first_cluster_number`, `mft_record_size`); the MFT
//! record layout follows the `FILE` record header every NTFS driver
//! documents.

use std::collections::HashMap;

use crate::error::{ItemError, SessionError};
use crate::model::fragment::Fragment;
use crate::model::{Item, ItemTree};
use crate::observer::Observer;
use crate::units::{Bytes64, Clusters64, FileTime64, Inode64};

use super::{finish_item, RawVolumeReader, ScanTotals};

const OEM_ID_OFFSET: usize = 3;
const OEM_ID: &[u8; 8] = b"NTFS    ";
const BOOT_SECTOR_SIGNATURE_OFFSET: usize = 510;
const BOOT_SECTOR_SIGNATURE: [u8; 2] = [0x55, 0xAA];

#[derive(Debug, Copy, Clone)]
pub struct NtfsBootSector {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub total_sectors: u64,
    pub mft_first_cluster_number: u64,
    pub mft_mirror_first_cluster_number: u64,
    /// Raw stored byte: positive means "clusters per MFT record", negative
    /// (as a signed i8) means "2^-n bytes per record". See `record_bytes`.
    pub clusters_or_log2_bytes_per_mft_record: i8,
}

impl NtfsBootSector {
    pub fn bytes_per_cluster(&self) -> u64 {
        self.bytes_per_sector as u64 * self.sectors_per_cluster as u64
    }

    /// Resolves the signed `clusters_or_log2_bytes_per_mft_record` byte into
    /// a concrete record size in bytes. A non-negative byte count is a
    /// cluster count, shifted by the cluster size's own log2; a negative
    /// byte is `-n`, meaning the record size is `2^n` bytes directly,
    /// independent of cluster size.
    pub fn mft_record_size(&self) -> u32 {
        let byte = self.clusters_or_log2_bytes_per_mft_record;
        if byte >= 0 {
            (byte as u32) << cluster_shift(self.bytes_per_cluster())
        } else {
            1u32 << (-(byte as i32) as u32)
        }
    }
}

fn cluster_shift(bytes_per_cluster: u64) -> u32 {
    bytes_per_cluster.trailing_zeros()
}

pub fn parse_boot_sector(sector: &[u8]) -> Result<NtfsBootSector, SessionError> {
    if sector.len() < 512
        || sector[BOOT_SECTOR_SIGNATURE_OFFSET..512] != BOOT_SECTOR_SIGNATURE
        || &sector[OEM_ID_OFFSET..OEM_ID_OFFSET + 8] != OEM_ID
    {
        return Err(SessionError::NotAVolume);
    }

    let bytes_per_sector = u16::from_le_bytes([sector[11], sector[12]]);
    let sectors_per_cluster = sector[13];
    let total_sectors = u64::from_le_bytes(sector[40..48].try_into().unwrap());
    let mft_first_cluster_number = u64::from_le_bytes(sector[48..56].try_into().unwrap());
    let mft_mirror_first_cluster_number = u64::from_le_bytes(sector[56..64].try_into().unwrap());
    let clusters_or_log2_bytes_per_mft_record = sector[64] as i8;

    if bytes_per_sector == 0 || sectors_per_cluster == 0 {
        return Err(SessionError::NotAVolume);
    }

    Ok(NtfsBootSector {
        bytes_per_sector,
        sectors_per_cluster,
        total_sectors,
        mft_first_cluster_number,
        mft_mirror_first_cluster_number,
        clusters_or_log2_bytes_per_mft_record,
    })
}

const FILE_RECORD_MAGIC: [u8; 4] = *b"FILE";

/// Applies the update-sequence-array fixup in place: the last two bytes of
/// every sector in the record are a copy of the USA's first entry, stashed
/// there to detect a torn multi-sector write, and must be restored to their
/// real on-disk content (the USA entries themselves) before the record is
/// otherwise read. Returns an error if the stashed bytes don't match the
/// USA's expected "check" value, meaning the record is genuinely corrupt.
pub fn apply_fixup(record: &mut [u8], bytes_per_sector: u16) -> Result<(), ItemError> {
    if record.len() < 4 || record[0..4] != FILE_RECORD_MAGIC {
        return Err(ItemError::CorruptMft);
    }

    let usa_offset = u16::from_le_bytes([record[4], record[5]]) as usize;
    let usa_count = u16::from_le_bytes([record[6], record[7]]) as usize;
    if usa_count == 0 || usa_offset + usa_count * 2 > record.len() {
        return Err(ItemError::CorruptMft);
    }

    let check = [record[usa_offset], record[usa_offset + 1]];
    let sector_size = bytes_per_sector as usize;

    for i in 0..usa_count.saturating_sub(1) {
        let stash_offset = (i + 1) * sector_size - 2;
        if stash_offset + 2 > record.len() {
            return Err(ItemError::CorruptMft);
        }
        if record[stash_offset..stash_offset + 2] != check {
            return Err(ItemError::CorruptMft);
        }
        let entry_offset = usa_offset + (i + 1) * 2;
        record[stash_offset] = record[entry_offset];
        record[stash_offset + 1] = record[entry_offset + 1];
    }

    Ok(())
}

/// Decodes a single MFT `$DATA` attribute's non-resident run list into a
/// VCN-ordered fragment list. Each run is `(length_byte_count,
/// offset_byte_count)` followed by a little-endian length then a
/// little-endian, sign-extended, *relative* LCN offset from the previous
/// run's LCN (0 for a sparse run).
pub fn decode_run_list(run_list: &[u8]) -> Result<Vec<Fragment>, ItemError> {
    let mut fragments = Vec::new();
    let mut offset = 0usize;
    let mut vcn = Clusters64::ZERO;
    let mut lcn: i64 = 0;

    while offset < run_list.len() && run_list[offset] != 0 {
        let header = run_list[offset];
        let length_bytes = (header & 0x0F) as usize;
        let offset_bytes = ((header >> 4) & 0x0F) as usize;
        offset += 1;

        if offset + length_bytes + offset_bytes > run_list.len() {
            return Err(ItemError::CorruptMft);
        }

        let length = read_le_unsigned(&run_list[offset..offset + length_bytes]);
        offset += length_bytes;

        vcn += Clusters64::new(length);

        if offset_bytes == 0 {
            // Sparse run: no LCN delta, no physical clusters.
            fragments.push(Fragment::new(vcn, crate::model::fragment::VIRTUAL));
            continue;
        }

        let delta = read_le_signed(&run_list[offset..offset + offset_bytes]);
        offset += offset_bytes;
        lcn += delta;

        if lcn < 0 {
            return Err(ItemError::CorruptMft);
        }

        fragments.push(Fragment::new(vcn, Clusters64::new(lcn as u64)));
    }

    if fragments.is_empty() {
        return Err(ItemError::CorruptMft);
    }

    Ok(fragments)
}

fn read_le_unsigned(bytes: &[u8]) -> u64 {
    let mut value = 0u64;
    for (i, &byte) in bytes.iter().enumerate() {
        value |= (byte as u64) << (i * 8);
    }
    value
}

fn read_le_signed(bytes: &[u8]) -> i64 {
    let mut value = read_le_unsigned(bytes) as i64;
    if let Some(&last) = bytes.last() {
        if last & 0x80 != 0 {
            // Sign-extend: the stored width is narrower than i64.
            value -= 1i64 << (bytes.len() * 8);
        }
    }
    value
}

/// Reads and fixes up the MFT record for `inode`, then returns its raw
/// bytes for attribute parsing. The caller locates `$DATA`'s run list
/// within the returned buffer; this module doesn't walk attribute headers
/// itself, since their layout is orthogonal to the fixup/run-list decode
/// this crate actually needs.
pub fn read_mft_record(reader: &dyn RawVolumeReader, boot: &NtfsBootSector, inode: u64) -> Result<Vec<u8>, ItemError> {
    let record_size = boot.mft_record_size() as usize;
    let mft_byte_offset = boot.mft_first_cluster_number * boot.bytes_per_cluster();
    let record_offset = mft_byte_offset + inode * record_size as u64;

    let mut buffer = vec![0u8; record_size];
    reader.read_at(record_offset, &mut buffer).map_err(ItemError::VolumeIo)?;

    apply_fixup(&mut buffer, boot.bytes_per_sector)?;
    Ok(buffer)
}

/// The number of MFT record slots `$MFT`'s own valid data covers, so a
/// caller knows how far to iterate `scan` without depending on this module
/// knowing how `VolumeData` stores that length.
pub fn entry_count(boot: &NtfsBootSector, mft_valid_data_clusters: u64) -> u64 {
    let record_size = boot.mft_record_size() as u64;
    if record_size == 0 {
        return 0;
    }
    (mft_valid_data_clusters * boot.bytes_per_cluster()) / record_size
}

const ATTR_STANDARD_INFORMATION: u32 = 0x10;
const ATTR_FILE_NAME: u32 = 0x30;
const ATTR_DATA: u32 = 0x80;
const ATTR_END: u32 = 0xFFFF_FFFF;

const RECORD_FLAG_IN_USE: u16 = 0x0001;
const RECORD_FLAG_DIRECTORY: u16 = 0x0002;

/// The DOS-namespace `$FILE_NAME` is 8.3-only and never the preferred long
/// name; Win32 (1), POSIX (0) and Win32-and-DOS (3) all carry a usable long
/// name, with Win32-and-DOS doubling as the short name too.
const FILENAME_NAMESPACE_DOS: u8 = 2;

/// A well-known record, kept out of every reconstructed path: the root
/// directory is its own parent in the tree NTFS actually builds.
const ROOT_DIRECTORY_INODE: u64 = 5;

const MAX_PATH_DEPTH: u32 = 1024;

struct RawAttribute<'a> {
    type_code: u32,
    non_resident: bool,
    data: &'a [u8],
}

/// Walks a record's attribute list starting at `first_attribute_offset`,
/// stopping at the `0xFFFFFFFF` end marker (or at the first attribute whose
/// header doesn't fit, which is what an all-zero tail past the last real
/// attribute looks like). `data` is the resident value or, for a
/// non-resident attribute, the raw run-list bytes `decode_run_list` expects.
fn iter_attributes(record: &[u8], first_attribute_offset: usize) -> Vec<RawAttribute<'_>> {
    let mut attributes = Vec::new();
    let mut offset = first_attribute_offset;

    while offset + 8 <= record.len() {
        let type_code = u32::from_le_bytes(record[offset..offset + 4].try_into().unwrap());
        if type_code == ATTR_END {
            break;
        }
        let length = u32::from_le_bytes(record[offset + 4..offset + 8].try_into().unwrap()) as usize;
        if length == 0 || offset + length > record.len() {
            break;
        }
        let non_resident = record[offset + 8] != 0;

        let data = if non_resident {
            if offset + 0x22 > record.len() {
                break;
            }
            let run_list_offset = u16::from_le_bytes([record[offset + 0x20], record[offset + 0x21]]) as usize;
            let start = (offset + run_list_offset).min(record.len());
            &record[start..offset + length]
        } else {
            if offset + 0x16 > record.len() {
                break;
            }
            let value_length = u32::from_le_bytes(record[offset + 0x10..offset + 0x14].try_into().unwrap()) as usize;
            let value_offset = u16::from_le_bytes([record[offset + 0x14], record[offset + 0x15]]) as usize;
            let start = (offset + value_offset).min(record.len());
            let end = (start + value_length).min(record.len());
            &record[start..end]
        };

        attributes.push(RawAttribute { type_code, non_resident, data });
        offset += length;
    }

    attributes
}

/// One MFT record's worth of parsed item data, before path reconstruction
/// (which needs every record resolved first, since a parent can sit at a
/// higher or lower inode number than its children).
struct ParsedRecord {
    is_dir: bool,
    parent_inode: Option<Inode64>,
    long_name: Option<String>,
    short_name: Option<String>,
    bytes: Bytes64,
    created: FileTime64,
    last_write: FileTime64,
    mft_change: FileTime64,
    last_access: FileTime64,
    fragments: Vec<Fragment>,
}

/// Parses one already-fixed-up MFT record. Returns `None` for a record
/// that isn't a `FILE` record or whose in-use flag is clear (a free slot).
fn parse_record(record: &[u8]) -> Option<ParsedRecord> {
    if record.len() < 0x18 || record[0..4] != FILE_RECORD_MAGIC {
        return None;
    }

    let flags = u16::from_le_bytes([record[0x16], record[0x17]]);
    if flags & RECORD_FLAG_IN_USE == 0 {
        return None;
    }
    let is_dir = flags & RECORD_FLAG_DIRECTORY != 0;
    let first_attribute_offset = u16::from_le_bytes([record[0x14], record[0x15]]) as usize;

    let mut parent_inode = None;
    let mut long_name = None;
    let mut short_name = None;
    let mut bytes = Bytes64::ZERO;
    let mut created = FileTime64::ZERO;
    let mut last_write = FileTime64::ZERO;
    let mut mft_change = FileTime64::ZERO;
    let mut last_access = FileTime64::ZERO;
    let mut fragments = Vec::new();
    let mut best_namespace = u8::MAX;

    for attribute in iter_attributes(record, first_attribute_offset) {
        match attribute.type_code {
            ATTR_STANDARD_INFORMATION if !attribute.non_resident && attribute.data.len() >= 32 => {
                created = FileTime64::new(u64::from_le_bytes(attribute.data[0..8].try_into().unwrap()));
                last_write = FileTime64::new(u64::from_le_bytes(attribute.data[8..16].try_into().unwrap()));
                mft_change = FileTime64::new(u64::from_le_bytes(attribute.data[16..24].try_into().unwrap()));
                last_access = FileTime64::new(u64::from_le_bytes(attribute.data[24..32].try_into().unwrap()));
            }
            ATTR_FILE_NAME if !attribute.non_resident && attribute.data.len() >= 0x42 => {
                let parent_reference = u64::from_le_bytes(attribute.data[0..8].try_into().unwrap());
                let parent = parent_reference & 0x0000_FFFF_FFFF_FFFF;
                let real_size = u64::from_le_bytes(attribute.data[0x30..0x38].try_into().unwrap());
                let name_length = attribute.data[0x40] as usize;
                let namespace = attribute.data[0x41];
                let name_end = 0x42 + name_length * 2;
                if name_end > attribute.data.len() {
                    continue;
                }
                let units: Vec<u16> = attribute.data[0x42..name_end].chunks_exact(2).map(|b| u16::from_le_bytes([b[0], b[1]])).collect();
                let Ok(name) = String::from_utf16(&units) else { continue };

                if namespace == FILENAME_NAMESPACE_DOS {
                    short_name.get_or_insert(name);
                } else if namespace < best_namespace {
                    best_namespace = namespace;
                    parent_inode = Some(Inode64::new(parent));
                    bytes = Bytes64::new(real_size);
                    short_name.get_or_insert_with(|| name.clone());
                    long_name = Some(name);
                }
            }
            ATTR_DATA if attribute.non_resident => {
                if let Ok(decoded) = decode_run_list(attribute.data) {
                    fragments = decoded;
                }
            }
            _ => {}
        }
    }

    Some(ParsedRecord {
        is_dir,
        parent_inode,
        long_name,
        short_name,
        bytes,
        created,
        last_write,
        mft_change,
        last_access,
        fragments,
    })
}

/// Climbs `parent_inode` chains to build the full path for `inode`, memoizing
/// every inode resolved along the way. Stops at the root directory, a
/// self-referential parent, or `MAX_PATH_DEPTH` (a record with a cyclic or
/// missing ancestor chain would otherwise recurse forever).
fn resolve_path(records: &HashMap<u64, ParsedRecord>, cache: &mut HashMap<u64, (String, String)>, inode: u64, depth: u32) -> (String, String) {
    if let Some(cached) = cache.get(&inode) {
        return cached.clone();
    }

    let Some(record) = records.get(&inode) else {
        return (format!("\\?{inode}"), format!("\\?{inode}"));
    };

    let long_name = record.long_name.clone().unwrap_or_else(|| format!("${inode}"));
    let short_name = record.short_name.clone().unwrap_or_else(|| long_name.clone());

    let result = match record.parent_inode {
        Some(parent) if parent.get() != inode && parent.get() != ROOT_DIRECTORY_INODE && depth < MAX_PATH_DEPTH => {
            let (parent_long, parent_short) = resolve_path(records, cache, parent.get(), depth + 1);
            (format!("{parent_long}\\{long_name}"), format!("{parent_short}\\{short_name}"))
        }
        _ => (format!("\\{long_name}"), format!("\\{short_name}")),
    };

    cache.insert(inode, result.clone());
    result
}

/// Scans MFT records `0..entry_count`, assembling an `Item` per in-use
/// record and inserting it into `tree`. Paths are built by climbing
/// `parent_inode` chains back to the root directory, per the scanner's
/// path-construction operation; a record that fails to read (past the end
/// of a sparsely allocated MFT, say) is skipped rather than aborting the
/// whole scan.
pub fn scan<R: RawVolumeReader>(reader: &R, boot: &NtfsBootSector, entry_count: u64, tree: &mut ItemTree, totals: &mut ScanTotals, observer: &mut dyn Observer) {
    let mut records: HashMap<u64, ParsedRecord> = HashMap::new();

    for inode in 0..entry_count {
        let Ok(raw) = read_mft_record(reader, boot, inode) else { continue };
        if let Some(record) = parse_record(&raw) {
            records.insert(inode, record);
        }
    }

    let mut path_cache: HashMap<u64, (String, String)> = HashMap::new();
    let mut inodes: Vec<u64> = records.keys().copied().collect();
    inodes.sort_unstable();

    for inode in inodes {
        let (long_path, short_path) = resolve_path(&records, &mut path_cache, inode, 0);
        let record = records.get(&inode).unwrap();

        let long_name = record.long_name.clone().unwrap_or_else(|| format!("${inode}"));
        let short_name = record.short_name.clone().unwrap_or_else(|| long_name.clone());

        let mut item = Item::new(Inode64::new(inode), 0, record.parent_inode, long_name, short_name, record.bytes, record.is_dir, record.fragments.clone());
        item.long_path = long_path;
        item.short_path = short_path;
        item.created = record.created;
        item.last_write = record.last_write;
        item.mft_change = record.mft_change;
        item.last_access = record.last_access;

        finish_item(tree, totals, observer, item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mft_record_size_nonnegative_byte_shifts_by_cluster_size() {
        let boot = NtfsBootSector {
            bytes_per_sector: 512,
            sectors_per_cluster: 8,
            total_sectors: 0,
            mft_first_cluster_number: 0,
            mft_mirror_first_cluster_number: 0,
            clusters_or_log2_bytes_per_mft_record: 1,
        };
        assert_eq!(boot.mft_record_size(), 4096);
    }

    #[test]
    fn mft_record_size_negative_byte_is_power_of_two_bytes() {
        let boot = NtfsBootSector {
            bytes_per_sector: 512,
            sectors_per_cluster: 8,
            total_sectors: 0,
            mft_first_cluster_number: 0,
            mft_mirror_first_cluster_number: 0,
            clusters_or_log2_bytes_per_mft_record: -10,
        };
        assert_eq!(boot.mft_record_size(), 1024);
    }

    #[test]
    fn decode_run_list_handles_sparse_and_relative_offsets() {
        // One run: 0x10 clusters at LCN 0x20 ("11 10 20"), then terminator.
        let bytes = [0x11, 0x10, 0x20, 0x00];
        let fragments = decode_run_list(&bytes).unwrap();
        assert_eq!(fragments, vec![Fragment::new(Clusters64::new(0x10), Clusters64::new(0x20))]);
    }

    #[test]
    fn decode_run_list_chains_relative_lcn_deltas() {
        // Run 1: 5 clusters at LCN 100 ("11 05 64"). Run 2: 5 clusters, delta -50 ("11 05 CE").
        let bytes = [0x11, 0x05, 0x64, 0x11, 0x05, 0xCE, 0x00];
        let fragments = decode_run_list(&bytes).unwrap();
        assert_eq!(
            fragments,
            vec![
                Fragment::new(Clusters64::new(5), Clusters64::new(100)),
                Fragment::new(Clusters64::new(10), Clusters64::new(50)),
            ]
        );
    }

    #[test]
    fn apply_fixup_rejects_a_bad_magic() {
        let mut record = vec![0u8; 1024];
        record[0..4].copy_from_slice(b"BAAD");
        assert!(apply_fixup(&mut record, 512).is_err());
    }

    #[test]
    fn apply_fixup_restores_stashed_sector_tails() {
        let mut record = vec![0u8; 1024];
        record[0..4].copy_from_slice(&FILE_RECORD_MAGIC);
        record[4..6].copy_from_slice(&48u16.to_le_bytes()); // usa_offset
        record[6..8].copy_from_slice(&3u16.to_le_bytes()); // usa_count (1 check + 2 sectors)

        let check = [0xAB, 0xCD];
        record[48..50].copy_from_slice(&check);
        record[50..52].copy_from_slice(&[0x11, 0x22]);
        record[52..54].copy_from_slice(&[0x33, 0x44]);

        record[510..512].copy_from_slice(&check);
        record[1022..1024].copy_from_slice(&check);

        apply_fixup(&mut record, 512).unwrap();
        assert_eq!(&record[510..512], &[0x11, 0x22]);
        assert_eq!(&record[1022..1024], &[0x33, 0x44]);
    }

    struct FakeVolume {
        data: Vec<u8>,
    }

    impl RawVolumeReader for FakeVolume {
        fn read_at(&self, byte_offset: u64, buffer: &mut [u8]) -> Result<(), crate::error::VolumeIoError> {
            let start = byte_offset as usize;
            let end = start + buffer.len();
            if end > self.data.len() {
                return Err(crate::error::VolumeIoError::IoError);
            }
            buffer.copy_from_slice(&self.data[start..end]);
            Ok(())
        }
    }

    fn test_boot_sector() -> NtfsBootSector {
        NtfsBootSector {
            bytes_per_sector: 512,
            sectors_per_cluster: 1,
            total_sectors: 2000,
            mft_first_cluster_number: 0,
            mft_mirror_first_cluster_number: 0,
            clusters_or_log2_bytes_per_mft_record: -10, // 1024-byte records
        }
    }

    fn resident_attribute(type_code: u32, value: &[u8]) -> Vec<u8> {
        let mut attribute = vec![0u8; 0x18 + value.len()];
        attribute[0x00..0x04].copy_from_slice(&type_code.to_le_bytes());
        attribute[0x04..0x08].copy_from_slice(&(attribute.len() as u32).to_le_bytes());
        attribute[0x08] = 0; // resident
        attribute[0x10..0x14].copy_from_slice(&(value.len() as u32).to_le_bytes());
        attribute[0x14..0x16].copy_from_slice(&0x18u16.to_le_bytes());
        attribute[0x18..].copy_from_slice(value);
        attribute
    }

    fn non_resident_data_attribute(run_list: &[u8]) -> Vec<u8> {
        let mut attribute = vec![0u8; 0x40 + run_list.len()];
        attribute[0x00..0x04].copy_from_slice(&ATTR_DATA.to_le_bytes());
        attribute[0x04..0x08].copy_from_slice(&(attribute.len() as u32).to_le_bytes());
        attribute[0x08] = 1; // non-resident
        attribute[0x20..0x22].copy_from_slice(&0x40u16.to_le_bytes());
        attribute[0x40..].copy_from_slice(run_list);
        attribute
    }

    fn file_name_value(parent_inode: u64, real_size: u64, namespace: u8, name: &str) -> Vec<u8> {
        let units: Vec<u16> = name.encode_utf16().collect();
        let mut value = vec![0u8; 0x42 + units.len() * 2];
        value[0x00..0x08].copy_from_slice(&parent_inode.to_le_bytes());
        value[0x30..0x38].copy_from_slice(&real_size.to_le_bytes());
        value[0x40] = units.len() as u8;
        value[0x41] = namespace;
        for (i, unit) in units.iter().enumerate() {
            value[0x42 + i * 2..0x44 + i * 2].copy_from_slice(&unit.to_le_bytes());
        }
        value
    }

    fn standard_information_value(created: u64, last_write: u64, mft_change: u64, last_access: u64) -> Vec<u8> {
        let mut value = vec![0u8; 32];
        value[0..8].copy_from_slice(&created.to_le_bytes());
        value[8..16].copy_from_slice(&last_write.to_le_bytes());
        value[16..24].copy_from_slice(&mft_change.to_le_bytes());
        value[24..32].copy_from_slice(&last_access.to_le_bytes());
        value
    }

    /// Builds one 1024-byte MFT record: header, USA with a no-op single
    /// entry, then `attributes` packed back to back starting at 0x60.
    fn build_record(in_use: bool, is_dir: bool, attributes: &[Vec<u8>]) -> Vec<u8> {
        let mut record = vec![0u8; 1024];
        record[0..4].copy_from_slice(&FILE_RECORD_MAGIC);
        record[4..6].copy_from_slice(&0x30u16.to_le_bytes()); // usa_offset
        record[6..8].copy_from_slice(&1u16.to_le_bytes()); // usa_count: no stashed sectors to restore
        record[0x14..0x16].copy_from_slice(&0x60u16.to_le_bytes()); // first_attribute_offset

        let mut flags = 0u16;
        if in_use {
            flags |= RECORD_FLAG_IN_USE;
        }
        if is_dir {
            flags |= RECORD_FLAG_DIRECTORY;
        }
        record[0x16..0x18].copy_from_slice(&flags.to_le_bytes());

        let mut offset = 0x60;
        for attribute in attributes {
            record[offset..offset + attribute.len()].copy_from_slice(attribute);
            offset += attribute.len();
        }

        record
    }

    fn mft_image(records: &[Vec<u8>]) -> FakeVolume {
        let mut data = Vec::new();
        for record in records {
            data.extend_from_slice(record);
        }
        FakeVolume { data }
    }

    #[test]
    fn scan_assembles_items_with_parent_chain_paths() {
        let root = build_record(
            true,
            true,
            &[resident_attribute(ATTR_STANDARD_INFORMATION, &standard_information_value(0, 0, 0, 0))],
        );
        let child = build_record(
            true,
            false,
            &[
                resident_attribute(ATTR_STANDARD_INFORMATION, &standard_information_value(100, 200, 200, 300)),
                resident_attribute(ATTR_FILE_NAME, &file_name_value(5, 4096, 1, "child.txt")),
                non_resident_data_attribute(&[0x11, 0x05, 0x0A, 0x00]),
            ],
        );
        let free_slot = vec![0u8; 1024];

        let mut records = vec![vec![0u8; 1024]; 5]; // inodes 0-4: unused system records
        records.push(root); // inode 5
        records.push(child); // inode 6
        records.push(free_slot); // inode 7
        let image = mft_image(&records);

        let boot = test_boot_sector();
        let mut tree = ItemTree::new();
        let mut totals = ScanTotals::default();
        let mut observer = crate::observer::NullObserver;

        scan(&image, &boot, 8, &mut tree, &mut totals, &mut observer);

        assert_eq!(totals.all_files, 2);
        let child_id = tree.find_by_inode(Inode64::new(6), 0).unwrap();
        let child_item = tree.get(child_id).unwrap();
        assert_eq!(child_item.long_path, r"\child.txt");
        assert_eq!(child_item.parent_inode, Some(Inode64::new(5)));
        assert_eq!(child_item.bytes, Bytes64::new(4096));
        assert_eq!(child_item.fragments, vec![Fragment::new(Clusters64::new(5), Clusters64::new(10))]);
    }
}
