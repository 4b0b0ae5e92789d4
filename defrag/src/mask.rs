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

//! Wildcard mask matching for include/exclude/space-hog path filters.
//! `*` matches any run of characters (including none), `?` matches exactly
//! one character. Matching is case-insensitive, since both NTFS and FAT
//! paths are conventionally treated case-insensitively by the tools that
//! produced this mask syntax.

/// Returns true if `path` matches `mask`, where `mask` may contain `*` and
/// `?` wildcards.
pub fn matches(path: &str, mask: &str) -> bool {
    let path: Vec<char> = path.chars().flat_map(|c| c.to_lowercase()).collect();
    let mask: Vec<char> = mask.chars().flat_map(|c| c.to_lowercase()).collect();
    matches_from(&path, &mask)
}

fn matches_from(path: &[char], mask: &[char]) -> bool {
    match mask.first() {
        None => path.is_empty(),
        Some('*') => {
            // Skip redundant leading stars, then try matching the rest of
            // the mask against every suffix of `path`, shortest skip first.
            let rest = &mask[1..];
            if matches_from(path, rest) {
                return true;
            }
            for i in 0..path.len() {
                if matches_from(&path[i + 1..], rest) {
                    return true;
                }
            }
            false
        }
        Some('?') => !path.is_empty() && matches_from(&path[1..], &mask[1..]),
        Some(c) => path.first() == Some(c) && matches_from(&path[1..], &mask[1..]),
    }
}

/// A set of masks, any one of which matching is sufficient for `matches_any`
/// to return true. Used for `include_mask`, `excludes[]` and `space_hogs[]`.
#[derive(Debug, Clone, Default)]
pub struct MaskSet {
    masks: Vec<String>,
}

impl MaskSet {
    pub fn new() -> Self {
        Self { masks: Vec::new() }
    }

    pub fn from_masks(masks: impl IntoIterator<Item = String>) -> Self {
        Self {
            masks: masks.into_iter().collect(),
        }
    }

    pub fn push(&mut self, mask: String) {
        self.masks.push(mask);
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    pub fn matches_any(&self, path: &str) -> bool {
        self.masks.iter().any(|mask| matches(path, mask))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_any_run() {
        assert!(matches(r"C:\foo\bar.txt", r"*.txt"));
        assert!(matches(r"C:\BootWiz\inner\file", r"*\BootWiz\*"));
        assert!(!matches(r"C:\foo\bar.log", r"*.txt"));
    }

    #[test]
    fn question_mark_matches_exactly_one_char() {
        assert!(matches(r"C:\bootauth1.sys", r"?:\BootAuth?.sys"));
        assert!(!matches(r"C:\bootauth12.sys", r"?:\BootAuth?.sys"));
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert!(matches(r"C:\SAFEBOOT.FS", r"*\safeboot.fs"));
    }

    #[test]
    fn empty_mask_only_matches_empty_path() {
        assert!(matches("", ""));
        assert!(!matches("x", ""));
    }

    #[test]
    fn mask_set_matches_any_member() {
        let set = MaskSet::from_masks(["*.tmp".to_string(), "*.log".to_string()]);
        assert!(set.matches_any("a.log"));
        assert!(!set.matches_any("a.txt"));
    }
}
