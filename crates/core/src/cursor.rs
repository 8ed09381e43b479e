//! Positional cursor rebasing for remote edits.
//!
//! When a client receives a new draft body it still holds the old one, so
//! every remote cursor has to be moved to keep pointing at the same
//! character. The edit is reduced to a single contiguous region found by
//! trimming the longest common prefix and suffix. All offsets are character
//! offsets, not byte offsets.

use std::ops::Range;

/// The single contiguous region in which two texts differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditRegion {
    /// Length of the common prefix; the edit starts here in both texts.
    pub start: usize,
    /// End of the replaced span in the old text.
    pub old_end: usize,
    /// End of the inserted span in the new text.
    pub new_end: usize,
    old_len: usize,
}

impl EditRegion {
    /// Locate the edit that turns `old` into `new`.
    ///
    /// The common suffix never overlaps the common prefix in either text.
    pub fn between(old: &str, new: &str) -> Self {
        let old: Vec<char> = old.chars().collect();
        let new: Vec<char> = new.chars().collect();

        let start = old
            .iter()
            .zip(new.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let max_suffix = old.len().min(new.len()) - start;
        let suffix = old
            .iter()
            .rev()
            .zip(new.iter().rev())
            .take(max_suffix)
            .take_while(|(a, b)| a == b)
            .count();

        Self {
            start,
            old_end: old.len() - suffix,
            new_end: new.len() - suffix,
            old_len: old.len(),
        }
    }

    /// Signed change in length, `|new| - |old|`.
    pub fn delta(&self) -> i64 {
        self.new_end as i64 - self.old_end as i64
    }

    /// Returns `true` when both texts are identical.
    pub fn is_empty(&self) -> bool {
        self.start == self.old_end && self.start == self.new_end
    }

    /// Move a cursor from the old text into the new one.
    ///
    /// Cursors before the edit stay put, cursors after it shift by
    /// [`delta`](Self::delta), and cursors strictly inside a replaced span
    /// collapse to the edit start. A cursor sitting exactly on a pure
    /// insertion point moves past the inserted text.
    pub fn rebase(&self, cursor: usize) -> usize {
        let cursor = cursor.min(self.old_len);
        if cursor < self.start {
            cursor
        } else if cursor >= self.old_end {
            let shifted = cursor as i64 + self.delta();
            shifted.max(self.start as i64) as usize
        } else {
            self.start
        }
    }

    /// Range in the new text to flash as a recent edit, if text was added.
    pub fn highlight(&self) -> Option<Range<usize>> {
        let delta = self.delta();
        if delta > 0 {
            Some(self.start..self.start + delta as usize)
        } else {
            None
        }
    }
}

/// Rebase a single cursor; see [`EditRegion::rebase`].
pub fn rebase_cursor(old: &str, new: &str, cursor: usize) -> usize {
    EditRegion::between(old, new).rebase(cursor)
}
