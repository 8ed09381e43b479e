//! Line-level diff between two page bodies.
//!
//! The rendered text is stored on every history entry and is only ever
//! displayed, never parsed back.

use serde::Serialize;

/// The type of a line in a diff result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffLineType {
    Added,
    Removed,
    Unchanged,
}

impl DiffLineType {
    fn marker(self) -> char {
        match self {
            Self::Added => '+',
            Self::Removed => '-',
            Self::Unchanged => ' ',
        }
    }
}

/// A single line in a diff result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffLine {
    pub line_type: DiffLineType,
    pub content: String,
}

/// Compute a line-level diff between two texts using LCS.
pub fn compute_line_diff(old: &str, new: &str) -> Vec<DiffLine> {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let m = old_lines.len();
    let n = new_lines.len();

    let mut lcs = vec![vec![0u32; n + 1]; m + 1];
    for i in 1..=m {
        for j in 1..=n {
            if old_lines[i - 1] == new_lines[j - 1] {
                lcs[i][j] = lcs[i - 1][j - 1] + 1;
            } else {
                lcs[i][j] = lcs[i - 1][j].max(lcs[i][j - 1]);
            }
        }
    }

    // Backtrack from the bottom-right corner.
    let mut result = Vec::with_capacity(m.max(n));
    let mut i = m;
    let mut j = n;
    while i > 0 || j > 0 {
        if i > 0 && j > 0 && old_lines[i - 1] == new_lines[j - 1] {
            result.push(DiffLine {
                line_type: DiffLineType::Unchanged,
                content: old_lines[i - 1].to_string(),
            });
            i -= 1;
            j -= 1;
        } else if j > 0 && (i == 0 || lcs[i][j - 1] >= lcs[i - 1][j]) {
            result.push(DiffLine {
                line_type: DiffLineType::Added,
                content: new_lines[j - 1].to_string(),
            });
            j -= 1;
        } else {
            result.push(DiffLine {
                line_type: DiffLineType::Removed,
                content: old_lines[i - 1].to_string(),
            });
            i -= 1;
        }
    }

    result.reverse();
    result
}

/// Render a diff as `+`/`-`/` ` prefixed lines.
pub fn render_diff(old: &str, new: &str) -> String {
    let mut out = String::new();
    for line in compute_line_diff(old, new) {
        out.push(line.line_type.marker());
        out.push(' ');
        out.push_str(&line.content);
        out.push('\n');
    }
    out
}
