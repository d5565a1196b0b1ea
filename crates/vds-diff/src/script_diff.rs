//! Script diff: line counts between two versions of a transform or viz
//! script.
//!
//! Uses the `similar` crate (Myers diff algorithm) over lines.

use similar::{ChangeTag, TextDiff};

/// Line-level summary of a script change.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScriptDiff {
    /// Lines present only in the new script.
    pub additions: usize,
    /// Lines present only in the old script.
    pub deletions: usize,
    pub old_lines: usize,
    pub new_lines: usize,
    /// Either side was not UTF-8; only byte inequality is known.
    pub binary: bool,
}

impl ScriptDiff {
    /// Returns `true` if the two scripts are byte-identical.
    pub fn is_empty(&self) -> bool {
        self.additions == 0 && self.deletions == 0 && !self.binary
    }

    /// One-line description, e.g. `+3 -1 lines`.
    pub fn describe(&self) -> String {
        if self.binary {
            "binary content changed".to_string()
        } else {
            format!("+{} -{} lines", self.additions, self.deletions)
        }
    }
}

/// Compare two scripts line by line. A missing script compares as empty.
pub fn diff_scripts(old: Option<&[u8]>, new: Option<&[u8]>) -> ScriptDiff {
    let old = old.unwrap_or_default();
    let new = new.unwrap_or_default();
    if old == new {
        let lines = String::from_utf8_lossy(old).lines().count();
        return ScriptDiff {
            old_lines: lines,
            new_lines: lines,
            ..ScriptDiff::default()
        };
    }

    let (Ok(old_str), Ok(new_str)) = (std::str::from_utf8(old), std::str::from_utf8(new)) else {
        return ScriptDiff {
            binary: true,
            ..ScriptDiff::default()
        };
    };

    let mut diff = ScriptDiff {
        old_lines: old_str.lines().count(),
        new_lines: new_str.lines().count(),
        ..ScriptDiff::default()
    };
    for change in TextDiff::from_lines(old_str, new_str).iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => diff.additions += 1,
            ChangeTag::Delete => diff.deletions += 1,
            ChangeTag::Equal => {}
        }
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_scripts_no_diff() {
        let content = b"select *\nfrom a\n";
        let diff = diff_scripts(Some(content), Some(content));
        assert!(diff.is_empty());
        assert_eq!(diff.old_lines, 2);
    }

    #[test]
    fn both_missing_is_empty() {
        assert!(diff_scripts(None, None).is_empty());
    }

    #[test]
    fn modification_shows_remove_and_add() {
        let diff = diff_scripts(Some(b"hello world\n"), Some(b"hello universe\n"));
        assert_eq!(diff.additions, 1);
        assert_eq!(diff.deletions, 1);
        assert_eq!(diff.describe(), "+1 -1 lines");
    }

    #[test]
    fn new_script_is_all_additions() {
        let diff = diff_scripts(None, Some(b"a\nb\nc\n"));
        assert_eq!(diff.additions, 3);
        assert_eq!(diff.deletions, 0);
        assert_eq!(diff.new_lines, 3);
    }

    #[test]
    fn binary_scripts_only_report_inequality() {
        let diff = diff_scripts(Some(&[0, 0xFF, 0xFE]), Some(&[1, 0xFF]));
        assert!(diff.binary);
        assert!(!diff.is_empty());
        assert_eq!(diff.describe(), "binary content changed");
    }
}
