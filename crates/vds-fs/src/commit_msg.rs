//! Commit title and message normalization.

use vds_dataset::MAX_TITLE_LEN;

/// Marks where a title was cut, at the end of the title and the start of
/// the carried-over text.
pub const ELLIPSIS: &str = "...";

/// Cut position, in characters, for an overlong title with no space to
/// break at.
const HARD_CUT: usize = MAX_TITLE_LEN - 4;

fn byte_offset(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map_or(s.len(), |(i, _)| i)
}

/// `head`, then `tail` on the following line. Empty parts are dropped.
fn stack(head: &str, tail: &str) -> String {
    match (head.is_empty(), tail.is_empty()) {
        (_, true) => head.to_string(),
        (true, false) => tail.to_string(),
        (false, false) => format!("{head}\n{tail}"),
    }
}

/// Normalize a commit title and message.
///
/// An empty title is replaced by `description`, or by the message when
/// the description is empty too. The title is then cut to a single line
/// of at most [`MAX_TITLE_LEN`] characters:
///
/// - anything after the first line break moves to the top of the message
/// - an overlong title is cut after the last space among its first 67
///   characters (after character 66 when there is none), ends in
///   [`ELLIPSIS`], and the remainder, prefixed with [`ELLIPSIS`], moves to
///   the top of the message
///
/// Leading and trailing whitespace is trimmed from the title, and from the
/// description or message standing in for it. A word-break cut drops the
/// space it breaks at. Beyond that nothing is dropped: the title and
/// message together hold all the original text.
pub fn clean_title_and_message(title: &mut String, message: &mut String, description: &str) {
    let mut t = title.trim().to_string();
    let mut m = std::mem::take(message);
    if t.is_empty() {
        if description.trim().is_empty() {
            t = m.trim().to_string();
            m.clear();
        } else {
            t = description.trim().to_string();
        }
    }

    if let Some(newline) = t.find('\n') {
        let rest = t[newline + 1..].to_string();
        t.truncate(newline);
        t.truncate(t.trim_end().len());
        m = stack(&rest, &m);
    }

    if t.chars().count() > MAX_TITLE_LEN {
        let window = &t[..byte_offset(&t, HARD_CUT + 1)];
        let cut = match window.rfind(' ') {
            Some(space) if space > 0 => space + 1,
            _ => byte_offset(&t, HARD_CUT),
        };
        let rest = format!("{ELLIPSIS}{}", &t[cut..]);
        t = format!("{}{ELLIPSIS}", t[..cut].trim_end());
        m = stack(&rest, &m);
    }

    *title = t;
    *message = m;
}
