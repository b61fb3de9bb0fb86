//! Whitespace-preferring splitting of over-limit lines.

/// Byte offset one past the character at index `n`, or the string length.
fn byte_offset_of_char(text: &str, n: usize) -> usize {
    text.char_indices()
        .nth(n)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}

/// Splits a single line that exceeds `limit` characters into fragments of at
/// most `limit` characters each.
///
/// Split points are chosen so each fragment stays within the limit,
/// preferring the last line break, then the last other whitespace, then a
/// hard cut at the limit. The separator character is consumed at whitespace
/// splits. Limits are measured in characters, not bytes, so multi-byte text
/// never splits inside a character.
pub fn split_long_line(text: &str, limit: usize) -> Vec<String> {
    if limit == 0 {
        return vec![text.to_string()];
    }

    let mut fragments = Vec::new();
    let mut rest = text;
    loop {
        if rest.chars().count() <= limit {
            if !rest.is_empty() {
                fragments.push(rest.to_string());
            }
            break;
        }

        // A separator at character index `limit` still yields a fragment of
        // exactly `limit` characters, so the search window is one wider than
        // the hard-cut window.
        let search = &rest[..byte_offset_of_char(rest, limit + 1)];
        let split_at = search
            .rfind('\n')
            .or_else(|| search.rfind(|c: char| c.is_whitespace()));

        match split_at {
            Some(at) => {
                let fragment = &rest[..at];
                if !fragment.is_empty() {
                    fragments.push(fragment.to_string());
                }
                let sep_len = rest[at..]
                    .chars()
                    .next()
                    .map(char::len_utf8)
                    .unwrap_or(1);
                rest = &rest[at + sep_len..];
            }
            None => {
                let hard_end = byte_offset_of_char(rest, limit);
                fragments.push(rest[..hard_end].to_string());
                rest = &rest[hard_end..];
            }
        }
    }

    if fragments.is_empty() {
        fragments.push(String::new());
    }
    fragments
}
