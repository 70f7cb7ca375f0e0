/// Deterministic greedy word wrap.
///
/// Splits on whitespace and packs words into lines of at most `width`
/// characters; a single word longer than `width` is broken at the width
/// boundary. The same (text, width) input always yields the same lines, which
/// the caption-offset lookup downstream depends on.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    assert!(width > 0, "wrap width must be > 0");

    let mut lines = Vec::new();
    let mut line = String::new();

    let mut push_word = |lines: &mut Vec<String>, line: &mut String, word: &str| {
        let sep = if line.is_empty() { 0 } else { 1 };
        if line.chars().count() + sep + word.chars().count() <= width {
            if sep == 1 {
                line.push(' ');
            }
            line.push_str(word);
            return;
        }
        if !line.is_empty() {
            lines.push(std::mem::take(line));
        }
        // Break words that cannot fit on a line of their own.
        let mut rest: Vec<char> = word.chars().collect();
        while rest.len() > width {
            lines.push(rest.drain(..width).collect());
        }
        *line = rest.into_iter().collect();
    };

    for word in text.split_whitespace() {
        push_word(&mut lines, &mut line, word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Wrap and join with newlines, the form held in snapshot slots.
pub fn wrap_label(text: &str, width: usize) -> String {
    wrap(text, width).join("\n")
}

/// Number of lines in an already wrapped label. Empty labels count as one
/// line, matching the offset-table lookup convention.
pub fn line_count(label: &str) -> usize {
    label.matches('\n').count() + 1
}
