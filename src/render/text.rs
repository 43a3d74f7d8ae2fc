//! Text normalization applied before emission.

use super::RenderOptions;
use unicode_normalization::UnicodeNormalization;

/// Normalize extracted text: NFKC, replacement characters, stray control
/// characters.
pub fn normalize_text(text: &str, options: &RenderOptions) -> String {
    let text: String = if options.normalize_unicode {
        text.nfkc().collect()
    } else {
        text.to_string()
    };
    text.chars()
        .filter(|&c| !(options.remove_replacement_char && c == '\u{FFFD}'))
        .filter(|&c| !c.is_control() || c == '\n' || c == '\t')
        .map(|c| if c == '\t' { ' ' } else { c })
        .collect()
}

/// Escape characters that would otherwise form inline Markdown syntax.
///
/// Emphasis and code delimiters are escaped only when at least two of them
/// could pair up; an intraword `_` or a `*` between spaces never opens
/// emphasis. Brackets are escaped when a `[` precedes a `]`.
pub fn escape_markdown(text: &str) -> String {
    escape_inline(text, false)
}

/// Like [`escape_markdown`], plus the `|` column separator.
pub fn escape_table_cell(text: &str) -> String {
    escape_inline(text, true)
}

/// Escape a block marker at the start of a line so body text never turns
/// into a heading, quote, list item or rule.
pub fn escape_line_start(text: &str) -> String {
    let body = text.trim_start();
    let indent = &text[..text.len() - body.len()];
    let mut chars = body.chars();
    let Some(first) = chars.next() else {
        return text.to_string();
    };
    let rest = chars.as_str();
    let ends_marker = |r: &str| r.is_empty() || r.starts_with(char::is_whitespace);

    let escape_at = match first {
        '#' | '>' => Some(0),
        '-' | '+' | '*' if ends_marker(rest) || body.chars().all(|c| c == first) => Some(0),
        '=' if body.chars().all(|c| c == '=') => Some(0),
        c if c.is_ascii_digit() => {
            let digits = body.bytes().take_while(u8::is_ascii_digit).count();
            let after = &body[digits..];
            (digits <= 9 && (after.starts_with('.') || after.starts_with(')'))
                && ends_marker(&after[1..]))
            .then_some(digits)
        }
        _ => None,
    };
    match escape_at {
        Some(at) => format!("{}{}\\{}", indent, &body[..at], &body[at..]),
        None => text.to_string(),
    }
}

fn escape_inline(text: &str, table_cell: bool) -> String {
    let chars: Vec<char> = text.chars().collect();
    let can_delimit = |i: usize| -> bool {
        let before = i.checked_sub(1).and_then(|j| chars.get(j)).copied();
        let after = chars.get(i + 1).copied();
        let space = |c: Option<char>| c.map_or(true, char::is_whitespace);
        let word = |c: Option<char>| c.is_some_and(char::is_alphanumeric);
        match chars[i] {
            '*' => !(space(before) && space(after)),
            '_' => !(space(before) && space(after)) && !(word(before) && word(after)),
            _ => true,
        }
    };
    let count = |target: char| {
        (0..chars.len())
            .filter(|&i| chars[i] == target && can_delimit(i))
            .count()
    };
    let stars = count('*') >= 2;
    let underscores = count('_') >= 2;
    let backticks = count('`') >= 2;
    let brackets = match (text.find('['), text.rfind(']')) {
        (Some(open), Some(close)) => open < close,
        _ => false,
    };

    let mut result = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        let escape = match c {
            '\\' => chars.get(i + 1).is_some_and(char::is_ascii_punctuation),
            '*' => stars && can_delimit(i),
            '_' => underscores && can_delimit(i),
            '`' => backticks,
            '[' | ']' => brackets,
            '|' => table_cell,
            _ => false,
        };
        if escape {
            result.push('\\');
        }
        result.push(c);
    }
    result
}
