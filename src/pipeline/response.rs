//! Response bodies.

use std::fmt::Write as _;

/// Body of the secondary endpoint.
pub const ACKNOWLEDGEMENT: &str = "another handler";

/// Escape the five HTML-significant characters.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Double-quote `s`, escaping backslashes, quotes and control characters.
///
/// Control characters use `\xNN` below 0x80 and `\uNNNN` above it.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x07' => out.push_str("\\a"),
            '\x08' => out.push_str("\\b"),
            '\x0b' => out.push_str("\\v"),
            '\x0c' => out.push_str("\\f"),
            c if c.is_control() && (c as u32) < 0x80 => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Greeting body for the primary endpoint.
pub fn greeting(name: &str, too_short: bool) -> String {
    let quoted = quote(&escape_html(name));
    if too_short {
        format!("Hello, {}! your name is too short", quoted)
    } else {
        format!("Hello, {}", quoted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&#34;Tom&#34; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_greeting() {
        assert_eq!(greeting("Al", false), "Hello, \"Al\"");
        assert_eq!(greeting("A", true), "Hello, \"A\"! your name is too short");
        assert_eq!(greeting("<x>", false), "Hello, \"&lt;x&gt;\"");
        assert_eq!(greeting("a\\b\n", false), "Hello, \"a\\\\b\\n\"");
    }

    #[test]
    fn test_control_characters_are_hex_escaped() {
        assert_eq!(greeting("a\u{1}b", false), "Hello, \"a\\x01b\"");
        assert_eq!(greeting("\u{7f}", false), "Hello, \"\\x7f\"");
        assert_eq!(greeting("\u{85}", false), "Hello, \"\\u0085\"");
        assert_eq!(greeting("\u{7}\u{8}\u{b}\u{c}", false), "Hello, \"\\a\\b\\v\\f\"");
        assert_eq!(greeting("h\u{e9}", false), "Hello, \"h\u{e9}\"");
    }
}
