/// Pick the quote character for `value`: single quotes unless the value
/// contains one, double quotes unless it also contains one of those, and
/// back to single quotes (with escaping) when both appear.
fn pick_quote(value: &str) -> char {
    let has_q = value.contains('\'');
    let has_qq = value.contains('"');
    if !has_q {
        '\''
    } else if !has_qq {
        '"'
    } else {
        '\''
    }
}

/// Render a value as a shell-style quoted literal. Quoting is not strictly
/// required for the value argument of `set`, but it is required for values
/// inside path expressions, so every value is quoted.
pub fn quote_value(value: &str) -> String {
    let quote = pick_quote(value);
    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for c in value.chars() {
        if c == quote {
            out.push('\\');
            out.push(quote);
        } else if c == '\n' {
            out.push_str("\\n");
        } else if c == '\t' {
            out.push_str("\\t");
        } else if c == '\\' {
            out.push_str("\\\\");
        } else {
            out.push(c);
        }
    }
    out.push(quote);
    out
}

/// Render a value as a quoted regexp body, escaped for the parser's regexp
/// dialect and truncated to roughly `max_len` bytes. `\` and `]` become
/// `.` (the parser cannot represent them portably inside a quoted regexp),
/// `[` is escaped once, and the remaining metacharacters get a doubled
/// backslash so the dialect sees a single one. A trailing `.*` marks the
/// truncation, but only when at least three more bytes of value remain.
pub fn regexp_value(value: &str, max_len: usize) -> String {
    let quote = pick_quote(value);
    let bytes = value.as_bytes();
    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for (idx, c) in value.char_indices() {
        if c == quote {
            out.push('\\');
            out.push(quote);
            continue;
        }
        match c {
            '\n' => {
                out.push_str("\\n");
                continue;
            }
            '\t' => {
                out.push_str("\\t");
                continue;
            }
            '\\' | ']' => {
                out.push('.');
                continue;
            }
            '[' => out.push('\\'),
            '*' | '?' | '.' | '(' | ')' | '^' | '$' | '|' => out.push_str("\\\\"),
            _ => {}
        }
        out.push(c);
        if idx >= max_len && bytes.len() - (idx + c.len_utf8()) >= 3 {
            out.push_str(".*");
            break;
        }
    }
    out.push(quote);
    out
}

/// Compare two nullable values, reporting the number of leading bytes in
/// common. Under regexp mode `]` compares as matching any character: regex
/// bodies rewrite `]` to `.`, so for the common-prefix widths computed from
/// this function a `]` can never disambiguate.
pub fn values_match(
    v1: Option<&str>,
    v2: Option<&str>,
    regexp: bool,
) -> (bool, usize) {
    let (s1, s2) = match (v1, v2) {
        (None, None) => return (true, 0),
        (Some(s1), Some(s2)) => (s1.as_bytes(), s2.as_bytes()),
        _ => return (false, 0),
    };
    let mut matched = 0;
    if regexp {
        while matched < s1.len() || matched < s2.len() {
            if matched >= s1.len() || matched >= s2.len() {
                return (false, matched);
            }
            let (b1, b2) = (s1[matched], s2[matched]);
            if b1 != b2 && b1 != b']' && b2 != b']' {
                return (false, matched);
            }
            matched += 1;
        }
        (true, matched)
    } else {
        while matched < s1.len() && matched < s2.len() && s1[matched] == s2[matched] {
            matched += 1;
        }
        (matched == s1.len() && matched == s2.len(), matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_prefers_single_quotes() {
        assert_eq!(quote_value("localnet"), "'localnet'");
        assert_eq!(quote_value(""), "''");
        assert_eq!(quote_value("with space"), "'with space'");
    }

    #[test]
    fn quote_switches_to_double_quotes_on_single_quote() {
        assert_eq!(quote_value("it's"), "\"it's\"");
    }

    #[test]
    fn quote_with_both_quotes_escapes_the_single() {
        // Never double-quoted when both kinds appear.
        assert_eq!(quote_value("a'b\"c"), "'a\\'b\"c'");
    }

    #[test]
    fn quote_escapes_control_characters() {
        assert_eq!(quote_value("a\nb"), "'a\\nb'");
        assert_eq!(quote_value("a\tb"), "'a\\tb'");
        assert_eq!(quote_value("a\\b"), "'a\\\\b'");
    }

    #[test]
    fn regexp_escapes_metacharacters() {
        assert_eq!(regexp_value("a.b", 8), "'a\\\\.b'");
        assert_eq!(regexp_value("a*b?", 8), "'a\\\\*b\\\\?'");
        assert_eq!(regexp_value("a[b]", 8), "'a\\[b.'");
        assert_eq!(regexp_value("a\\b", 8), "'a.b'");
        assert_eq!(regexp_value("(x)", 8), "'\\\\(x\\\\)'");
    }

    #[test]
    fn regexp_truncates_with_trailing_wildcard() {
        // Index 8 is the ninth byte; at least three more must remain for
        // the truncation to trigger.
        assert_eq!(regexp_value("abcdefghijklmnop", 8), "'abcdefghi.*'");
        // Only two bytes after the cut: emitted whole.
        assert_eq!(regexp_value("abcdefghijk", 8), "'abcdefghijk'");
        assert_eq!(regexp_value("short", 8), "'short'");
    }

    #[test]
    fn values_match_reports_common_prefix() {
        assert_eq!(
            values_match(Some("server1.x"), Some("server2.x"), false),
            (false, 6)
        );
        assert_eq!(values_match(Some("same"), Some("same"), false), (true, 4));
        assert_eq!(values_match(Some("ab"), Some("abc"), false), (false, 2));
        assert_eq!(values_match(None, None, false), (true, 0));
        assert_eq!(values_match(Some("x"), None, false), (false, 0));
    }

    #[test]
    fn values_match_treats_bracket_as_wildcard_under_regexp() {
        assert_eq!(values_match(Some("a]c"), Some("abc"), true), (true, 3));
        assert_eq!(values_match(Some("a]c"), Some("abc"), false), (false, 1));
        assert_eq!(values_match(Some("ab"), Some("abc"), true), (false, 2));
    }
}
