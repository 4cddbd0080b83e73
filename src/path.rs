use crate::config::Config;
use crate::group::GroupId;

/// One slice of an absolute path, produced by `split_path`. A segment ends
/// at a positional selector; the final segment of a path that does not end
/// in a selector carries no position and never joins a group.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Absolute prefix of the path up to and including the label that
    /// carries the position. Two segments with byte-identical heads belong
    /// to the same group.
    pub head: String,
    /// Byte offset into `head` where this segment's own slice begins (the
    /// part after the previous selector), used verbatim at emission.
    pub start: usize,
    /// The integer inside `[n]`, or between two `/`; `None` for the
    /// trailing piece after the last selector.
    pub position: Option<usize>,
    /// The remainder of the path with every embedded selector rewritten:
    /// `[n]` removed, `/n` replaced by the seq wildcard.
    pub simple_tail: String,
    /// Filled in by grouping; `None` iff `position` is `None`.
    pub group: Option<GroupId>,
}

impl Segment {
    /// The slice of the path this segment contributes to the output.
    pub fn text(&self) -> &str {
        &self.head[self.start..]
    }

    /// True when the segment came from the `/n` sequential form (the slice
    /// ends at the `/` that preceded the number).
    pub fn is_seq_form(&self) -> bool {
        self.head.ends_with('/')
    }
}

/// A positional selector located by `next_position`.
struct Marker {
    /// Byte offset where the head stops: at `[` for the bracketed form,
    /// just after the `/` for the sequential form.
    head_end: usize,
    position: usize,
    /// Byte offset where the remainder of the path begins: after `]`, or
    /// at the `/` (or end) that terminated the number.
    resume: usize,
}

/// Scan `path` from byte offset `from` for the next positional selector.
/// Two forms are recognised: `[n]` with decimal digits terminated by `]`,
/// and `/n` with decimal digits terminated by `/` or end-of-string. `[0]`
/// is a valid position; `[x]` with non-decimal content belongs to the
/// label.
fn next_position(path: &str, from: usize) -> Option<Marker> {
    let bytes = path.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b'[' && i + 1 < bytes.len() && bytes[i + 1].is_ascii_digit() {
            let (position, end) = scan_digits(bytes, i + 1);
            if end < bytes.len() && bytes[end] == b']' {
                return Some(Marker {
                    head_end: i,
                    position,
                    resume: end + 1,
                });
            }
        } else if bytes[i] == b'/' && i + 1 < bytes.len() && bytes[i + 1].is_ascii_digit() {
            let (position, end) = scan_digits(bytes, i + 1);
            if end == bytes.len() || bytes[end] == b'/' {
                return Some(Marker {
                    head_end: i + 1,
                    position,
                    resume: end,
                });
            }
        }
        i += 1;
    }
    None
}

fn scan_digits(bytes: &[u8], from: usize) -> (usize, usize) {
    let mut value = 0usize;
    let mut i = from;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        value = value.saturating_mul(10) + (bytes[i] - b'0') as usize;
        i += 1;
    }
    (value, i)
}

/// Rewrite a raw tail so that positions no longer appear: `[n]` is
/// removed, `/n` becomes `/seq::*` (or `/*` under `noseq`).
fn simplified_tail(tail: &str, cfg: &Config) -> String {
    let bytes = tail.as_bytes();
    let mut out = String::with_capacity(tail.len());
    let mut i = 0;
    let mut copied = 0;
    while i < bytes.len() {
        if bytes[i] == b'[' && i + 1 < bytes.len() && bytes[i + 1].is_ascii_digit() {
            let (_, end) = scan_digits(bytes, i + 1);
            if end < bytes.len() && bytes[end] == b']' {
                out.push_str(&tail[copied..i]);
                i = end + 1;
                copied = i;
                continue;
            }
        } else if bytes[i] == b'/' && i + 1 < bytes.len() && bytes[i + 1].is_ascii_digit() {
            let (_, end) = scan_digits(bytes, i + 1);
            if end == bytes.len() || bytes[end] == b'/' {
                out.push_str(&tail[copied..i]);
                out.push('/');
                out.push_str(cfg.seq_wildcard());
                i = end;
                copied = i;
                continue;
            }
        }
        i += 1;
    }
    out.push_str(&tail[copied..]);
    out
}

/// Break an absolute path into its chain of segments. A path ending in a
/// selector yields no trailing position-less segment.
pub fn split_path(path: &str, cfg: &Config) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut seg_start = 0;
    while seg_start < path.len() {
        match next_position(path, seg_start) {
            Some(marker) => {
                segments.push(Segment {
                    head: path[..marker.head_end].to_string(),
                    start: seg_start,
                    position: Some(marker.position),
                    simple_tail: simplified_tail(&path[marker.resume..], cfg),
                    group: None,
                });
                seg_start = marker.resume;
            }
            None => {
                segments.push(Segment {
                    head: path.to_string(),
                    start: seg_start,
                    position: None,
                    simple_tail: String::new(),
                    group: None,
                });
                break;
            }
        }
    }
    segments
}

/// True when `child` is strictly below `parent`: `parent` is a byte prefix
/// and the next character of `child` is `/`.
pub fn is_child_path(parent: &str, child: &str) -> bool {
    child.len() > parent.len()
        && child.starts_with(parent)
        && child.as_bytes()[parent.len()] == b'/'
}

/// Render a simplified tail as a predicate operand: `/path` becomes
/// `path`, the empty tail (a path ending at the selector) becomes `.`.
pub fn tail_expr(simple_tail: &str) -> &str {
    if let Some(rest) = simple_tail.strip_prefix('/') {
        rest
    } else if simple_tail.is_empty() {
        "."
    } else {
        simple_tail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_two_bracket_markers() {
        let cfg = Config::default();
        let segs = split_path("/head/label_a[123]/middle/label_b[456]/tail", &cfg);
        assert_eq!(segs.len(), 3);

        assert_eq!(segs[0].head, "/head/label_a");
        assert_eq!(segs[0].text(), "/head/label_a");
        assert_eq!(segs[0].position, Some(123));
        assert_eq!(segs[0].simple_tail, "/middle/label_b/tail");

        assert_eq!(segs[1].head, "/head/label_a[123]/middle/label_b");
        assert_eq!(segs[1].text(), "/middle/label_b");
        assert_eq!(segs[1].position, Some(456));
        assert_eq!(segs[1].simple_tail, "/tail");

        assert_eq!(segs[2].text(), "/tail");
        assert_eq!(segs[2].position, None);
        assert_eq!(segs[2].simple_tail, "");
    }

    #[test]
    fn split_sequential_marker() {
        let cfg = Config::default();
        let segs = split_path("/files/etc/hosts/1/ipaddr", &cfg);
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].head, "/files/etc/hosts/");
        assert!(segs[0].is_seq_form());
        assert_eq!(segs[0].position, Some(1));
        assert_eq!(segs[0].simple_tail, "/ipaddr");
        assert_eq!(segs[1].text(), "/ipaddr");
        assert_eq!(segs[1].position, None);
    }

    #[test]
    fn path_ending_in_marker_has_no_trailing_segment() {
        let cfg = Config::default();
        let segs = split_path("/files/etc/motd/7", &cfg);
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].position, Some(7));
        assert_eq!(segs[0].simple_tail, "");

        let segs = split_path("/head/label[3]", &cfg);
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].head, "/head/label");
        assert_eq!(segs[0].position, Some(3));
    }

    #[test]
    fn marker_forms_and_terminators() {
        // `[n]` stops the head at the bracket; `/n` keeps the slash.
        let m = next_position("/a/b[12]/c", 0).expect("marker");
        assert_eq!((m.head_end, m.position, m.resume), (4, 12, 8));
        let m = next_position("/a/7/c", 0).expect("marker");
        assert_eq!((m.head_end, m.position, m.resume), (3, 7, 4));
        // End-of-string terminates the sequential form.
        let m = next_position("/a/7", 0).expect("marker");
        assert_eq!((m.head_end, m.position, m.resume), (3, 7, 4));
        assert!(next_position("/a/b/c", 0).is_none());
    }

    #[test]
    fn zero_is_a_valid_position() {
        let cfg = Config::default();
        let segs = split_path("/head/label[0]/x", &cfg);
        assert_eq!(segs[0].position, Some(0));
    }

    #[test]
    fn non_decimal_brackets_belong_to_the_label() {
        let cfg = Config::default();
        let segs = split_path("/head/label[x]/y", &cfg);
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].position, None);
        assert_eq!(segs[0].text(), "/head/label[x]/y");

        // Digits not terminated by `]` are not a marker either.
        let segs = split_path("/head/label[12x]/y", &cfg);
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].position, None);
    }

    #[test]
    fn simplified_tail_rewrites_embedded_markers() {
        let cfg = Config::default();
        assert_eq!(
            simplified_tail("/middle/7/label_b[456]/tail", &cfg),
            "/middle/seq::*/label_b/tail"
        );
        let noseq = Config {
            noseq: true,
            ..Config::default()
        };
        assert_eq!(
            simplified_tail("/middle/7/label_b[456]/tail", &noseq),
            "/middle/*/label_b/tail"
        );
    }

    #[test]
    fn child_path_requires_a_slash_boundary() {
        assert!(is_child_path("/a/b", "/a/b/c"));
        assert!(!is_child_path("/a/b", "/a/bc"));
        assert!(!is_child_path("/a/b", "/a/b"));
        assert!(!is_child_path("/a/b[1]", "/a/b[2]"));
        assert!(is_child_path("", "/x"));
    }

    #[test]
    fn tail_expr_forms() {
        assert_eq!(tail_expr("/setting"), "setting");
        assert_eq!(tail_expr("/a/b"), "a/b");
        assert_eq!(tail_expr(""), ".");
    }
}
