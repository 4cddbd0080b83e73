/// Options observed by the pipeline, threaded explicitly through every
/// stage rather than held in process-wide state.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Pad predicate values to a per-tail column width and separate
    /// position blocks with blank lines.
    pub pretty: bool,
    /// When set, render predicate values as `=~regexp('...')` with bodies
    /// truncated to at least this many characters.
    pub regexp: Option<usize>,
    /// Render `/n/` positions as `/*/` instead of `/seq::*/`.
    pub noseq: bool,
    /// Prefix the script with `#` comment lines echoing the raw pairs.
    pub verbose: bool,
}

impl Config {
    pub fn regexp_enabled(&self) -> bool {
        self.regexp.is_some()
    }

    /// Minimum regexp body length; 0 when regexp mode is off.
    pub fn regexp_min_len(&self) -> usize {
        self.regexp.unwrap_or(0)
    }

    /// The wildcard used for sequential positions.
    pub fn seq_wildcard(&self) -> &'static str {
        if self.noseq {
            "*"
        } else {
            "seq::*"
        }
    }
}
