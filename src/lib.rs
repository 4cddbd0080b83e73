pub mod choose;
pub mod config;
pub mod emit;
pub mod error;
pub mod group;
pub mod path;
pub mod source;
pub mod value;

use group::{Entry, GroupSet};

pub use config::Config;
pub use error::ScriptError;
pub use source::PathValue;

// ── Core API ───────────────────────────────────────────────────────

/// Build entries from the parser's (path, value) pairs, run the predicate
/// chooser, and render the complete `set` script.
///
/// The pairs must arrive in document order: the chooser's `count()=0`
/// disjuncts are placed relative to the record that discharges them, and
/// null anchors are suppressed by looking at the following entry.
pub fn generate_script(pairs: Vec<PathValue>, cfg: &Config) -> String {
    let mut entries: Vec<Entry> = pairs
        .into_iter()
        .map(|pv| Entry::new(pv.path, pv.value, cfg))
        .collect();
    let mut groups = GroupSet::build(&mut entries, cfg);
    choose::choose_all(&mut groups, cfg);
    let mut out = Vec::new();
    emit::write_script(&mut out, &entries, &mut groups, cfg)
        .expect("writing to an in-memory buffer cannot fail");
    String::from_utf8(out).expect("script output is UTF-8")
}
