use std::path::PathBuf;

/// Failures surfaced by ingest and the parser-tool boundary.
///
/// The predicate chooser itself does not fail: internal inconsistencies are
/// reported as diagnostics and the emitter degrades to `[*]` for the
/// offending segment.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// `--target` must be an absolute path so the renamed tree stays under
    /// `/files`.
    #[error("target \"{0}\" must be an absolute path, eg. --target=/etc/{0}")]
    TargetNotAbsolute(String),

    /// Lens inference found nothing that includes the target file.
    #[error("no lens applies for target: {0}")]
    NoLensApplies(String),

    /// The parser tool rejected the transform or the file.
    #[error("failed to load file {path}: {detail}")]
    LoadFailed {
        path: PathBuf,
        detail: String,
    },

    /// The parser tool could not be spawned or exited abnormally.
    #[error("augtool: {0}")]
    Tool(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
