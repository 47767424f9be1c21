use crate::geometry::FragmentId;
use crate::modes::ModeKind;
use thiserror::Error;

/// Failures surfaced by the mode lifecycle. None of these ever escape into the frame loop;
/// the manager logs them and hands them back so callers can inspect what happened.
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("unknown mode '{0}'")]
    UnknownMode(String),

    #[error("{mode} mode failed to initialize: {source:#}")]
    ModeInitialization {
        mode: ModeKind,
        #[source]
        source: anyhow::Error,
    },

    #[error("{mode} mode update failed: {message}")]
    ModeUpdate { mode: ModeKind, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SectionError {
    #[error("section manager has been disposed")]
    Disposed,

    #[error("model geometry bindings are missing")]
    MissingBindings,

    #[error("fragment '{fragment}' cannot be sectioned: {reason}")]
    MalformedMesh { fragment: FragmentId, reason: String },
}
