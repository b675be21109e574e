use thiserror::Error;

/// Failures surfaced by the render pipeline and its collaborators.
///
/// Dispatch problems (missing node, missing method) are not errors: they are
/// logged and reported through sentinel return values instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A directive template or one of its expressions failed to parse or
    /// evaluate. Fatal to the current render pass.
    #[error("template error: {0}")]
    Template(String),

    /// The compiled markup could not be parsed into an output tree.
    #[error("markup error: {0}")]
    Markup(String),

    /// A write the trackable container cannot express.
    #[error("state error: {0}")]
    State(String),

    /// A component definition could not be read or lacks a template block.
    #[error("loader error: {0}")]
    Loader(String),
}

impl Error {
    pub(crate) fn template(message: impl Into<String>) -> Self {
        Error::Template(message.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
