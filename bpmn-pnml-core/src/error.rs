//! Error taxonomy of the transformer.
//!
//! Two categories: known, user-facing errors carrying a stable numeric id,
//! and internal invariant violations whose details are logged but never
//! shown to users.

use thiserror::Error;

pub const ISSUE_URL: &str = "https://github.com/woped/bpmn-pnml-transformer/issues";

/// All failures the transformation pipeline can surface.
///
/// The `Display` impl renders the user-facing diagnostic; [`TransformError::id`]
/// yields the numeric id the dispatcher puts into its JSON error body.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("BPMN element {0} not supported.")]
    NotSupportedBpmnElement(String),

    #[error("Env variable {0} not set!")]
    MissingEnvironmentVariable(String),

    #[error("Token check not successful")]
    TokenCheckUnsuccessful,

    #[error("Query parameter {0} wrong.")]
    UnexpectedQueryParameter(String),

    #[error("Please name all of your lanes.")]
    UnnamedLane,

    #[error("Wrong intermediate event type used!")]
    UnknownIntermediateCatchEvent,

    #[error("Subprocess must have exactly one in and outgoing flow!")]
    WrongSubprocessDegree,

    #[error("Could not find matching splits and joins for OR-Gateways")]
    OrGatewayDetectionIssue,

    #[error(
        "Currently, source/sink in subprocess must have no incoming/outgoing arcs \
         to convert to BPMN Start and End events."
    )]
    SubprocessWrongInnerSourceSinkDegree,

    #[error("Resources must belong to the same organization.")]
    UnknownResourceOrganizationMapping,

    #[error("Seems like the input XML content is unsupported.")]
    InvalidInputXml,

    #[error("No request tokens available. Please try again later.")]
    NoRequestTokensAvailable,

    /// Invariant violation inside the engine. The message is for the logs;
    /// user-facing text stays generic (see [`TransformError::public_text`]).
    #[error("internal transformation error: {0}")]
    Internal(String),
}

impl TransformError {
    /// Stable numeric id of a known error; `None` for internal errors.
    pub fn id(&self) -> Option<u16> {
        use TransformError::*;
        match self {
            NotSupportedBpmnElement(_) => Some(1),
            MissingEnvironmentVariable(_) => Some(2),
            TokenCheckUnsuccessful => Some(3),
            UnexpectedQueryParameter(_) => Some(4),
            UnnamedLane => Some(5),
            UnknownIntermediateCatchEvent => Some(6),
            WrongSubprocessDegree => Some(7),
            OrGatewayDetectionIssue => Some(8),
            SubprocessWrongInnerSourceSinkDegree => Some(9),
            UnknownResourceOrganizationMapping => Some(10),
            InvalidInputXml => Some(11),
            NoRequestTokensAvailable => Some(14),
            Internal(_) => None,
        }
    }

    /// The text shown to API consumers. Known errors expose their
    /// description plus the issue-tracker hint; internal errors only the
    /// generic hint.
    pub fn public_text(&self) -> String {
        let hint = format!(
            "Please open an issue at {ISSUE_URL} with your diagram if you need further assistance."
        );
        match self.id() {
            Some(id) => format!("[{id}] Error description: {self}\n{hint}"),
            None => format!("We encountered an unknown issue.\n{hint}"),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        TransformError::Internal(msg.into())
    }
}

/// Shorthand used throughout the crate.
pub type Result<T> = std::result::Result<T, TransformError>;
