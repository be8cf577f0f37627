//! Error types for subscription management and the pub/sub transport.

use std::any::Any;

use graphsub_lang::{LangError, ValidationError};
use thiserror::Error;

use crate::subscription::SubscriptionId;
use crate::transport::RegistrationId;

/// Boxed error returned by user-supplied filters and context factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias for fallible manager and transport calls.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by [`SubscriptionManager`](crate::SubscriptionManager)
/// and [`PubSub`](crate::PubSub).
#[derive(Debug, Error)]
pub enum Error {
    /// The query text did not parse.
    #[error("{0}")]
    Parse(LangError),

    /// The document failed validation; carries every error the engine reported.
    #[error("{}", format_validation(.errors))]
    Validation { errors: Vec<ValidationError> },

    /// The document has no operation with a root field.
    #[error("document does not contain a subscription root field")]
    MissingOperation,

    /// An argument on the root field has no matching declaration.
    #[error("unknown argument '{argument}' on subscription field '{field}'")]
    UnknownArgument { field: String, argument: String },

    /// An argument value could not be resolved against its declared type.
    #[error("could not resolve argument '{argument}': {source}")]
    ArgumentResolution {
        argument: String,
        #[source]
        source: LangError,
    },

    /// No external subscription with this id.
    #[error("subscription {0} not found")]
    UnknownSubscription(SubscriptionId),

    /// No transport registration with this id.
    #[error("registration {0} not found")]
    UnknownRegistration(RegistrationId),

    /// Channel names must be non-empty and free of NUL bytes.
    #[error("invalid channel name {0:?}")]
    InvalidChannel(String),

    /// Channel backend failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Message encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl Error {
    /// True for errors raised because a caller passed an id that does not exist.
    pub fn is_unknown_id(&self) -> bool {
        matches!(
            self,
            Error::UnknownSubscription(_) | Error::UnknownRegistration(_)
        )
    }
}

fn format_validation(errors: &[ValidationError]) -> String {
    let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
    format!("validation failed: {}", messages.join("; "))
}

/// Stage of the per-message pipeline an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolveContext,
    Filter,
    Execute,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::ResolveContext => write!(f, "context resolution"),
            Stage::Filter => write!(f, "filter"),
            Stage::Execute => write!(f, "execution"),
        }
    }
}

/// Failure inside the per-message pipeline. Delivered to the subscription
/// callback and never propagated to the listener.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("context factory failed: {0}")]
    Context(#[source] BoxError),

    #[error("filter failed: {0}")]
    Filter(#[source] BoxError),

    #[error("execution failed: {0}")]
    Execution(#[source] LangError),
}

impl PipelineError {
    /// The pipeline stage that failed.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Context(_) => Stage::ResolveContext,
            PipelineError::Filter(_) => Stage::Filter,
            PipelineError::Execution(_) => Stage::Execute,
        }
    }
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
