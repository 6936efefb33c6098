use thiserror::Error;

/// Error taxonomy for the ADMF-Trader core.
///
/// Most variants here are *observed*, not *propagated*: the Event Bus and
/// Risk Manager catch and log `HandlerException`/`DuplicateEvent`/
/// `LimitViolation` locally and report them as run counters rather than
/// bubbling an `Err` up through `Coordinator::run`. Only `Validation` (fatal
/// configuration problems caught before a run starts) and the ambient
/// `Io`/`Serialization`/`Internal` variants are expected to actually
/// propagate with `?`.
#[derive(Error, Debug)]
pub enum GbError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid order state transition: order {order_id} from {from:?} to {to:?}")]
    StateTransition {
        order_id: String,
        from: String,
        to: String,
    },

    #[error("risk limit violated: {0}")]
    LimitViolation(String),

    #[error("duplicate event dropped: {0}")]
    DuplicateEvent(String),

    #[error("handler exception while dispatching event {event_id}: {message}")]
    HandlerException { event_id: String, message: String },

    #[error("data handler exhausted: no more bars")]
    DataExhausted,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias used throughout the workspace.
pub type GbResult<T> = Result<T, GbError>;

/// Helper trait for attaching string context to ad hoc errors.
pub trait IntoGbError {
    fn into_gb_error(self) -> GbError;
}

impl IntoGbError for String {
    fn into_gb_error(self) -> GbError {
        GbError::Internal(self)
    }
}

impl IntoGbError for &str {
    fn into_gb_error(self) -> GbError {
        GbError::Internal(self.to_string())
    }
}

#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::GbError::Validation(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::GbError::Internal(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::GbError::Config(format!($($arg)*))
    };
}
