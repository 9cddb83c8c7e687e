use thiserror::Error;

/// The inbound body could not be turned into a signal at all.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("Empty webhook body")]
    EmptyBody,

    #[error("Unable to parse webhook content: {0}")]
    UnrecognizedAlert(String),

    #[error("Alert is missing a price field ({0})")]
    MissingPrice(&'static str),

    #[error("Alert is missing a ticker")]
    MissingTicker,

    #[error("Malformed JSON payload: {0}")]
    MalformedJson(String),
}

/// The signal was parsed but lacks a required canonical field.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required fields: action, ticker, price")]
    MissingRequiredFields,

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Invalid direction: {0}")]
    InvalidDirection(String),

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// One outbound delivery failed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DestinationError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Request failed: {0}")]
    Request(String),
}

impl DestinationError {
    /// Timeouts and connection resets, as opposed to a definitive answer
    /// from the remote side.
    pub fn is_transient(&self) -> bool {
        matches!(self, DestinationError::Timeout | DestinationError::Connection(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(DestinationError::Timeout.is_transient());
        assert!(DestinationError::Connection("reset".into()).is_transient());
        assert!(!DestinationError::Rejected {
            status: 400,
            body: "bad".into()
        }
        .is_transient());
        assert!(!DestinationError::Request("builder".into()).is_transient());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ValidationError::MissingRequiredFields.to_string(),
            "Missing required fields: action, ticker, price"
        );
        assert_eq!(
            ValidationError::UnknownAction("hold".into()).to_string(),
            "Unknown action: hold"
        );
    }
}
