//! Error taxonomy for the address pipeline.
//!
//! [`CepError`] is the classified error handed back to callers of the resolver.
//! [`FetchError`] is what a single provider branch can fail with: either an
//! already classified error (timeout, HTTP status, "not found" sentinel) or a
//! raw transport/decoding failure that only the resolver gets to adjudicate.

use std::{error::Error as StdError, fmt};

use thiserror::Error;

use crate::weather::WeatherError;

pub const MSG_INVALID_LENGTH: &str = "CEP deve conter 8 dígitos";
pub const MSG_INVALID_DIGITS: &str = "CEP deve conter apenas números";
pub const MSG_NOT_FOUND: &str = "CEP não encontrado";
pub const MSG_TIMEOUT: &str =
    "A requisição demorou muito. Verifique sua conexão e tente novamente.";
pub const MSG_NETWORK: &str = "Não foi possível consultar o CEP. Tente novamente mais tarde.";
pub const MSG_CONNECTIVITY: &str = "Erro de conexão. Verifique sua internet e tente novamente.";
pub const MSG_UNEXPECTED: &str = "Ocorreu um erro inesperado. Tente novamente mais tarde.";

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidFormat,
    NotFound,
    NetworkError,
    Timeout,
    ServerError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidFormat => "INVALID_FORMAT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::NetworkError => "NETWORK_ERROR",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::ServerError => "SERVER_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure of the address pipeline with a user-facing (Portuguese) message.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CepError {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl CepError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidFormat, message)
    }

    pub fn not_found() -> Self {
        Self::new(ErrorKind::NotFound, MSG_NOT_FOUND)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServerError, message)
    }

    pub fn timeout() -> Self {
        Self::new(ErrorKind::Timeout, MSG_TIMEOUT)
    }

    pub fn network() -> Self {
        Self::new(ErrorKind::NetworkError, MSG_NETWORK)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure of one provider branch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Classified(#[from] CepError),

    #[error("network request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("failed to decode provider response: {0}")]
    Decode(#[source] serde_json::Error),
}

impl FetchError {
    /// Classified kind, if this failure has one. Raw transport and decoding
    /// failures return `None`.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            FetchError::Classified(err) => Some(err.kind()),
            FetchError::Transport(_) | FetchError::Decode(_) => None,
        }
    }
}

/// Turn any error into exactly one user-facing message.
///
/// Walks the source chain looking for a classified error first; falls back to
/// a connectivity message when the failure looks network related and to a
/// generic message otherwise.
pub fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut current = Some(err);

    while let Some(e) = current {
        if let Some(cep) = e.downcast_ref::<CepError>() {
            return cep.message().to_string();
        }
        if let Some(fetch) = e.downcast_ref::<FetchError>() {
            match fetch {
                FetchError::Classified(cep) => return cep.message().to_string(),
                FetchError::Transport(_) => return MSG_CONNECTIVITY.to_string(),
                FetchError::Decode(_) => {}
            }
        }
        if let Some(weather) = e.downcast_ref::<WeatherError>() {
            return weather.to_string();
        }
        if let Some(http) = e.downcast_ref::<reqwest::Error>() {
            if http.is_connect() || http.is_timeout() || http.is_request() {
                return MSG_CONNECTIVITY.to_string();
            }
        }
        current = e.source();
    }

    if mentions_connectivity(&err.to_string()) {
        MSG_CONNECTIVITY.to_string()
    } else {
        MSG_UNEXPECTED.to_string()
    }
}

fn mentions_connectivity(text: &str) -> bool {
    let lower = text.to_lowercase();
    ["fetch", "network", "connection", "connect", "dns"]
        .iter()
        .any(|needle| lower.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("{0}")]
    struct Plain(String);

    #[derive(Debug, Error)]
    #[error("wrapped")]
    struct Wrapper(#[source] CepError);

    #[test]
    fn classified_error_uses_own_message() {
        let err = CepError::new(ErrorKind::NotFound, "Custom message");
        assert_eq!(describe(&err), "Custom message");
    }

    #[test]
    fn classified_error_found_through_source_chain() {
        let err = Wrapper(CepError::timeout());
        assert_eq!(describe(&err), MSG_TIMEOUT);
    }

    #[test]
    fn network_text_maps_to_connectivity_message() {
        let err = Plain("Failed to fetch".into());
        assert_eq!(describe(&err), MSG_CONNECTIVITY);

        let err = Plain("network unreachable".into());
        assert_eq!(describe(&err), MSG_CONNECTIVITY);
    }

    #[test]
    fn unknown_error_maps_to_generic_message() {
        let err = Plain("Unknown error".into());
        let msg = describe(&err);
        assert!(msg.contains("inesperado"));
    }

    #[test]
    fn fetch_error_kind_only_for_classified() {
        let classified = FetchError::from(CepError::not_found());
        assert_eq!(classified.kind(), Some(ErrorKind::NotFound));

        let decode = serde_json::from_str::<u8>("nope").unwrap_err();
        assert_eq!(FetchError::Decode(decode).kind(), None);
    }

    #[test]
    fn source_is_preserved() {
        let cause = Plain("deadline".into());
        let err = CepError::timeout().with_source(cause);
        assert_eq!(err.source().map(|s| s.to_string()), Some("deadline".to_string()));
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(ErrorKind::InvalidFormat.to_string(), "INVALID_FORMAT");
        assert_eq!(ErrorKind::ServerError.as_str(), "SERVER_ERROR");
    }
}
