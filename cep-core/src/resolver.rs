//! Primary/secondary provider fallback.
//!
//! BrasilAPI is asked first (with its retries); ViaCEP only once that branch
//! has completely failed. When both fail, [`reconcile`] picks the error the
//! caller sees.

use reqwest::Client;
use tracing::{error, info, warn};

use crate::{
    AddressRecord, Cep, Config,
    error::{CepError, ErrorKind, FetchError},
    provider::{CepProvider, ProviderId, provider_from_config},
};

#[derive(Debug)]
pub struct AddressResolver {
    primary: Box<dyn CepProvider>,
    secondary: Box<dyn CepProvider>,
}

impl AddressResolver {
    pub fn new(primary: Box<dyn CepProvider>, secondary: Box<dyn CepProvider>) -> Self {
        Self { primary, secondary }
    }

    /// BrasilAPI then ViaCEP, sharing one HTTP client.
    pub fn from_config(config: &Config) -> Self {
        let http = Client::new();
        Self::new(
            provider_from_config(ProviderId::BrasilApi, config, http.clone()),
            provider_from_config(ProviderId::ViaCep, config, http),
        )
    }

    /// Resolve free-form user input (separators allowed) to an address.
    ///
    /// Invalid input is rejected before any request is made.
    pub async fn resolve_address(&self, raw: &str) -> Result<AddressRecord, CepError> {
        let cep = Cep::parse(raw)?;
        self.resolve(&cep).await
    }

    pub async fn resolve(&self, cep: &Cep) -> Result<AddressRecord, CepError> {
        let primary_err = match self.primary.lookup(cep).await {
            Ok(record) => {
                info!(%cep, provider = %self.primary.id(), "resolved postal code");
                return Ok(record);
            }
            Err(err) => err,
        };

        warn!(
            %cep,
            provider = %self.primary.id(),
            error = %primary_err,
            "{} failed, trying {}",
            self.primary.id().display_name(),
            self.secondary.id().display_name(),
        );

        let secondary_err = match self.secondary.lookup(cep).await {
            Ok(record) => {
                info!(%cep, provider = %self.secondary.id(), "resolved postal code");
                return Ok(record);
            }
            Err(err) => err,
        };

        error!(
            %cep,
            primary_error = %primary_err,
            secondary_error = %secondary_err,
            "{} also failed",
            self.secondary.id().display_name(),
        );

        Err(reconcile(primary_err, secondary_err))
    }
}

/// Choose which of two branch failures to surface.
///
/// A confirmed "not found" wins over anything else (primary first), then a
/// primary timeout; everything else collapses into a generic network error.
pub fn reconcile(primary: FetchError, secondary: FetchError) -> CepError {
    match (primary, secondary) {
        (FetchError::Classified(p), _) if p.kind() == ErrorKind::NotFound => p,
        (_, FetchError::Classified(s)) if s.kind() == ErrorKind::NotFound => s,
        (FetchError::Classified(p), _) if p.kind() == ErrorKind::Timeout => p,
        _ => CepError::network(),
    }
}
