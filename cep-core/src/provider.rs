use crate::{
    AddressRecord, Cep, Config,
    error::FetchError,
    provider::{brasilapi::BrasilApiProvider, viacep::ViaCepProvider},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

pub mod brasilapi;
pub mod viacep;

/// CEP lookup services, in the order the resolver queries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Primary provider; the only one returning coordinates.
    BrasilApi,
    /// Secondary provider; the only one returning the IBGE city code.
    ViaCep,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::BrasilApi => "brasilapi",
            ProviderId::ViaCep => "viacep",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::BrasilApi => "BrasilAPI",
            ProviderId::ViaCep => "ViaCEP",
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait CepProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    /// Look up an already validated CEP. HTTP status and "not found"
    /// sentinels are classified here; transport failures are passed through.
    async fn lookup(&self, cep: &Cep) -> Result<AddressRecord, FetchError>;
}

/// Construct a provider from config, sharing the given HTTP client.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
    http: Client,
) -> Box<dyn CepProvider> {
    match id {
        ProviderId::BrasilApi => Box::new(BrasilApiProvider::from_config(config, http)),
        ProviderId::ViaCep => Box::new(ViaCepProvider::from_config(config, http)),
    }
}
