use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{
    AddressRecord, Cep, Config,
    error::{CepError, FetchError},
    http::{RetryPolicy, fetch_with_retry, truncate_body},
};

use super::{CepProvider, ProviderId};

pub const DEFAULT_BASE_URL: &str = "https://viacep.com.br/ws";

#[derive(Debug, Clone)]
pub struct ViaCepProvider {
    http: Client,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ViaCepProvider {
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            timeout,
            retry,
        }
    }

    pub fn from_config(config: &Config, http: Client) -> Self {
        Self::new(http, config.endpoints.viacep.clone(), config.timeout(), config.retry_policy())
    }

    pub fn url_for(&self, cep: &Cep) -> String {
        format!("{}/{}/json/", self.base_url.trim_end_matches('/'), cep)
    }
}

/// ViaCEP `/ws/{cep}/json/` payload.
///
/// Unknown codes come back as `200 {"erro": true}`; any `erro` key counts.
#[derive(Debug, Default, Deserialize)]
pub struct ViaCepResponse {
    #[serde(default)]
    pub cep: String,
    #[serde(default)]
    pub logradouro: Option<String>,
    #[serde(default)]
    pub complemento: Option<String>,
    #[serde(default)]
    pub bairro: Option<String>,
    #[serde(default)]
    pub localidade: Option<String>,
    #[serde(default)]
    pub uf: Option<String>,
    #[serde(default)]
    pub ibge: Option<String>,
    #[serde(default)]
    pub erro: Option<serde_json::Value>,
}

impl ViaCepResponse {
    pub fn is_not_found(&self) -> bool {
        self.erro.is_some()
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned)
}

/// Map a ViaCEP payload onto the canonical record. ViaCEP formats the code as
/// `NNNNN-NNN`; the record always carries the bare digits.
pub fn normalize(payload: &ViaCepResponse, requested: &Cep) -> AddressRecord {
    AddressRecord {
        postal_code: Cep::from_payload(&payload.cep)
            .unwrap_or_else(|| requested.clone())
            .into_string(),
        street: payload.logradouro.clone().unwrap_or_default(),
        neighborhood: payload.bairro.clone().unwrap_or_default(),
        complement: non_empty(&payload.complemento),
        city: payload.localidade.clone().unwrap_or_default(),
        state_code: payload.uf.clone().unwrap_or_default(),
        city_code: non_empty(&payload.ibge),
        latitude: None,
        longitude: None,
        source_provider: ProviderId::ViaCep,
        fetched_at_epoch_ms: Utc::now().timestamp_millis(),
    }
}

#[async_trait]
impl CepProvider for ViaCepProvider {
    fn id(&self) -> ProviderId {
        ProviderId::ViaCep
    }

    async fn lookup(&self, cep: &Cep) -> Result<AddressRecord, FetchError> {
        let url = self.url_for(cep);
        let res = fetch_with_retry(&self.http, &url, self.timeout, self.retry).await?;

        let status = res.status();
        let body = res.text().await.map_err(FetchError::Transport)?;

        if !status.is_success() {
            debug!(%status, body = %truncate_body(&body), "ViaCEP returned an error status");
            return Err(CepError::server_error("Erro no servidor do ViaCEP").into());
        }

        let payload: ViaCepResponse = serde_json::from_str(&body).map_err(FetchError::Decode)?;

        if payload.is_not_found() {
            return Err(CepError::not_found().into());
        }

        Ok(normalize(&payload, cep))
    }
}
