use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::{
    AddressRecord, Cep, Config,
    error::{CepError, FetchError},
    http::{RetryPolicy, fetch_with_retry, truncate_body},
};

use super::{CepProvider, ProviderId};

pub const DEFAULT_BASE_URL: &str = "https://brasilapi.com.br/api/cep/v2";

#[derive(Debug, Clone)]
pub struct BrasilApiProvider {
    http: Client,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl BrasilApiProvider {
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
        Self::new(http, config.endpoints.brasilapi.clone(), config.timeout(), config.retry_policy())
    }

    pub fn url_for(&self, cep: &Cep) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), cep)
    }
}

/// BrasilAPI `/cep/v2` payload. Every field is optional on our side so a
/// sparse answer still normalizes.
#[derive(Debug, Default, Deserialize)]
pub struct BrasilApiResponse {
    #[serde(default)]
    pub cep: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub neighborhood: Option<String>,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub location: Option<BaLocation>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BaLocation {
    #[serde(default)]
    pub coordinates: Option<BaCoordinates>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BaCoordinates {
    #[serde(default)]
    pub latitude: Option<BaCoordinate>,
    #[serde(default)]
    pub longitude: Option<BaCoordinate>,
}

/// Coordinates are documented as strings; accept bare numbers too.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BaCoordinate {
    Text(String),
    Number(f64),
}

impl BaCoordinate {
    fn to_f64(&self) -> Option<f64> {
        let value = match self {
            BaCoordinate::Text(s) => s.trim().parse::<f64>().ok()?,
            BaCoordinate::Number(n) => *n,
        };
        value.is_finite().then_some(value)
    }
}

/// Map a BrasilAPI payload onto the canonical record.
///
/// `requested` backs up the postal code when the payload's own value is not a
/// usable CEP.
pub fn normalize(payload: &BrasilApiResponse, requested: &Cep) -> AddressRecord {
    let coordinates = payload.location.as_ref().and_then(|l| l.coordinates.as_ref());
    let latitude = coordinates.and_then(|c| c.latitude.as_ref()).and_then(BaCoordinate::to_f64);
    let longitude = coordinates.and_then(|c| c.longitude.as_ref()).and_then(BaCoordinate::to_f64);

    AddressRecord {
        postal_code: Cep::from_payload(&payload.cep)
            .unwrap_or_else(|| requested.clone())
            .into_string(),
        street: payload.street.clone().unwrap_or_default(),
        neighborhood: payload.neighborhood.clone().unwrap_or_default(),
        complement: None,
        city: payload.city.clone().unwrap_or_default(),
        state_code: payload.state.clone().unwrap_or_default(),
        city_code: None,
        latitude,
        longitude,
        source_provider: ProviderId::BrasilApi,
        fetched_at_epoch_ms: Utc::now().timestamp_millis(),
    }
}

#[async_trait]
impl CepProvider for BrasilApiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::BrasilApi
    }

    async fn lookup(&self, cep: &Cep) -> Result<AddressRecord, FetchError> {
        let url = self.url_for(cep);
        let res = fetch_with_retry(&self.http, &url, self.timeout, self.retry).await?;

        let status = res.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CepError::not_found().into());
        }

        let body = res.text().await.map_err(FetchError::Transport)?;

        if !status.is_success() {
            debug!(%status, body = %truncate_body(&body), "BrasilAPI returned an error status");
            return Err(CepError::server_error("Erro no servidor da BrasilAPI").into());
        }

        let payload: BrasilApiResponse = serde_json::from_str(&body).map_err(FetchError::Decode)?;

        Ok(normalize(&payload, cep))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cep() -> Cep {
        Cep::parse("01310100").unwrap()
    }

    #[test]
    fn normalize_full_payload() {
        let payload: BrasilApiResponse = serde_json::from_str(
            r#"{
                "cep": "01310100",
                "state": "SP",
                "city": "São Paulo",
                "neighborhood": "Bela Vista",
                "street": "Avenida Paulista",
                "service": "open-cep",
                "location": {
                    "type": "Point",
                    "coordinates": { "latitude": "-23.561414", "longitude": "-46.656882" }
                }
            }"#,
        )
        .unwrap();

        let record = normalize(&payload, &cep());

        assert_eq!(record.postal_code, "01310100");
        assert_eq!(record.city, "São Paulo");
        assert_eq!(record.state_code, "SP");
        assert_eq!(record.street, "Avenida Paulista");
        assert_eq!(record.latitude, Some(-23.561414));
        assert_eq!(record.longitude, Some(-46.656882));
        assert_eq!(record.source_provider, ProviderId::BrasilApi);
        assert!(record.city_code.is_none());
        assert!(record.fetched_at_epoch_ms > 0);
    }

    #[test]
    fn missing_coordinates_stay_absent() {
        let payload: BrasilApiResponse = serde_json::from_str(
            r#"{"cep":"01310100","state":"SP","city":"São Paulo",
                "location":{"type":"Point","coordinates":{}}}"#,
        )
        .unwrap();

        let record = normalize(&payload, &cep());

        assert_eq!(record.latitude, None);
        assert_eq!(record.longitude, None);
        assert_eq!(record.street, "");
        assert_eq!(record.neighborhood, "");
    }

    #[test]
    fn unparseable_coordinates_are_not_zero() {
        let payload: BrasilApiResponse = serde_json::from_str(
            r#"{"cep":"01310100","location":{"coordinates":{"latitude":"","longitude":"abc"}}}"#,
        )
        .unwrap();

        let record = normalize(&payload, &cep());
        assert_eq!(record.latitude, None);
        assert_eq!(record.longitude, None);
    }

    #[test]
    fn numeric_coordinates_accepted() {
        let payload: BrasilApiResponse = serde_json::from_str(
            r#"{"cep":"01310100","location":{"coordinates":{"latitude":-23.5,"longitude":-46.6}}}"#,
        )
        .unwrap();

        let record = normalize(&payload, &cep());
        assert_eq!(record.coordinates().map(|c| c.latitude), Some(-23.5));
    }

    #[test]
    fn postal_code_falls_back_to_requested() {
        let payload = BrasilApiResponse {
            cep: "???".into(),
            ..Default::default()
        };
        let record = normalize(&payload, &cep());
        assert_eq!(record.postal_code, "01310100");
    }

    #[test]
    fn url_is_built_from_clean_cep() {
        let provider = BrasilApiProvider::new(
            Client::new(),
            "http://localhost/api/cep/v2/",
            Duration::from_secs(1),
            RetryPolicy::default(),
        );
        assert_eq!(provider.url_for(&cep()), "http://localhost/api/cep/v2/01310100");
    }
}
