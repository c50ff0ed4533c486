//! Open-Meteo geocoding and forecast client.
//!
//! Same deadline as the CEP providers, but a single attempt: no retry and no
//! fallback service. Failures use their own [`WeatherError`] rather than the
//! address taxonomy.

use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use thiserror::Error;
use tracing::debug;

use crate::{
    AddressRecord, Config,
    http::truncate_body,
    model::{Coordinates, CurrentConditions, DailyForecast, WeatherLocation, WeatherSnapshot},
};

pub const DEFAULT_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
pub const FORECAST_TIMEZONE: &str = "America/Sao_Paulo";
pub const MIN_FORECAST_DAYS: u8 = 1;
pub const MAX_FORECAST_DAYS: u8 = 7;

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Localização não encontrada")]
    LocationNotFound,

    #[error("Falha na requisição ao serviço de {service} (status {status})")]
    RequestFailed {
        service: &'static str,
        status: StatusCode,
    },

    #[error("A requisição demorou muito. Verifique sua conexão e tente novamente.")]
    Timeout,

    #[error("Erro de conexão. Verifique sua internet e tente novamente.")]
    Transport(#[source] reqwest::Error),

    #[error("Resposta inválida do serviço de {service}")]
    Decode {
        service: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("A previsão deve ter entre 1 e 7 dias (recebido {0})")]
    InvalidForecastDays(u8),

    #[error(
        "Previsão incompleta: {expected} dia(s) pedidos, recebidos {dates} datas, \
         {max} máximas e {min} mínimas"
    )]
    IncompleteForecast {
        expected: u8,
        dates: usize,
        max: usize,
        min: usize,
    },
}

pub fn validate_forecast_days(days: u8) -> Result<u8, WeatherError> {
    if (MIN_FORECAST_DAYS..=MAX_FORECAST_DAYS).contains(&days) {
        Ok(days)
    } else {
        Err(WeatherError::InvalidForecastDays(days))
    }
}

#[derive(Debug, Clone)]
pub struct WeatherClient {
    http: Client,
    geocoding_url: String,
    forecast_url: String,
    timeout: Duration,
}

impl WeatherClient {
    pub fn new(
        http: Client,
        geocoding_url: impl Into<String>,
        forecast_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            geocoding_url: geocoding_url.into(),
            forecast_url: forecast_url.into(),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Client::new(),
            config.endpoints.geocoding.clone(),
            config.endpoints.forecast.clone(),
            config.timeout(),
        )
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        service: &'static str,
    ) -> Result<T, WeatherError> {
        let res = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| WeatherError::Timeout)?
            .map_err(WeatherError::Transport)?;

        let status = res.status();
        let body = res.text().await.map_err(WeatherError::Transport)?;

        if !status.is_success() {
            debug!(service, %status, body = %truncate_body(&body), "weather request failed");
            return Err(WeatherError::RequestFailed { service, status });
        }

        serde_json::from_str(&body).map_err(|source| WeatherError::Decode { service, source })
    }

    /// Geocode a Brazilian city name to its first match.
    pub async fn resolve_coordinates(&self, city: &str) -> Result<Coordinates, WeatherError> {
        let request = self.http.get(&self.geocoding_url).query(&[
            ("name", city),
            ("countryCode", "BR"),
            ("count", "1"),
            ("language", "pt"),
            ("format", "json"),
        ]);

        let parsed: OmGeocodingResponse = self.get_json(request, "geocodificação").await?;

        let first = parsed.results.first().ok_or(WeatherError::LocationNotFound)?;
        debug!(city, matched = %first.name, "geocoded city");

        Ok(Coordinates {
            latitude: first.latitude,
            longitude: first.longitude,
        })
    }

    /// Current conditions plus `days` daily min/max entries.
    pub async fn fetch_forecast(
        &self,
        latitude: f64,
        longitude: f64,
        days: u8,
        city: &str,
    ) -> Result<WeatherSnapshot, WeatherError> {
        let days = validate_forecast_days(days)?;

        let request = self.http.get(&self.forecast_url).query(&[
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            ("current", "temperature_2m,apparent_temperature,relative_humidity_2m".to_string()),
            ("daily", "temperature_2m_max,temperature_2m_min".to_string()),
            ("forecast_days", days.to_string()),
            ("timezone", FORECAST_TIMEZONE.to_string()),
        ]);

        let parsed: OmForecastResponse = self.get_json(request, "previsão do tempo").await?;

        let daily = daily_entries(parsed.daily, days)?;

        Ok(WeatherSnapshot {
            current: CurrentConditions {
                temperature_c: parsed.current.temperature_2m,
                apparent_temperature_c: parsed.current.apparent_temperature,
                relative_humidity_pct: parsed.current.relative_humidity_2m,
                observed_at: parsed.current.time,
            },
            daily,
            location: WeatherLocation {
                city: city.to_string(),
                latitude,
                longitude,
            },
        })
    }

    /// Forecast for a resolved address, geocoding its city when the provider
    /// gave no coordinates.
    pub async fn forecast_for_address(
        &self,
        address: &AddressRecord,
        days: u8,
    ) -> Result<WeatherSnapshot, WeatherError> {
        let coordinates = match address.coordinates() {
            Some(c) => c,
            None => self.resolve_coordinates(&address.city).await?,
        };

        self.fetch_forecast(coordinates.latitude, coordinates.longitude, days, &address.city)
            .await
    }
}

#[derive(Debug, Deserialize)]
struct OmGeocodingResult {
    #[serde(default)]
    name: String,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct OmGeocodingResponse {
    #[serde(default)]
    results: Vec<OmGeocodingResult>,
}

#[derive(Debug, Deserialize)]
struct OmCurrent {
    #[serde(deserialize_with = "local_minutes")]
    time: NaiveDateTime,
    temperature_2m: f64,
    apparent_temperature: f64,
    relative_humidity_2m: u8,
}

#[derive(Debug, Deserialize)]
struct OmDaily {
    time: Vec<NaiveDate>,
    temperature_2m_max: Vec<f64>,
    temperature_2m_min: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct OmForecastResponse {
    current: OmCurrent,
    daily: OmDaily,
}

/// The three daily arrays must line up with each other and with the requested
/// day count.
fn daily_entries(daily: OmDaily, days: u8) -> Result<Vec<DailyForecast>, WeatherError> {
    let expected = usize::from(days);
    let (dates, max, min) = (
        daily.time.len(),
        daily.temperature_2m_max.len(),
        daily.temperature_2m_min.len(),
    );

    if dates != expected || max != expected || min != expected {
        return Err(WeatherError::IncompleteForecast {
            expected: days,
            dates,
            max,
            min,
        });
    }

    Ok(daily
        .time
        .into_iter()
        .zip(daily.temperature_2m_min)
        .zip(daily.temperature_2m_max)
        .map(|((date, temperature_min_c), temperature_max_c)| DailyForecast {
            date,
            temperature_min_c,
            temperature_max_c,
        })
        .collect())
}

/// Open-Meteo reports local times as `2024-01-15T12:00` (no seconds, no offset).
fn local_minutes<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S"))
        .map_err(serde::de::Error::custom)
}
