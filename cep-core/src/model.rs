use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{
    error::{CepError, MSG_INVALID_DIGITS, MSG_INVALID_LENGTH},
    provider::ProviderId,
};

pub const CEP_LEN: usize = 8;

/// A cleaned postal code: exactly eight ASCII digits, no separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cep(String);

impl Cep {
    /// Strip every non-digit character from `raw` and validate the rest.
    pub fn parse(raw: &str) -> Result<Self, CepError> {
        let digits = strip_non_digits(raw);

        if digits.len() != CEP_LEN {
            return Err(CepError::invalid_format(MSG_INVALID_LENGTH));
        }

        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CepError::invalid_format(MSG_INVALID_DIGITS));
        }

        Ok(Self(digits))
    }

    /// Lenient variant for provider payloads: `None` instead of an error.
    pub fn from_payload(value: &str) -> Option<Self> {
        Self::parse(value).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// `NNNNN-NNN`.
    pub fn formatted(&self) -> String {
        format!("{}-{}", &self.0[..5], &self.0[5..])
    }
}

impl fmt::Display for Cep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn strip_non_digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Format as `NNNNN-NNN`, or give the input back unchanged if it is not a CEP.
pub fn format_cep(raw: &str) -> String {
    Cep::parse(raw).map(|cep| cep.formatted()).unwrap_or_else(|_| raw.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Canonical address, whichever provider answered.
///
/// Coordinates only ever come from BrasilAPI; `complement` and `city_code`
/// only from ViaCEP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub postal_code: String,
    pub street: String,
    pub neighborhood: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
    pub city: String,
    pub state_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    pub source_provider: ProviderId,
    pub fetched_at_epoch_ms: i64,
}

impl AddressRecord {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }

    pub fn formatted_postal_code(&self) -> String {
        format_cep(&self.postal_code)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature_c: f64,
    pub apparent_temperature_c: f64,
    pub relative_humidity_pct: u8,
    /// Local time (America/Sao_Paulo) as reported by the forecast service.
    pub observed_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub temperature_min_c: f64,
    pub temperature_max_c: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherLocation {
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub current: CurrentConditions,
    pub daily: Vec<DailyForecast>,
    pub location: WeatherLocation,
}
