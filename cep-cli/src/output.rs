//! Human-readable (pt-BR) rendering of lookups, forecasts and history.

use cep_core::{AddressRecord, WeatherError, WeatherSnapshot, describe};
use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Value, json};

const MONTHS: [&str; 12] =
    ["jan", "fev", "mar", "abr", "mai", "jun", "jul", "ago", "set", "out", "nov", "dez"];

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// JSON document for `lookup`. A failed forecast keeps the address and
/// reports the failure under `weather_error`.
pub fn lookup_json(
    address: &AddressRecord,
    forecast: Option<&Result<WeatherSnapshot, WeatherError>>,
) -> Value {
    match forecast {
        None => json!({ "address": address, "weather": null }),
        Some(Ok(snapshot)) => json!({ "address": address, "weather": snapshot }),
        Some(Err(err)) => json!({
            "address": address,
            "weather": null,
            "weather_error": describe(err),
        }),
    }
}

pub fn print_address(address: &AddressRecord) {
    println!("CEP:        {}", address.formatted_postal_code());
    if !address.street.is_empty() {
        println!("Logradouro: {}", address.street);
    }
    if let Some(complement) = &address.complement {
        println!("Complemento: {complement}");
    }
    if !address.neighborhood.is_empty() {
        println!("Bairro:     {}", address.neighborhood);
    }
    println!("Cidade:     {} - {}", address.city, address.state_code);
    if let Some(code) = &address.city_code {
        println!("IBGE:       {code}");
    }
    if let Some(coords) = address.coordinates() {
        println!("Coordenadas: {:.6}, {:.6}", coords.latitude, coords.longitude);
    }
    println!("Fonte:      {}", address.source_provider.display_name());
}

pub fn print_weather(snapshot: &WeatherSnapshot) {
    let current = &snapshot.current;

    println!("Clima em {}", snapshot.location.city);
    println!(
        "  Agora: {:.1}°C (sensação {:.1}°C), umidade {}%  [{}]",
        current.temperature_c,
        current.apparent_temperature_c,
        current.relative_humidity_pct,
        current.observed_at.format("%d/%m %H:%M"),
    );

    for day in &snapshot.daily {
        println!(
            "  {:>6}: mín {:.1}°C / máx {:.1}°C",
            short_date(day.date),
            day.temperature_min_c,
            day.temperature_max_c,
        );
    }
}

pub fn print_history(entries: &[AddressRecord]) {
    if entries.is_empty() {
        println!("Nenhuma consulta no histórico.");
        return;
    }

    let now = Utc::now();
    for entry in entries {
        let when = Utc
            .timestamp_millis_opt(entry.fetched_at_epoch_ms)
            .single()
            .map(|ts| relative_time(now, ts))
            .unwrap_or_default();
        let street = match entry.street.as_str() {
            "" => "-",
            street => street,
        };

        println!(
            "{}  {street}, {} - {}  ({when})",
            entry.formatted_postal_code(),
            entry.city,
            entry.state_code,
        );
    }
}

/// `15 jan`.
pub fn short_date(date: NaiveDate) -> String {
    format!("{:02} {}", date.day(), MONTHS[date.month0() as usize])
}

/// "agora", "há 5 minutos", "há 1 hora", "há 3 dias", or the plain date once a
/// week has passed.
pub fn relative_time(now: DateTime<Utc>, then: DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(then);
    let mins = diff.num_minutes();
    let hours = diff.num_hours();
    let days = diff.num_days();

    if mins < 1 {
        "agora".to_string()
    } else if mins < 60 {
        format!("há {mins} minuto{}", plural(mins))
    } else if hours < 24 {
        format!("há {hours} hora{}", plural(hours))
    } else if days < 7 {
        format!("há {days} dia{}", plural(days))
    } else {
        then.with_timezone(&Local).format("%d/%m/%Y").to_string()
    }
}

fn plural(n: i64) -> &'static str {
    if n > 1 { "s" } else { "" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cep_core::ProviderId;
    use chrono::Duration;

    fn paulista() -> AddressRecord {
        AddressRecord {
            postal_code: "01310100".into(),
            street: "Avenida Paulista".into(),
            neighborhood: "Bela Vista".into(),
            complement: None,
            city: "São Paulo".into(),
            state_code: "SP".into(),
            city_code: Some("3550308".into()),
            latitude: None,
            longitude: None,
            source_provider: ProviderId::BrasilApi,
            fetched_at_epoch_ms: 0,
        }
    }

    #[test]
    fn failed_forecast_keeps_address_in_json() {
        let forecast = Err(WeatherError::LocationNotFound);
        let doc = lookup_json(&paulista(), Some(&forecast));

        assert_eq!(doc["address"]["postal_code"], "01310100");
        assert_eq!(doc["address"]["city"], "São Paulo");
        assert!(doc["weather"].is_null());
        assert_eq!(doc["weather_error"], "Localização não encontrada");
    }

    #[test]
    fn lookup_without_weather_has_no_error_field() {
        let doc = lookup_json(&paulista(), None);

        assert_eq!(doc["address"]["street"], "Avenida Paulista");
        assert!(doc["weather"].is_null());
        assert!(doc.get("weather_error").is_none());
    }

    #[test]
    fn relative_time_buckets() {
        let now = Utc::now();
        assert_eq!(relative_time(now, now), "agora");
        assert_eq!(relative_time(now, now - Duration::seconds(30)), "agora");
        assert_eq!(relative_time(now, now - Duration::minutes(1)), "há 1 minuto");
        assert_eq!(relative_time(now, now - Duration::minutes(5)), "há 5 minutos");
        assert_eq!(relative_time(now, now - Duration::hours(1)), "há 1 hora");
        assert_eq!(relative_time(now, now - Duration::hours(23)), "há 23 horas");
        assert_eq!(relative_time(now, now - Duration::days(2)), "há 2 dias");
    }

    #[test]
    fn relative_time_falls_back_to_date() {
        let then = Utc.with_ymd_and_hms(2024, 1, 15, 15, 0, 0).unwrap();
        let now = then + Duration::days(30);
        let expected = then.with_timezone(&Local).format("%d/%m/%Y").to_string();
        assert_eq!(relative_time(now, then), expected);
    }

    #[test]
    fn short_date_uses_portuguese_months() {
        assert_eq!(short_date(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()), "05 jan");
        assert_eq!(short_date(NaiveDate::from_ymd_opt(2024, 9, 17).unwrap()), "17 set");
    }
}
