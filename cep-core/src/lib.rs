//! Core library for the `cep` CLI.
//!
//! This crate defines:
//! - Configuration handling
//! - CEP lookup providers (BrasilAPI, ViaCEP) with timeout, retry and fallback
//! - The weather forecast client (Open-Meteo)
//! - The bounded search history
//! - Shared domain models and the error taxonomy
//!
//! It is used by `cep-cli`, but can also be reused by other binaries or services.

pub mod config;
pub mod error;
pub mod history;
pub mod http;
pub mod model;
pub mod provider;
pub mod resolver;
pub mod weather;

pub use config::{Config, Endpoints};
pub use error::{CepError, ErrorKind, FetchError, describe};
pub use history::{FileStore, HistoryStore, KeyValueStore, MemoryStore};
pub use model::{AddressRecord, Cep, Coordinates, WeatherSnapshot, format_cep};
pub use provider::{CepProvider, ProviderId};
pub use resolver::AddressResolver;
pub use weather::{WeatherClient, WeatherError};
