use std::path::PathBuf;

use anyhow::Context;
use cep_core::{
    AddressResolver, Config, FileStore, HistoryStore, WeatherClient, describe,
    weather::{MAX_FORECAST_DAYS, MIN_FORECAST_DAYS},
};
use clap::{Parser, Subcommand};
use inquire::CustomType;

use crate::output;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "cep", version, about = "Brazilian postal code lookup with weather forecast")]
pub struct Cli {
    /// Enable debug logging.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use an alternative configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve a CEP to an address and save it to the history.
    Lookup {
        /// Postal code, with or without separators (e.g. "01310-100").
        cep: String,

        /// Also show the weather forecast for the address.
        #[arg(long)]
        weather: bool,

        /// Forecast days (1-7); defaults to the configured value.
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=7))]
        days: Option<u8>,
    },

    /// Show the weather forecast for a Brazilian city.
    Weather {
        /// City name, e.g. "São Paulo".
        city: String,

        /// Forecast days (1-7); defaults to the configured value.
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=7))]
        days: Option<u8>,
    },

    /// Show or edit the search history.
    History {
        #[command(subcommand)]
        action: Option<HistoryAction>,
    },

    /// Interactively edit timeouts, retries and forecast defaults.
    Configure,
}

#[derive(Debug, Subcommand)]
pub enum HistoryAction {
    /// List previous lookups, most recent first.
    List,
    /// Remove one postal code from the history.
    Remove { cep: String },
    /// Remove every entry.
    Clear,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<Config> {
        match &self.config {
            Some(path) => Config::load_from(path),
            None => Config::load(),
        }
    }

    fn history(config: &Config) -> anyhow::Result<HistoryStore<FileStore>> {
        let dir = Config::data_dir()?;
        Ok(HistoryStore::with_limit(FileStore::new(dir), config.history_limit))
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let config = self.load_config()?;

        match &self.command {
            Command::Lookup { cep, weather, days } => {
                let resolver = AddressResolver::from_config(&config);
                let address = resolver.resolve_address(cep).await?;

                Self::history(&config)?.save(&address)?;

                let forecast = if *weather {
                    let days = days.unwrap_or(config.forecast_days);
                    let client = WeatherClient::from_config(&config);
                    Some(client.forecast_for_address(&address, days).await)
                } else {
                    None
                };

                if self.json {
                    output::print_json(&output::lookup_json(&address, forecast.as_ref()))?;
                } else {
                    output::print_address(&address);
                    match &forecast {
                        Some(Ok(snapshot)) => {
                            println!();
                            output::print_weather(snapshot);
                        }
                        Some(Err(err)) => {
                            tracing::debug!(error = ?err, "forecast failed");
                            eprintln!("Previsão do tempo indisponível: {}", describe(err));
                        }
                        None => {}
                    }
                }
            }

            Command::Weather { city, days } => {
                let days = days.unwrap_or(config.forecast_days);
                let client = WeatherClient::from_config(&config);
                let coords = client.resolve_coordinates(city).await?;
                let snapshot =
                    client.fetch_forecast(coords.latitude, coords.longitude, days, city).await?;

                if self.json {
                    output::print_json(&snapshot)?;
                } else {
                    output::print_weather(&snapshot);
                }
            }

            Command::History { action } => {
                let history = Self::history(&config)?;

                match action.as_ref().unwrap_or(&HistoryAction::List) {
                    HistoryAction::List => {
                        let entries = history.load();
                        if self.json {
                            output::print_json(&entries)?;
                        } else {
                            output::print_history(&entries);
                        }
                    }
                    HistoryAction::Remove { cep } => {
                        let remaining = history.remove(cep)?;
                        println!("Removido. {} consulta(s) no histórico.", remaining.len());
                    }
                    HistoryAction::Clear => {
                        history.clear()?;
                        println!("Histórico limpo.");
                    }
                }
            }

            Command::Configure => {
                let updated = configure(config)?;
                match &self.config {
                    Some(path) => updated.save_to(path)?,
                    None => updated.save()?,
                }
                println!("Configuração salva.");
            }
        }

        Ok(())
    }
}

fn configure(mut config: Config) -> anyhow::Result<Config> {
    config.timeout_ms = CustomType::<u64>::new("Tempo limite da requisição (ms):")
        .with_default(config.timeout_ms)
        .with_validator(|v: &u64| {
            Ok(if *v > 0 {
                inquire::validator::Validation::Valid
            } else {
                inquire::validator::Validation::Invalid("Deve ser maior que zero".into())
            })
        })
        .prompt()
        .context("Falha ao ler o tempo limite")?;

    config.max_retries = CustomType::<u32>::new("Novas tentativas por provedor:")
        .with_default(config.max_retries)
        .prompt()
        .context("Falha ao ler o número de tentativas")?;

    let days = CustomType::<u8>::new("Dias de previsão padrão (1-7):")
        .with_default(config.forecast_days)
        .with_validator(|v: &u8| {
            Ok(if (MIN_FORECAST_DAYS..=MAX_FORECAST_DAYS).contains(v) {
                inquire::validator::Validation::Valid
            } else {
                inquire::validator::Validation::Invalid("Deve estar entre 1 e 7".into())
            })
        })
        .prompt()
        .context("Falha ao ler os dias de previsão")?;
    config.set_forecast_days(days)?;

    Ok(config)
}
