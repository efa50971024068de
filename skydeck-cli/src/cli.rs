use std::io::IsTerminal;

use anyhow::{Context, bail};
use chrono::{Datelike, Local, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use inquire::{Password, Select};

use skydeck_core::{
    Config, ConnectivityFlag, Coordinates, Dashboard, FallbackNotifier, FetchSource, FileStore,
    FixedPosition, Geolocator, HourlyCutoff, IpGeolocator, Theme, ViewMode, WeatherProvider,
    provider::openweather::OpenWeatherProvider, provider_from_config,
};

use crate::{notifier::TerminalNotifier, render};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "skydeck", version, about = "Weather dashboard for the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ViewArg {
    Daily,
    Hourly,
}

impl From<ViewArg> for ViewMode {
    fn from(value: ViewArg) -> Self {
        match value {
            ViewArg::Daily => ViewMode::Daily,
            ViewArg::Hourly => ViewMode::Hourly,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key and forecast settings.
    Configure,

    /// Show weather for a city, your current position, or the last location.
    Show {
        /// City name. Omit to show the last viewed location.
        city: Option<String>,

        /// Use your current position instead of a city name.
        #[arg(long, conflicts_with = "city")]
        here: bool,

        /// Latitude for --here; skips IP-based lookup when given with --lon.
        #[arg(long, requires = "lon", conflicts_with = "city", allow_hyphen_values = true)]
        lat: Option<f64>,

        /// Longitude for --here.
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,

        /// Do not touch the network; use cached data only.
        #[arg(long)]
        offline: bool,

        /// Override the saved view mode for this run.
        #[arg(long, value_enum)]
        view: Option<ViewArg>,
    },

    /// Save the last shown location.
    Save,

    /// List saved locations.
    Saved,

    /// Remove a saved location by id.
    Remove {
        id: i64,
    },

    /// Toggle between light and dark output colors.
    Theme,

    /// Toggle between metric and imperial units.
    Units,

    /// Set the default forecast view.
    View {
        #[arg(value_enum)]
        mode: ViewArg,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { city, here, lat, lon, offline, view } => {
                let position = lat.zip(lon).map(|(lat, lon)| Coordinates { lat, lon });
                show(city, here || position.is_some(), position, offline, view).await
            }
            Command::Save => {
                let mut dashboard = open_dashboard(&Config::load()?, true, false)?;
                let Some(name) = dashboard.state().current.as_ref().map(|s| s.location.clone())
                else {
                    bail!("Nothing to save yet. Run `skydeck show <city>` first.");
                };
                if dashboard.save_current_location()? {
                    println!("Saved {name}");
                }
                flush_toasts(&dashboard);
                Ok(())
            }
            Command::Saved => {
                let dashboard = open_dashboard(&Config::load()?, true, false)?;
                let state = dashboard.state();
                let palette = palette(state.preferences.theme);
                print!(
                    "{}",
                    render::saved(&state.saved_locations, state.preferences.units, &palette)
                );
                Ok(())
            }
            Command::Remove { id } => {
                let mut dashboard = open_dashboard(&Config::load()?, true, false)?;
                if !dashboard.remove_location(id)? {
                    bail!("No saved location with id {id}");
                }
                println!("Removed location {id}");
                Ok(())
            }
            Command::Theme => {
                let mut dashboard = open_dashboard(&Config::load()?, true, false)?;
                let theme = dashboard.toggle_theme()?;
                println!("Theme: {}", theme.as_str());
                Ok(())
            }
            Command::Units => {
                let mut dashboard = open_dashboard(&Config::load()?, true, false)?;
                let units = dashboard.toggle_units()?;
                println!("Units: {units}");
                Ok(())
            }
            Command::View { mode } => {
                let mut dashboard = open_dashboard(&Config::load()?, true, false)?;
                let mode = ViewMode::from(mode);
                dashboard.set_view_mode(mode)?;
                println!("View: {}", mode.as_str());
                Ok(())
            }
        }
    }
}

/// Build the dashboard over the on-disk store. A configured provider is only
/// required when the command is going to hit the network.
fn open_dashboard(
    config: &Config,
    online: bool,
    needs_provider: bool,
) -> anyhow::Result<Dashboard<FileStore>> {
    let provider: Box<dyn WeatherProvider> = if needs_provider {
        provider_from_config(config)?
    } else {
        Box::new(OpenWeatherProvider::with_base_url(
            config.api_key().unwrap_or_default(),
            &config.provider.base_url,
        ))
    };

    let store_path = Config::store_file_path()?;
    tracing::debug!(path = %store_path.display(), "Opening store");

    Ok(Dashboard::load(
        FileStore::open(store_path),
        provider,
        FallbackNotifier::new(Some(Box::new(TerminalNotifier))),
        Box::new(ConnectivityFlag::new(online)),
        config.forecast.hourly_cutoff,
    ))
}

async fn show(
    city: Option<String>,
    here: bool,
    position: Option<Coordinates>,
    offline: bool,
    view: Option<ViewArg>,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let wants_fetch = here || city.is_some();
    let mut dashboard = open_dashboard(&config, !offline, wants_fetch && !offline)?;

    let result = if here {
        let geolocator: Box<dyn Geolocator> = match position {
            Some(coords) => Box::new(FixedPosition::new(Some(coords))),
            None => Box::new(IpGeolocator::new(config.geolocation.base_url.clone())),
        };
        dashboard.use_current_location(geolocator.as_ref()).await.map(Some)
    } else if let Some(city) = &city {
        dashboard.search(city).await
    } else {
        Ok(None)
    };

    flush_toasts(&dashboard);

    let state = dashboard.state();
    if let Some(snapshot) = &state.current {
        let palette = palette(state.preferences.theme);
        print!("{}", render::current(snapshot, state.source, &palette));
        println!();

        let mode = view.map(ViewMode::from).unwrap_or(state.preferences.view_mode);
        let now = Local::now();
        match mode {
            ViewMode::Daily => print!(
                "{}",
                render::daily(&dashboard.daily_view(now.weekday()), snapshot.units, &palette)
            ),
            ViewMode::Hourly => print!(
                "{}",
                render::hourly(&dashboard.hourly_view(now.fixed_offset()), snapshot.units, &palette)
            ),
        }
    }

    match result {
        Err(err) => bail!("{}", err.user_message()),
        Ok(_) if state.current.is_none() => {
            bail!("Nothing to show yet. Run `skydeck show <city>` or `skydeck show --here`.")
        }
        Ok(Some(FetchSource::Cache)) => {
            tracing::info!("Served from cache");
            Ok(())
        }
        Ok(_) => Ok(()),
    }
}

/// Theme colors, only when stdout is an interactive terminal.
fn palette(theme: Theme) -> render::Palette {
    render::Palette::new(theme, std::io::stdout().is_terminal())
}

fn flush_toasts(dashboard: &Dashboard<FileStore>) {
    for toast in dashboard.notifier().tray().drain(Utc::now()) {
        eprintln!("{}", toast.text);
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("OpenWeather API key:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    config.set_api_key(api_key);

    let options = vec!["noon", "end_of_day"];
    let starting = match config.forecast.hourly_cutoff {
        HourlyCutoff::Noon => 0,
        HourlyCutoff::EndOfDay => 1,
    };
    let cutoff = Select::new("Hourly forecast runs until (next day):", options)
        .with_starting_cursor(starting)
        .prompt()
        .context("Failed to read hourly cutoff")?;
    config.forecast.hourly_cutoff =
        if cutoff == "end_of_day" { HourlyCutoff::EndOfDay } else { HourlyCutoff::Noon };

    config.save()?;
    println!("Configuration saved to {}", Config::config_file_path()?.display());
    Ok(())
}
