use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use inquire::{Confirm, Password, Text};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use weather_core::{
    ClientConfig, ClientKind, Config, ControllerOptions, FetchController, FilePreferenceStore,
    PreferenceStore, ResolveOutcome, ResponseCache, UnitSystem, default_client_from_config,
};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure a client: "openweather" (API key) or "proxy" (URL).
    Configure {
        client: String,
    },

    /// Show current conditions for a city.
    Show {
        city: String,

        /// "metric" or "imperial"; defaults to the saved preference.
        #[arg(long)]
        units: Option<String>,
    },

    /// Type cities and commands; results render as they arrive.
    Interactive,

    /// List saved favorite cities.
    Favorites,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { client } => configure(&client),
            Command::Show { city, units } => show(&city, units.as_deref()).await,
            Command::Interactive => interactive(build_controller()?).await,
            Command::Favorites => {
                let prefs = FilePreferenceStore::open_default()?;
                let favorites = prefs.get().favorites;
                if favorites.is_empty() {
                    println!("No favorites yet.");
                }
                for city in favorites {
                    println!("{city}");
                }
                Ok(())
            }
        }
    }
}

fn build_controller() -> anyhow::Result<FetchController> {
    let config = Config::load()?;
    let client = default_client_from_config(&config)?;
    let prefs = FilePreferenceStore::open_default().context("Failed to open preferences")?;
    tracing::debug!(path = %prefs.path().display(), "preferences loaded");

    Ok(FetchController::new(
        client,
        ResponseCache::new(),
        Arc::new(prefs),
        ControllerOptions::from(&config),
    ))
}

fn configure(client: &str) -> anyhow::Result<()> {
    let kind = ClientKind::try_from(client)?;
    let mut config = Config::load()?;

    if config.is_client_configured(kind) {
        println!("'{kind}' is already configured; the values you enter replace the current ones.");
    }

    let entry = match kind {
        ClientKind::OpenWeather => {
            let key = Password::new("OpenWeather API key:")
                .without_confirmation()
                .prompt()
                .context("Failed to read API key")?;
            ClientConfig {
                api_key: Some(key.trim().to_string()),
                base_url: config.client_base_url(kind).map(str::to_owned),
            }
        }
        ClientKind::Proxy => {
            let url = Text::new("Proxy URL:")
                .with_default("http://localhost:8080")
                .prompt()
                .context("Failed to read proxy URL")?;
            ClientConfig {
                api_key: None,
                base_url: Some(url.trim().to_string()),
            }
        }
    };

    config.upsert_client(kind, entry);

    if config.default_client_kind().ok() != Some(kind) {
        let make_default = Confirm::new(&format!("Make '{kind}' the default client?"))
            .with_default(true)
            .prompt()
            .context("Failed to read answer")?;
        if make_default {
            config.set_default_client(kind);
        }
    }

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn show(city: &str, units: Option<&str>) -> anyhow::Result<()> {
    let controller = build_controller()?;
    let unit = match units {
        Some(u) => UnitSystem::try_from(u)?,
        None => controller.unit(),
    };

    match controller.resolve(city, unit).await {
        ResolveOutcome::Fetched | ResolveOutcome::CacheHit => {
            if let Some(data) = controller.state().data {
                println!("{}", render::card(&data));
            }
            Ok(())
        }
        ResolveOutcome::Failed(e) => bail!("{}", e.user_message()),
        ResolveOutcome::Superseded | ResolveOutcome::Skipped => {
            bail!("No weather to show for '{city}'")
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Search(&'a str),
    ToggleUnit,
    Retry,
    Favorite(Option<&'a str>),
    ListFavorites,
    ToggleTheme,
    Clear,
    Help,
    Quit,
    Unknown(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    let Some(command) = line.strip_prefix(':') else {
        return Input::Search(line);
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, Some(rest.trim()).filter(|r| !r.is_empty())),
        None => (command, None),
    };

    match name {
        "unit" | "u" => Input::ToggleUnit,
        "retry" | "r" => Input::Retry,
        "fav" => Input::Favorite(arg),
        "favs" => Input::ListFavorites,
        "theme" => Input::ToggleTheme,
        "clear" => Input::Clear,
        "help" | "h" => Input::Help,
        "quit" | "q" => Input::Quit,
        other => Input::Unknown(other),
    }
}

const HELP: &str = "\
Type a city to search. Commands:
  :unit          switch metric/imperial and refetch
  :retry         search the last city again
  :fav [city]    toggle a favorite (defaults to the city shown)
  :favs          list favorites
  :theme         switch dark/light
  :clear         clear the display
  :quit          exit";

fn spawn_renderer(mut rx: tokio::sync::watch::Receiver<weather_core::FetchState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        // Ends once every controller handle is gone and the last state is printed.
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            if let Some(block) = render::state(&snapshot) {
                println!("{block}");
            }
        }
    })
}

/// Wait for spawned commands, then for queued searches and fetches in flight.
async fn settle(controller: &FetchController, tasks: &TaskTracker) {
    tasks.close();
    tasks.wait().await;
    controller.settled().await;
}

async fn interactive(controller: FetchController) -> anyhow::Result<()> {
    let renderer = spawn_renderer(controller.subscribe());
    let tasks = TaskTracker::new();

    println!("{HELP}");
    println!("units: {}", controller.unit());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read from stdin")? {
        match parse_input(&line) {
            Input::Search(city) => controller.search(city),
            Input::ToggleUnit => {
                let c = controller.clone();
                tasks.spawn(async move { c.toggle_unit().await });
                println!("units: {}", controller.unit());
            }
            Input::Retry => {
                let c = controller.clone();
                tasks.spawn(async move { c.retry().await });
            }
            Input::Favorite(city) => {
                let favorites = controller.toggle_favorite(city)?;
                println!("favorites: {}", favorites.join(", "));
            }
            Input::ListFavorites => println!("favorites: {}", controller.favorites().join(", ")),
            Input::ToggleTheme => {
                let theme = controller.toggle_theme()?;
                println!("theme: {theme:?}");
            }
            Input::Clear => controller.clear(),
            Input::Help => println!("{HELP}"),
            Input::Quit => {
                renderer.abort();
                return Ok(());
            }
            Input::Unknown(name) => println!("unknown command ':{name}' (try :help)"),
        }
    }

    // End of input: show what was already asked for before exiting.
    settle(&controller, &tasks).await;
    drop(controller);
    renderer.await.context("Renderer task failed")?;
    Ok(())
}
