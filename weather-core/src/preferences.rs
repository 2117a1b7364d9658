//! Persisted user preferences: theme, unit, favorites and the last search.
//!
//! Stores expose a get/set/subscribe surface only. Serialization uses the
//! logical keys `theme`, `unit`, `favorites` and `lastSearched`.

use directories::ProjectDirs;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, path::PathBuf};
use tokio::sync::watch;

use crate::{error::PreferenceError, model::UnitSystem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    #[default]
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    pub theme: Theme,
    pub unit: UnitSystem,
    /// Insertion-ordered, no duplicates.
    pub favorites: Vec<String>,
    pub last_searched: String,
}

impl Preferences {
    pub fn is_favorite(&self, name: &str) -> bool {
        self.favorites.iter().any(|f| f == name)
    }

    /// Add `name` if absent, remove it if present. Returns whether it is now a favorite.
    pub fn toggle_favorite(&mut self, name: &str) -> bool {
        if let Some(pos) = self.favorites.iter().position(|f| f == name) {
            self.favorites.remove(pos);
            false
        } else {
            self.favorites.push(name.to_string());
            true
        }
    }
}

pub trait PreferenceStore: Send + Sync + Debug {
    fn get(&self) -> Preferences;

    fn set(&self, prefs: Preferences) -> Result<(), PreferenceError>;

    /// Read-modify-write as one step with respect to other writers of this store.
    fn update(&self, apply: &mut dyn FnMut(&mut Preferences)) -> Result<Preferences, PreferenceError>;

    /// Receives every value passed to `set`.
    fn subscribe(&self) -> watch::Receiver<Preferences>;
}

/// Preferences that live only as long as the process.
#[derive(Debug)]
pub struct MemoryPreferenceStore {
    tx: watch::Sender<Preferences>,
}

impl MemoryPreferenceStore {
    pub fn new(initial: Preferences) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }
}

impl Default for MemoryPreferenceStore {
    fn default() -> Self {
        Self::new(Preferences::default())
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self) -> Preferences {
        self.tx.borrow().clone()
    }

    fn set(&self, prefs: Preferences) -> Result<(), PreferenceError> {
        self.tx.send_replace(prefs);
        Ok(())
    }

    fn update(&self, apply: &mut dyn FnMut(&mut Preferences)) -> Result<Preferences, PreferenceError> {
        self.tx.send_modify(|p| apply(p));
        Ok(self.tx.borrow().clone())
    }

    fn subscribe(&self) -> watch::Receiver<Preferences> {
        self.tx.subscribe()
    }
}

/// JSON file backed preferences.
#[derive(Debug)]
pub struct FilePreferenceStore {
    path: PathBuf,
    tx: watch::Sender<Preferences>,
    write_lock: Mutex<()>,
}

impl FilePreferenceStore {
    /// Open the store in the platform data directory.
    pub fn open_default() -> Result<Self, PreferenceError> {
        let dirs = ProjectDirs::from("dev", "weather-dashboard", "weather")
            .ok_or(PreferenceError::NoDataDir)?;
        Ok(Self::open(dirs.data_dir().join("preferences.json")))
    }

    /// A missing or unreadable file starts from defaults rather than failing.
    pub fn open(path: PathBuf) -> Self {
        let initial = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt preferences file");
                Preferences::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Preferences::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read preferences file");
                Preferences::default()
            }
        };

        let (tx, _rx) = watch::channel(initial);
        Self {
            path,
            tx,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Callers hold `write_lock`.
    fn write(&self, prefs: Preferences) -> Result<(), PreferenceError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&prefs)?;
        fs::write(&self.path, json)?;

        self.tx.send_replace(prefs);
        Ok(())
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self) -> Preferences {
        self.tx.borrow().clone()
    }

    fn set(&self, prefs: Preferences) -> Result<(), PreferenceError> {
        let _guard = self.write_lock.lock();
        self.write(prefs)
    }

    fn update(&self, apply: &mut dyn FnMut(&mut Preferences)) -> Result<Preferences, PreferenceError> {
        let _guard = self.write_lock.lock();
        let mut prefs = self.get();
        apply(&mut prefs);
        self.write(prefs.clone())?;
        Ok(prefs)
    }

    fn subscribe(&self) -> watch::Receiver<Preferences> {
        self.tx.subscribe()
    }
}
