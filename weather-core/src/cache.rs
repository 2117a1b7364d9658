use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};

use crate::model::{CacheKey, NormalizedWeather};

/// In-memory map from `(city, unit)` to the last successful lookup.
///
/// Cloning yields another handle to the same map. Separate `new()` calls never
/// share entries. Entries live as long as the cache does; there is no expiry
/// and no eviction.
#[derive(Debug, Clone, Default)]
pub struct ResponseCache {
    entries: Arc<RwLock<HashMap<CacheKey, NormalizedWeather>>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<NormalizedWeather> {
        self.entries.read().get(key).cloned()
    }

    /// Last write wins.
    pub fn set(&self, key: CacheKey, value: NormalizedWeather) {
        self.entries.write().insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UnitSystem;

    fn sample(city: &str, temperature: f64) -> NormalizedWeather {
        NormalizedWeather {
            city: city.into(),
            country: String::new(),
            timestamp_ms: 0,
            temperature,
            feels_like: temperature,
            condition: "clear sky".into(),
            condition_code: 800,
            humidity_pct: None,
            wind_speed: None,
            pressure_hpa: None,
            coordinates: None,
            unit: UnitSystem::Metric,
        }
    }

    #[test]
    fn lookup_uses_normalized_key() {
        let cache = ResponseCache::new();
        cache.set(CacheKey::new("Paris", UnitSystem::Metric), sample("Paris", 12.0));

        let hit = cache.get(&CacheKey::new(" PARIS ", UnitSystem::Metric));
        assert_eq!(hit.map(|w| w.temperature), Some(12.0));
        assert!(cache.get(&CacheKey::new("Paris", UnitSystem::Imperial)).is_none());
    }

    #[test]
    fn set_overwrites_existing_entry() {
        let cache = ResponseCache::new();
        let key = CacheKey::new("Oslo", UnitSystem::Metric);
        cache.set(key.clone(), sample("Oslo", 1.0));
        cache.set(key.clone(), sample("Oslo", 2.0));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&key).unwrap().temperature, 2.0);
    }

    #[test]
    fn independent_instances_do_not_share_entries() {
        let a = ResponseCache::new();
        let b = ResponseCache::new();
        let shared = a.clone();

        a.set(CacheKey::new("Rome", UnitSystem::Metric), sample("Rome", 20.0));

        assert_eq!(shared.len(), 1);
        assert!(b.is_empty());

        shared.clear();
        assert!(a.is_empty());
    }
}
