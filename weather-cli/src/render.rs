use weather_core::{FetchState, NormalizedWeather};

pub fn card(w: &NormalizedWeather) -> String {
    let unit = w.unit;
    let mut lines = vec![
        w.display_name(),
        format!(
            "  {:.1}°{} (feels like {:.1}°{}), {}",
            w.temperature,
            unit.symbol(),
            w.feels_like,
            unit.symbol(),
            w.condition
        ),
    ];

    if let Some(h) = w.humidity_pct {
        lines.push(format!("  humidity  {h}%"));
    }
    if let Some(speed) = w.wind_speed {
        lines.push(format!("  wind      {speed:.1} {}", unit.speed_label()));
    }
    if let Some(p) = w.pressure_hpa {
        lines.push(format!("  pressure  {p} hPa"));
    }
    if let Some(c) = w.coordinates {
        lines.push(format!("  location  {:.2}, {:.2}", c.lat, c.lon));
    }
    if let Some(at) = w.observed_at() {
        lines.push(format!("  observed  {}", at.format("%Y-%m-%d %H:%M UTC")));
    }

    lines.join("\n")
}

/// One block per published state; `None` when there is nothing worth printing.
pub fn state(s: &FetchState) -> Option<String> {
    if s.loading {
        return Some("… loading".to_string());
    }
    if let Some(err) = &s.error {
        return Some(format!("! {}", err.message));
    }
    let data = s.data.as_ref()?;
    let mut out = card(data);
    if s.served_from_cache {
        out.push_str("\n  (served from cache)");
    }
    Some(out)
}
