//! Presentation of resolved weather.
//!
//! Renderers consume finished results; they never talk to the cache or the
//! provider. Pick one with [`RenderFormat`].

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::error::{CodecError, ResolveError};
use crate::types::{CurrentConditions, DayForecast, DayWeather, Origin, WeatherResult};

/// Output strategy for resolved weather and resolution errors.
pub trait WeatherRenderer: Send + Sync {
    /// MIME type of the rendered output.
    fn content_type(&self) -> &'static str;

    fn render(&self, result: &WeatherResult) -> Result<String, CodecError>;

    fn render_day(&self, day: &DayWeather) -> Result<String, CodecError>;

    fn render_error(&self, error: &ResolveError) -> String;
}

/// Selectable output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderFormat {
    #[default]
    Json,
    Html,
}

impl RenderFormat {
    /// HTMX requests (`HX-Request: true`) get an HTML fragment, everything
    /// else gets JSON.
    pub fn for_request(hx_request: Option<&str>) -> Self {
        match hx_request {
            Some(value) if value.trim().eq_ignore_ascii_case("true") => Self::Html,
            _ => Self::Json,
        }
    }

    pub fn renderer(&self) -> Box<dyn WeatherRenderer> {
        match self {
            Self::Json => Box::new(JsonRenderer::default()),
            Self::Html => Box::new(HtmlRenderer),
        }
    }
}

impl FromStr for RenderFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "html" => Ok(Self::Html),
            _ => Err(format!("Unknown format '{}'. Use json or html.", s)),
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    location: &'a str,
    weather: &'a T,
    #[serde(skip_serializing_if = "Option::is_none")]
    current: Option<&'a CurrentConditions>,
    source: Origin,
    timestamp: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    kind: &'a str,
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// JSON envelope: `{location, weather, source, timestamp}`.
#[derive(Debug, Clone, Default)]
pub struct JsonRenderer {
    pub pretty: bool,
}

impl JsonRenderer {
    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    fn serialize<T: Serialize>(&self, value: &T) -> Result<String, CodecError> {
        let out = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        out.map_err(|e| CodecError::Encode(e.to_string()))
    }
}

impl WeatherRenderer for JsonRenderer {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn render(&self, result: &WeatherResult) -> Result<String, CodecError> {
        self.serialize(&Envelope {
            location: &result.location,
            weather: &result.record,
            current: None,
            source: result.origin,
            timestamp: timestamp(&result.observed_at),
        })
    }

    fn render_day(&self, day: &DayWeather) -> Result<String, CodecError> {
        self.serialize(&Envelope {
            location: &day.location,
            weather: &day.day,
            current: day.current.as_ref(),
            source: day.origin,
            timestamp: timestamp(&day.observed_at),
        })
    }

    fn render_error(&self, error: &ResolveError) -> String {
        let body = ErrorBody {
            error: error.user_message(),
            kind: error.kind(),
        };
        // Plain strings only, serialization cannot fail here
        self.serialize(&body)
            .unwrap_or_else(|_| format!("{{\"error\":\"{}\"}}", error.kind()))
    }
}

/// HTML fragment suitable for swapping into a page.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl HtmlRenderer {
    fn header(out: &mut String, title: &str, origin: Origin, at: &DateTime<Utc>) {
        out.push_str(&format!(
            "<div class=\"weather-results\" data-source=\"{}\">\n",
            origin
        ));
        out.push_str(&format!("  <h2 class=\"location\">{}</h2>\n", escape(title)));
        out.push_str(&format!(
            "  <p class=\"meta\">Source: <span class=\"source {0}\">{0}</span> at <time datetime=\"{1}\">{1}</time></p>\n",
            origin,
            timestamp(at)
        ));
    }

    fn current(out: &mut String, current: &CurrentConditions) {
        let condition = current.condition();
        let label = current
            .conditions
            .as_deref()
            .unwrap_or(condition.description());
        out.push_str(&format!(
            "  <div class=\"current\"><span class=\"glyph\">{}</span> {} {}",
            condition.glyph(),
            degrees(current.temp),
            escape(label)
        ));
        if let Some(feels) = current.feelslike {
            out.push_str(&format!(", feels like {}", degrees(Some(feels))));
        }
        if let Some(humidity) = current.humidity {
            out.push_str(&format!(", humidity {:.0}%", humidity));
        }
        if let Some(wind) = current.windspeed {
            out.push_str(&format!(", wind {:.1}", wind));
        }
        out.push_str("</div>\n");
    }

    fn day_row(out: &mut String, day: &DayForecast) {
        let condition = day.condition();
        let label = day.conditions.as_deref().unwrap_or(condition.description());
        out.push_str(&format!(
            "    <tr><td>{}</td><td><span class=\"glyph\">{}</span> {}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            day.datetime.format("%a %d %b"),
            condition.glyph(),
            escape(label),
            degrees(day.tempmax),
            degrees(day.tempmin),
            day.precipprob
                .map(|p| format!("{:.0}%", p))
                .unwrap_or_else(|| "-".to_string())
        ));
    }

    fn table(out: &mut String, days: &[DayForecast]) {
        if days.is_empty() {
            return;
        }
        out.push_str("  <table class=\"days\">\n");
        out.push_str("    <tr><th>Date</th><th>Conditions</th><th>High</th><th>Low</th><th>Precip</th></tr>\n");
        for day in days {
            Self::day_row(out, day);
        }
        out.push_str("  </table>\n");
    }
}

impl WeatherRenderer for HtmlRenderer {
    fn content_type(&self) -> &'static str {
        "text/html; charset=utf-8"
    }

    fn render(&self, result: &WeatherResult) -> Result<String, CodecError> {
        let record = &result.record;
        let title = record.display_name().unwrap_or(&result.location);

        let mut out = String::new();
        Self::header(&mut out, title, result.origin, &result.observed_at);
        if let Some(description) = &record.description {
            out.push_str(&format!("  <p class=\"summary\">{}</p>\n", escape(description)));
        }
        if let Some(current) = &record.current_conditions {
            Self::current(&mut out, current);
        }
        Self::table(&mut out, &record.days);
        out.push_str("</div>\n");
        Ok(out)
    }

    fn render_day(&self, day: &DayWeather) -> Result<String, CodecError> {
        let mut out = String::new();
        Self::header(&mut out, &day.location, day.origin, &day.observed_at);
        if let Some(description) = &day.day.description {
            out.push_str(&format!("  <p class=\"summary\">{}</p>\n", escape(description)));
        }
        Self::table(&mut out, std::slice::from_ref(&day.day));
        out.push_str("</div>\n");
        Ok(out)
    }

    fn render_error(&self, error: &ResolveError) -> String {
        format!(
            "<div class=\"weather-error\" role=\"alert\" data-kind=\"{}\">{}</div>\n",
            error.kind(),
            escape(&error.user_message())
        )
    }
}

fn degrees(value: Option<f64>) -> String {
    value
        .map(|t| format!("{:.1}°", t))
        .unwrap_or_else(|| "-".to_string())
}

/// Escape text for HTML element content and quoted attributes.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use chrono::{NaiveDate, TimeZone};
    use serde_json::Value;

    const PAYLOAD: &str = r#"{
        "resolvedAddress": "Paris, Île-de-France, France",
        "address": "paris",
        "description": "Rain <b>Tuesday</b>",
        "queryCost": 1,
        "days": [
            {"datetime": "2024-07-15", "tempmax": 78.4, "tempmin": 61.2, "precipprob": 12, "conditions": "Partially cloudy", "icon": "partly-cloudy-day"},
            {"datetime": "2024-07-16", "tempmax": 74.0, "tempmin": 60.1, "conditions": "Rain", "icon": "rain"}
        ],
        "currentConditions": {"temp": 75.2, "humidity": 48.0, "conditions": "Partially cloudy", "icon": "partly-cloudy-day"}
    }"#;

    fn result(origin: Origin) -> WeatherResult {
        WeatherResult {
            location: "Paris".to_string(),
            record: codec::decode(PAYLOAD.as_bytes()).unwrap(),
            origin,
            observed_at: Utc.with_ymd_and_hms(2024, 7, 15, 14, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_format_for_request() {
        assert_eq!(RenderFormat::for_request(Some("true")), RenderFormat::Html);
        assert_eq!(RenderFormat::for_request(Some("TRUE")), RenderFormat::Html);
        assert_eq!(RenderFormat::for_request(Some("false")), RenderFormat::Json);
        assert_eq!(RenderFormat::for_request(None), RenderFormat::Json);

        assert_eq!(RenderFormat::Json.renderer().content_type(), "application/json");
        assert_eq!(
            RenderFormat::Html.renderer().content_type(),
            "text/html; charset=utf-8"
        );
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("json".parse::<RenderFormat>(), Ok(RenderFormat::Json));
        assert_eq!("HTML".parse::<RenderFormat>(), Ok(RenderFormat::Html));
        assert!("xml".parse::<RenderFormat>().is_err());
    }

    #[test]
    fn test_json_envelope() {
        let out = JsonRenderer::default().render(&result(Origin::Cache)).unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();

        assert_eq!(value["location"], "Paris");
        assert_eq!(value["source"], "cache");
        assert_eq!(value["timestamp"], "2024-07-15T14:00:00Z");
        assert_eq!(value["weather"]["resolvedAddress"], "Paris, Île-de-France, France");
        assert_eq!(value["weather"]["queryCost"], 1);
        assert_eq!(value["weather"]["days"].as_array().map(|d| d.len()), Some(2));
        assert!(value.get("current").is_none());
    }

    #[test]
    fn test_json_upstream_source_label() {
        let out = JsonRenderer::pretty().render(&result(Origin::Upstream)).unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["source"], "api");
    }

    #[test]
    fn test_json_day() {
        let full = result(Origin::Upstream);
        let date = NaiveDate::from_ymd_opt(2024, 7, 16).unwrap();
        let day = DayWeather {
            location: full.location.clone(),
            day: full.record.day(date).cloned().unwrap(),
            current: full.record.current_conditions.clone(),
            origin: full.origin,
            observed_at: full.observed_at,
        };

        let value: Value =
            serde_json::from_str(&JsonRenderer::default().render_day(&day).unwrap()).unwrap();
        assert_eq!(value["weather"]["datetime"], "2024-07-16");
        assert_eq!(value["current"]["temp"], 75.2);
    }

    #[test]
    fn test_json_error() {
        let value: Value =
            serde_json::from_str(&JsonRenderer::default().render_error(&ResolveError::Validation))
                .unwrap();
        assert_eq!(value["error"], "Location is required");
        assert_eq!(value["kind"], "validation");
    }

    #[test]
    fn test_html_fragment() {
        let out = HtmlRenderer.render(&result(Origin::Cache)).unwrap();

        assert!(out.starts_with("<div class=\"weather-results\" data-source=\"cache\">"));
        assert!(out.contains("Paris, Île-de-France, France"));
        assert!(out.contains("75.2°"));
        assert!(out.contains("humidity 48%"));
        assert!(out.contains("<td>78.4°</td>"));
        assert!(out.contains("<td>12%</td>"));
        assert_eq!(out.matches("<tr><td>").count(), 2);
    }

    #[test]
    fn test_html_escapes_provider_text() {
        let out = HtmlRenderer.render(&result(Origin::Upstream)).unwrap();
        assert!(out.contains("Rain &lt;b&gt;Tuesday&lt;/b&gt;"));
        assert!(!out.contains("<b>"));
    }

    #[test]
    fn test_html_error() {
        let err = ResolveError::DayNotFound {
            location: "paris".to_string(),
            date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
        };
        let out = HtmlRenderer.render_error(&err);
        assert!(out.contains("role=\"alert\""));
        assert!(out.contains("No forecast available for 2030-01-01"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a & b"), "a &amp; b");
        assert_eq!(escape("\"x\" <'y'>"), "&quot;x&quot; &lt;&#39;y&#39;&gt;");
    }
}
