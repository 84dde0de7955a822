//! Literal rendering.

use tracing::warn;

use super::literal::{lex, unstringify, unstringify_or, DateTime, Literal, Quantity, Shape};
use crate::cache::LruMap;
use crate::model::TypedValue;
use crate::Result;

const COMMONS_FILE_URL: &str = "https://commons.wikimedia.org/wiki/File:";
const MAP_QUERY_URL: &str = "http://maps.google.com/maps?q=";

/// Secondary lookups a renderer needs from the graph.
pub trait LabelSource {
    /// First label of `node` in `lang`, as stored.
    fn node_label(&self, node: &str, lang: &str) -> Result<Option<String>>;

    /// Label of the language item whose code is `code`.
    fn language_label(&self, code: &str, lang: &str) -> Result<Option<String>>;

    /// URL template registered for `relationship`, with `$1` as placeholder.
    fn formatter_template(&self, relationship: &str) -> Result<Option<String>>;
}

/// Memoized secondary lookups, failures included.
pub struct ValueCaches {
    units: LruMap<(String, String), Option<String>>,
    languages: LruMap<(String, String), Option<String>>,
    formatters: LruMap<String, Option<String>>,
}

impl ValueCaches {
    pub fn new(capacity: usize) -> Self {
        Self {
            units: LruMap::new(capacity),
            languages: LruMap::new(capacity),
            formatters: LruMap::new(capacity),
        }
    }

    pub fn clear(&self) {
        self.units.clear();
        self.languages.clear();
        self.formatters.clear();
    }
}

/// What the edge row says about the value being rendered.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueContext<'a> {
    pub relationship: &'a str,
    pub wikidatatype: Option<&'a str>,
    pub label: Option<&'a str>,
    pub description: Option<&'a str>,
    pub lang: &'a str,
}

/// Turns raw cells into `TypedValue`s.
pub struct ValueRenderer<'a, S: ?Sized> {
    source: &'a S,
    caches: &'a ValueCaches,
}

impl<'a, S: LabelSource + ?Sized> ValueRenderer<'a, S> {
    pub fn new(source: &'a S, caches: &'a ValueCaches) -> Self {
        Self { source, caches }
    }

    /// Render one cell. Malformed literals never fail; only the secondary
    /// lookups can.
    pub fn render(&self, token: &str, ctx: &ValueContext<'_>) -> Result<TypedValue> {
        if ctx.wikidatatype == Some("external-id") {
            return self.external_id(token, ctx.relationship);
        }

        let value = match lex(token) {
            Literal::Symbol(node) if node.starts_with(['P', 'Q']) => TypedValue::Item {
                node: node.to_string(),
                text: unstringify_or(ctx.label, node),
                description: unstringify_or(ctx.description, node),
            },
            Literal::LanguageString { text, lang, suffix } => {
                let code = format!("{lang}{suffix}");
                let url = sniff_url(&text);
                TypedValue::Text {
                    lang: self.language_name(&code, ctx.lang)?,
                    text,
                    url,
                }
            }
            Literal::String(text) => {
                let url = sniff_url(&text);
                TypedValue::String { text, url }
            }
            Literal::Number(number) => TypedValue::Quantity {
                text: strip_plus(number).to_string(),
                units: None,
                unit_node: None,
            },
            Literal::Quantity(q) => self.quantity(&q, ctx.lang)?,
            Literal::DateTime(d) => TypedValue::Time {
                text: format_time(&d).unwrap_or_else(|| token[1..].to_string()),
            },
            Literal::Location { lat, lon } => TypedValue::Geo {
                text: format_dms(lat, lon),
                lat: Some(lat),
                lon: Some(lon),
                url: map_url(&token[1..]),
            },
            Literal::Malformed { shape: Shape::Number, raw } => TypedValue::Quantity {
                text: raw.to_string(),
                units: None,
                unit_node: None,
            },
            Literal::Malformed { shape: Shape::DateTime, raw } => TypedValue::Time {
                text: raw[1..].to_string(),
            },
            Literal::Malformed { shape: Shape::Location, raw } => TypedValue::Geo {
                text: raw[1..].to_string(),
                lat: None,
                lon: None,
                url: map_url(&raw[1..]),
            },
            _ => {
                warn!(token, relationship = ctx.relationship, "unknown literal kind");
                TypedValue::Unknown { text: token.to_string() }
            }
        };
        Ok(value)
    }

    fn external_id(&self, token: &str, relationship: &str) -> Result<TypedValue> {
        let text = unstringify(token);
        let url = match self.formatter(relationship)? {
            Some(template) => Some(template.replace("$1", &text)),
            None => sniff_url(&text),
        };
        Ok(TypedValue::ExternalId { text, url })
    }

    fn quantity(&self, q: &Quantity<'_>, lang: &str) -> Result<TypedValue> {
        let mut text = strip_plus(q.number).to_string();
        if q.low.is_some() || q.high.is_some() {
            text.push('[');
            text.push_str(q.low.map(strip_plus).unwrap_or_default());
            text.push(',');
            text.push_str(q.high.map(strip_plus).unwrap_or_default());
            text.push(']');
        }

        let mut units = None;
        let mut unit_node = None;
        if let Some(si) = q.si_units {
            text.push_str(si);
            units = Some(si.to_string());
        }
        if let Some(node) = q.units_node {
            let shown = self.unit_label(node, lang)?.unwrap_or_else(|| node.to_string());
            text.push(' ');
            text.push_str(&shown);
            units = Some(shown);
            unit_node = Some(node.to_string());
        }
        Ok(TypedValue::Quantity { text, units, unit_node })
    }

    fn unit_label(&self, node: &str, lang: &str) -> Result<Option<String>> {
        self.caches
            .units
            .get_or_try_insert((node.to_string(), lang.to_string()), || {
                Ok(self.source.node_label(node, lang)?.map(|l| unstringify(&l)))
            })
    }

    /// Full tag first, then the base subtag, then the raw code.
    fn language_name(&self, code: &str, lang: &str) -> Result<String> {
        if let Some(name) = self.language_lookup(code, lang)? {
            return Ok(name);
        }
        if let Some((base, _)) = code.split_once('-') {
            if let Some(name) = self.language_lookup(base, lang)? {
                return Ok(name);
            }
        }
        Ok(code.to_string())
    }

    fn language_lookup(&self, code: &str, lang: &str) -> Result<Option<String>> {
        self.caches
            .languages
            .get_or_try_insert((code.to_string(), lang.to_string()), || {
                Ok(self.source.language_label(code, lang)?.map(|l| unstringify(&l)))
            })
    }

    fn formatter(&self, relationship: &str) -> Result<Option<String>> {
        self.caches
            .formatters
            .get_or_try_insert(relationship.to_string(), || {
                Ok(self
                    .source
                    .formatter_template(relationship)?
                    .map(|t| unstringify(&t)))
            })
    }
}

fn strip_plus(number: &str) -> &str {
    number.strip_prefix('+').unwrap_or(number)
}

/// Links for text that looks like a URL or a Commons file name.
pub fn sniff_url(text: &str) -> Option<String> {
    if text.starts_with("https://") || text.starts_with("http://") {
        Some(text.to_string())
    } else if text.ends_with(".jpg") || text.ends_with(".svg") {
        Some(format!("{COMMONS_FILE_URL}{text}"))
    } else {
        None
    }
}

fn map_url(payload: &str) -> String {
    format!("{MAP_QUERY_URL}{}", payload.replace('/', ","))
}

/// Render a date at its declared precision, or `None` when the precision
/// is unsupported or the needed fields are missing.
pub fn format_time(d: &DateTime<'_>) -> Option<String> {
    let year = d.year.strip_prefix('+').unwrap_or(d.year);
    match d.precision? {
        0..=9 => Some(year.to_string()),
        10 => Some(format!("{year}-{}", d.month?)),
        11 => Some(format!("{year}-{}-{}", d.month?, d.day?)),
        12 | 13 => Some(format!(
            "{year}-{}-{} {}:{}",
            d.month?, d.day?, d.hour?, d.minutes?
        )),
        _ => None,
    }
}

/// Degree-minute-second rendering, e.g. `43°15'42.9"N, 10°55'37.5"E`.
pub fn format_dms(lat: f64, lon: f64) -> String {
    format!("{}, {}", dms(lat, 'N', 'S'), dms(lon, 'E', 'W'))
}

fn dms(value: f64, positive: char, negative: char) -> String {
    let hemisphere = if value < 0.0 { negative } else { positive };
    // Tenths of an arc-second, so rounding carries into minutes and degrees.
    let tenths = (value.abs() * 36_000.0).round() as u64;
    let degrees = tenths / 36_000;
    let minutes = (tenths % 36_000) / 600;
    let seconds = tenths % 600;
    format!(
        "{degrees}°{minutes}'{}.{}\"{hemisphere}",
        seconds / 10,
        seconds % 10
    )
}
