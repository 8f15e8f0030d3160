//! Prometheus text exposition format.
//!
//! Parses the subset of the exposition format emitted by the node
//! exporters (`name{labels} value`) into a flat [`MetricSnapshot`], and
//! renders snapshots back into the same format.

use std::collections::{BTreeMap, HashSet};

use regex::Regex;
use tracing::debug;

/// Metric values from a single scrape, keyed by metric name.
///
/// Labels are discarded; when a name appears on several lines the last
/// one wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSnapshot {
    values: BTreeMap<String, f64>,
}

impl MetricSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Value of `name`, or `default` when the metric was absent.
    pub fn get_or(&self, name: &str, default: f64) -> f64 {
        self.get(name).unwrap_or(default)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, f64)> for MetricSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Line parser for the exposition subset.
#[derive(Debug, Clone)]
pub struct ExpositionParser {
    /// Metric name immediately before the opening brace.
    name_re: Regex,
    /// Numeric token following the closing brace.
    value_re: Regex,
}

impl ExpositionParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            name_re: Regex::new(r"^([a-zA-Z0-9_]+)\{")?,
            value_re: Regex::new(r"^\s+([0-9.eE+\-]+)")?,
        })
    }

    /// Parse `body`, keeping only metrics named in `targets`.
    pub fn parse(&self, body: &str, targets: &HashSet<String>) -> MetricSnapshot {
        self.parse_filtered(body, |name| targets.contains(name))
    }

    /// Parse `body`, keeping every well-formed metric.
    pub fn parse_all(&self, body: &str) -> MetricSnapshot {
        self.parse_filtered(body, |_| true)
    }

    fn parse_filtered(&self, body: &str, keep: impl Fn(&str) -> bool) -> MetricSnapshot {
        let mut snapshot = MetricSnapshot::new();

        for line in body.lines() {
            if line.starts_with('#') || !line.contains('{') || !line.contains('}') {
                continue;
            }

            let Some(name) = self.name_re.captures(line).and_then(|c| c.get(1)) else {
                debug!(line, "skipping metric line without a valid name");
                continue;
            };
            let name = name.as_str();
            if !keep(name) {
                continue;
            }

            let Some(close) = line.rfind('}') else {
                continue;
            };
            let Some(token) = self
                .value_re
                .captures(&line[close + 1..])
                .and_then(|c| c.get(1))
            else {
                debug!(metric = name, line, "skipping metric line without a numeric value");
                continue;
            };

            let value = token.as_str().parse::<f64>().unwrap_or_else(|_| {
                debug!(metric = name, token = token.as_str(), "unparsable value, using 0");
                0.0
            });
            snapshot.insert(name, value);
        }

        snapshot
    }
}

/// Render a snapshot into Prometheus text format.
///
/// Every metric is emitted as a gauge with an empty label set, which is
/// the shape the node exporters publish.
pub fn render_exposition(snapshot: &MetricSnapshot) -> String {
    let mut out = String::new();
    for (name, value) in snapshot.iter() {
        out.push_str(&format!("# TYPE {name} gauge\n"));
        out.push_str(&format!("{name}{{}} {value}\n"));
    }
    out
}
