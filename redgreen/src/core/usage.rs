//! Usage and cost accounting for model calls.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Unit in which request and response sizes are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeUnit {
    /// Token counts reported by the backend.
    Tokens,
    /// Kilobytes of JSON-encoded text, used when no token count is available.
    Kilobytes,
}

/// Measured size of one request or response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub amount: f64,
    pub unit: SizeUnit,
}

impl Size {
    pub fn tokens(count: u64) -> Self {
        Self {
            amount: count as f64,
            unit: SizeUnit::Tokens,
        }
    }

    /// Size of `text` once JSON-encoded, in kilobytes.
    pub fn json_kilobytes(text: &str) -> Self {
        let encoded = serde_json::to_string(text).map(|s| s.len()).unwrap_or(text.len());
        Self {
            amount: encoded as f64 / 1024.0,
            unit: SizeUnit::Kilobytes,
        }
    }
}

/// Request and response sizes for one call, always in the same unit.
///
/// Token counts are used only when the backend reports both; otherwise both
/// sides are measured in JSON kilobytes.
pub fn measure_call(
    prompt: &str,
    response: &str,
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
) -> (Size, Size) {
    match (input_tokens, output_tokens) {
        (Some(sent), Some(received)) => (Size::tokens(sent), Size::tokens(received)),
        _ => (Size::json_kilobytes(prompt), Size::json_kilobytes(response)),
    }
}

/// Linear cost estimate from the response size.
pub fn estimate_cost(response: Size, cost_per_1k: f64) -> f64 {
    response.amount * cost_per_1k / 1000.0
}

/// One completed model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Model that served the call.
    pub model: String,
    pub duration: Duration,
    pub sent: Size,
    pub received: Size,
    pub cost: f64,
}

/// Running totals for one (model, unit) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiStat {
    pub count: u32,
    pub duration_secs: f64,
    pub sent: f64,
    pub received: f64,
    pub cost: f64,
}

/// Per-session usage totals, grouped by model and size unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiStats {
    by_model: BTreeMap<String, BTreeMap<SizeUnit, ApiStat>>,
}

impl ApiStats {
    pub fn record(&mut self, call: &CallRecord) {
        let stat = self
            .by_model
            .entry(call.model.clone())
            .or_default()
            .entry(call.received.unit)
            .or_default();
        stat.count += 1;
        stat.duration_secs += call.duration.as_secs_f64();
        stat.sent += call.sent.amount;
        stat.received += call.received.amount;
        stat.cost += call.cost;
    }

    /// Fold another session's totals into this one.
    pub fn merge(&mut self, other: &ApiStats) {
        for (model, units) in &other.by_model {
            for (unit, stat) in units {
                let into = self
                    .by_model
                    .entry(model.clone())
                    .or_default()
                    .entry(*unit)
                    .or_default();
                into.count += stat.count;
                into.duration_secs += stat.duration_secs;
                into.sent += stat.sent;
                into.received += stat.received;
                into.cost += stat.cost;
            }
        }
    }

    pub fn get(&self, model: &str, unit: SizeUnit) -> Option<&ApiStat> {
        self.by_model.get(model).and_then(|units| units.get(&unit))
    }

    pub fn total_calls(&self) -> u32 {
        self.stats().map(|stat| stat.count).sum()
    }

    pub fn total_cost(&self) -> f64 {
        self.stats().map(|stat| stat.cost).sum()
    }

    fn stats(&self) -> impl Iterator<Item = &ApiStat> {
        self.by_model.values().flat_map(BTreeMap::values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(model: &str, received: Size) -> CallRecord {
        CallRecord {
            model: model.to_string(),
            duration: Duration::from_millis(500),
            sent: Size::tokens(100),
            received,
            cost: estimate_cost(received, 0.06),
        }
    }

    #[test]
    fn cost_is_linear_in_response_size() {
        let small = estimate_cost(Size::tokens(1000), 0.06);
        let large = estimate_cost(Size::tokens(3000), 0.06);
        assert!((small - 0.06).abs() < 1e-9);
        assert!((large - 3.0 * small).abs() < 1e-9);
    }

    #[test]
    fn json_size_counts_escapes() {
        let size = Size::json_kilobytes("a\"b");
        // "a\"b" encodes to six bytes including quotes.
        assert!((size.amount - 6.0 / 1024.0).abs() < 1e-12);
        assert_eq!(size.unit, SizeUnit::Kilobytes);
    }

    #[test]
    fn call_sides_share_a_unit() {
        let (sent, received) = measure_call("p", "r", Some(3), Some(4));
        assert_eq!((sent.unit, received.unit), (SizeUnit::Tokens, SizeUnit::Tokens));
        assert_eq!(received.amount, 4.0);

        for (input, output) in [(Some(3), None), (None, Some(4)), (None, None)] {
            let (sent, received) = measure_call("p", "r", input, output);
            assert_eq!(sent.unit, SizeUnit::Kilobytes);
            assert_eq!(received.unit, SizeUnit::Kilobytes);
        }
    }

    #[test]
    fn record_groups_by_model_and_unit() {
        let mut stats = ApiStats::default();
        stats.record(&call("gpt-4", Size::tokens(10)));
        stats.record(&call("gpt-4", Size::tokens(30)));
        stats.record(&call("gpt-4", Size::json_kilobytes("abc")));
        stats.record(&call("gpt-3.5-turbo", Size::tokens(5)));

        let tokens = stats.get("gpt-4", SizeUnit::Tokens).expect("tokens");
        assert_eq!(tokens.count, 2);
        assert!((tokens.received - 40.0).abs() < 1e-9);
        assert!((tokens.duration_secs - 1.0).abs() < 1e-9);
        assert_eq!(stats.get("gpt-4", SizeUnit::Kilobytes).expect("kb").count, 1);
        assert_eq!(stats.total_calls(), 4);
    }

    #[test]
    fn merge_sums_totals() {
        let mut left = ApiStats::default();
        left.record(&call("gpt-4", Size::tokens(1000)));
        let mut right = ApiStats::default();
        right.record(&call("gpt-4", Size::tokens(1000)));
        left.merge(&right);

        assert_eq!(left.total_calls(), 2);
        assert!((left.total_cost() - 0.12).abs() < 1e-9);
    }
}
