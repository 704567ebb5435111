//! Run metrics aggregation.
//!
//! Metrics are always recomputed from the full result list; nothing here is
//! updated incrementally. Percentiles use the nearest-rank method.

use apiprobe_proto::ExecutionResult;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Label used for results that carry no case name.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Per-label breakdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelStat {
    pub label: String,
    pub total: u64,
    pub success: u64,
    pub fail: u64,
    /// Response-code histogram keyed by the status code as text, in
    /// first-seen order.
    pub codes: IndexMap<String, u64>,
}

/// Summary of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryMetrics {
    pub total: u64,
    pub success: u64,
    pub fail: u64,
    pub error_rate: f64,
    pub avg_ms: f64,
    pub min_ms: u64,
    pub max_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
    /// Keyed by case name, in first-seen order.
    pub by_label: IndexMap<String, LabelStat>,
}

impl SummaryMetrics {
    /// Aggregates `results`.
    pub fn from_results(results: &[ExecutionResult]) -> Self {
        let mut metrics = Self::default();
        let mut durations: Vec<u64> = Vec::with_capacity(results.len());

        for result in results {
            metrics.total += 1;
            if result.success {
                metrics.success += 1;
            } else {
                metrics.fail += 1;
            }
            durations.push(result.duration_ms);

            let label = if result.case_name.trim().is_empty() {
                UNKNOWN_LABEL
            } else {
                result.case_name.as_str()
            };
            let stat = metrics
                .by_label
                .entry(label.to_string())
                .or_insert_with(|| LabelStat {
                    label: label.to_string(),
                    ..LabelStat::default()
                });
            stat.total += 1;
            if result.success {
                stat.success += 1;
            } else {
                stat.fail += 1;
            }
            *stat.codes.entry(result.status_code.to_string()).or_insert(0) += 1;
        }

        metrics.error_rate = metrics.fail as f64 / metrics.total.max(1) as f64;

        if !durations.is_empty() {
            durations.sort_unstable();
            let sum: u64 = durations.iter().sum();
            metrics.avg_ms = sum as f64 / durations.len() as f64;
            metrics.min_ms = durations[0];
            metrics.max_ms = durations[durations.len() - 1];
            metrics.p95_ms = percentile(&durations, 0.95);
            metrics.p99_ms = percentile(&durations, 0.99);
        }
        metrics
    }

    /// Labels with at least one failing result.
    pub fn failing_labels(&self) -> impl Iterator<Item = &LabelStat> {
        self.by_label.values().filter(|s| s.fail > 0)
    }

    /// Labels whose results all succeeded.
    pub fn passing_labels(&self) -> impl Iterator<Item = &LabelStat> {
        self.by_label.values().filter(|s| s.fail == 0)
    }

    /// Plain-text digest used as analyst input and as the summary fallback.
    pub fn digest(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Total: {}, success: {}, fail: {}, error rate: {:.2}%",
            self.total,
            self.success,
            self.fail,
            self.error_rate * 100.0
        );
        let _ = writeln!(
            out,
            "Latency (ms): avg {:.1}, p95 {}, p99 {}, min {}, max {}",
            self.avg_ms, self.p95_ms, self.p99_ms, self.min_ms, self.max_ms
        );

        let failing: Vec<&LabelStat> = self.failing_labels().collect();
        if failing.is_empty() {
            out.push_str("Failing cases: none\n");
        } else {
            out.push_str("Failing cases:\n");
            for stat in failing {
                let codes = stat
                    .codes
                    .iter()
                    .map(|(code, n)| format!("{code}x{n}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let _ = writeln!(
                    out,
                    "- {} (fail {}/{}; codes: {})",
                    stat.label, stat.fail, stat.total, codes
                );
            }
        }

        let passing: Vec<&str> = self.passing_labels().map(|s| s.label.as_str()).collect();
        if !passing.is_empty() {
            let _ = writeln!(out, "Passing cases: {}", passing.join(", "));
        }
        out
    }
}

/// Nearest-rank percentile over an ascending slice: the element at
/// `ceil(p * n) - 1`, clamped to the slice. Returns 0 for an empty slice.
pub fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = (p * sorted.len() as f64).ceil() as i64 - 1;
    let idx = rank.clamp(0, sorted.len() as i64 - 1) as usize;
    sorted[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, status: i32, success: bool, duration_ms: u64) -> ExecutionResult {
        let mut r = ExecutionResult::response(name, "GET", "http://x", status, "", duration_ms);
        r.success = success;
        r
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let d = [10, 20, 30, 40, 100];
        assert_eq!(percentile(&d, 0.95), 100);
        assert_eq!(percentile(&d, 0.99), 100);
        assert_eq!(percentile(&d, 0.5), 30);
        assert_eq!(percentile(&d, 0.0), 10);
        assert_eq!(percentile(&[], 0.95), 0);
    }

    #[test]
    fn test_percentile_large_sample() {
        let d: Vec<u64> = (1..=100).collect();
        assert_eq!(percentile(&d, 0.95), 95);
        assert_eq!(percentile(&d, 0.99), 99);
    }

    #[test]
    fn test_from_results_totals_and_latency() {
        let results = vec![
            result("a", 200, true, 10),
            result("a", 500, false, 20),
            result("b", 200, true, 30),
            result("c", 404, false, 40),
            result("b", 200, true, 100),
        ];
        let m = SummaryMetrics::from_results(&results);
        assert_eq!((m.total, m.success, m.fail), (5, 3, 2));
        assert!((m.error_rate - 0.4).abs() < f64::EPSILON);
        assert!((m.avg_ms - 40.0).abs() < f64::EPSILON);
        assert_eq!((m.min_ms, m.max_ms, m.p95_ms, m.p99_ms), (10, 100, 100, 100));
    }

    #[test]
    fn test_by_label_first_seen_order_and_codes() {
        let results = vec![
            result("b", 200, true, 1),
            result("a", 500, false, 1),
            result("b", 404, false, 1),
            result("", 200, true, 1),
            result("b", 200, true, 1),
        ];
        let m = SummaryMetrics::from_results(&results);
        let labels: Vec<&str> = m.by_label.keys().map(String::as_str).collect();
        assert_eq!(labels, vec!["b", "a", "Unknown"]);

        let b = &m.by_label["b"];
        assert_eq!((b.total, b.success, b.fail), (3, 2, 1));
        let codes: Vec<(&str, u64)> = b.codes.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        assert_eq!(codes, vec![("200", 2), ("404", 1)]);
    }

    #[test]
    fn test_empty_results() {
        let m = SummaryMetrics::from_results(&[]);
        assert_eq!(m.total, 0);
        assert!(m.error_rate.abs() < f64::EPSILON);
        assert_eq!(m.p95_ms, 0);
        assert!(m.by_label.is_empty());
    }

    #[test]
    fn test_transport_failures_bucket_under_minus_one() {
        let r = ExecutionResult::transport_failure("a", "GET", "http://x", 5, "refused");
        let m = SummaryMetrics::from_results(&[r]);
        assert_eq!(m.by_label["a"].codes["-1"], 1);
    }

    #[test]
    fn test_digest_lists_failing_and_passing_labels() {
        let results = vec![result("ok case", 200, true, 5), result("bad case", 500, false, 7)];
        let digest = SummaryMetrics::from_results(&results).digest();
        assert!(digest.contains("Total: 2, success: 1, fail: 1"));
        assert!(digest.contains("- bad case (fail 1/1; codes: 500x1)"));
        assert!(digest.contains("Passing cases: ok case"));
    }

    #[test]
    fn test_serializes_camel_case() {
        let m = SummaryMetrics::from_results(&[result("a", 200, true, 3)]);
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["errorRate"], 0.0);
        assert_eq!(v["byLabel"]["a"]["codes"]["200"], 1);
    }
}
