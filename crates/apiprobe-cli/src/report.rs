//! Report files and terminal rendering.

use anyhow::{Context, Result, bail};
use apiprobe_core::{RunReport, SummaryMetrics, TaskRecord, truncate_with_ellipsis};
use colored::Colorize;
use serde_json::Value;
use std::fmt::Write as _;
use std::path::Path;

const LABEL_WIDTH: usize = 48;

/// Reads a run report. Accepts a bare report or a task record from the Run API
/// (`{"taskId": .., "result": {..}}`).
pub fn load_report(path: &Path) -> Result<RunReport> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read report {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Report {} is not valid JSON", path.display()))?;

    if value.get("taskId").is_some() {
        let record: TaskRecord =
            serde_json::from_value(value).context("Failed to parse task record")?;
        match record.result {
            Some(report) => Ok(report),
            None => bail!(
                "Task {} has no result (status {:?})",
                record.task_id,
                record.status
            ),
        }
    } else {
        serde_json::from_value(value).context("Failed to parse run report")
    }
}

pub fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report {}", path.display()))
}

/// Totals, latency and a per-case table.
pub fn render_metrics(metrics: &SummaryMetrics, use_colors: bool) -> String {
    let mut out = String::new();

    let rate = format!("{:.2}%", metrics.error_rate * 100.0);
    let (passed, failed) = if use_colors {
        (
            metrics.success.to_string().green().to_string(),
            if metrics.fail > 0 {
                metrics.fail.to_string().red().bold().to_string()
            } else {
                metrics.fail.to_string()
            },
        )
    } else {
        (metrics.success.to_string(), metrics.fail.to_string())
    };
    let _ = writeln!(
        out,
        "Total: {}  Passed: {}  Failed: {}  Error rate: {}",
        metrics.total, passed, failed, rate
    );
    let _ = writeln!(
        out,
        "Latency (ms): avg {:.1}  p95 {}  p99 {}  min {}  max {}",
        metrics.avg_ms, metrics.p95_ms, metrics.p99_ms, metrics.min_ms, metrics.max_ms
    );
    if metrics.by_label.is_empty() {
        return out;
    }

    let header = format!(
        "{:<width$}  {:>5}  {:>5}  {:>5}  CODES",
        "CASE",
        "TOTAL",
        "PASS",
        "FAIL",
        width = LABEL_WIDTH
    );
    out.push('\n');
    if use_colors {
        let _ = writeln!(out, "{}", header.bold());
    } else {
        let _ = writeln!(out, "{header}");
    }

    for stat in metrics.by_label.values() {
        let codes = stat
            .codes
            .iter()
            .map(|(code, n)| format!("{code}x{n}"))
            .collect::<Vec<_>>()
            .join(" ");
        let row = format!(
            "{:<width$}  {:>5}  {:>5}  {:>5}  {}",
            truncate_with_ellipsis(&stat.label, LABEL_WIDTH),
            stat.total,
            stat.success,
            stat.fail,
            codes,
            width = LABEL_WIDTH
        );
        if use_colors && stat.fail > 0 {
            let _ = writeln!(out, "{}", row.red());
        } else {
            let _ = writeln!(out, "{row}");
        }
    }
    out
}
