//! Analysis pipeline over a capture run directory and its text report.

use serde::Serialize;
use time::OffsetDateTime;

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::{
    Config, Issue, MetricsSnapshot, PerfsiftError, PerfsiftResult, RootCause, Summary,
    analyze_callstack, classify_metrics, load_artifact,
};

pub const METRICS_FILE: &str = "metrics/final.json";
pub const CALLSTACK_FILE: &str = "thread_cpu_analysis.json";

const RULE_WIDTH: usize = 60;
const SECTION_RULE_WIDTH: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub run_dir: PathBuf,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    pub warnings: Vec<String>,
    pub summary: Summary,
    pub issues: Vec<Issue>,
    pub root_causes: Vec<RootCause>,
}

/// Resolves the run directory argument to an absolute, existing directory.
pub fn resolve_run_dir(arg: &Path) -> PerfsiftResult<PathBuf> {
    let resolved = std::path::absolute(arg)?;
    if !resolved.is_dir() {
        return Err(PerfsiftError::InvalidArgument(format!(
            "directory does not exist: {}",
            resolved.display()
        )));
    }
    Ok(resolved)
}

/// Reads both artifacts, then classifies and analyzes them.
pub fn analyze_run(run_dir: &Path, config: &Config) -> Report {
    let mut warnings = Vec::new();

    let metrics = load_artifact(&run_dir.join(METRICS_FILE));
    warnings.extend(metrics.warning());
    let callstack = load_artifact(&run_dir.join(CALLSTACK_FILE));
    warnings.extend(callstack.warning());

    let snapshot = metrics.into_document().map(MetricsSnapshot::from_document);
    let (issues, summary) = classify_metrics(snapshot.as_ref(), &config.thresholds);

    let callstack = callstack.into_document();
    let root_causes = analyze_callstack(callstack.as_ref(), &config.callstack);

    tracing::debug!(
        issues = issues.len(),
        root_causes = root_causes.len(),
        "analyzed {}",
        run_dir.display()
    );

    Report {
        run_dir: run_dir.to_path_buf(),
        generated_at: OffsetDateTime::now_utc(),
        warnings,
        summary,
        issues,
        root_causes,
    }
}

pub fn render_text(report: &Report) -> String {
    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(SECTION_RULE_WIDTH);
    let mut out = String::new();

    let _ = writeln!(out, "{heavy}");
    let _ = writeln!(out, "iOS Performance Analysis Report");
    let _ = writeln!(out, "{heavy}");
    let _ = writeln!(out, "Run directory: {}\n", report.run_dir.display());
    for warning in &report.warnings {
        let _ = writeln!(out, "{warning}");
    }

    let _ = writeln!(out, "## 1. Metric Overview");
    let _ = writeln!(out, "{light}");
    for (key, value) in report.summary.iter() {
        let _ = writeln!(out, "  {key}: {value}");
    }

    let _ = writeln!(out, "\n## 2. Issues Found");
    let _ = writeln!(out, "{light}");
    if report.issues.is_empty() {
        let _ = writeln!(out, "  🟢 No significant performance issues found");
    }
    for (i, issue) in report.issues.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {}. {} [{}] {} (threshold: {})",
            i + 1,
            issue.severity.marker(),
            issue.kind.tag(),
            issue.metric,
            issue.threshold
        );
    }

    let _ = writeln!(out, "\n## 3. Call-Stack Root Causes");
    let _ = writeln!(out, "{light}");
    if report.root_causes.is_empty() {
        let _ = writeln!(
            out,
            "  (no {CALLSTACK_FILE} or no analyzable hotspots)"
        );
    }
    for rc in &report.root_causes {
        let tag = if rc.is_main_thread { " [main thread]" } else { "" };
        let _ = writeln!(
            out,
            "\n  Thread: {}{tag} (samples: {})",
            rc.thread, rc.sample_count
        );
        for suggestion in &rc.suggestions {
            let _ = writeln!(out, "    → {suggestion}");
        }
    }

    let _ = writeln!(out, "\n{heavy}");
    out
}
