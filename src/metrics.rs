//! Metrics snapshot (`metrics/final.json`) model and threshold classification.

use serde::de::DeserializeOwned;
use serde::ser::SerializeMap as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use std::fmt;

use crate::{PerfsiftError, PerfsiftResult};

/// `fps.min` values at or above this mean the capture had no frame data.
pub const FPS_MIN_NO_DATA: i64 = 999;

/// A numeric reading as it appeared in the source JSON.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
}

impl MetricValue {
    /// Reads a number, treating `null`, non-numbers and zero as "not measured".
    pub fn from_json(value: &Value) -> Option<Self> {
        let Value::Number(number) = value else {
            return None;
        };
        let out = if let Some(v) = number.as_i64() {
            Self::Int(v)
        } else {
            Self::Float(number.as_f64()?)
        };
        if out.as_f64() == 0.0 { None } else { Some(out) }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:.2}"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsSnapshot {
    #[serde(default, deserialize_with = "lenient")]
    pub target_process_stats: ProcessStats,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessStats {
    #[serde(default, deserialize_with = "lenient")]
    pub cpu: CpuStats,
    #[serde(default, deserialize_with = "lenient")]
    pub memory: MemoryStats,
    #[serde(default, deserialize_with = "lenient")]
    pub fps: FpsStats,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CpuStats {
    #[serde(default, deserialize_with = "lenient_metric")]
    pub avg_pct: Option<MetricValue>,
    #[serde(default, deserialize_with = "lenient_metric")]
    pub max_pct: Option<MetricValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryStats {
    #[serde(default, deserialize_with = "lenient_metric")]
    pub rss_mb_avg: Option<MetricValue>,
    #[serde(default, deserialize_with = "lenient_metric")]
    pub rss_mb_max: Option<MetricValue>,
    #[serde(default, deserialize_with = "lenient_metric")]
    pub heap_mb_delta: Option<MetricValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FpsStats {
    #[serde(default, deserialize_with = "lenient_metric")]
    pub avg: Option<MetricValue>,
    #[serde(default, deserialize_with = "lenient_metric")]
    pub min: Option<MetricValue>,
    #[serde(default, deserialize_with = "lenient_metric")]
    pub jank_count_total: Option<MetricValue>,
}

impl MetricsSnapshot {
    /// Builds a snapshot from an already-parsed document. Sections of the wrong
    /// shape degrade to their defaults instead of failing the whole snapshot.
    pub fn from_document(document: serde_json::Map<String, Value>) -> Self {
        match serde_json::from_value(Value::Object(document)) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::debug!("metrics snapshot fell back to defaults: {err}");
                Self::default()
            }
        }
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

fn lenient_metric<'de, D>(deserializer: D) -> Result<Option<MetricValue>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(MetricValue::from_json(&value))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Normal,
    Warning,
    Critical,
}

impl Severity {
    pub fn marker(self) -> &'static str {
        match self {
            Self::Normal => "🟢",
            Self::Warning => "🟡",
            Self::Critical => "🔴",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IssueKind {
    #[serde(rename = "CPU")]
    Cpu,
    Memory,
    FrameRate,
    Jank,
}

impl IssueKind {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            Self::Memory => "Memory",
            Self::FrameRate => "FrameRate",
            Self::Jank => "Jank",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub severity: Severity,
    pub metric: String,
    pub threshold: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    HigherIsWorse,
    LowerIsWorse,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub warn: f64,
    pub crit: f64,
}

impl Bounds {
    pub const fn new(warn: f64, crit: f64) -> Self {
        Self { warn, crit }
    }
}

/// Two-tier classification. The warn bound itself is still healthy.
pub fn classify(value: f64, bounds: Bounds, direction: Direction) -> Severity {
    match direction {
        Direction::HigherIsWorse => {
            if value <= bounds.warn {
                Severity::Normal
            } else if value <= bounds.crit {
                Severity::Warning
            } else {
                Severity::Critical
            }
        }
        Direction::LowerIsWorse => {
            if value >= bounds.warn {
                Severity::Normal
            } else if value >= bounds.crit {
                Severity::Warning
            } else {
                Severity::Critical
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKey {
    CpuAvg,
    CpuMax,
    RssAvg,
    RssMax,
    HeapDelta,
    FpsAvg,
    FpsMin,
    JankCount,
}

impl MetricKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CpuAvg => "cpu_avg",
            Self::CpuMax => "cpu_max",
            Self::RssAvg => "rss_avg",
            Self::RssMax => "rss_max",
            Self::HeapDelta => "heap_delta",
            Self::FpsAvg => "fps_avg",
            Self::FpsMin => "fps_min",
            Self::JankCount => "jank_count",
        }
    }
}

/// Per-metric bounds, overridable from `perfsift.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Thresholds {
    pub cpu_avg: Bounds,
    pub cpu_max: Bounds,
    pub rss_avg: Bounds,
    pub rss_max: Bounds,
    pub heap_delta: Bounds,
    pub fps_avg: Bounds,
    pub fps_min: Bounds,
    pub jank_count: Bounds,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu_avg: Bounds::new(60.0, 80.0),
            cpu_max: Bounds::new(90.0, 95.0),
            rss_avg: Bounds::new(300.0, 500.0),
            rss_max: Bounds::new(500.0, 800.0),
            heap_delta: Bounds::new(50.0, 100.0),
            fps_avg: Bounds::new(58.0, 55.0),
            fps_min: Bounds::new(50.0, 30.0),
            jank_count: Bounds::new(5.0, 10.0),
        }
    }
}

impl Thresholds {
    pub fn get(&self, key: MetricKey) -> Bounds {
        match key {
            MetricKey::CpuAvg => self.cpu_avg,
            MetricKey::CpuMax => self.cpu_max,
            MetricKey::RssAvg => self.rss_avg,
            MetricKey::RssMax => self.rss_max,
            MetricKey::HeapDelta => self.heap_delta,
            MetricKey::FpsAvg => self.fps_avg,
            MetricKey::FpsMin => self.fps_min,
            MetricKey::JankCount => self.jank_count,
        }
    }

    /// Rejects bound pairs that run against the metric's direction.
    pub fn validate(&self) -> PerfsiftResult<()> {
        for rule in METRIC_RULES {
            let bounds = self.get(rule.key);
            if !bounds.warn.is_finite() || !bounds.crit.is_finite() {
                return Err(PerfsiftError::Config(format!(
                    "thresholds.{} must be finite",
                    rule.key.as_str()
                )));
            }
            let ordered = match rule.direction {
                Direction::HigherIsWorse => bounds.warn <= bounds.crit,
                Direction::LowerIsWorse => bounds.warn >= bounds.crit,
            };
            if !ordered {
                let relation = match rule.direction {
                    Direction::HigherIsWorse => "<=",
                    Direction::LowerIsWorse => ">=",
                };
                return Err(PerfsiftError::Config(format!(
                    "thresholds.{}: warn ({}) must be {relation} crit ({})",
                    rule.key.as_str(),
                    bounds.warn,
                    bounds.crit
                )));
            }
        }
        Ok(())
    }
}

/// When a metric takes part in classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    /// Classified even when absent, as zero.
    Always,
    /// Only classified when measured.
    Measured,
    /// Absent shows as the sentinel; readings at or above it are skipped.
    BelowSentinel(i64),
}

#[derive(Debug, Clone, Copy)]
enum ValueFormat {
    Percent,
    Megabytes,
    Plain,
    Count,
}

struct MetricRule {
    key: MetricKey,
    kind: IssueKind,
    label: &'static str,
    format: ValueFormat,
    direction: Direction,
    gate: Gate,
    read: fn(&ProcessStats) -> Option<MetricValue>,
}

impl MetricRule {
    fn metric_string(&self, value: MetricValue) -> String {
        let v = value.as_f64();
        match self.format {
            ValueFormat::Percent => format!("{}={v:.1}%", self.label),
            ValueFormat::Megabytes => format!("{}={v:.1}MB", self.label),
            ValueFormat::Plain => format!("{}={v:.1}", self.label),
            ValueFormat::Count => match value {
                MetricValue::Int(n) => format!("{}={n}", self.label),
                MetricValue::Float(n) => format!("{}={n}", self.label),
            },
        }
    }

    fn threshold_string(&self, bounds: Bounds) -> String {
        let relation = match self.direction {
            Direction::HigherIsWorse => "≤",
            Direction::LowerIsWorse => "≥",
        };
        let suffix = match self.format {
            ValueFormat::Percent => "%",
            _ => "",
        };
        format!("{relation}{}{suffix}", bounds.crit)
    }
}

/// Evaluated in order; issue order follows this table.
const METRIC_RULES: &[MetricRule] = &[
    MetricRule {
        key: MetricKey::CpuAvg,
        kind: IssueKind::Cpu,
        label: "avg_pct",
        format: ValueFormat::Percent,
        direction: Direction::HigherIsWorse,
        gate: Gate::Always,
        read: |s| s.cpu.avg_pct,
    },
    MetricRule {
        key: MetricKey::CpuMax,
        kind: IssueKind::Cpu,
        label: "max_pct",
        format: ValueFormat::Percent,
        direction: Direction::HigherIsWorse,
        gate: Gate::Always,
        read: |s| s.cpu.max_pct,
    },
    MetricRule {
        key: MetricKey::RssAvg,
        kind: IssueKind::Memory,
        label: "rss_avg",
        format: ValueFormat::Megabytes,
        direction: Direction::HigherIsWorse,
        gate: Gate::Always,
        read: |s| s.memory.rss_mb_avg,
    },
    MetricRule {
        key: MetricKey::RssMax,
        kind: IssueKind::Memory,
        label: "rss_max",
        format: ValueFormat::Megabytes,
        direction: Direction::HigherIsWorse,
        gate: Gate::Always,
        read: |s| s.memory.rss_mb_max,
    },
    MetricRule {
        key: MetricKey::HeapDelta,
        kind: IssueKind::Memory,
        label: "heap_delta",
        format: ValueFormat::Megabytes,
        direction: Direction::HigherIsWorse,
        gate: Gate::Always,
        read: |s| s.memory.heap_mb_delta,
    },
    MetricRule {
        key: MetricKey::FpsAvg,
        kind: IssueKind::FrameRate,
        label: "fps_avg",
        format: ValueFormat::Plain,
        direction: Direction::LowerIsWorse,
        gate: Gate::Measured,
        read: |s| s.fps.avg,
    },
    MetricRule {
        key: MetricKey::FpsMin,
        kind: IssueKind::FrameRate,
        label: "fps_min",
        format: ValueFormat::Plain,
        direction: Direction::LowerIsWorse,
        gate: Gate::BelowSentinel(FPS_MIN_NO_DATA),
        read: |s| s.fps.min,
    },
    MetricRule {
        key: MetricKey::JankCount,
        kind: IssueKind::Jank,
        label: "jank_count",
        format: ValueFormat::Count,
        direction: Direction::HigherIsWorse,
        gate: Gate::Measured,
        read: |s| s.fps.jank_count_total,
    },
];

/// Ordered metric-key → value mapping shown in the report overview.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    entries: Vec<(&'static str, MetricValue)>,
}

impl Summary {
    pub fn insert(&mut self, key: &'static str, value: MetricValue) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<MetricValue> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, MetricValue)> + '_ {
        self.entries.iter().copied()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Summary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Classifies every metric of the snapshot. No snapshot means no findings and
/// an empty summary.
pub fn classify_metrics(
    snapshot: Option<&MetricsSnapshot>,
    thresholds: &Thresholds,
) -> (Vec<Issue>, Summary) {
    let mut issues = Vec::new();
    let mut summary = Summary::default();
    let Some(snapshot) = snapshot else {
        return (issues, summary);
    };
    let stats = &snapshot.target_process_stats;

    for rule in METRIC_RULES {
        let reading = (rule.read)(stats);
        let (shown, evaluated) = match rule.gate {
            Gate::Always => {
                let v = reading.unwrap_or(MetricValue::Int(0));
                (v, Some(v))
            }
            Gate::Measured => (
                reading.unwrap_or(MetricValue::Int(0)),
                reading.filter(|v| v.as_f64() > 0.0),
            ),
            Gate::BelowSentinel(sentinel) => {
                let v = reading.unwrap_or(MetricValue::Int(sentinel));
                (v, Some(v).filter(|v| v.as_f64() < sentinel as f64))
            }
        };
        summary.insert(rule.key.as_str(), shown);

        let Some(value) = evaluated else {
            continue;
        };
        let bounds = thresholds.get(rule.key);
        let severity = classify(value.as_f64(), bounds, rule.direction);
        if severity != Severity::Normal {
            issues.push(Issue {
                kind: rule.kind,
                severity,
                metric: rule.metric_string(value),
                threshold: rule.threshold_string(bounds),
            });
        }
    }

    (issues, summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 0.01;

    fn snapshot(json: Value) -> MetricsSnapshot {
        match json {
            Value::Object(map) => MetricsSnapshot::from_document(map),
            other => panic!("expected object, got {other}"),
        }
    }

    fn classify_doc(json: Value) -> (Vec<Issue>, Summary) {
        let snap = snapshot(json);
        classify_metrics(Some(&snap), &Thresholds::default())
    }

    #[test]
    fn higher_is_worse_boundaries_are_inclusive_below() {
        let t = Thresholds::default();
        for key in [
            MetricKey::CpuAvg,
            MetricKey::CpuMax,
            MetricKey::RssAvg,
            MetricKey::RssMax,
            MetricKey::HeapDelta,
            MetricKey::JankCount,
        ] {
            let b = t.get(key);
            let dir = Direction::HigherIsWorse;
            assert_eq!(classify(b.warn, b, dir), Severity::Normal, "{key:?}");
            assert_eq!(classify(b.warn + EPS, b, dir), Severity::Warning, "{key:?}");
            assert_eq!(classify(b.crit, b, dir), Severity::Warning, "{key:?}");
            assert_eq!(classify(b.crit + EPS, b, dir), Severity::Critical, "{key:?}");
        }
    }

    #[test]
    fn lower_is_worse_boundaries_invert() {
        let t = Thresholds::default();
        for key in [MetricKey::FpsAvg, MetricKey::FpsMin] {
            let b = t.get(key);
            let dir = Direction::LowerIsWorse;
            assert_eq!(classify(b.warn, b, dir), Severity::Normal, "{key:?}");
            assert_eq!(classify(b.warn - EPS, b, dir), Severity::Warning, "{key:?}");
            assert_eq!(classify(b.crit, b, dir), Severity::Warning, "{key:?}");
            assert_eq!(classify(b.crit - EPS, b, dir), Severity::Critical, "{key:?}");
        }
    }

    #[test]
    fn mixed_capture_yields_expected_issues() {
        let (issues, summary) = classify_doc(serde_json::json!({
            "target_process_stats": {
                "cpu": {"avg_pct": 85, "max_pct": 91},
                "memory": {"rss_mb_avg": 250},
                "fps": {"avg": 40, "min": 20, "jank_count_total": 12}
            }
        }));

        let got: Vec<(IssueKind, Severity, &str, &str)> = issues
            .iter()
            .map(|i| (i.kind, i.severity, i.metric.as_str(), i.threshold.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                (IssueKind::Cpu, Severity::Critical, "avg_pct=85.0%", "≤80%"),
                (IssueKind::Cpu, Severity::Warning, "max_pct=91.0%", "≤95%"),
                (IssueKind::FrameRate, Severity::Critical, "fps_avg=40.0", "≥55"),
                (IssueKind::FrameRate, Severity::Critical, "fps_min=20.0", "≥30"),
                (IssueKind::Jank, Severity::Critical, "jank_count=12", "≤10"),
            ]
        );
        assert_eq!(summary.get("rss_avg"), Some(MetricValue::Int(250)));
        assert_eq!(summary.len(), 8);
    }

    #[test]
    fn summary_keys_follow_rule_order_with_defaults() {
        let (issues, summary) = classify_doc(serde_json::json!({"target_process_stats": {}}));
        assert!(issues.is_empty());
        let keys: Vec<&str> = summary.iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                "cpu_avg",
                "cpu_max",
                "rss_avg",
                "rss_max",
                "heap_delta",
                "fps_avg",
                "fps_min",
                "jank_count"
            ]
        );
        assert_eq!(summary.get("cpu_avg"), Some(MetricValue::Int(0)));
        assert_eq!(
            summary.get("fps_min"),
            Some(MetricValue::Int(FPS_MIN_NO_DATA))
        );
    }

    #[test]
    fn absent_frame_data_is_skipped() {
        let (issues, _) = classify_doc(serde_json::json!({
            "target_process_stats": {"fps": {"avg": 0, "min": 999}}
        }));
        assert!(issues.is_empty());

        let (issues, _) = classify_doc(serde_json::json!({
            "target_process_stats": {"fps": {"avg": 0, "min": 1200.5}}
        }));
        assert!(issues.is_empty());
    }

    #[test]
    fn jank_only_reported_when_above_warn() {
        for (jank, expected) in [
            (0, None),
            (3, None),
            (6, Some(Severity::Warning)),
            (10, Some(Severity::Warning)),
            (11, Some(Severity::Critical)),
        ] {
            let (issues, _) = classify_doc(serde_json::json!({
                "target_process_stats": {"fps": {"jank_count_total": jank}}
            }));
            let found = issues
                .iter()
                .find(|i| i.kind == IssueKind::Jank)
                .map(|i| i.severity);
            assert_eq!(found, expected, "jank={jank}");
        }
    }

    #[test]
    fn wrong_shapes_degrade_to_defaults() {
        let (issues, summary) = classify_doc(serde_json::json!({
            "target_process_stats": {
                "cpu": "busy",
                "memory": {"rss_mb_avg": "lots", "rss_mb_max": 900.5},
                "fps": null
            }
        }));
        assert_eq!(summary.get("cpu_avg"), Some(MetricValue::Int(0)));
        assert_eq!(summary.get("rss_avg"), Some(MetricValue::Int(0)));
        assert_eq!(summary.get("rss_max"), Some(MetricValue::Float(900.5)));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::Memory);
        assert_eq!(issues[0].severity, Severity::Critical);
        assert_eq!(issues[0].metric, "rss_max=900.5MB");
        assert_eq!(issues[0].threshold, "≤800");
    }

    #[test]
    fn missing_snapshot_yields_nothing() {
        let (issues, summary) = classify_metrics(None, &Thresholds::default());
        assert!(issues.is_empty());
        assert!(summary.is_empty());
    }

    #[test]
    fn custom_thresholds_are_applied() {
        let thresholds = Thresholds {
            cpu_avg: Bounds::new(10.0, 20.0),
            ..Thresholds::default()
        };
        let snap = snapshot(serde_json::json!({
            "target_process_stats": {"cpu": {"avg_pct": 15.5}}
        }));
        let (issues, _) = classify_metrics(Some(&snap), &thresholds);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert_eq!(issues[0].threshold, "≤20%");
    }

    #[test]
    fn validate_rejects_inverted_bounds() {
        let mut thresholds = Thresholds::default();
        assert!(thresholds.validate().is_ok());
        thresholds.fps_avg = Bounds::new(50.0, 55.0);
        let err = thresholds.validate().expect_err("inverted fps bounds");
        assert!(err.to_string().contains("thresholds.fps_avg"));
    }

    #[test]
    fn summary_values_keep_integer_vs_float() {
        assert_eq!(MetricValue::Int(12).to_string(), "12");
        assert_eq!(MetricValue::Float(12.345).to_string(), "12.35");
        assert_eq!(MetricValue::from_json(&serde_json::json!(0.0)), None);
        assert_eq!(MetricValue::from_json(&serde_json::json!(false)), None);
    }
}
