//! Call-stack sampling (`thread_cpu_analysis.json`) hotspot analysis.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Fixed hot-function substrings, first match wins.
const HOT_PATTERNS: &[(&str, &str)] = &[
    (
        "objc_msgSend",
        "frequent message sends, consider caching or reducing calls",
    ),
    (
        "_xzm_xzone_malloc",
        "frequent allocations, consider object pooling or reuse",
    ),
    ("malloc", "frequent memory allocation"),
    (
        "objc_retain",
        "heavy reference counting, check for retain cycles",
    ),
    ("objc_release", "heavy reference counting"),
    (
        "dispatch_",
        "main-thread dispatch, consider moving work to a background queue",
    ),
];

const UNSYMBOLICATED_HINT: &str = "unsymbolicated, configure symbolication.json";

/// Limits applied while picking threads and functions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CallstackOptions {
    pub top_threads: usize,
    pub top_functions: usize,
    pub min_samples: u64,
}

impl Default for CallstackOptions {
    fn default() -> Self {
        Self {
            top_threads: 5,
            top_functions: 5,
            min_samples: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSample {
    pub thread_key: String,
    pub sample_count: Number,
    /// Function name → occurrence count, in source order.
    pub top_functions: Vec<(String, Number)>,
}

impl ThreadSample {
    fn from_entry(thread_key: &str, stats: &Value) -> Self {
        let sample_count = stats
            .get("sample_count")
            .map(count)
            .unwrap_or_else(|| Number::from(0u64));
        let top_functions = stats
            .get("top_functions")
            .and_then(Value::as_object)
            .map(|funcs| {
                funcs
                    .iter()
                    .map(|(name, n)| (name.clone(), count(n)))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            thread_key: thread_key.to_string(),
            sample_count,
            top_functions,
        }
    }

    pub fn is_main_thread(&self) -> bool {
        self.thread_key.to_lowercase().contains("main") || self.thread_key.contains("Main Thread")
    }
}

/// Counts keep their JSON spelling; anything that is not a number counts as zero.
fn count(value: &Value) -> Number {
    match value {
        Value::Number(n) => n.clone(),
        _ => Number::from(0u64),
    }
}

fn magnitude(n: &Number) -> f64 {
    n.as_f64().unwrap_or(0.0)
}

/// Reads `thread_stats` in document order. Anything else in the document is ignored.
pub fn thread_samples(document: &Map<String, Value>) -> Vec<ThreadSample> {
    document
        .get("thread_stats")
        .and_then(Value::as_object)
        .map(|threads| {
            threads
                .iter()
                .map(|(key, stats)| ThreadSample::from_entry(key, stats))
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootCause {
    pub thread: String,
    pub sample_count: Number,
    pub is_main_thread: bool,
    pub suggestions: Vec<String>,
}

fn hint_for(function: &str) -> Option<&'static str> {
    HOT_PATTERNS
        .iter()
        .find(|(pattern, _)| function.contains(pattern))
        .map(|(_, hint)| *hint)
}

fn suggestions_for(sample: &ThreadSample, top_functions: usize) -> Vec<String> {
    let mut funcs: Vec<&(String, Number)> = sample.top_functions.iter().collect();
    funcs.sort_by(|a, b| magnitude(&b.1).total_cmp(&magnitude(&a.1)));

    let mut out = Vec::new();
    for (name, n) in funcs.into_iter().take(top_functions) {
        if let Some(hint) = hint_for(name) {
            out.push(format!("{name} ({n} samples): {hint}"));
        }
        if name.starts_with("0x") {
            out.push(format!("{name} ({n} samples): {UNSYMBOLICATED_HINT}"));
        }
    }
    out
}

/// Root causes for the busiest threads. Threads whose hot functions match no
/// known pattern are left out.
pub fn analyze_callstack(
    document: Option<&Map<String, Value>>,
    options: &CallstackOptions,
) -> Vec<RootCause> {
    let Some(document) = document else {
        return Vec::new();
    };

    let mut threads = thread_samples(document);
    threads.sort_by(|a, b| magnitude(&b.sample_count).total_cmp(&magnitude(&a.sample_count)));

    let mut root_causes = Vec::new();
    for sample in threads.iter().take(options.top_threads) {
        if sample.top_functions.is_empty()
            || magnitude(&sample.sample_count) < options.min_samples as f64
        {
            continue;
        }
        let suggestions = suggestions_for(sample, options.top_functions);
        if suggestions.is_empty() {
            tracing::debug!(
                "thread {:?} has no recognised hotspots",
                sample.thread_key
            );
            continue;
        }
        root_causes.push(RootCause {
            thread: sample.thread_key.clone(),
            sample_count: sample.sample_count.clone(),
            is_main_thread: sample.is_main_thread(),
            suggestions,
        });
    }
    root_causes
}
