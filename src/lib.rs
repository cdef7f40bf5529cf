//! perfsift core library: artifact loading, metric classification, call-stack
//! hotspot analysis and report rendering for iOS performance capture runs.

mod callstack;
mod config;
mod error;
mod loader;
mod metrics;
mod report;

pub use callstack::*;
pub use config::*;
pub use error::*;
pub use loader::*;
pub use metrics::*;
pub use report::*;
