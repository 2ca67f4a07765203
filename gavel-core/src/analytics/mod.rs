//! Derived views over the reconciled sequence: facets, filters, and window
//! metrics. Everything here is a pure function of its inputs; nothing in this
//! module holds a connection or mutates the buffer.

pub mod filters;
pub mod metrics;

pub use filters::{filter_events, Facets, FilterSet};
pub use metrics::{summarize_violations, window_metrics, ViolationGroup, WindowMetrics};
