//! Metrics and observability utilities
//!
//! Prometheus metrics for the query pipeline with standardized naming.
//! Recording goes through the `metrics` facade; the gateway installs the
//! exporter, other binaries simply drop the samples.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::fmt;
use std::time::Instant;

/// Metrics prefix for all service metrics
pub const METRICS_PREFIX: &str = "ragserve";

/// Histogram buckets for pipeline stage latency (in seconds)
///
/// Synthesis dominates; embedding on a cold backend can take tens of seconds.
pub const STAGE_BUCKETS: &[f64] = &[
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
    30.00, // 30s
    60.00, // 60s
];

/// Buckets for the number of hits a search returned
pub const HIT_BUCKETS: &[f64] = &[0.0, 1.0, 2.0, 3.0, 5.0, 8.0, 10.0];

/// Full metric name for a suffix
pub fn metric_name(suffix: &str) -> String {
    format!("{}_{}", METRICS_PREFIX, suffix)
}

/// How a query ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    Answered,
    NoContext,
    FailedEmbed,
    FailedSearch,
    FailedSynthesize,
}

impl QueryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryOutcome::Answered => "answered",
            QueryOutcome::NoContext => "no_context",
            QueryOutcome::FailedEmbed => "failed_embed",
            QueryOutcome::FailedSearch => "failed_search",
            QueryOutcome::FailedSynthesize => "failed_synthesize",
        }
    }
}

impl fmt::Display for QueryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        metric_name("queries_total"),
        Unit::Count,
        "Total queries handled, by outcome"
    );

    describe_histogram!(
        metric_name("stage_duration_seconds"),
        Unit::Seconds,
        "Query pipeline stage latency in seconds"
    );

    describe_histogram!(
        metric_name("search_hits"),
        Unit::Count,
        "Number of hits returned by the search gateway"
    );

    describe_counter!(
        metric_name("embedder_initializations_total"),
        Unit::Count,
        "Embedding backend initializations"
    );

    describe_counter!(
        metric_name("warmups_total"),
        Unit::Count,
        "Warm-up probe invocations, by status"
    );

    tracing::info!("Metrics registered");
}

/// Times one pipeline stage; recorded when finished
pub struct StageTimer {
    start: Instant,
    stage: &'static str,
}

impl StageTimer {
    pub fn start(stage: &'static str) -> Self {
        Self {
            start: Instant::now(),
            stage,
        }
    }

    /// Record the stage duration and return it in milliseconds
    pub fn finish(self) -> u64 {
        let elapsed = self.start.elapsed();
        record_stage(self.stage, elapsed.as_secs_f64());
        elapsed.as_millis() as u64
    }
}

/// Record a stage duration
pub fn record_stage(stage: &'static str, duration_secs: f64) {
    histogram!(metric_name("stage_duration_seconds"), "stage" => stage).record(duration_secs);
}

/// Record how a query ended
pub fn record_query_outcome(outcome: QueryOutcome) {
    counter!(metric_name("queries_total"), "outcome" => outcome.as_str()).increment(1);
}

/// Record the number of hits a search returned
pub fn record_search_hits(count: usize) {
    histogram!(metric_name("search_hits")).record(count as f64);
}

/// Record a successful embedding backend initialization
pub fn record_embedder_initialization() {
    counter!(metric_name("embedder_initializations_total")).increment(1);
}

/// Record a warm-up probe result
pub fn record_warmup(success: bool) {
    let status = if success { "success" } else { "error" };
    counter!(metric_name("warmups_total"), "status" => status).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_buckets_sorted() {
        let mut prev = 0.0;
        for &bucket in STAGE_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
        assert!(HIT_BUCKETS.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(QueryOutcome::NoContext.as_str(), "no_context");
        assert_eq!(QueryOutcome::FailedSynthesize.to_string(), "failed_synthesize");
        assert_eq!(metric_name("queries_total"), "ragserve_queries_total");
    }

    #[test]
    fn test_recording_without_recorder() {
        // No recorder installed: samples are dropped without panicking
        let timer = StageTimer::start("embed");
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(timer.finish() >= 2);
        record_query_outcome(QueryOutcome::Answered);
        record_search_hits(3);
        record_warmup(true);
    }
}
