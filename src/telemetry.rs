use tracing_subscriber::EnvFilter;

/// Install the JSON tracing subscriber, filtered by `RUST_LOG` (default `info`).
/// Returns an error if a global subscriber is already set.
pub fn init_tracing() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .try_init()
}

/// Register descriptions for the metrics emitted by the pipeline. Call once
/// after installing a metrics recorder.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "protection_jobs_submitted_total",
        "Total protection jobs submitted"
    );
    metrics::describe_counter!(
        "protection_jobs_finished_total",
        "Protection jobs reaching a terminal status, by status"
    );
    metrics::describe_counter!(
        "protection_stage_failures_total",
        "Stage failures recorded on jobs, by stage"
    );
    metrics::describe_histogram!(
        "protection_job_duration_seconds",
        "Time from start of execution to terminal status"
    );
    metrics::describe_gauge!(
        "intake_queue_depth",
        "Verification calls waiting in the intake queue"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_rejected() {
        let _ = init_tracing();
        assert!(init_tracing().is_err());
    }
}
