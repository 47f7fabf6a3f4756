//! Metrics definitions for bulk submissions.

use shared::metrics_defs::{MetricDef, MetricType};

pub const UPSERT_SUCCESS: MetricDef = MetricDef {
    name: "submission.upsert.success",
    metric_type: MetricType::Counter,
    description: "Per-record upserts that were written",
};

pub const UPSERT_CONFLICT: MetricDef = MetricDef {
    name: "submission.upsert.conflict",
    metric_type: MetricType::Counter,
    description: "Per-record upserts skipped as tolerable conflicts",
};

pub const UPSERT_FAILURE: MetricDef = MetricDef {
    name: "submission.upsert.failure",
    metric_type: MetricType::Counter,
    description: "Per-record upserts that failed",
};

pub const UPSERTS_IN_FLIGHT: MetricDef = MetricDef {
    name: "submission.in_flight",
    metric_type: MetricType::Gauge,
    description: "Upsert requests currently awaiting a response",
};

pub const FINALIZE_SUBMITTED: MetricDef = MetricDef {
    name: "submission.finalize.submitted",
    metric_type: MetricType::Counter,
    description: "Finalize calls that succeeded",
};

pub const FINALIZE_SKIPPED: MetricDef = MetricDef {
    name: "submission.finalize.skipped",
    metric_type: MetricType::Counter,
    description: "Batches that skipped finalize because nothing was written",
};

pub const FINALIZE_FAILED: MetricDef = MetricDef {
    name: "submission.finalize.failed",
    metric_type: MetricType::Counter,
    description: "Finalize calls that failed after records were written",
};

pub const BATCH_SIZE: MetricDef = MetricDef {
    name: "submission.batch.size",
    metric_type: MetricType::Histogram,
    description: "Number of roster entries per submission",
};

pub const BATCH_DURATION: MetricDef = MetricDef {
    name: "submission.batch.duration",
    metric_type: MetricType::Histogram,
    description: "Time to run all upserts and finalize, in seconds",
};

pub const ALL_METRICS: &[MetricDef] = &[
    UPSERT_SUCCESS,
    UPSERT_CONFLICT,
    UPSERT_FAILURE,
    UPSERTS_IN_FLIGHT,
    FINALIZE_SUBMITTED,
    FINALIZE_SKIPPED,
    FINALIZE_FAILED,
    BATCH_SIZE,
    BATCH_DURATION,
];
