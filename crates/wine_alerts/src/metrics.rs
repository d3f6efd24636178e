//! Process-wide counters in the same lock-free style as
//! `casparian_sentinel::metrics`: plain atomics, a `prometheus_format`
//! renderer, no external metrics dependency. Pure observability, not alerts.

use std::sync::atomic::{AtomicU64, Ordering};

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    pub jobs_created: AtomicU64,
    pub jobs_completed: AtomicU64,
    pub jobs_failed: AtomicU64,

    pub stage0_invocations: AtomicU64,
    pub stage1_invocations: AtomicU64,
    pub stage2_invocations: AtomicU64,
    pub stage3_invocations: AtomicU64,
    pub stage4_invocations: AtomicU64,

    pub llm_calls: AtomicU64,
    pub ocr_calls: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Metrics {
            jobs_created: AtomicU64::new(0),
            jobs_completed: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
            stage0_invocations: AtomicU64::new(0),
            stage1_invocations: AtomicU64::new(0),
            stage2_invocations: AtomicU64::new(0),
            stage3_invocations: AtomicU64::new(0),
            stage4_invocations: AtomicU64::new(0),
            llm_calls: AtomicU64::new(0),
            ocr_calls: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn inc_jobs_created(&self) {
        self.jobs_created.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_jobs_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_jobs_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_stage_invocation(&self, stage: u8) {
        let counter = match stage {
            0 => &self.stage0_invocations,
            1 => &self.stage1_invocations,
            2 => &self.stage2_invocations,
            3 => &self.stage3_invocations,
            _ => &self.stage4_invocations,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_llm_calls(&self) {
        self.llm_calls.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_ocr_calls(&self) {
        self.ocr_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_created: self.jobs_created.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            stage0_invocations: self.stage0_invocations.load(Ordering::Relaxed),
            stage1_invocations: self.stage1_invocations.load(Ordering::Relaxed),
            stage2_invocations: self.stage2_invocations.load(Ordering::Relaxed),
            stage3_invocations: self.stage3_invocations.load(Ordering::Relaxed),
            stage4_invocations: self.stage4_invocations.load(Ordering::Relaxed),
            llm_calls: self.llm_calls.load(Ordering::Relaxed),
            ocr_calls: self.ocr_calls.load(Ordering::Relaxed),
        }
    }

    pub fn prometheus_format(&self) -> String {
        let s = self.snapshot();
        format!(
            r#"# HELP wine_jobs_created_total Total ingestion jobs created
# TYPE wine_jobs_created_total counter
wine_jobs_created_total {}

# HELP wine_jobs_completed_total Total ingestion jobs completed
# TYPE wine_jobs_completed_total counter
wine_jobs_completed_total {}

# HELP wine_jobs_failed_total Total ingestion jobs that errored
# TYPE wine_jobs_failed_total counter
wine_jobs_failed_total {}

# HELP wine_stage_invocations_total Pipeline stage invocations, by stage
# TYPE wine_stage_invocations_total counter
wine_stage_invocations_total{{stage="0"}} {}
wine_stage_invocations_total{{stage="1"}} {}
wine_stage_invocations_total{{stage="2"}} {}
wine_stage_invocations_total{{stage="3"}} {}
wine_stage_invocations_total{{stage="4"}} {}

# HELP wine_llm_calls_total Total LLM calls issued
# TYPE wine_llm_calls_total counter
wine_llm_calls_total {}

# HELP wine_ocr_calls_total Total OCR calls issued
# TYPE wine_ocr_calls_total counter
wine_ocr_calls_total {}
"#,
            s.jobs_created,
            s.jobs_completed,
            s.jobs_failed,
            s.stage0_invocations,
            s.stage1_invocations,
            s.stage2_invocations,
            s.stage3_invocations,
            s.stage4_invocations,
            s.llm_calls,
            s.ocr_calls,
        )
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub jobs_created: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub stage0_invocations: u64,
    pub stage1_invocations: u64,
    pub stage2_invocations: u64,
    pub stage3_invocations: u64,
    pub stage4_invocations: u64,
    pub llm_calls: u64,
    pub ocr_calls: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prometheus_output_includes_counter_names() {
        let m = Metrics::new();
        m.inc_jobs_created();
        m.inc_stage_invocation(3);
        let text = m.prometheus_format();
        assert!(text.contains("wine_jobs_created_total 1"));
        assert!(text.contains(r#"wine_stage_invocations_total{stage="3"} 1"#));
    }
}
