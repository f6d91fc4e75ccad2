use crate::config::AppConfig;
use crate::templates::ReportTemplates;
use anyhow::Result;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use diligence_core::AgentRunner;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    agent: Arc<dyn AgentRunner>,
    templates: Arc<ReportTemplates>,
    runs: Arc<RunRegistry>,
    poll_interval: Duration,
}

impl AppState {
    pub fn try_new(config: &AppConfig, agent: Arc<dyn AgentRunner>) -> Result<Self> {
        Ok(Self {
            agent,
            templates: Arc::new(ReportTemplates::new()?),
            runs: Arc::new(RunRegistry::default()),
            poll_interval: config.poll_interval,
        })
    }

    pub fn agent(&self) -> Arc<dyn AgentRunner> {
        self.agent.clone()
    }

    pub fn templates(&self) -> Arc<ReportTemplates> {
        self.templates.clone()
    }

    pub fn runs(&self) -> Arc<RunRegistry> {
        self.runs.clone()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

/// In-flight agent runs, keyed by run id.
#[derive(Default)]
pub struct RunRegistry {
    runs: DashMap<Uuid, RunEntry>,
}

struct RunEntry {
    company: String,
    started_at: DateTime<Utc>,
    cancel: CancellationToken,
}

#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub company: String,
    pub started_at: DateTime<Utc>,
}

impl RunRegistry {
    pub fn register(&self, run_id: Uuid, company: &str, cancel: CancellationToken) -> usize {
        self.runs.insert(
            run_id,
            RunEntry {
                company: company.to_string(),
                started_at: Utc::now(),
                cancel,
            },
        );
        self.runs.len()
    }

    pub fn finish(&self, run_id: &Uuid) {
        self.runs.remove(run_id);
    }

    /// Guard that removes `run_id` when dropped, including when the run
    /// panics or its task is aborted.
    pub fn finish_on_drop(self: &Arc<Self>, run_id: Uuid) -> FinishOnDrop {
        FinishOnDrop {
            registry: self.clone(),
            run_id,
        }
    }

    pub fn running(&self) -> usize {
        self.runs.len()
    }

    pub fn snapshot(&self) -> Vec<RunSummary> {
        let mut runs: Vec<RunSummary> = self
            .runs
            .iter()
            .map(|entry| RunSummary {
                run_id: entry.key().to_string(),
                company: entry.value().company.clone(),
                started_at: entry.value().started_at,
            })
            .collect();
        runs.sort_by_key(|run| run.started_at);
        runs
    }

    /// Cancel every in-flight run; used on shutdown.
    pub fn cancel_all(&self) -> usize {
        let mut cancelled = 0;
        for entry in self.runs.iter() {
            if !entry.value().cancel.is_cancelled() {
                entry.value().cancel.cancel();
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            info!(cancelled, "cancelled in-flight runs");
        }
        cancelled
    }
}

pub struct FinishOnDrop {
    registry: Arc<RunRegistry>,
    run_id: Uuid,
}

impl Drop for FinishOnDrop {
    fn drop(&mut self) {
        self.registry.finish(&self.run_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_tracks_and_cancels_runs() {
        let registry = RunRegistry::default();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let token = CancellationToken::new();

        assert_eq!(registry.register(first, "Acme", token.clone()), 1);
        assert_eq!(registry.register(second, "Globex", CancellationToken::new()), 2);
        assert_eq!(registry.snapshot().len(), 2);

        assert_eq!(registry.cancel_all(), 2);
        assert!(token.is_cancelled());
        assert_eq!(registry.cancel_all(), 0);

        registry.finish(&first);
        registry.finish(&second);
        assert_eq!(registry.running(), 0);
    }

    #[test]
    fn guard_removes_entry_on_unwind() {
        let registry = Arc::new(RunRegistry::default());
        let run_id = Uuid::new_v4();
        registry.register(run_id, "Acme", CancellationToken::new());

        let guarded = registry.clone();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _finish = guarded.finish_on_drop(run_id);
            panic!("agent blew up");
        }));

        assert!(outcome.is_err());
        assert_eq!(registry.running(), 0);
    }
}
