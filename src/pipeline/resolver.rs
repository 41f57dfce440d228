use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::app::ports::HttpClientPort;
use crate::config::FetchConfig;
use crate::domain::{AttemptOutcome, AttemptReport, RawResponse, ValidatedPayload};
use crate::error::PipelineError;
use crate::observability::metrics;
use crate::pipeline::cancel::CancelFlag;
use crate::pipeline::classifier::UrlClassification;
use crate::pipeline::strategy::{Strategy, StrategyTable};
use crate::pipeline::validator::PayloadValidator;

/// How a resolve call ended, plus the per-attempt log.
#[derive(Debug)]
pub struct Resolution {
    pub outcome: ResolveOutcome,
    pub attempts: Vec<AttemptReport>,
}

#[derive(Debug)]
pub enum ResolveOutcome {
    Resolved {
        payload: ValidatedPayload,
        strategy_id: String,
    },
    /// Every applicable strategy failed, was rejected or was skipped.
    Exhausted,
}

/// Walks the strategy table in order until the validator accepts a
/// response. Attempts are strictly sequential and each is bounded by the
/// per-attempt timeout. An optional run budget stops new attempts once spent.
pub struct FetchResolver {
    http: Arc<dyn HttpClientPort>,
    strategies: StrategyTable,
    validator: PayloadValidator,
    attempt_timeout: Duration,
    run_budget: Option<Duration>,
}

impl FetchResolver {
    pub fn new(
        http: Arc<dyn HttpClientPort>,
        strategies: StrategyTable,
        validator: PayloadValidator,
        config: &FetchConfig,
    ) -> Self {
        Self {
            http,
            strategies,
            validator,
            attempt_timeout: config.attempt_timeout(),
            run_budget: config.run_budget(),
        }
    }

    pub fn strategies(&self) -> &StrategyTable {
        &self.strategies
    }

    /// Returns `Err` only on cancellation; strategy and validation failures
    /// stay local and show up in `Resolution::attempts`.
    pub async fn resolve(
        &self,
        url: &str,
        classification: &UrlClassification,
        cancel: &CancelFlag,
    ) -> Result<Resolution, PipelineError> {
        let started = Instant::now();
        let plan = self.strategies.plan(classification);
        let mut attempts = Vec::with_capacity(plan.len());

        for strategy in plan {
            if cancel.is_cancelled() {
                info!(strategy = %strategy.id, "Run cancelled before attempt");
                return Err(PipelineError::Cancelled);
            }

            if self.budget_spent(started) {
                warn!(strategy = %strategy.id, "Run budget spent, skipping strategy");
                attempts.push(AttemptReport {
                    strategy_id: strategy.id.clone(),
                    outcome: AttemptOutcome::Skipped("run budget spent".to_string()),
                    elapsed_ms: 0,
                });
                continue;
            }

            let attempt_started = Instant::now();
            let result = self.attempt(strategy, url, classification).await;
            let elapsed_ms = attempt_started.elapsed().as_millis() as u64;

            match result {
                Ok(payload) => {
                    info!(
                        strategy = %strategy.id,
                        bytes = payload.size_bytes(),
                        mime = %payload.mime_type(),
                        elapsed_ms,
                        "Strategy succeeded"
                    );
                    metrics::fetch::attempt(&strategy.id, "accepted");
                    metrics::fetch::payload_bytes(payload.size_bytes());
                    attempts.push(AttemptReport {
                        strategy_id: strategy.id.clone(),
                        outcome: AttemptOutcome::Accepted,
                        elapsed_ms,
                    });
                    return Ok(Resolution {
                        outcome: ResolveOutcome::Resolved {
                            payload,
                            strategy_id: strategy.id.clone(),
                        },
                        attempts,
                    });
                }
                Err(outcome) => {
                    let label = match &outcome {
                        AttemptOutcome::Rejected(_) => "rejected",
                        _ => "failed",
                    };
                    warn!(strategy = %strategy.id, elapsed_ms, outcome = ?outcome, "Strategy did not produce a document");
                    metrics::fetch::attempt(&strategy.id, label);
                    attempts.push(AttemptReport {
                        strategy_id: strategy.id.clone(),
                        outcome,
                        elapsed_ms,
                    });
                }
            }
        }

        // A cancel raised during the final attempt still wins over exhaustion.
        if cancel.is_cancelled() {
            info!(url = %url, "Run cancelled after last attempt");
            return Err(PipelineError::Cancelled);
        }

        let tried = attempts.iter().filter(|a| a.was_attempted()).count();
        warn!(
            url = %url,
            error = %PipelineError::NetworkExhaustion { attempts: tried },
            "Fetch strategies exhausted"
        );
        Ok(Resolution {
            outcome: ResolveOutcome::Exhausted,
            attempts,
        })
    }

    fn budget_spent(&self, started: Instant) -> bool {
        self.run_budget
            .map_or(false, |budget| started.elapsed() >= budget)
    }

    async fn attempt(
        &self,
        strategy: &Strategy,
        url: &str,
        classification: &UrlClassification,
    ) -> Result<ValidatedPayload, AttemptOutcome> {
        let request = strategy.request_for(url, classification, self.strategies.user_agent());
        info!(strategy = %strategy.id, target = %request.url, "Attempting fetch");

        let response = match tokio::time::timeout(self.attempt_timeout, self.http.get(&request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(AttemptOutcome::Failed(e.to_string())),
            Err(_) => {
                return Err(AttemptOutcome::Failed(format!(
                    "timed out after {}s",
                    self.attempt_timeout.as_secs()
                )))
            }
        };

        if !(200..300).contains(&response.status) {
            return Err(AttemptOutcome::Failed(format!("HTTP status {}", response.status)));
        }

        debug!(
            strategy = %strategy.id,
            status = response.status,
            content_type = ?response.content_type,
            bytes = response.bytes.len(),
            "Fetched response"
        );

        let raw = RawResponse {
            source_url: url.to_string(),
            status: response.status,
            content_type: response.content_type,
            bytes: response.bytes,
        };
        self.validator
            .validate_with(raw, strategy.requires_document_content_type())
            .map_err(|rejection| {
                warn!(
                    strategy = %strategy.id,
                    error = %PipelineError::ValidationRejected(rejection.to_string()),
                    "Validator rejected response"
                );
                AttemptOutcome::Rejected(rejection.to_string())
            })
    }
}
