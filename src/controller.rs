use crate::clock::Clock;
use crate::config::AppConfig;
use crate::error::{Error, Result, SearchError};
use crate::model::{ResultRecord, SearchCriteria};
use crate::store::{RateLimitState, RateLimitStore};
use crate::webhook::SearchService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const MINUTE_MS: u64 = 60_000;

/// The single active screen of the app and the data that screen needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    /// Collecting criteria; `initial` pre-fills the form with the last search.
    Form { initial: Option<SearchCriteria> },
    /// First-ever search, waiting for the user to acknowledge the limits.
    Confirm { pending: SearchCriteria },
    Loading { criteria: SearchCriteria },
    Results { records: Vec<ResultRecord> },
    Error { error: SearchError },
    RateLimited { remaining_secs: u64 },
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Form { .. } => "form",
            Phase::Confirm { .. } => "confirm",
            Phase::Loading { .. } => "loading",
            Phase::Results { .. } => "results",
            Phase::Error { .. } => "error",
            Phase::RateLimited { .. } => "rate-limited",
        }
    }

    pub fn error_message(&self) -> Option<String> {
        match self {
            Phase::Error { error } => Some(error.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub min_request_interval_ms: u64,
    pub cooldown_tick: Duration,
}

impl Limits {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            min_request_interval_ms: config.limits.min_request_interval_ms,
            cooldown_tick: Duration::from_millis(config.ui.cooldown_tick_ms),
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            min_request_interval_ms: 3_600_000,
            cooldown_tick: Duration::from_secs(1),
        }
    }
}

/// Point-in-time view of the throttling bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub state: RateLimitState,
    pub cooldown_remaining_secs: u64,
    pub next_request_in_ms: Option<u64>,
}

/// Drives the search flow.
///
/// Only `Form` and `Confirm` can start a request and both are left before
/// the request is sent, so at most one search is ever in flight.
pub struct Controller {
    service: Arc<dyn SearchService>,
    store: RateLimitStore,
    clock: Arc<dyn Clock>,
    limits: Limits,
    rate: RateLimitState,
    last_criteria: Option<SearchCriteria>,
    phase_tx: watch::Sender<Phase>,
}

impl Controller {
    pub fn new(
        service: Arc<dyn SearchService>,
        store: RateLimitStore,
        clock: Arc<dyn Clock>,
        limits: Limits,
    ) -> Self {
        let (phase_tx, _) = watch::channel(Phase::Form { initial: None });

        Self {
            service,
            store,
            clock,
            limits,
            rate: RateLimitState::default(),
            last_criteria: None,
            phase_tx,
        }
    }

    /// Restores persisted state and resumes an unfinished cooldown.
    pub async fn start(&mut self) -> Result<()> {
        self.rate = self.store.load().await?;

        let now = self.clock.now_ms();
        let remaining = self.rate.cooldown_remaining_at(now);
        if remaining > 0 {
            log::info!("Resuming rate-limit cooldown with {}s remaining", remaining);
            self.set_phase(Phase::RateLimited {
                remaining_secs: remaining,
            });
        } else {
            if self.rate.cooldown_started_at_ms > 0 {
                log::info!("Clearing expired rate-limit cooldown");
                self.store.clear_cooldown().await?;
            }
            self.clear_cached_cooldown();
            self.set_phase(Phase::Form { initial: None });
        }
        Ok(())
    }

    pub fn phase(&self) -> Phase {
        self.phase_tx.borrow().clone()
    }

    pub fn watch_phase(&self) -> watch::Receiver<Phase> {
        self.phase_tx.subscribe()
    }

    pub fn rate_limit_state(&self) -> RateLimitState {
        self.rate
    }

    pub fn status(&self) -> RateLimitStatus {
        let now = self.clock.now_ms();
        RateLimitStatus {
            state: self.rate,
            cooldown_remaining_secs: self.rate.cooldown_remaining_at(now),
            next_request_in_ms: self
                .rate
                .interval_wait_ms(now, self.limits.min_request_interval_ms),
        }
    }

    pub fn cooldown_tick(&self) -> Duration {
        self.limits.cooldown_tick
    }

    pub async fn submit(&mut self, criteria: SearchCriteria) -> Result<()> {
        self.expect_phase("submit", |p| matches!(p, Phase::Form { .. }))?;
        self.rate = self.store.load().await?;

        if !self.rate.has_ever_requested {
            self.set_phase(Phase::Confirm { pending: criteria });
            return Ok(());
        }

        let now = self.clock.now_ms();
        if let Some(wait_ms) = self
            .rate
            .interval_wait_ms(now, self.limits.min_request_interval_ms)
        {
            let remaining_minutes = wait_ms.div_ceil(MINUTE_MS);
            log::warn!("Search refused, next request allowed in {}ms", wait_ms);
            self.set_phase(Phase::Error {
                error: SearchError::UserIntervalThrottle { remaining_minutes },
            });
            return Ok(());
        }

        let remaining = self.rate.cooldown_remaining_at(now);
        if remaining > 0 {
            self.set_phase(Phase::RateLimited {
                remaining_secs: remaining,
            });
            return Ok(());
        }

        self.perform_search(criteria).await
    }

    pub async fn confirm(&mut self) -> Result<()> {
        let pending = match self.phase() {
            Phase::Confirm { pending } => pending,
            other => {
                return Err(Error::InvalidTransition {
                    action: "confirm",
                    phase: other.name(),
                });
            }
        };

        self.rate.has_ever_requested = true;
        self.store.mark_has_requested().await?;

        self.perform_search(pending).await
    }

    pub fn cancel(&mut self) -> Result<()> {
        self.expect_phase("cancel", |p| matches!(p, Phase::Confirm { .. }))?;
        self.set_phase(Phase::Form {
            initial: self.last_criteria.clone(),
        });
        Ok(())
    }

    pub fn new_search(&mut self) -> Result<()> {
        self.expect_phase("start a new search", |p| matches!(p, Phase::Results { .. }))?;
        self.set_phase(Phase::Form {
            initial: self.last_criteria.clone(),
        });
        Ok(())
    }

    pub fn try_again(&mut self) -> Result<()> {
        self.expect_phase("try again", |p| matches!(p, Phase::Error { .. }))?;
        self.set_phase(Phase::Form {
            initial: self.last_criteria.clone(),
        });
        Ok(())
    }

    /// Recomputes the cooldown from its persisted start time; returns to the
    /// form once it has run out.
    pub async fn tick(&mut self) -> Result<()> {
        if !matches!(self.phase(), Phase::RateLimited { .. }) {
            return Ok(());
        }

        let remaining = self.rate.cooldown_remaining_at(self.clock.now_ms());
        if remaining == 0 {
            log::info!("Rate-limit cooldown finished");
            self.store.clear_cooldown().await?;
            self.clear_cached_cooldown();
            self.set_phase(Phase::Form {
                initial: self.last_criteria.clone(),
            });
        } else {
            self.set_phase(Phase::RateLimited {
                remaining_secs: remaining,
            });
        }
        Ok(())
    }

    /// Ticks until the cooldown is over.
    pub async fn run_cooldown(&mut self) -> Result<()> {
        let mut interval = tokio::time::interval(self.limits.cooldown_tick);
        interval.tick().await;
        while matches!(self.phase(), Phase::RateLimited { .. }) {
            interval.tick().await;
            self.tick().await?;
        }
        Ok(())
    }

    async fn perform_search(&mut self, criteria: SearchCriteria) -> Result<()> {
        let now = self.clock.now_ms();
        self.last_criteria = Some(criteria.clone());
        self.rate.last_request_at_ms = now;
        self.store.record_request(now).await?;
        self.set_phase(Phase::Loading {
            criteria: criteria.clone(),
        });

        match self.service.search(&criteria).await {
            Ok(records) if records.is_empty() => {
                self.set_phase(Phase::Error {
                    error: SearchError::EmptyResults,
                });
            }
            Ok(records) => {
                log::info!("Search returned {} results", records.len());
                self.set_phase(Phase::Results { records });
            }
            Err(SearchError::RateLimited { cooldown_secs }) => {
                let started = self.clock.now_ms();
                log::warn!("Webhook rate limit hit, cooling down for {}s", cooldown_secs);
                self.rate.cooldown_remaining_secs = cooldown_secs;
                self.rate.cooldown_started_at_ms = started;
                self.set_phase(Phase::RateLimited {
                    remaining_secs: cooldown_secs,
                });
                // the in-session cooldown still applies when the write fails
                if let Err(e) = self.store.start_cooldown(cooldown_secs, started).await {
                    log::error!("Failed to persist rate-limit cooldown: {}", e);
                }
            }
            Err(error) => {
                log::error!("Search failed: {}", error);
                self.set_phase(Phase::Error { error });
            }
        }
        Ok(())
    }

    fn expect_phase(&self, action: &'static str, allowed: impl Fn(&Phase) -> bool) -> Result<()> {
        let phase = self.phase_tx.borrow();
        if allowed(&phase) {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                action,
                phase: phase.name(),
            })
        }
    }

    fn clear_cached_cooldown(&mut self) {
        self.rate.cooldown_remaining_secs = 0;
        self.rate.cooldown_started_at_ms = 0;
    }

    fn set_phase(&self, phase: Phase) {
        log::debug!("Phase -> {}", phase.name());
        self.phase_tx.send_replace(phase);
    }
}
