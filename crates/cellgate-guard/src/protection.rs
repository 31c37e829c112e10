//! Coarse protections: per-user sliding-window rate limits.
//!
//! Two windows per user. The general action window applies to every request;
//! the high-risk window applies only to security-critical operations. Both are
//! checked before anything is recorded, so a denied request leaves the
//! windows untouched.

use std::collections::VecDeque;

use cellgate_types::{span_secs, DenyReason, Operation, RateLimitKind, UserId};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

// ── Configuration ───────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionConfig {
    /// Sliding window for ordinary actions.
    #[serde(default = "default_action_window_secs")]
    pub action_window_secs: u64,
    /// Actions allowed per user within `action_window_secs`.
    #[serde(default = "default_action_limit")]
    pub action_limit: usize,
    /// Sliding window for high-risk operations.
    #[serde(default = "default_high_risk_window_secs")]
    pub high_risk_window_secs: u64,
    /// High-risk operations allowed per user within `high_risk_window_secs`.
    #[serde(default = "default_high_risk_limit")]
    pub high_risk_limit: usize,
}

fn default_action_window_secs() -> u64 {
    60
}

fn default_action_limit() -> usize {
    60
}

fn default_high_risk_window_secs() -> u64 {
    600
}

fn default_high_risk_limit() -> usize {
    3
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            action_window_secs: default_action_window_secs(),
            action_limit: default_action_limit(),
            high_risk_window_secs: default_high_risk_window_secs(),
            high_risk_limit: default_high_risk_limit(),
        }
    }
}

// ── Windows ─────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct UserWindows {
    actions: VecDeque<DateTime<Utc>>,
    high_risk: VecDeque<DateTime<Utc>>,
}

impl UserWindows {
    fn is_idle(&self) -> bool {
        self.actions.is_empty() && self.high_risk.is_empty()
    }
}

fn evict_stale(window: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>, span: Duration) {
    while let Some(oldest) = window.front() {
        if now - *oldest > span {
            window.pop_front();
        } else {
            break;
        }
    }
}

// ── Coarse Protections ──────────────────────────────────────────────────

/// Per-user rate limiter. Users never contend with each other beyond the
/// map shard their id hashes to.
#[derive(Debug, Default)]
pub struct CoarseProtections {
    config: ProtectionConfig,
    windows: DashMap<UserId, UserWindows>,
}

impl CoarseProtections {
    pub fn new(config: ProtectionConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    pub fn config(&self) -> &ProtectionConfig {
        &self.config
    }

    /// Admit and record the request, or deny without side effects.
    pub fn check(
        &self,
        user: &UserId,
        op: Operation,
        now: DateTime<Utc>,
    ) -> Result<(), DenyReason> {
        let action_span = span_secs(self.config.action_window_secs);
        let high_risk_span = span_secs(self.config.high_risk_window_secs);
        let critical = op.is_security_critical();

        // Users whose windows have fully slid out hold no state.
        self.windows.retain(|_, w| {
            evict_stale(&mut w.actions, now, action_span);
            evict_stale(&mut w.high_risk, now, high_risk_span);
            !w.is_idle()
        });

        let mut windows = self.windows.entry(user.clone()).or_default();

        evict_stale(&mut windows.actions, now, action_span);
        if windows.actions.len() >= self.config.action_limit {
            warn!(user = %user, op = %op, "action rate limit reached");
            return Err(DenyReason::RateLimited(RateLimitKind::Action));
        }

        if critical {
            evict_stale(&mut windows.high_risk, now, high_risk_span);
            if windows.high_risk.len() >= self.config.high_risk_limit {
                warn!(user = %user, op = %op, "high-risk velocity limit reached");
                return Err(DenyReason::RateLimited(RateLimitKind::HighRisk));
            }
            windows.high_risk.push_back(now);
        }
        windows.actions.push_back(now);

        Ok(())
    }

    /// Requests currently counted in the user's general window.
    pub fn recorded_actions(&self, user: &UserId) -> usize {
        self.windows
            .get(user)
            .map(|w| w.actions.len())
            .unwrap_or(0)
    }

    /// Users with at least one request still inside a window.
    pub fn tracked_users(&self) -> usize {
        self.windows.len()
    }

    /// Requests currently counted in the user's high-risk window.
    pub fn recorded_high_risk(&self, user: &UserId) -> usize {
        self.windows
            .get(user)
            .map(|w| w.high_risk.len())
            .unwrap_or(0)
    }
}
