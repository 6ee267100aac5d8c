// =============================================================================
// Shared Application State
// =============================================================================
//
// Held by every HTTP handler through `Arc<AppState>`. The configuration and
// the market-data provider are fixed at startup; each analysis request gets its
// own copy of the analysis settings, so nothing here is mutated by the
// computation itself. The only mutable pieces are operational counters and the
// recent-error log surfaced by the health endpoint.
//
// Thread safety:
//   - Atomic counters for request accounting.
//   - parking_lot::RwLock for the error ring buffer.
// =============================================================================

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::error::AnalysisError;
use crate::market_data::MarketDataProvider;
use crate::runtime_config::AppConfig;

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

/// A failed request as shown by the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub kind: &'static str,
    pub message: String,
    /// RFC 3339 timestamp.
    pub at: String,
}

pub struct AppState {
    pub config: AppConfig,
    pub provider: Arc<dyn MarketDataProvider>,

    analyses_served: AtomicU64,
    tool_calls_served: AtomicU64,
    recent_errors: RwLock<VecDeque<ErrorRecord>>,
    start_time: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, provider: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            config,
            provider,
            analyses_served: AtomicU64::new(0),
            tool_calls_served: AtomicU64::new(0),
            recent_errors: RwLock::new(VecDeque::with_capacity(MAX_RECENT_ERRORS)),
            start_time: Instant::now(),
        }
    }

    pub fn record_analysis(&self) -> u64 {
        self.analyses_served.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_tool_call(&self) -> u64 {
        self.tool_calls_served.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Append to the error log, evicting the oldest entry past
    /// [`MAX_RECENT_ERRORS`].
    pub fn push_error(&self, err: &AnalysisError) {
        let record = ErrorRecord {
            kind: err.kind(),
            message: err.to_string(),
            at: Utc::now().to_rfc3339(),
        };
        let mut errors = self.recent_errors.write();
        errors.push_back(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.pop_front();
        }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            analyses_served: self.analyses_served.load(Ordering::Relaxed),
            tool_calls_served: self.tool_calls_served.load(Ordering::Relaxed),
            recent_errors: self.recent_errors.read().iter().cloned().collect(),
        }
    }
}

/// Operational counters for the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub uptime_secs: u64,
    pub analyses_served: u64,
    pub tool_calls_served: u64,
    pub recent_errors: Vec<ErrorRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::fixtures::InMemoryProvider;

    fn state() -> AppState {
        AppState::new(AppConfig::default(), Arc::new(InMemoryProvider::default()))
    }

    #[test]
    fn counters_increment() {
        let s = state();
        assert_eq!(s.record_analysis(), 1);
        assert_eq!(s.record_analysis(), 2);
        assert_eq!(s.record_tool_call(), 1);
        let snap = s.snapshot();
        assert_eq!(snap.analyses_served, 2);
        assert_eq!(snap.tool_calls_served, 1);
    }

    #[test]
    fn error_log_is_bounded() {
        let s = state();
        for i in 0..(MAX_RECENT_ERRORS + 5) {
            s.push_error(&AnalysisError::NoDataFound {
                ticker: format!("T{i}"),
            });
        }
        let snap = s.snapshot();
        assert_eq!(snap.recent_errors.len(), MAX_RECENT_ERRORS);
        assert!(snap.recent_errors[0].message.contains("T5"));
        assert_eq!(snap.recent_errors[0].kind, "no_data_found");
    }
}
