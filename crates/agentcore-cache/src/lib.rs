//! Cache boundary tracker (C): per-call KV-cache efficiency analysis driven
//! by real provider usage counters (§4.3).

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone)]
pub struct CacheMessage {
    pub role: String,
    pub content: String,
    pub is_tool_result: bool,
}

/// One outbound request, canonicalized enough to hash and compare against
/// the previous request's shape.
#[derive(Debug, Clone)]
pub struct CacheRequest {
    /// System prompt + tool definitions, canonicalized.
    pub stable_prefix: String,
    pub messages: Vec<CacheMessage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakpointKind {
    ContentChange,
    RoleChange,
    ToolResult,
    DynamicContent,
}

/// The cache breakpoint: the first position at which this request diverges
/// from the last one. `position == 0` with `kind == None` means a perfect
/// match (every position matched); a `None` at a nonzero position cannot
/// occur — it would already have surfaced as one of the four kinds.
#[derive(Debug, Clone)]
pub struct BreakpointAnalysis {
    pub position: usize,
    pub kind: Option<BreakpointKind>,
    pub predicted_cacheable_tokens: u64,
}

fn hash_text(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn estimate_tokens(s: &str) -> u64 {
    (s.len() as f64 / 4.0).ceil() as u64
}

fn looks_dynamic(content: &str) -> bool {
    // Timestamps, uuids and similar high-entropy tokens invalidate the cache
    // on every call regardless of surrounding structure.
    let has_digit_run = content
        .as_bytes()
        .windows(8)
        .any(|w| w.iter().filter(|b| b.is_ascii_digit()).count() >= 6);
    has_digit_run || content.contains("uuid") || content.contains("timestamp")
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ActualCacheUsage {
    pub input_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct Reconciliation {
    pub hit_rate: f64,
    pub estimated_savings_tokens: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

#[derive(Debug, Clone)]
pub struct CacheRecommendation {
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct CacheTrackerConfig {
    pub history_window: usize,
    pub low_hit_rate_threshold: f64,
    pub trend_slope_threshold: f64,
}

impl Default for CacheTrackerConfig {
    fn default() -> Self {
        Self { history_window: 20, low_hit_rate_threshold: 0.3, trend_slope_threshold: 0.05 }
    }
}

/// Compares successive request prefixes and reconciles the prediction
/// against real provider-reported cache counters (§4.3).
pub struct CacheBoundaryTracker {
    config: CacheTrackerConfig,
    previous: Option<CacheRequest>,
    hit_rate_history: VecDeque<f64>,
    breakpoint_kind_history: VecDeque<BreakpointKind>,
}

impl CacheBoundaryTracker {
    pub fn new(config: CacheTrackerConfig) -> Self {
        Self {
            previous: None,
            hit_rate_history: VecDeque::with_capacity(config.history_window),
            breakpoint_kind_history: VecDeque::with_capacity(config.history_window),
            config,
        }
    }

    /// Analyze `request` against the previously seen request. Must be
    /// called once per request, in order; the request becomes "previous"
    /// for the next call.
    pub fn analyze(&mut self, request: CacheRequest) -> BreakpointAnalysis {
        let analysis = match &self.previous {
            None => BreakpointAnalysis { position: 0, kind: Some(BreakpointKind::ContentChange), predicted_cacheable_tokens: 0 },
            Some(prev) => self.diff(prev, &request),
        };

        if let Some(kind) = analysis.kind {
            self.breakpoint_kind_history.push_back(kind);
            while self.breakpoint_kind_history.len() > self.config.history_window {
                self.breakpoint_kind_history.pop_front();
            }
        }

        self.previous = Some(request);
        analysis
    }

    fn diff(&self, prev: &CacheRequest, cur: &CacheRequest) -> BreakpointAnalysis {
        if prev.stable_prefix != cur.stable_prefix {
            return BreakpointAnalysis { position: 0, kind: Some(BreakpointKind::ContentChange), predicted_cacheable_tokens: 0 };
        }

        let mut matched_tokens = estimate_tokens(&cur.stable_prefix);
        let mut position = 1;

        for (i, cur_msg) in cur.messages.iter().enumerate() {
            match prev.messages.get(i) {
                None => {
                    return BreakpointAnalysis { position, kind: None, predicted_cacheable_tokens: matched_tokens };
                }
                Some(prev_msg) => {
                    if prev_msg.role != cur_msg.role {
                        return BreakpointAnalysis { position, kind: Some(BreakpointKind::RoleChange), predicted_cacheable_tokens: matched_tokens };
                    }
                    if hash_text(&prev_msg.content) != hash_text(&cur_msg.content) {
                        let kind = if cur_msg.is_tool_result {
                            BreakpointKind::ToolResult
                        } else if looks_dynamic(&cur_msg.content) {
                            BreakpointKind::DynamicContent
                        } else {
                            BreakpointKind::ContentChange
                        };
                        return BreakpointAnalysis { position, kind: Some(kind), predicted_cacheable_tokens: matched_tokens };
                    }
                    matched_tokens += estimate_tokens(&cur_msg.content);
                    position += 1;
                }
            }
        }

        // Every position through min(len) matched. If the current request is
        // no longer than the previous one, it's a perfect prefix match.
        BreakpointAnalysis { position, kind: None, predicted_cacheable_tokens: matched_tokens }
    }

    /// Reconcile a prediction against what the provider actually reported.
    pub fn reconcile(&mut self, actual: ActualCacheUsage) -> Reconciliation {
        let hit_rate = if actual.input_tokens == 0 {
            0.0
        } else {
            actual.cache_read_tokens as f64 / actual.input_tokens as f64
        };
        self.hit_rate_history.push_back(hit_rate);
        while self.hit_rate_history.len() > self.config.history_window {
            self.hit_rate_history.pop_front();
        }
        Reconciliation { hit_rate, estimated_savings_tokens: actual.cache_read_tokens }
    }

    pub fn average_hit_rate(&self) -> f64 {
        if self.hit_rate_history.is_empty() {
            return 0.0;
        }
        self.hit_rate_history.iter().sum::<f64>() / self.hit_rate_history.len() as f64
    }

    /// Trend over the tracked history: split into two halves and compare
    /// their averages.
    pub fn trend(&self) -> Trend {
        let n = self.hit_rate_history.len();
        if n < 4 {
            return Trend::Stable;
        }
        let mid = n / 2;
        let first_half: f64 = self.hit_rate_history.iter().take(mid).sum::<f64>() / mid as f64;
        let second_half: f64 =
            self.hit_rate_history.iter().skip(mid).sum::<f64>() / (n - mid) as f64;
        let delta = second_half - first_half;
        if delta > self.config.trend_slope_threshold {
            Trend::Improving
        } else if delta < -self.config.trend_slope_threshold {
            Trend::Declining
        } else {
            Trend::Stable
        }
    }

    pub fn recommendations(&self) -> Vec<CacheRecommendation> {
        let mut out = Vec::new();
        if !self.hit_rate_history.is_empty() && self.average_hit_rate() < self.config.low_hit_rate_threshold {
            out.push(CacheRecommendation {
                message: format!(
                    "average cache hit rate is {:.1}%, below the {:.0}% threshold; consider stabilizing message prefixes",
                    self.average_hit_rate() * 100.0,
                    self.config.low_hit_rate_threshold * 100.0
                ),
            });
        }

        if self.breakpoint_kind_history.len() >= 5 {
            let dynamic_count = self
                .breakpoint_kind_history
                .iter()
                .filter(|k| **k == BreakpointKind::DynamicContent)
                .count();
            if dynamic_count * 2 > self.breakpoint_kind_history.len() {
                out.push(CacheRecommendation {
                    message: "most cache breakpoints are dynamic content (timestamps/ids); move them to the end of the prompt".to_string(),
                });
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(role: &str, content: &str) -> CacheMessage {
        CacheMessage { role: role.to_string(), content: content.to_string(), is_tool_result: false }
    }

    #[test]
    fn first_request_has_no_prior_match() {
        let mut tracker = CacheBoundaryTracker::new(CacheTrackerConfig::default());
        let analysis = tracker.analyze(CacheRequest { stable_prefix: "sys".into(), messages: vec![msg("user", "hi")] });
        assert_eq!(analysis.position, 0);
        assert_eq!(analysis.kind, Some(BreakpointKind::ContentChange));
    }

    #[test]
    fn identical_followup_request_matches_fully() {
        let mut tracker = CacheBoundaryTracker::new(CacheTrackerConfig::default());
        tracker.analyze(CacheRequest { stable_prefix: "sys".into(), messages: vec![msg("user", "hi")] });
        let analysis = tracker.analyze(CacheRequest { stable_prefix: "sys".into(), messages: vec![msg("user", "hi")] });
        assert!(analysis.kind.is_none());
        assert!(analysis.predicted_cacheable_tokens > 0);
    }

    #[test]
    fn appended_message_is_the_only_divergence() {
        let mut tracker = CacheBoundaryTracker::new(CacheTrackerConfig::default());
        tracker.analyze(CacheRequest { stable_prefix: "sys".into(), messages: vec![msg("user", "hi")] });
        let analysis = tracker.analyze(CacheRequest {
            stable_prefix: "sys".into(),
            messages: vec![msg("user", "hi"), msg("assistant", "hello")],
        });
        assert!(analysis.kind.is_none());
        assert_eq!(analysis.position, 1);
    }

    #[test]
    fn changed_system_prompt_invalidates_everything() {
        let mut tracker = CacheBoundaryTracker::new(CacheTrackerConfig::default());
        tracker.analyze(CacheRequest { stable_prefix: "sys v1".into(), messages: vec![msg("user", "hi")] });
        let analysis = tracker.analyze(CacheRequest { stable_prefix: "sys v2".into(), messages: vec![msg("user", "hi")] });
        assert_eq!(analysis.position, 0);
        assert_eq!(analysis.kind, Some(BreakpointKind::ContentChange));
    }

    #[test]
    fn reconciliation_tracks_running_hit_rate() {
        let mut tracker = CacheBoundaryTracker::new(CacheTrackerConfig::default());
        tracker.reconcile(ActualCacheUsage { input_tokens: 1000, cache_read_tokens: 800, cache_write_tokens: 0 });
        assert!((tracker.average_hit_rate() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn recommends_when_hit_rate_is_low() {
        let mut tracker = CacheBoundaryTracker::new(CacheTrackerConfig::default());
        for _ in 0..5 {
            tracker.reconcile(ActualCacheUsage { input_tokens: 1000, cache_read_tokens: 10, cache_write_tokens: 0 });
        }
        assert!(!tracker.recommendations().is_empty());
    }
}
