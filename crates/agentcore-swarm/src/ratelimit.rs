//! Per-worker rate limiting (§4.7): "a worker whose bucket is empty blocks
//! on its own timer without stalling peers" — a plain token bucket with a
//! per-minute refill rate, awaited independently by each worker's loop.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub tokens_per_minute: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { requests_per_minute: 60, tokens_per_minute: 100_000 }
    }
}

/// Two independent token buckets (requests, LLM tokens), refilled
/// continuously at `rate / 60` per second.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    request_tokens: f64,
    usage_tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            request_tokens: config.requests_per_minute as f64,
            usage_tokens: config.tokens_per_minute as f64,
            config,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.request_tokens = (self.request_tokens + elapsed * (self.config.requests_per_minute as f64 / 60.0)).min(self.config.requests_per_minute as f64);
        self.usage_tokens = (self.usage_tokens + elapsed * (self.config.tokens_per_minute as f64 / 60.0)).min(self.config.tokens_per_minute as f64);
        self.last_refill = now;
    }

    /// How long the caller must wait before `request_cost` requests and
    /// `token_cost` tokens are both available. Returns `Duration::ZERO` when
    /// the call can proceed immediately.
    pub fn wait_time(&mut self, request_cost: u32, token_cost: u64) -> Duration {
        self.refill(Instant::now());

        let request_deficit = (request_cost as f64 - self.request_tokens).max(0.0);
        let token_deficit = (token_cost as f64 - self.usage_tokens).max(0.0);

        let request_wait = if request_deficit > 0.0 { request_deficit / (self.config.requests_per_minute as f64 / 60.0) } else { 0.0 };
        let token_wait = if token_deficit > 0.0 { token_deficit / (self.config.tokens_per_minute as f64 / 60.0) } else { 0.0 };

        Duration::from_secs_f64(request_wait.max(token_wait))
    }

    /// Consume the bucket. Callers should have already waited out
    /// `wait_time` for this amount.
    pub fn consume(&mut self, request_cost: u32, token_cost: u64) {
        self.refill(Instant::now());
        self.request_tokens = (self.request_tokens - request_cost as f64).max(0.0);
        self.usage_tokens = (self.usage_tokens - token_cost as f64).max(0.0);
    }

    /// Await until capacity exists, then consume it.
    pub async fn acquire(&mut self, request_cost: u32, token_cost: u64) {
        let wait = self.wait_time(request_cost, token_cost);
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        self.consume(request_cost, token_cost);
    }
}
