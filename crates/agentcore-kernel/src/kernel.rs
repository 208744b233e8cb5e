//! The kernel agent loop (K, §2, §9): build request -> R.call -> O.record ->
//! apply tool via U -> B.check -> continue. Ties resilience, economics,
//! cache, journal, trace, decomposer and swarm together; everything else
//! (TUI, wire adapters, skill loaders) is an external collaborator (§1).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use agentcore_cache::{ActualCacheUsage, CacheBoundaryTracker, CacheMessage, CacheRequest};
use agentcore_economics::{
    DoomLoopConfig, DoomLoopDetector, DoomLoopReport, Economics, LlmUsageDelta, PhaseStallReport,
    PhaseTracker, PhaseTrackerConfig, ToolCallObservation,
};
use agentcore_journal::{CapturedWrite, Journal};
use agentcore_providers::{
    ChatMessage, ChatOptions, ChatWithToolsResponse, MessageRole, Provider, StopReason, ToolCallRequest, ToolDefinition,
};
use agentcore_resilience::{
    CircuitBreakerConfig, FallbackChain, ProviderCallError, ResilientExecutor, RetryConfig, TripCause, TripEligible,
};
use agentcore_tools::{DangerLevel, ToolContext, ToolOutcome, ToolRegistry};
use agentcore_trace::{IterationAggregate, TraceCollector};
use agentcore_types::{BudgetVerdict, FileOperation};

use crate::cancellation::CancellationSource;
use crate::config::KernelConfig;
use crate::error::KernelError;

/// One tool call's settled result, as the kernel hands it back to callers
/// (and as the swarm's `SwarmTaskResult` is built from, one level up).
#[derive(Debug, Clone)]
pub struct ToolExecutionRecord {
    pub tool_call_id: String,
    pub tool_name: String,
    pub outcome: ToolOutcome,
    pub file_change_id: Option<String>,
    /// A normalized (compact, order-stable) rendering of the call's
    /// arguments, fed to B's doom-loop detector (§4.2) so identical-call
    /// detection compares what the model actually asked for rather than a
    /// per-call-unique id.
    pub normalized_args: String,
    pub file_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IterationOutcome {
    pub iteration: u32,
    pub assistant_text: String,
    pub stop_reason: StopReason,
    pub tool_results: Vec<ToolExecutionRecord>,
    pub verdict: BudgetVerdict,
    pub doom_loop: Option<DoomLoopReport>,
    pub phase_stall: Option<PhaseStallReport>,
    /// True once the kernel has decided not to run another iteration, either
    /// because the model reached `end_turn` with no tool calls or because
    /// the budget verdict said to stop.
    pub should_stop: bool,
}

/// Everything the kernel needs to run one session, built once per session
/// (or once per subagent, via [`Kernel::spawn_subagent`]).
pub struct Kernel {
    session_id: String,
    config: KernelConfig,
    system_prompt: String,
    providers: Arc<HashMap<String, Arc<dyn Provider>>>,
    tools: Arc<ToolRegistry>,
    journal: Arc<Journal>,
    trace: TraceCollector,
    resilient: ResilientExecutor,
    economics: Economics,
    cache: CacheBoundaryTracker,
    doom_loop: DoomLoopDetector,
    phase: PhaseTracker,
    cancel: CancellationSource,
    workspace_root: PathBuf,
    turn_number: u32,
    /// §5 first-iteration guard: `force_text_only` is never honored before
    /// at least one LLM call has settled in this session. This lives in the
    /// kernel, deliberately not in `agentcore-economics`, per §4.2/§9.
    settled_llm_calls: u32,
}

impl Kernel {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: impl Into<String>,
        config: KernelConfig,
        system_prompt: impl Into<String>,
        providers: Vec<Arc<dyn Provider>>,
        tools: Arc<ToolRegistry>,
        journal: Arc<Journal>,
        trace: TraceCollector,
        workspace_root: PathBuf,
    ) -> Self {
        let trip_eligible = TripEligible::All;
        let chain = FallbackChain::new(
            providers
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    (
                        p.id().to_string(),
                        i as u32,
                        CircuitBreakerConfig {
                            failure_threshold: config.failure_threshold,
                            reset_timeout: config.reset_timeout(),
                            half_open_requests: config.half_open_requests,
                            trip_eligible: trip_eligible.clone(),
                            request_timeout: Some(config.request_timeout()),
                        },
                    )
                })
                .collect(),
        );
        let provider_map: HashMap<String, Arc<dyn Provider>> = providers.into_iter().map(|p| (p.id().to_string(), p)).collect();

        Self {
            session_id: session_id.into(),
            economics: Economics::new(config.budget_config()),
            resilient: ResilientExecutor::new(chain, RetryConfig::default()),
            cache: CacheBoundaryTracker::new(Default::default()),
            doom_loop: DoomLoopDetector::new(DoomLoopConfig::default()),
            phase: PhaseTracker::new(PhaseTrackerConfig::default()),
            config,
            system_prompt: system_prompt.into(),
            providers: Arc::new(provider_map),
            tools,
            journal,
            trace,
            cancel: CancellationSource::new(),
            workspace_root,
            turn_number: 0,
            settled_llm_calls: 0,
        }
    }

    pub fn cancellation(&self) -> CancellationSource {
        self.cancel.clone()
    }

    pub fn economics(&self) -> &Economics {
        &self.economics
    }

    pub fn set_token_baseline(&mut self, estimate: u64) {
        self.economics.set_baseline(estimate);
    }

    /// Suppress `force_text_only` until at least one LLM call has settled
    /// (§5 first-iteration guard, §8 correctness-critical invariant).
    fn apply_first_iteration_guard(&self, mut verdict: BudgetVerdict) -> BudgetVerdict {
        if self.settled_llm_calls == 0 {
            verdict.force_text_only = false;
        }
        verdict
    }

    /// Run exactly one iteration of the loop: a single LLM call plus
    /// dispatch of every tool call it requested.
    pub async fn run_iteration(&mut self, messages: &[ChatMessage]) -> Result<IterationOutcome, KernelError> {
        if self.cancel.is_cancelled() {
            return Err(KernelError::Cancelled(self.cancel.reason().unwrap_or_default()));
        }
        self.turn_number += 1;

        let handle = self.trace.start_iteration().await?;
        let tool_defs: Vec<ToolDefinition> = self
            .tools
            .definitions()
            .into_iter()
            .map(|(name, description, args_schema)| ToolDefinition { name, description, args_schema })
            .collect();

        let cache_request = CacheRequest {
            stable_prefix: canonical_prefix(&self.system_prompt, &tool_defs),
            messages: messages.iter().map(to_cache_message).collect(),
        };
        let breakpoint = self.cache.analyze(cache_request);

        let providers = Arc::clone(&self.providers);
        let trace = &self.trace;
        let model = self.config_model();
        let req_messages = messages.to_vec();
        let req_tools = tool_defs.clone();
        let cancel_token = self.cancel.token();

        let call_result = self
            .resilient
            .execute(&cancel_token, move |provider_id| {
                let providers = Arc::clone(&providers);
                let model = model.clone();
                let req_messages = req_messages.clone();
                let req_tools = req_tools.clone();
                let provider_id = provider_id.to_string();
                async move {
                    let provider = providers
                        .get(&provider_id)
                        .ok_or_else(|| ProviderCallError::new(TripCause::Other, false, anyhow::anyhow!("unknown provider {provider_id}")))?;

                    let request_id = trace
                        .record_llm_request(&provider_id, req_messages.len())
                        .await
                        .map_err(|e| ProviderCallError::new(TripCause::Other, false, anyhow::anyhow!(e)))?;

                    let options = ChatOptions { model, max_tokens: None, temperature: None, request_timeout: None };
                    let response = provider.chat_with_tools(&req_messages, &req_tools, &options).await;

                    match response {
                        Ok(resp) => {
                            let _ = trace
                                .record_llm_response(
                                    &request_id,
                                    resp.usage.input_tokens,
                                    resp.usage.output_tokens,
                                    resp.usage.cache_read_tokens.unwrap_or(0),
                                    resp.usage.cost.unwrap_or(0.0),
                                    stop_reason_str(resp.stop_reason),
                                )
                                .await;
                            Ok(resp)
                        }
                        Err(err) => {
                            let cause = classify_provider_error(&err);
                            let retryable = err.is_retryable();
                            Err(ProviderCallError::new(cause, retryable, err))
                        }
                    }
                }
            })
            .await;

        let response = match call_result {
            Ok(resp) => resp,
            Err(resilience_err) => {
                self.trace.record_error("provider_call", &resilience_err.to_string()).await.ok();
                return Err(KernelError::Resilience(resilience_err));
            }
        };

        self.settled_llm_calls += 1;

        self.economics.record_llm_call(&LlmUsageDelta {
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
            cache_read_tokens: response.usage.cache_read_tokens.unwrap_or(0),
            cost: response.usage.cost,
        });
        self.economics.record_iteration();

        let reconciliation = self.cache.reconcile(ActualCacheUsage {
            input_tokens: response.usage.input_tokens,
            cache_read_tokens: response.usage.cache_read_tokens.unwrap_or(0),
            cache_write_tokens: response.usage.cache_write_tokens.unwrap_or(0),
        });
        let _ = breakpoint;

        let mut verdict = self.apply_first_iteration_guard(self.economics.check());

        let mut tool_results = Vec::new();
        if !verdict.force_text_only && matches!(response.stop_reason, StopReason::ToolUse) {
            tool_results = self.dispatch_tool_calls(&response.tool_calls).await?;
            for record in &tool_results {
                self.economics.record_tool_call();
                let is_write = record.outcome.success && record.file_change_id.is_some();
                self.doom_loop.record(ToolCallObservation {
                    tool_name: record.tool_name.clone(),
                    normalized_args: record.normalized_args.clone(),
                    file_path: record.file_path.clone(),
                    is_write,
                    output_summary: record.outcome.output.clone(),
                });
                self.phase.observe_tool(&record.tool_name);
            }
            verdict = self.apply_first_iteration_guard(self.economics.check());
        }

        let doom_report = self.doom_loop.check();
        let phase_stall = self.phase.tick();

        let aggregate = IterationAggregate {
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
            tool_call_count: tool_results.len() as u32,
            total_cost: response.usage.cost.unwrap_or(0.0),
            cache_hit_rate: reconciliation.hit_rate,
        };
        let iteration_number = handle.number;
        self.trace.end_iteration(handle, aggregate).await?;

        let should_stop = !verdict.can_continue || matches!(response.stop_reason, StopReason::EndTurn | StopReason::StopSequence);

        Ok(IterationOutcome {
            iteration: iteration_number,
            assistant_text: response.content,
            stop_reason: response.stop_reason,
            tool_results,
            verdict,
            doom_loop: doom_report,
            phase_stall,
            should_stop,
        })
    }

    fn config_model(&self) -> String {
        "default".to_string()
    }

    /// Dispatch every tool call the model requested. Wraps file-mutating
    /// tools (danger level above `Safe`, with a `path` argument) through the
    /// journal's pre/post-image capture (§4.4, §9 shared-resource policy: the
    /// journal is the single writer of any tracked file during a turn).
    async fn dispatch_tool_calls(&mut self, tool_calls: &[ToolCallRequest]) -> Result<Vec<ToolExecutionRecord>, KernelError> {
        let mut results = Vec::with_capacity(tool_calls.len());

        for call in tool_calls {
            if self.cancel.is_cancelled() {
                return Err(KernelError::Cancelled(self.cancel.reason().unwrap_or_default()));
            }

            self.trace.record_tool_execution_start(&call.id, &call.name, &call.args).await?;

            let tool = self.tools.get(&call.name);
            let danger = tool.as_ref().map(|t| t.danger_level()).unwrap_or(DangerLevel::Safe);
            let path_arg = call.args.get("path").and_then(|v| v.as_str()).map(str::to_string);

            let content_before = match (&path_arg, danger) {
                (Some(path), d) if d != DangerLevel::Safe => {
                    tokio::fs::read_to_string(self.workspace_root.join(path)).await.ok()
                }
                _ => None,
            };

            let ctx = ToolContext {
                session_id: self.session_id.clone(),
                turn_number: self.turn_number,
                cancel: self.cancel.token(),
                workspace_root: self.workspace_root.clone(),
            };

            let outcome = self.tools.execute(&call.name, call.args.clone(), &ctx).await;

            let (outcome, file_change_id) = match outcome {
                Ok(outcome) => {
                    let file_change_id = if let (Some(path), true) = (&path_arg, danger != DangerLevel::Safe && outcome.success) {
                        let content_after = tokio::fs::read_to_string(self.workspace_root.join(path)).await.ok();
                        if content_after != content_before {
                            let operation = match (&content_before, &content_after) {
                                (None, Some(_)) => FileOperation::Create,
                                (Some(_), None) => FileOperation::Delete,
                                _ => {
                                    if call.name == "edit_file" {
                                        FileOperation::Edit
                                    } else {
                                        FileOperation::Write
                                    }
                                }
                            };
                            let change = self
                                .journal
                                .capture(CapturedWrite {
                                    session_id: self.session_id.clone(),
                                    turn_number: self.turn_number,
                                    tool_call_id: Some(call.id.clone()),
                                    file_path: path.clone(),
                                    operation,
                                    content_before: content_before.clone(),
                                    content_after,
                                })
                                .await?;
                            Some(change.id)
                        } else {
                            None
                        }
                    } else {
                        None
                    };
                    (outcome, file_change_id)
                }
                Err(e) => (ToolOutcome::failed(e.to_string()), None),
            };

            self.trace.record_tool_execution_end(&call.id, outcome.success, &outcome.output).await?;

            results.push(ToolExecutionRecord {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                outcome,
                file_change_id,
                normalized_args: normalize_tool_args(&call.args),
                file_path: path_arg,
            });
        }

        Ok(results)
    }

    /// Spawn a subagent view: a child trace collector writing into this
    /// session's file under a tag, paired with the caller-supplied derived
    /// `Economics` pool (§2, §9). The kernel itself only wires the trace
    /// link; the shared-budget reservation is the caller's responsibility
    /// via `agentcore_swarm::SharedBudgetPool` (§4.7).
    pub async fn spawn_subagent_view(
        &self,
        subagent_id: &str,
        subagent_type: &str,
        spawned_at_iteration: u32,
    ) -> Result<TraceCollector, KernelError> {
        Ok(self
            .trace
            .spawn_subagent_view(subagent_id, subagent_type, &self.session_id, spawned_at_iteration)
            .await?)
    }
}

/// Render a tool call's arguments as a compact, key-sorted string so two
/// calls with the same logical arguments compare equal regardless of key
/// order in the source JSON. Used only to feed B's doom-loop detector
/// (§4.2) a stable signature for "identical call" comparisons.
fn normalize_tool_args(args: &serde_json::Value) -> String {
    fn sorted(value: &serde_json::Value) -> serde_json::Value {
        match value {
            serde_json::Value::Object(map) => {
                let mut entries: Vec<(&String, &serde_json::Value)> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                let mut out = serde_json::Map::new();
                for (k, v) in entries {
                    out.insert(k.clone(), sorted(v));
                }
                serde_json::Value::Object(out)
            }
            serde_json::Value::Array(items) => serde_json::Value::Array(items.iter().map(sorted).collect()),
            other => other.clone(),
        }
    }

    sorted(args).to_string()
}

fn stop_reason_str(reason: StopReason) -> &'static str {
    match reason {
        StopReason::EndTurn => "end_turn",
        StopReason::ToolUse => "tool_use",
        StopReason::MaxTokens => "max_tokens",
        StopReason::StopSequence => "stop_sequence",
    }
}

fn classify_provider_error(err: &agentcore_providers::ProviderError) -> TripCause {
    use agentcore_providers::ProviderError;
    match err {
        ProviderError::Network(_) => TripCause::Network,
        ProviderError::RateLimited => TripCause::RateLimited,
        ProviderError::Timeout => TripCause::Timeout,
        ProviderError::Http { status, .. } if *status >= 500 => TripCause::ServerError,
        _ => TripCause::Other,
    }
}

fn canonical_prefix(system_prompt: &str, tools: &[ToolDefinition]) -> String {
    let mut out = system_prompt.to_string();
    for tool in tools {
        out.push('\n');
        out.push_str(&tool.name);
        out.push(':');
        out.push_str(&tool.description);
    }
    out
}

fn to_cache_message(m: &ChatMessage) -> CacheMessage {
    CacheMessage {
        role: role_str(m.role).to_string(),
        content: m.content.clone(),
        is_tool_result: matches!(m.role, MessageRole::Tool),
    }
}

fn role_str(role: MessageRole) -> &'static str {
    match role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::Tool => "tool",
    }
}

/// Tags a decision the kernel recorded to its trace (§2: "a distinguished
/// error surfaces to K, which records a `decision` trace"). Also surfaces
/// the same decision to the process-wide structured log so an operator
/// watching `tracing` output (rather than tailing a session's JSONL) still
/// sees policy-level events.
pub async fn record_policy_decision(trace: &TraceCollector, reason: &str, detail: serde_json::Value) -> Result<(), KernelError> {
    agentcore_observability::emit_event(
        tracing::Level::WARN,
        agentcore_observability::ProcessKind::Kernel,
        agentcore_observability::ObservabilityEvent {
            event: "policy_decision",
            component: "kernel",
            correlation_id: None,
            session_id: None,
            run_id: None,
            message_id: None,
            provider_id: None,
            model_id: None,
            status: Some(reason),
            error_code: None,
            detail: Some(&detail.to_string()),
        },
    );
    trace.record_decision(reason, &detail).await?;
    Ok(())
}

/// Helper used by callers building the first request of a session: a fresh
/// session id and zeroed turn counter.
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}
