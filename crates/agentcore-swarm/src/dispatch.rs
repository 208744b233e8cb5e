//! Dispatch (§4.7): assign ready subtasks to idle workers in priority order
//! `(complexity desc, explicit priority)`; overflow queues and is pulled by
//! whichever worker frees up next, so one slow worker never stalls peers.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;

use agentcore_types::Subtask;
use tokio::sync::Mutex;

use crate::budget_pool::Priority;
use crate::error::SwarmError;
use crate::result::SwarmTaskResult;
use crate::worker::{WorkerSpec, WorkerState};

pub struct SwarmScheduler {
    workers: Vec<Arc<Mutex<WorkerState>>>,
}

impl SwarmScheduler {
    pub fn new(specs: Vec<WorkerSpec>) -> Result<Self, SwarmError> {
        if specs.is_empty() {
            return Err(SwarmError::EmptyPool);
        }
        Ok(Self { workers: specs.into_iter().map(|s| Arc::new(Mutex::new(WorkerState::new(s)))).collect() })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Run one parallel wave to completion. `executor` performs the actual
    /// subtask work (an LLM-backed agent turn, in production); it receives
    /// the subtask and the worker's spec and returns a typed result.
    pub async fn dispatch_wave<F, Fut>(&self, subtasks: Vec<Subtask>, priorities: &HashMap<String, Priority>, executor: F) -> Vec<SwarmTaskResult>
    where
        F: Fn(Subtask, WorkerSpec) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SwarmTaskResult> + Send + 'static,
    {
        let mut ordered = subtasks;
        ordered.sort_by(|a, b| {
            b.complexity.cmp(&a.complexity).then_with(|| {
                let pa = priorities.get(&a.id).copied().unwrap_or(Priority::Normal);
                let pb = priorities.get(&b.id).copied().unwrap_or(Priority::Normal);
                pb.cmp(&pa)
            })
        });

        let queue = Arc::new(Mutex::new(VecDeque::from(ordered)));
        let executor = Arc::new(executor);
        let results = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::with_capacity(self.workers.len());
        for worker in &self.workers {
            let queue = queue.clone();
            let worker = worker.clone();
            let executor = executor.clone();
            let results = results.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let next = queue.lock().await.pop_front();
                    let Some(subtask) = next else { break };

                    let spec = {
                        let mut state = worker.lock().await;
                        state.busy = true;
                        state.limiter.acquire(1, subtask.complexity as u64 * 1_000).await;
                        state.spec.clone()
                    };

                    let result = executor(subtask, spec).await;

                    let mut state = worker.lock().await;
                    state.busy = false;
                    state.economics.record_iteration();
                    results.lock().await.push(result);
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }

        Arc::try_unwrap(results).expect("every dispatch_wave worker task has joined by now").into_inner()
    }
}
