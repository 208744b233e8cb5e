use std::collections::VecDeque;

/// One observed tool invocation, as fed to the doom-loop detector (§4.2).
#[derive(Debug, Clone)]
pub struct ToolCallObservation {
    pub tool_name: String,
    pub normalized_args: String,
    pub file_path: Option<String>,
    pub is_write: bool,
    pub output_summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DoomLoopKind {
    IdenticalCalls,
    NoOpEdits,
    ReadWriteOscillation,
}

#[derive(Debug, Clone)]
pub struct DoomLoopReport {
    pub kind: DoomLoopKind,
    pub signature: String,
    pub suggestion: String,
}

#[derive(Debug, Clone)]
pub struct DoomLoopConfig {
    /// Number of most-recent calls retained for analysis.
    pub window_size: usize,
    /// Number of identical trailing calls required to trip `IdenticalCalls`/`NoOpEdits`.
    pub repeat_threshold: usize,
}

impl Default for DoomLoopConfig {
    fn default() -> Self {
        Self { window_size: 20, repeat_threshold: 3 }
    }
}

/// Sliding-window detector over the last N tool calls (§4.2 Doom-loop detector).
pub struct DoomLoopDetector {
    config: DoomLoopConfig,
    window: VecDeque<ToolCallObservation>,
}

impl DoomLoopDetector {
    pub fn new(config: DoomLoopConfig) -> Self {
        Self { window: VecDeque::with_capacity(config.window_size), config }
    }

    pub fn record(&mut self, obs: ToolCallObservation) {
        self.window.push_back(obs);
        while self.window.len() > self.config.window_size {
            self.window.pop_front();
        }
    }

    pub fn check(&self) -> Option<DoomLoopReport> {
        self.check_identical_calls()
            .or_else(|| self.check_no_op_edits())
            .or_else(|| self.check_oscillation())
    }

    fn trailing(&self, n: usize) -> Vec<&ToolCallObservation> {
        let len = self.window.len();
        if len < n {
            return Vec::new();
        }
        self.window.iter().skip(len - n).collect()
    }

    fn check_identical_calls(&self) -> Option<DoomLoopReport> {
        let w = self.trailing(self.config.repeat_threshold);
        if w.is_empty() {
            return None;
        }
        let first = w[0];
        let all_identical = w
            .iter()
            .all(|o| o.tool_name == first.tool_name && o.normalized_args == first.normalized_args);
        if all_identical {
            Some(DoomLoopReport {
                kind: DoomLoopKind::IdenticalCalls,
                signature: format!("{}({})", first.tool_name, first.normalized_args),
                suggestion: format!(
                    "the last {} tool calls were identical invocations of `{}`; the agent is likely stuck and should change strategy",
                    w.len(),
                    first.tool_name
                ),
            })
        } else {
            None
        }
    }

    fn check_no_op_edits(&self) -> Option<DoomLoopReport> {
        let w = self.trailing(self.config.repeat_threshold);
        if w.is_empty() {
            return None;
        }
        let first = w[0];
        let Some(path) = &first.file_path else { return None };
        let all_same = w.iter().all(|o| {
            o.is_write && o.file_path.as_deref() == Some(path.as_str()) && o.output_summary == first.output_summary
        });
        if all_same {
            Some(DoomLoopReport {
                kind: DoomLoopKind::NoOpEdits,
                signature: format!("write({path})"),
                suggestion: format!(
                    "`{path}` was edited {} times in a row with no observable change; the edit is likely a no-op",
                    w.len()
                ),
            })
        } else {
            None
        }
    }

    fn check_oscillation(&self) -> Option<DoomLoopReport> {
        let w = self.trailing(self.config.repeat_threshold * 2);
        if w.len() < 4 {
            return None;
        }
        let Some(path) = &w[0].file_path else { return None };
        let same_path = w.iter().all(|o| o.file_path.as_deref() == Some(path.as_str()));
        if !same_path {
            return None;
        }
        let alternates = w.windows(2).all(|pair| pair[0].is_write != pair[1].is_write);
        if alternates {
            Some(DoomLoopReport {
                kind: DoomLoopKind::ReadWriteOscillation,
                signature: format!("oscillate({path})"),
                suggestion: format!(
                    "`{path}` is being read and written in alternation with no forward progress"
                ),
            })
        } else {
            None
        }
    }
}
