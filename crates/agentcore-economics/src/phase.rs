use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[allow(clippy::derive_ord_xor_partial_ord)]
pub enum Phase {
    Exploring,
    Planning,
    Implementing,
    Verifying,
}

impl Phase {
    /// Map a tool name onto the phase it's most associated with. Unknown
    /// tools default to `Implementing`, matching how the decomposer treats
    /// unknown subtask types (§9).
    pub fn classify_tool(tool_name: &str) -> Phase {
        let lowered = tool_name.to_lowercase();
        if ["read", "grep", "search", "list", "glob", "find", "ls", "cat"]
            .iter()
            .any(|t| lowered.contains(t))
        {
            Phase::Exploring
        } else if ["plan", "todo", "decompose", "design"].iter().any(|t| lowered.contains(t)) {
            Phase::Planning
        } else if ["test", "lint", "check", "verify", "review"].iter().any(|t| lowered.contains(t)) {
            Phase::Verifying
        } else {
            Phase::Implementing
        }
    }
}

#[derive(Debug, Clone)]
pub struct PhaseStallReport {
    pub phase: Phase,
    pub iterations_without_advance: u32,
    pub suggestion: String,
}

#[derive(Debug, Clone)]
pub struct PhaseTrackerConfig {
    pub window_size: usize,
    /// Iterations a phase may persist without advancing before a stall is reported.
    pub stall_threshold: u32,
}

impl Default for PhaseTrackerConfig {
    fn default() -> Self {
        Self { window_size: 10, stall_threshold: 5 }
    }
}

/// Infers the agent's current phase from the tool-type mix in a sliding
/// window and reports when the phase hasn't advanced despite activity (§4.2).
pub struct PhaseTracker {
    config: PhaseTrackerConfig,
    recent_tools: VecDeque<Phase>,
    current_phase: Phase,
    iterations_in_phase: u32,
    best_phase_reached: Phase,
}

impl PhaseTracker {
    pub fn new(config: PhaseTrackerConfig) -> Self {
        Self {
            recent_tools: VecDeque::with_capacity(config.window_size),
            config,
            current_phase: Phase::Exploring,
            iterations_in_phase: 0,
            best_phase_reached: Phase::Exploring,
        }
    }

    pub fn observe_tool(&mut self, tool_name: &str) {
        self.recent_tools.push_back(Phase::classify_tool(tool_name));
        while self.recent_tools.len() > self.config.window_size {
            self.recent_tools.pop_front();
        }
    }

    /// Dominant phase in the current window (ties broken toward the later phase).
    pub fn dominant_phase(&self) -> Phase {
        if self.recent_tools.is_empty() {
            return self.current_phase;
        }
        let mut counts = [0u32; 4];
        for phase in &self.recent_tools {
            counts[*phase as usize] += 1;
        }
        let max = *counts.iter().max().unwrap();
        (0..4)
            .rev()
            .find(|i| counts[*i] == max)
            .map(phase_from_index)
            .unwrap_or(self.current_phase)
    }

    /// Advance the per-iteration bookkeeping. Call once per kernel iteration
    /// after observing that iteration's tool calls.
    pub fn tick(&mut self) -> Option<PhaseStallReport> {
        let dominant = self.dominant_phase();
        if dominant > self.best_phase_reached {
            self.best_phase_reached = dominant;
            self.current_phase = dominant;
            self.iterations_in_phase = 0;
            return None;
        }

        self.current_phase = dominant;
        self.iterations_in_phase += 1;

        if self.iterations_in_phase >= self.config.stall_threshold && !self.recent_tools.is_empty() {
            Some(PhaseStallReport {
                phase: self.current_phase,
                iterations_without_advance: self.iterations_in_phase,
                suggestion: format!(
                    "phase has stayed at {:?} for {} iterations despite activity; consider nudging toward the next phase",
                    self.current_phase, self.iterations_in_phase
                ),
            })
        } else {
            None
        }
    }
}

fn phase_from_index(i: usize) -> Phase {
    match i {
        0 => Phase::Exploring,
        1 => Phase::Planning,
        2 => Phase::Implementing,
        _ => Phase::Verifying,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_tool_names() {
        assert_eq!(Phase::classify_tool("grep"), Phase::Exploring);
        assert_eq!(Phase::classify_tool("run_tests"), Phase::Verifying);
        assert_eq!(Phase::classify_tool("write_file"), Phase::Implementing);
    }

    #[test]
    fn advancing_phase_resets_stall_counter() {
        let mut tracker = PhaseTracker::new(PhaseTrackerConfig { window_size: 5, stall_threshold: 3 });
        tracker.observe_tool("grep");
        assert!(tracker.tick().is_none());
        tracker.observe_tool("write_file");
        tracker.observe_tool("write_file");
        tracker.observe_tool("write_file");
        assert!(tracker.tick().is_none());
    }

    #[test]
    fn reports_stall_after_threshold_without_advancing() {
        let mut tracker = PhaseTracker::new(PhaseTrackerConfig { window_size: 5, stall_threshold: 2 });
        tracker.observe_tool("write_file");
        tracker.tick();
        tracker.observe_tool("write_file");
        let report = tracker.tick();
        assert!(report.is_some());
    }
}
