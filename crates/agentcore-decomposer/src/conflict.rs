//! Conflict detection (§4.6): subtasks placed in the same parallel wave
//! never have a dependency edge between them, but they can still collide on
//! the filesystem. Flag write-write and read-write overlaps so a scheduler
//! (or a human) can decide to serialize them instead.

use agentcore_types::{DependencyGraph, Subtask};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictKind {
    WriteWrite,
    ReadWrite,
}

#[derive(Debug, Clone)]
pub struct FileConflict {
    pub wave: usize,
    pub subtask_a: String,
    pub subtask_b: String,
    pub path: String,
    pub kind: ConflictKind,
}

/// Walk each parallel wave and report every pairwise file overlap.
pub fn detect_conflicts(subtasks: &[Subtask], graph: &DependencyGraph) -> Vec<FileConflict> {
    let mut conflicts = Vec::new();

    for (wave_idx, wave) in graph.parallel_groups.iter().enumerate() {
        for i in 0..wave.len() {
            for j in (i + 1)..wave.len() {
                let a = subtasks.iter().find(|s| &s.id == &wave[i]);
                let b = subtasks.iter().find(|s| &s.id == &wave[j]);
                let (Some(a), Some(b)) = (a, b) else { continue };

                if let (Some(a_mod), Some(b_mod)) = (&a.modifies, &b.modifies) {
                    for path in a_mod.intersection(b_mod) {
                        conflicts.push(FileConflict {
                            wave: wave_idx,
                            subtask_a: a.id.clone(),
                            subtask_b: b.id.clone(),
                            path: path.clone(),
                            kind: ConflictKind::WriteWrite,
                        });
                    }
                }

                if let (Some(a_mod), Some(b_read)) = (&a.modifies, &b.reads) {
                    for path in a_mod.intersection(b_read) {
                        conflicts.push(FileConflict {
                            wave: wave_idx,
                            subtask_a: a.id.clone(),
                            subtask_b: b.id.clone(),
                            path: path.clone(),
                            kind: ConflictKind::ReadWrite,
                        });
                    }
                }
                if let (Some(b_mod), Some(a_read)) = (&b.modifies, &a.reads) {
                    for path in b_mod.intersection(a_read) {
                        conflicts.push(FileConflict {
                            wave: wave_idx,
                            subtask_a: b.id.clone(),
                            subtask_b: a.id.clone(),
                            path: path.clone(),
                            kind: ConflictKind::ReadWrite,
                        });
                    }
                }
            }
        }
    }

    conflicts
}
