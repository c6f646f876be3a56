//! Execution planning
//!
//! Blocks are packed greedily, in template order, into phases whose members
//! are pairwise independent. A block never overtakes an earlier block it is
//! related to, so every phase boundary preserves the order of conflicting
//! blocks.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::analysis::BlockAnalysis;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    /// Block indices in template order
    pub blocks: Vec<usize>,
    /// More than one block and no barrier among them
    pub parallel: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub phases: Vec<Phase>,
}

impl ExecutionPlan {
    /// One block per phase, in order
    pub fn sequential(block_count: usize) -> Self {
        Self {
            phases: (0..block_count)
                .map(|i| Phase {
                    blocks: vec![i],
                    parallel: false,
                })
                .collect(),
        }
    }

    pub fn block_count(&self) -> usize {
        self.phases.iter().map(|p| p.blocks.len()).sum()
    }

    pub fn parallel_phases(&self) -> usize {
        self.phases.iter().filter(|p| p.parallel).count()
    }
}

/// Build the phase plan for analyzed blocks, given in template order.
pub fn create_execution_plan(analyses: &[BlockAnalysis]) -> ExecutionPlan {
    let n = analyses.len();
    let mut scheduled = vec![false; n];
    let mut remaining = n;
    let mut phases = Vec::new();

    while remaining > 0 {
        let mut members: Vec<usize> = Vec::new();

        for i in 0..n {
            if scheduled[i] {
                continue;
            }
            let waits_on_earlier = (0..i)
                .filter(|&j| !scheduled[j] && !members.contains(&j))
                .any(|j| analyses[i].related(&analyses[j]));
            let conflicts = members.iter().any(|&j| analyses[i].related(&analyses[j]));
            if !waits_on_earlier && !conflicts {
                members.push(i);
            }
        }

        if members.is_empty() {
            // unreachable while the earliest unscheduled block has nothing before it
            if let Some(first) = scheduled.iter().position(|s| !s) {
                members.push(first);
            }
        }

        for &i in &members {
            scheduled[i] = true;
        }
        remaining -= members.len();

        let parallel = members.len() > 1 && members.iter().all(|&i| !analyses[i].barrier);
        phases.push(Phase {
            blocks: members.iter().map(|&i| analyses[i].index).collect(),
            parallel,
        });
    }

    let plan = ExecutionPlan { phases };
    debug!(
        blocks = n,
        phases = plan.phases.len(),
        parallel = plan.parallel_phases(),
        "Created execution plan"
    );
    plan
}
