//! Graph topology: the fixed set of nodes and the routing table between them.
//!
//! Unlike the general-purpose `StateGraph` builders this crate's ancestor
//! shipped, the financial-analysis graph has one topology, known at compile
//! time (spec §2). There is nothing to build or compile — `GraphNode` and
//! [`route_after_verification`] are the whole of it. The [`crate::engine`]
//! module walks this routing table one transition at a time.

use std::fmt;

use crate::state::{FinanceState, Verdict};

/// Virtual entry point, never executed as a node.
pub const START: &str = "__start__";
/// Virtual terminal point, never executed as a node.
pub const END: &str = "__end__";

/// The seven executable nodes of the graph (spec §2), plus `Start`/`End`
/// so a transition trace can name the virtual endpoints too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphNode {
    Start,
    QueryRouter,
    DirectResponse,
    Decomposer,
    StepExecutor,
    Verifier,
    AdvanceIndex,
    OutputFormatter,
    End,
}

impl GraphNode {
    pub fn name(&self) -> &'static str {
        match self {
            GraphNode::Start => START,
            GraphNode::QueryRouter => "QueryRouter",
            GraphNode::DirectResponse => "DirectResponse",
            GraphNode::Decomposer => "Decomposer",
            GraphNode::StepExecutor => "StepExecutor",
            GraphNode::Verifier => "Verifier",
            GraphNode::AdvanceIndex => "AdvanceIndex",
            GraphNode::OutputFormatter => "OutputFormatter",
            GraphNode::End => END,
        }
    }
}

impl fmt::Display for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Where control goes after `QueryRouter` classifies the query (spec §2
/// edge table: `financial` → `Decomposer`, `non_financial` → `DirectResponse`).
pub fn route_after_classification(state: &FinanceState) -> GraphNode {
    match state.query_type {
        Some(crate::state::QueryType::Financial) => GraphNode::Decomposer,
        _ => GraphNode::DirectResponse,
    }
}

/// The sole source of truth for "where does control go next after the
/// Verifier?" (spec §4.5 / §9 "Collapse into a single predicate"). A pure
/// function of `state.last_verification.verdict` and the position of
/// `current_step_index` relative to `len(steps)`.
pub fn route_after_verification(state: &FinanceState) -> GraphNode {
    let verdict = state
        .last_verification
        .as_ref()
        .map(|v| v.verdict)
        .unwrap_or(Verdict::Ok);

    match verdict {
        Verdict::NeedsMoreData => GraphNode::StepExecutor,
        Verdict::Replan => GraphNode::Decomposer,
        Verdict::Ok => {
            if state.current_step_index + 1 < state.steps.len() {
                GraphNode::AdvanceIndex
            } else {
                GraphNode::OutputFormatter
            }
        }
    }
}
