//! Per-invocation state machine

use serde::{Deserialize, Serialize};
use tracing::{Span, info_span, info};
use uuid::Uuid;

/// Pipeline progress for one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PipelineState {
    Start,
    PathResolved,
    DataLoaded,
    DateResolved,
    Normalized,
    PartitionsDerived,
    CatalogReady,
    Written,
    Done,
    Failed,
}

impl PipelineState {
    /// Whether the machine may move from `self` to `next`.
    ///
    /// `DataLoaded → CatalogReady` is the un-partitioned shortcut. Any
    /// non-terminal state may fail.
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;

        if next == Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Start, PathResolved)
                | (PathResolved, DataLoaded)
                | (DataLoaded, DateResolved)
                | (DataLoaded, CatalogReady)
                | (DateResolved, Normalized)
                | (Normalized, PartitionsDerived)
                | (PartitionsDerived, CatalogReady)
                | (CatalogReady, Written)
                | (Written, Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineState::Start => "Start",
            PipelineState::PathResolved => "PathResolved",
            PipelineState::DataLoaded => "DataLoaded",
            PipelineState::DateResolved => "DateResolved",
            PipelineState::Normalized => "Normalized",
            PipelineState::PartitionsDerived => "PartitionsDerived",
            PipelineState::CatalogReady => "CatalogReady",
            PipelineState::Written => "Written",
            PipelineState::Done => "Done",
            PipelineState::Failed => "Failed",
        };
        write!(f, "{}", name)
    }
}

/// State of one invocation, owned by the task that runs it
#[derive(Debug)]
pub struct InvocationContext {
    invocation_id: Uuid,
    object_key: String,
    history: Vec<PipelineState>,
    span: Span,
}

impl InvocationContext {
    pub fn new(object_key: impl Into<String>) -> Self {
        let invocation_id = Uuid::new_v4();
        let object_key = object_key.into();
        let span = info_span!("ingest", %invocation_id, key = %object_key);
        Self {
            invocation_id,
            object_key,
            history: vec![PipelineState::Start],
            span,
        }
    }

    pub fn invocation_id(&self) -> Uuid {
        self.invocation_id
    }

    pub fn object_key(&self) -> &str {
        &self.object_key
    }

    /// Span every log line of the invocation is recorded in
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn state(&self) -> PipelineState {
        self.history
            .last()
            .copied()
            .unwrap_or(PipelineState::Start)
    }

    /// Every state visited so far, starting with `Start`
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// Move to `next`, logging the transition
    pub fn transition(&mut self, next: PipelineState) {
        let current = self.state();
        debug_assert!(
            current.can_transition_to(next),
            "illegal pipeline transition {} -> {}",
            current,
            next
        );

        let _entered = self.span.enter();
        info!(from = %current, to = %next, "Pipeline state transition");
        self.history.push(next);
    }
}
