//! Planned actions for a deployment

use crate::state::{ExecutionState, ResourceStatus};
use serde::{Deserialize, Serialize};
use stackflow_core::{DescriptorSet, ResourceKind};

/// Represents a planned action for one resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Resource identifier
    pub resource_id: String,

    pub kind: ResourceKind,

    /// Type of action to perform
    pub action_type: ActionType,

    /// Status recorded by the previous run
    pub current: ResourceStatus,

    /// Description of the action
    pub description: String,
}

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource (or adopt an existing one)
    Create,
    /// Delete a resource
    Delete,
    /// No changes needed
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Plan containing all actions in execution order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// List of actions to perform
    pub actions: Vec<Action>,

    /// Whether the plan has any changes
    pub has_changes: bool,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        let has_changes = actions.iter().any(|a| a.action_type != ActionType::NoOp);
        Self {
            actions,
            has_changes,
        }
    }

    /// What `provision` would do, in dependency order
    pub fn for_provision(set: &DescriptorSet, state: &ExecutionState) -> Self {
        let actions = set
            .ordered()
            .map(|desc| {
                let current = state.status(&desc.id);
                let (action_type, description) = match current {
                    ResourceStatus::Created => (ActionType::NoOp, "already created".to_string()),
                    ResourceStatus::Unknown => (
                        ActionType::Create,
                        "reconcile interrupted create".to_string(),
                    ),
                    _ => (ActionType::Create, format!("create {}", desc.kind)),
                };
                Action {
                    resource_id: desc.id.clone(),
                    kind: desc.kind,
                    action_type,
                    current,
                    description,
                }
            })
            .collect();
        Self::new(actions)
    }

    /// What `teardown` would do, in reverse dependency order
    pub fn for_teardown(set: &DescriptorSet, state: &ExecutionState) -> Self {
        let actions = set
            .ordered()
            .rev()
            .map(|desc| {
                let current = state.status(&desc.id);
                let (action_type, description) = match (current, state.handle(&desc.id)) {
                    (ResourceStatus::Created, Some(handle)) => {
                        (ActionType::Delete, format!("delete {}", handle.id))
                    }
                    (ResourceStatus::Unknown, _) => (
                        ActionType::NoOp,
                        "state unknown, provision first to reconcile".to_string(),
                    ),
                    _ => (ActionType::NoOp, "nothing deployed".to_string()),
                };
                Action {
                    resource_id: desc.id.clone(),
                    kind: desc.kind,
                    action_type,
                    current,
                    description,
                }
            })
            .collect();
        Self::new(actions)
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            delete: self.actions_by_type(ActionType::Delete).len(),
            no_change: self.actions_by_type(ActionType::NoOp).len(),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub create: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to delete, {} unchanged",
            self.create, self.delete, self.no_change
        )
    }
}
