//! Execution Event Schema Definition
//!
//! This module defines the canonical ExecutionEvent enum and envelope wrapper
//! for versioned execution tracing, replay, and monitoring.
//!
//! # Schema Version
//!
//! The schema version is used to ensure compatibility between trace recording
//! and replay systems. Versions are integers starting from 1.

use serde::{Deserialize, Serialize};

/// Current schema version for execution events
pub const SCHEMA_VERSION: u32 = 1;

/// Canonical execution event types for workflow execution tracing
///
/// This enum defines the core events that can occur during workflow execution.
/// Each variant represents a distinct phase or action in the workflow lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum ExecutionEvent {
    /// Workflow execution started
    WorkflowStarted {
        workflow_id: String,
        workflow_name: String,
        started_at: u64, // Unix timestamp in milliseconds
    },

    /// Node execution started
    NodeStarted {
        node_id: String,
        node_name: String,
        parent_span_id: Option<String>,
    },

    /// Node execution completed
    NodeCompleted {
        node_id: String,
        output: Option<serde_json::Value>,
        duration_ms: u64,
    },

    /// Node execution failed
    NodeFailed {
        node_id: String,
        error: String,
        duration_ms: u64,
    },

    /// Tool invocation started
    ToolInvoked {
        tool_name: String,
        input: serde_json::Value,
        invocation_id: String,
    },

    /// Tool invocation completed
    ToolCompleted {
        invocation_id: String,
        output: serde_json::Value,
        duration_ms: u64,
    },

    /// Tool invocation failed
    ToolFailed {
        invocation_id: String,
        error: String,
        duration_ms: u64,
    },

    /// State update occurred
    StateUpdated {
        key: String,
        old_value: Option<serde_json::Value>,
        new_value: serde_json::Value,
    },

    /// Workflow execution completed
    WorkflowCompleted {
        workflow_id: String,
        final_output: Option<serde_json::Value>,
        total_duration_ms: u64,
    },

    /// Workflow execution failed
    WorkflowFailed {
        workflow_id: String,
        error: String,
        total_duration_ms: u64,
    },

    /// Retry attempt for a node
    NodeRetrying {
        node_id: String,
        attempt: u32,
        max_attempts: u32,
        last_error: Option<String>,
    },

    /// Branch decision made (conditional nodes)
    BranchDecision {
        node_id: String,
        branch_taken: String,
        condition_result: bool,
    },

    /// Parallel execution group started
    ParallelGroupStarted {
        group_id: String,
        node_ids: Vec<String>,
    },

    /// Parallel execution group completed
    ParallelGroupCompleted {
        group_id: String,
        completed_count: u32,
    },
}

/// Envelope wrapper for execution events with schema version
///
/// All execution events should be wrapped in this envelope to ensure
/// proper schema versioning and future compatibility.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionEventEnvelope {
    /// Schema version for this event
    pub schema_version: u32,

    /// The wrapped execution event
    pub event: ExecutionEvent,
}

impl ExecutionEventEnvelope {
    /// Create a new envelope with the current schema version
    pub fn new(event: ExecutionEvent) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            event,
        }
    }

    /// Validate that the schema version is compatible
    ///
    /// Returns true if the version matches the current schema version.
    /// In the future, this may support forward compatibility.
    pub fn is_compatible(&self) -> bool {
        self.schema_version == SCHEMA_VERSION
    }
}
