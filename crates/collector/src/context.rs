//! Launch input and launch result

use std::fmt;
use std::sync::Arc;

use tasklog_config::RotationPolicy;

use crate::task_dir::TaskDirResolver;

/// Default lower bound of the port search range
pub const DEFAULT_PORT_LOWER_BOUND: u16 = 10000;

/// Default upper bound of the port search range
pub const DEFAULT_PORT_UPPER_BOUND: u16 = 14000;

/// Everything the collector needs to start collecting one task's output
#[derive(Clone)]
pub struct LaunchContext {
    /// Task whose output is collected
    pub task_name: String,

    /// Resolves the task's directory
    pub resolver: Arc<dyn TaskDirResolver>,

    /// Rotation applied to the task's log files
    pub policy: RotationPolicy,

    /// Inclusive lower bound of the port range
    pub port_lower_bound: u16,

    /// Inclusive upper bound of the port range
    pub port_upper_bound: u16,
}

impl LaunchContext {
    pub fn new(task_name: impl Into<String>, resolver: Arc<dyn TaskDirResolver>) -> Self {
        Self {
            task_name: task_name.into(),
            resolver,
            policy: RotationPolicy::default(),
            port_lower_bound: DEFAULT_PORT_LOWER_BOUND,
            port_upper_bound: DEFAULT_PORT_UPPER_BOUND,
        }
    }

    pub fn with_policy(mut self, policy: RotationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the inclusive port range to search
    pub fn with_port_range(mut self, lower: u16, upper: u16) -> Self {
        self.port_lower_bound = lower;
        self.port_upper_bound = upper;
        self
    }
}

impl fmt::Debug for LaunchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchContext")
            .field("task_name", &self.task_name)
            .field("policy", &self.policy)
            .field("port_lower_bound", &self.port_lower_bound)
            .field("port_upper_bound", &self.port_upper_bound)
            .finish_non_exhaustive()
    }
}

/// Isolation settings applied to the collector; reserved, currently empty
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IsolationConfig {}

/// Result of a successful launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorState {
    /// Address the task should send its syslog traffic to
    pub addr: String,

    pub isolation: IsolationConfig,
}
