//! Task directory resolution
//!
//! The sandbox owns the on-disk layout. The collector only asks it where a
//! task's directory is and writes logs under its `local` subdirectory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Subdirectory of a task directory that receives the task's log files
pub const TASK_LOCAL_DIR: &str = "local";

/// Maps task names to their resolved directories
pub trait TaskDirResolver: Send + Sync {
    /// Absolute directory of `task`, or `None` if the task is unknown
    fn task_dir(&self, task: &str) -> Option<PathBuf>;
}

/// Allocation directory with one resolved directory per task
#[derive(Debug, Clone, Default)]
pub struct AllocDir {
    task_dirs: HashMap<String, PathBuf>,
}

impl AllocDir {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `task` under `dir`
    pub fn with_task(mut self, task: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.insert(task, dir);
        self
    }

    pub fn insert(&mut self, task: impl Into<String>, dir: impl Into<PathBuf>) {
        self.task_dirs.insert(task.into(), dir.into());
    }
}

impl TaskDirResolver for AllocDir {
    fn task_dir(&self, task: &str) -> Option<PathBuf> {
        self.task_dirs.get(task).cloned()
    }
}

/// Directory receiving the log files of a task rooted at `task_dir`
pub fn log_dir(task_dir: &Path) -> PathBuf {
    task_dir.join(TASK_LOCAL_DIR)
}

/// Base name of a task's stdout log files
pub fn log_base_name(task: &str) -> String {
    format!("{task}.stdout")
}
