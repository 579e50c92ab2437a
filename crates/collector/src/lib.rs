//! Tasklog - Collector
//!
//! Per-task syslog collector. A sandboxed task cannot write to the host
//! filesystem, so its stdout is sent as syslog traffic to a loopback listener
//! owned by this collector, which writes the reconstructed byte stream into
//! size-rotated files under the task's directory.
//!
//! # Architecture
//!
//! ```text
//! task --syslog/TCP--> [SyslogTcpSource] --records--> [StreamBridge]
//!                                                          |
//!                                   MessageDecoder (content bytes only)
//!                                                          |
//!                                                        pipe
//!                                                          v
//!                                <task_dir>/local/<task>.stdout.<n> <-- [FileRotator]
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tasklog_collector::{AllocDir, LaunchContext, SyslogCollector};
//!
//! let alloc_dir = AllocDir::new().with_task("web", "/alloc/web");
//! let ctx = LaunchContext::new("web", Arc::new(alloc_dir)).with_port_range(10000, 10100);
//!
//! let mut collector = SyslogCollector::default();
//! let state = collector.launch(&ctx).await?;
//! // point the task's syslog output at state.addr
//! collector.exit().await?;
//! ```

pub mod bridge;
pub mod collector;
pub mod context;
pub mod decoder;
pub mod logging;
pub mod port;
pub mod task_dir;

mod error;

pub use bridge::{BridgeMetrics, BridgeStats, PipeReader, PipeWriter, StreamBridge};
pub use collector::{CollectorMetrics, CollectorPhase, SyslogCollector};
pub use context::{
    CollectorState, DEFAULT_PORT_LOWER_BOUND, DEFAULT_PORT_UPPER_BOUND, IsolationConfig,
    LaunchContext,
};
pub use decoder::MessageDecoder;
pub use logging::{init_logging, init_test_logging};
pub use error::{CollectorError, DecodeError, Result};
pub use port::PortAllocator;
pub use task_dir::{AllocDir, TASK_LOCAL_DIR, TaskDirResolver};

pub use tasklog_config::{CollectorConfig, LogConfig, LogFormat, LogLevel, RotationPolicy};
