//! Syslog collector lifecycle
//!
//! One collector serves one task. `launch` wires the pipeline, `exit` tears
//! it down, and `update_log_config` changes rotation limits in between.
//!
//! ```text
//! Idle --launch--> Launching --ok--> Running --exit--> Exited
//!                      |
//!                      +--error--> Idle
//! ```
//!
//! # Startup order
//!
//! 1. Validate the rotation policy
//! 2. Resolve the task directory (nothing is bound yet if this fails)
//! 3. Find a free port in the requested range
//! 4. Open the rotating log under `<task_dir>/local/<task>.stdout.<n>`
//! 5. Bind the syslog listener to the chosen address
//! 6. Spawn the sink, the bridge pump and the accept loop
//!
//! Every await happens before step 6, so a failed or dropped launch leaves
//! no background task behind. Objects built by earlier steps are dropped,
//! which closes the file and the socket.
//!
//! # Shutdown order
//!
//! The listener stops accepting and closes its socket first, so the port is
//! free at once. Connections still open are read to end of stream within
//! the shutdown timeout; past it they are aborted. The last reader closes
//! the record channel, which ends the pump, which closes the pipe, which
//! lets the sink flush and close the file. The pump and the sink each get
//! their own deadline and are aborted if they overrun.

use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tasklog_config::{CollectorConfig, ConfigError, RotationPolicy};
use tasklog_sinks::{
    FileRotator, FileRotatorConfig, RotationLimits, RotationLimitsHandle, RotatorError,
    RotatorMetrics, RotatorMetricsSnapshot,
};
use tasklog_sources::{
    SyslogTcpMetricsSnapshot, SyslogTcpSource, SyslogTcpSourceConfig, SyslogTcpSourceError,
    SyslogTcpSourceMetrics,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

use crate::bridge::{self, BridgeMetrics, BridgeStats, StreamBridge};
use crate::context::{CollectorState, IsolationConfig, LaunchContext};
use crate::decoder::MessageDecoder;
use crate::error::{CollectorError, Result};
use crate::port::PortAllocator;
use crate::task_dir::{log_base_name, log_dir};

/// Lifecycle phase of a collector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorPhase {
    /// Constructed, not launched
    Idle,
    /// Launch in progress
    Launching,
    /// Listener bound, sink and bridge running
    Running,
    /// Shut down; terminal
    Exited,
}

/// Point-in-time view of the pipeline counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectorMetrics {
    pub listener: SyslogTcpMetricsSnapshot,
    pub bridge: BridgeStats,
    pub sink: RotatorMetricsSnapshot,
}

/// Counters shared with the running tasks; kept after exit for final values
struct MetricsHandles {
    listener: Arc<SyslogTcpSourceMetrics>,
    bridge: Arc<BridgeMetrics>,
    sink: Arc<RotatorMetrics>,
}

/// Resources owned while running
struct Pipeline {
    addr: SocketAddr,
    task_dir: PathBuf,
    stop: CancellationToken,
    abort: CancellationToken,
    limits: RotationLimitsHandle,
    listener_task: JoinHandle<std::result::Result<(), SyslogTcpSourceError>>,
    bridge_task: JoinHandle<io::Result<BridgeStats>>,
    sink_task: JoinHandle<std::result::Result<RotatorMetricsSnapshot, RotatorError>>,
}

/// Per-task syslog collector
pub struct SyslogCollector {
    span: Span,
    config: CollectorConfig,
    phase: CollectorPhase,
    pipeline: Option<Pipeline>,
    metrics: Option<MetricsHandles>,
}

impl SyslogCollector {
    /// Collector logging into `span`, with default tunables
    pub fn new(span: Span) -> Self {
        Self {
            span,
            config: CollectorConfig::default(),
            phase: CollectorPhase::Idle,
            pipeline: None,
            metrics: None,
        }
    }

    /// Collector with explicit tunables
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if a size is zero or the bind host is empty.
    pub fn with_config(span: Span, config: CollectorConfig) -> Result<Self> {
        config.validate()?;
        let mut collector = Self::new(span);
        collector.config = config;
        Ok(collector)
    }

    pub fn phase(&self) -> CollectorPhase {
        self.phase
    }

    /// Bound listener address while running
    pub fn addr(&self) -> Option<SocketAddr> {
        self.pipeline.as_ref().map(|p| p.addr)
    }

    /// Resolved task directory while running
    pub fn task_dir(&self) -> Option<&Path> {
        self.pipeline.as_ref().map(|p| p.task_dir.as_path())
    }

    /// Pipeline counters; zero before the first launch
    pub fn metrics(&self) -> CollectorMetrics {
        match &self.metrics {
            Some(handles) => CollectorMetrics {
                listener: handles.listener.snapshot(),
                bridge: handles.bridge.snapshot(),
                sink: handles.sink.snapshot(),
            },
            None => CollectorMetrics::default(),
        }
    }

    /// Start collecting a task's output
    ///
    /// Returns the address the task should send syslog traffic to. On error
    /// the collector is back in `Idle` and holds no resources.
    pub async fn launch(&mut self, ctx: &LaunchContext) -> Result<CollectorState> {
        if self.phase != CollectorPhase::Idle {
            return Err(CollectorError::AlreadyLaunched);
        }
        self.phase = CollectorPhase::Launching;
        self.span.record("task", ctx.task_name.as_str());

        let span = self.span.clone();
        let result = self.start(ctx).instrument(span).await;

        let _enter = self.span.enter();
        match result {
            Ok((pipeline, metrics)) => {
                let addr = pipeline.addr;
                tracing::info!(
                    task = %ctx.task_name,
                    address = %addr,
                    task_dir = %pipeline.task_dir.display(),
                    "syslog collector running"
                );
                self.pipeline = Some(pipeline);
                self.metrics = Some(metrics);
                self.phase = CollectorPhase::Running;
                Ok(CollectorState {
                    addr: addr.to_string(),
                    isolation: IsolationConfig::default(),
                })
            }
            Err(e) => {
                tracing::warn!(task = %ctx.task_name, error = %e, "syslog collector launch failed");
                self.phase = CollectorPhase::Idle;
                Err(e)
            }
        }
    }

    async fn start(&self, ctx: &LaunchContext) -> Result<(Pipeline, MetricsHandles)> {
        let limits = rotation_limits(&ctx.policy)?;

        let task_dir = ctx.resolver.task_dir(&ctx.task_name).ok_or_else(|| {
            CollectorError::DirectoryNotFound {
                task: ctx.task_name.clone(),
            }
        })?;

        let addr = PortAllocator::new(self.config.bind_host.as_str())
            .allocate(ctx.port_lower_bound, ctx.port_upper_bound)?;

        let rotator_config = FileRotatorConfig {
            dir: log_dir(&task_dir),
            base_name: log_base_name(&ctx.task_name),
            buffer_size: self.config.write_buffer_size,
            flush_interval: self.config.flush_interval,
        };
        let log_path = rotator_config.dir.clone();
        let rotator =
            FileRotator::new(rotator_config, limits).map_err(|e| sink_init_error(log_path, e))?;

        let (record_tx, record_rx) = mpsc::channel(self.config.record_queue_size);
        let source_config = SyslogTcpSourceConfig {
            id: format!("syslog_{}", ctx.task_name),
            address: addr,
            buffer_size: self.config.read_buffer_size,
            max_message_size: self.config.max_message_size,
            ..Default::default()
        };
        let source = SyslogTcpSource::bind(source_config, record_tx)
            .await
            .map_err(|e| listener_bind_error(addr, e))?;
        let addr = source.local_addr();

        // No awaits past this point: the pipeline starts as a whole
        let (pipe_writer, pipe_reader) = bridge::pipe(self.config.pipe_buffer_size);
        let bridge = StreamBridge::new(record_rx, MessageDecoder::new(), pipe_writer);
        let metrics = MetricsHandles {
            listener: Arc::clone(source.metrics()),
            bridge: Arc::clone(bridge.metrics()),
            sink: Arc::clone(rotator.metrics()),
        };
        let limits = rotator.limits_handle();

        let sink_task = tokio::spawn(rotator.run(pipe_reader).instrument(self.span.clone()));
        let bridge_task = tokio::spawn(bridge.pump().instrument(self.span.clone()));

        let stop = CancellationToken::new();
        let abort = CancellationToken::new();
        let listener_task = tokio::spawn(
            source
                .run(stop.clone(), abort.clone())
                .instrument(self.span.clone()),
        );

        let pipeline = Pipeline {
            addr,
            task_dir,
            stop,
            abort,
            limits,
            listener_task,
            bridge_task,
            sink_task,
        };
        Ok((pipeline, metrics))
    }

    /// Stop collecting and release the port and the log file
    ///
    /// The port is released right away. Output the task already sent is read
    /// to the end of each connection and flushed to disk before this returns.
    /// A no-op unless running.
    ///
    /// # Errors
    ///
    /// Returns `ShutdownTimeout` if a task had to be aborted; the collector
    /// is `Exited` either way.
    pub async fn exit(&mut self) -> Result<()> {
        let Some(pipeline) = self.pipeline.take() else {
            if self.phase == CollectorPhase::Launching {
                self.phase = CollectorPhase::Exited;
            }
            return Ok(());
        };
        self.phase = CollectorPhase::Exited;

        let span = self.span.clone();
        shutdown(pipeline, self.config.shutdown_timeout)
            .instrument(span)
            .await
    }

    /// Apply a new rotation policy to the running sink
    ///
    /// The size limit applies from the next write and the file count from
    /// the next rotation. The listener keeps running.
    pub fn update_log_config(&self, policy: RotationPolicy) -> Result<()> {
        let Some(pipeline) = &self.pipeline else {
            return Err(CollectorError::NotRunning);
        };

        let limits = rotation_limits(&policy)?;
        let _enter = self.span.enter();
        pipeline.limits.set(limits).map_err(rotator_config_error)
    }
}

impl Default for SyslogCollector {
    fn default() -> Self {
        Self::new(tracing::info_span!(
            "syslog_collector",
            task = tracing::field::Empty
        ))
    }
}

impl Drop for SyslogCollector {
    fn drop(&mut self) {
        // Releases the port and closes connections; the sink still drains on its own
        if let Some(pipeline) = &self.pipeline {
            pipeline.stop.cancel();
            pipeline.abort.cancel();
        }
    }
}

async fn shutdown(pipeline: Pipeline, timeout: Duration) -> Result<()> {
    let addr = pipeline.addr;
    tracing::info!(address = %addr, "stopping syslog collector");
    pipeline.stop.cancel();

    let mut first_error = None;

    let mut listener_task = pipeline.listener_task;
    let drained = match tokio::time::timeout(timeout, &mut listener_task).await {
        Ok(Ok(output)) => Ok(Some(output)),
        Ok(Err(e)) => {
            tracing::error!(task = "syslog listener", error = %e, "collector task did not complete");
            Ok(None)
        }
        Err(_) => {
            tracing::warn!(?timeout, "syslog connections still open, closing them");
            pipeline.abort.cancel();
            first_error = Some(CollectorError::ShutdownTimeout {
                task: "syslog listener",
                timeout,
            });
            stop_task("syslog listener", listener_task, timeout).await
        }
    };
    match drained {
        Ok(Some(Err(e))) => tracing::error!(error = %e, "syslog listener failed"),
        Ok(_) => {}
        Err(e) => first_error = first_error.or(Some(e)),
    }

    match stop_task("log bridge", pipeline.bridge_task, timeout).await {
        Ok(Some(Err(e))) => tracing::error!(error = %e, "log bridge failed"),
        Ok(_) => {}
        Err(e) => first_error = first_error.or(Some(e)),
    }

    match stop_task("log sink", pipeline.sink_task, timeout).await {
        Ok(Some(Ok(stats))) => tracing::debug!(
            bytes_written = stats.bytes_written,
            files_rotated = stats.files_rotated,
            "log sink closed"
        ),
        Ok(Some(Err(e))) => tracing::error!(error = %e, "log sink failed"),
        Ok(None) => {}
        Err(e) => first_error = first_error.or(Some(e)),
    }

    match first_error {
        Some(e) => Err(e),
        None => {
            tracing::info!(address = %addr, "syslog collector stopped");
            Ok(())
        }
    }
}

/// Await `handle` for at most `timeout`, aborting it if it overruns
///
/// `Ok(None)` means the task panicked or was cancelled.
async fn stop_task<T>(
    task: &'static str,
    mut handle: JoinHandle<T>,
    timeout: Duration,
) -> Result<Option<T>> {
    match tokio::time::timeout(timeout, &mut handle).await {
        Ok(Ok(output)) => Ok(Some(output)),
        Ok(Err(e)) => {
            tracing::error!(task, error = %e, "collector task did not complete");
            Ok(None)
        }
        Err(_) => {
            handle.abort();
            let _ = handle.await;
            tracing::warn!(task, ?timeout, "collector task aborted after shutdown timeout");
            Err(CollectorError::ShutdownTimeout { task, timeout })
        }
    }
}

/// Limits for the sink, with the size converted to bytes
fn rotation_limits(policy: &RotationPolicy) -> Result<RotationLimits> {
    policy.validate()?;
    let max_file_bytes = policy.max_file_size_bytes()?;
    let max_files = usize::try_from(policy.max_files).map_err(|_| {
        ConfigError::invalid_value("rotation", "max_files", "does not fit in usize")
    })?;
    Ok(RotationLimits::new(max_files, max_file_bytes))
}

fn sink_init_error(dir: PathBuf, err: RotatorError) -> CollectorError {
    match err {
        RotatorError::Init { path, source } => CollectorError::SinkInitFailed { path, source },
        RotatorError::Io(source) => CollectorError::SinkInitFailed { path: dir, source },
        invalid @ RotatorError::InvalidLimits(_) => rotator_config_error(invalid),
    }
}

fn rotator_config_error(err: RotatorError) -> CollectorError {
    CollectorError::InvalidConfig(ConfigError::invalid_value(
        "rotation",
        "limits",
        err.to_string(),
    ))
}

fn listener_bind_error(addr: SocketAddr, err: SyslogTcpSourceError) -> CollectorError {
    match err {
        SyslogTcpSourceError::Bind { address, source } => {
            CollectorError::ListenerBindFailed { address, source }
        }
        SyslogTcpSourceError::Io(source) => CollectorError::ListenerBindFailed {
            address: addr.to_string(),
            source,
        },
        other => CollectorError::ListenerBindFailed {
            address: addr.to_string(),
            source: io::Error::other(other),
        },
    }
}

#[cfg(test)]
#[path = "collector_test.rs"]
mod collector_test;
