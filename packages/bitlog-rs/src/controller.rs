// Logger controller - drives one logging session
//
// The controller manages:
// - Transport lifecycle (connect, reader task, disconnect)
// - Feeding chunks into the logger state in arrival order
// - Sink updates after every change
// - User commands from a LoggerHandle
// - Event emission to the host
// - Task cancellation via CancellationToken
//
// Everything except the transport reader and blocking file writes runs on the
// task that calls `run`, one event at a time.

use crate::command::{LoggerCommand, StartOutcome, KEEP_AWAKE_HINT};
use crate::config::LoggerConfig;
use crate::error::{LoggerError, Result};
use crate::export::{export_filename, ExportFormat};
use crate::logger::{ConnectionState, Logger};
use crate::schema::{CommandOutcome, SchemaCommand};
use crate::sinks::{KeepAwake, NoKeepAwake, NullSink, TableSink, VisualizationSink};
use crate::transport::{
    create_transport, DeviceFilter, DeviceHandle, Transport, TransportConfig, TransportEvent,
};
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Capacity of the channel between the transport reader and the loop.
const TRANSPORT_CHANNEL_CAPACITY: usize = 100;

/// Events emitted by the controller
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum LoggerEvent {
    StateChanged { state: ConnectionState },
    SensorsDiscovered { keys: Vec<String> },
    RecordsAppended { count: usize, total: usize },
    Error { message: String },
}

pub struct LoggerController {
    logger: Logger,
    filter: DeviceFilter,
    transport: Arc<Mutex<Box<dyn Transport>>>,

    visualization: Box<dyn VisualizationSink>,
    table: Box<dyn TableSink>,
    keep_awake: Box<dyn KeepAwake>,
    keep_awake_held: bool,

    cancel_token: CancellationToken,
    reader_token: Option<CancellationToken>,
    transport_rx: Option<mpsc::Receiver<TransportEvent>>,

    event_callback: Option<Box<dyn Fn(LoggerEvent) + Send + Sync>>,
}

impl LoggerController {
    /// Create a controller for the configured transport
    pub fn new(config: LoggerConfig, transport_config: TransportConfig) -> Result<Self> {
        config.validate()?;
        let transport = create_transport(transport_config)?;
        Ok(Self::with_transport(config, transport))
    }

    pub fn with_transport(config: LoggerConfig, transport: Box<dyn Transport>) -> Self {
        Self {
            logger: Logger::new(config),
            filter: DeviceFilter::default(),
            transport: Arc::new(Mutex::new(transport)),
            visualization: Box::new(NullSink),
            table: Box::new(NullSink),
            keep_awake: Box::new(NoKeepAwake),
            keep_awake_held: false,
            cancel_token: CancellationToken::new(),
            reader_token: None,
            transport_rx: None,
            event_callback: None,
        }
    }

    pub fn with_sinks(
        mut self,
        visualization: Box<dyn VisualizationSink>,
        table: Box<dyn TableSink>,
    ) -> Self {
        self.visualization = visualization;
        self.table = table;
        self
    }

    /// Device name prefix and UART channel used when connecting.
    pub fn with_filter(mut self, filter: DeviceFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_keep_awake(mut self, keep_awake: Box<dyn KeepAwake>) -> Self {
        self.keep_awake = keep_awake;
        self
    }

    /// Set event callback function
    pub fn set_event_callback<F>(&mut self, callback: F)
    where
        F: Fn(LoggerEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(Box::new(callback));
    }

    fn emit_event(&self, event: LoggerEvent) {
        if let Some(callback) = self.event_callback.as_ref() {
            callback(event);
        }
    }

    fn emit_state(&self) {
        self.emit_event(LoggerEvent::StateChanged {
            state: self.logger.state().clone(),
        });
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn state(&self) -> &ConnectionState {
        self.logger.state()
    }

    /// Get the cancellation token for external cancellation support
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Connect the transport and start its reader task.
    ///
    /// On failure the state stays `Disconnected`; there is no retry.
    pub async fn connect(&mut self) -> Result<DeviceHandle> {
        if let Some(device) = self.logger.state().device() {
            return Ok(device.clone());
        }

        let result = {
            let mut transport = self.transport.lock().await;
            transport.connect(&self.filter).await
        };

        let device = match result {
            Ok(device) => device,
            Err(e) => {
                log::error!("Connect failed: {}", e);
                self.emit_event(LoggerEvent::Error {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        self.logger.connected(device.clone());
        self.spawn_reader();
        self.emit_state();
        Ok(device)
    }

    fn spawn_reader(&mut self) {
        let (tx, rx) = mpsc::channel::<TransportEvent>(TRANSPORT_CHANNEL_CAPACITY);
        let reader_token = self.cancel_token.child_token();
        let cancelled = reader_token.clone();
        let transport = Arc::clone(&self.transport);

        tokio::spawn(async move {
            let mut transport = transport.lock().await;
            // Use select! to allow cancellation during transport.start()
            tokio::select! {
                result = transport.start(tx) => {
                    if let Err(e) = result {
                        log::error!("Transport streaming error: {}", e);
                    }
                }
                _ = cancelled.cancelled() => {
                    log::info!("Transport reader cancelled");
                }
            }
        });

        self.reader_token = Some(reader_token);
        self.transport_rx = Some(rx);
    }

    /// Begin appending records.
    ///
    /// When `keep_awake` is set and the host cannot provide it, logging still
    /// starts and the outcome carries a hint for the user.
    pub fn start_logging(&mut self, keep_awake: bool) -> Result<StartOutcome> {
        let was_logging = self.logger.is_logging();
        self.logger.start_logging()?;

        let mut outcome = StartOutcome::default();
        if keep_awake && !self.keep_awake_held {
            match self.keep_awake.acquire() {
                Ok(()) => self.keep_awake_held = true,
                Err(e) => {
                    log::warn!("Keep-awake unavailable: {}", e);
                    outcome.keep_awake_hint = Some(KEEP_AWAKE_HINT.to_string());
                }
            }
        }

        if !was_logging {
            self.emit_state();
        }
        Ok(outcome)
    }

    pub fn stop_logging(&mut self) {
        if self.logger.stop_logging() {
            self.release_keep_awake();
            self.emit_state();
        }
    }

    fn release_keep_awake(&mut self) {
        if self.keep_awake_held {
            self.keep_awake.release();
            self.keep_awake_held = false;
        }
    }

    /// Close the transport. Recorded data is kept.
    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(token) = self.reader_token.take() {
            token.cancel();
        }
        self.transport_rx = None;

        let result = {
            let mut transport = self.transport.lock().await;
            transport.disconnect().await
        };

        self.handle_disconnect(None);
        result
    }

    fn handle_disconnect(&mut self, reason: Option<String>) {
        self.reader_token = None;
        self.transport_rx = None;

        if !self.logger.is_connected() {
            return;
        }

        match &reason {
            Some(reason) => log::warn!("Device disconnected: {}", reason),
            None => log::info!("Device disconnected"),
        }

        if self.logger.disconnected() {
            self.release_keep_awake();
        }
        self.emit_state();
    }

    fn handle_chunk(&mut self, chunk: &[u8]) {
        let report = self.logger.ingest(chunk);

        if !report.discovered.is_empty() {
            self.table.rebuild_header(&self.logger.live_header());
            self.emit_event(LoggerEvent::SensorsDiscovered {
                keys: report.discovered.clone(),
            });
        }

        if report.appended > 0 {
            let records = self.logger.session().records();
            for record in &records[records.len() - report.appended..] {
                self.table.append_row(&self.logger.table_row(record));
            }
            self.emit_event(LoggerEvent::RecordsAppended {
                count: report.appended,
                total: records.len(),
            });
        }

        if !report.discovered.is_empty() || report.appended > 0 {
            self.refresh_visualization();
        }
    }

    fn refresh_visualization(&mut self) {
        self.visualization.update(&self.logger.project());
    }

    /// Rename a sensor or toggle its visibility.
    pub fn apply_schema(&mut self, command: SchemaCommand) -> Result<CommandOutcome> {
        let outcome = self.logger.apply(command)?;
        if outcome == CommandOutcome::Applied {
            self.table.rebuild_header(&self.logger.live_header());
            self.refresh_visualization();
        }
        Ok(outcome)
    }

    /// Drop all records; sensors and their settings stay.
    pub fn clear(&mut self) {
        self.logger.clear();
        self.table.clear();
        self.refresh_visualization();
    }

    /// Write the whole session into `dir` and return the file path.
    ///
    /// An empty session is rejected before any file is created.
    pub async fn export(&self, dir: &Path, format: ExportFormat) -> Result<PathBuf> {
        let table = self.logger.export_table()?;
        let config = self.logger.config();

        let exporter = format.create_exporter(&config.sheet_name);
        let path = dir.join(export_filename(
            &config.export_prefix,
            Utc::now(),
            exporter.default_extension(),
        ));

        log::info!(
            "Exporting {} records as {} to {}",
            table.rows.len(),
            exporter.format_name(),
            path.display()
        );

        let output = path.clone();
        tokio::task::spawn_blocking(move || exporter.write(&table, &output))
            .await
            .map_err(|e| LoggerError::Export(format!("Export task failed: {}", e)))??;

        Ok(path)
    }

    /// Serve transport events and commands until the command channel closes
    /// or the controller is cancelled.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<LoggerCommand>) {
        let cancel_token = self.cancel_token.clone();

        loop {
            tokio::select! {
                biased;

                _ = cancel_token.cancelled() => {
                    log::info!("Logger controller cancelled");
                    break;
                }

                event = next_transport_event(&mut self.transport_rx) => {
                    match event {
                        Some(TransportEvent::Chunk(bytes)) => self.handle_chunk(&bytes),
                        Some(TransportEvent::Disconnected { reason }) => {
                            self.handle_disconnect(reason);
                        }
                        None => {
                            self.handle_disconnect(Some("transport channel closed".to_string()));
                        }
                    }
                }

                command = commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => {
                            log::debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn handle_command(&mut self, command: LoggerCommand) {
        match command {
            LoggerCommand::Connect { reply } => {
                reply.send(self.connect().await).ok();
            }
            LoggerCommand::StartLogging { keep_awake, reply } => {
                reply.send(self.start_logging(keep_awake)).ok();
            }
            LoggerCommand::StopLogging => self.stop_logging(),
            LoggerCommand::Clear => self.clear(),
            LoggerCommand::Schema { command, reply } => {
                reply.send(self.apply_schema(command)).ok();
            }
            LoggerCommand::Export { dir, format, reply } => {
                let result = self.export(&dir, format).await;
                if let Err(e) = &result {
                    log::error!("Export failed: {}", e);
                }
                reply.send(result).ok();
            }
            LoggerCommand::Snapshot { reply } => {
                reply.send(self.logger.project()).ok();
            }
            LoggerCommand::Disconnect => {
                if let Err(e) = self.disconnect().await {
                    log::error!("Disconnect failed: {}", e);
                    self.emit_event(LoggerEvent::Error {
                        message: e.to_string(),
                    });
                }
            }
        }
    }
}

impl Drop for LoggerController {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn next_transport_event(
    rx: &mut Option<mpsc::Receiver<TransportEvent>>,
) -> Option<TransportEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
