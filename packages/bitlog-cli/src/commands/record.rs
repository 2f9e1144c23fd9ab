use crate::cli::RecordArgs;
use crate::exit_codes;
use crate::logger_params;
use crate::output::{JsonLines, TerminalTable};
use bitlog_rs::{
    ConnectionState, LoggerController, LoggerError, LoggerEvent, LoggerHandle, NullSink,
    TableSink, VisualizationSink,
};
use tokio::sync::mpsc;

pub async fn execute(args: RecordArgs) -> i32 {
    let config = match logger_params::load_config(args.config.as_deref()).and_then(|config| {
        logger_params::apply_overrides(config, args.window, &args.rename, &args.disable)
    }) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    let format = match logger_params::parse_format(&args.format) {
        Ok(format) => format,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    let transport_config = match logger_params::build_transport_config(
        &args.source,
        args.scan_timeout_ms,
        args.baud,
        args.chunk_size,
        args.rate_ms,
    ) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    if !args.no_export {
        if let Err(e) = std::fs::create_dir_all(&args.output_dir) {
            eprintln!(
                "Error: Cannot create output directory '{}': {}",
                args.output_dir.display(),
                e
            );
            return exit_codes::EXPORT_ERROR;
        }
    }

    let (visualization, table): (Box<dyn VisualizationSink>, Box<dyn TableSink>) =
        if args.json {
            (Box::new(JsonLines), Box::new(NullSink))
        } else if args.quiet {
            (Box::new(NullSink), Box::new(NullSink))
        } else {
            (Box::new(NullSink), Box::new(TerminalTable))
        };

    let filter = logger_params::build_device_filter(&args.source);
    let mut controller = match LoggerController::new(config, transport_config) {
        Ok(controller) => controller.with_sinks(visualization, table).with_filter(filter),
        Err(e @ (LoggerError::Connection(_) | LoggerError::Unsupported(_))) => {
            eprintln!("Error: {}", e);
            return exit_codes::CONNECTION_ERROR;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    let (events_tx, mut events) = mpsc::unbounded_channel();
    controller.set_event_callback(move |event| {
        events_tx.send(event).ok();
    });

    let device = match controller.connect().await {
        Ok(device) => device,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::CONNECTION_ERROR;
        }
    };

    match controller.start_logging(args.keep_awake) {
        Ok(outcome) => {
            if let Some(hint) = outcome.keep_awake_hint {
                eprintln!("Hint: {}", hint);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::CONNECTION_ERROR;
        }
    }

    if !args.quiet {
        eprintln!("Logging from {} ({}). Press Ctrl-C to stop.", device.name, device.address);
    }

    let (handle, commands) = LoggerHandle::channel(16);
    let task = tokio::spawn(async move {
        controller.run(commands).await;
        controller
    });

    wait_for_end(&handle, &mut events, args.quiet || args.json).await;

    let exit_code = if args.no_export {
        exit_codes::SUCCESS
    } else {
        match handle.export(&args.output_dir, format).await {
            Ok(path) => {
                if !args.quiet {
                    eprintln!("Session exported to {}", path.display());
                }
                exit_codes::SUCCESS
            }
            Err(LoggerError::EmptySession) => {
                eprintln!("No data to export");
                exit_codes::NO_DATA
            }
            Err(e) => {
                eprintln!("Export failed: {}", e);
                exit_codes::EXPORT_ERROR
            }
        }
    };

    drop(handle);
    match task.await {
        Ok(controller) => {
            if !args.quiet {
                eprintln!(
                    "Recorded {} records from {} sensors",
                    controller.logger().session().len(),
                    controller.logger().registry().len()
                );
            }
            exit_code
        }
        Err(e) => {
            eprintln!("Error: logger task failed: {}", e);
            exit_codes::EXECUTION_ERROR
        }
    }
}

/// Wait until the device disconnects or the user presses Ctrl-C.
async fn wait_for_end(
    handle: &LoggerHandle,
    events: &mut mpsc::UnboundedReceiver<LoggerEvent>,
    quiet: bool,
) {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(LoggerEvent::StateChanged { state: ConnectionState::Disconnected }) | None => {
                    if !quiet {
                        eprintln!("Device disconnected");
                    }
                    break;
                }
                Some(LoggerEvent::SensorsDiscovered { keys }) => {
                    log::info!("New sensors: {}", keys.join(", "));
                }
                Some(LoggerEvent::Error { message }) => {
                    eprintln!("Error: {}", message);
                }
                Some(_) => {}
            },
            _ = tokio::signal::ctrl_c() => {
                if !quiet {
                    eprintln!("Stopping...");
                }
                if let Err(e) = handle.disconnect().await {
                    log::warn!("Disconnect request failed: {}", e);
                }
                break;
            }
        }
    }
}
