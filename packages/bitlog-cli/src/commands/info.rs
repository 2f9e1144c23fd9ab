use crate::cli::InfoArgs;
use crate::exit_codes;
use crate::output;
use bitlog_rs::export::DEFAULT_SHEET_NAME;
use bitlog_rs::projector::{COLOR_PALETTE, DEFAULT_WINDOW_SIZE};
use bitlog_rs::transport::{
    BLE_AVAILABLE, DEFAULT_NAME_PREFIX, UART_SERVICE_UUID, UART_TX_CHARACTERISTIC_UUID,
};
use bitlog_rs::{ExportFormat, LoggerConfig};
use serde::Serialize;

#[derive(Serialize)]
struct InfoOutput {
    cli_version: String,
    device_name_prefix: &'static str,
    uart_service: String,
    uart_tx_characteristic: String,
    transports: Vec<&'static str>,
    export_formats: Vec<&'static str>,
    export_prefix: String,
    sheet_name: &'static str,
    window_size: usize,
    palette: Vec<&'static str>,
    platform: String,
    arch: String,
}

fn available_transports() -> Vec<&'static str> {
    let mut transports = Vec::new();
    if BLE_AVAILABLE {
        transports.push("ble");
    }
    if cfg!(target_family = "unix") {
        transports.push("serial");
    }
    transports.extend(["tcp", "file"]);
    transports
}

pub fn execute(args: InfoArgs) -> i32 {
    let info = InfoOutput {
        cli_version: env!("CARGO_PKG_VERSION").to_string(),
        device_name_prefix: DEFAULT_NAME_PREFIX,
        uart_service: UART_SERVICE_UUID.to_string(),
        uart_tx_characteristic: UART_TX_CHARACTERISTIC_UUID.to_string(),
        transports: available_transports(),
        export_formats: ExportFormat::supported_formats(),
        export_prefix: LoggerConfig::default().export_prefix,
        sheet_name: DEFAULT_SHEET_NAME,
        window_size: DEFAULT_WINDOW_SIZE,
        palette: COLOR_PALETTE.to_vec(),
        platform: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
    };

    if args.json {
        match output::to_json(&info, false) {
            Ok(json) => {
                if let Err(e) = output::write_output(&json) {
                    eprintln!("Error: {}", e);
                    return exit_codes::EXECUTION_ERROR;
                }
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                return exit_codes::EXECUTION_ERROR;
            }
        }
    } else {
        println!("bitlog CLI v{}", info.cli_version);
        println!("Platform: {} ({})", info.platform, info.arch);
        println!();
        println!("Device name prefix: {}", info.device_name_prefix);
        println!("UART service:       {}", info.uart_service);
        println!("UART TX (notify):   {}", info.uart_tx_characteristic);
        println!();
        println!("Transports: {}", info.transports.join(", "));
        println!("Export formats: {}", info.export_formats.join(", "));
        println!(
            "Export file: {}_<timestamp>.<ext> (sheet '{}')",
            info.export_prefix, info.sheet_name
        );
        println!("Live window: {} records", info.window_size);
    }

    exit_codes::SUCCESS
}
