use crate::cli::SchemaArgs;
use crate::exit_codes;
use crate::logger_params;
use crate::output;
use bitlog_rs::{Logger, SensorDescriptor};
use serde::Serialize;

#[derive(Serialize)]
struct SchemaOutput<'a> {
    file: String,
    lines: usize,
    sensors: Vec<&'a SensorDescriptor>,
}

pub fn execute(args: SchemaArgs) -> i32 {
    let config = match logger_params::load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    let bytes = match std::fs::read(&args.file) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error: Failed to read '{}': {}", args.file.display(), e);
            return exit_codes::INPUT_ERROR;
        }
    };

    // Sensors are discovered without logging, so nothing is recorded.
    let mut logger = Logger::new(config);
    let mut lines = logger.ingest(&bytes).lines;
    if !bytes.is_empty() && !bytes.ends_with(b"\n") {
        // Trailing line without a terminator.
        lines += logger.ingest(b"\n").lines;
    }

    let output = SchemaOutput {
        file: args.file.display().to_string(),
        lines,
        sensors: logger.registry().iter().collect(),
    };

    if args.json {
        match output::to_json(&output, false) {
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
    } else if output.sensors.is_empty() {
        println!("No sensors found in {}", output.file);
    } else {
        println!("Sensors in {}:\n", output.file);
        println!("  {:<12} {:<8} {:<24} {:<8}", "Key", "Category", "Label", "Enabled");
        println!("  {}", "-".repeat(56));
        for sensor in &output.sensors {
            println!(
                "  {:<12} {:<8} {:<24} {:<8}",
                sensor.key(),
                sensor.category().as_str(),
                sensor.label(),
                if sensor.is_enabled() { "yes" } else { "no" }
            );
        }
    }

    if output.sensors.is_empty() {
        exit_codes::NO_DATA
    } else {
        exit_codes::SUCCESS
    }
}
