use anyhow::Result;
use clap::Parser;
use rustydump::{dispatch_command, Cli, CommandOutput, OutputFormat};
use rustydump_logging::{fs::read_config, LoggingConfig, LoggingGuards};
use serde_json::{json, Value};

fn main() {
    let cli = Cli::parse();
    let format = if cli.json {
        OutputFormat::Json
    } else {
        cli.output_format
    };

    let guards = match init_logging(&cli) {
        Ok(guards) => Some(guards),
        Err(err) => {
            eprintln!("Logging disabled: {:#}", err);
            None
        }
    };

    let code = match run(cli, format) {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!(error = %format!("{:#}", err), "command_failed");
            emit_error(format, &err);
            1
        }
    };
    drop(guards);
    std::process::exit(code);
}

fn init_logging(cli: &Cli) -> Result<LoggingGuards> {
    let cfg = cli
        .root
        .as_deref()
        .map(read_config)
        .unwrap_or_else(LoggingConfig::default)
        .with_level(cli.log_level.as_deref());
    match cli.root.as_deref() {
        Some(root) => rustydump_logging::init("rustydump", root, &cfg),
        None => rustydump_logging::init_console(&cfg),
    }
}

fn run(cli: Cli, format: OutputFormat) -> Result<()> {
    let output = dispatch_command(cli.root.as_deref(), cli.command)?;
    emit_success(format, output)
}

fn emit_success(format: OutputFormat, output: CommandOutput) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let payload = json!({
                "status": "ok",
                "message": output.message,
                "data": output.data,
            });
            println!("{}", payload);
        }
        OutputFormat::Text => {
            if let Some(table) = &output.table {
                print!("{table}");
                println!();
            } else if !output.data.is_null() {
                println!("{}", serde_json::to_string_pretty(&output.data)?);
            }
            println!("{}", output.message);
        }
    }
    Ok(())
}

fn emit_error(format: OutputFormat, err: &anyhow::Error) {
    let details: Vec<String> = err.chain().map(|cause| cause.to_string()).collect();
    match format {
        OutputFormat::Json => {
            let payload = json!({
                "status": "error",
                "message": err.to_string(),
                "details": details,
                "data": Value::Null,
            });
            println!("{}", payload);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", err);
            for detail in details.iter().skip(1) {
                eprintln!("  -> {}", detail);
            }
        }
    }
}
