use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error};
use wasmhost::host::{HostValue, WasmModule};
use wasmhost::logger::init_logging;
use wasmhost::reflect::{list_exports, list_imports, ExportDescriptor, ImportDescriptor};

#[derive(Debug, Parser)]
#[clap(version, about = "List the imports and exports of a WebAssembly module.")]
struct Cli {
    /// Path to a `.wasm` binary
    file: PathBuf,

    /// Only list imports
    #[arg(long)]
    imports: bool,

    /// Only list exports
    #[arg(long)]
    exports: bool,

    /// Print descriptors as JSON
    #[arg(long)]
    json: bool,

    /// Debug logging unless WASMHOST_LOG or RUST_LOG is set
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Default, Serialize)]
struct Report {
    #[serde(skip_serializing_if = "Option::is_none")]
    imports: Option<Vec<ImportDescriptor>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exports: Option<Vec<ExportDescriptor>>,
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = std::fs::read(&cli.file)?;
    debug!(path = %cli.file.display(), bytes = bytes.len(), "read module");
    let name = cli.file.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let args = [HostValue::Module(WasmModule::with_name(&name, &bytes)?)];

    let both = !cli.imports && !cli.exports;
    let mut report = Report::default();
    if cli.imports || both {
        report.imports = Some(list_imports(&args)?);
    }
    if cli.exports || both {
        report.exports = Some(list_exports(&args)?);
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    for import in report.imports.iter().flatten() {
        println!("import {:<8} {}.{}", import.kind, import.module, import.name);
    }
    for export in report.exports.iter().flatten() {
        println!("export {:<8} {}", export.kind, export.name);
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}: {}", cli.file.display(), e);
            ExitCode::FAILURE
        }
    }
}
