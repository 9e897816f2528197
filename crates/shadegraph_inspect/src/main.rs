// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shading graph inspector.
//!
//! Loads a RON document, validates it and reports its tree, the upstream
//! dataflow of every graph output, definition inheritance chains and,
//! optionally, a DOT rendering of each node graph.
//!
//! Exit status is 0 for a valid document, 1 when validation finds problems
//! and 2 when the arguments, config or document cannot be read.

mod config;
mod error;
mod report;

use clap::Parser;
use config::{Args, InspectConfig, ReportFormat};
use error::Result;
use report::Report;
use shadegraph_core::Document;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn run(args: Args) -> Result<bool> {
    let cwd = std::env::current_dir()?;
    let mut config = InspectConfig::discover(args.config.as_deref(), &cwd)?;
    args.apply(&mut config);

    tracing::debug!("Loading document {}", args.document.display());
    let source = std::fs::read_to_string(&args.document)?;
    let doc = Document::from_ron(&source)?;
    tracing::info!("Loaded {} elements from {}", doc.element_count(), args.document.display());

    let report = Report::build(&doc, &config)?;
    let rendered = match config.format {
        ReportFormat::Text => report.to_text(),
        ReportFormat::Json => report.to_json()?,
    };
    println!("{rendered}");
    Ok(report.valid)
}

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("shadegraph_inspect=info,shadegraph_core=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // Help and version requests print to stdout and are not failures
            let _ = err.print();
            std::process::exit(if err.use_stderr() { 2 } else { 0 });
        }
    };

    let code = match run(args) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            tracing::error!("Inspection failed: {e}");
            2
        }
    };
    std::process::exit(code);
}
