//! Directory harvester CLI.
//!
//! Runs one paged search and writes newline-delimited JSON to stdout.

use std::io::{BufWriter, Write};

use clap::Parser;
use helios_directory::{
    HarvestConfig, Harvester, HttpPageFetcher, ResultSet, init_logging, role_rows,
};
use tracing::{info, warn};

/// Writes one line per match entry: a report row for practitioner roles,
/// the entry with its FHIR payload otherwise.
fn write_rows(
    out: &mut impl Write,
    result_set: &ResultSet,
    config: &HarvestConfig,
) -> anyhow::Result<()> {
    if config.resource_type == "PractitionerRole" {
        for row in role_rows(result_set, &config.identifier_system) {
            serde_json::to_writer(&mut *out, &row)?;
            writeln!(out)?;
        }
    } else {
        for entry in result_set.matches() {
            serde_json::to_writer(&mut *out, entry)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = HarvestConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    let request = config.search_request();
    let settings = config.harvest_settings();

    info!(
        base_url = %config.base_url,
        resource_type = %request.resource_type,
        page_delay_ms = config.page_delay_ms,
        duplicate_keys = %settings.duplicate_keys,
        "Starting directory harvest"
    );

    let fetcher = HttpPageFetcher::new(&config.base_url, config.request_timeout())?;
    let harvester = Harvester::new(fetcher, settings);
    let harvest = harvester.run(&request).await?;

    for broken in &harvest.diagnostics {
        warn!(
            source = %broken.source,
            relation = %broken.relation,
            target = %broken.target(),
            "Broken reference"
        );
    }

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    write_rows(&mut out, &harvest.result_set, &config)?;
    out.flush()?;

    info!(
        pages = harvest.pages_fetched,
        matches = harvest.result_set.match_count(),
        includes = harvest.result_set.include_count(),
        broken_references = harvest.diagnostics.len(),
        "Directory harvest finished"
    );

    Ok(())
}
