use chrono::Local;
use clap::Parser;
use profile_scrap::config::{Cli, Config};
use profile_scrap::fetch::ProfileFetcher;
use profile_scrap::input::read_references;
use profile_scrap::output::XlsxSink;
use profile_scrap::process::{process_profiles, TokioPacer};
use profile_scrap::request::InstagramApi;
use profile_scrap::{info_time, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let start_time = Local::now();
    let config = Config::from_cli(Cli::parse())?;

    info_time!(
        "Reading profile URLs from {} from row {} to {}",
        config.input.display(),
        config.start_row,
        config.end_row
    );
    let references = read_references(
        &config.input,
        &config.column,
        config.start_row,
        config.end_row,
    );

    let fetcher = ProfileFetcher::new(InstagramApi::new(&config.api_base)?, config.credentials);
    let mut sink = XlsxSink::new(&config.output);
    process_profiles(&references, &fetcher, &mut sink, &TokioPacer, &config.options).await;

    info_time!(start_time, "Data saved to {}", sink.path().display());

    Ok(())
}
