use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::process::{ExhaustedPolicy, Pacing, RunOptions};
use crate::request::Credentials;
use crate::{
    Error, Result, DEFAULT_API_BASE, DEFAULT_COLUMN, DEFAULT_INPUT, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_OUTPUT,
};

#[derive(Parser, Debug)]
#[command(
    name = "profile-scrap",
    about = "Scrapes public profile metadata for the URLs in a spreadsheet."
)]
pub struct Cli {
    /// Spreadsheet with the profile URLs
    #[arg(long, default_value = DEFAULT_INPUT)]
    pub input: PathBuf,

    /// Spreadsheet the results get appended to
    #[arg(long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Header of the column holding the profile URLs
    #[arg(long, default_value = DEFAULT_COLUMN)]
    pub column: String,

    /// Session cookie of a logged in account
    #[arg(long, env = "INSTAGRAM_SESSION_ID", hide_env_values = true)]
    pub session_id: String,

    /// Data rows to read, `start-end` (1-based, inclusive). Prompted for if missing.
    #[arg(long)]
    pub rows: Option<String>,

    /// `users_per_group,request_interval_secs,group_pause_secs`. Prompted for if missing.
    #[arg(long)]
    pub pacing: Option<String>,

    /// Base url of the provider's API
    #[arg(long, default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Attempts per profile before giving up on it
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,

    /// Write a failure row for profiles whose every attempt errored instead of skipping them
    #[arg(long)]
    pub record_exhausted: bool,
}

/// Everything a run needs, validated.
#[derive(Debug)]
pub struct Config {
    pub input: PathBuf,
    pub output: PathBuf,
    pub column: String,
    pub credentials: Credentials,
    pub api_base: String,
    pub start_row: usize,
    pub end_row: usize,
    pub options: RunOptions,
}

impl Config {
    /// Builds the config from flags, asking on `stdin` for whatever wasn't passed.
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let stdin = io::stdin();
        let mut stdin = stdin.lock();
        let mut stdout = io::stdout();
        Self::resolve(cli, &mut stdin, &mut stdout)
    }

    pub fn resolve(cli: Cli, input: &mut impl BufRead, out: &mut impl Write) -> Result<Self> {
        let credentials = Credentials::new(cli.session_id)?;
        if cli.max_attempts == 0 {
            return Err(Error::InvalidAttempts(cli.max_attempts));
        }

        let rows = match cli.rows {
            Some(rows) => rows,
            None => prompt(input, out, "Enter row range to read (start-end): ")?,
        };
        let (start_row, end_row) = parse_row_range(&rows)?;

        let pacing = match cli.pacing {
            Some(pacing) => pacing,
            None => prompt(
                input,
                out,
                "Enter number of users per group, interval between requests (seconds), \
                 and pause time after each group (seconds) (users,interval,pause_time): ",
            )?,
        };
        let pacing = parse_pacing(&pacing)?;

        let exhausted = if cli.record_exhausted {
            ExhaustedPolicy::Record
        } else {
            ExhaustedPolicy::Drop
        };

        Ok(Self {
            input: cli.input,
            output: cli.output,
            column: cli.column,
            credentials,
            api_base: cli.api_base,
            start_row,
            end_row,
            options: RunOptions {
                pacing,
                max_attempts: cli.max_attempts,
                exhausted,
            },
        })
    }
}

fn prompt(input: &mut impl BufRead, out: &mut impl Write, question: &str) -> Result<String> {
    write!(out, "{question}")?;
    out.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Parses `"start-end"`, 1-based and inclusive.
pub fn parse_row_range(s: &str) -> Result<(usize, usize)> {
    let invalid = || Error::InvalidRowRange(s.to_string());
    let (start, end) = s.split_once('-').ok_or_else(invalid)?;
    let start: usize = start.trim().parse().map_err(|_| invalid())?;
    let end: usize = end.trim().parse().map_err(|_| invalid())?;
    if start == 0 || start > end {
        return Err(invalid());
    }
    Ok((start, end))
}

/// Parses `"users_per_group,request_interval,group_pause"`, the last two in whole seconds.
pub fn parse_pacing(s: &str) -> Result<Pacing> {
    let invalid = || Error::InvalidPacing(s.to_string());
    let parts: Vec<u64> = s
        .split(',')
        .map(|p| p.trim().parse::<u64>())
        .collect::<core::result::Result<_, _>>()
        .map_err(|_| invalid())?;

    let [users, interval, pause] = parts[..] else {
        return Err(invalid());
    };
    if users == 0 {
        return Err(invalid());
    }

    Ok(Pacing {
        users_per_group: usize::try_from(users).map_err(|_| invalid())?,
        request_interval: Duration::from_secs(interval),
        group_pause: Duration::from_secs(pause),
    })
}
