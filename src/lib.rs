//! Profile scraper: reads profile URLs from a spreadsheet, looks each one up
//! at a paced rate and appends the results to another spreadsheet.

mod error;
mod macros;

pub mod config;
pub mod fetch;
pub mod handle;
pub mod input;
pub mod model;
pub mod output;
pub mod process;
pub mod request;

pub use error::{Error, Result};

pub const DEFAULT_INPUT: &str = "profile_urls.xlsx";
pub const DEFAULT_OUTPUT: &str = "instagram_profiles.xlsx";
pub const DEFAULT_COLUMN: &str = "ProfileURL";
pub const DEFAULT_API_BASE: &str = "https://i.instagram.com";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
