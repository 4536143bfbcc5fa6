use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;

use crate::fetch::FetchProfile;
use crate::model::{FetchFailure, Outcome};
use crate::output::OutcomeSink;
use crate::{error_time, info_time, warn_time};

/// How the fetch loop is paced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub users_per_group: usize,
    pub request_interval: Duration,
    pub group_pause: Duration,
}

/// What to do with a reference whose every attempt raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExhaustedPolicy {
    /// Leave it out of the output, only the run summary lists it.
    #[default]
    Drop,
    /// Record a failure row for it.
    Record,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub pacing: Pacing,
    pub max_attempts: u32,
    pub exhausted: ExhaustedPolicy,
}

/// Blocks the loop between requests and groups.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, duration: Duration);
}

pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// References that raised on every attempt and got no row.
    pub dropped: Vec<String>,
    pub flushes: usize,
}

/// Fetches every reference in order, flushing to `sink` after each full group
/// and once more for the remainder.
///
/// A reference is attempted up to `max_attempts` times, but only raised errors are retried.
/// A returned [`Outcome::Failure`] is final. Every attempt that raises is followed
/// by a `request_interval` pause. Whenever the processed counter sits on a positive
/// multiple of `users_per_group` the loop flushes what it has and waits `group_pause`,
/// otherwise it waits `request_interval` before the next reference.
/// The final flush is never followed by a pause.
pub async fn process_profiles<F, S, P>(
    references: &[String],
    fetcher: &F,
    sink: &mut S,
    pacer: &P,
    options: &RunOptions,
) -> RunSummary
where
    F: FetchProfile + ?Sized,
    S: OutcomeSink + ?Sized,
    P: Pacer + ?Sized,
{
    let start_time = Local::now();
    let pacing = options.pacing;
    let group_size = pacing.users_per_group.max(1);
    let mut summary = RunSummary::default();
    let mut batch: Vec<Outcome> = Vec::with_capacity(group_size);

    info_time!("Started scraping {} profiles", references.len());

    for reference in references {
        let outcome = fetch_with_retry(reference, fetcher, pacer, options).await;

        match outcome {
            Some(outcome) => {
                if outcome.is_failure() {
                    summary.failed += 1;
                } else {
                    summary.succeeded += 1;
                }
                batch.push(outcome);
                summary.processed += 1;
            }
            None => summary.dropped.push(reference.clone()),
        }

        // A drop leaves the counter where it was, so it can land on a group boundary again.
        if summary.processed > 0 && summary.processed % group_size == 0 {
            info_time!(
                "Scraped {} users. Pausing for {} seconds...",
                summary.processed,
                pacing.group_pause.as_secs()
            );
            if !batch.is_empty() {
                sink.flush(&batch);
                summary.flushes += 1;
                batch.clear();
            }
            pacer.pause(pacing.group_pause).await;
        } else {
            info_time!(
                "Waiting for {} seconds before next request...",
                pacing.request_interval.as_secs()
            );
            pacer.pause(pacing.request_interval).await;
        }
    }

    if !batch.is_empty() {
        sink.flush(&batch);
        summary.flushes += 1;
    }

    if !summary.dropped.is_empty() {
        warn_time!(
            "{} profiles failed every attempt and were not saved: {:?}",
            summary.dropped.len(),
            summary.dropped
        );
    }
    info_time!(
        start_time,
        "Finished: {} processed ({} ok, {} failed), {} dropped, {} flushes",
        summary.processed,
        summary.succeeded,
        summary.failed,
        summary.dropped.len(),
        summary.flushes
    );

    summary
}

/// `None` when every attempt raised and the policy says to drop the reference.
async fn fetch_with_retry<F, P>(
    reference: &str,
    fetcher: &F,
    pacer: &P,
    options: &RunOptions,
) -> Option<Outcome>
where
    F: FetchProfile + ?Sized,
    P: Pacer + ?Sized,
{
    let attempts = options.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match fetcher.fetch_profile(reference).await {
            Ok(outcome) => return Some(outcome),
            Err(e) => {
                error_time!("Attempt {attempt} failed for {reference}: {e}");
                last_error = Some(e);
                pacer.pause(options.pacing.request_interval).await;
            }
        }
    }

    match options.exhausted {
        ExhaustedPolicy::Drop => None,
        ExhaustedPolicy::Record => {
            let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
            Some(Outcome::Failure(FetchFailure::new(
                reference,
                format!("All {attempts} attempts failed: {reason}"),
            )))
        }
    }
}
