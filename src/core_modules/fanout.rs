//! Runs independent detectors side by side over the same read-only page.
//!
//! Each job becomes a task in one `rayon::scope` and borrows the shared inputs; results are
//! joined in submission order so the output never depends on scheduling. A job that
//! returns an error or panics contributes an empty list and a warning.

use crate::error::{CloudError, Result};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

pub type DetectorJob<'a, T> = (&'static str, Box<dyn FnOnce() -> Result<Vec<T>> + Send + 'a>);

/// Boxes a detector closure under a name.
pub fn job<'a, T>(
    name: &'static str,
    run: impl FnOnce() -> Result<Vec<T>> + Send + 'a,
) -> DetectorJob<'a, T> {
    (name, Box::new(run))
}

pub fn run_isolated<'a, T: Send>(jobs: Vec<DetectorJob<'a, T>>) -> Vec<Vec<T>> {
    let names: Vec<&'static str> = jobs.iter().map(|(name, _)| *name).collect();
    let mut outcomes: Vec<Result<Vec<T>>> = jobs.iter().map(|_| Ok(Vec::new())).collect();

    rayon::scope(|scope| {
        for ((name, job), slot) in jobs.into_iter().zip(outcomes.iter_mut()) {
            scope.spawn(move |_| {
                *slot = panic::catch_unwind(AssertUnwindSafe(job))
                    .unwrap_or(Err(CloudError::DetectorPanicked { detector: name }));
            });
        }
    });

    names
        .into_iter()
        .zip(outcomes)
        .map(|(name, outcome)| match outcome {
            Ok(found) => {
                debug!(detector = name, count = found.len(), "detector finished");
                found
            }
            Err(err) => {
                warn!(detector = name, error = %err, "detector failed, treating as empty");
                Vec::new()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_keep_submission_order() {
        let jobs: Vec<DetectorJob<'_, u32>> = vec![
            job("a", || Ok(vec![1, 2])),
            job("b", || Ok(vec![3])),
        ];
        assert_eq!(run_isolated(jobs), vec![vec![1, 2], vec![3]]);
    }

    #[test]
    fn failing_and_panicking_jobs_degrade_to_empty() {
        let jobs: Vec<DetectorJob<'_, u32>> = vec![
            job("broken", || {
                Err(CloudError::DetectorFailed {
                    detector: "broken",
                    reason: "bad buffer".to_string(),
                })
            }),
            job("panics", || panic!("boom")),
            job("fine", || Ok(vec![7])),
        ];
        assert_eq!(run_isolated(jobs), vec![vec![], vec![], vec![7]]);
    }
}
