//! Parallel batch refinement.
//!
//! Rows are independent, so each one runs on the blocking pool behind a
//! semaphore sized to the worker count. Results are written back by input
//! index, never in completion order.

use std::sync::Arc;
use std::time::Instant;

use anchorfit_core::{Decision, RefinementRequest, RefinementResult};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::controller::Controller;

/// Summary of a finished batch run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub rows: usize,
    pub improved: usize,
    pub unchanged: usize,
    pub rolled_back: usize,
    pub elapsed_secs: f64,
}

impl BatchSummary {
    fn tally(results: &[RefinementResult], elapsed_secs: f64) -> Self {
        let mut summary = Self {
            rows: results.len(),
            elapsed_secs,
            ..Self::default()
        };
        for r in results {
            match r.decision {
                Decision::Improved => summary.improved += 1,
                Decision::Unchanged => summary.unchanged += 1,
                Decision::RolledBack => summary.rolled_back += 1,
            }
        }
        summary
    }
}

/// Refine every request with at most `workers` rows in flight.
///
/// `on_done` is called once per finished row, in input order, with the
/// number of rows finished so far. A row whose worker panics is recorded as
/// a rollback with zero attempts.
pub async fn run_batch<F>(
    controller: Arc<Controller>,
    requests: Vec<RefinementRequest>,
    workers: usize,
    mut on_done: F,
) -> (Vec<RefinementResult>, BatchSummary)
where
    F: FnMut(usize, &RefinementResult),
{
    let start = Instant::now();
    let total = requests.len();
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    info!(rows = total, workers = workers.max(1), "batch refinement starting");

    let mut handles = Vec::with_capacity(total);
    for request in requests {
        let controller = Arc::clone(&controller);
        let semaphore = Arc::clone(&semaphore);
        let fallback = request.clone();
        let handle = tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            tokio::task::spawn_blocking(move || controller.refine(&request)).await
        });
        handles.push((fallback, handle));
    }

    let mut results = Vec::with_capacity(total);
    for (index, (request, handle)) in handles.into_iter().enumerate() {
        let result = match handle.await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) | Err(e) => {
                warn!(row = index, error = %e, "refinement worker failed, rolling back row");
                RefinementResult::rolled_back(&request, 0)
            }
        };
        on_done(index + 1, &result);
        results.push(result);
    }

    let summary = BatchSummary::tally(&results, start.elapsed().as_secs_f64());
    info!(
        rows = summary.rows,
        improved = summary.improved,
        unchanged = summary.unchanged,
        rolled_back = summary.rolled_back,
        elapsed_secs = summary.elapsed_secs,
        "batch refinement finished"
    );
    (results, summary)
}
