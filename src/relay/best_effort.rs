//! Ancillary transport operations whose failure must not affect the result
//!
//! Editing the "sent" notice, reacting to the original, deleting an obsolete
//! button: each runs independently, failures are logged and returned for
//! diagnostics, never propagated.

use std::future::Future;

use futures_util::future::{join_all, BoxFuture};

use super::ports::TransportResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestEffortFailure {
    pub label: &'static str,
    pub error: String,
}

#[derive(Default)]
pub struct BestEffort<'a> {
    ops: Vec<(&'static str, BoxFuture<'a, TransportResult<()>>)>,
}

impl<'a> BestEffort<'a> {
    pub fn new() -> Self {
        Self { ops: Vec::new() }
    }

    pub fn push<F>(&mut self, label: &'static str, op: F)
    where
        F: Future<Output = TransportResult<()>> + Send + 'a,
    {
        self.ops.push((label, Box::pin(op)));
    }

    /// Runs every operation concurrently and waits for all of them.
    pub async fn run(self) -> Vec<BestEffortFailure> {
        let (labels, futures): (Vec<_>, Vec<_>) = self.ops.into_iter().unzip();
        let results = join_all(futures).await;

        labels
            .into_iter()
            .zip(results)
            .filter_map(|(label, result)| match result {
                Ok(()) => None,
                Err(e) => {
                    log::warn!("Best-effort step '{}' failed: {}", label, e);
                    Some(BestEffortFailure {
                        label,
                        error: e.to_string(),
                    })
                }
            })
            .collect()
    }
}
