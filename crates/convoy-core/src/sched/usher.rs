//! Fan-out execution with deterministic result collection.

use std::future::Future;

use tokio::task::JoinSet;

use crate::domain::error::{ConvoyError, Result};

/// Launches a collection of concurrent units of work and gathers their
/// results in *registration* order, not completion order.
///
/// That ordering guarantee is what keeps bundle-wide aggregates (stats rows,
/// per-repo logs) deterministic even though repos complete in unpredictable
/// order. A failing unit does not cancel its in-flight siblings: `collect`
/// waits until every unit reaches a terminal state and only then propagates
/// the first error in registration order.
pub struct Usher<T> {
    join_set: JoinSet<(usize, Result<T>)>,
    registered: usize,
}

impl<T: Send + 'static> Usher<T> {
    pub fn new() -> Self {
        Usher {
            join_set: JoinSet::new(),
            registered: 0,
        }
    }

    /// Register one unit of work. The future starts running immediately.
    pub fn admit<F>(&mut self, work: F)
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let index = self.registered;
        self.registered += 1;
        self.join_set.spawn(async move { (index, work.await) });
    }

    /// Await every admitted unit and return their results in the order they
    /// were admitted.
    pub async fn collect(mut self) -> Result<Vec<T>> {
        let mut slots: Vec<Option<Result<T>>> = Vec::new();
        slots.resize_with(self.registered, || None);

        // Drain every task before reporting anything, so a failure cannot
        // abort in-flight siblings through the join set being dropped.
        let mut join_failure: Option<ConvoyError> = None;
        while let Some(joined) = self.join_set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => {
                    if join_failure.is_none() {
                        join_failure = Some(ConvoyError::Join(e));
                    }
                }
            }
        }
        if let Some(err) = join_failure {
            return Err(err);
        }

        let mut collected = Vec::with_capacity(slots.len());
        for (index, slot) in slots.into_iter().enumerate() {
            let result = slot.ok_or_else(|| {
                ConvoyError::FanOut(format!("missing result for unit of work #{index}"))
            })?;
            collected.push(result?);
        }
        Ok(collected)
    }

    /// Number of units admitted so far.
    pub fn len(&self) -> usize {
        self.registered
    }

    pub fn is_empty(&self) -> bool {
        self.registered == 0
    }
}

impl<T: Send + 'static> Default for Usher<T> {
    fn default() -> Self {
        Self::new()
    }
}
