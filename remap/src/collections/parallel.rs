//! Bounded parallel element execution
//!
//! Jobs share one cancellation token derived from the caller's. The first
//! failure other than cancellation cancels it; results that arrive after that
//! are discarded. Output order always follows job order.

use crate::cancellation::CancellationToken;
use crate::context::MappingContext;
use crate::error::{MapError, MapResult};
use crate::options::{Cancellation, MappingOptions, ParallelOptions};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use tracing::debug;

pub(crate) struct Bounded {
    limit: usize,
    caller: Option<CancellationToken>,
    shared: CancellationToken,
}

impl Bounded {
    pub(crate) fn new(ctx: &MappingContext) -> Self {
        let limit = ctx
            .options()
            .get::<ParallelOptions>()
            .map_or(1, |parallel| parallel.max_parallelism)
            .max(1);
        let caller = ctx.cancellation().cloned();
        let shared = caller
            .as_ref()
            .map_or_else(CancellationToken::new, CancellationToken::child);
        Self {
            limit,
            caller,
            shared,
        }
    }

    /// Options for the jobs, carrying the shared token
    pub(crate) fn options(&self, options: MappingOptions) -> MappingOptions {
        options.with(Cancellation(self.shared.clone()))
    }

    pub(crate) async fn run<T: Send + 'static>(
        self,
        jobs: Vec<BoxFuture<'static, MapResult<T>>>,
    ) -> MapResult<Vec<T>> {
        let total = jobs.len();
        let mut results: Vec<Option<T>> = Vec::with_capacity(total);
        results.resize_with(total, || None);
        let mut failure: Option<MapError> = None;

        // Boxed up front so the stream type holds no closures
        let guarded: Vec<BoxFuture<'static, (usize, MapResult<T>)>> = jobs
            .into_iter()
            .enumerate()
            .map(|(index, job)| {
                let token = self.shared.clone();
                async move {
                    if token.is_cancelled() {
                        return (index, Err(MapError::Cancelled));
                    }
                    let result = tokio::select! {
                        biased;
                        _ = token.cancelled() => Err(MapError::Cancelled),
                        result = job => result,
                    };
                    (index, result)
                }
                .boxed()
            })
            .collect();
        let mut pending = stream::iter(guarded).buffer_unordered(self.limit);

        while let Some((index, result)) = pending.next().await {
            match result {
                Ok(value) if failure.is_none() => results[index] = Some(value),
                Ok(_) => {}
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    if failure.is_none() {
                        debug!(index, error = %e, "element failed, cancelling in-flight elements");
                        self.shared.cancel();
                        failure = Some(e);
                    }
                }
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }
        if self.caller.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(MapError::Cancelled);
        }
        results
            .into_iter()
            .collect::<Option<Vec<T>>>()
            .ok_or(MapError::Cancelled)
    }
}
