//! Cooperative cancellation
//!
//! A token is a watch channel flag plus an optional parent. Cancelling a token
//! cancels every child derived from it; cancelling a child leaves the parent
//! untouched.

use crate::error::{MapError, MapResult};
use futures::future::{self, BoxFuture, FutureExt};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug)]
struct TokenState {
    cancelled: watch::Sender<bool>,
    parent: Option<CancellationToken>,
}

/// Shared cancellation signal
#[derive(Debug, Clone)]
pub struct CancellationToken {
    state: Arc<TokenState>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::with_parent(None)
    }

    fn with_parent(parent: Option<CancellationToken>) -> Self {
        let (cancelled, _) = watch::channel(false);
        Self {
            state: Arc::new(TokenState { cancelled, parent }),
        }
    }

    /// Token that is cancelled together with `self`, and can be cancelled alone
    pub fn child(&self) -> Self {
        Self::with_parent(Some(self.clone()))
    }

    pub fn cancel(&self) {
        self.state.cancelled.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.cancelled.borrow()
            || self
                .state
                .parent
                .as_ref()
                .is_some_and(CancellationToken::is_cancelled)
    }

    /// `Err(Cancelled)` once cancellation has been requested
    pub fn check(&self) -> MapResult<()> {
        if self.is_cancelled() {
            Err(MapError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves once this token or any ancestor is cancelled
    pub fn cancelled(&self) -> BoxFuture<'static, ()> {
        let token = self.clone();
        async move {
            let mut receiver = token.state.cancelled.subscribe();
            let own = async move {
                loop {
                    if *receiver.borrow_and_update() {
                        return;
                    }
                    // The sender lives as long as the token this future holds
                    if receiver.changed().await.is_err() {
                        future::pending::<()>().await;
                    }
                }
            };

            match &token.state.parent {
                Some(parent) => {
                    tokio::select! {
                        _ = own => {}
                        _ = parent.cancelled() => {}
                    }
                }
                None => own.await,
            }
        }
        .boxed()
    }
}
