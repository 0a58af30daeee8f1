//! Onion composer
//!
//! Turns an ordered list of interceptor entries into one chain that folds
//! the running value through every layer, one at a time:
//!
//! - a layer returning [`Intercepted::Unchanged`] keeps the running value
//! - a layer returning [`Intercepted::Replace`] swaps it for the new one
//! - a layer returning an error stops the chain; that error is the outcome
//!
//! Layers are never run concurrently because each one consumes its
//! predecessor's output.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::registry::InterceptorEntry;
use super::{InterceptResult, Intercepted, RequestInterceptor, ResponseInterceptor};
use crate::error::{Error, Phase, Result};
use crate::options::RequestState;
use crate::response::ResponseState;

/// One layer of the onion as seen by the composer.
#[async_trait]
pub trait Layer: Send + Sync {
    /// Value threaded through the chain.
    type Value: Send + Sync;

    /// Run this layer over the current value.
    async fn wrap(&self, current: &mut Self::Value) -> InterceptResult<Self::Value>;

    /// Name used in logs.
    fn layer_name(&self) -> &str;
}

#[async_trait]
impl<'a> Layer for dyn RequestInterceptor + 'a {
    type Value = RequestState;

    async fn wrap(&self, current: &mut RequestState) -> InterceptResult<RequestState> {
        self.intercept(&current.url, &current.options).await
    }

    fn layer_name(&self) -> &str {
        self.name()
    }
}

#[async_trait]
impl<'a> Layer for dyn ResponseInterceptor + 'a {
    type Value = ResponseState;

    async fn wrap(&self, current: &mut ResponseState) -> InterceptResult<ResponseState> {
        let ResponseState { response, options } = current;
        let outcome = match self.intercept(response, options).await? {
            Intercepted::Unchanged => Intercepted::Unchanged,
            Intercepted::Replace(response) => Intercepted::Replace(ResponseState {
                response,
                options: options.clone(),
            }),
        };
        Ok(outcome)
    }

    fn layer_name(&self) -> &str {
        self.name()
    }
}

/// A composed chain for one phase.
pub struct Onion<L: ?Sized> {
    phase: Phase,
    layers: Vec<InterceptorEntry<L>>,
}

impl<L: ?Sized> Clone for Onion<L> {
    fn clone(&self) -> Self {
        Self {
            phase: self.phase,
            layers: self.layers.clone(),
        }
    }
}

impl<L: ?Sized> std::fmt::Debug for Onion<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Onion")
            .field("phase", &self.phase)
            .field("layers", &self.layers)
            .finish()
    }
}

impl<L: Layer + ?Sized> Onion<L> {
    /// Compose `layers`, which must already be in execution order.
    pub fn new(phase: Phase, layers: Vec<InterceptorEntry<L>>) -> Self {
        Self { phase, layers }
    }

    /// Phase this chain runs in.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Entries in execution order.
    pub fn layers(&self) -> &[InterceptorEntry<L>] {
        &self.layers
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Fold `seed` through every layer.
    ///
    /// `cancel` is checked before each layer runs; a layer that has already
    /// started is allowed to finish.
    ///
    /// # Errors
    ///
    /// - [`Error::Chain`] with the first layer failure, unchanged
    /// - [`Error::Cancelled`] if `cancel` fires between layers
    pub async fn run(
        &self,
        seed: L::Value,
        cancel: Option<&CancellationToken>,
    ) -> Result<L::Value> {
        debug!(
            phase = %self.phase,
            layers = self.layers.len(),
            "Running interceptor chain"
        );

        let mut current = seed;
        for (index, entry) in self.layers.iter().enumerate() {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                debug!(phase = %self.phase, index, "Chain cancelled");
                return Err(Error::cancelled(format!(
                    "cancelled before {} interceptor {index}",
                    self.phase
                )));
            }

            let layer = entry.handler();
            trace!(
                phase = %self.phase,
                index,
                scope = %entry.scope(),
                interceptor = layer.layer_name(),
                "Calling interceptor"
            );

            match layer.wrap(&mut current).await {
                Ok(Intercepted::Unchanged) => {}
                Ok(Intercepted::Replace(next)) => current = next,
                Err(source) => {
                    warn!(
                        phase = %self.phase,
                        index,
                        scope = %entry.scope(),
                        interceptor = layer.layer_name(),
                        error = %source,
                        "Interceptor aborted the chain"
                    );
                    return Err(Error::chain(self.phase, index, source));
                }
            }
        }

        debug!(phase = %self.phase, "Interceptor chain completed");
        Ok(current)
    }
}
