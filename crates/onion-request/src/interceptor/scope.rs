//! Scope resolution
//!
//! Merges the process-wide registry with a client's own registry into the
//! chains one invocation runs. Resolution happens once per invocation, so
//! interceptors registered while a request is in flight only affect requests
//! started afterwards.

use tracing::trace;

use super::onion::Onion;
use super::registry::{InterceptorEntry, Registry};
use super::{RequestInterceptor, ResponseInterceptor};
use crate::error::Phase;

/// Both chains of one invocation.
#[derive(Debug, Clone)]
pub struct ResolvedChains {
    pub request: Onion<dyn RequestInterceptor>,
    pub response: Onion<dyn ResponseInterceptor>,
}

/// All `global` entries, then all `instance` entries, each in registration
/// order.
pub fn resolve(global: &Registry, instance: &Registry) -> ResolvedChains {
    let request = merge(&global.request_entries(), &instance.request_entries());
    let response = merge(&global.response_entries(), &instance.response_entries());

    trace!(
        request = request.len(),
        response = response.len(),
        "Resolved interceptor chains"
    );

    ResolvedChains {
        request: Onion::new(Phase::Request, request),
        response: Onion::new(Phase::Response, response),
    }
}

fn merge<H: ?Sized>(
    global: &[InterceptorEntry<H>],
    instance: &[InterceptorEntry<H>],
) -> Vec<InterceptorEntry<H>> {
    let mut merged = Vec::with_capacity(global.len() + instance.len());
    merged.extend(global.iter().cloned());
    merged.extend(instance.iter().cloned());
    merged
}
