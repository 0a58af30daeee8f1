//! Interceptor registry
//!
//! A [`Registry`] keeps one ordered sequence of entries per phase. There is
//! exactly one process-wide registry for [`Scope::Global`] (see
//! [`Registry::global`]); every client owns a private [`Scope::Instance`]
//! registry created empty with the client.
//!
//! Each sequence is published through an [`ArcSwap`]: registration and
//! ejection swap in a new vector, readers take a snapshot that later writes
//! never touch. Writers of one sequence are serialised, so an entry's
//! position always agrees with its registration order.

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use tracing::debug;

use super::{RequestHandler, RequestInterceptor, ResponseHandler, ResponseInterceptor};
use crate::error::{Error, Phase, Result};

/// Message of the error returned when a registered handler is not an interceptor.
pub const NOT_CALLABLE: &str = "Interceptor must be function!";

/// Registration order shared by every registry in the process.
static NEXT_ORDER: AtomicU64 = AtomicU64::new(1);

static GLOBAL_REGISTRY: LazyLock<Registry> = LazyLock::new(|| Registry::new(Scope::Global));

/// Which registry an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The process-wide registry shared by all clients.
    Global,
    /// A single client's private registry.
    Instance,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Instance => f.write_str("instance"),
        }
    }
}

/// Identity of a registered entry, usable with [`Registry::eject`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterceptorId(u64);

impl InterceptorId {
    /// Raw id value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InterceptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Options accepted by interceptor registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UseOptions {
    /// Register in the process-wide registry (the default) instead of the
    /// client's own.
    pub global: bool,
}

impl Default for UseOptions {
    fn default() -> Self {
        Self { global: true }
    }
}

impl UseOptions {
    /// Register in the process-wide registry.
    pub fn global() -> Self {
        Self { global: true }
    }

    /// Register in the calling client's own registry.
    pub fn instance() -> Self {
        Self { global: false }
    }
}

/// One registered interceptor.
pub struct InterceptorEntry<H: ?Sized> {
    id: InterceptorId,
    phase: Phase,
    scope: Scope,
    order: u64,
    handler: Arc<H>,
}

impl<H: ?Sized> Clone for InterceptorEntry<H> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            phase: self.phase,
            scope: self.scope,
            order: self.order,
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<H: ?Sized> fmt::Debug for InterceptorEntry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorEntry")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .field("scope", &self.scope)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

impl<H: ?Sized> InterceptorEntry<H> {
    /// Identity for [`Registry::eject`].
    pub fn id(&self) -> InterceptorId {
        self.id
    }

    /// Phase this entry runs in.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Registry this entry was registered in.
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Process-wide registration sequence number.
    pub fn order(&self) -> u64 {
        self.order
    }

    /// The registered interceptor.
    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }
}

/// Snapshot of one phase's entries.
pub type Snapshot<H> = Arc<Vec<InterceptorEntry<H>>>;

struct Sequence<H: ?Sized> {
    phase: Phase,
    scope: Scope,
    entries: ArcSwap<Vec<InterceptorEntry<H>>>,
    // held across order assignment and publication
    writer: Mutex<()>,
}

impl<H: ?Sized> Sequence<H> {
    fn new(phase: Phase, scope: Scope) -> Self {
        Self {
            phase,
            scope,
            entries: ArcSwap::from_pointee(Vec::new()),
            writer: Mutex::new(()),
        }
    }

    fn push(&self, handler: Arc<H>) -> InterceptorId {
        let guard = self.writer.lock();
        let order = NEXT_ORDER.fetch_add(1, Ordering::Relaxed);
        let entry = InterceptorEntry {
            id: InterceptorId(order),
            phase: self.phase,
            scope: self.scope,
            order,
            handler,
        };
        let current = self.entries.load();
        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(entry.clone());
        self.entries.store(Arc::new(next));
        drop(guard);

        debug!(
            phase = %self.phase,
            scope = %self.scope,
            id = %entry.id,
            "Registered interceptor"
        );
        entry.id
    }

    fn remove(&self, id: InterceptorId) -> bool {
        let guard = self.writer.lock();
        let current = self.entries.load();
        let removed = current.iter().any(|e| e.id == id);
        if removed {
            let next: Vec<_> = current.iter().filter(|e| e.id != id).cloned().collect();
            self.entries.store(Arc::new(next));
        }
        drop(current);
        drop(guard);

        if removed {
            debug!(phase = %self.phase, scope = %self.scope, id = %id, "Ejected interceptor");
        }
        removed
    }

    fn snapshot(&self) -> Snapshot<H> {
        self.entries.load_full()
    }

    fn clear(&self) {
        let _guard = self.writer.lock();
        self.entries.store(Arc::new(Vec::new()));
    }
}

/// Ordered interceptor entries for both phases, all tagged with one scope.
pub struct Registry {
    scope: Scope,
    request: Sequence<dyn RequestInterceptor>,
    response: Sequence<dyn ResponseInterceptor>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("scope", &self.scope)
            .field("request", &self.request.snapshot().len())
            .field("response", &self.response.snapshot().len())
            .finish()
    }
}

impl Registry {
    /// Create an empty registry whose entries carry `scope`.
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            request: Sequence::new(Phase::Request, scope),
            response: Sequence::new(Phase::Response, scope),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static Registry {
        &GLOBAL_REGISTRY
    }

    /// Scope carried by every entry of this registry.
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Append a request interceptor.
    pub fn use_request(&self, handler: RequestHandler) -> InterceptorId {
        self.request.push(handler)
    }

    /// Append a response interceptor.
    pub fn use_response(&self, handler: ResponseHandler) -> InterceptorId {
        self.response.push(handler)
    }

    /// Append a type-erased request handler.
    ///
    /// `handler` must hold a [`RequestHandler`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] ("Interceptor must be function!")
    /// when it holds anything else; nothing is registered in that case.
    pub fn use_request_dyn(&self, handler: Arc<dyn Any + Send + Sync>) -> Result<InterceptorId> {
        let handler = handler
            .downcast::<RequestHandler>()
            .map_err(|_| Error::configuration(NOT_CALLABLE))?;
        Ok(self.use_request((*handler).clone()))
    }

    /// Append a type-erased response handler.
    ///
    /// `handler` must hold a [`ResponseHandler`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] ("Interceptor must be function!")
    /// when it holds anything else; nothing is registered in that case.
    pub fn use_response_dyn(&self, handler: Arc<dyn Any + Send + Sync>) -> Result<InterceptorId> {
        let handler = handler
            .downcast::<ResponseHandler>()
            .map_err(|_| Error::configuration(NOT_CALLABLE))?;
        Ok(self.use_response((*handler).clone()))
    }

    /// Remove the entry with `id` from either phase.
    pub fn eject(&self, id: InterceptorId) -> bool {
        self.request.remove(id) || self.response.remove(id)
    }

    /// Current request-phase entries in registration order.
    pub fn request_entries(&self) -> Snapshot<dyn RequestInterceptor> {
        self.request.snapshot()
    }

    /// Current response-phase entries in registration order.
    pub fn response_entries(&self) -> Snapshot<dyn ResponseInterceptor> {
        self.response.snapshot()
    }

    /// Number of entries registered for `phase`.
    pub fn len(&self, phase: Phase) -> usize {
        match phase {
            Phase::Request => self.request.snapshot().len(),
            Phase::Response => self.response.snapshot().len(),
        }
    }

    /// True when neither phase has entries.
    pub fn is_empty(&self) -> bool {
        self.len(Phase::Request) == 0 && self.len(Phase::Response) == 0
    }

    /// Drop every entry of both phases.
    pub fn clear(&self) {
        debug!(scope = %self.scope, "Clearing interceptor registry");
        self.request.clear();
        self.response.clear();
    }
}
