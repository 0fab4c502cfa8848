//! Begin/complete dispatch of request cycles onto application
//! instances.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::application::{ApplicationFactory, PipelineEvents, StartupGate, fire_application_start};
use crate::context::RequestContext;
use crate::error::DispatchError;
use crate::handle::AsyncOperationHandle;

/// Dispatch was refused before any work was queued.
///
/// Carries the context back so the caller can still answer the cycle.
#[derive(Debug)]
pub struct BeginError {
    /// The context whose dispatch failed.
    pub context: RequestContext,
    /// What went wrong.
    pub source: DispatchError,
}

impl fmt::Display for BeginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dispatch refused: {}", self.source)
    }
}

impl std::error::Error for BeginError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Dispatches request cycles to fresh application instances.
///
/// Each cycle gets its own instance from the factory. The startup hook
/// of the first instance runs before that instance processes anything;
/// the gate guarantees the hook never runs twice per dispatcher.
pub struct HandlerDispatcher {
    factory: Arc<dyn ApplicationFactory>,
    startup: StartupGate,
}

impl HandlerDispatcher {
    /// Build a dispatcher over `factory` with an armed startup gate.
    pub fn new(factory: Arc<dyn ApplicationFactory>) -> Self {
        Self {
            factory,
            startup: StartupGate::new(),
        }
    }

    /// Whether the startup hook has not yet run.
    pub fn startup_pending(&self) -> bool {
        self.startup.is_armed()
    }

    /// Begin processing `context` on a fresh application instance.
    ///
    /// Returns a completion handle whose callback fires exactly once
    /// when the work unit finishes, successfully or not. If setup fails
    /// before any work is queued, the context comes back in the error
    /// and the callback never fires. Must be called from within a Tokio
    /// runtime.
    pub fn begin(
        &self,
        mut context: RequestContext,
        callback: impl FnOnce(AsyncOperationHandle) + Send + 'static,
    ) -> Result<AsyncOperationHandle, BeginError> {
        let handle = AsyncOperationHandle::new(callback);
        handle.mark_begin_started();

        let mut app = match self.factory.create() {
            Ok(app) => app,
            Err(e) => {
                handle.mark_begin_completed();
                warn!(error = %e, "application factory refused to build an instance");
                return Err(BeginError {
                    context,
                    source: DispatchError::Setup(format!("{e:#}")),
                });
            }
        };

        if self.startup.try_claim() {
            fire_application_start(app.as_ref());
        }

        let mut events = PipelineEvents::new();
        app.init(&mut events);

        let task_handle = handle.clone();
        tokio::spawn(async move {
            events.fire_begin_request(&context);
            let outcome = app.process(&mut context).await;
            events.fire_end_request(&context);

            let error = match outcome {
                Ok(()) => None,
                Err(e) => {
                    warn!(method = %context.request().method(), error = %e, "handler failed");
                    Some(DispatchError::Handler(format!("{e:#}")))
                }
            };
            task_handle.complete(false, Some(context), error);
        });

        handle.mark_begin_completed();
        Ok(handle)
    }
}

impl fmt::Debug for HandlerDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDispatcher")
            .field("startup", &self.startup)
            .finish_non_exhaustive()
    }
}
