//! Application lifecycle: the handler trait, its factory, pipeline
//! events, and the once-per-process startup gate.

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, warn};

use crate::context::RequestContext;

/// Boxed future returned by [`Application::process`].
pub type ProcessFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// Observer for one pipeline event.
pub type RequestObserver = Box<dyn Fn(&RequestContext) + Send>;

/// A managed application: one instance handles one request cycle.
///
/// Implementations write their response through the context's worker.
/// Returning an error fails the cycle and the transport falls back to
/// its canned error response.
pub trait Application: Send {
    /// Startup hook, run at most once per dispatcher before the first
    /// request is processed. Failures are logged and contained.
    fn application_start(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Wire up pipeline event observers for this cycle.
    fn init(&mut self, _events: &mut PipelineEvents) {}

    /// Handle one request cycle.
    fn process<'a>(&'a mut self, ctx: &'a mut RequestContext) -> ProcessFuture<'a>;
}

/// Produces a fresh [`Application`] for every request cycle.
pub trait ApplicationFactory: Send + Sync {
    /// Build the application instance for one cycle.
    fn create(&self) -> anyhow::Result<Box<dyn Application>>;
}

/// Ordered begin/end observers for one request cycle.
///
/// Observers fire in registration order, before and after the
/// application's process call.
#[derive(Default)]
pub struct PipelineEvents {
    begin: Vec<RequestObserver>,
    end: Vec<RequestObserver>,
}

impl PipelineEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer fired before the application runs.
    pub fn on_begin_request(&mut self, observer: impl Fn(&RequestContext) + Send + 'static) {
        self.begin.push(Box::new(observer));
    }

    /// Register an observer fired after the application runs.
    pub fn on_end_request(&mut self, observer: impl Fn(&RequestContext) + Send + 'static) {
        self.end.push(Box::new(observer));
    }

    /// Fire the begin-request observers in registration order.
    pub fn fire_begin_request(&self, ctx: &RequestContext) {
        for observer in &self.begin {
            observer(ctx);
        }
    }

    /// Fire the end-request observers in registration order.
    pub fn fire_end_request(&self, ctx: &RequestContext) {
        for observer in &self.end {
            observer(ctx);
        }
    }
}

impl fmt::Debug for PipelineEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineEvents")
            .field("begin_observers", &self.begin.len())
            .field("end_observers", &self.end.len())
            .finish()
    }
}

/// Single-use gate in front of the application startup hook.
///
/// Starts armed; the first claim wins and every later claim is refused,
/// so the hook runs at most once no matter how many cycles race for it.
#[derive(Debug)]
pub struct StartupGate {
    armed: AtomicBool,
}

impl StartupGate {
    pub fn new() -> Self {
        Self {
            armed: AtomicBool::new(true),
        }
    }

    /// Claim the gate. Returns true exactly once.
    pub fn try_claim(&self) -> bool {
        self.armed
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Whether the gate is still armed.
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }
}

impl Default for StartupGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the startup hook, containing both errors and panics so a bad
/// hook cannot take the host down.
pub(crate) fn fire_application_start(app: &dyn Application) {
    match panic::catch_unwind(AssertUnwindSafe(|| app.application_start())) {
        Ok(Ok(())) => debug!("application start hook ran"),
        Ok(Err(e)) => warn!(error = %e, "application start hook failed"),
        Err(_) => error!("application start hook panicked"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::{Application, PipelineEvents, ProcessFuture, StartupGate, fire_application_start};
    use crate::context::RequestContext;
    use crate::worker::testing::MockWorkerRequest;

    struct HookApp {
        runs: Arc<AtomicUsize>,
        fail: bool,
        panic: bool,
    }

    impl Application for HookApp {
        fn application_start(&self) -> anyhow::Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.panic {
                panic!("startup hook exploded");
            }
            if self.fail {
                anyhow::bail!("startup hook refused");
            }
            Ok(())
        }

        fn process<'a>(&'a mut self, _ctx: &'a mut RequestContext) -> ProcessFuture<'a> {
            Box::pin(async { Ok(()) })
        }
    }

    fn context() -> RequestContext {
        RequestContext::new(Box::new(MockWorkerRequest::new(
            "GET",
            b"GET / HTTP/1.1\r\n\r\n",
        )))
    }

    #[test]
    fn gate_grants_exactly_one_claim() {
        let gate = StartupGate::new();
        assert!(gate.is_armed());
        assert!(gate.try_claim());
        assert!(!gate.try_claim());
        assert!(!gate.is_armed());
    }

    #[test]
    fn observers_fire_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut events = PipelineEvents::new();

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            events.on_begin_request(move |_| order.lock().unwrap().push(tag));
        }
        let tail = Arc::clone(&order);
        events.on_end_request(move |_| tail.lock().unwrap().push("end"));

        let ctx = context();
        events.fire_begin_request(&ctx);
        events.fire_end_request(&ctx);

        assert_eq!(
            *order.lock().unwrap(),
            vec!["first", "second", "third", "end"]
        );
    }

    #[test]
    fn startup_hook_error_is_contained() {
        let runs = Arc::new(AtomicUsize::new(0));
        let app = HookApp {
            runs: Arc::clone(&runs),
            fail: true,
            panic: false,
        };

        fire_application_start(&app);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn startup_hook_panic_is_contained() {
        let runs = Arc::new(AtomicUsize::new(0));
        let app = HookApp {
            runs: Arc::clone(&runs),
            fail: false,
            panic: true,
        };

        fire_application_start(&app);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn default_hook_and_init_are_no_ops() {
        struct Bare;

        impl Application for Bare {
            fn process<'a>(&'a mut self, _ctx: &'a mut RequestContext) -> ProcessFuture<'a> {
                Box::pin(async { Ok(()) })
            }
        }

        let mut app = Bare;
        assert!(app.application_start().is_ok());
        let mut events = PipelineEvents::new();
        app.init(&mut events);
        events.fire_begin_request(&context());
    }
}
