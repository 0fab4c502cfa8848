//! One-shot completion token for dispatched request work.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use tracing::warn;

use crate::context::RequestContext;
use crate::error::DispatchError;

/// Callback invoked exactly once when the dispatched work completes.
pub type CompletionCallback = Box<dyn FnOnce(AsyncOperationHandle) + Send>;

struct HandleInner {
    callback: Mutex<Option<CompletionCallback>>,
    state: Mutex<Option<RequestContext>>,
    error: Mutex<Option<DispatchError>>,
    completed: AtomicBool,
    completed_synchronously: AtomicBool,
    begin_thread: Mutex<Option<ThreadId>>,
}

/// Completion token handed back from
/// [`HandlerDispatcher::begin`](crate::dispatcher::HandlerDispatcher::begin).
///
/// Cheap to clone; every clone observes the same completion. The first
/// call to [`complete`](AsyncOperationHandle::complete) wins: it
/// deposits the finished context and any error, then fires the
/// registered callback. Later calls are logged and ignored.
#[derive(Clone)]
pub struct AsyncOperationHandle {
    inner: Arc<HandleInner>,
}

impl AsyncOperationHandle {
    /// Create a handle that will fire `callback` on completion.
    pub fn new(callback: impl FnOnce(AsyncOperationHandle) + Send + 'static) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                callback: Mutex::new(Some(Box::new(callback))),
                state: Mutex::new(None),
                error: Mutex::new(None),
                completed: AtomicBool::new(false),
                completed_synchronously: AtomicBool::new(false),
                begin_thread: Mutex::new(None),
            }),
        }
    }

    /// Record the thread driving the begin call. A completion observed
    /// on this thread before
    /// [`mark_begin_completed`](AsyncOperationHandle::mark_begin_completed)
    /// counts as synchronous.
    pub(crate) fn mark_begin_started(&self) {
        *self.inner.begin_thread.lock().expect("begin thread lock") =
            Some(thread::current().id());
    }

    /// Clear the begin-thread marker once the begin call returns.
    pub(crate) fn mark_begin_completed(&self) {
        *self.inner.begin_thread.lock().expect("begin thread lock") = None;
    }

    /// Mark the operation complete, deposit its outcome, and fire the
    /// callback.
    ///
    /// Only the first call has any effect. `synchronous` is forced to
    /// true when the completion happens on the thread that is still
    /// inside the begin call.
    pub fn complete(
        &self,
        synchronous: bool,
        state: Option<RequestContext>,
        error: Option<DispatchError>,
    ) {
        if self.inner.completed.swap(true, Ordering::SeqCst) {
            warn!("completion handle signalled more than once, ignoring");
            return;
        }

        let synchronous = synchronous
            || *self.inner.begin_thread.lock().expect("begin thread lock")
                == Some(thread::current().id());
        self.inner
            .completed_synchronously
            .store(synchronous, Ordering::SeqCst);

        *self.inner.state.lock().expect("state lock") = state;
        *self.inner.error.lock().expect("error lock") = error;

        let callback = self.inner.callback.lock().expect("callback lock").take();
        if let Some(callback) = callback {
            callback(self.clone());
        }
    }

    /// Whether the operation has completed.
    pub fn is_completed(&self) -> bool {
        self.inner.completed.load(Ordering::SeqCst)
    }

    /// Whether completion happened inside the begin call.
    pub fn completed_synchronously(&self) -> bool {
        self.inner.completed_synchronously.load(Ordering::SeqCst)
    }

    /// Error deposited at completion, if any.
    pub fn error(&self) -> Option<DispatchError> {
        self.inner.error.lock().expect("error lock").clone()
    }

    /// Take the finished context out of the handle. Yields at most one
    /// context across all clones.
    pub fn take_state(&self) -> Option<RequestContext> {
        self.inner.state.lock().expect("state lock").take()
    }
}

impl fmt::Debug for AsyncOperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncOperationHandle")
            .field("completed", &self.is_completed())
            .field("completed_synchronously", &self.completed_synchronously())
            .finish()
    }
}
