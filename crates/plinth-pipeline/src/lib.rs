//! plinth-pipeline — the managed request pipeline for Plinth.
//!
//! Everything between the transport and the application lives here:
//! - **worker**: the [`WorkerRequest`] seam a transport implements to
//!   lend one request cycle to the pipeline
//! - **context**: per-cycle [`RequestContext`] with a request facade
//!   and a creation timestamp
//! - **handle**: one-shot [`AsyncOperationHandle`] completion token
//! - **application**: the [`Application`] trait, its factory, pipeline
//!   events, and the once-per-process startup gate
//! - **dispatcher**: [`HandlerDispatcher`], which begins a cycle on a
//!   fresh application instance and signals completion exactly once
//!
//! The pipeline never owns a socket. A transport captures raw bytes,
//! wraps them in a worker, and drives the dispatcher; the finished
//! context comes back through the completion handle with the response
//! accumulated inside the worker.

pub mod application;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod worker;

pub use application::{
    Application, ApplicationFactory, PipelineEvents, ProcessFuture, RequestObserver, StartupGate,
};
pub use context::{Request, RequestContext};
pub use dispatcher::{BeginError, HandlerDispatcher};
pub use error::{DispatchError, WorkerRequestError, WorkerResult};
pub use handle::{AsyncOperationHandle, CompletionCallback};
pub use worker::WorkerRequest;
