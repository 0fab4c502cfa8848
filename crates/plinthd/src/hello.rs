//! Built-in hello application.

use plinth_pipeline::{
    Application, ApplicationFactory, PipelineEvents, ProcessFuture, RequestContext,
};
use tracing::{debug, info};

/// Answers every request with a fixed greeting page.
pub struct HelloApplication;

impl Application for HelloApplication {
    fn application_start(&self) -> anyhow::Result<()> {
        info!("hello application starting");
        Ok(())
    }

    fn init(&mut self, events: &mut PipelineEvents) {
        events.on_begin_request(|ctx| {
            debug!(method = %ctx.request().method(), "request begin");
        });
        events.on_end_request(|_| {
            debug!("request end");
        });
    }

    fn process<'a>(&'a mut self, ctx: &'a mut RequestContext) -> ProcessFuture<'a> {
        Box::pin(async move {
            info!(method = %ctx.request().method(), bytes = ctx.request().raw_len(), "handling request");
            ctx.set_status(200, "OK")?;
            ctx.add_header("Content-Type", "text/html; charset=utf8")?;
            ctx.write_body(b"<html><body>Hello, world</body></html>")?;
            Ok(())
        })
    }
}

/// Factory handing the acceptor a fresh hello application per cycle.
pub struct HelloFactory;

impl ApplicationFactory for HelloFactory {
    fn create(&self) -> anyhow::Result<Box<dyn Application>> {
        Ok(Box::new(HelloApplication))
    }
}
