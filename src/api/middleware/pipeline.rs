//! Ordered chain of defense stages.

use async_trait::async_trait;

use crate::domain::request_context::{Outcome, RequestContext};
use crate::error::AppError;

/// Reason attached to short-circuit responses, picked up by the audit log.
#[derive(Debug, Clone)]
pub struct AuditReason(pub String);

/// One step of the defense pipeline.
///
/// A stage either hands the (possibly updated) context to the next stage or ends
/// the request with a terminal response.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: RequestContext) -> Outcome;
}

/// Stages executed front to back; the first short circuit wins.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub async fn run(&self, mut ctx: RequestContext) -> Outcome {
        for stage in &self.stages {
            match stage.run(ctx).await {
                Outcome::Continue(next) => ctx = next,
                Outcome::ShortCircuit(response) => {
                    tracing::debug!(
                        stage = stage.name(),
                        status = response.status().as_u16(),
                        "Request short-circuited"
                    );
                    return Outcome::ShortCircuit(response);
                }
            }
        }
        Outcome::Continue(ctx)
    }
}

/// Ends the request with `error`, tagging the response with an audit reason.
pub fn reject(ctx: RequestContext, error: AppError, reason: impl Into<String>) -> Outcome {
    match ctx.respond(error) {
        Outcome::ShortCircuit(mut response) => {
            response.extensions_mut().insert(AuditReason(reason.into()));
            Outcome::ShortCircuit(response)
        }
        continued => continued,
    }
}
