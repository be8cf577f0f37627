//! The per-message pipeline: resolve context, filter, execute, deliver.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use graphsub_lang::ast::Document;
use graphsub_lang::{ExecutionResult, Variables};
use serde_json::Value;

use super::manager::SubscriptionId;
use super::request::{SubscriptionCallback, SubscriptionContext};
use super::trigger::TriggerFilter;
use crate::engine::QueryEngine;
use crate::error::{panic_message, BoxError, PipelineError};
use crate::transport::MessageHandler;

/// Everything needed to serve one trigger of one subscription.
pub(crate) struct MessagePipeline<E> {
    pub(crate) engine: Arc<E>,
    pub(crate) document: Arc<Document>,
    pub(crate) variables: Arc<Variables>,
    pub(crate) operation_name: Option<Arc<str>>,
    pub(crate) context: SubscriptionContext,
    pub(crate) filter: Arc<dyn TriggerFilter>,
    pub(crate) callback: SubscriptionCallback,
    pub(crate) subscription: SubscriptionId,
    pub(crate) trigger: Arc<str>,
}

impl<E: QueryEngine> MessagePipeline<E> {
    /// `Ok(None)` when the filter rejected the message. A panicking context
    /// factory or filter fails its stage like an error would.
    pub(crate) async fn evaluate(
        &self,
        root: Value,
    ) -> Result<Option<ExecutionResult>, PipelineError> {
        let context = guarded(self.context.resolve())
            .await
            .map_err(PipelineError::Context)?;

        let accepted = guarded(self.filter.matches(&root, &context))
            .await
            .map_err(PipelineError::Filter)?;
        if !accepted {
            return Ok(None);
        }

        let result = self
            .engine
            .execute(
                &self.document,
                &root,
                &context,
                &self.variables,
                self.operation_name.as_deref(),
            )
            .await
            .map_err(PipelineError::Execution)?;
        Ok(Some(result))
    }

    /// Evaluate and hand the outcome to the callback. Never fails.
    pub(crate) async fn run(&self, root: Value) {
        match self.evaluate(root).await {
            Ok(Some(result)) => {
                tracing::trace!(
                    subscription = %self.subscription,
                    trigger = %self.trigger,
                    "delivering result"
                );
                (self.callback)(Ok(result));
            }
            Ok(None) => {
                tracing::trace!(
                    subscription = %self.subscription,
                    trigger = %self.trigger,
                    "message filtered out"
                );
            }
            Err(e) => {
                tracing::debug!(
                    subscription = %self.subscription,
                    trigger = %self.trigger,
                    stage = %e.stage(),
                    error = %e,
                    "pipeline failed"
                );
                (self.callback)(Err(e));
            }
        }
    }

    pub(crate) fn into_handler(self) -> MessageHandler {
        let pipeline = Arc::new(self);
        Arc::new(move |root| {
            let pipeline = pipeline.clone();
            async move { pipeline.run(root).await }.boxed()
        })
    }
}

/// Runs a user-supplied stage, turning a panic into an error.
async fn guarded<T, F>(stage: F) -> Result<T, BoxError>
where
    F: std::future::Future<Output = Result<T, BoxError>>,
{
    match AssertUnwindSafe(stage).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => Err(format!("panicked: {}", panic_message(panic.as_ref())).into()),
    }
}
