//! Progress Stream - ordered status notifications for an external observer
//!
//! Separate from control-flow events. Every run owns one emitter side (cloned into
//! each step) and hands the single receiving side to the caller. The stream ends
//! once every emitter clone is dropped, which happens when the run reaches its
//! terminal state; anything still buffered is delivered first.

use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// A single status message appended to the progress stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressNotification {
    /// Originator (agent or workflow name)
    pub name: String,
    pub msg: String,
    /// Workflow or sub-workflow tag
    pub workflow_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ProgressNotification {
    pub fn new(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            msg: msg.into(),
            workflow_name: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_workflow(mut self, workflow_name: impl Into<String>) -> Self {
        self.workflow_name = Some(workflow_name.into());
        self
    }

    /// Re-tag a notification forwarded from a sub-workflow.
    pub fn tagged(mut self, label: &str) -> Self {
        self.workflow_name = Some(label.to_string());
        self
    }
}

/// Append side of a run's progress stream
#[derive(Debug, Clone)]
pub struct ProgressEmitter {
    sender: mpsc::UnboundedSender<ProgressNotification>,
}

impl ProgressEmitter {
    /// Append a notification
    pub fn emit(&self, notification: ProgressNotification) {
        tracing::debug!(
            "[PROGRESS] {} ({}): {}",
            notification.name,
            notification.workflow_name.as_deref().unwrap_or("-"),
            notification.msg
        );
        // Ignore send errors (consumer went away)
        let _ = self.sender.send(notification);
    }

    pub fn is_observed(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// Consumer side: a lazy, FIFO sequence of notifications
#[derive(Debug)]
pub struct ProgressStream {
    inner: UnboundedReceiverStream<ProgressNotification>,
}

impl Stream for ProgressStream {
    type Item = ProgressNotification;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Create a connected emitter/stream pair
pub fn progress_channel() -> (ProgressEmitter, ProgressStream) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        ProgressEmitter { sender },
        ProgressStream {
            inner: UnboundedReceiverStream::new(receiver),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    #[tokio::test]
    async fn test_stream_preserves_order_and_ends_after_emitters_drop() {
        let (emitter, stream) = progress_channel();
        let second = emitter.clone();

        emitter.emit(ProgressNotification::new("a", "1"));
        second.emit(ProgressNotification::new("b", "2"));
        emitter.emit(ProgressNotification::new("a", "3"));
        drop(emitter);
        second.emit(ProgressNotification::new("b", "4"));
        drop(second);

        let messages: Vec<String> = stream.map(|n| n.msg).collect().await;
        assert_eq!(messages, vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn test_stream_pending_until_emitter_dropped() {
        let (emitter, mut stream) = progress_channel();

        {
            let mut next = task::spawn(stream.next());
            assert_pending!(next.poll());
        }

        drop(emitter);
        let mut next = task::spawn(stream.next());
        assert_ready_eq!(next.poll(), None);
    }

    #[test]
    fn test_tagging_overrides_workflow_name() {
        let notification = ProgressNotification::new("Researcher", "working")
            .with_workflow("inner")
            .tagged("Risks");
        assert_eq!(notification.workflow_name.as_deref(), Some("Risks"));
    }

    #[test]
    fn test_emitter_observed_until_stream_dropped() {
        let (emitter, stream) = progress_channel();
        assert!(emitter.is_observed());

        drop(stream);
        assert!(!emitter.is_observed());
        emitter.emit(ProgressNotification::new("Researcher", "nobody listening"));
    }
}
