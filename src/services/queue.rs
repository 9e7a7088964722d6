use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::models::content::{ContentRef, TrackMetadata};
use crate::models::verification::{RequestHandle, VerificationCheck};
use crate::services::verification::{VerificationError, Verifier};

/// A call waiting for its turn at the downstream service.
enum QueuedCall {
    Submit {
        content: ContentRef,
        metadata: TrackMetadata,
        reply: oneshot::Sender<Result<RequestHandle, VerificationError>>,
    },
    CheckStatus {
        handle: RequestHandle,
        reply: oneshot::Sender<Result<VerificationCheck, VerificationError>>,
    },
}

/// Single-consumer FIFO in front of a rate-sensitive verifier.
///
/// One long-lived consumer task drains the channel, running each call to
/// completion and then waiting `settle_delay` before taking the next, so the
/// downstream service never sees more than one outstanding request. The
/// consumer exits once every handle to the queue is dropped.
pub struct IntakeQueue {
    sender: mpsc::UnboundedSender<QueuedCall>,
    depth: Arc<AtomicUsize>,
    processed: Arc<AtomicU64>,
}

impl IntakeQueue {
    /// Start the consumer on the current Tokio runtime.
    pub fn start(inner: Arc<dyn Verifier>, settle_delay: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));
        let processed = Arc::new(AtomicU64::new(0));

        tokio::spawn(consume(
            receiver,
            inner,
            settle_delay,
            depth.clone(),
            processed.clone(),
        ));

        Self {
            sender,
            depth,
            processed,
        }
    }

    /// Calls waiting behind the one currently being processed.
    pub fn queue_depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Calls completed since start.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    fn enqueue(&self, call: QueuedCall) -> Result<(), QueueError> {
        let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        if self.sender.send(call).is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            return Err(QueueError::Closed);
        }
        metrics::gauge!("intake_queue_depth").set(depth as f64);
        Ok(())
    }
}

async fn consume(
    mut receiver: mpsc::UnboundedReceiver<QueuedCall>,
    inner: Arc<dyn Verifier>,
    settle_delay: Duration,
    depth: Arc<AtomicUsize>,
    processed: Arc<AtomicU64>,
) {
    tracing::info!("Intake queue consumer started");

    while let Some(call) = receiver.recv().await {
        let remaining = depth.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        metrics::gauge!("intake_queue_depth").set(remaining as f64);

        // Each call runs in its own task so a panicking verifier drops that
        // reply instead of killing the consumer.
        let verifier = inner.clone();
        let done = processed.clone();
        let task = match call {
            QueuedCall::Submit {
                content,
                metadata,
                reply,
            } => tokio::spawn(async move {
                let result = verifier.submit(&content, &metadata).await;
                done.fetch_add(1, Ordering::SeqCst);
                let _ = reply.send(result);
            }),
            QueuedCall::CheckStatus { handle, reply } => tokio::spawn(async move {
                let result = verifier.check_status(&handle).await;
                done.fetch_add(1, Ordering::SeqCst);
                let _ = reply.send(result);
            }),
        };

        if let Err(e) = task.await {
            tracing::error!(error = %e, "Intake queue item panicked");
            processed.fetch_add(1, Ordering::SeqCst);
        }

        if !settle_delay.is_zero() {
            tokio::time::sleep(settle_delay).await;
        }
    }

    tracing::info!("Intake queue consumer stopped");
}

#[async_trait]
impl Verifier for IntakeQueue {
    async fn submit(
        &self,
        content: &ContentRef,
        metadata: &TrackMetadata,
    ) -> Result<RequestHandle, VerificationError> {
        let (reply, response) = oneshot::channel();
        self.enqueue(QueuedCall::Submit {
            content: content.clone(),
            metadata: metadata.clone(),
            reply,
        })?;
        response.await.map_err(|_| QueueError::Dropped)?
    }

    async fn check_status(
        &self,
        handle: &RequestHandle,
    ) -> Result<VerificationCheck, VerificationError> {
        let (reply, response) = oneshot::channel();
        self.enqueue(QueuedCall::CheckStatus {
            handle: handle.clone(),
            reply,
        })?;
        response.await.map_err(|_| QueueError::Dropped)?
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Intake queue consumer has stopped")]
    Closed,

    #[error("Intake queue dropped the request before replying")]
    Dropped,
}

impl From<QueueError> for VerificationError {
    fn from(error: QueueError) -> Self {
        VerificationError::Unavailable(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mock::MockVerifier;

    fn content(id: &str) -> (ContentRef, TrackMetadata) {
        (
            ContentRef {
                id: id.to_string(),
                uri: None,
            },
            TrackMetadata {
                title: "X".to_string(),
                artist: "Y".to_string(),
                ..Default::default()
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_are_serialized() {
        let verifier = Arc::new(MockVerifier::passing().with_latency(Duration::from_millis(250)));
        let queue = Arc::new(IntakeQueue::start(verifier.clone(), Duration::from_millis(100)));

        let calls = (0..5).map(|i| {
            let queue = queue.clone();
            async move {
                let (content, metadata) = content(&format!("trk-{}", i));
                queue.submit(&content, &metadata).await
            }
        });
        let results = futures::future::join_all(calls).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(verifier.submissions(), 5);
        assert_eq!(verifier.max_in_flight(), 1);
        assert_eq!(queue.processed(), 5);
        assert_eq!(queue.queue_depth(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_after_idle_is_processed() {
        let verifier = Arc::new(MockVerifier::passing());
        let queue = IntakeQueue::start(verifier.clone(), Duration::from_millis(100));
        let (content, metadata) = content("trk-1");

        queue.submit(&content, &metadata).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        let handle = queue.submit(&content, &metadata).await.unwrap();
        let check = queue.check_status(&handle).await.unwrap();

        assert!(matches!(check, VerificationCheck::Completed(_)));
        assert_eq!(queue.processed(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_call_does_not_stop_consumer() {
        let verifier = Arc::new(MockVerifier::panicking());
        let queue = IntakeQueue::start(verifier, Duration::ZERO);
        let (content, metadata) = content("trk-1");

        let handle = queue.submit(&content, &metadata).await.unwrap();
        let err = queue.check_status(&handle).await.unwrap_err();
        assert!(matches!(err, VerificationError::Unavailable(_)));

        // Consumer still alive.
        assert!(queue.submit(&content, &metadata).await.is_ok());
    }
}
