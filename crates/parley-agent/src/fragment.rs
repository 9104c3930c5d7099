use futures_util::Stream;
use parley_core::{ParleyError, ParleyResult};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Fragments buffered between the producer and a slow consumer.
pub const FRAGMENT_BUFFER: usize = 64;

/// Producer half of a [`FragmentStream`].
pub struct FragmentSender {
    tx: mpsc::Sender<ParleyResult<String>>,
}

impl FragmentSender {
    /// Deliver one fragment. Returns `false` once the consumer is gone.
    pub async fn send(&self, fragment: impl Into<String>) -> bool {
        self.tx.send(Ok(fragment.into())).await.is_ok()
    }

    /// Deliver a terminal error. The producer should return afterwards.
    pub async fn fail(&self, error: ParleyError) {
        let _ = self.tx.send(Err(error)).await;
    }

    /// Whether the consumer has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// An ordered, cancellable stream of response fragments.
///
/// The stream ends (yields `None`) when the producing task returns. Dropping
/// the stream, or calling [`FragmentStream::cancel`], aborts the producer, so
/// a client that disconnects mid-response stops generation.
pub struct FragmentStream {
    rx: mpsc::Receiver<ParleyResult<String>>,
    producer: Option<JoinHandle<()>>,
}

impl FragmentStream {
    /// Spawn `producer` on the tokio runtime, feeding the returned stream.
    pub fn spawn<F, Fut>(producer: F) -> Self
    where
        F: FnOnce(FragmentSender) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(FRAGMENT_BUFFER);
        let handle = tokio::spawn(producer(FragmentSender { tx }));
        Self {
            rx,
            producer: Some(handle),
        }
    }

    /// A stream replaying fixed fragments. Must be called inside a tokio runtime.
    pub fn from_fragments<I>(fragments: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let fragments: Vec<String> = fragments.into_iter().map(Into::into).collect();
        Self::spawn(move |sender| async move {
            for fragment in fragments {
                if !sender.send(fragment).await {
                    break;
                }
            }
        })
    }

    /// Stop the producer and discard anything not yet received.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.producer.take() {
            handle.abort();
        }
        self.rx.close();
    }
}

impl Stream for FragmentStream {
    type Item = ParleyResult<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for FragmentStream {
    fn drop(&mut self) {
        if let Some(handle) = self.producer.take() {
            handle.abort();
        }
    }
}

impl fmt::Debug for FragmentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragmentStream")
            .field("running", &self.producer.as_ref().is_some_and(|h| !h.is_finished()))
            .finish_non_exhaustive()
    }
}
