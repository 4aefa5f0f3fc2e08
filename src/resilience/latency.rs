//! Stage timing without retry or error handling.

use std::borrow::Cow;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::task::{Context, Poll};

use pin_project_lite::pin_project;
use tokio::time::Instant;
use tracing::debug;

pin_project! {
    /// Future returned by [`measure_latency`]. Resolves to the inner output
    /// paired with the elapsed milliseconds.
    ///
    /// The clock starts on first poll, so building the future ahead of time
    /// does not inflate the measurement.
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    pub struct Timed<F> {
        #[pin]
        inner: F,
        stage: Cow<'static, str>,
        started: Option<Instant>,
    }
}

impl<F: Future> Future for Timed<F> {
    type Output = (F::Output, u64);

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let started = *this.started.get_or_insert_with(Instant::now);
        match this.inner.poll(cx) {
            Poll::Ready(output) => {
                let latency_ms = started.elapsed().as_millis() as u64;
                debug!(stage = %this.stage, latency_ms, "stage completed");
                Poll::Ready((output, latency_ms))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Time a future. Errors inside the output pass through untouched.
///
/// ```rust
/// # use huginn::measure_latency;
/// # tokio_test::block_on(async {
/// let (value, latency_ms) = measure_latency("embedding", async { 21 * 2 }).await;
/// assert_eq!(value, 42);
/// # let _ = latency_ms;
/// # });
/// ```
pub fn measure_latency<F>(stage: impl Into<Cow<'static, str>>, fut: F) -> Timed<F::IntoFuture>
where
    F: IntoFuture,
{
    Timed {
        inner: fut.into_future(),
        stage: stage.into(),
        started: None,
    }
}

/// Synchronous form of [`measure_latency`].
pub fn measure_latency_blocking<T>(stage: &str, f: impl FnOnce() -> T) -> (T, u64) {
    let started = Instant::now();
    let output = f();
    let latency_ms = started.elapsed().as_millis() as u64;
    debug!(stage, latency_ms, "stage completed");
    (output, latency_ms)
}
