//! Re-chunking of byte streams into multipart-sized parts.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::{Bytes, BytesMut};
use futures::Stream;
use pin_project_lite::pin_project;

pin_project! {
    /// A stream adapter that groups fragments into chunks of at least `min_size` bytes.
    ///
    /// Every chunk except possibly the last is at least `min_size` bytes. Empty
    /// fragments are ignored and the final remainder is emitted only when non-empty,
    /// so the concatenation of the output equals the concatenation of the input.
    /// The stream ends after the first error of the source.
    pub struct ChunkStream<S> {
        #[pin]
        inner: S,
        buffer: BytesMut,
        min_size: usize,
        done: bool,
    }
}

impl<S> ChunkStream<S> {
    /// Wrap `inner`, emitting chunks of at least `min_size` bytes.
    pub fn new(inner: S, min_size: usize) -> Self {
        Self {
            inner,
            buffer: BytesMut::new(),
            min_size,
            done: false,
        }
    }
}

impl<S> fmt::Debug for ChunkStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkStream")
            .field("buffered", &self.buffer.len())
            .field("min_size", &self.min_size)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl<S, E> Stream for ChunkStream<S>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    type Item = Result<Bytes, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }

        loop {
            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(fragment)) => {
                    if fragment.is_empty() {
                        continue;
                    }
                    this.buffer.extend_from_slice(&fragment);
                    if this.buffer.len() >= *this.min_size {
                        return Poll::Ready(Some(Ok(this.buffer.split().freeze())));
                    }
                }
                Some(Err(e)) => {
                    *this.done = true;
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    *this.done = true;
                    if this.buffer.is_empty() {
                        return Poll::Ready(None);
                    }
                    return Poll::Ready(Some(Ok(this.buffer.split().freeze())));
                }
            }
        }
    }
}

/// Group the fragments of `stream` into chunks of at least `min_size` bytes.
pub fn chunked<S>(stream: S, min_size: usize) -> ChunkStream<S> {
    ChunkStream::new(stream, min_size)
}
