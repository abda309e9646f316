//! Lockstep fan-out of one stream into two cursors
//!
//! Both cursors share one source and one pair of queues behind a mutex. Whichever
//! cursor finds its own queue empty pulls the next item from the source, keeps it,
//! and queues a copy for the other cursor. A dropped cursor stops receiving copies.

use crate::pipeline::PipelineError;
use crate::{BoxStream, PipeResult};
use futures::Stream;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

struct Shared<T> {
    source: BoxStream<'static, T>,
    queues: [VecDeque<PipeResult<T>>; 2],
    wakers: [Option<Waker>; 2],
    alive: [bool; 2],
    finished: bool,
}

/// One side of a [`tee`].
pub struct TeeCursor<T> {
    side: usize,
    shared: Arc<Mutex<Shared<T>>>,
}

/// Split `source` into two cursors that each see every item, in order.
pub fn tee<T>(source: BoxStream<'static, T>) -> (TeeCursor<T>, TeeCursor<T>)
where
    T: Clone + Send + 'static,
{
    let shared = Arc::new(Mutex::new(Shared {
        source,
        queues: [VecDeque::new(), VecDeque::new()],
        wakers: [None, None],
        alive: [true, true],
        finished: false,
    }));
    (
        TeeCursor {
            side: 0,
            shared: Arc::clone(&shared),
        },
        TeeCursor { side: 1, shared },
    )
}

impl<T> TeeCursor<T> {
    fn lock(&self) -> MutexGuard<'_, Shared<T>> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Items queued for this cursor but not yet read.
    pub fn queued(&self) -> usize {
        self.lock().queues[self.side].len()
    }
}

// crate::Error is not Clone; the other cursor gets the message.
fn mirror<T: Clone>(item: &PipeResult<T>) -> PipeResult<T> {
    match item {
        Ok(value) => Ok(value.clone()),
        Err(e) => Err(PipelineError::Execution {
            operator: "tee".to_string(),
            reason: e.to_string(),
            hint: None,
        }
        .into()),
    }
}

impl<T: Clone> Stream for TeeCursor<T> {
    type Item = PipeResult<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let side = self.side;
        let other = 1 - side;
        let mut shared = self.lock();

        if let Some(item) = shared.queues[side].pop_front() {
            return Poll::Ready(Some(item));
        }
        if shared.finished {
            return Poll::Ready(None);
        }

        match shared.source.as_mut().poll_next(cx) {
            Poll::Ready(Some(item)) => {
                if shared.alive[other] {
                    let copy = mirror(&item);
                    shared.queues[other].push_back(copy);
                    if let Some(waker) = shared.wakers[other].take() {
                        waker.wake();
                    }
                }
                Poll::Ready(Some(item))
            }
            Poll::Ready(None) => {
                shared.finished = true;
                if let Some(waker) = shared.wakers[other].take() {
                    waker.wake();
                }
                Poll::Ready(None)
            }
            Poll::Pending => {
                shared.wakers[side] = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl<T> Drop for TeeCursor<T> {
    fn drop(&mut self) {
        let side = self.side;
        let mut shared = self.lock();
        shared.alive[side] = false;
        shared.queues[side].clear();
        shared.wakers[side] = None;
        // The source may hold only this cursor's waker; the survivor must poll it itself.
        if let Some(waker) = shared.wakers[1 - side].take() {
            waker.wake();
        }
    }
}
