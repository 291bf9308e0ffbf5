//! Deferred results with completion callbacks.
//!
//! [`ListenableFuture`] is the handle an asynchronous data-access operation
//! returns immediately; the paired [`Completer`] fills it in later. Callbacks
//! registered with [`ListenableFuture::add_callback`] observe the outcome
//! without consuming it, and the handle can still be `.await`ed by the caller.
//!
//! # Guarantees
//!
//! - The result cell is written at most once.
//! - For every registered callback pair exactly one side fires, at most once.
//! - Callbacks registered before completion run on the completing thread, before the awaiting task
//!   is woken. Callbacks registered after completion run immediately on the registering thread.
//! - Dropping the [`Completer`] without completing cancels the handle. Pending callbacks are dropped
//!   without firing and awaiting the handle yields [`Cancelled`].
//!
//! Callbacks run while the handle's internal lock is held and must not call
//! back into the same handle.
//!
//! ```
//! use repo_timing::{Cancelled, ListenableFuture};
//!
//! #[derive(Debug)]
//! struct Failed;
//! impl From<Cancelled> for Failed {
//!     fn from(_: Cancelled) -> Self {
//!         Failed
//!     }
//! }
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let (completer, handle) = ListenableFuture::<u32, Failed>::channel();
//! handle.add_callback(|value| assert_eq!(*value, 7), |_| unreachable!());
//! completer.complete(Ok(7));
//! assert_eq!(handle.await.unwrap(), 7);
//! # });
//! ```

use std::{
    fmt,
    future::Future,
    mem,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll, Waker},
};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::debug;

/// Marker error produced when a deferred result is cancelled before completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deferred result was cancelled before completion")]
pub struct Cancelled;

/// Returned by [`ListenableFuture::spawn`] and [`ListenableFuture::spawn_blocking`]
/// when called outside a Tokio runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no Tokio runtime is available to run the deferred work")]
pub struct NoRuntime;

type Callback<T, E> = Box<dyn FnOnce(&Result<T, E>) + Send>;

enum State<T, E> {
    Pending { callbacks: Vec<Callback<T, E>>, waker: Option<Waker> },
    Completed(Result<T, E>),
    Cancelled,
    /// The result was moved out by awaiting the handle.
    Taken,
}

struct Shared<T, E> {
    state: Mutex<State<T, E>>,
}

/// A result that becomes available later and supports completion callbacks.
pub struct ListenableFuture<T, E> {
    shared: Arc<Shared<T, E>>,
}

/// The write side of a [`ListenableFuture`].
pub struct Completer<T, E> {
    shared: Arc<Shared<T, E>>,
    completed: bool,
}

impl<T, E> ListenableFuture<T, E> {
    /// Creates a pending handle together with the completer that resolves it.
    #[must_use]
    pub fn channel() -> (Completer<T, E>, Self) {
        let shared = Arc::new(Shared {
            state: Mutex::new(State::Pending { callbacks: Vec::new(), waker: None }),
        });
        (Completer { shared: Arc::clone(&shared), completed: false }, Self { shared })
    }

    /// Creates a handle that is already resolved with `result`.
    #[must_use]
    pub fn completed(result: Result<T, E>) -> Self {
        Self { shared: Arc::new(Shared { state: Mutex::new(State::Completed(result)) }) }
    }

    /// Returns `true` once the handle has been completed or cancelled.
    #[must_use]
    pub fn is_done(&self) -> bool {
        !matches!(*self.shared.state.lock(), State::Pending { .. })
    }

    /// Returns `true` if the handle was cancelled before completion.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(*self.shared.state.lock(), State::Cancelled)
    }

    /// Registers a success and a failure callback. Exactly one of them fires
    /// when the handle completes.
    ///
    /// If the handle is already complete the matching callback fires
    /// immediately. If the handle is cancelled, or its result has already been
    /// taken by awaiting it, neither fires.
    pub fn add_callback<S, F>(&self, on_success: S, on_failure: F)
    where
        S: FnOnce(&T) + Send + 'static,
        F: FnOnce(&E) + Send + 'static,
    {
        let callback: Callback<T, E> = Box::new(move |result| match result {
            Ok(value) => on_success(value),
            Err(err) => on_failure(err),
        });

        let mut state = self.shared.state.lock();
        match &mut *state {
            State::Pending { callbacks, .. } => callbacks.push(callback),
            State::Completed(result) => callback(result),
            State::Cancelled | State::Taken => {
                debug!("callback registered on a settled deferred result; it will not fire");
            },
        }
    }
}

impl<T, E> ListenableFuture<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Runs `future` on the current Tokio runtime and resolves the handle with its output.
    ///
    /// If the runtime drops the task before it finishes, the handle is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`NoRuntime`] when called outside a Tokio runtime. `future` is
    /// dropped without being polled.
    pub fn spawn<F>(future: F) -> Result<Self, NoRuntime>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| NoRuntime)?;
        let (completer, handle) = Self::channel();
        runtime.spawn(async move {
            completer.complete(future.await);
        });
        Ok(handle)
    }

    /// Runs blocking `work` on Tokio's blocking pool and resolves the handle with its result.
    ///
    /// # Errors
    ///
    /// Returns [`NoRuntime`] when called outside a Tokio runtime. `work` is
    /// dropped without running.
    pub fn spawn_blocking<F>(work: F) -> Result<Self, NoRuntime>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| NoRuntime)?;
        let (completer, handle) = Self::channel();
        runtime.spawn_blocking(move || completer.complete(work()));
        Ok(handle)
    }
}

impl<T, E> fmt::Debug for ListenableFuture<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match *self.shared.state.lock() {
            State::Pending { .. } => "pending",
            State::Completed(Ok(_)) => "succeeded",
            State::Completed(Err(_)) => "failed",
            State::Cancelled => "cancelled",
            State::Taken => "taken",
        };
        f.debug_struct("ListenableFuture").field("state", &state).finish()
    }
}

impl<T, E> Future for ListenableFuture<T, E>
where
    E: From<Cancelled>,
{
    type Output = Result<T, E>;

    #[allow(clippy::panic)]
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.state.lock();
        match mem::replace(&mut *state, State::Taken) {
            State::Completed(result) => Poll::Ready(result),
            State::Cancelled => Poll::Ready(Err(E::from(Cancelled))),
            State::Pending { callbacks, .. } => {
                *state = State::Pending { callbacks, waker: Some(cx.waker().clone()) };
                Poll::Pending
            },
            State::Taken => panic!("`ListenableFuture` polled after completion"),
        }
    }
}

impl<T, E> Completer<T, E> {
    /// Resolves the paired handle with `result`.
    ///
    /// Pending callbacks fire on the calling thread before the awaiting task is woken.
    pub fn complete(mut self, result: Result<T, E>) {
        self.completed = true;

        // Callbacks registered while earlier ones run are picked up on the next pass.
        let waker = loop {
            let callbacks = {
                let mut state = self.shared.state.lock();
                let State::Pending { callbacks, waker } = &mut *state else {
                    return;
                };
                if callbacks.is_empty() {
                    let waker = waker.take();
                    *state = State::Completed(result);
                    break waker;
                }
                mem::take(callbacks)
            };
            for callback in callbacks {
                callback(&result);
            }
        };

        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Returns `true` if the paired handle has been dropped.
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        Arc::strong_count(&self.shared) == 1
    }
}

impl<T, E> Drop for Completer<T, E> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        let waker = {
            let mut state = self.shared.state.lock();
            match mem::replace(&mut *state, State::Cancelled) {
                State::Pending { waker, .. } => waker,
                other => {
                    *state = other;
                    None
                },
            }
        };
        debug!("deferred result cancelled before completion");
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// Object-safe view of a deferred result used by the interceptor to attach
/// timing listeners without knowing the value type.
pub trait Deferred {
    /// Registers a listener pair; exactly one fires on completion.
    fn add_listener(
        &self,
        on_success: Box<dyn FnOnce() + Send>,
        on_failure: Box<dyn FnOnce(&dyn fmt::Display) + Send>,
    );
}

impl<T, E> Deferred for ListenableFuture<T, E>
where
    E: fmt::Display,
{
    fn add_listener(
        &self,
        on_success: Box<dyn FnOnce() + Send>,
        on_failure: Box<dyn FnOnce(&dyn fmt::Display) + Send>,
    ) {
        self.add_callback(move |_| on_success(), move |err| on_failure(err));
    }
}
