//! The intercepted call and the shape of its result.
//!
//! An [`Invocation`] is one call on a data-access component, captured before
//! it runs. The interceptor reads its target descriptor and operation name,
//! then calls [`Invocation::proceed`] exactly once. The [`Outcome`] trait tells
//! the interceptor whether the returned value is final or a deferred handle
//! whose completion has to be observed.

use std::fmt;

use crate::{ListenableFuture, deferred::Deferred, identity::ComponentDescriptor};

/// Declared result shape of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultContract {
    /// The returned value is the final outcome.
    Immediate,
    /// The returned value is a handle that completes later.
    Deferred,
}

/// The value an intercepted operation returns.
///
/// Implemented for `Result<T, E>` (immediate) and [`ListenableFuture`]
/// (deferred). Plain values can opt in with the default implementation, which
/// reports an immediate success.
pub trait Outcome {
    /// Declared result shape of operations returning this type.
    const CONTRACT: ResultContract = ResultContract::Immediate;

    /// Returns the failure carried by an immediate outcome, if any.
    fn failure(&self) -> Option<&dyn fmt::Display> {
        None
    }

    /// Returns the deferred view of this outcome when it completes later.
    fn as_deferred(&self) -> Option<&dyn Deferred> {
        None
    }
}

impl<T, E: fmt::Display> Outcome for Result<T, E> {
    fn failure(&self) -> Option<&dyn fmt::Display> {
        self.as_ref().err().map(|err| err as &dyn fmt::Display)
    }
}

impl<T, E: fmt::Display> Outcome for ListenableFuture<T, E> {
    const CONTRACT: ResultContract = ResultContract::Deferred;

    fn as_deferred(&self) -> Option<&dyn Deferred> {
        Some(self)
    }
}

impl Outcome for () {}

impl Outcome for String {}

impl Outcome for bool {}

impl Outcome for usize {}

/// A single call on a data-access component, captured before it runs.
pub trait Invocation {
    /// What the call returns.
    type Output: Outcome;

    /// Describes the component the call targets.
    fn target(&self) -> &ComponentDescriptor;

    /// Name of the invoked operation.
    fn operation(&self) -> &str;

    /// Declared result shape of the operation.
    fn result_contract(&self) -> ResultContract {
        <Self::Output as Outcome>::CONTRACT
    }

    /// Runs the underlying call.
    fn proceed(self) -> Self::Output;
}

/// An [`Invocation`] built from a closure.
pub struct MethodInvocation<'a, F> {
    target: &'a ComponentDescriptor,
    operation: &'a str,
    call: F,
}

impl<'a, F, O> MethodInvocation<'a, F>
where
    F: FnOnce() -> O,
    O: Outcome,
{
    /// Captures a call to `operation` on the component described by `target`.
    pub fn new(target: &'a ComponentDescriptor, operation: &'a str, call: F) -> Self {
        Self { target, operation, call }
    }
}

impl<F, O> Invocation for MethodInvocation<'_, F>
where
    F: FnOnce() -> O,
    O: Outcome,
{
    type Output = O;

    fn target(&self) -> &ComponentDescriptor {
        self.target
    }

    fn operation(&self) -> &str {
        self.operation
    }

    fn proceed(self) -> O {
        (self.call)()
    }
}

impl<F> fmt::Debug for MethodInvocation<'_, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodInvocation")
            .field("target", self.target)
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}
