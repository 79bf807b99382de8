/*!
 * Span Context
 *
 * Execution-context-local stack of open span ids. Each thread owns its own
 * ambient stack, so concurrent spans on different threads never see each
 * other's parentage. Async tasks carry their stack explicitly: a snapshot is
 * taken with [`SpanContext::current`] and re-installed around every poll by
 * [`SpanContext::wrap_future`].
 */

use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

thread_local! {
    static CURRENT: RefCell<SpanContext> = RefCell::new(SpanContext::empty());
}

/// Immutable snapshot of an open-span stack
///
/// Cheap to clone; pushing produces a new snapshot and leaves the old one
/// untouched, so a guard can always restore exactly what it replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanContext {
    stack: Arc<[String]>,
}

impl SpanContext {
    /// A context with no open spans
    pub fn empty() -> Self {
        Self {
            stack: Arc::from(Vec::<String>::new()),
        }
    }

    /// Snapshot of the calling thread's ambient stack
    pub fn current() -> Self {
        CURRENT
            .try_with(|c| c.borrow().clone())
            .unwrap_or_default()
    }

    /// Innermost open span, if any
    #[inline]
    pub fn span_id(&self) -> Option<&str> {
        self.stack.last().map(String::as_str)
    }

    /// The span enclosing the innermost one, if any
    #[inline]
    pub fn parent_span_id(&self) -> Option<&str> {
        let n = self.stack.len();
        if n >= 2 {
            Some(self.stack[n - 2].as_str())
        } else {
            None
        }
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Open span ids, outermost first
    pub fn span_ids(&self) -> impl Iterator<Item = &str> {
        self.stack.iter().map(String::as_str)
    }

    /// New snapshot with `span_id` pushed on top
    pub fn pushed(&self, span_id: impl Into<String>) -> Self {
        let mut next = Vec::with_capacity(self.stack.len() + 1);
        next.extend(self.stack.iter().cloned());
        next.push(span_id.into());
        Self {
            stack: Arc::from(next),
        }
    }

    /// Install this snapshot as the thread's ambient stack
    ///
    /// The returned guard restores the previous stack when dropped, even
    /// during unwinding.
    pub fn attach(self) -> ContextGuard {
        let previous = CURRENT
            .try_with(|c| std::mem::replace(&mut *c.borrow_mut(), self))
            .ok();

        ContextGuard {
            previous,
            _not_send: PhantomData,
        }
    }

    /// Run `f` with this snapshot installed
    pub fn scope<R>(self, f: impl FnOnce() -> R) -> R {
        let _guard = self.attach();
        f()
    }

    /// Install this snapshot around every poll of `future`
    ///
    /// Makes the stack task-local: work-stealing runtimes may resume the task
    /// on any thread and it still sees its own parent chain.
    pub fn wrap_future<F: Future>(self, future: F) -> WithSpanContext<F> {
        WithSpanContext {
            inner: Box::pin(future),
            context: self,
        }
    }
}

impl Default for SpanContext {
    fn default() -> Self {
        Self::empty()
    }
}

/// Restores the previously ambient stack on drop
///
/// Not `Send`: it must be dropped on the thread that created it.
#[must_use = "dropping the guard immediately restores the previous span stack"]
pub struct ContextGuard {
    previous: Option<SpanContext>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            let _ = CURRENT.try_with(|c| *c.borrow_mut() = previous);
        }
    }
}

/// Future wrapper produced by [`SpanContext::wrap_future`]
pub struct WithSpanContext<F> {
    inner: Pin<Box<F>>,
    context: SpanContext,
}

impl<F: Future> Future for WithSpanContext<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let _guard = this.context.clone().attach();
        this.inner.as_mut().poll(cx)
    }
}
