//! # Handle to one launched run.
//!
//! [`Operation`] wraps the join handle of a spawned run so that:
//! - any number of awaiters can observe its outcome (`futures::future::Shared`);
//! - "has it finished?" can be asked synchronously, without polling;
//! - a panic inside the work becomes [`TaskError::Panicked`] instead of unwinding
//!   into whoever awaits it;
//! - a failure is handed to exactly one caller ([`Operation::observe`]); later
//!   observers see `Ok(())`.
//!
//! ## Launch modes
//! ```text
//! Launch::Inline   : work(token) called here ──► tokio::spawn(fut)
//! Launch::Threaded : spawn_blocking(|| handle.block_on(work(token)))
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::policies::Launch;

/// Outcome of one run.
pub type Outcome = Result<(), TaskError>;

/// Sets the shared flag when the run's future is dropped (completed, panicked or aborted).
struct FinishFlag(Arc<AtomicBool>);

impl Drop for FinishFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Observable handle to a launched run.
#[derive(Clone)]
pub(crate) struct Operation {
    outcome: Shared<BoxFuture<'static, Outcome>>,
    finished: Arc<AtomicBool>,
    observed: Arc<AtomicBool>,
}

impl Operation {
    /// Launches `work` with `token` according to `launch`.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn launch<F, Fut>(launch: Launch, token: CancellationToken, work: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = FinishFlag(Arc::clone(&finished));

        let join: JoinHandle<Outcome> = match launch {
            Launch::Inline => {
                let fut = work(token);
                tokio::spawn(async move {
                    let _flag = flag;
                    fut.await
                })
            }
            Launch::Threaded => {
                let handle = Handle::current();
                tokio::task::spawn_blocking(move || {
                    let _flag = flag;
                    handle.block_on(work(token))
                })
            }
        };

        let outcome = async move {
            match join.await {
                Ok(res) => res,
                Err(e) if e.is_panic() => Err(TaskError::Panicked {
                    info: panic_message(&*e.into_panic()),
                }),
                Err(_) => Err(TaskError::Canceled),
            }
        }
        .boxed()
        .shared();

        Self {
            outcome,
            finished,
            observed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns true once the run's future has completed (successfully or not).
    pub(crate) fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Future resolving to the run's outcome. Cloneable; awaiting it does not consume the run.
    pub(crate) fn outcome(&self) -> Shared<BoxFuture<'static, Outcome>> {
        self.outcome.clone()
    }

    /// Awaits the outcome and claims its failure for the caller.
    ///
    /// Only the first observer of a non-cancellation failure receives it.
    pub(crate) async fn observe(&self) -> Outcome {
        let res = self.outcome().await;
        self.claim(res)
    }

    fn claim(&self, res: Outcome) -> Outcome {
        match res {
            Err(e) if e.is_cancellation() => Err(e),
            Err(_) if self.observed.swap(true, Ordering::AcqRel) => Ok(()),
            other => other,
        }
    }

    /// Claims the failure of a run that no caller has observed yet.
    ///
    /// Waits for the outcome, so only call it once [`is_finished`](Self::is_finished)
    /// is true: the flag is raised when the work is dropped, slightly before the join
    /// handle yields.
    pub(crate) async fn take_unobserved_failure(&self) -> Option<TaskError> {
        match self.observe().await {
            Err(e) if !e.is_cancellation() => Some(e),
            _ => None,
        }
    }
}

/// Renders a panic payload as text.
pub(crate) fn panic_message(any: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn explode() -> Outcome {
        panic!("kaput")
    }

    #[tokio::test]
    async fn inline_run_reports_outcome_to_every_awaiter() {
        let op = Operation::launch(Launch::Inline, CancellationToken::new(), |_| async {
            Err::<(), _>(TaskError::fail("nope"))
        });
        let a = op.outcome();
        let b = op.outcome();
        assert_eq!(a.await, Err(TaskError::fail("nope")));
        assert_eq!(b.await, Err(TaskError::fail("nope")));
        assert!(op.is_finished());
    }

    #[tokio::test]
    async fn failure_is_claimed_once() {
        let op = Operation::launch(Launch::Inline, CancellationToken::new(), |_| async {
            Err::<(), _>(TaskError::fatal("once"))
        });
        let _ = op.outcome().await;

        assert_eq!(op.observe().await, Err(TaskError::fatal("once")));
        assert_eq!(op.observe().await, Ok(()));
        assert_eq!(op.take_unobserved_failure().await, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failure_is_claimed_as_soon_as_flag_is_raised() {
        for _ in 0..100 {
            let op = Operation::launch(Launch::Inline, CancellationToken::new(), |_| async {
                Err::<(), _>(TaskError::fail("early"))
            });
            while !op.is_finished() {
                std::hint::spin_loop();
            }
            assert_eq!(
                op.take_unobserved_failure().await,
                Some(TaskError::fail("early"))
            );
            assert_eq!(op.take_unobserved_failure().await, None);
        }
    }

    #[tokio::test]
    async fn panic_becomes_task_error() {
        let op = Operation::launch(Launch::Inline, CancellationToken::new(), |_| explode());
        assert_eq!(
            op.outcome().await,
            Err(TaskError::Panicked {
                info: "kaput".into()
            })
        );
        assert!(op.is_finished());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn threaded_run_observes_token() {
        let token = CancellationToken::new();
        let op = Operation::launch(Launch::Threaded, token.clone(), |ctx| async move {
            ctx.cancelled().await;
            Err::<(), _>(TaskError::Canceled)
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!op.is_finished());
        token.cancel();
        assert_eq!(op.outcome().await, Err(TaskError::Canceled));
    }
}
