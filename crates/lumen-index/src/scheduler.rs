use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use lumen_core::events::{ConfigChange, SubscriptionId};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::builder::{BuildOutcome, IndexBuilder};

/// Re-runs automatic index passes for one project while local RAG is
/// enabled.
///
/// After each pass the next one is armed `interval` later. Turning local
/// RAG on re-arms with the short `rearm` delay; turning it off disarms the
/// timer and stops the retrieval service. A pass that is already running
/// is left to finish but does not re-arm.
pub struct IndexScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    builder: IndexBuilder,
    root: PathBuf,
    interval: Duration,
    rearm: Duration,
    timer: Mutex<Option<CancellationToken>>,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl IndexScheduler {
    /// A scheduler using the configured interval and re-arm delay.
    pub fn new(builder: IndexBuilder, root: impl Into<PathBuf>) -> Self {
        let config = builder.context().config().index;
        Self::with_timing(
            builder,
            root,
            Duration::from_secs(config.interval_secs),
            Duration::from_secs(config.rearm_delay_secs),
        )
    }

    pub fn with_timing(
        builder: IndexBuilder,
        root: impl Into<PathBuf>,
        interval: Duration,
        rearm: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                builder,
                root: root.into(),
                interval,
                rearm,
                timer: Mutex::new(None),
                subscription: Mutex::new(None),
            }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Follow local-RAG toggles and, if local RAG is on, arm the first
    /// pass one interval from now. Must be called inside a Tokio runtime.
    pub fn start(&self) {
        let handle = Handle::current();
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let ctx = self.inner.builder.context();
        let id = ctx.events().config.subscribe(move |change| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            match change {
                ConfigChange::LocalRag(true) => {
                    let _entered = handle.enter();
                    Inner::arm(&inner, inner.rearm);
                }
                ConfigChange::LocalRag(false) => inner.dispose(),
            }
        });
        if let Some(old) = lock(&self.inner.subscription).replace(id) {
            ctx.events().config.unsubscribe(old);
        }
        if ctx.local_rag_enabled() {
            Inner::arm(&self.inner, self.inner.interval);
        }
    }

    /// Arm the next pass `delay` from now, replacing any pending one.
    pub fn arm(&self, delay: Duration) {
        Inner::arm(&self.inner, delay);
    }

    /// Whether a pass is pending or running.
    pub fn is_armed(&self) -> bool {
        lock(&self.inner.timer)
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// Disarm the timer and stop the retrieval service.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Stop following toggles and disarm the timer. The service keeps
    /// running.
    pub fn stop(&self) {
        self.inner.unsubscribe();
        self.inner.cancel_timer();
    }
}

impl Drop for IndexScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    fn arm(this: &Arc<Self>, delay: Duration) {
        let token = CancellationToken::new();
        if let Some(old) = lock(&this.timer).replace(token.clone()) {
            old.cancel();
        }
        tracing::info!(?delay, "index pass armed");
        let weak = Arc::downgrade(this);
        tokio::spawn(async move {
            let mut delay = delay;
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                match inner.builder.build(&inner.root, false).await {
                    Ok(BuildOutcome::Completed(_)) => {}
                    Ok(outcome) => tracing::debug!(?outcome, "scheduled index pass skipped"),
                    Err(e) => tracing::error!(error = %e, "scheduled index pass failed"),
                }
                if token.is_cancelled() {
                    return;
                }
                delay = inner.interval;
            }
        });
    }

    fn cancel_timer(&self) {
        if let Some(token) = lock(&self.timer).take() {
            token.cancel();
        }
    }

    fn dispose(&self) {
        self.cancel_timer();
        self.builder.client().manager().shutdown();
        tracing::info!("index scheduler disposed");
    }

    fn unsubscribe(&self) {
        if let Some(id) = lock(&self.subscription).take() {
            self.builder.context().events().config.unsubscribe(id);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
