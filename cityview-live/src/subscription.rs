use crate::{EntitySource, FetchRequest, FetchState, LiveError, LiveResult};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// How overlapping fetches of one subscription are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderingPolicy {
    /// Whichever response lands last is published, even if its request was
    /// issued earlier. Every fetch is a pure read, so this only matters when a
    /// slow response overtakes a newer one.
    #[default]
    ArrivalOrder,
    /// Responses are numbered at issue time; one older than the last
    /// published response is dropped.
    IssueOrder,
}

/// State shared between the handle, its timer task and in-flight fetches.
struct Shared {
    live: AtomicBool,
    issued: AtomicU64,
    applied: AtomicU64,
    in_flight: AtomicUsize,
    state: watch::Sender<FetchState>,
}

impl Shared {
    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct Fetcher {
    shared: Arc<Shared>,
    source: Arc<dyn EntitySource>,
    policy: OrderingPolicy,
}

impl Fetcher {
    async fn run(&self, request: &FetchRequest) {
        let shared = &self.shared;
        if !shared.is_live() || !request.enabled {
            return;
        }

        let seq = shared.issued.fetch_add(1, Ordering::SeqCst) + 1;
        shared.in_flight.fetch_add(1, Ordering::SeqCst);
        shared.state.send_if_modified(|state| {
            if !shared.is_live() {
                return false;
            }
            state.is_loading = true;
            true
        });

        let result = self.source.fetch(request).await;
        let still_loading = shared.in_flight.fetch_sub(1, Ordering::SeqCst) > 1;

        let superseded = self.policy == OrderingPolicy::IssueOrder
            && shared.applied.fetch_max(seq, Ordering::SeqCst) > seq;
        let failure = result.as_ref().err().map(|e| (e.status(), e.to_string()));

        // Liveness is checked under the channel lock that `dispose` also
        // takes, so nothing lands once `dispose` has returned. The request
        // itself is never cancelled; its result is dropped here.
        let published = shared.state.send_if_modified(|state| {
            if !shared.is_live() {
                return false;
            }
            state.is_loading = still_loading;
            if superseded {
                return true;
            }
            match result {
                Ok(data) => {
                    state.data = Some(data);
                    state.error = None;
                    state.last_updated = Some(Utc::now());
                }
                Err(e) => state.error = Some(e),
            }
            true
        });

        if !published {
            debug!(seq, "discarding response for disposed subscription");
        } else if superseded {
            debug!(seq, "discarding out-of-order response");
        } else if let Some((status, error)) = failure {
            warn!(seq, status, %error, "fetch failed");
        }
    }
}

/// Handle to one polling subscription.
///
/// Fetches and the refresh timer run as tokio tasks, so [`start`](Self::start)
/// and [`update`](Self::update) must be called inside a runtime. Dropping the
/// handle disposes it.
pub struct Subscription {
    request: FetchRequest,
    fetcher: Fetcher,
    timer: Option<JoinHandle<()>>,
    started: bool,
}

impl Subscription {
    pub fn new(source: Arc<dyn EntitySource>, request: FetchRequest) -> LiveResult<Self> {
        request.validate()?;
        let (state, _) = watch::channel(FetchState::default());
        let shared = Arc::new(Shared {
            live: AtomicBool::new(true),
            issued: AtomicU64::new(0),
            applied: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            state,
        });
        Ok(Self {
            request,
            fetcher: Fetcher {
                shared,
                source,
                policy: OrderingPolicy::default(),
            },
            timer: None,
            started: false,
        })
    }

    #[must_use]
    pub fn with_ordering(mut self, policy: OrderingPolicy) -> Self {
        self.fetcher.policy = policy;
        self
    }

    pub fn request(&self) -> &FetchRequest {
        &self.request
    }

    pub fn ordering(&self) -> OrderingPolicy {
        self.fetcher.policy
    }

    /// A receiver that sees every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<FetchState> {
        self.fetcher.shared.state.subscribe()
    }

    /// The current snapshot.
    pub fn state(&self) -> FetchState {
        self.fetcher.shared.state.borrow().clone()
    }

    pub fn is_disposed(&self) -> bool {
        !self.fetcher.shared.is_live()
    }

    /// Issues the first fetch and arms the refresh timer. Calling it again
    /// refetches and re-arms.
    pub fn start(&mut self) -> LiveResult<()> {
        if self.is_disposed() {
            return Err(LiveError::Disposed);
        }
        debug!(fetch = ?self.request.target, interval = ?self.request.refresh_interval, "subscription started");
        self.started = true;
        self.spawn_fetch();
        self.arm_timer();
        Ok(())
    }

    /// Fetches immediately and waits for the result to be published. A no-op
    /// once disposed or while disabled.
    pub async fn refetch_now(&self) {
        self.fetcher.run(&self.request).await;
    }

    /// Replaces the request. A change to anything that shapes the HTTP request,
    /// or re-enabling, triggers an immediate fetch. The timer is re-armed
    /// whenever the interval, the enabled flag or the shape changed.
    pub fn update(&mut self, request: FetchRequest) -> LiveResult<()> {
        request.validate()?;
        if self.is_disposed() {
            return Err(LiveError::Disposed);
        }

        let refetch = !request.same_shape(&self.request) || (request.enabled && !self.request.enabled);
        let rearm = refetch
            || request.refresh_interval != self.request.refresh_interval
            || request.enabled != self.request.enabled;
        self.request = request;

        if !self.started {
            return Ok(());
        }
        if refetch {
            debug!(fetch = ?self.request.target, "request changed, refetching");
            self.spawn_fetch();
        }
        if rearm {
            self.arm_timer();
        }
        Ok(())
    }

    /// Stops the timer and makes every in-flight fetch drop its result.
    /// Idempotent.
    pub fn dispose(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        let shared = &self.fetcher.shared;
        let mut was_live = false;
        // Flipped under the channel lock so no fetch can publish afterwards.
        shared.state.send_if_modified(|_| {
            was_live = shared.live.swap(false, Ordering::SeqCst);
            false
        });
        if was_live {
            debug!(fetch = ?self.request.target, "subscription disposed");
        }
    }

    fn spawn_fetch(&self) {
        let fetcher = self.fetcher.clone();
        let request = self.request.clone();
        tokio::spawn(async move { fetcher.run(&request).await });
    }

    fn arm_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        if !self.request.polls() {
            return;
        }

        let period = self.request.refresh_interval;
        let fetcher = self.fetcher.clone();
        let request = self.request.clone();
        self.timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // Ticks never wait for the previous fetch.
                let fetcher = fetcher.clone();
                let request = request.clone();
                tokio::spawn(async move { fetcher.run(&request).await });
            }
        }));
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("request", &self.request)
            .field("policy", &self.fetcher.policy)
            .field("started", &self.started)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
