//! # Request Manager - Tracked Requests With Deferred Destruction
//!
//! Owns the set of in-flight asynchronous requests (content downloads,
//! service calls - anything gating a join), ticks each one per frame, and
//! defers the destruction of removed requests for a grace period so that
//! completion callbacks still holding a handle never dereference a freed
//! request.
//!
//! ## Ownership Model
//!
//! The manager keeps a strong [`Arc`] handle to every request it tracks;
//! callbacks hold [`Weak`](std::sync::Weak) handles and validate them with
//! [`RequestManager::is_valid_request`] after upgrading. Removing a request
//! takes it out of the active set immediately but parks the strong handle on
//! a pending-destroy list for [`DEFAULT_DESTROY_DELAY`] seconds; only the
//! sweep in [`RequestManager::tick`] actually releases it.
//!
//! ## Thread Safety
//!
//! One logical thread drives `tick`, but requests may be added or removed
//! from any thread (e.g. a callback completing on a worker), so all state
//! sits behind a single mutex. The lock is **not** held while a request's
//! own `tick` runs - the active set is snapshotted first - which makes it
//! safe for a request to re-enter [`RequestManager::add_request`] or
//! [`RequestManager::remove_request`] from inside its tick.

use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Seconds a removed request stays alive before the sweep releases it.
pub const DEFAULT_DESTROY_DELAY: f32 = 10.0;

/// Lifecycle state a request reports for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    NotStarted,
    Processing,
    Failed,
    Succeeded,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestStatus::NotStarted => "NotStarted",
            RequestStatus::Processing => "Processing",
            RequestStatus::Failed => "Failed",
            RequestStatus::Succeeded => "Succeeded",
        };
        f.write_str(name)
    }
}

/// An asynchronous request the manager can drive.
///
/// `tick` is called once per manager tick, in insertion order, without the
/// manager's lock held. The remaining accessors feed
/// [`RequestManager::dump_requests`].
pub trait ManagedRequest: Send + Sync {
    /// Advances the request by one frame.
    fn tick(&self, delta_seconds: f32);

    /// Short operation name, e.g. `GET` or `DOWNLOAD`.
    fn verb(&self) -> &str;

    /// Target the request is talking to.
    fn url(&self) -> String;

    /// Current lifecycle state.
    fn status(&self) -> RequestStatus;
}

struct PendingDestroy {
    time_left: f32,
    request: Arc<dyn ManagedRequest>,
}

#[derive(Default)]
struct Inner {
    /// Active requests, ticked in insertion order.
    requests: Vec<Arc<dyn ManagedRequest>>,
    /// Removed requests waiting out their grace period.
    pending_destroy: Vec<PendingDestroy>,
}

/// Tracker for in-flight requests with grace-period cleanup.
pub struct RequestManager {
    inner: Mutex<Inner>,
    destroy_delay: f32,
}

impl Default for RequestManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestManager {
    /// Creates a manager with the default grace period.
    pub fn new() -> Self {
        Self::with_destroy_delay(DEFAULT_DESTROY_DELAY)
    }

    /// Creates a manager with a custom grace period, in seconds.
    pub fn with_destroy_delay(destroy_delay: f32) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            destroy_delay,
        }
    }

    /// Inserts a request into the active set.
    pub fn add_request(&self, request: Arc<dyn ManagedRequest>) {
        let mut inner = self.lock();
        inner.requests.push(request);
    }

    /// Removes a request from the active set and parks it on the
    /// pending-destroy list for the grace period.
    ///
    /// The removal from the active set is visible immediately through
    /// [`Self::is_valid_request`]; the request object itself stays alive
    /// until the grace period has elapsed. Removing the same request twice
    /// parks it only once.
    pub fn remove_request(&self, request: &Arc<dyn ManagedRequest>) {
        let mut inner = self.lock();

        let already_pending = inner
            .pending_destroy
            .iter()
            .any(|pending| Arc::ptr_eq(&pending.request, request));
        if !already_pending {
            inner.pending_destroy.push(PendingDestroy {
                time_left: self.destroy_delay,
                request: request.clone(),
            });
        }

        inner.requests.retain(|active| !Arc::ptr_eq(active, request));
    }

    /// Ticks every active request, then ages the pending-destroy list and
    /// releases entries whose grace period has run out.
    ///
    /// Requests are ticked in insertion order on a snapshot taken under the
    /// lock, so a request adding or removing entries from its own tick is
    /// fine: additions are ticked starting next pass, and nothing in the
    /// current pass is skipped or ticked twice.
    pub fn tick(&self, delta_seconds: f32) {
        let snapshot: Vec<Arc<dyn ManagedRequest>> = self.lock().requests.clone();
        for request in &snapshot {
            request.tick(delta_seconds);
        }

        let mut inner = self.lock();
        let before = inner.pending_destroy.len();
        inner.pending_destroy.retain_mut(|pending| {
            pending.time_left -= delta_seconds;
            pending.time_left > 0.0
        });
        let released = before - inner.pending_destroy.len();
        if released > 0 {
            debug!("released {released} request(s) past their grace period");
        }
    }

    /// Whether `request` is still in the active set.
    ///
    /// Callers holding a [`Weak`](std::sync::Weak) handle should upgrade and
    /// validate here before touching the request from a callback.
    pub fn is_valid_request(&self, request: &Arc<dyn ManagedRequest>) -> bool {
        self.lock()
            .requests
            .iter()
            .any(|active| Arc::ptr_eq(active, request))
    }

    /// Number of active requests.
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Writes one line per active request into `out`. Never mutates.
    pub fn dump_requests(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        let inner = self.lock();
        writeln!(out, "------- ({}) tracked requests", inner.requests.len())?;
        for request in &inner.requests {
            writeln!(
                out,
                "\tverb=[{}] url=[{}] status={}",
                request.verb(),
                request.url(),
                request.status()
            )?;
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("request manager lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Weak;

    struct TestRequest {
        url: String,
        ticks: AtomicU32,
        on_tick: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    }

    impl TestRequest {
        fn new(url: &str) -> Arc<dyn ManagedRequest> {
            Arc::new(Self {
                url: url.to_string(),
                ticks: AtomicU32::new(0),
                on_tick: Mutex::new(None),
            })
        }

        fn with_callback(url: &str, on_tick: impl FnOnce() + Send + 'static) -> Arc<TestRequest> {
            Arc::new(Self {
                url: url.to_string(),
                ticks: AtomicU32::new(0),
                on_tick: Mutex::new(Some(Box::new(on_tick))),
            })
        }

        fn tick_count(&self) -> u32 {
            self.ticks.load(Ordering::SeqCst)
        }
    }

    impl ManagedRequest for TestRequest {
        fn tick(&self, _delta_seconds: f32) {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            if let Some(callback) = self.on_tick.lock().unwrap().take() {
                callback();
            }
        }

        fn verb(&self) -> &str {
            "GET"
        }

        fn url(&self) -> String {
            self.url.clone()
        }

        fn status(&self) -> RequestStatus {
            RequestStatus::Processing
        }
    }

    #[test]
    fn removal_is_immediate_but_destruction_is_deferred() {
        let manager = RequestManager::new();
        let request = TestRequest::new("http://cdn.example/pak0");

        manager.add_request(request.clone());
        assert!(manager.is_valid_request(&request));

        manager.remove_request(&request);
        assert!(!manager.is_valid_request(&request));
        // Manager still holds the strong handle on the pending list.
        assert_eq!(Arc::strong_count(&request), 2);

        manager.tick(4.0);
        manager.tick(4.0);
        assert_eq!(Arc::strong_count(&request), 2, "purged before the grace period");

        manager.tick(3.0);
        assert_eq!(Arc::strong_count(&request), 1, "kept past the grace period");
    }

    #[test]
    fn duplicate_removal_parks_only_once() {
        let manager = RequestManager::new();
        let request = TestRequest::new("http://cdn.example/pak0");

        manager.add_request(request.clone());
        manager.remove_request(&request);
        manager.remove_request(&request);

        assert_eq!(Arc::strong_count(&request), 2);
        manager.tick(DEFAULT_DESTROY_DELAY + 0.1);
        assert_eq!(Arc::strong_count(&request), 1);
    }

    #[test]
    fn removed_requests_are_not_ticked() {
        let manager = RequestManager::new();
        let request = Arc::new(TestRequest {
            url: "http://cdn.example/pak0".to_string(),
            ticks: AtomicU32::new(0),
            on_tick: Mutex::new(None),
        });
        let handle: Arc<dyn ManagedRequest> = request.clone();

        manager.add_request(handle.clone());
        manager.tick(1.0);
        manager.remove_request(&handle);
        manager.tick(1.0);

        assert_eq!(request.tick_count(), 1);
    }

    #[test]
    fn requests_added_from_a_tick_run_next_pass() {
        let manager = Arc::new(RequestManager::new());
        let late = Arc::new(TestRequest {
            url: "http://cdn.example/pak1".to_string(),
            ticks: AtomicU32::new(0),
            on_tick: Mutex::new(None),
        });

        let weak_manager: Weak<RequestManager> = Arc::downgrade(&manager);
        let late_handle: Arc<dyn ManagedRequest> = late.clone();
        let adder = TestRequest::with_callback("http://cdn.example/pak0", move || {
            if let Some(manager) = weak_manager.upgrade() {
                manager.add_request(late_handle);
            }
        });

        manager.add_request(adder.clone());
        manager.tick(1.0);

        assert_eq!(adder.tick_count(), 1);
        assert_eq!(late.tick_count(), 0, "additions must wait for the next pass");
        assert_eq!(manager.request_count(), 2);

        manager.tick(1.0);
        assert_eq!(late.tick_count(), 1);
    }

    #[test]
    fn request_removing_itself_mid_tick_does_not_deadlock() {
        let manager = Arc::new(RequestManager::new());
        let slot: Arc<Mutex<Option<Arc<dyn ManagedRequest>>>> = Arc::new(Mutex::new(None));

        let weak_manager = Arc::downgrade(&manager);
        let slot_for_callback = slot.clone();
        let request = TestRequest::with_callback("http://cdn.example/pak0", move || {
            let handle = slot_for_callback.lock().unwrap().take().unwrap();
            if let Some(manager) = weak_manager.upgrade() {
                manager.remove_request(&handle);
            }
        });
        let handle: Arc<dyn ManagedRequest> = request.clone();
        *slot.lock().unwrap() = Some(handle.clone());

        manager.add_request(handle.clone());
        manager.tick(1.0);

        assert_eq!(request.tick_count(), 1);
        assert!(!manager.is_valid_request(&handle));
    }

    #[test]
    fn dump_lists_active_requests_without_mutating() {
        let manager = RequestManager::new();
        manager.add_request(TestRequest::new("http://cdn.example/pak0"));
        manager.add_request(TestRequest::new("http://cdn.example/pak1"));

        let mut output = String::new();
        manager.dump_requests(&mut output).unwrap();

        assert!(output.starts_with("------- (2) tracked requests"));
        assert!(output.contains("url=[http://cdn.example/pak0]"));
        assert!(output.contains("url=[http://cdn.example/pak1]"));
        assert!(output.contains("status=Processing"));
        assert_eq!(manager.request_count(), 2);
    }

    #[test]
    fn never_added_request_is_not_valid() {
        let manager = RequestManager::new();
        let request = TestRequest::new("http://cdn.example/pak0");
        assert!(!manager.is_valid_request(&request));
    }

    #[test]
    fn additions_from_many_threads_all_land() {
        let manager = Arc::new(RequestManager::new());

        let threads: Vec<_> = (0..4)
            .map(|t| {
                let manager = manager.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        manager.add_request(TestRequest::new(&format!(
                            "http://cdn.example/{t}/{i}"
                        )));
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(manager.request_count(), 200);
    }
}
