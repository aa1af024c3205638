use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::vsync::{FrameTick, VsyncSink, VsyncSource, VsyncSubscription};
use crate::core::{FrameError, FrameResult};

/// Timing of one frame as seen by frame callbacks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    /// Vsync timestamp in nanoseconds.
    pub timestamp: u64,
    /// Nanoseconds until the next expected frame, if known.
    pub frame_duration: Option<u64>,
    /// Timestamp of the first frame since the last `start()`.
    pub start_time: u64,
    /// Seconds since the previous frame; zero on the first.
    pub time_since_last_frame: f64,
    /// Seconds since `start_time`.
    pub passed_seconds: f64,
}

pub type FrameCallback = Arc<dyn Fn(&FrameInfo) + Send + Sync>;

/// Registration handle for a frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameCallbackToken(u64);

/// Frame-synchronized callback scheduler.
///
/// Subscribes once to a [`VsyncSource`] while started and, on every tick,
/// runs the registered callbacks in registration order with the same
/// [`FrameInfo`]. Cloning yields another handle to the same scheduler.
///
/// - A callback added during a tick first runs on the next tick.
/// - A callback removed during a tick is skipped if it has not run yet.
/// - An empty callback list keeps the subscription; only `stop()` or
///   `dispose()` release it.
///
/// # 示例
///
/// ```rust
/// use std::sync::Arc;
/// use host_bridge::frame::{Choreographer, FrameInfo, ManualVsync};
///
/// let vsync = ManualVsync::new();
/// let choreographer = Choreographer::new(vsync.clone());
/// choreographer.add_frame_callback(Arc::new(|info: &FrameInfo| {
///     println!("frame at {}ns", info.timestamp);
/// })).unwrap();
///
/// choreographer.start().unwrap();
/// vsync.tick(16_666_667, None);
/// ```
#[derive(Clone)]
pub struct Choreographer {
    inner: Arc<Inner>,
}

struct Inner {
    source: Arc<dyn VsyncSource>,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    callbacks: Vec<(u64, FrameCallback)>,
    next_token: u64,
    subscription: Option<VsyncSubscription>,
    disposed: bool,
    start_time: Option<u64>,
    last_timestamp: Option<u64>,
}

impl Choreographer {
    pub fn new(source: Arc<dyn VsyncSource>) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Registers `callback`; it runs from the next tick on.
    pub fn add_frame_callback(&self, callback: FrameCallback) -> FrameResult<FrameCallbackToken> {
        let mut state = self.inner.lock();
        if state.disposed {
            return Err(FrameError::Disposed);
        }
        state.next_token += 1;
        let token = state.next_token;
        state.callbacks.push((token, callback));
        Ok(FrameCallbackToken(token))
    }

    /// Returns `false` if the token was not registered.
    pub fn remove_frame_callback(&self, token: FrameCallbackToken) -> bool {
        let mut state = self.inner.lock();
        let before = state.callbacks.len();
        state.callbacks.retain(|(entry, _)| *entry != token.0);
        state.callbacks.len() != before
    }

    pub fn contains_frame_callback(&self, token: FrameCallbackToken) -> bool {
        self.inner.is_registered(token.0)
    }

    pub fn callback_count(&self) -> usize {
        self.inner.lock().callbacks.len()
    }

    /// Subscribes to the vsync source. Starting twice is a no-op.
    pub fn start(&self) -> FrameResult<()> {
        {
            let state = self.inner.lock();
            if state.disposed {
                return Err(FrameError::Disposed);
            }
            if state.subscription.is_some() {
                return Ok(());
            }
        }

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let sink: VsyncSink = Arc::new(move |tick: FrameTick| {
            if let Some(inner) = weak.upgrade() {
                inner.on_tick(tick);
            }
        });
        let subscription = self.inner.source.subscribe(sink)?;

        let mut state = self.inner.lock();
        if state.disposed || state.subscription.is_some() {
            // 并发的 start 或 dispose 抢先完成
            drop(state);
            subscription.unsubscribe();
            return Ok(());
        }
        state.subscription = Some(subscription);
        state.start_time = None;
        state.last_timestamp = None;
        tracing::debug!(target: "frame", "choreographer started");
        Ok(())
    }

    /// Unsubscribes from the vsync source; callbacks stay registered.
    pub fn stop(&self) {
        let subscription = self.inner.lock().subscription.take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
            tracing::debug!(target: "frame", "choreographer stopped");
        }
    }

    /// Stops and drops every callback. Later `start` or `add_frame_callback`
    /// calls fail with `Disposed`.
    pub fn dispose(&self) {
        let (subscription, callbacks) = {
            let mut state = self.inner.lock();
            state.disposed = true;
            (state.subscription.take(), std::mem::take(&mut state.callbacks))
        };
        drop(subscription);
        drop(callbacks);
        tracing::debug!(target: "frame", "choreographer disposed");
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().subscription.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lock().disposed
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_registered(&self, token: u64) -> bool {
        self.lock().callbacks.iter().any(|(entry, _)| *entry == token)
    }

    fn on_tick(&self, tick: FrameTick) {
        let (info, callbacks) = {
            let mut state = self.lock();
            // 停止前已入队的帧信号
            if state.disposed || state.subscription.is_none() {
                return;
            }
            let start_time = *state.start_time.get_or_insert(tick.timestamp);
            let time_since_last_frame = state
                .last_timestamp
                .map(|last| nanos_to_seconds(tick.timestamp.saturating_sub(last)))
                .unwrap_or(0.0);
            state.last_timestamp = Some(tick.timestamp);

            let info = FrameInfo {
                timestamp: tick.timestamp,
                frame_duration: tick.frame_duration,
                start_time,
                time_since_last_frame,
                passed_seconds: nanos_to_seconds(tick.timestamp.saturating_sub(start_time)),
            };
            (info, state.callbacks.clone())
        };

        for (token, callback) in callbacks {
            if !self.is_registered(token) {
                continue;
            }
            if catch_unwind(AssertUnwindSafe(|| callback(&info))).is_err() {
                tracing::error!(target: "frame", timestamp = info.timestamp, "frame callback panicked");
            }
        }
    }
}

impl fmt::Debug for Choreographer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("Choreographer")
            .field("callbacks", &state.callbacks.len())
            .field("running", &state.subscription.is_some())
            .field("disposed", &state.disposed)
            .finish()
    }
}

fn nanos_to_seconds(nanos: u64) -> f64 {
    nanos as f64 / 1_000_000_000.0
}
