//! Vsync sources
//!
//! A source delivers display-refresh ticks to its subscribers. The platform
//! proxy normally owns the real one; [`TimerVsync`] paces ticks off a timer for
//! headless hosts, and [`ManualVsync`] is driven by hand.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError};

use crate::core::{FrameError, FrameResult};
use crate::dispatch::{Dispatcher, DispatcherExt};

/// One display refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTick {
    /// Monotonic timestamp in nanoseconds.
    pub timestamp: u64,
    /// Time until the next expected frame, when the source knows it.
    pub frame_duration: Option<u64>,
}

pub type VsyncSink = Arc<dyn Fn(FrameTick) + Send + Sync>;

/// A platform vsync signal.
pub trait VsyncSource: Send + Sync {
    fn subscribe(&self, sink: VsyncSink) -> FrameResult<VsyncSubscription>;
}

/// Live subscription; dropping it unsubscribes.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct VsyncSubscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl VsyncSubscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for VsyncSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for VsyncSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VsyncSubscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

type SinkList = Mutex<Vec<(u64, VsyncSink)>>;

/// Vsync source driven explicitly with [`tick`](Self::tick).
///
/// Sinks run synchronously on the caller's thread, in subscription order.
#[derive(Default)]
pub struct ManualVsync {
    sinks: Arc<SinkList>,
    next_id: AtomicU64,
}

impl ManualVsync {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Delivers one tick to every current subscriber; returns how many ran.
    pub fn tick(&self, timestamp: u64, frame_duration: Option<u64>) -> usize {
        let sinks: Vec<VsyncSink> = lock(&self.sinks)
            .iter()
            .map(|(_, sink)| Arc::clone(sink))
            .collect();
        let tick = FrameTick {
            timestamp,
            frame_duration,
        };
        for sink in &sinks {
            sink(tick);
        }
        sinks.len()
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.sinks).len()
    }
}

impl VsyncSource for ManualVsync {
    fn subscribe(&self, sink: VsyncSink) -> FrameResult<VsyncSubscription> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.sinks).push((id, sink));

        let sinks: Weak<SinkList> = Arc::downgrade(&self.sinks);
        Ok(VsyncSubscription::new(move || {
            if let Some(sinks) = sinks.upgrade() {
                lock(&sinks).retain(|(entry, _)| *entry != id);
            }
        }))
    }
}

/// Timer-paced vsync for hosts without a display signal.
///
/// Each subscription owns a timer thread; ticks are delivered through the
/// given dispatcher (normally the render context) with timestamps measured
/// from the source's creation.
pub struct TimerVsync {
    period: Duration,
    dispatcher: Arc<dyn Dispatcher>,
    epoch: Instant,
}

impl TimerVsync {
    /// # 参数
    ///
    /// * `refresh_rate` - 刷新率（Hz），必须为正数
    /// * `dispatcher` - 投递帧信号的调度器
    pub fn new(refresh_rate: f32, dispatcher: Arc<dyn Dispatcher>) -> FrameResult<Self> {
        if !(refresh_rate.is_finite() && refresh_rate > 0.0) {
            return Err(FrameError::Vsync(format!("invalid refresh rate {refresh_rate}")));
        }
        Ok(Self {
            period: Duration::from_secs_f64(1.0 / f64::from(refresh_rate)),
            dispatcher,
            epoch: Instant::now(),
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl VsyncSource for TimerVsync {
    fn subscribe(&self, sink: VsyncSink) -> FrameResult<VsyncSubscription> {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let period = self.period;
        let epoch = self.epoch;
        let dispatcher = Arc::clone(&self.dispatcher);
        let frame_duration = u64::try_from(period.as_nanos()).ok();

        let handle = thread::Builder::new()
            .name("vsync-timer".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => {
                        let tick = FrameTick {
                            timestamp: u64::try_from(epoch.elapsed().as_nanos()).unwrap_or(u64::MAX),
                            frame_duration,
                        };
                        let sink = Arc::clone(&sink);
                        if let Err(err) = dispatcher.run_async(move || sink(tick)) {
                            tracing::debug!(target: "frame", "vsync timer stopping: {err}");
                            break;
                        }
                    }
                    _ => break,
                }
            })
            .map_err(|err| FrameError::Vsync(err.to_string()))?;

        Ok(VsyncSubscription::new(move || {
            drop(stop_tx);
            if handle.join().is_err() {
                tracing::error!(target: "frame", "vsync timer thread panicked");
            }
        }))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
