//! Rate limiting for colour-picker updates.
//!
//! A picker emits an event per pointer move. Sending each one would flood the
//! bridge, so every light id gets its own window: the first event of a
//! window is sent at once, later ones only replace a single queued value
//! that is sent when the window ends.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use crate::bridge::{CommandLight, LightUpdater};
use crate::color::{Hsv, XY};
use crate::resource::ResourceIdentifier;
use crate::Result;

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

/// State of one id's throttle window.
#[derive(Debug, Clone, PartialEq)]
pub enum Window<V> {
    Idle,
    /// A value went out when the window opened; nothing is waiting.
    Open { until: Instant },
    /// The window is still cooling down and `value` goes out when it ends.
    Queued { until: Instant, value: V },
}

impl<V> Default for Window<V> {
    fn default() -> Self {
        Window::Idle
    }
}

/// What the caller has to do after [`Window::submit`].
#[derive(Debug, Clone, PartialEq)]
pub enum Submitted<V> {
    /// Send this value now.
    Fire(V),
    /// A value is now queued; wake up at `at` and call [`Window::elapse`].
    Schedule { at: Instant },
    /// Replaced an already queued value. A wake-up is already pending.
    Coalesced,
}

impl<V> Window<V> {
    pub fn submit(&mut self, now: Instant, value: V, interval: Duration) -> Submitted<V> {
        match std::mem::take(self) {
            Window::Queued { until, .. } => {
                *self = Window::Queued { until, value };
                Submitted::Coalesced
            }
            Window::Open { until } if until > now => {
                *self = Window::Queued { until, value };
                Submitted::Schedule { at: until }
            }
            Window::Idle | Window::Open { .. } => {
                *self = Window::Open {
                    until: now + interval,
                };
                Submitted::Fire(value)
            }
        }
    }

    /// Ends a window whose time is up. Returns the queued value, which opens
    /// a fresh window of its own.
    pub fn elapse(&mut self, now: Instant, interval: Duration) -> Option<V> {
        match std::mem::take(self) {
            Window::Queued { until, value } if until <= now => {
                *self = Window::Open {
                    until: now + interval,
                };
                Some(value)
            }
            Window::Open { until } if until <= now => None,
            other => {
                *self = other;
                None
            }
        }
    }

    /// Back to idle, dropping any queued value.
    pub fn cancel(&mut self) -> Option<V> {
        match std::mem::take(self) {
            Window::Queued { value, .. } => Some(value),
            Window::Idle | Window::Open { .. } => None,
        }
    }

    pub fn is_idle(&self, now: Instant) -> bool {
        match self {
            Window::Idle => true,
            Window::Open { until } => *until <= now,
            Window::Queued { .. } => false,
        }
    }
}

/// A colour picked for one light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColorEvent {
    Rgb([u8; 3]),
    /// Hue and saturation pick the colour, value the brightness.
    Hsv(Hsv),
    Xy(XY),
}

impl ColorEvent {
    /// Partial state to send. Black has no chromaticity and turns the light
    /// off.
    pub fn to_command(&self) -> CommandLight {
        match *self {
            ColorEvent::Rgb([r, g, b]) => match XY::from_rgb(r, g, b) {
                Some(xy) => CommandLight::default().on().with_xy(xy),
                None => CommandLight::default().off(),
            },
            ColorEvent::Hsv(hsv) => {
                let full = Hsv { val: 1.0, ..hsv };
                match full.to_xy() {
                    Some(xy) if hsv.val > 0.0 => CommandLight::default()
                        .on()
                        .with_xy(xy)
                        .with_brightness((hsv.val.clamp(0.0, 1.0) * 100.0) as f32),
                    _ => CommandLight::default().off(),
                }
            }
            ColorEvent::Xy(xy) => CommandLight::default().on().with_xy(xy),
        }
    }
}

/// Result of one throttled write, for showing failures next to the control.
#[derive(Debug)]
pub struct ThrottleReport {
    pub id: String,
    pub result: Result<Vec<ResourceIdentifier>>,
}

#[derive(Default)]
struct Slots {
    /// Bumped by every cancel; timers from an older epoch do nothing.
    epoch: u64,
    /// Set by cancel, cleared by resume. Submissions in between are dropped.
    cancelled: bool,
    windows: HashMap<String, Window<ColorEvent>>,
}

/// Per-light throttle in front of a [`LightUpdater`].
///
/// Must be used from within a tokio runtime: writes and trailing timers run
/// as spawned tasks. Once cancelled, the throttle ignores submissions until
/// [`UpdateThrottle::resume`]. Dropping the throttle cancels it.
pub struct UpdateThrottle<U: LightUpdater + 'static> {
    updater: Arc<U>,
    interval: Duration,
    slots: Arc<Mutex<Slots>>,
    reports: Option<mpsc::UnboundedSender<ThrottleReport>>,
}

impl<U: LightUpdater + 'static> UpdateThrottle<U> {
    pub fn new(updater: Arc<U>, interval: Duration) -> Self {
        Self {
            updater,
            interval,
            slots: Arc::new(Mutex::new(Slots::default())),
            reports: None,
        }
    }

    /// Delivers the outcome of every write on `reports`.
    pub fn with_reports(mut self, reports: mpsc::UnboundedSender<ThrottleReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn submit(&self, id: &str, event: ColorEvent) {
        let now = Instant::now();
        let mut slots = lock(&self.slots);
        if slots.cancelled {
            log::debug!("throttle: cancelled, dropping update of {id}");
            return;
        }
        slots.windows.retain(|_, window| !window.is_idle(now));
        let epoch = slots.epoch;
        let window = slots.windows.entry(id.to_string()).or_default();

        match window.submit(now, event, self.interval) {
            Submitted::Fire(event) => {
                drop(slots);
                log::debug!("throttle: sending {id} now");
                tokio::spawn(send(
                    Arc::clone(&self.updater),
                    id.to_string(),
                    event,
                    self.reports.clone(),
                ));
            }
            Submitted::Schedule { at } => {
                drop(slots);
                log::debug!("throttle: queued {id}");
                tokio::spawn(trailing(
                    Arc::clone(&self.updater),
                    Arc::clone(&self.slots),
                    id.to_string(),
                    epoch,
                    at,
                    self.interval,
                    self.reports.clone(),
                ));
            }
            Submitted::Coalesced => {}
        }
    }

    /// Drops every queued value without sending it and ignores further
    /// submissions until [`UpdateThrottle::resume`]. Writes already handed to
    /// the updater finish; nothing submitted before or after this call is
    /// sent after it.
    pub fn cancel(&self) {
        let mut slots = lock(&self.slots);
        slots.epoch += 1;
        slots.cancelled = true;
        let dropped = slots
            .windows
            .values_mut()
            .filter_map(Window::cancel)
            .count();
        slots.windows.clear();
        if dropped > 0 {
            log::debug!("throttle: cancelled {dropped} queued updates");
        }
    }

    /// Accepts submissions again after [`UpdateThrottle::cancel`]. Every id
    /// starts with a fresh window.
    pub fn resume(&self) {
        lock(&self.slots).cancelled = false;
    }

    pub fn is_cancelled(&self) -> bool {
        lock(&self.slots).cancelled
    }

    /// Whether nothing is queued or cooling down for `id`.
    pub fn is_idle(&self, id: &str) -> bool {
        lock(&self.slots)
            .windows
            .get(id)
            .map_or(true, |window| window.is_idle(Instant::now()))
    }
}

impl<U: LightUpdater + 'static> Drop for UpdateThrottle<U> {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn lock(slots: &Mutex<Slots>) -> MutexGuard<'_, Slots> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn trailing<U: LightUpdater>(
    updater: Arc<U>,
    slots: Arc<Mutex<Slots>>,
    id: String,
    epoch: u64,
    at: Instant,
    interval: Duration,
    reports: Option<mpsc::UnboundedSender<ThrottleReport>>,
) {
    sleep_until(at).await;
    // the value is taken under the lock, so a concurrent cancel either runs
    // before (nothing to send) or after (value already on its way)
    let event = {
        let mut slots = lock(&slots);
        if slots.epoch != epoch {
            return;
        }
        match slots.windows.get_mut(&id) {
            Some(window) => window.elapse(Instant::now(), interval),
            None => None,
        }
    };
    if let Some(event) = event {
        log::debug!("throttle: sending queued {id}");
        send(updater, id, event, reports).await;
    }
}

async fn send<U: LightUpdater>(
    updater: Arc<U>,
    id: String,
    event: ColorEvent,
    reports: Option<mpsc::UnboundedSender<ThrottleReport>>,
) {
    let command = event.to_command();
    let result = match updater.update_light(&id, &command).await {
        Ok(response) => response.into_result(),
        Err(err) => Err(err),
    };
    if let Err(err) = &result {
        log::warn!("throttled update of {id} failed: {err}");
    }
    if let Some(reports) = reports {
        // receiver gone means nobody is listening any more
        let _ = reports.send(ThrottleReport { id, result });
    }
}
