//! Gesture router — wheel, touch and keys to player intents.
//!
//! Wheel and touch are debounced by a timed lock: once a gesture fires a
//! transition, further wheel/touch input is dropped until the lock
//! expires. Keys are discrete presses and pass straight through. The clock
//! is whatever `Instant` the caller passes in, so the router never sleeps
//! or schedules anything itself.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw input from the presentation shell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GestureInput {
    Wheel { delta_y: f64 },
    TouchStart { y: f64 },
    TouchEnd { y: f64 },
    Key { key: Key },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    ArrowDown,
    ArrowUp,
    Escape,
    Other,
}

/// What the player should do in response to input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Advance,
    Retreat,
    Close,
}

/// Thresholds and cooldown for the router.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GestureConfig {
    pub wheel_threshold: f64,
    pub swipe_threshold: f64,
    pub cooldown_ms: u64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            wheel_threshold: 50.0,
            swipe_threshold: 50.0,
            cooldown_ms: 400,
        }
    }
}

impl GestureConfig {
    /// Parse a settings scroll. Missing fields keep defaults; non-positive
    /// thresholds or a zero cooldown reject the whole config.
    pub fn from_value(v: &Value) -> Option<Self> {
        let d = Self::default();
        let wheel = v.get("wheel_threshold").map_or(Some(d.wheel_threshold), Value::as_f64)?;
        let swipe = v.get("swipe_threshold").map_or(Some(d.swipe_threshold), Value::as_f64)?;
        let cooldown = v.get("cooldown_ms").map_or(Some(d.cooldown_ms), Value::as_u64)?;
        if wheel <= 0.0 || swipe <= 0.0 || cooldown == 0 {
            return None;
        }
        Some(Self {
            wheel_threshold: wheel,
            swipe_threshold: swipe,
            cooldown_ms: cooldown,
        })
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cooldown {
    Idle,
    LockedUntil(Instant),
}

#[derive(Debug, Clone)]
pub struct GestureRouter {
    config: GestureConfig,
    cooldown: Cooldown,
    touch_start: Option<f64>,
}

impl GestureRouter {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            cooldown: Cooldown::Idle,
            touch_start: None,
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// True while wheel/touch input is being dropped.
    pub fn is_locked(&self, now: Instant) -> bool {
        matches!(self.cooldown, Cooldown::LockedUntil(until) if now < until)
    }

    /// Route one input event. Returns the intent it triggers, if any.
    pub fn route(&mut self, input: GestureInput, now: Instant) -> Option<Intent> {
        if let Cooldown::LockedUntil(until) = self.cooldown {
            if now >= until {
                self.cooldown = Cooldown::Idle;
            }
        }

        match input {
            GestureInput::Key { key } => match key {
                Key::ArrowDown => Some(Intent::Advance),
                Key::ArrowUp => Some(Intent::Retreat),
                Key::Escape => Some(Intent::Close),
                Key::Other => None,
            },
            GestureInput::TouchStart { y } => {
                self.touch_start = Some(y);
                None
            }
            GestureInput::Wheel { delta_y } => {
                if self.is_locked(now) {
                    return None;
                }
                let intent = if delta_y > self.config.wheel_threshold {
                    Intent::Advance
                } else if delta_y < -self.config.wheel_threshold {
                    Intent::Retreat
                } else {
                    return None;
                };
                self.lock(now);
                Some(intent)
            }
            GestureInput::TouchEnd { y } => {
                let start = self.touch_start.take()?;
                if self.is_locked(now) {
                    return None;
                }
                let diff = start - y;
                if diff.abs() <= self.config.swipe_threshold {
                    return None;
                }
                self.lock(now);
                // Finger moved up: next video.
                Some(if diff > 0.0 { Intent::Advance } else { Intent::Retreat })
            }
        }
    }

    fn lock(&mut self, now: Instant) {
        self.cooldown = Cooldown::LockedUntil(now + self.config.cooldown());
    }
}

impl Default for GestureRouter {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}
