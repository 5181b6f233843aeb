use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use serenity::model::prelude::UserId;

/// Upper bound on any single cooldown.
pub const MAX_COOLDOWN: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Adjusts the base cooldown for a tone.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CooldownModifier {
    /// Fixed cooldown in milliseconds; takes precedence over `multiplier`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f64>,
}
impl CooldownModifier {
    pub fn time(ms: u64) -> Self {
        Self {
            time: Some(ms),
            multiplier: None,
        }
    }

    pub fn multiplier(multiplier: f64) -> Self {
        Self {
            time: None,
            multiplier: Some(multiplier),
        }
    }

    /// The cooldown for this tone, never longer than [`MAX_COOLDOWN`].
    pub fn apply(&self, base: Duration) -> Duration {
        let cooldown = match (self.time, self.multiplier) {
            (Some(ms), _) => Duration::from_millis(ms),
            (None, Some(multiplier)) => {
                Duration::try_from_secs_f64(base.as_secs_f64() * multiplier.max(0.0))
                    .unwrap_or(MAX_COOLDOWN)
            }
            (None, None) => base,
        };
        cooldown.min(MAX_COOLDOWN)
    }
}

/// Tracks when each user may generate again.
pub struct Cooldowns {
    base: Duration,
    until: Mutex<HashMap<UserId, Instant>>,
}
impl Cooldowns {
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            until: Mutex::new(HashMap::new()),
        }
    }

    /// Starts a cooldown for `user`, or returns how long they still have to wait.
    pub fn check(
        &self,
        user: UserId,
        modifier: Option<&CooldownModifier>,
    ) -> Result<(), Duration> {
        self.check_at(user, modifier, Instant::now())
    }

    fn check_at(
        &self,
        user: UserId,
        modifier: Option<&CooldownModifier>,
        now: Instant,
    ) -> Result<(), Duration> {
        let mut until = self.until.lock().unwrap_or_else(PoisonError::into_inner);
        until.retain(|_, end| *end > now);
        if let Some(&end) = until.get(&user) {
            return Err(end - now);
        }

        let cooldown = modifier.map_or(self.base.min(MAX_COOLDOWN), |m| m.apply(self.base));
        if let Some(end) = now.checked_add(cooldown) {
            until.insert(user, end);
        }
        Ok(())
    }

    /// Lifts the cooldown for `user`, e.g. after a failed generation.
    pub fn clear(&self, user: UserId) {
        self.until
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&user);
    }
}
