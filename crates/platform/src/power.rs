//! Activity-driven power management.
//!
//! The manager tracks the last activity timestamp (stamped by MIDI bytes,
//! buttons, and events) and drops the CPU to its low-power operating point
//! after the configured idle timeout. [`PowerManager::awaken`] restores it.
//! Each update also polls the firmware's throttled-status word and reports
//! rising edges of the under-voltage and throttling bits, which the
//! orchestrator surfaces as "check PSU" warnings.

use crate::clock::{secs_to_micros, Micros};

/// Bits in the firmware throttled-status response.
const UNDER_VOLTAGE_OCCURRED: u32 = 1 << 16;
const THROTTLING_OCCURRED: u32 = 1 << 18;

/// CPU operating points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CpuSpeed {
    /// Full clock.
    Maximum,
    /// Power-save clock.
    Low,
}

/// Board hooks the manager drives. The firmware implements this against the
/// mailbox/property-tag interface; tests use a recording mock.
pub trait PowerHooks {
    /// Change the CPU operating point.
    fn set_cpu_speed(&mut self, speed: CpuSpeed);

    /// Read the firmware throttled-status word, or `None` when the
    /// property interface is unavailable.
    fn throttled_status(&mut self) -> Option<u32>;
}

/// Power state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
    /// Full speed, audio running.
    Normal,
    /// CPU slowed, audio cancelled, UI blanked.
    PowerSaving,
}

/// What changed during one [`PowerManager::update`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PowerTransitions {
    /// The idle timeout elapsed; power saving was entered this update.
    pub entered_power_save: bool,
    /// The firmware throttling bit rose this update.
    pub throttle_detected: bool,
    /// The firmware under-voltage bit rose this update.
    pub undervoltage_detected: bool,
}

/// Activity tracker + throttle poller.
pub struct PowerManager {
    timeout_secs: u16,
    last_activity: Micros,
    state: PowerState,
    last_throttled: u32,
}

impl PowerManager {
    /// Create a manager with the given idle timeout. A timeout of zero
    /// disables power saving entirely.
    pub const fn new(timeout_secs: u16) -> Self {
        Self {
            timeout_secs,
            last_activity: 0,
            state: PowerState::Normal,
            last_throttled: 0,
        }
    }

    /// Change the idle timeout.
    pub fn set_timeout(&mut self, timeout_secs: u16) {
        self.timeout_secs = timeout_secs;
    }

    /// Current state.
    pub fn state(&self) -> PowerState {
        self.state
    }

    /// Periodic update from the Main task.
    pub fn update(&mut self, now: Micros, hooks: &mut (impl PowerHooks + ?Sized)) -> PowerTransitions {
        let mut transitions = PowerTransitions::default();

        if self.state == PowerState::Normal
            && self.timeout_secs != 0
            && now.saturating_sub(self.last_activity) >= secs_to_micros(u64::from(self.timeout_secs))
        {
            hooks.set_cpu_speed(CpuSpeed::Low);
            self.state = PowerState::PowerSaving;
            transitions.entered_power_save = true;
            info!("Entering power saving mode");
        }

        if let Some(status) = hooks.throttled_status() {
            let throttling_rose = status & THROTTLING_OCCURRED != 0
                && self.last_throttled & THROTTLING_OCCURRED == 0;
            let undervoltage_rose = status & UNDER_VOLTAGE_OCCURRED != 0
                && self.last_throttled & UNDER_VOLTAGE_OCCURRED == 0;

            if throttling_rose {
                warn!("CPU throttling by firmware detected; check power supply/cooling");
                transitions.throttle_detected = true;
            }
            if undervoltage_rose {
                warn!("Undervoltage detected; check power supply");
                transitions.undervoltage_detected = true;
            }

            self.last_throttled = status;
        }

        transitions
    }

    /// Record activity; returns `true` when this call left power saving
    /// (the caller restarts audio and the UI).
    pub fn awaken(&mut self, now: Micros, hooks: &mut (impl PowerHooks + ?Sized)) -> bool {
        self.last_activity = now;

        if self.state == PowerState::Normal {
            return false;
        }

        hooks.set_cpu_speed(CpuSpeed::Maximum);
        self.state = PowerState::Normal;
        info!("Leaving power saving mode");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::secs_to_micros;

    struct Hooks {
        speed: Option<CpuSpeed>,
        status: u32,
    }

    impl PowerHooks for Hooks {
        fn set_cpu_speed(&mut self, speed: CpuSpeed) {
            self.speed = Some(speed);
        }

        fn throttled_status(&mut self) -> Option<u32> {
            Some(self.status)
        }
    }

    #[test]
    fn test_timeout_enters_power_save_once() {
        let mut pm = PowerManager::new(300);
        let mut hooks = Hooks {
            speed: None,
            status: 0,
        };

        assert!(!pm.update(secs_to_micros(299), &mut hooks).entered_power_save);
        assert_eq!(pm.state(), PowerState::Normal);

        let t = pm.update(secs_to_micros(300), &mut hooks);
        assert!(t.entered_power_save);
        assert_eq!(pm.state(), PowerState::PowerSaving);
        assert_eq!(hooks.speed, Some(CpuSpeed::Low));

        // Already saving: no second transition.
        assert!(!pm.update(secs_to_micros(301), &mut hooks).entered_power_save);
    }

    #[test]
    fn test_awaken_restores_full_speed() {
        let mut pm = PowerManager::new(1);
        let mut hooks = Hooks {
            speed: None,
            status: 0,
        };
        pm.update(secs_to_micros(2), &mut hooks);
        assert_eq!(pm.state(), PowerState::PowerSaving);

        assert!(pm.awaken(secs_to_micros(3), &mut hooks));
        assert_eq!(pm.state(), PowerState::Normal);
        assert_eq!(hooks.speed, Some(CpuSpeed::Maximum));

        // Awaken in Normal state just stamps activity.
        assert!(!pm.awaken(secs_to_micros(4), &mut hooks));
    }

    #[test]
    fn test_zero_timeout_never_saves() {
        let mut pm = PowerManager::new(0);
        let mut hooks = Hooks {
            speed: None,
            status: 0,
        };
        assert!(!pm.update(secs_to_micros(9999), &mut hooks).entered_power_save);
    }

    #[test]
    fn test_throttle_bits_fire_on_rising_edge_only() {
        let mut pm = PowerManager::new(0);
        let mut hooks = Hooks {
            speed: None,
            status: 0,
        };

        assert!(!pm.update(1, &mut hooks).throttle_detected);

        hooks.status = 1 << 18;
        let t = pm.update(2, &mut hooks);
        assert!(t.throttle_detected);
        assert!(!t.undervoltage_detected);

        // Still set: no new edge.
        assert!(!pm.update(3, &mut hooks).throttle_detected);

        hooks.status |= 1 << 16;
        assert!(pm.update(4, &mut hooks).undervoltage_detected);
    }
}
