//! Monitoring session: the state one monitor owns between settings applies.

use std::time::Duration;

use crate::circuit_breaker::CircuitBreaker;
use crate::rules::RulePolicy;
use crate::voting::CyclePlan;

/// Shortest allowed pause between two ticks.
pub const MIN_INTERVAL: Duration = Duration::from_secs(60);

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a 3D print failure detection system. \
You will receive an image of a 3D print in progress captured from a webcam. \
Analyze the image for signs of failure and respond with ONLY a JSON object: \
{\"status\": \"ok\"} or {\"status\": \"fail\", \"reason\": \"...\"}.";

/// Inputs a session is built from.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Whether monitoring may run at all.
    pub enabled: bool,
    pub interval: Duration,
    pub rounds: u32,
    pub round_delay: Duration,
    /// Minimum spacing between two warnings.
    pub cooldown: Duration,
    pub policy: RulePolicy,
    pub system_prompt: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(5 * 60),
            rounds: 3,
            round_delay: Duration::from_secs(3),
            cooldown: Duration::from_secs(15 * 60),
            policy: RulePolicy::default(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct MonitoringSession {
    running: bool,
    config: SessionConfig,
    breaker: CircuitBreaker,
}

impl MonitoringSession {
    /// Interval is clamped to [`MIN_INTERVAL`], rounds to at least one.
    pub fn new(mut config: SessionConfig) -> Self {
        config.interval = config.interval.max(MIN_INTERVAL);
        config.rounds = config.rounds.max(1);
        Self {
            running: false,
            config,
            breaker: CircuitBreaker::default(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub(crate) fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    pub fn rounds(&self) -> u32 {
        self.config.rounds
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.breaker.failure_count()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub(crate) fn breaker_mut(&mut self) -> &mut CircuitBreaker {
        &mut self.breaker
    }

    pub fn cycle_plan(&self) -> CyclePlan {
        CyclePlan {
            rounds: self.config.rounds,
            round_delay: self.config.round_delay,
            policy: self.config.policy.clone(),
            system_prompt: self.config.system_prompt.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_and_rounds_are_clamped() {
        let session = MonitoringSession::new(SessionConfig {
            interval: Duration::from_secs(5),
            rounds: 0,
            ..Default::default()
        });
        assert_eq!(session.interval(), MIN_INTERVAL);
        assert_eq!(session.rounds(), 1);
        assert!(!session.is_running());
        assert_eq!(session.consecutive_errors(), 0);
    }

    #[test]
    fn test_cycle_plan_mirrors_config() {
        let session = MonitoringSession::new(SessionConfig {
            rounds: 5,
            round_delay: Duration::ZERO,
            ..Default::default()
        });
        let plan = session.cycle_plan();
        assert_eq!(plan.rounds, 5);
        assert_eq!(plan.round_delay, Duration::ZERO);
        assert_eq!(plan.system_prompt, DEFAULT_SYSTEM_PROMPT);
    }
}
