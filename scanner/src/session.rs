use std::time::Duration;

use derive_more::Display;

use base::defs::{Error, ErrorKind::*, Result};
use base::util::sync::InFlightLock;

use crate::config::ScanConfig;
use crate::schedule::CancellationToken;

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Scanning,
    Stopping,
}

impl Phase {
    /// The only permitted cycle is Idle, Scanning, Stopping, Idle.
    pub fn can_enter(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Idle, Scanning) | (Scanning, Stopping) | (Stopping, Idle)
        )
    }
}

/// State of the scanning session, owned by the controller.
pub struct ScanSession {
    phase: Phase,
    pub session_duration_budget: Duration,
    pub capture_throttle_interval: Duration,
    capture_lock: InFlightLock,
    auto_stop: Option<CancellationToken>,
}

impl ScanSession {
    pub fn new(config: &ScanConfig) -> Result<Self> {
        Ok(Self {
            phase: Phase::Idle,
            session_duration_budget: config.session_duration()?,
            capture_throttle_interval: config.capture_throttle()?,
            capture_lock: InFlightLock::new(),
            auto_stop: None,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn capture_lock(&self) -> &InFlightLock {
        &self.capture_lock
    }

    pub fn is_capture_in_flight(&self) -> bool {
        self.capture_lock.is_locked()
    }

    pub(crate) fn enter(&mut self, next: Phase) -> Result<()> {
        if !self.phase.can_enter(next) {
            let desc = format!("cannot go from {} to {}", self.phase, next);
            return Err(Error::new(BadOperation, desc));
        }
        self.phase = next;
        Ok(())
    }

    pub(crate) fn arm_auto_stop(&mut self, token: CancellationToken) {
        if let Some(previous) = self.auto_stop.replace(token) {
            previous.cancel();
        }
    }

    pub(crate) fn disarm_auto_stop(&mut self) {
        if let Some(token) = self.auto_stop.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_cycle() {
        let mut session = ScanSession::new(&ScanConfig::default()).unwrap();
        assert_eq!(session.phase(), Phase::Idle);
        assert!(session.enter(Phase::Stopping).is_err());
        assert!(session.enter(Phase::Scanning).is_ok());
        assert_eq!(session.enter(Phase::Idle).unwrap_err().kind, BadOperation);
        assert!(session.enter(Phase::Stopping).is_ok());
        assert!(session.enter(Phase::Scanning).is_err());
        assert!(session.enter(Phase::Idle).is_ok());
        assert_eq!(session.phase(), Phase::Idle);
    }

    #[test]
    fn test_session_from_config() {
        let config = ScanConfig {
            session_duration: 2.0,
            capture_throttle: 0.25,
            ..Default::default()
        };
        let session = ScanSession::new(&config).unwrap();
        assert_eq!(session.session_duration_budget, Duration::from_secs(2));
        assert_eq!(
            session.capture_throttle_interval,
            Duration::from_millis(250)
        );
        assert!(!session.is_capture_in_flight());

        let config = ScanConfig {
            session_duration: -1.0,
            ..Default::default()
        };
        let err = ScanSession::new(&config).err();
        assert_eq!(err.map(|e| e.kind), Some(MalformedData));
    }

    #[test]
    fn test_rearming_cancels_previous_timer() {
        let mut session = ScanSession::new(&ScanConfig::default()).unwrap();
        let first = CancellationToken::default();
        let second = CancellationToken::default();
        session.arm_auto_stop(first.clone());
        session.arm_auto_stop(second.clone());
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        session.disarm_auto_stop();
        assert!(second.is_cancelled());
    }
}
