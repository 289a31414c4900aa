use crate::*;
use chrono::{DateTime, Utc};
use std::fmt;

/// Where "now" falls relative to the voting window
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Upcoming,
    Ongoing,
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Phase::Upcoming => "UPCOMING",
            Phase::Ongoing => "ONGOING",
            Phase::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

/// Evaluates wall-clock time against the configured window
#[derive(Clone, Debug)]
pub struct ElectionClock {
    window: ElectionWindow,
}

impl ElectionClock {
    pub fn new(window: ElectionWindow) -> Self {
        ElectionClock { window }
    }

    pub fn window(&self) -> &ElectionWindow {
        &self.window
    }

    pub fn is_always_open(&self) -> bool {
        self.window.always_open
    }

    /// The phase at `now`. Both ends of the window are inclusive.
    pub fn phase(&self, now: DateTime<Utc>) -> Phase {
        if self.window.always_open {
            return Phase::Ongoing;
        }
        if now < self.window.start {
            Phase::Upcoming
        } else if now > self.window.end {
            Phase::Closed
        } else {
            Phase::Ongoing
        }
    }

    /// Fail with `ElectionNotActive` unless ballots may be cast at `now`
    pub fn ensure_ongoing(&self, now: DateTime<Utc>) -> Result<(), Error> {
        match self.phase(now) {
            Phase::Ongoing => Ok(()),
            phase => Err(Error::ElectionNotActive(phase)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn clock(always_open: bool) -> (ElectionClock, DateTime<Utc>) {
        let start = Utc::now();
        let window = ElectionWindow::new(start, start + Duration::hours(24))
            .with_always_open(always_open);
        (ElectionClock::new(window), start)
    }

    #[test]
    fn phases() {
        let (clock, start) = clock(false);

        assert_eq!(clock.phase(start - Duration::seconds(1)), Phase::Upcoming);
        assert_eq!(clock.phase(start), Phase::Ongoing);
        assert_eq!(clock.phase(start + Duration::hours(24)), Phase::Ongoing);
        assert_eq!(clock.phase(start + Duration::hours(25)), Phase::Closed);

        assert!(matches!(
            clock.ensure_ongoing(start - Duration::days(3)),
            Err(Error::ElectionNotActive(Phase::Upcoming))
        ));
        assert!(matches!(
            clock.ensure_ongoing(start + Duration::days(3)),
            Err(Error::ElectionNotActive(Phase::Closed))
        ));
    }

    #[test]
    fn override_holds_window_open() {
        let (clock, start) = clock(true);

        assert!(clock.is_always_open());
        assert_eq!(clock.phase(start - Duration::days(365)), Phase::Ongoing);
        assert_eq!(clock.phase(start + Duration::days(365)), Phase::Ongoing);
        clock.ensure_ongoing(start - Duration::days(365)).unwrap();
    }

    #[test]
    fn phase_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&Phase::Ongoing).unwrap(), "\"ONGOING\"");
        assert_eq!(Phase::Closed.to_string(), "CLOSED");
    }
}
