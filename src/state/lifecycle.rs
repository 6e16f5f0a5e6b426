use std::fmt;

/// Lifecycle of a crawl, owned by the coordinator
///
/// `Idle -> Running -> Draining -> Done`. Draining is entered on an explicit
/// stop or when the frontier is exhausted; Done once every in-flight fetch has
/// finished and its result has been emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlState {
    Idle,
    Running,
    Draining,
    Done,
}

impl CrawlState {
    /// Returns true if `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: CrawlState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Running)
                | (Self::Running, Self::Draining)
                | (Self::Draining, Self::Done)
        )
    }

    /// Returns true once no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        assert!(CrawlState::Idle.can_transition_to(CrawlState::Running));
        assert!(CrawlState::Running.can_transition_to(CrawlState::Draining));
        assert!(CrawlState::Draining.can_transition_to(CrawlState::Done));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!CrawlState::Idle.can_transition_to(CrawlState::Done));
        assert!(!CrawlState::Running.can_transition_to(CrawlState::Done));
        assert!(!CrawlState::Done.can_transition_to(CrawlState::Running));
        assert!(!CrawlState::Draining.can_transition_to(CrawlState::Running));
    }

    #[test]
    fn test_terminal() {
        assert!(CrawlState::Done.is_terminal());
        assert!(!CrawlState::Draining.is_terminal());
    }
}
