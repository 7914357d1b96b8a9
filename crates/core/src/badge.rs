use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeKind {
    Success,
    Failure,
}

/// Elapsed-time annotation shown next to every result or error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingBadge {
    pub kind: BadgeKind,
    pub exec_time_ms: u64,
}

impl TimingBadge {
    #[must_use]
    pub fn success(exec_time_ms: u64) -> Self {
        Self {
            kind: BadgeKind::Success,
            exec_time_ms,
        }
    }

    #[must_use]
    pub fn failure(exec_time_ms: u64) -> Self {
        Self {
            kind: BadgeKind::Failure,
            exec_time_ms,
        }
    }
}

impl fmt::Display for TimingBadge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let icon = match self.kind {
            BadgeKind::Success => "⚡",
            BadgeKind::Failure => "❌",
        };
        write!(f, "{icon} {}ms", self.exec_time_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::TimingBadge;

    #[test]
    fn badge_text_matches_outcome() {
        assert_eq!(TimingBadge::success(42).to_string(), "⚡ 42ms");
        assert_eq!(TimingBadge::failure(0).to_string(), "❌ 0ms");
    }
}
