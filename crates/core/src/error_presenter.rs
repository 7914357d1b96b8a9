use crate::badge::TimingBadge;
use crate::classifier::QUERY_ERROR_FALLBACK;
use crate::markup::escape_html;

pub const NETWORK_ERROR_FALLBACK: &str = "Network error occurred";
pub const REMEDIATION_HINT: &str = "Try one of the sample queries to get started!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorOrigin {
    /// The service answered with an `ERROR` envelope.
    Service,
    /// The call itself could not be completed or decoded.
    Transport,
}

impl ErrorOrigin {
    #[must_use]
    pub fn fallback_message(self) -> &'static str {
        match self {
            Self::Service => QUERY_ERROR_FALLBACK,
            Self::Transport => NETWORK_ERROR_FALLBACK,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedError {
    pub origin: ErrorOrigin,
    pub message: String,
    pub hint: &'static str,
    pub badge: TimingBadge,
}

impl RenderedError {
    #[must_use]
    pub fn headline(&self) -> String {
        format!("❌ Error: {}", self.message)
    }

    #[must_use]
    pub fn to_html(&self) -> String {
        format!(
            "<div style=\"color: #ef4444; font-weight: 600;\">❌ Error: {}</div>",
            escape_html(&self.message)
        )
    }

    #[must_use]
    pub fn stats_html(&self) -> String {
        format!(
            "<h4>❌ Query Error</h4><p><strong>Status:</strong> Failed</p>\
             <p><strong>Tip:</strong> {}</p>",
            escape_html(self.hint)
        )
    }
}

/// Builds the diagnostic panel. Absent or empty messages get the fallback
/// text for their origin.
#[must_use]
pub fn render(message: Option<&str>, origin: ErrorOrigin, exec_time_ms: u64) -> RenderedError {
    let message = message
        .filter(|message| !message.is_empty())
        .unwrap_or(origin.fallback_message())
        .to_string();

    RenderedError {
        origin,
        message,
        hint: REMEDIATION_HINT,
        badge: TimingBadge::failure(exec_time_ms),
    }
}
