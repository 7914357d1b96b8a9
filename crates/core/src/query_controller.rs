use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::classifier::classify;
use crate::error_presenter::{self, ErrorOrigin, RenderedError, NETWORK_ERROR_FALLBACK};
use crate::models::QueryResponse;
use crate::table_renderer::{render_result, RenderedResult};

/// The remote call could not be completed or its body could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .message.as_deref().unwrap_or(NETWORK_ERROR_FALLBACK))]
pub struct TransportError {
    message: Option<String>,
}

impl TransportError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }

    /// A failure with nothing worth showing beyond the generic fallback.
    #[must_use]
    pub fn unreachable() -> Self {
        Self { message: None }
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

#[async_trait]
pub trait QueryService: Send + Sync {
    /// Sends `sql` to `/sql/query` and returns the decoded body verbatim.
    async fn execute(&self, sql: &str) -> Result<Value, TransportError>;
}

/// Presentation capability the controller writes into.
pub trait ResultsSurface: Send + Sync {
    fn show_loading(&self);
    fn show_result(&self, rendered: &RenderedResult);
    fn show_error(&self, rendered: &RenderedError);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DisplayState {
    pub phase: Phase,
    pub last_exec_time_ms: u64,
    pub last_error_message: Option<String>,
}

/// Generation stamp handed out by [`QueryController::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct QueryTicket(u64);

impl QueryTicket {
    #[must_use]
    pub fn generation(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied(Phase),
    Discarded { ticket: QueryTicket, latest: u64 },
}

#[derive(Debug, Default)]
struct ControllerState {
    display: DisplayState,
    latest_generation: u64,
}

/// Owns the session's [`DisplayState`]. Only the response for the most
/// recently issued ticket is applied; older responses are dropped.
#[derive(Debug)]
pub struct QueryController<S: QueryService, R: ResultsSurface> {
    service: S,
    surface: R,
    state: Mutex<ControllerState>,
}

impl<S: QueryService, R: ResultsSurface> QueryController<S, R> {
    #[must_use]
    pub fn new(service: S, surface: R) -> Self {
        Self {
            service,
            surface,
            state: Mutex::new(ControllerState::default()),
        }
    }

    #[must_use]
    pub fn state(&self) -> DisplayState {
        self.lock().display.clone()
    }

    #[must_use]
    pub fn surface(&self) -> &R {
        &self.surface
    }

    /// Submits `sql` as-is (no local validation) and applies the outcome.
    pub async fn submit(&self, sql: &str) -> Transition {
        let ticket = self.begin(sql);
        self.resolve(ticket, sql).await
    }

    /// Runs the remote call for a ticket already issued by [`Self::begin`].
    pub async fn resolve(&self, ticket: QueryTicket, sql: &str) -> Transition {
        match self.service.execute(sql).await {
            Ok(raw) => self.on_success(ticket, &raw),
            Err(error) => self.on_failure(ticket, &error),
        }
    }

    pub fn begin(&self, sql: &str) -> QueryTicket {
        let mut state = self.lock();
        state.latest_generation += 1;
        state.display.phase = Phase::Loading;
        self.surface.show_loading();

        let ticket = QueryTicket(state.latest_generation);
        debug!(generation = ticket.0, sql_len = sql.len(), "query submitted");
        ticket
    }

    pub fn on_success(&self, ticket: QueryTicket, raw: &Value) -> Transition {
        let mut state = self.lock();
        if let Some(discarded) = stale(&state, ticket) {
            return discarded;
        }

        match classify(raw) {
            QueryResponse::Table(result) => {
                let rendered = render_result(&result);
                self.surface.show_result(&rendered);
                state.display = DisplayState {
                    phase: Phase::Success,
                    last_exec_time_ms: result.exec_time_ms,
                    last_error_message: None,
                };
                Transition::Applied(Phase::Success)
            }
            QueryResponse::Error { error_message } => {
                let rendered =
                    error_presenter::render(Some(&error_message), ErrorOrigin::Service, 0);
                self.apply_failure(&mut state, &rendered)
            }
        }
    }

    pub fn on_failure(&self, ticket: QueryTicket, error: &TransportError) -> Transition {
        let mut state = self.lock();
        if let Some(discarded) = stale(&state, ticket) {
            return discarded;
        }

        let rendered = error_presenter::render(error.message(), ErrorOrigin::Transport, 0);
        self.apply_failure(&mut state, &rendered)
    }

    /// Returns to `Idle` and invalidates any ticket still in flight.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.latest_generation += 1;
        state.display = DisplayState::default();
    }

    fn apply_failure(
        &self,
        state: &mut MutexGuard<'_, ControllerState>,
        rendered: &RenderedError,
    ) -> Transition {
        self.surface.show_error(rendered);
        state.display = DisplayState {
            phase: Phase::Failure,
            last_exec_time_ms: rendered.badge.exec_time_ms,
            last_error_message: Some(rendered.message.clone()),
        };
        Transition::Applied(Phase::Failure)
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn stale(state: &ControllerState, ticket: QueryTicket) -> Option<Transition> {
    if ticket.0 == state.latest_generation {
        return None;
    }
    debug!(
        generation = ticket.0,
        latest = state.latest_generation,
        "discarding stale query response"
    );
    Some(Transition::Discarded {
        ticket,
        latest: state.latest_generation,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use serde_json::{json, Value};
    use tokio::sync::oneshot;

    use super::{
        DisplayState, Phase, QueryController, QueryService, ResultsSurface, TransportError,
        Transition,
    };
    use crate::error_presenter::RenderedError;
    use crate::table_renderer::{RenderedResult, RenderedTable};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Shown {
        Loading,
        Result(RenderedResult),
        Error(RenderedError),
    }

    #[derive(Debug, Default)]
    struct RecordingSurface {
        shown: Mutex<Vec<Shown>>,
    }

    impl RecordingSurface {
        fn shown(&self) -> Vec<Shown> {
            self.shown.lock().expect("surface lock").clone()
        }
    }

    impl ResultsSurface for RecordingSurface {
        fn show_loading(&self) {
            self.shown.lock().expect("surface lock").push(Shown::Loading);
        }

        fn show_result(&self, rendered: &RenderedResult) {
            self.shown
                .lock()
                .expect("surface lock")
                .push(Shown::Result(rendered.clone()));
        }

        fn show_error(&self, rendered: &RenderedError) {
            self.shown
                .lock()
                .expect("surface lock")
                .push(Shown::Error(rendered.clone()));
        }
    }

    #[derive(Debug, Default)]
    struct ScriptedService {
        replies: Mutex<VecDeque<Result<Value, TransportError>>>,
        seen: Mutex<Vec<String>>,
    }

    impl ScriptedService {
        fn replying(replies: Vec<Result<Value, TransportError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl QueryService for ScriptedService {
        async fn execute(&self, sql: &str) -> Result<Value, TransportError> {
            self.seen.lock().expect("seen lock").push(sql.to_string());
            self.replies
                .lock()
                .expect("replies lock")
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::unreachable()))
        }
    }

    /// Replies only once the test releases the matching gate.
    #[derive(Debug, Default)]
    struct GatedService {
        gates: Mutex<VecDeque<oneshot::Receiver<Value>>>,
    }

    #[async_trait::async_trait]
    impl QueryService for GatedService {
        async fn execute(&self, _sql: &str) -> Result<Value, TransportError> {
            let gate = self
                .gates
                .lock()
                .expect("gates lock")
                .pop_front()
                .expect("a gate per submission");
            gate.await.map_err(|_| TransportError::unreachable())
        }
    }

    fn table_reply(exec_time_ms: u64) -> Value {
        json!({
            "type": "TABLE",
            "data": { "columns": ["a"], "rows": [[1]], "count": 1, "execTimeMs": exec_time_ms }
        })
    }

    #[tokio::test]
    async fn table_reply_transitions_to_success() {
        let controller = QueryController::new(
            ScriptedService::replying(vec![Ok(table_reply(9))]),
            RecordingSurface::default(),
        );
        assert_eq!(controller.state(), DisplayState::default());

        let transition = controller.submit("SELECT 1").await;

        assert_eq!(transition, Transition::Applied(Phase::Success));
        let state = controller.state();
        assert_eq!(state.phase, Phase::Success);
        assert_eq!(state.last_exec_time_ms, 9);
        assert_eq!(state.last_error_message, None);

        let shown = controller.surface().shown();
        assert_eq!(shown[0], Shown::Loading);
        let Shown::Result(rendered) = &shown[1] else {
            panic!("expected a rendered result");
        };
        assert!(matches!(rendered.table, RenderedTable::Table(_)));
    }

    #[tokio::test]
    async fn service_error_transitions_to_failure_with_zero_time() {
        let controller = QueryController::new(
            ScriptedService::replying(vec![Ok(
                json!({ "type": "ERROR", "data": { "errorMessage": "X" } }),
            )]),
            RecordingSurface::default(),
        );

        let transition = controller.submit("SELEC 1").await;

        assert_eq!(transition, Transition::Applied(Phase::Failure));
        let state = controller.state();
        assert_eq!(state.phase, Phase::Failure);
        assert_eq!(state.last_error_message.as_deref(), Some("X"));
        assert_eq!(state.last_exec_time_ms, 0);
        let shown = controller.surface().shown();
        let Shown::Error(rendered) = &shown[1] else {
            panic!("expected an error panel");
        };
        assert_eq!(rendered.message, "X");
    }

    #[tokio::test]
    async fn transport_failure_without_message_uses_network_fallback() {
        let controller = QueryController::new(
            ScriptedService::replying(vec![Err(TransportError::unreachable())]),
            RecordingSurface::default(),
        );

        controller.submit("SELECT 1").await;

        let state = controller.state();
        assert_eq!(state.phase, Phase::Failure);
        assert_eq!(
            state.last_error_message.as_deref(),
            Some("Network error occurred")
        );
        assert_eq!(state.last_exec_time_ms, 0);
    }

    #[tokio::test]
    async fn transport_failure_message_is_shown_when_present() {
        let controller = QueryController::new(
            ScriptedService::replying(vec![Err(TransportError::new("HTTP status 502"))]),
            RecordingSurface::default(),
        );

        controller.submit("SELECT 1").await;

        assert_eq!(
            controller.state().last_error_message.as_deref(),
            Some("HTTP status 502")
        );
    }

    #[tokio::test]
    async fn empty_text_is_still_forwarded() {
        let service = ScriptedService::replying(vec![Ok(
            json!({ "type": "ERROR", "data": { "errorMessage": "SQL query is required" } }),
        )]);
        let controller = QueryController::new(service, RecordingSurface::default());

        controller.submit("").await;

        assert_eq!(
            controller.service.seen.lock().expect("seen lock").as_slice(),
            &[String::new()]
        );
        assert_eq!(controller.state().phase, Phase::Failure);
    }

    #[tokio::test]
    async fn resubmission_from_failure_reenters_loading_then_success() {
        let controller = QueryController::new(
            ScriptedService::replying(vec![
                Err(TransportError::unreachable()),
                Ok(table_reply(4)),
            ]),
            RecordingSurface::default(),
        );

        controller.submit("SELECT 1").await;
        assert_eq!(controller.state().phase, Phase::Failure);

        let ticket = controller.begin("SELECT 1");
        assert_eq!(controller.state().phase, Phase::Loading);
        let transition = controller.on_success(ticket, &table_reply(4));
        assert_eq!(transition, Transition::Applied(Phase::Success));
        assert_eq!(controller.state().last_error_message, None);
    }

    #[tokio::test]
    async fn stale_response_is_discarded_when_newer_submission_exists() {
        let (first_tx, first_rx) = oneshot::channel();
        let (second_tx, second_rx) = oneshot::channel();
        let service = GatedService {
            gates: Mutex::new(VecDeque::from([first_rx, second_rx])),
        };
        let controller = QueryController::new(service, RecordingSurface::default());

        let first = controller.submit("SELECT 1");
        let second = controller.submit("SELECT 2");
        let release = async {
            tokio::task::yield_now().await;
            second_tx.send(table_reply(2)).expect("second gate open");
            tokio::task::yield_now().await;
            first_tx.send(table_reply(1)).expect("first gate open");
        };
        let (first, second, ()) = tokio::join!(first, second, release);

        assert_eq!(second, Transition::Applied(Phase::Success));
        assert!(matches!(first, Transition::Discarded { latest: 2, .. }));
        assert_eq!(controller.state().last_exec_time_ms, 2);
    }

    #[tokio::test]
    async fn clear_returns_to_idle_and_invalidates_in_flight_ticket() {
        let controller = QueryController::new(
            ScriptedService::replying(Vec::new()),
            RecordingSurface::default(),
        );

        let ticket = controller.begin("SELECT 1");
        controller.clear();
        let transition = controller.on_failure(ticket, &TransportError::unreachable());

        assert!(matches!(transition, Transition::Discarded { .. }));
        assert_eq!(controller.state(), DisplayState::default());
    }

    #[tokio::test]
    async fn clear_between_begin_and_resolve_drops_the_reply() {
        let controller = QueryController::new(
            ScriptedService::replying(vec![Ok(table_reply(3))]),
            RecordingSurface::default(),
        );

        let ticket = controller.begin("SELECT 1");
        controller.clear();
        let transition = controller.resolve(ticket, "SELECT 1").await;

        assert!(matches!(transition, Transition::Discarded { latest: 2, .. }));
        assert_eq!(controller.state(), DisplayState::default());
        assert_eq!(controller.surface().shown(), vec![Shown::Loading]);
    }
}
