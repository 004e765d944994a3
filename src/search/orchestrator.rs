//! Request lifecycle for record searches.
//!
//! Each search gets a fresh [`RequestToken`]; only the most recently issued
//! token is live. The service call runs on a spawned task that posts its
//! outcome back to the control, where [`SearchOrchestrator::resolve`] drops
//! anything that is no longer live. Transports are never cancelled, only
//! neutralized.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::config::meets_min_length;
use crate::model::types::{RawRecord, RequestToken};
use crate::search::query::{BuiltQuery, QueryTemplate};
use crate::ui::event::ControlEvent;

/// Opaque failure reported by a record search transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("record search failed: {message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The external record search service the core calls through.
pub trait RecordSearch: Send + Sync + 'static {
    fn search_records(
        &self,
        query: &BuiltQuery,
    ) -> impl Future<Output = Result<Vec<RawRecord>, TransportError>> + Send;
}

/// Outcome of matching a completed request against the live token.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// A newer request superseded this one, or results were closed.
    Stale,
    Results(Vec<RawRecord>),
    Failed(TransportError),
}

/// Why [`SearchOrchestrator::search`] did not issue a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSkipped {
    TooShort,
    Disabled,
}

pub struct SearchOrchestrator<S> {
    service: Arc<S>,
    last_token: u64,
    live: Option<RequestToken>,
    tx: UnboundedSender<ControlEvent>,
}

impl<S: RecordSearch> SearchOrchestrator<S> {
    pub fn new(service: Arc<S>, tx: UnboundedSender<ControlEvent>) -> Self {
        Self {
            service,
            last_token: 0,
            live: None,
            tx,
        }
    }

    /// Issue a search for `text`. The caller has already trimmed it.
    pub fn search(
        &mut self,
        text: &str,
        template: &QueryTemplate,
        min_search_chars: usize,
    ) -> Result<RequestToken, SearchSkipped> {
        if !meets_min_length(text, min_search_chars) {
            return Err(SearchSkipped::TooShort);
        }
        let Some(query) = template.build(text) else {
            debug!("search_disabled_empty_template");
            return Err(SearchSkipped::Disabled);
        };

        self.last_token += 1;
        let token = RequestToken(self.last_token);
        self.live = Some(token);

        info!(
            token = token.0,
            entity = %query.entity_name,
            query_len = text.chars().count(),
            "search_start"
        );

        let service = Arc::clone(&self.service);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = service.search_records(&query).await;
            // A closed channel means the control was torn down.
            let _ = tx.send(ControlEvent::SearchResolved { token, outcome });
        });

        Ok(token)
    }

    /// Match a completed request against the live token.
    pub fn resolve(
        &mut self,
        token: RequestToken,
        outcome: Result<Vec<RawRecord>, TransportError>,
    ) -> Resolution {
        if self.live != Some(token) {
            debug!(token = token.0, live = ?self.live.map(|t| t.0), "search_stale");
            return Resolution::Stale;
        }
        self.live = None;
        match outcome {
            Ok(records) => {
                debug!(token = token.0, count = records.len(), "search_complete");
                Resolution::Results(records)
            }
            Err(err) => {
                warn!(token = token.0, error = %err, "search_failed");
                Resolution::Failed(err)
            }
        }
    }

    /// Forget the live request so its eventual response is dropped.
    pub fn neutralize(&mut self) {
        if let Some(token) = self.live.take() {
            debug!(token = token.0, "search_neutralized");
        }
    }

    pub fn is_loading(&self) -> bool {
        self.live.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct Recorder {
        queries: Mutex<Vec<BuiltQuery>>,
    }

    impl RecordSearch for Recorder {
        async fn search_records(&self, query: &BuiltQuery) -> Result<Vec<RawRecord>, TransportError> {
            self.queries.lock().push(query.clone());
            if query.text.contains("boom") {
                return Err(TransportError::new("offline"));
            }
            let record = json!({ "id": "1", "name": query.text });
            Ok(record.as_object().cloned().into_iter().collect())
        }
    }

    fn orchestrator() -> (
        SearchOrchestrator<Recorder>,
        Arc<Recorder>,
        mpsc::UnboundedReceiver<ControlEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let service = Arc::new(Recorder::default());
        (SearchOrchestrator::new(Arc::clone(&service), tx), service, rx)
    }

    async fn next_resolution(
        rx: &mut mpsc::UnboundedReceiver<ControlEvent>,
    ) -> (RequestToken, Result<Vec<RawRecord>, TransportError>) {
        match rx.recv().await {
            Some(ControlEvent::SearchResolved { token, outcome }) => (token, outcome),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn tokens_increase_and_only_latest_resolves() {
        let (mut orch, _service, mut rx) = orchestrator();
        let template = QueryTemplate::new("{searchText}");

        let first = orch.search("Ja", &template, 2).unwrap();
        let second = orch.search("Jan", &template, 2).unwrap();
        assert!(second > first);
        assert!(orch.is_loading());

        let mut outcomes = Vec::new();
        for _ in 0..2 {
            let (token, outcome) = next_resolution(&mut rx).await;
            outcomes.push((token, orch.resolve(token, outcome)));
        }
        for (token, resolution) in outcomes {
            if token == first {
                assert_eq!(resolution, Resolution::Stale);
            } else {
                assert!(matches!(resolution, Resolution::Results(ref r) if r.len() == 1));
            }
        }
        assert!(!orch.is_loading());
    }

    #[tokio::test]
    async fn gate_and_disabled_template_skip_the_network() {
        let (mut orch, service, _rx) = orchestrator();
        assert_eq!(
            orch.search("J", &QueryTemplate::new("{searchText}"), 2),
            Err(SearchSkipped::TooShort)
        );
        assert_eq!(
            orch.search(" J ", &QueryTemplate::new("{searchText}"), 2),
            Err(SearchSkipped::TooShort)
        );
        assert_eq!(
            orch.search("Jo", &QueryTemplate::default(), 2),
            Err(SearchSkipped::Disabled)
        );
        tokio::task::yield_now().await;
        assert!(service.queries.lock().is_empty());
        assert!(!orch.is_loading());
    }

    #[tokio::test]
    async fn failure_resolves_once_and_clears_loading() {
        let (mut orch, _service, mut rx) = orchestrator();
        let token = orch.search("boom", &QueryTemplate::new("{searchText}"), 2).unwrap();
        let (resolved, outcome) = next_resolution(&mut rx).await;
        assert_eq!(resolved, token);
        assert_eq!(
            orch.resolve(resolved, outcome),
            Resolution::Failed(TransportError::new("offline"))
        );
        assert!(!orch.is_loading());
    }

    #[tokio::test]
    async fn neutralized_request_is_stale() {
        let (mut orch, _service, mut rx) = orchestrator();
        orch.search("Jo", &QueryTemplate::new("{searchText}"), 2).unwrap();
        orch.neutralize();
        let (token, outcome) = next_resolution(&mut rx).await;
        assert_eq!(orch.resolve(token, outcome), Resolution::Stale);
    }
}
