//! The lookup control.
//!
//! Owns the [`ControlState`] and coordinates the selection transitions, the
//! debounce, the search orchestrator and the presenter. All mutation happens
//! on whichever task drives the control: user and host calls run directly,
//! while timer fires and search completions arrive on the event queue and are
//! applied by [`LookupControl::process_next`]. Hosts that prefer message
//! passing post [`UserEvent`]s through a [`ControlHandle`] and drive
//! [`LookupControl::run`].
//!
//! Timers and searches are spawned onto the current Tokio runtime, so the
//! control must be used from within one.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;
use tracing::{debug, info, trace};

use crate::config::LookupConfig;
use crate::model::types::{ControlState, SearchState, SelectionPhase, SelectionRecord};
use crate::search::debounce::{DebounceOutcome, DebounceScheduler, DelayedTask};
use crate::search::orchestrator::{RecordSearch, Resolution, SearchOrchestrator};
use crate::search::query::QueryTemplate;
use crate::selection::Notify;
use crate::ui::event::{ControlEvent, Key, UserEvent};
use crate::ui::presenter::{ResultRow, present};

/// Receives the serialized output each time a committed mutation changes it.
pub trait ChangeListener: Send {
    fn output_changed(&mut self, output: &str);
}

impl<F: FnMut(&str) + Send> ChangeListener for F {
    fn output_changed(&mut self, output: &str) {
        self(output)
    }
}

/// Cloneable sender for posting user and host events to a running control.
#[derive(Clone, Debug)]
pub struct ControlHandle {
    tx: UnboundedSender<ControlEvent>,
}

impl ControlHandle {
    /// Returns `false` once the control has been torn down.
    pub fn send(&self, event: UserEvent) -> bool {
        self.tx.send(ControlEvent::User(event)).is_ok()
    }

    pub fn set_text(&self, text: impl Into<String>) -> bool {
        self.send(UserEvent::SetText(text.into()))
    }

    pub fn key(&self, key: Key) -> bool {
        self.send(UserEvent::Key(key))
    }
}

/// Serializable view of the control for hosts and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlSnapshot {
    pub text: String,
    pub output: String,
    pub phase: SelectionPhase,
    pub search: &'static str,
    pub loading: bool,
    pub focused: bool,
    pub rows: Vec<ResultRow>,
}

pub struct LookupControl<S> {
    config: LookupConfig,
    template: QueryTemplate,
    state: ControlState,
    scheduler: DebounceScheduler,
    blur_timer: DelayedTask,
    orchestrator: SearchOrchestrator<S>,
    listener: Option<Box<dyn ChangeListener>>,
    tx: UnboundedSender<ControlEvent>,
    events: UnboundedReceiver<ControlEvent>,
    focused: bool,
    torn_down: bool,
}

impl<S: RecordSearch> LookupControl<S> {
    /// Host lifecycle entry point. `initial` is the persisted serialized
    /// selection; anything unparsable starts empty.
    pub fn initialize(
        service: Arc<S>,
        initial: &str,
        template: impl Into<QueryTemplate>,
        config: LookupConfig,
    ) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        let state = ControlState::initialize(initial);
        debug!(
            has_selection = state.selection().is_some(),
            "control_initialized"
        );
        Self {
            scheduler: DebounceScheduler::new(config.debounce, config.min_search_chars, tx.clone()),
            blur_timer: DelayedTask::new(),
            orchestrator: SearchOrchestrator::new(service, tx.clone()),
            template: template.into(),
            config,
            state,
            listener: None,
            tx,
            events,
            focused: false,
            torn_down: false,
        }
    }

    pub fn with_listener(mut self, listener: impl ChangeListener + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn handle(&self) -> ControlHandle {
        ControlHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn config(&self) -> &LookupConfig {
        &self.config
    }

    pub fn template(&self) -> &QueryTemplate {
        &self.template
    }

    /// Serialized selection; empty when nothing is selected.
    pub fn output(&self) -> String {
        self.state.output()
    }

    pub fn rows(&self) -> Vec<ResultRow> {
        present(&self.state.search, self.config.max_results)
    }

    pub fn is_loading(&self) -> bool {
        self.orchestrator.is_loading()
    }

    pub fn is_open(&self) -> bool {
        self.state.search.is_open()
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        ControlSnapshot {
            text: self.state.raw_text.clone(),
            output: self.output(),
            phase: self.state.phase(),
            search: self.state.search.label(),
            loading: self.is_loading(),
            focused: self.focused,
            rows: self.rows(),
        }
    }

    // -------------------------------------------------------------------------
    // User input
    // -------------------------------------------------------------------------

    /// A keystroke: the whole current input text. Results for older text
    /// are dropped while the debounce runs.
    pub fn set_text(&mut self, text: &str) {
        if self.torn_down {
            return;
        }
        if self.state.apply_text(text) == Notify::Host {
            debug!("selection_invalidated_by_typing");
            self.notify();
        }
        self.orchestrator.neutralize();
        self.scheduler.schedule(text);
        self.state.search = SearchState::Debouncing;
    }

    /// Focus searches immediately with the current text.
    pub fn focus(&mut self) {
        if self.torn_down {
            return;
        }
        self.focused = true;
        self.blur_timer.cancel();
        self.search_now();
    }

    /// Results close after the grace delay unless focus comes back first.
    pub fn blur(&mut self) {
        if self.torn_down {
            return;
        }
        self.focused = false;
        self.blur_timer
            .arm(self.config.blur_grace, &self.tx, |seq| {
                ControlEvent::BlurGraceElapsed { seq }
            });
    }

    pub fn key(&mut self, key: Key) {
        if self.torn_down {
            return;
        }
        match key {
            Key::Enter => self.search_now(),
            Key::Escape => self.close_results(),
        }
    }

    /// Pointer went down outside the control's region.
    pub fn pointer_down_outside(&mut self) {
        if self.torn_down {
            return;
        }
        self.close_results();
    }

    /// Commit the row at `index`. Returns `false` for placeholder rows or
    /// indices past the end.
    pub fn select_row(&mut self, index: usize) -> bool {
        match self.rows().get(index).and_then(ResultRow::selection) {
            Some(record) => {
                self.commit(record);
                true
            }
            None => false,
        }
    }

    pub fn commit(&mut self, record: SelectionRecord) {
        if self.torn_down {
            return;
        }
        self.cancel_search();
        info!(id = record.id(), "selection_committed");
        let notify = self.state.apply_commit(record);
        if notify == Notify::Host {
            self.notify();
        }
    }

    pub fn clear(&mut self) {
        if self.torn_down {
            return;
        }
        self.cancel_search();
        info!("selection_cleared");
        if self.state.apply_clear() == Notify::Host {
            self.notify();
        }
    }

    // -------------------------------------------------------------------------
    // Host lifecycle
    // -------------------------------------------------------------------------

    /// Host pushed a canonical value. Echoes of the current selection are
    /// ignored so they never wipe text being typed.
    pub fn on_host_value_change(&mut self, serialized: &str) {
        if self.torn_down {
            return;
        }
        let incoming = SelectionRecord::parse(serialized);
        if incoming.as_ref() == self.state.selection() {
            trace!("host_value_unchanged");
            return;
        }
        debug!(has_selection = incoming.is_some(), "host_value_applied");
        self.state.apply_external(serialized);
        self.close_results();
    }

    /// Host changed the query template. Resets search, and clears any
    /// selection made against the old template.
    pub fn on_host_config_change(&mut self, template: impl Into<QueryTemplate>) {
        if self.torn_down {
            return;
        }
        let template = template.into();
        if template == self.template {
            return;
        }
        debug!(disabled = template.is_disabled(), "template_changed");
        self.template = template;
        self.close_results();
        if self.state.selection.is_some() {
            self.clear();
        }
    }

    /// Abandon timers and in-flight requests. Idempotent.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.scheduler.cancel();
        self.blur_timer.cancel();
        self.orchestrator.neutralize();
        self.events.close();
        self.listener = None;
        info!("control_teardown");
    }

    // -------------------------------------------------------------------------
    // Event loop
    // -------------------------------------------------------------------------

    /// Wait for and apply one queued event. Returns `false` once torn down.
    pub async fn process_next(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        match self.events.recv().await {
            Some(event) => {
                self.dispatch(event);
                !self.torn_down
            }
            None => false,
        }
    }

    /// Apply events until none arrives for `quiet`.
    pub async fn settle(&mut self, quiet: Duration) {
        while let Ok(true) = tokio::time::timeout(quiet, self.process_next()).await {}
    }

    /// Apply events as they arrive for `duration`.
    pub async fn run_for(&mut self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while let Ok(true) = tokio::time::timeout_at(deadline, self.process_next()).await {}
    }

    /// Apply events until torn down (via [`UserEvent::Teardown`]).
    pub async fn run(mut self) {
        while self.process_next().await {}
    }

    fn dispatch(&mut self, event: ControlEvent) {
        if self.torn_down {
            return;
        }
        match event {
            ControlEvent::User(user) => self.apply_user(user),
            ControlEvent::DebounceElapsed { seq, text } => {
                match self.scheduler.fire(seq, &text) {
                    DebounceOutcome::Search(text) => self.start_search(&text),
                    DebounceOutcome::CloseResults => self.close_results(),
                    DebounceOutcome::Superseded => trace!(seq, "debounce_superseded"),
                }
            }
            ControlEvent::BlurGraceElapsed { seq } => {
                if self.blur_timer.take_fired(seq) && !self.focused {
                    self.close_results();
                }
            }
            ControlEvent::SearchResolved { token, outcome } => {
                match self.orchestrator.resolve(token, outcome) {
                    Resolution::Stale => {}
                    Resolution::Results(records) => {
                        self.state.search = SearchState::Displaying(records);
                    }
                    Resolution::Failed(_) => self.state.search = SearchState::Failed,
                }
            }
        }
    }

    fn apply_user(&mut self, event: UserEvent) {
        match event {
            UserEvent::SetText(text) => self.set_text(&text),
            UserEvent::Focus => self.focus(),
            UserEvent::Blur => self.blur(),
            UserEvent::Key(key) => self.key(key),
            UserEvent::PointerDownOutside => self.pointer_down_outside(),
            UserEvent::SelectRow(index) => {
                if !self.select_row(index) {
                    debug!(index, "select_row_ignored");
                }
            }
            UserEvent::Clear => self.clear(),
            UserEvent::HostValueChanged(value) => self.on_host_value_change(&value),
            UserEvent::HostTemplateChanged(template) => self.on_host_config_change(template),
            UserEvent::Teardown => self.teardown(),
        }
    }

    /// Focus and Enter bypass the debounce.
    fn search_now(&mut self) {
        self.scheduler.cancel();
        let text = self.state.raw_text.trim().to_string();
        self.start_search(&text);
    }

    fn start_search(&mut self, text: &str) {
        match self
            .orchestrator
            .search(text, &self.template, self.config.min_search_chars)
        {
            Ok(token) => self.state.search = SearchState::InFlight(token),
            Err(skipped) => {
                debug!(?skipped, "search_skipped");
                self.close_results();
            }
        }
    }

    fn cancel_search(&mut self) {
        self.scheduler.cancel();
        self.orchestrator.neutralize();
    }

    fn close_results(&mut self) {
        self.cancel_search();
        self.state.close_results();
    }

    fn notify(&mut self) {
        let output = self.state.output();
        if let Some(listener) = self.listener.as_mut() {
            listener.output_changed(&output);
        }
    }
}
