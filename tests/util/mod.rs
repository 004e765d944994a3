use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use lookup_control::model::types::RawRecord;
use lookup_control::search::orchestrator::{RecordSearch, TransportError};
use lookup_control::search::query::BuiltQuery;
use parking_lot::Mutex;
use serde_json::json;

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: Arc<std::sync::Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Assert that the captured log output contains the provided substring.
    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }

    pub fn lines(&self) -> Vec<String> {
        self.output()
            .lines()
            .map(std::string::ToString::to_string)
            .collect()
    }
}

#[allow(dead_code)]
pub struct EnvGuard {
    key: String,
    prev: Option<String>,
}

#[allow(dead_code)]
impl EnvGuard {
    pub fn set(key: &str, val: impl AsRef<str>) -> Self {
        let prev = std::env::var(key).ok();
        unsafe { std::env::set_var(key, val.as_ref()) };
        Self {
            key: key.to_string(),
            prev,
        }
    }

    pub fn unset(key: &str) -> Self {
        let prev = std::env::var(key).ok();
        unsafe { std::env::remove_var(key) };
        Self {
            key: key.to_string(),
            prev,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.prev {
            Some(v) => unsafe { std::env::set_var(&self.key, v) },
            None => unsafe { std::env::remove_var(&self.key) },
        }
    }
}

struct TestWriter(Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Record service keyed on the built query text.
///
/// Every term answers with two records named after it (`"<term> One"`,
/// `"<term> Two"`) after a default 10ms, unless told otherwise.
#[allow(dead_code)]
#[derive(Default)]
pub struct ScriptedSearch {
    delays: HashMap<String, Duration>,
    failures: HashSet<String>,
    empty: HashSet<String>,
    calls: Mutex<Vec<BuiltQuery>>,
}

#[allow(dead_code)]
impl ScriptedSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, term: &str, delay: Duration) -> Self {
        self.delays.insert(term.to_string(), delay);
        self
    }

    pub fn failing(mut self, term: &str) -> Self {
        self.failures.insert(term.to_string());
        self
    }

    pub fn empty(mut self, term: &str) -> Self {
        self.empty.insert(term.to_string());
        self
    }

    pub fn calls(&self) -> Vec<BuiltQuery> {
        self.calls.lock().clone()
    }

    /// Query texts received so far.
    pub fn terms(&self) -> Vec<String> {
        self.calls.lock().iter().map(|q| q.text.clone()).collect()
    }

    pub fn records_for(term: &str) -> Vec<RawRecord> {
        [("1", "One"), ("2", "Two")]
            .into_iter()
            .filter_map(|(n, label)| {
                json!({ "id": format!("{term}-{n}"), "name": format!("{term} {label}") })
                    .as_object()
                    .cloned()
            })
            .collect()
    }
}

impl RecordSearch for ScriptedSearch {
    async fn search_records(&self, query: &BuiltQuery) -> Result<Vec<RawRecord>, TransportError> {
        self.calls.lock().push(query.clone());
        let term = query.text.as_str();
        let delay = self
            .delays
            .get(term)
            .copied()
            .unwrap_or(Duration::from_millis(10));
        tokio::time::sleep(delay).await;
        if self.failures.contains(term) {
            return Err(TransportError::new(format!("service unavailable for {term}")));
        }
        if self.empty.contains(term) {
            return Ok(Vec::new());
        }
        Ok(Self::records_for(term))
    }
}

/// Collects host notifications.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct Notifications(Arc<Mutex<Vec<String>>>);

#[allow(dead_code)]
impl Notifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener(&self) -> impl FnMut(&str) + Send + 'static {
        let sink = Arc::clone(&self.0);
        move |output: &str| sink.lock().push(output.to_string())
    }

    pub fn all(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}
