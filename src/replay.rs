//! Scripted sessions against a lookup control.
//!
//! A script is one step per line; blank lines and `#` comments are skipped:
//!
//! ```text
//! focus
//! type Jo
//! wait 400
//! show
//! pick 0
//! ```
//!
//! Each `show` writes a JSON snapshot line, and every host notification is
//! written as an `output_changed` line as soon as the step that caused it
//! completes.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use parking_lot::Mutex;
use serde::Serialize;

use crate::search::orchestrator::RecordSearch;
use crate::ui::control::{ChangeListener, ControlSnapshot, LookupControl};
use crate::ui::event::Key;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Type(String),
    Wait(Duration),
    Focus,
    Blur,
    Enter,
    Escape,
    Outside,
    Pick(usize),
    Clear,
    Push(String),
    Template(String),
    Show,
    Teardown,
}

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("line {line}: unknown step `{step}`")]
    UnknownStep { line: usize, step: String },

    #[error("line {line}: {message}")]
    InvalidArgument { line: usize, message: String },
}

/// Parse a replay script.
pub fn parse_script(text: &str) -> Result<Vec<(usize, Step)>, ScriptError> {
    let mut steps = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim_start();
        if trimmed.trim().is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let (word, rest) = match trimmed.split_once(' ') {
            Some((word, rest)) => (word, rest),
            None => (trimmed.trim_end(), ""),
        };
        let step = match word {
            "type" => Step::Type(rest.to_string()),
            "wait" => {
                let ms = rest.trim().parse::<u64>().map_err(|_| ScriptError::InvalidArgument {
                    line,
                    message: format!("`wait` needs milliseconds, got `{}`", rest.trim()),
                })?;
                Step::Wait(Duration::from_millis(ms))
            }
            "pick" => {
                let index =
                    rest.trim()
                        .parse::<usize>()
                        .map_err(|_| ScriptError::InvalidArgument {
                            line,
                            message: format!("`pick` needs a row index, got `{}`", rest.trim()),
                        })?;
                Step::Pick(index)
            }
            "focus" => Step::Focus,
            "blur" => Step::Blur,
            "enter" => Step::Enter,
            "escape" => Step::Escape,
            "outside" => Step::Outside,
            "clear" => Step::Clear,
            "push" => Step::Push(rest.trim().to_string()),
            "template" => Step::Template(rest.trim().to_string()),
            "show" => Step::Show,
            "teardown" => Step::Teardown,
            other => {
                return Err(ScriptError::UnknownStep {
                    line,
                    step: other.to_string(),
                });
            }
        };
        steps.push((line, step));
    }
    Ok(steps)
}

/// Collects host notifications so they can be reported in order.
#[derive(Debug, Clone, Default)]
pub struct OutputLog(Arc<Mutex<Vec<String>>>);

impl OutputLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock())
    }
}

impl ChangeListener for OutputLog {
    fn output_changed(&mut self, output: &str) {
        self.0.lock().push(output.to_string());
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ReplayLine {
    Snapshot {
        line: usize,
        #[serde(flatten)]
        snapshot: ControlSnapshot,
    },
    OutputChanged {
        line: usize,
        output: String,
    },
}

/// Run `steps` against `control`, writing JSON lines to `out`.
pub async fn replay<S, W>(
    control: &mut LookupControl<S>,
    steps: &[(usize, Step)],
    log: &OutputLog,
    out: &mut W,
) -> Result<()>
where
    S: RecordSearch,
    W: Write,
{
    for (line, step) in steps {
        tracing::debug!(line, ?step, "replay_step");
        match step {
            Step::Type(text) => control.set_text(text),
            Step::Wait(duration) => control.run_for(*duration).await,
            Step::Focus => control.focus(),
            Step::Blur => control.blur(),
            Step::Enter => control.key(Key::Enter),
            Step::Escape => control.key(Key::Escape),
            Step::Outside => control.pointer_down_outside(),
            Step::Pick(index) => {
                if !control.select_row(*index) {
                    tracing::warn!(line, index, "pick_ignored");
                }
            }
            Step::Clear => control.clear(),
            Step::Push(value) => control.on_host_value_change(value),
            Step::Template(template) => control.on_host_config_change(template.as_str()),
            Step::Show => write_line(
                out,
                &ReplayLine::Snapshot {
                    line: *line,
                    snapshot: control.snapshot(),
                },
            )?,
            Step::Teardown => control.teardown(),
        }
        for output in log.drain() {
            write_line(out, &ReplayLine::OutputChanged { line: *line, output })?;
        }
    }
    out.flush()?;
    Ok(())
}

fn write_line<W: Write>(out: &mut W, line: &ReplayLine) -> Result<()> {
    serde_json::to_writer(&mut *out, line)?;
    out.write_all(b"\n")?;
    Ok(())
}
