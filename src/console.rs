//! Drive a registration from stdin, one command per line.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt, stream};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

use crate::error::CompletionError;
use crate::validation::{DebouncedValidator, FieldKind, FieldValidationStatus};
use crate::workflow::{CompletionSink, FormData, StepDefinition, WorkflowStatus};

pub const HELP: &str = "\
Commands:
  field=value   set an answer (JSON arrays/objects and true/false are parsed)
  :next         validate this step and continue
  :back         go to the previous step
  :skip         skip an optional step
  :jump N       go to step N (1-based)
  :status       show progress
  :reset        abandon this registration and start over
  :quit         leave; progress is saved";

/// One line of user input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Set { field: String, value: Value },
    Next,
    Back,
    Skip,
    /// Zero-based target index.
    Jump(usize),
    Status,
    Reset,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix(':') {
        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default();
        return match name {
            "next" | "n" => Ok(Command::Next),
            "back" | "b" => Ok(Command::Back),
            "skip" | "s" => Ok(Command::Skip),
            "status" => Ok(Command::Status),
            "reset" => Ok(Command::Reset),
            "help" | "h" => Ok(Command::Help),
            "quit" | "q" => Ok(Command::Quit),
            "jump" | "j" => {
                let n: usize = parts
                    .next()
                    .ok_or("usage: :jump N")?
                    .parse()
                    .map_err(|_| "step number must be a positive integer".to_string())?;
                n.checked_sub(1)
                    .map(Command::Jump)
                    .ok_or_else(|| "steps are numbered from 1".to_string())
            }
            other => Err(format!("unknown command :{other} (try :help)")),
        };
    }

    match line.split_once('=') {
        Some((field, value)) if !field.trim().is_empty() => Ok(Command::Set {
            field: field.trim().to_string(),
            value: parse_value(value),
        }),
        _ => Err("expected field=value or a :command (try :help)".to_string()),
    }
}

/// Interpret a raw answer. Numbers stay strings so phone numbers keep
/// their leading zeros.
pub fn parse_value(raw: &str) -> Value {
    let raw = raw.trim();
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if (raw.starts_with('[') || raw.starts_with('{'))
        && let Ok(parsed) = serde_json::from_str(raw)
    {
        return parsed;
    }
    Value::String(raw.to_string())
}

/// Prompt text for a step: numbered title plus the fields it collects.
pub fn describe_step(status: &WorkflowStatus, step: &StepDefinition, data: &FormData) -> String {
    let mut out = format!(
        "Step {}/{}: {}{}",
        status.current_index + 1,
        status.total_steps,
        step.title,
        if step.is_optional { " (optional)" } else { "" }
    );
    for field in &step.fields {
        match data.get(field) {
            Some(Value::String(s)) => out.push_str(&format!("\n  {field} = {s}")),
            Some(value) => out.push_str(&format!("\n  {field} = {value}")),
            None => out.push_str(&format!("\n  {field} = ")),
        }
    }
    if let Some(result) = &status.last_validation {
        for (field, message) in &result.errors {
            out.push_str(&format!("\n  ! {field}: {message}"));
        }
    }
    out
}

pub type LineStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Non-empty trimmed lines from stdin until EOF.
pub fn stdin_lines() -> LineStream {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Error reading stdin: {}", e);
                    break;
                }
            }
        }
    });

    Box::pin(stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|line| (line, rx))
    }))
}

/// Print settled availability results as they arrive, one task per field kind.
pub fn spawn_status_watchers(validator: &DebouncedValidator) -> Vec<JoinHandle<()>> {
    FieldKind::ALL
        .into_iter()
        .map(|kind| {
            let mut statuses = validator.status_stream(kind);
            tokio::spawn(async move {
                while let Some(status) = statuses.next().await {
                    match status {
                        FieldValidationStatus::Valid => {
                            eprintln!("  ✓ {} is available", kind.label())
                        }
                        FieldValidationStatus::Invalid { reason } => eprintln!("  ✗ {reason}"),
                        FieldValidationStatus::Idle | FieldValidationStatus::Checking => {}
                    }
                }
            })
        })
        .collect()
}

/// Completion sink that prints the finished registration as JSON.
pub struct StdoutCompletionSink;

#[async_trait]
impl CompletionSink for StdoutCompletionSink {
    async fn complete(&self, kind: &str, data: &FormData) -> Result<(), CompletionError> {
        let payload = json!({ "kind": kind, "data": data });
        let rendered = serde_json::to_string_pretty(&payload)
            .map_err(|e| CompletionError::Rejected(e.to_string()))?;
        println!("{rendered}");
        Ok(())
    }
}
