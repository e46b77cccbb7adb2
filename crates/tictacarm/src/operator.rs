//! Yes/no questions and free-text prompts for the person running the rig.

use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// Someone who can answer questions at the console.
#[async_trait::async_trait]
pub trait Operator: Send + Sync {
    /// Asks a yes/no question. Anything but `y`/`yes` is a no.
    async fn confirm(&self, question: &str) -> bool {
        self.ask(&format!("{} (y/n): ", question))
            .await
            .map(|answer| matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
            .unwrap_or(false)
    }

    /// Asks for a line of text. `None` when input is closed.
    async fn ask(&self, prompt: &str) -> Option<String>;

    /// Shows a line of output.
    fn say(&self, message: &str);
}

/// Operator on stdin/stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleOperator;

#[async_trait::async_trait]
impl Operator for ConsoleOperator {
    async fn ask(&self, prompt: &str) -> Option<String> {
        print!("{}", prompt);
        let _ = std::io::stdout().flush();
        read_line_off_runtime(|| std::io::stdin().lock()).await
    }

    fn say(&self, message: &str) {
        println!("{}", message);
    }
}

/// Reads one line on its own thread so the runtime keeps running and the
/// wait can be cancelled. A cancelled read is left behind.
async fn read_line_off_runtime<R, F>(open: F) -> Option<String>
where
    F: FnOnce() -> R + Send + 'static,
    R: BufRead,
{
    let (tx, rx) = tokio::sync::oneshot::channel();
    let spawned = std::thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            let _ = tx.send(read_answer(&mut open()));
        });
    if let Err(e) = spawned {
        warn!(error = %e, "Failed to start stdin reader");
        return None;
    }
    rx.await.ok().flatten()
}

/// One line from `reader` without its line ending. `None` at end of input.
fn read_answer(reader: &mut impl BufRead) -> Option<String> {
    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
    }
}

/// Operator that answers from a list, for tests and unattended runs.
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    answers: Mutex<VecDeque<String>>,
    transcript: Mutex<Vec<String>>,
}

impl ScriptedOperator {
    /// Creates an operator that gives `answers` in order.
    pub fn new<S: Into<String>>(answers: impl IntoIterator<Item = S>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            transcript: Mutex::new(Vec::new()),
        }
    }

    /// Every prompt and message shown so far.
    pub fn transcript(&self) -> Vec<String> {
        self.transcript.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record(&self, line: &str) {
        self.transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
}

#[async_trait::async_trait]
impl Operator for ScriptedOperator {
    async fn ask(&self, prompt: &str) -> Option<String> {
        self.record(prompt);
        let answer = self
            .answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        debug!(prompt, answer = ?answer, "Scripted answer");
        answer
    }

    fn say(&self, message: &str) {
        self.record(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    #[tokio::test]
    async fn test_confirm_accepts_only_yes() {
        let op = ScriptedOperator::new(["y", "Yes", "n", "maybe"]);
        assert!(op.confirm("Continue?").await);
        assert!(op.confirm("Continue?").await);
        assert!(!op.confirm("Continue?").await);
        assert!(!op.confirm("Continue?").await);
        // Out of answers.
        assert!(!op.confirm("Continue?").await);
        assert_eq!(op.transcript()[0], "Continue? (y/n): ");
    }

    #[test]
    fn test_read_answer_strips_line_endings() {
        let mut input = Cursor::new("3\r\nsk-key\nlast");
        assert_eq!(read_answer(&mut input).as_deref(), Some("3"));
        assert_eq!(read_answer(&mut input).as_deref(), Some("sk-key"));
        assert_eq!(read_answer(&mut input).as_deref(), Some("last"));
        assert_eq!(read_answer(&mut input), None);
    }

    #[tokio::test]
    async fn test_console_read_leaves_runtime_free() {
        let ticker = tokio::spawn(tokio::time::sleep(Duration::from_millis(5)));
        let answer = read_line_off_runtime(|| {
            std::thread::sleep(Duration::from_millis(200));
            Cursor::new("2\n")
        })
        .await;
        assert_eq!(answer.as_deref(), Some("2"));
        assert!(ticker.is_finished());
    }

    #[tokio::test]
    async fn test_unanswered_read_can_be_abandoned() {
        let asked = tokio::select! {
            answer = read_line_off_runtime(|| {
                std::thread::sleep(Duration::from_secs(5));
                Cursor::new("")
            }) => Some(answer),
            _ = tokio::time::sleep(Duration::from_millis(10)) => None,
        };
        assert!(asked.is_none());
    }
}
