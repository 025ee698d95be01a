//! Clarification requesters

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RequesterError {
    #[error("No answer available: input closed")]
    Closed,

    #[error("Failed to read answer: {0}")]
    Io(String),
}

/// Whoever answers clarification questions
#[async_trait]
pub trait Requester: Send + Sync {
    async fn ask(&self, question: &str) -> Result<String, RequesterError>;
}

/// Asks on the terminal
#[derive(Debug, Default)]
pub struct ConsoleRequester;

#[async_trait]
impl Requester for ConsoleRequester {
    async fn ask(&self, question: &str) -> Result<String, RequesterError> {
        debug!(%question, "ConsoleRequester::ask: called");
        let question = question.to_string();
        tokio::task::spawn_blocking(move || {
            println!("{} {}", "?".bright_yellow(), question);
            let mut rl = DefaultEditor::new().map_err(|e| RequesterError::Io(e.to_string()))?;
            match rl.readline(&format!("{} ", ">".bright_green())) {
                Ok(line) => Ok(line.trim().to_string()),
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Err(RequesterError::Closed),
                Err(e) => Err(RequesterError::Io(e.to_string())),
            }
        })
        .await
        .map_err(|e| RequesterError::Io(e.to_string()))?
    }
}

/// Answers from a fixed list, recording every question
#[derive(Debug, Default)]
pub struct ScriptedRequester {
    answers: Mutex<VecDeque<String>>,
    questions: Mutex<Vec<String>>,
}

impl ScriptedRequester {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            questions: Mutex::new(Vec::new()),
        }
    }

    /// Questions asked so far, in order
    pub fn questions(&self) -> Vec<String> {
        match self.questions.lock() {
            Ok(q) => q.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Requester for ScriptedRequester {
    async fn ask(&self, question: &str) -> Result<String, RequesterError> {
        debug!(%question, "ScriptedRequester::ask: called");
        if let Ok(mut q) = self.questions.lock() {
            q.push(question.to_string());
        }
        self.answers
            .lock()
            .map_err(|_| RequesterError::Closed)?
            .pop_front()
            .ok_or(RequesterError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_answers_in_order() {
        let requester = ScriptedRequester::new(["Postgres", "Yes"]);
        assert_eq!(requester.ask("Which database?").await.unwrap(), "Postgres");
        assert_eq!(requester.ask("Keep the API?").await.unwrap(), "Yes");
        assert!(matches!(requester.ask("More?").await, Err(RequesterError::Closed)));
        assert_eq!(requester.questions(), vec!["Which database?", "Keep the API?", "More?"]);
    }
}
