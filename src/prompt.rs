//! Operator confirmations.
//!
//! Every destructive step (stopping a running node, deleting a non-repository
//! directory, installing over binaries) asks through a [`Prompter`], so the same
//! flows run interactively, unattended with `--yes`, or scripted in tests.

use anyhow::{Context, Result};
use colored::Colorize;
use std::collections::VecDeque;
use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Mutex;

/// Source of operator answers.
pub trait Prompter: Send + Sync {
    /// Ask a yes/no question. An empty answer selects `default`.
    fn confirm(&self, question: &str, default: bool) -> Result<bool>;

    /// Ask for free text. An empty answer selects `default`.
    fn input(&self, question: &str, default: &str) -> Result<String>;
}

/// Reads answers from the controlling terminal.
///
/// When stdin is not a terminal every confirmation is declined, so a cron job
/// never stops a node without `--yes`.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    fn read_answer(prompt: &str) -> Result<Option<String>> {
        if !io::stdin().is_terminal() {
            eprintln!("{} {}", "Non-interactive session, declining:".yellow(), prompt);
            return Ok(None);
        }
        print!("{} ", prompt.green());
        io::stdout().flush()?;
        let mut response = String::new();
        io::stdin().lock().read_line(&mut response).context("Failed to read answer from stdin")?;
        Ok(Some(response.trim().to_string()))
    }
}

impl Prompter for TerminalPrompter {
    fn confirm(&self, question: &str, default: bool) -> Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        let Some(answer) = Self::read_answer(&format!("{question} {hint}:"))? else {
            return Ok(false);
        };
        Ok(parse_yes_no(&answer).unwrap_or(default))
    }

    fn input(&self, question: &str, default: &str) -> Result<String> {
        let prompt = if default.is_empty() {
            format!("{question}:")
        } else {
            format!("{question} [{default}]:")
        };
        let answer = Self::read_answer(&prompt)?.unwrap_or_default();
        Ok(if answer.is_empty() { default.to_string() } else { answer })
    }
}

/// Accepts every confirmation and every default. Backs the `--yes` flag.
#[derive(Debug, Default)]
pub struct AssumeYes;

impl Prompter for AssumeYes {
    fn confirm(&self, question: &str, _default: bool) -> Result<bool> {
        tracing::info!("Auto-confirmed: {}", question);
        Ok(true)
    }

    fn input(&self, _question: &str, default: &str) -> Result<String> {
        Ok(default.to_string())
    }
}

/// Replays a fixed list of answers and records the questions asked.
///
/// Running out of answers is an error, which makes an unexpected prompt fail the
/// test instead of hanging it.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Questions asked so far, in order.
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }

    fn next(&self, question: &str) -> Result<String> {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(question.to_string());
        }
        self.answers
            .lock()
            .map_err(|_| anyhow::anyhow!("prompt script poisoned"))?
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("No scripted answer for prompt: {question}"))
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, question: &str, default: bool) -> Result<bool> {
        let answer = self.next(question)?;
        Ok(parse_yes_no(&answer).unwrap_or(default))
    }

    fn input(&self, question: &str, default: &str) -> Result<String> {
        let answer = self.next(question)?;
        Ok(if answer.trim().is_empty() { default.to_string() } else { answer.trim().to_string() })
    }
}

/// `Some(true)` for y/yes, `Some(false)` for n/no, `None` for anything else.
fn parse_yes_no(answer: &str) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yes_no() {
        assert_eq!(parse_yes_no(" Y "), Some(true));
        assert_eq!(parse_yes_no("yes"), Some(true));
        assert_eq!(parse_yes_no("N"), Some(false));
        assert_eq!(parse_yes_no(""), None);
        assert_eq!(parse_yes_no("maybe"), None);
    }

    #[test]
    fn test_scripted_prompter_replays_and_records() {
        let prompter = ScriptedPrompter::new(["y", "", "v0.3.13"]);
        assert!(prompter.confirm("Stop cardano-node?", false).unwrap());
        assert!(!prompter.confirm("Launch gLiveView?", false).unwrap());
        assert_eq!(prompter.input("Ref for blst", "v0.3.14").unwrap(), "v0.3.13");
        assert_eq!(prompter.asked().len(), 3);
        assert!(prompter.confirm("One too many", true).is_err());
    }

    #[test]
    fn test_assume_yes() {
        assert!(AssumeYes.confirm("Delete and re-clone?", false).unwrap());
        assert_eq!(AssumeYes.input("Ref", "dbb48cc").unwrap(), "dbb48cc");
    }
}
