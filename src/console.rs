use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

/// Operator I/O used by a session.
pub trait Console {
    fn print_line(&mut self, message: &str) -> Result<()>;

    /// Shows `message` and reads one line; `None` once input is closed.
    fn prompt_line(&mut self, message: &str) -> Result<Option<String>>;
}

#[derive(Debug, Default)]
pub struct TerminalConsole;

impl Console for TerminalConsole {
    fn print_line(&mut self, message: &str) -> Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{message}")?;
        Ok(())
    }

    fn prompt_line(&mut self, message: &str) -> Result<Option<String>> {
        {
            let mut stdout = io::stdout().lock();
            write!(stdout, "{message}")?;
            stdout.flush()?;
        }
        let mut input = String::new();
        let bytes = io::stdin()
            .lock()
            .read_line(&mut input)
            .context("reading answer")?;
        if bytes == 0 {
            return Ok(None);
        }
        Ok(Some(input))
    }
}

/// Replays canned answers and records everything shown.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    answers: std::collections::VecDeque<String>,
    pub output: Vec<String>,
    pub prompts: Vec<String>,
}

#[cfg(test)]
impl ScriptedConsole {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|answer| answer.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn transcript(&self) -> String {
        self.output.join("\n")
    }
}

#[cfg(test)]
impl Console for ScriptedConsole {
    fn print_line(&mut self, message: &str) -> Result<()> {
        self.output.push(message.to_string());
        Ok(())
    }

    fn prompt_line(&mut self, message: &str) -> Result<Option<String>> {
        self.prompts.push(message.to_string());
        Ok(self.answers.pop_front())
    }
}
