use std::io::{self, BufRead, Write};
use std::sync::Mutex;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::engine::error::{ParsagonError, Result};
use crate::interaction::{Tone, UserInteraction};

/// Terminal front end: colored output, line input on stdin.
#[derive(Default)]
pub struct TerminalInteraction {
    progress: Mutex<Option<ProgressBar>>,
}

impl TerminalInteraction {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_line(&self) -> Result<String> {
        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Err(ParsagonError::InputClosed);
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl UserInteraction for TerminalInteraction {
    fn print(&self, tone: Tone, text: &str) {
        let line = match tone {
            Tone::Normal => text.normal(),
            Tone::Assistant => text.blue().bold(),
            Tone::Browser => text.green(),
            Tone::Error => text.red(),
        };
        match self.progress.lock().ok().and_then(|p| p.clone()) {
            Some(bar) => bar.println(line.to_string()),
            None => println!("{}", line),
        }
    }

    fn ask(&self, prompt: &str) -> Result<String> {
        print!("{} ", prompt.bold());
        io::stdout().flush()?;
        self.read_line()
    }

    fn confirm(&self, prompt: &str) -> Result<bool> {
        loop {
            let answer = self.ask(&format!("{} [y/n]:", prompt))?;
            match answer.trim().to_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => continue,
            }
        }
    }

    fn start_progress(&self, title: &str, total: u64) {
        let bar = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::with_template("{msg} [{bar:30.green}] {pos}/{len}") {
            bar.set_style(style);
        }
        bar.set_message(title.to_string());
        if let Ok(mut slot) = self.progress.lock() {
            *slot = Some(bar);
        }
    }

    fn advance_progress(&self) {
        if let Ok(slot) = self.progress.lock() {
            if let Some(bar) = slot.as_ref() {
                bar.inc(1);
            }
        }
    }

    fn finish_progress(&self) {
        if let Ok(mut slot) = self.progress.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        }
    }
}
