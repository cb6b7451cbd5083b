//! Terminal prompts that repeat until the input is valid or cancelled.
//!
//! Each answer is a block of lines. An empty first line or end of input
//! cancels; an invalid answer prints the reason and asks again.

use std::fmt::Display;
use std::io::{self, BufRead, Write};

use crate::account::{is_valid_toonguard_code, TOONGUARD_PROMPT};
use crate::launcher::CodePrompt;

pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Prompter { input, output }
    }

    /// Shows `message` and reads up to `lines` lines. `None` on cancel.
    fn read_block(&mut self, message: &str, lines: usize) -> io::Result<Option<String>> {
        writeln!(self.output, "{message}")?;
        self.output.flush()?;

        let mut block = String::new();
        for i in 0..lines {
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                // EOF before anything was typed cancels; otherwise use what we have.
                return Ok((i > 0).then_some(block));
            }
            let line = line.trim_end_matches(['\r', '\n']);
            if i == 0 && line.trim().is_empty() {
                return Ok(None);
            }
            block.push_str(line);
            block.push('\n');
        }
        Ok(Some(block))
    }

    /// Asks until `parse` accepts the answer or the user cancels.
    pub fn ask_until<T, E: Display>(
        &mut self,
        message: &str,
        lines: usize,
        parse: impl Fn(&str) -> Result<T, E>,
    ) -> io::Result<Option<T>> {
        let mut current = message.to_string();
        loop {
            let Some(block) = self.read_block(&current, lines)? else {
                return Ok(None);
            };
            match parse(&block) {
                Ok(value) => return Ok(Some(value)),
                Err(e) => current = format!("{e}\n{message}"),
            }
        }
    }
}

/// Reads ToonGuard codes from the controlling terminal.
pub struct TerminalPrompt;

impl CodePrompt for TerminalPrompt {
    fn toonguard_code(&self, account: &str, banner: &str) -> Option<String> {
        if !banner.is_empty() {
            eprintln!("{banner}");
        }
        let message = format!("{TOONGUARD_PROMPT} for {account} (empty line cancels):");
        let mut prompter = Prompter::new(io::stdin().lock(), io::stderr());
        let answer = prompter.ask_until(&message, 1, |text| {
            if is_valid_toonguard_code(text) {
                Ok(text.trim().to_string())
            } else {
                Err("Please try again. Your input should be six numbers.")
            }
        });
        match answer {
            Ok(code) => code,
            Err(e) => {
                log::warn!("prompt: cannot read ToonGuard code: {e}");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
