//! Terminal prompts

use anyhow::{Context, Result};
use outreach::{CODE_LENGTH, CodeInput, Confirm};
use std::io::{self, BufRead, Write};

/// Print `prompt` and read one trimmed line from stdin
pub fn read_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush().context("Failed to flush stdout")?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim().to_string())
}

/// Ask for the emailed code until a full six-digit code is entered.
/// Returns `None` on end of input.
pub fn read_code() -> Result<Option<String>> {
    let mut input = CodeInput::new();
    loop {
        let line = read_line(&format!("Enter the {}-digit code: ", CODE_LENGTH))?;
        if line.is_empty() {
            return Ok(None);
        }
        if input.paste(&line) {
            return Ok(input.complete_code());
        }
        println!("Please enter exactly {} digits.", CODE_LENGTH);
    }
}

/// Confirms by asking y/N on the terminal
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        match read_line(&format!("{} [y/N] ", prompt)) {
            Ok(answer) => is_yes(&answer),
            Err(_) => false,
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes")
}
