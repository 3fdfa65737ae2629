//! Reading values and confirmations from the terminal.

use std::io::{self, BufRead, IsTerminal, Read, Write};

use anyhow::{Result, bail};

/// Whether stdin is piped or redirected rather than a terminal.
pub fn stdin_is_piped() -> bool {
    !io::stdin().is_terminal()
}

/// Read everything from `reader` as a secret value, trimmed.
pub fn read_piped_value(mut reader: impl Read) -> Result<String> {
    let mut buffer = String::new();
    reader.read_to_string(&mut buffer)?;
    let value = buffer.trim().to_string();
    if value.is_empty() {
        bail!("secret length must be greater than 0");
    }
    Ok(value)
}

/// Print `label` and read one line from `input`, without its line ending.
pub fn read_line(label: &str, mut input: impl BufRead) -> Result<String> {
    eprint!("{label}");
    io::stderr().flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Ask a yes/no question; anything but `y`/`yes` is a no.
pub fn confirm(question: &str, input: impl BufRead) -> Result<bool> {
    let answer = read_line(&format!("{question} [y/N]: "), input)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
