//! Interactive enumerated prompts.
//!
//! Selection itself is a pure function over an already-known option list;
//! the input loop is a thin adapter over any `BufRead` (stdin in
//! production) so the whole thing stays testable with canned input.

use anyhow::{bail, Context, Result};
use std::io::{self, BufRead, Write};

/// Resolve one line of operator input against an option list.
///
/// Accepts a 1-based index or an exact (case-insensitive) option name.
/// Returns None for anything outside the enumerated set.
pub fn select_index(options: &[&str], input: &str) -> Option<usize> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(n) = input.parse::<usize>() {
        if n >= 1 && n <= options.len() {
            return Some(n - 1);
        }
        return None;
    }

    options
        .iter()
        .position(|opt| opt.eq_ignore_ascii_case(input))
}

/// Prompt until the operator picks a valid option; re-prompts on anything
/// outside the enumerated set.
pub fn choose(title: &str, options: &[&str]) -> Result<usize> {
    let stdin = io::stdin();
    choose_from(title, options, &mut stdin.lock())
}

/// Core of `choose` over any line source. A closed input stream is fatal:
/// re-reading after EOF would spin forever on the same empty line.
fn choose_from(title: &str, options: &[&str], input: &mut impl BufRead) -> Result<usize> {
    println!("{}", title);
    for (i, opt) in options.iter().enumerate() {
        println!("  {}) {}", i + 1, opt);
    }

    loop {
        print!("> ");
        io::stdout().flush().ok();

        let mut line = String::new();
        let read = input
            .read_line(&mut line)
            .context("Failed to read operator input")?;
        if read == 0 {
            bail!("Input stream closed before a choice was made");
        }

        match select_index(options, &line) {
            Some(idx) => return Ok(idx),
            None => println!("Invalid choice, pick 1-{}:", options.len()),
        }
    }
}

/// Prompt for a free-form value with a default.
pub fn ask(title: &str, default: &str) -> Result<String> {
    let stdin = io::stdin();
    ask_from(title, default, &mut stdin.lock())
}

/// Core of `ask`. EOF and a blank line both mean "take the default".
fn ask_from(title: &str, default: &str, input: &mut impl BufRead) -> Result<String> {
    print!("{} [{}]: ", title, default);
    io::stdout().flush().ok();

    let mut line = String::new();
    input
        .read_line(&mut line)
        .context("Failed to read operator input")?;

    let value = line.trim();
    if value.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(value.to_string())
    }
}
