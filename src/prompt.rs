// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Interactive yes/no/quit confirmation

use std::io::{self, BufRead, Write};

/// Answer to a confirmation prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirm {
    Yes,
    No,
    Quit,
}

/// Interpret one line of input; `None` means ask again
pub fn parse_answer(input: &str) -> Option<Confirm> {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(Confirm::Yes),
        "n" | "no" => Some(Confirm::No),
        "q" | "quit" => Some(Confirm::Quit),
        _ => None,
    }
}

/// Ask on stdout and read answers from `input` until one is recognized.
///
/// End of input counts as quit.
pub fn prompt_confirm_from<R: BufRead>(prompt: &str, input: &mut R) -> io::Result<Confirm> {
    let mut line = String::new();

    loop {
        line.clear();
        print!("{} (y/n/q): ", prompt);
        io::stdout().flush()?;

        if input.read_line(&mut line)? == 0 {
            return Ok(Confirm::Quit);
        }

        match parse_answer(&line) {
            Some(answer) => return Ok(answer),
            None => println!("Please answer y, n, or q."),
        }
    }
}

pub fn prompt_confirm(prompt: &str) -> io::Result<Confirm> {
    prompt_confirm_from(prompt, &mut io::stdin().lock())
}

/// Read one free-text line from stdin
pub fn prompt_line(prompt: &str) -> io::Result<String> {
    print!("{}: ", prompt);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
