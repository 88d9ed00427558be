//! Blocking terminal prompts shared by the wizard frontend and `config init`.

use std::io::{self, Write};

use crossterm::style::Stylize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

fn readline_error(err: ReadlineError) -> io::Error {
    match err {
        ReadlineError::Io(e) => e,
        ReadlineError::Interrupted => io::Error::new(io::ErrorKind::Interrupted, "interrupted"),
        ReadlineError::Eof => io::Error::new(io::ErrorKind::UnexpectedEof, "end of input"),
        other => io::Error::other(other.to_string()),
    }
}

fn read_line(prompt: &str) -> io::Result<String> {
    let mut editor = DefaultEditor::new().map_err(readline_error)?;
    editor
        .readline(prompt)
        .map(|line| line.trim().to_string())
        .map_err(readline_error)
}

pub fn print_header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "=".repeat(title.chars().count()));
    println!();
}

pub fn print_step(current: usize, total: usize, title: &str) {
    println!();
    println!(
        "{} {}",
        format!("[{current}/{total}]").cyan().bold(),
        title.bold()
    );
    println!();
}

pub fn print_info(message: &str) {
    println!("  {message}");
}

pub fn print_success(message: &str) {
    println!("  {} {message}", "\u{2713}".green());
}

pub fn print_warning(message: &str) {
    println!("  {} {message}", "!".yellow().bold());
}

pub fn print_error(message: &str) {
    eprintln!("  {} {message}", "\u{2717}".red());
}

/// Numbered menu. Re-asks until the answer is in range.
pub fn select_one(prompt: &str, options: &[impl AsRef<str>]) -> io::Result<usize> {
    if options.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "nothing to select",
        ));
    }
    println!("{}", prompt.bold());
    for (i, option) in options.iter().enumerate() {
        println!("  {} {}", format!("{:>2})", i + 1).dark_grey(), option.as_ref());
    }
    io::stdout().flush()?;

    loop {
        let answer = read_line(&format!("Choice [1-{}]: ", options.len()))?;
        match answer.parse::<usize>() {
            Ok(n) if (1..=options.len()).contains(&n) => return Ok(n - 1),
            _ => print_error(&format!(
                "Enter a number between 1 and {}",
                options.len()
            )),
        }
    }
}

pub fn confirm(prompt: &str, default: bool) -> io::Result<bool> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    loop {
        let answer = read_line(&format!("{prompt} {hint} "))?;
        match answer.to_lowercase().as_str() {
            "" => return Ok(default),
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => print_error("Please answer y or n"),
        }
    }
}

pub fn input(prompt: &str) -> io::Result<String> {
    read_line(&format!("{prompt}: "))
}

/// Empty answers become `None`.
pub fn optional_input(prompt: &str, hint: Option<&str>) -> io::Result<Option<String>> {
    let prompt = match hint {
        Some(hint) => format!("{prompt} ({hint}): "),
        None => format!("{prompt}: "),
    };
    let answer = read_line(&prompt)?;
    Ok((!answer.is_empty()).then_some(answer))
}

/// Read without echo. Used for API keys.
pub fn secret_input(prompt: &str) -> io::Result<String> {
    print!("{prompt}: ");
    io::stdout().flush()?;
    crossterm::terminal::enable_raw_mode()?;
    let result = read_secret();
    crossterm::terminal::disable_raw_mode()?;
    println!();
    result
}

fn read_secret() -> io::Result<String> {
    use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};

    let mut secret = String::new();
    loop {
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Enter => return Ok(secret),
                KeyCode::Backspace => {
                    secret.pop();
                }
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Err(io::Error::new(io::ErrorKind::Interrupted, "interrupted"));
                }
                KeyCode::Char(c) => secret.push(c),
                _ => {}
            }
        }
    }
}
