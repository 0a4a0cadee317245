//! Terminal password prompt
//!
//! Reads a password without echoing it, crossterm raw mode. Esc (or Ctrl+C)
//! cancels; Enter submits, with the empty string meaning "try without a
//! password". When stdin is not a terminal (piped input), falls back to
//! reading one line.

use std::io::{self, BufRead, Write};

use crossterm::event::{read, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use crate::password::{PasswordPrompt, PromptReply};

pub struct TerminalPrompt;

fn read_raw() -> io::Result<PromptReply> {
    enable_raw_mode()?;
    let mut buffer = String::new();
    let result = loop {
        let event = match read() {
            Ok(event) => event,
            Err(e) => break Err(e),
        };
        let Event::Key(KeyEvent {
            code,
            modifiers,
            kind,
            ..
        }) = event
        else {
            continue;
        };
        if kind == KeyEventKind::Release {
            continue;
        }
        match code {
            KeyCode::Esc => break Ok(PromptReply::Cancelled),
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                break Ok(PromptReply::Cancelled);
            }
            KeyCode::Enter => break Ok(PromptReply::Password(buffer)),
            KeyCode::Backspace => {
                buffer.pop();
            }
            KeyCode::Char(c) => buffer.push(c),
            _ => {}
        }
    };
    disable_raw_mode()?;
    result
}

impl PasswordPrompt for TerminalPrompt {
    fn ask(&mut self, context: &str) -> PromptReply {
        eprint!("Password for {} (Enter = none, Esc = cancel): ", context);
        let _ = io::stderr().flush();

        let reply = match read_raw() {
            Ok(reply) => reply,
            // Not a terminal: take one line from stdin, EOF cancels.
            Err(_) => {
                let mut line = String::new();
                match io::stdin().lock().read_line(&mut line) {
                    Ok(0) | Err(_) => PromptReply::Cancelled,
                    Ok(_) => {
                        PromptReply::Password(line.trim_end_matches(['\r', '\n']).to_string())
                    }
                }
            }
        };
        eprintln!();
        reply
    }
}
