//! Line-oriented front end: reads commands from stdin while the session
//! keeps processing target traffic.

use std::io::{self, Write};

use anyhow::{Context, Result};
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use tokio::io::{AsyncBufReadExt, BufReader};

use kdshell_core::{StatusEntry, StatusLevel};
use kdshell_session::{CommandOutcome, SessionCoordinator, ShellCommand};

use crate::ConfigSource;

const PROMPT: &str = "kdshell> ";

enum Input {
    Line(Option<String>),
    Session,
}

pub(crate) async fn run(session: &mut SessionCoordinator, source: &ConfigSource) -> Result<()> {
    let mut stdout = io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut shown_status = session.status_line().to_string();

    print_line(&mut stdout, Color::Cyan, &shown_status)?;
    flush_updates(&mut stdout, session)?;
    prompt(&mut stdout)?;

    loop {
        let input = tokio::select! {
            line = lines.next_line() => Input::Line(line.context("failed to read stdin")?),
            _ = session.pump() => Input::Session,
        };

        let mut reprompt = false;
        match input {
            Input::Line(None) => {
                session.execute(ShellCommand::Quit);
                break;
            }
            Input::Line(Some(line)) if line.trim().is_empty() => reprompt = true,
            Input::Line(Some(line)) => {
                reprompt = true;
                match session.execute_line(&line) {
                    CommandOutcome::Output(out) => {
                        for text in out {
                            print_line(&mut stdout, Color::Reset, &text)?;
                        }
                    }
                    CommandOutcome::ReloadSettings => match source.load() {
                        Ok(config) => session.apply_config(&config),
                        Err(e) => {
                            tracing::error!("config reload failed: {}", e);
                            print_line(&mut stdout, Color::Red, &format!("reload failed: {e}"))?;
                        }
                    },
                    CommandOutcome::Quit => break,
                }
            }
            Input::Session => {}
        }

        let updates = flush_updates(&mut stdout, session)?;
        let status = session.status_line().to_string();
        if status != shown_status {
            print_line(&mut stdout, Color::Cyan, &status)?;
            shown_status = status;
            reprompt = true;
        }
        if reprompt || updates > 0 {
            prompt(&mut stdout)?;
        }
    }

    flush_updates(&mut stdout, session)?;
    Ok(())
}

fn flush_updates(stdout: &mut io::Stdout, session: &mut SessionCoordinator) -> Result<usize> {
    let updates = session.take_status_updates();
    for entry in &updates {
        print_line(stdout, level_color(entry), &entry.to_string())?;
    }
    Ok(updates.len())
}

fn level_color(entry: &StatusEntry) -> Color {
    match entry.level() {
        StatusLevel::Info => Color::DarkGreen,
        StatusLevel::Warning => Color::DarkYellow,
        StatusLevel::Error => Color::Red,
    }
}

fn print_line(stdout: &mut io::Stdout, color: Color, text: &str) -> Result<()> {
    crossterm::execute!(
        stdout,
        Print("\r"),
        SetForegroundColor(color),
        Print(text),
        ResetColor,
        Print("\n")
    )?;
    Ok(())
}

fn prompt(stdout: &mut io::Stdout) -> Result<()> {
    crossterm::execute!(stdout, Print(PROMPT))?;
    stdout.flush()?;
    Ok(())
}
