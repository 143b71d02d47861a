//! Interactive prompt: reads one line per command from stdin.

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

use crate::domain::{ItemId, PricingMode};

pub const HELP: &str = "\
Type an item name exactly as it appears in game (case sensitive) or its numeric ID.
Other commands:
  mode instant|listed   switch between trading now and placing orders
  save                  write everything learned so far to disk
  clear                 forget stored recipes (item names are kept)
  help                  show this message
  exit                  save and quit";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemQuery {
    Id(ItemId),
    Name(String),
}

impl ItemQuery {
    /// A numeric ID, or else an exact in-game name.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<ItemId>() {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Name(raw.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Query(ItemQuery),
    Mode(PricingMode),
    Save,
    Clear,
    Help,
    Exit,
    Empty,
    Invalid(String),
}

pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }

    let lowered = line.to_ascii_lowercase();
    match lowered.as_str() {
        "exit" | "quit" => return Command::Exit,
        "save" => return Command::Save,
        "clear" => return Command::Clear,
        "help" | "?" => return Command::Help,
        _ => {}
    }

    if let Some(mode) = lowered.strip_prefix("mode") {
        if mode.is_empty() || mode.starts_with(' ') {
            return match mode.parse::<PricingMode>() {
                Ok(mode) => Command::Mode(mode),
                Err(message) => Command::Invalid(message),
            };
        }
    }

    Command::Query(ItemQuery::parse(line))
}

pub struct Prompt {
    lines: Lines<BufReader<Stdin>>,
}

impl Default for Prompt {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompt {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Print `question` and wait for the next line. `None` once stdin is closed.
    pub async fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(question.as_bytes()).await?;
        stdout.flush().await?;
        self.lines.next_line().await
    }

    pub async fn next_command(&mut self) -> io::Result<Command> {
        Ok(match self.ask("\nItem to check (or 'help'): ").await? {
            Some(line) => parse_command(&line),
            None => Command::Exit,
        })
    }
}
