//! Console commands read from stdin by the binary.
//!
//! ```text
//! click <x> <y>   activate a tile            (alias: c)
//! room <name>     reload into another room   (alias: r)
//! status          print connection state and counts
//! log             print the event log
//! draw            print the grid
//! quit            exit                       (alias: q, exit)
//! ```

use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Click { x: u32, y: u32 },
    SwitchRoom(String),
    Status,
    Log,
    Draw,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("'{command}' needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    #[error("invalid coordinate '{0}'")]
    InvalidCoordinate(String),
}

impl UserCommand {
    pub fn parse(line: &str) -> Result<Self, InputError> {
        let mut words = line.split_whitespace();
        let head = words.next().ok_or(InputError::Empty)?;

        match head.to_ascii_lowercase().as_str() {
            "click" | "c" => {
                let x = coordinate(words.next(), "click")?;
                let y = coordinate(words.next(), "click")?;
                Ok(UserCommand::Click { x, y })
            }
            "room" | "r" => words
                .next()
                .map(|name| UserCommand::SwitchRoom(name.to_string()))
                .ok_or(InputError::MissingArgument {
                    command: "room",
                    argument: "a room name",
                }),
            "status" => Ok(UserCommand::Status),
            "log" => Ok(UserCommand::Log),
            "draw" => Ok(UserCommand::Draw),
            "quit" | "q" | "exit" => Ok(UserCommand::Quit),
            _ => Err(InputError::UnknownCommand(head.to_string())),
        }
    }
}

impl FromStr for UserCommand {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UserCommand::parse(s)
    }
}

fn coordinate(word: Option<&str>, command: &'static str) -> Result<u32, InputError> {
    let word = word.ok_or(InputError::MissingArgument {
        command,
        argument: "<x> <y>",
    })?;
    word.parse()
        .map_err(|_| InputError::InvalidCoordinate(word.to_string()))
}
