//! Interactive `ftp>` prompt driving a [`Client`].

use std::io::{BufRead, Write};

use anyhow::Result;
use ftpx::{Client, Error, FileStore};

use crate::human_size;

const PROMPT: &str = "ftp> ";

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Ls,
    Get(&'a str),
    Put(&'a str),
    Quit,
}

impl<'a> Input<'a> {
    /// Parses a prompt line. `Ok(None)` means a blank line.
    fn parse(line: &'a str) -> Result<Option<Self>, &'static str> {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            [] => Ok(None),
            ["ls"] => Ok(Some(Self::Ls)),
            ["quit"] => Ok(Some(Self::Quit)),
            ["get", name] => Ok(Some(Self::Get(*name))),
            ["put", name] => Ok(Some(Self::Put(*name))),
            ["get", ..] => Err("valid format is: get <file_name>"),
            ["put", ..] => Err("valid format is: put <file_name>"),
            _ => Err("commands are: ls, get <file_name>, put <file_name>, quit"),
        }
    }
}

/// Reads commands from `input` until `quit` or end of input.
///
/// Failed transfers are reported and the prompt continues; end of input
/// behaves like `quit`.
pub fn run<S: FileStore>(
    mut client: Client<S>,
    mut input: impl BufRead,
    mut out: impl Write,
) -> Result<()> {
    let mut line = String::new();
    loop {
        write!(out, "{PROMPT}")?;
        out.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(out)?;
            break;
        }

        let cmd = match Input::parse(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(usage) => {
                writeln!(out, "{usage}")?;
                continue;
            }
        };

        let outcome = match cmd {
            Input::Quit => break,
            Input::Ls => client.list().map(|names| {
                names.iter().map(|n| format!("{n}\n")).collect::<String>()
            }),
            Input::Get(name) => client
                .download(name)
                .map(|n| format!("received {name} ({})\n", human_size(n))),
            Input::Put(name) => client
                .upload(name)
                .map(|n| format!("sent {name} ({})\n", human_size(n))),
        };

        match outcome {
            Ok(text) => write!(out, "{text}")?,
            Err(Error::NotFound(_)) => writeln!(out, "File not found on the server")?,
            Err(Error::LocalNotFound(_)) => {
                writeln!(out, "File does not exist in the client directory")?;
            }
            Err(e) => writeln!(out, "error: {e}")?,
        }
    }
    client.quit()?;
    Ok(())
}
