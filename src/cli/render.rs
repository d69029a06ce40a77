//! Terminal output for replies.

use std::io::{self, IsTerminal, Write};

use crate::core::dispatch::{Fragment, FragmentSink};

const THOUGHT_PREFIX: &str = "THOUGHT ❯ ";
const ASSISTANT_PREFIX: &str = "ASSISTANT ❯ ";

const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[92m";
const BOLD_CYAN: &str = "\x1b[1;36m";
const RED: &str = "\x1b[91m";
const RESET: &str = "\x1b[0m";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Section {
    Reasoning,
    Content,
}

/// Writes fragments as they arrive.
///
/// On a terminal, reasoning and content get their own labelled sections. When
/// output is redirected only the reply text is written, so it can be piped
/// into other tools.
pub struct TerminalSink<W: Write> {
    out: W,
    styled: bool,
    section: Option<Section>,
}

impl TerminalSink<io::Stdout> {
    pub fn stdout() -> Self {
        let styled = io::stdout().is_terminal();
        Self::new(io::stdout(), styled)
    }
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W, styled: bool) -> Self {
        Self {
            out,
            styled,
            section: None,
        }
    }

    fn enter(&mut self, section: Section) -> io::Result<()> {
        if self.section == Some(section) {
            return Ok(());
        }
        if self.section.is_some() {
            self.finish_section()?;
            writeln!(self.out)?;
        }
        self.section = Some(section);
        if !self.styled {
            return Ok(());
        }
        match section {
            Section::Reasoning => write!(self.out, "{BOLD_CYAN}{THOUGHT_PREFIX}{RESET}{DIM}"),
            Section::Content => write!(self.out, "{BOLD_CYAN}{ASSISTANT_PREFIX}{RESET}{GREEN}"),
        }
    }

    fn finish_section(&mut self) -> io::Result<()> {
        if self.styled && self.section.is_some() {
            write!(self.out, "{RESET}")?;
        }
        Ok(())
    }

    fn write_fragment(&mut self, fragment: Fragment) -> io::Result<()> {
        match fragment {
            // reasoning is not part of the reply, so redirected output skips it
            Fragment::Reasoning(_) if !self.styled => return Ok(()),
            Fragment::Reasoning(text) => {
                self.enter(Section::Reasoning)?;
                write!(self.out, "{text}")?;
            }
            Fragment::Content(text) => {
                self.enter(Section::Content)?;
                write!(self.out, "{text}")?;
            }
        }
        self.out.flush()
    }

    /// Print a reply that arrived in one piece.
    pub fn print_reply(&mut self, text: &str) -> io::Result<()> {
        if !text.is_empty() {
            self.write_fragment(Fragment::Content(text.to_string()))?;
        }
        Ok(())
    }

    /// Close the current section and end the line.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.section.take().is_some() {
            if self.styled {
                write!(self.out, "{RESET}")?;
            }
            writeln!(self.out)?;
        }
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> FragmentSink for TerminalSink<W> {
    fn on_fragment(&mut self, fragment: Fragment) {
        if let Err(err) = self.write_fragment(fragment) {
            tracing::debug!("failed to write fragment: {err}");
        }
    }
}

pub fn print_error(message: &str) {
    if io::stderr().is_terminal() {
        eprintln!("{RED}{message}{RESET}");
    } else {
        eprintln!("{message}");
    }
}
