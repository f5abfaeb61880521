//! Interactive question loop.

use std::io::{self, BufRead, Write};

use crate::{AnswerQuery, RagError};

pub const EXAMPLE_QUERIES: &[&str] = &[
    "What is the total amount for invoice X?",
    "Which invoices are from company Y?",
    "Show me invoices from January 2023",
    "What are the highest value invoices?",
];

const EXIT_COMMANDS: &[&str] = &["quit", "exit", "q"];
const PROMPT: &str = "You: ";

/// `quit`, `exit` or `q` in any case, ignoring surrounding whitespace.
pub fn is_exit_command(input: &str) -> bool {
    let input = input.trim();
    EXIT_COMMANDS
        .iter()
        .any(|command| input.eq_ignore_ascii_case(command))
}

/// Line source for the session. `Ok(None)` means the user closed the input.
pub trait LinePrompt {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;
}

/// Prompts on a writer and reads lines from any [`BufRead`].
pub struct BufReadPrompt<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> BufReadPrompt<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

impl<R: BufRead, W: Write> LinePrompt for BufReadPrompt<R, W> {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.writer, "\n{prompt}")?;
        self.writer.flush()?;

        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    AwaitingInput,
    Processing,
    Terminated,
}

pub struct Session<A> {
    answerer: A,
    k: usize,
    state: SessionState,
}

impl<A: AnswerQuery> Session<A> {
    pub fn new(answerer: A, k: usize) -> Self {
        Self {
            answerer,
            k,
            state: SessionState::AwaitingInput,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn write_banner<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let rule = "=".repeat(60);
        writeln!(out, "\n{rule}")?;
        writeln!(out, "Invoice RAG System (type 'quit' to exit)")?;
        writeln!(out, "{rule}")?;
        writeln!(out, "\nExample queries:")?;
        for query in EXAMPLE_QUERIES {
            writeln!(out, "  - {query}")?;
        }
        writeln!(out, "{rule}")
    }

    /// Handles one line of input. Answer failures are written to `out` and
    /// leave the session awaiting input.
    pub async fn handle_line<W: Write>(&mut self, line: &str, out: &mut W) -> io::Result<()> {
        if self.state == SessionState::Terminated {
            return Ok(());
        }

        let query = line.trim();
        if is_exit_command(query) {
            writeln!(out, "Goodbye!")?;
            self.state = SessionState::Terminated;
            return Ok(());
        }
        if query.is_empty() {
            return Ok(());
        }

        self.state = SessionState::Processing;
        match self.answerer.answer(query, self.k).await {
            Ok(answer) => writeln!(out, "\nAssistant: {answer}")?,
            Err(err) => {
                tracing::debug!(error = ?err, "query failed");
                writeln!(out, "Error: {err}")?;
            }
        }
        self.state = SessionState::AwaitingInput;
        Ok(())
    }

    /// Runs until an exit command or the end of input. Lines that are not valid
    /// UTF-8 are reported like answer failures.
    pub async fn run<P, W>(&mut self, prompt: &mut P, out: &mut W) -> Result<(), RagError>
    where
        P: LinePrompt,
        W: Write,
    {
        self.write_banner(out)?;
        while self.state != SessionState::Terminated {
            out.flush()?;
            match prompt.read_line(PROMPT) {
                Ok(Some(line)) => self.handle_line(&line, out).await?,
                Ok(None) => {
                    writeln!(out, "\nGoodbye!")?;
                    self.state = SessionState::Terminated;
                }
                // An undecodable line is skipped; the input stays open.
                Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                    writeln!(out, "Error: {err}")?;
                }
                Err(err) => return Err(err.into()),
            }
        }
        out.flush()?;
        Ok(())
    }
}
