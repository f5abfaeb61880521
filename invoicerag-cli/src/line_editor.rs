use std::io;

use invoicerag_rag::LinePrompt;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// Terminal prompt with line editing and in-memory history.
pub struct EditorPrompt {
    editor: DefaultEditor,
}

impl EditorPrompt {
    pub fn new() -> Result<Self, ReadlineError> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }
}

impl LinePrompt for EditorPrompt {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        println!();
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(Some(line))
            }
            // Ctrl-D and Ctrl-C both end the session.
            Err(ReadlineError::Eof | ReadlineError::Interrupted) => Ok(None),
            Err(ReadlineError::Io(err)) => Err(err),
            Err(err) => Err(io::Error::new(io::ErrorKind::Other, err.to_string())),
        }
    }
}
