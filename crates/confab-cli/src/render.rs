//! Plain stdout rendering of session events
//!
//! Streams agent text incrementally: on every transcript update, only the
//! bytes appended since the last print are written. Text parts only ever
//! grow by concatenation, so the printed byte offset stays valid.

use std::io::Write;

use confab_proto::{Role, TaskState};
use confab_session::{SessionDirectory, SessionEvent, Turn};

pub struct Renderer {
    directory: SessionDirectory,
    /// Index of the agent turn currently being streamed
    turn: Option<usize>,
    text_printed: usize,
    tools_printed: usize,
    results_printed: usize,
    artifacts_printed: usize,
    /// A text line is open and unterminated
    mid_line: bool,
    thinking_shown: bool,
}

impl Renderer {
    pub fn new(directory: SessionDirectory) -> Self {
        Self {
            directory,
            turn: None,
            text_printed: 0,
            tools_printed: 0,
            results_printed: 0,
            artifacts_printed: 0,
            mid_line: false,
            thinking_shown: false,
        }
    }

    pub fn handle(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::ConversationLoaded { .. } => {
                self.reset();
                self.print_transcript();
            }
            SessionEvent::SelectionCleared => {
                self.reset();
                println!("(conversation deleted)");
            }
            SessionEvent::TranscriptUpdated => self.print_progress(),
            SessionEvent::Thinking { active } => {
                if *active && !self.thinking_shown {
                    self.thinking_shown = true;
                    println!("· thinking…");
                }
                if !*active {
                    self.thinking_shown = false;
                }
            }
            SessionEvent::StreamOpened { task_id } => {
                tracing::debug!(task_id, "stream opened");
            }
            SessionEvent::StreamClosed { state } => {
                self.finish_line();
                match state {
                    Some(TaskState::Completed) => println!("(task completed)"),
                    Some(state) => println!("(task ended: {:?})", state),
                    None => println!("(stream dropped — /resubscribe to reattach)"),
                }
                self.reset();
            }
            SessionEvent::Error { message } => {
                self.finish_line();
                eprintln!("error: {}", message);
            }
        }
    }

    fn reset(&mut self) {
        self.turn = None;
        self.text_printed = 0;
        self.tools_printed = 0;
        self.results_printed = 0;
        self.artifacts_printed = 0;
        self.mid_line = false;
        self.thinking_shown = false;
    }

    /// Print the full transcript after a wholesale install
    fn print_transcript(&self) {
        let _ = self.directory.with_conversation(|conv| {
            println!("— {} —", conv.title);
            for turn in conv.transcript.turns() {
                print_turn(turn);
            }
            if conv.is_streaming {
                println!("(a task is still streaming)");
            }
        });
    }

    /// Print whatever the streaming agent turn gained since the last call
    fn print_progress(&mut self) {
        let snapshot = self.directory.with_conversation(|conv| {
            let index = conv.transcript.len().checked_sub(1)?;
            let turn = conv.transcript.turn(index)?;
            if turn.role != Role::Agent {
                return None;
            }
            Some((index, turn.plain_text(), turn.tools.clone(), turn.artifacts.len()))
        });
        let Some(Some((index, text, tools, artifact_count))) = snapshot else {
            // Trailing turn is the user's own message; nothing to echo.
            self.turn = None;
            return;
        };

        if self.turn != Some(index) {
            self.reset();
            self.turn = Some(index);
        }

        if text.len() > self.text_printed {
            print!("{}", &text[self.text_printed..]);
            self.text_printed = text.len();
            self.mid_line = !text.ends_with('\n');
            let _ = std::io::stdout().flush();
        }

        while self.tools_printed < tools.len() {
            self.finish_line();
            let tool = &tools[self.tools_printed];
            println!("⚙ {}({})", tool.name, tool.input);
            self.tools_printed += 1;
        }

        let resolved: Vec<_> = tools.iter().filter(|t| t.is_resolved()).collect();
        while self.results_printed < resolved.len() {
            self.finish_line();
            if let Some(result) = &resolved[self.results_printed].result {
                println!("  → {}", result);
            }
            self.results_printed += 1;
        }

        if self.artifacts_printed < artifact_count {
            self.finish_line();
            let name = self.directory.with_conversation(|conv| {
                conv.transcript
                    .turn(index)
                    .and_then(|t| t.artifacts.last())
                    .and_then(|a| a.name.clone())
            });
            match name.flatten() {
                Some(name) => println!("⎔ artifact: {}", name),
                None => println!("⎔ artifact"),
            }
            self.artifacts_printed = artifact_count;
        }
    }

    /// Terminate a partially printed text line
    fn finish_line(&mut self) {
        if self.mid_line {
            println!();
            self.mid_line = false;
        }
    }
}

fn print_turn(turn: &Turn) {
    let prefix = match turn.role {
        Role::User => "you",
        Role::Agent => "agent",
    };
    let text = turn.plain_text();
    if !text.is_empty() {
        println!("{}: {}", prefix, text);
    }
    for tool in &turn.tools {
        println!("  ⚙ {}({})", tool.name, tool.input);
        if let Some(result) = &tool.result {
            println!("    → {}", result);
        }
    }
    for artifact in &turn.artifacts {
        match &artifact.name {
            Some(name) => println!("  ⎔ artifact: {}", name),
            None => println!("  ⎔ artifact"),
        }
    }
}
