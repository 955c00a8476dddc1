// REPL - line-oriented terminal front end for the chat controller
//
// Plain lines are queries; lines starting with '/' are commands. Message and
// list numbers shown to the user are 1-based.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::backend::{ChatBackend, FileUpload};
use crate::chat::{
    ChatController, ChatError, Feedback, FeedbackAction, FeedbackForm, FeedbackReceipt, MessageId,
    Outcome, ReflexionState, Role, ToolDraft, ToolSubmission,
};
use crate::logging::LogBuffer;
use crate::startup::colors::*;
use crate::util::one_line_preview;

const DEFAULT_LOG_LINES: usize = 20;

const HELP: &str = "\
Ask anything by typing it. Commands:
  /up [#id]  /down [#id]     rate an answer (latest by default)
  /form                      show the open feedback form
  /term WORD = MEANING       add or complete a clarification
  /meaning N TEXT            set the meaning of clarification N
  /rmterm N                  remove clarification N
  /feedback TEXT             send feedback with the clarifications
  /dismiss                   close the feedback form
  /tool                      add a tool (re-runs a parked question)
  /decline  /reopen          close or re-open the tool form
  /upload PATH...            upload files
  /files  /rm N              list or delete uploaded files
  /tools  /rmtool ID         list or delete custom tools
  /history                   show the whole conversation
  /sessions                  list sessions on the backend
  /logs [N]                  show recent log lines
  /help  /quit";

/// One parsed input line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Query(String),
    Rate {
        feedback: Feedback,
        message: Option<MessageId>,
    },
    Feedback(String),
    Form,
    Term { word: String, meaning: String },
    Meaning { index: usize, meaning: String },
    RemoveTerm(usize),
    Dismiss,
    Tool,
    Decline,
    Reopen,
    Upload(Vec<PathBuf>),
    Files,
    RemoveFile(usize),
    Tools,
    RemoveTool(String),
    History,
    Sessions,
    Logs(usize),
    Help,
    Quit,
}

/// 1-based position to index
fn position(arg: Option<&str>) -> Result<usize, String> {
    match arg.map(str::parse::<usize>) {
        Some(Ok(n)) if n > 0 => Ok(n - 1),
        _ => Err("expected a number starting at 1".to_string()),
    }
}

fn message_ref(arg: Option<&str>) -> Result<Option<MessageId>, String> {
    match arg {
        None => Ok(None),
        Some(raw) => raw
            .trim_start_matches('#')
            .parse()
            .map(|id| Some(MessageId(id)))
            .map_err(|_| format!("'{}' is not a message id", raw)),
    }
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let Some(body) = line.strip_prefix('/') else {
            return Ok(Self::Query(line.to_string()));
        };

        let (name, rest) = body
            .split_once(char::is_whitespace)
            .map(|(n, r)| (n, r.trim()))
            .unwrap_or((body, ""));
        let arg = (!rest.is_empty()).then_some(rest);

        match name {
            "up" => Ok(Self::Rate {
                feedback: Feedback::Positive,
                message: message_ref(arg)?,
            }),
            "down" => Ok(Self::Rate {
                feedback: Feedback::Negative,
                message: message_ref(arg)?,
            }),
            "feedback" => Ok(Self::Feedback(rest.to_string())),
            "form" => Ok(Self::Form),
            "term" => {
                let (word, meaning) = rest
                    .split_once('=')
                    .ok_or_else(|| "usage: /term WORD = MEANING".to_string())?;
                Ok(Self::Term {
                    word: word.trim().to_string(),
                    meaning: meaning.trim().to_string(),
                })
            }
            "meaning" => {
                let (index, meaning) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| "usage: /meaning N TEXT".to_string())?;
                Ok(Self::Meaning {
                    index: position(Some(index))?,
                    meaning: meaning.trim().to_string(),
                })
            }
            "rmterm" => Ok(Self::RemoveTerm(position(arg)?)),
            "dismiss" => Ok(Self::Dismiss),
            "tool" => Ok(Self::Tool),
            "decline" => Ok(Self::Decline),
            "reopen" => Ok(Self::Reopen),
            "upload" => {
                let paths: Vec<PathBuf> = rest.split_whitespace().map(PathBuf::from).collect();
                if paths.is_empty() {
                    return Err("usage: /upload PATH...".to_string());
                }
                Ok(Self::Upload(paths))
            }
            "files" => Ok(Self::Files),
            "rm" => Ok(Self::RemoveFile(position(arg)?)),
            "tools" => Ok(Self::Tools),
            "rmtool" => arg
                .map(|id| Self::RemoveTool(id.to_string()))
                .ok_or_else(|| "usage: /rmtool ID".to_string()),
            "history" => Ok(Self::History),
            "sessions" => Ok(Self::Sessions),
            "logs" => match arg {
                None => Ok(Self::Logs(DEFAULT_LOG_LINES)),
                Some(n) => n
                    .parse()
                    .map(Self::Logs)
                    .map_err(|_| "usage: /logs [N]".to_string()),
            },
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            other => Err(format!("unknown command /{} (try /help)", other)),
        }
    }
}

/// Interactive session over stdin/stdout
pub struct Repl<B: ChatBackend + 'static> {
    chat: ChatController<B>,
    logs: LogBuffer,
    lines: Lines<BufReader<Stdin>>,
}

impl<B: ChatBackend + 'static> Repl<B> {
    pub fn new(chat: ChatController<B>, logs: LogBuffer) -> Self {
        Self {
            chat,
            logs,
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Read commands until /quit or end of input
    pub async fn run(mut self) -> Result<()> {
        loop {
            prompt("> ")?;
            let Some(line) = self.lines.next_line().await.context("Failed to read stdin")? else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            match Command::parse(&line) {
                Ok(Command::Quit) => break,
                Ok(command) => {
                    if let Err(e) = self.execute(command).await {
                        println!("  {RED}{}{RESET}", e);
                    }
                }
                Err(usage) => println!("  {YELLOW}{}{RESET}", usage),
            }
        }
        Ok(())
    }

    /// Print the conversation loaded so far (used after resuming)
    pub fn show_transcript(&self) {
        let entries = self.chat.transcript();
        for entry in entries.iter().rev() {
            let tag = match entry.id {
                Some(id) => format!("#{}", id),
                None => "·".to_string(),
            };
            let style = if entry.interactive { "" } else { DIM };
            println!(
                "  {style}{DIM}{:>4}{RESET}{style} {:<9} {}{RESET}",
                tag,
                entry.role,
                one_line_preview(&entry.content, 100)
            );
        }
    }

    async fn execute(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Query(text) => self.query(&text).await?,
            Command::Rate { feedback, message } => {
                let message = match message {
                    Some(id) => id,
                    None => latest_answer(&self.chat).ok_or(ChatError::NotArmed)?,
                };
                self.chat
                    .submit_feedback(FeedbackAction::Coarse { message, feedback })
                    .await?;
                println!("  {GREEN}✓{RESET} Rated #{}. Add details with /term and /feedback.", message);
            }
            Command::Feedback(text) => {
                let receipt = self
                    .chat
                    .submit_feedback(FeedbackAction::Detailed {
                        feedback_text: text,
                    })
                    .await?;
                if let FeedbackReceipt::Revised { message, content } = receipt {
                    print_answer(message, &content);
                }
            }
            Command::Form => match self.chat.armed_feedback() {
                Some(form) => print_form(&form),
                None => println!("  {DIM}No feedback form is open.{RESET}"),
            },
            Command::Term { word, meaning } => {
                self.chat.with_feedback_form(|form| {
                    let index = match form.items.iter().position(|i| i.word == word) {
                        Some(index) => index,
                        None => match form.items.iter().position(|i| i.word.trim().is_empty()) {
                            Some(blank) => blank,
                            None => form.add_item(),
                        },
                    };
                    if form.items[index].word != word {
                        form.set_word(index, word.clone())?;
                    }
                    form.set_meaning(index, meaning.clone())
                })?;
                self.show_form();
            }
            Command::Meaning { index, meaning } => {
                self.chat
                    .with_feedback_form(|form| form.set_meaning(index, meaning))?;
                self.show_form();
            }
            Command::RemoveTerm(index) => {
                self.chat
                    .with_feedback_form(|form| form.remove_item(index).map(|_| ()))?;
                self.show_form();
            }
            Command::Dismiss => {
                if self.chat.dismiss_feedback() {
                    println!("  {DIM}Feedback form closed.{RESET}");
                }
            }
            Command::Tool => self.tool_walkthrough().await?,
            Command::Decline => {
                self.chat.decline_tool_draft()?;
                self.print_latest();
            }
            Command::Reopen => {
                self.chat.reopen_tool_draft()?;
                print_reflexion_hint(&self.chat.reflexion_state());
            }
            Command::Upload(paths) => self.upload(paths).await?,
            Command::Files => {
                let uploading = self.chat.uploading();
                for upload in &uploading {
                    println!("  {YELLOW}…{RESET} {} {DIM}(uploading){RESET}", upload.name);
                }
                let files = self.chat.attachments();
                if files.is_empty() && uploading.is_empty() {
                    println!("  {DIM}No files.{RESET}");
                }
                for (i, file) in files.iter().enumerate() {
                    println!("  {:>3}. {}", i + 1, file.display_name);
                }
            }
            Command::RemoveFile(index) => {
                if self.chat.remove_file(index).await? {
                    println!("  {GREEN}✓{RESET} Removed.");
                } else {
                    println!("  {DIM}Nothing to remove at {}.{RESET}", index + 1);
                }
            }
            Command::Tools => {
                let tools = match self.chat.session_id() {
                    Some(_) => self.chat.refresh_tools().await?,
                    None => self.chat.tools(),
                };
                if tools.is_empty() {
                    println!("  {DIM}No custom tools.{RESET}");
                }
                for tool in tools {
                    println!(
                        "  {BOLD}{}{RESET} {DIM}[{}]{RESET} {}",
                        tool.name,
                        tool.id,
                        tool.description.as_deref().unwrap_or("")
                    );
                }
            }
            Command::RemoveTool(id) => {
                self.chat.delete_tool(&id).await?;
                println!("  {GREEN}✓{RESET} Tool {} deleted.", id);
            }
            Command::History => self.show_transcript(),
            Command::Sessions => {
                for session in self.chat.list_sessions().await? {
                    let current = self.chat.session_id().as_ref() == Some(&session.id);
                    println!(
                        "  {}{}{RESET} {} {DIM}{}{RESET}",
                        if current { GREEN } else { "" },
                        session.id,
                        session.title,
                        session.created_at.as_deref().unwrap_or("")
                    );
                }
            }
            Command::Logs(n) => {
                for entry in self.logs.recent(n) {
                    println!("  {DIM}{}{RESET}", entry);
                }
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => {}
        }
        Ok(())
    }

    async fn query(&self, text: &str) -> Result<()> {
        println!("  {DIM}Generating response...{RESET}");
        match self.chat.submit_query(text).await {
            Ok(outcome) => {
                if let Some(id) = latest_answer(&self.chat) {
                    print_answer(id, outcome.text());
                }
                match &outcome {
                    Outcome::NeedsReview { .. } => self.show_form(),
                    _ if outcome.is_capability_gap() => {
                        print_reflexion_hint(&self.chat.reflexion_state())
                    }
                    _ => {}
                }
                Ok(())
            }
            Err(ChatError::Transport(e)) => {
                self.print_latest();
                tracing::debug!("Query transport error: {}", e);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn tool_walkthrough(&mut self) -> Result<()> {
        if let Some(field) = self.chat.reflexion_state().flagged_field() {
            println!("  {YELLOW}{}{RESET}", field.prompt());
        }

        let Some(name) = self.read_field("Tool name: ").await? else {
            return Ok(());
        };
        let description = self.read_field("Description (docstring, optional): ").await?;
        println!("  {DIM}Code (optional), end with a line containing only '.':{RESET}");
        let code = self.read_block().await?;

        let mut draft = ToolDraft::new(name);
        if let Some(description) = description {
            draft = draft.with_description(description);
        }
        if !code.is_empty() {
            draft = draft.with_code(code);
        }

        println!("  {DIM}Creating new tool...{RESET}");
        match self.chat.submit_tool_draft(draft).await {
            Ok(ToolSubmission::Registered) => {
                println!("  {GREEN}✓{RESET} Tool registered.");
                Ok(())
            }
            Ok(ToolSubmission::Rerun(outcome)) => {
                println!("  {GREEN}✓{RESET} Tool added. Re-ran your question:");
                self.print_latest_answer(&outcome);
                print_reflexion_hint(&self.chat.reflexion_state());
                Ok(())
            }
            Err(ChatError::Rejected(field)) => {
                println!("  {YELLOW}{}{RESET} Run /tool again.", field.prompt());
                Ok(())
            }
            Err(ChatError::Transport(_)) if self.chat.pending_rerun_query().is_some() => {
                self.print_latest();
                println!("  {DIM}/reopen to try again.{RESET}");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn upload(&self, paths: Vec<PathBuf>) -> Result<()> {
        let mut uploads = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            uploads.push(FileUpload::new(name, bytes));
        }

        let requested = uploads.len();
        let uploaded = self.chat.upload_files(uploads).await;
        for file in &uploaded {
            println!("  {GREEN}✓{RESET} {}", file.display_name);
        }
        if uploaded.len() < requested {
            println!(
                "  {YELLOW}{} of {} uploads failed (see /logs).{RESET}",
                requested - uploaded.len(),
                requested
            );
        }
        Ok(())
    }

    async fn read_field(&mut self, label: &str) -> Result<Option<String>> {
        prompt(&format!("  {}", label))?;
        let line = self.lines.next_line().await.context("Failed to read stdin")?;
        Ok(line.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()))
    }

    async fn read_block(&mut self) -> Result<String> {
        let mut block = Vec::new();
        while let Some(line) = self.lines.next_line().await.context("Failed to read stdin")? {
            if line.trim() == "." {
                break;
            }
            block.push(line);
        }
        Ok(block.join("\n"))
    }

    fn show_form(&self) {
        if let Some(form) = self.chat.armed_feedback() {
            print_form(&form);
        }
    }

    fn print_latest(&self) {
        if let Some(message) = self.chat.messages().first() {
            print_answer(message.id, &message.content);
        }
    }

    fn print_latest_answer(&self, outcome: &Outcome) {
        if let Some(id) = latest_answer(&self.chat) {
            print_answer(id, outcome.text());
        }
    }
}

fn latest_answer<B: ChatBackend + 'static>(chat: &ChatController<B>) -> Option<MessageId> {
    chat.messages()
        .iter()
        .find(|m| m.role == Role::Assistant && !m.is_loading)
        .map(|m| m.id)
}

fn prompt(label: &str) -> Result<()> {
    print!("{}", label);
    std::io::stdout().flush().context("Failed to flush stdout")
}

fn print_answer(id: MessageId, text: &str) {
    println!("  {DIM}#{}{RESET} {BOLD}{CYAN}assistant{RESET}", id);
    for line in text.lines() {
        println!("    {}", line);
    }
}

fn print_form(form: &FeedbackForm) {
    let rating = if form.positive { "positive" } else { "needs correction" };
    println!("  {MAGENTA}Feedback on #{}{RESET} {DIM}({}){RESET}", form.target, rating);
    for (i, item) in form.items.iter().enumerate() {
        let lock = if item.is_pre_filled { " 🔒" } else { "" };
        let word = if item.word.is_empty() { "…" } else { &item.word };
        let meaning = if item.meaning.is_empty() { "…" } else { &item.meaning };
        println!("    {:>2}. {}{} = {}", i + 1, word, lock, meaning);
    }
    println!("  {DIM}/term WORD = MEANING, /meaning N TEXT, then /feedback TEXT{RESET}");
}

fn print_reflexion_hint(state: &ReflexionState) {
    if !state.is_form_open() {
        return;
    }
    let target = state
        .slot()
        .map(|id| format!(" for message #{}", id))
        .unwrap_or_default();
    println!("  {YELLOW}▸{RESET} Add a tool{target} with {BOLD}/tool{RESET} or skip with {BOLD}/decline{RESET}.");
}
