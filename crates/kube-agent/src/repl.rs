//! Interactive read-line loop.

use std::io::{self, Write};

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;

use crate::error::SessionError;
use crate::model::ChatModel;
use crate::prompt::CONTEXT_QUESTION;
use crate::session::AgentSession;
use crate::transport::ToolTransport;

/// Prompt shown before each line.
pub const PROMPT: &str = "⎈  kubectl> ";

const RULE_WIDTH: usize = 70;

/// Usage banner, printed at startup and on `help`.
pub const BANNER: &str = "\
⎈  Kubernetes Operations Agent (kubectl powered)

📋 What you can ask:

  Resource Management:
    • List all pods in the cluster
    • Show deployments in the production namespace
    • Get service details for nginx
    • Describe node worker-1

  Troubleshooting:
    • Why is my pod failing?
    • Show logs from the api-server pod
    • Check events in the kube-system namespace
    • Get the last 50 lines of logs from a pod

  Context & Configuration:
    • What's my current context?
    • List all available contexts
    • Switch to the staging cluster

  Advanced Operations:
    • Scale a deployment to 5 replicas
    • Show all resources in a namespace

💡 Commands: 'exit', 'quit', 'q' - End session | 'help' - Show this menu";

/// One line of operator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input<'a> {
    /// `exit`, `quit` or `q`.
    Exit,
    /// `help`.
    Help,
    /// Nothing but whitespace.
    Empty,
    /// Anything else, trimmed.
    Utterance(&'a str),
}

impl<'a> Input<'a> {
    /// Classify a line. Reserved words are matched case-insensitively.
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        match line.to_ascii_lowercase().as_str() {
            "exit" | "quit" | "q" => Self::Exit,
            "help" => Self::Help,
            _ => Self::Utterance(line),
        }
    }
}

/// Why the loop ended.
#[derive(Debug)]
pub enum ExitReason {
    /// The operator typed an exit word.
    Exit,
    /// Interrupt signal.
    Interrupted,
    /// Input closed.
    Eof,
    /// The session can no longer serve requests.
    Fatal(SessionError),
}

/// Print the banner framed by rules.
pub fn print_banner(out: &mut impl Write) -> io::Result<()> {
    let rule = "=".repeat(RULE_WIDTH);
    writeln!(out, "\n{rule}\n{BANNER}\n{rule}\n")
}

/// Ask the model for the current context and print its answer.
///
/// A failure is reported but does not end the session.
pub async fn check_context<M, T>(session: &mut AgentSession<M, T>, out: &mut impl Write) -> io::Result<()>
where
    M: ChatModel,
    T: ToolTransport,
{
    writeln!(out, "🔍 Checking current kubectl context...")?;
    out.flush()?;
    match session.ask(CONTEXT_QUESTION).await {
        Ok(answer) => writeln!(out, "📍 {answer}\n"),
        Err(e) => writeln!(out, "⚠️  Could not retrieve context: {e}\n"),
    }
}

/// Run the loop until exit, interrupt, end of input or a fatal session error.
pub async fn run<M, T, R, W>(
    session: &mut AgentSession<M, T>,
    input: R,
    out: &mut W,
    cancel: &CancellationToken,
) -> io::Result<ExitReason>
where
    M: ChatModel,
    T: ToolTransport,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let rule = "─".repeat(RULE_WIDTH);

    loop {
        write!(out, "{PROMPT}")?;
        out.flush()?;

        let line = tokio::select! {
            () = cancel.cancelled() => return interrupted(out),
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            writeln!(out, "\n👋 Goodbye! Closing kubectl agent...")?;
            return Ok(ExitReason::Eof);
        };

        let utterance = match Input::parse(&line) {
            Input::Exit => {
                writeln!(out, "\n👋 Goodbye! Closing kubectl agent...")?;
                return Ok(ExitReason::Exit);
            }
            Input::Help => {
                print_banner(out)?;
                continue;
            }
            Input::Empty => continue,
            Input::Utterance(text) => text,
        };

        writeln!(out, "\n⏳ Executing kubectl operation...\n")?;
        out.flush()?;

        let outcome = tokio::select! {
            () = cancel.cancelled() => return interrupted(out),
            outcome = session.ask(utterance) => outcome,
        };

        match outcome {
            Ok(answer) => {
                writeln!(out, "{rule}\n📊 Response:\n{rule}\n{answer}\n{rule}\n")?;
            }
            Err(e) if e.is_fatal() => {
                writeln!(out, "\n❌ Error processing request: {e}")?;
                return Ok(ExitReason::Fatal(e));
            }
            Err(e) => {
                writeln!(out, "\n❌ Error processing request: {e}")?;
                writeln!(out, "💡 Try rephrasing your query or type 'help' for examples\n")?;
            }
        }
    }
}

/// Banner, context check and loop, then teardown.
///
/// The session is closed on every path, including when `out` stops
/// accepting writes; the first output error is returned only after that.
pub async fn run_session<M, T, R, W>(
    session: &mut AgentSession<M, T>,
    input: R,
    out: &mut W,
    cancel: &CancellationToken,
) -> io::Result<ExitReason>
where
    M: ChatModel,
    T: ToolTransport,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let outcome = interact(session, input, out, cancel).await;

    let notice = writeln!(out, "\n🧹 Cleaning up resources...");
    let report = match session.close().await {
        Ok(()) => writeln!(out, "✅ Tool server closed successfully"),
        Err(e) => writeln!(out, "⚠️  Error during cleanup: {e}"),
    };

    let reason = outcome?;
    notice?;
    report?;
    Ok(reason)
}

async fn interact<M, T, R, W>(
    session: &mut AgentSession<M, T>,
    input: R,
    out: &mut W,
    cancel: &CancellationToken,
) -> io::Result<ExitReason>
where
    M: ChatModel,
    T: ToolTransport,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    print_banner(out)?;
    tokio::select! {
        () = cancel.cancelled() => {}
        checked = check_context(session, out) => checked?,
    }
    if cancel.is_cancelled() {
        return interrupted(out);
    }
    run(session, input, out, cancel).await
}

fn interrupted(out: &mut impl Write) -> io::Result<ExitReason> {
    writeln!(out, "\n\n⚠️  Interrupted by user. Exiting...")?;
    Ok(ExitReason::Interrupted)
}
