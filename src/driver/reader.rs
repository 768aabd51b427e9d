//! Line-by-line stdout reading and prompt matching

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout};

use crate::types::{DeliveryReport, PromptRule, RunId};

use super::writer::ResponseWriter;

/// Stdout observed so far
#[derive(Debug, Default)]
pub(super) struct Transcript {
    pub stdout: String,
    pub lines: Vec<String>,
    pub prompts_matched: usize,
}

/// Per-run state that has to outlive an interrupted read loop
pub(super) struct RunState {
    run_id: RunId,
    stdin: Option<ChildStdin>,
    writer: Option<ResponseWriter>,
    pub transcript: Transcript,
    pub delivery: Option<DeliveryReport>,
}

impl RunState {
    pub(super) fn new(run_id: RunId, stdin: ChildStdin) -> Self {
        Self {
            run_id,
            stdin: Some(stdin),
            writer: None,
            transcript: Transcript::default(),
            delivery: None,
        }
    }

    /// Read stdout until end-of-stream, answering prompts as they appear
    ///
    /// Only one line is buffered at a time, so a response is queued before
    /// anything the child prints after the prompt is read.
    ///
    /// # Errors
    /// Returns error if reading stdout fails
    pub(super) async fn read_stdout(
        &mut self,
        stdout: ChildStdout,
        rules: &[PromptRule],
    ) -> std::io::Result<()> {
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break; // EOF
            }
            let raw = String::from_utf8_lossy(&buf);
            self.observe(&raw, rules);
        }

        log::debug!(
            "[{}] stdout closed after {} line(s)",
            self.run_id,
            self.transcript.lines.len()
        );
        Ok(())
    }

    /// Record one raw line and fire every rule it matches
    pub(super) fn observe(&mut self, raw: &str, rules: &[PromptRule]) {
        self.transcript.stdout.push_str(raw);

        let line = raw.trim();
        log::debug!("[{}] < {line}", self.run_id);
        self.transcript.lines.push(line.to_string());

        for rule in rules.iter().filter(|rule| rule.matches(raw)) {
            self.transcript.prompts_matched += 1;
            log::info!(
                "[{}] prompt matched `{}`, answering with {} line(s)",
                self.run_id,
                rule.matcher().as_str(),
                rule.response().len()
            );
            self.respond(rule.response());
        }
    }

    /// Hand response lines to the writer, starting it on first use
    fn respond(&mut self, response: &[String]) {
        if response.is_empty() {
            return;
        }

        if self.writer.is_none()
            && let Some(stdin) = self.stdin.take()
        {
            self.writer = Some(ResponseWriter::spawn(self.run_id, stdin));
        }

        match self.writer {
            Some(ref writer) => {
                if !writer.queue(response) {
                    log::warn!(
                        "[{}] response writer already stopped; dropping {} line(s)",
                        self.run_id,
                        response.len()
                    );
                }
            }
            None => log::warn!("[{}] stdin already released; dropping response", self.run_id),
        }
    }

    /// Close stdin and join the writer, if one was started
    pub(super) async fn release_stdin(&mut self, join_timeout: Duration) {
        drop(self.stdin.take());

        match self.writer.take() {
            Some(writer) => {
                let report = writer.finish(join_timeout).await;
                log::debug!(
                    "[{}] response writer finished: {} line(s) delivered",
                    self.run_id,
                    report.lines_delivered
                );
                self.delivery = Some(report);
            }
            None => log::debug!("[{}] no prompt answered; no writer to join", self.run_id),
        }
    }
}
