//! Mail submission.

use std::collections::BTreeSet;
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// A digest mail ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub from: String,
    pub to: String,
    pub subject: String,
    /// HTML body
    pub body: String,
}

impl Message {
    /// Format as an RFC 5322 message with an HTML body.
    ///
    /// Header values never span lines; a non-ASCII subject is sent as an
    /// RFC 2047 encoded word.
    pub fn to_rfc5322(&self) -> String {
        format!(
            "From: {}\nTo: {}\nSubject: {}\nMIME-Version: 1.0\nContent-Type: text/html; charset=utf-8\n\n{}",
            single_line(&self.from),
            single_line(&self.to),
            encode_subject(&self.subject),
            self.body
        )
    }
}

fn single_line(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

fn encode_subject(subject: &str) -> String {
    let subject = single_line(subject);
    if subject.is_ascii() {
        subject
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(subject.as_bytes()))
    }
}

/// Delivers messages.
///
/// `send` returns the addresses the remote end refused; an empty set means
/// the message was accepted for every addressee. An `Err` means nothing
/// could be submitted at all.
pub trait Transport: Send + Sync {
    fn send(&self, message: &Message) -> Result<BTreeSet<String>, Error>;
}

/// Submits through a sendmail-compatible program.
pub struct Sendmail {
    command: Vec<String>,
}

impl Sendmail {
    /// `command` is the program and its leading arguments, e.g. `["sendmail", "-oi"]`.
    pub fn new(command: Vec<String>) -> Result<Self, Error> {
        if command.is_empty() {
            return Err(Error::NoCommand);
        }
        Ok(Self { command })
    }
}

impl Transport for Sendmail {
    fn send(&self, message: &Message) -> Result<BTreeSet<String>, Error> {
        let (program, args) = self.command.split_first().ok_or(Error::NoCommand)?;

        let mut child = Command::new(program)
            .args(args)
            .arg("--")
            .arg(&message.to)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Exec(format!("{program}: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(message.to_rfc5322().as_bytes()) {
                Ok(()) => {}
                // Refusing the recipient before reading the message is normal;
                // the exit status below carries the verdict
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
                Err(e) => {
                    drop(stdin);
                    let _ = child.wait();
                    return Err(Error::Submit(format!("{program}: {e}")));
                }
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| Error::Submit(format!("{program}: {e}")))?;

        if output.status.success() {
            Ok(BTreeSet::new())
        } else {
            tracing::warn!(
                to = %message.to,
                "{program} rejected message: {}",
                String::from_utf8_lossy(&output.stderr).trim_end()
            );
            Ok(BTreeSet::from([message.to.clone()]))
        }
    }
}

/// Errors from mail submission.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no mail submission command configured")]
    NoCommand,

    #[error("failed to execute: {0}")]
    Exec(String),

    #[error("failed to submit message: {0}")]
    Submit(String),
}
