//! Outgoing mail used to deliver onboarding links.

use crate::error::{AccountError, AccountResult};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use pwa_core::config::MailConfig;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub const CONTENT_TYPE_HTML: &str = "text/html";
pub const CONTENT_TYPE_PLAIN: &str = "text/plain";

pub const TEST_MAIL_SUBJECT: &str = "Test mail from pwactl";

pub const TEST_MAIL_BODY: &str = r#"<!DOCTYPE html>

<html>
  <head>
    <meta charset="UTF-8"/>
  </head>

  <body>
    <p><a href="https://loremipsum.de/">Lorem ipsum</a> dolor sit amet,
      consetetur sadipscing elitr, sed diam nonumy eirmod tempor invidunt
      ut labore et dolore magna aliquyam erat, sed diam voluptua.</p>
  </body>
</html>
"#;

/// Mail delivery.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send a message. Returns whether the transport accepted it.
    async fn send_mail(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        content_type: &str,
        cc: Option<&str>,
    ) -> AccountResult<bool>;

    /// Send a fixed HTML message to check the mail setup.
    async fn send_test_mail(&self, to: &str) -> AccountResult<bool> {
        self.send_mail(to, TEST_MAIL_SUBJECT, TEST_MAIL_BODY, CONTENT_TYPE_HTML, None)
            .await
    }
}

/// Build the mailer selected by configuration.
pub fn from_config(config: &MailConfig) -> Arc<dyn Mailer> {
    match config {
        MailConfig::Log => Arc::new(LogMailer),
        MailConfig::Sendmail { command, from } => {
            Arc::new(SendmailMailer::new(command.clone(), from.clone()))
        }
    }
}

/// Mailer that only logs what it would send.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_mail(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        content_type: &str,
        cc: Option<&str>,
    ) -> AccountResult<bool> {
        tracing::info!(
            to = %to,
            cc = ?cc,
            subject = %subject,
            content_type = %content_type,
            body_len = body.len(),
            "Mail not delivered (log mailer)"
        );
        Ok(true)
    }
}

/// Mailer piping RFC 5322 messages into a sendmail-compatible command.
#[derive(Clone, Debug)]
pub struct SendmailMailer {
    command: Vec<String>,
    from: String,
}

impl SendmailMailer {
    pub fn new(command: Vec<String>, from: String) -> Self {
        Self { command, from }
    }

    /// Render the full message handed to the command.
    pub fn compose(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        content_type: &str,
        cc: Option<&str>,
    ) -> AccountResult<String> {
        for (name, value) in [("to", Some(to)), ("subject", Some(subject)), ("cc", cc)] {
            if let Some(value) = value
                && value.contains(['\r', '\n'])
            {
                return Err(AccountError::Mail(format!(
                    "line break in {name} header"
                )));
            }
        }

        let mut message = String::new();
        message.push_str(&format!("From: {}\r\n", self.from));
        message.push_str(&format!("To: {to}\r\n"));
        if let Some(cc) = cc {
            message.push_str(&format!("Cc: {cc}\r\n"));
        }
        message.push_str(&format!("Subject: {}\r\n", encode_header(subject)));
        message.push_str("MIME-Version: 1.0\r\n");
        message.push_str(&format!(
            "Content-Type: {content_type}; charset=UTF-8\r\n"
        ));
        message.push_str("Content-Transfer-Encoding: 8bit\r\n");
        message.push_str("\r\n");
        message.push_str(&body.replace("\r\n", "\n").replace('\n', "\r\n"));
        Ok(message)
    }
}

#[async_trait]
impl Mailer for SendmailMailer {
    async fn send_mail(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        content_type: &str,
        cc: Option<&str>,
    ) -> AccountResult<bool> {
        let message = self.compose(to, subject, body, content_type, cc)?;

        let Some((program, args)) = self.command.split_first() else {
            return Err(AccountError::Mail("no mail command configured".to_string()));
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| AccountError::Mail(format!("failed to run {program}: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(message.as_bytes()).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    tracing::debug!(program = %program, "Mail command closed stdin early");
                }
                Err(e) => {
                    return Err(AccountError::Mail(format!("failed to write message: {e}")));
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| AccountError::Mail(format!("failed to wait for {program}: {e}")))?;

        if status.success() {
            tracing::info!(to = %to, subject = %subject, "Mail handed to sendmail");
        } else {
            tracing::warn!(to = %to, status = %status, "Sendmail rejected message");
        }
        Ok(status.success())
    }
}

/// Encode a header value as an RFC 2047 encoded word if it is not ASCII.
fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value))
    }
}
