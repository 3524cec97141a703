//! Mock collaborators.

use async_trait::async_trait;
use pwa_accounts::{AccountResult, Mailer};
use std::sync::Mutex;

/// A mail captured by [`RecordingMailer`].
#[derive(Clone, Debug)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub content_type: String,
    pub cc: Option<String>,
}

/// Mailer that records messages instead of sending them.
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
    reject: bool,
}

#[allow(dead_code)]
impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose transport refuses every message.
    pub fn rejecting() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            reject: true,
        }
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_mail(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        content_type: &str,
        cc: Option<&str>,
    ) -> AccountResult<bool> {
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            content_type: content_type.to_string(),
            cc: cc.map(str::to_string),
        });
        Ok(!self.reject)
    }
}
