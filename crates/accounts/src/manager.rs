//! Account manager: onboarding, installation reconciliation and removal.

use crate::account::AccountAccessor;
use crate::error::{AccountError, AccountResult};
use crate::inst::{Credentials, InstAccessor};
use crate::mailer::{CONTENT_TYPE_HTML, Mailer};
use crate::open_inst::OpenInstAccessor;
use pwa_core::config::AppConfig;
use pwa_core::{ObfuscatedPasswd, PasswdTransformer, is_similar_user_agent};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use pwa_metadata::{InstRow, MetadataStore};
use std::fmt;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

/// Characters escaped in query values: everything but RFC 3986 unreserved.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Subject of the onboarding mail.
pub const INVITE_SUBJECT: &str = "Your app installation";

/// Outcome of a successful [`AccountMgr::add_or_modify_inst`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reconciliation {
    /// An installation with the given id and matching credentials was
    /// updated.
    Updated,
    /// A pending open installation was bound to the given id.
    Promoted,
    /// A recent installation with a similar user agent was bound to the
    /// given id.
    Rebound,
}

impl fmt::Display for Reconciliation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Updated => "updated",
            Self::Promoted => "promoted",
            Self::Rebound => "rebound",
        })
    }
}

/// Reconciliation rules, evaluated in order; the first that matches wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Rule {
    UpdateExisting,
    PromoteOpenInst,
    RebindSimilar,
}

const RULES: [Rule; 3] = [Rule::UpdateExisting, Rule::PromoteOpenInst, Rule::RebindSimilar];

/// What a matching rule does.
#[derive(Debug)]
enum Action {
    Update,
    Promote { passwd_hash: String },
    Rebind { previous: InstRow },
}

/// Device metadata and credentials presented for reconciliation.
struct InstRequest<'a> {
    inst_id: &'a str,
    username: &'a str,
    obfuscated: &'a ObfuscatedPasswd,
    user_agent: &'a str,
    app_version: &'a str,
    launcher: Option<&'a str>,
}

impl InstRequest<'_> {
    fn credentials(&self) -> Credentials<'_> {
        Credentials::new(self.username, self.obfuscated)
    }
}

/// Orchestrates the account, open installation and installation accessors.
#[derive(Clone)]
pub struct AccountMgr {
    store: Arc<dyn MetadataStore>,
    account_accessor: AccountAccessor,
    open_inst_accessor: OpenInstAccessor,
    inst_accessor: InstAccessor,
    max_prev_inst_age: Duration,
}

impl AccountMgr {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        transformer: Arc<PasswdTransformer>,
        max_open_inst_age: Duration,
        max_prev_inst_age: Duration,
        min_replaceable_inst_age: Option<Duration>,
    ) -> Self {
        Self {
            account_accessor: AccountAccessor::new(store.clone()),
            open_inst_accessor: OpenInstAccessor::new(
                store.clone(),
                transformer.clone(),
                max_open_inst_age,
            ),
            inst_accessor: InstAccessor::new(store.clone(), transformer, min_replaceable_inst_age),
            store,
            max_prev_inst_age,
        }
    }

    /// Open the configured store and build all accessors.
    pub async fn from_config(config: &AppConfig) -> AccountResult<Self> {
        config.validate().map_err(pwa_core::Error::Config)?;

        let store = pwa_metadata::from_config(&config.db).await?;
        let transformer = Arc::new(PasswdTransformer::new(
            config.passwd_key.as_bytes(),
            config.hash_cost,
        )?);

        Ok(Self::new(
            store,
            transformer,
            config.max_open_inst_age.duration(),
            config.max_prev_inst_age.duration(),
            config
                .min_replaceable_inst_age
                .as_ref()
                .map(|age| age.duration()),
        ))
    }

    pub fn account_accessor(&self) -> &AccountAccessor {
        &self.account_accessor
    }

    pub fn open_inst_accessor(&self) -> &OpenInstAccessor {
        &self.open_inst_accessor
    }

    pub fn inst_accessor(&self) -> &InstAccessor {
        &self.inst_accessor
    }

    /// Create all tables. Fails if they already exist.
    pub async fn create_tables(&self) -> AccountResult<()> {
        self.store.create_tables().await?;
        Ok(())
    }

    /// Issue an open installation, creating the account on first use.
    pub async fn add_open_inst(&self, username: &str) -> AccountResult<ObfuscatedPasswd> {
        if self.account_accessor.get(username).await?.is_none() {
            self.account_accessor.add(username).await?;
        }

        self.open_inst_accessor.add(username).await
    }

    /// Issue an open installation and mail its link to `email`.
    pub async fn invite(
        &self,
        username: &str,
        email: &str,
        app_url: &str,
        mailer: &dyn Mailer,
    ) -> AccountResult<ObfuscatedPasswd> {
        let obfuscated = self.add_open_inst(username).await?;
        let link = invite_link(app_url, username, &obfuscated);

        let body = format!(
            "<!DOCTYPE html>\n\n<html>\n  <head>\n    <meta charset=\"UTF-8\"/>\n  </head>\n\n  \
             <body>\n    <p>Hello {name},</p>\n    <p><a href=\"{href}\">Install the app</a> \
             on your device.</p>\n  </body>\n</html>\n",
            name = escape_html(username),
            href = escape_html(&link),
        );

        if !mailer
            .send_mail(email, INVITE_SUBJECT, &body, CONTENT_TYPE_HTML, None)
            .await?
        {
            return Err(AccountError::Mail(format!(
                "onboarding mail to {email} was not accepted"
            )));
        }
        tracing::info!(username = %username, email = %email, "Onboarding mail sent");

        Ok(obfuscated)
    }

    /// Bind a device to an account or refresh its metadata.
    ///
    /// Rules are tried in order:
    /// 1. an installation with `inst_id` and matching credentials is updated;
    /// 2. a valid open installation for the credentials becomes an
    ///    installation with its password hash;
    /// 3. the single installation of the user whose password verifies and
    ///    whose user agent is similar, if modified within the maximum
    ///    previous installation age, is copied to `inst_id`, keeping its
    ///    user agent.
    ///
    /// Fails with `NotFound` when no rule matches, and when `inst_id` exists
    /// with other credentials.
    pub async fn add_or_modify_inst(
        &self,
        inst_id: &str,
        username: &str,
        obfuscated: &ObfuscatedPasswd,
        user_agent: &str,
        app_version: &str,
        launcher: Option<&str>,
    ) -> AccountResult<Reconciliation> {
        let req = InstRequest {
            inst_id,
            username,
            obfuscated,
            user_agent,
            app_version,
            launcher,
        };

        for rule in RULES {
            if let Some(action) = self.evaluate(rule, &req).await? {
                tracing::debug!(rule = ?rule, inst_id = %inst_id, "Reconciliation rule matched");
                return self.apply(action, &req).await;
            }
        }

        tracing::info!(
            username = %username,
            inst_id = %inst_id,
            "No installation matches the credentials"
        );
        Err(AccountError::NotFound(format!(
            "inst {inst_id} for user {username} with password {}",
            obfuscated.to_base64()
        )))
    }

    async fn evaluate(&self, rule: Rule, req: &InstRequest<'_>) -> AccountResult<Option<Action>> {
        match rule {
            Rule::UpdateExisting => Ok(self
                .inst_accessor
                .get(req.inst_id, Some(req.credentials()))
                .await?
                .map(|_| Action::Update)),

            Rule::PromoteOpenInst => Ok(self
                .open_inst_accessor
                .get(req.username, req.obfuscated)
                .await?
                .map(|open_inst| Action::Promote {
                    passwd_hash: open_inst.passwd_hash,
                })),

            Rule::RebindSimilar => {
                let transformer = self.inst_accessor.transformer();
                let mut candidates: Vec<InstRow> = self
                    .inst_accessor
                    .get_user_insts(req.username)
                    .await?
                    .into_iter()
                    .filter(|inst| {
                        is_similar_user_agent(&inst.user_agent, req.user_agent)
                            && transformer.verify(req.obfuscated, &inst.passwd_hash)
                    })
                    .collect();

                if candidates.len() != 1 {
                    if candidates.len() > 1 {
                        tracing::info!(
                            username = %req.username,
                            candidates = candidates.len(),
                            "Ambiguous previous installations"
                        );
                    }
                    return Ok(None);
                }

                let previous = candidates.remove(0);
                let too_old = previous
                    .modified
                    .checked_add(self.max_prev_inst_age)
                    .is_some_and(|limit| limit <= OffsetDateTime::now_utc());
                if too_old {
                    tracing::info!(
                        username = %req.username,
                        inst_id = %previous.short_inst_id(),
                        modified = %previous.modified,
                        "Previous installation too old to rebind"
                    );
                    return Ok(None);
                }

                Ok(Some(Action::Rebind { previous }))
            }
        }
    }

    async fn apply(&self, action: Action, req: &InstRequest<'_>) -> AccountResult<Reconciliation> {
        match action {
            Action::Update => {
                self.inst_accessor
                    .update_inst(req.inst_id, req.user_agent, req.app_version, req.launcher)
                    .await?;
                tracing::info!(
                    username = %req.username,
                    inst_id = %req.inst_id,
                    app_version = %req.app_version,
                    "Installation updated"
                );
                Ok(Reconciliation::Updated)
            }

            Action::Promote { passwd_hash } => {
                self.inst_accessor
                    .add(
                        req.inst_id,
                        req.username,
                        &passwd_hash,
                        req.user_agent,
                        req.app_version,
                        req.launcher,
                    )
                    .await?;
                self.open_inst_accessor.remove(&passwd_hash).await?;
                tracing::info!(
                    username = %req.username,
                    inst_id = %req.inst_id,
                    "Open installation promoted"
                );
                Ok(Reconciliation::Promoted)
            }

            Action::Rebind { previous } => {
                self.inst_accessor
                    .add(
                        req.inst_id,
                        req.username,
                        &previous.passwd_hash,
                        &previous.user_agent,
                        req.app_version,
                        req.launcher,
                    )
                    .await?;
                tracing::info!(
                    username = %req.username,
                    inst_id = %req.inst_id,
                    previous_inst_id = %previous.short_inst_id(),
                    "Previous installation rebound"
                );
                Ok(Reconciliation::Rebound)
            }
        }
    }

    /// Remove an installation, and its account once the user has neither
    /// installations nor open installations left.
    ///
    /// Fails with `NotFound` if `inst_id` does not exist.
    pub async fn remove_inst(&self, inst_id: &str) -> AccountResult<()> {
        let Some(inst) = self.inst_accessor.get(inst_id, None).await? else {
            return Err(AccountError::NotFound(format!("inst {inst_id}")));
        };

        self.inst_accessor.remove(inst_id).await?;
        tracing::info!(username = %inst.username, inst_id = %inst_id, "Installation removed");

        if !self
            .inst_accessor
            .get_user_insts(&inst.username)
            .await?
            .is_empty()
        {
            return Ok(());
        }

        if !self
            .open_inst_accessor
            .get_user_insts(&inst.username)
            .await?
            .is_empty()
        {
            return Ok(());
        }

        self.account_accessor.remove(&inst.username).await
    }
}

/// Onboarding link carrying the username and obfuscated password.
pub fn invite_link(app_url: &str, username: &str, obfuscated: &ObfuscatedPasswd) -> String {
    let separator = if app_url.contains('?') { '&' } else { '?' };
    format!(
        "{app_url}{separator}username={}&passwd={}",
        utf8_percent_encode(username, QUERY_VALUE),
        obfuscated.to_base64()
    )
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
