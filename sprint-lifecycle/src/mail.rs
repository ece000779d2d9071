//! Mail collaborator.
//!
//! Mail is fire-and-forget from the caller's point of view: the registration
//! desk dispatches it on a spawned task and only logs a failure.

use async_trait::async_trait;
use sprint_core::{MailError, RegistrationRecord};

/// One outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl Mail {
    /// Confirmation sent after a registration is stored. `None` when the
    /// team has no contact address.
    pub fn registration_confirmation(registration: &RegistrationRecord) -> Option<Self> {
        let to = registration.primary_email()?.to_string();
        let subject = format!("Registration received: {}", registration.team_name);
        let members = registration
            .team
            .iter()
            .map(|m| m.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let text = format!(
            "Hello {team},\n\nYour registration {id} has been received.\nTeam members: {members}\nAmount due: {amount}\n\nComplete the payment to receive your team id.\n",
            team = registration.team_name,
            id = registration.registration_id,
            members = members,
            amount = registration.amount,
        );
        let html = format!(
            "<p>Hello {team},</p><p>Your registration <b>{id}</b> has been received.</p><p>Team members: {members}<br/>Amount due: {amount}</p><p>Complete the payment to receive your team id.</p>",
            team = html_escape(&registration.team_name),
            id = registration.registration_id,
            members = html_escape(&members),
            amount = registration.amount,
        );

        Some(Self {
            to,
            subject,
            text,
            html,
        })
    }
}

fn html_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, mail: Mail) -> Result<(), MailError>;
}

/// Writes mail to the log instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl MailSender for LogMailer {
    async fn send(&self, mail: Mail) -> Result<(), MailError> {
        tracing::info!(to = %mail.to, subject = %mail.subject, "Mail (not sent, log mailer)");
        Ok(())
    }
}
