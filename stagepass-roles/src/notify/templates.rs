//! Email templates keyed by audited action
//!
//! Each key maps to a subject line plus a plain-text body and an HTML alternative, both
//! rendered from the account and the request. Cancellation has no template: the owner performed it.

use std::fmt;

use crate::models::{Account, AuditAction, UpgradeRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKey {
    KycVerified,
    KycRejected,
    RoleApproved,
    RoleRejected,
}

impl TemplateKey {
    pub fn for_action(action: AuditAction) -> Option<Self> {
        match action {
            AuditAction::KycVerified => Some(TemplateKey::KycVerified),
            AuditAction::KycRejected => Some(TemplateKey::KycRejected),
            AuditAction::RoleApproved => Some(TemplateKey::RoleApproved),
            AuditAction::RoleRejected => Some(TemplateKey::RoleRejected),
            AuditAction::RequestCanceled => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKey::KycVerified => "kyc_verified",
            TemplateKey::KycRejected => "kyc_rejected",
            TemplateKey::RoleApproved => "role_approved",
            TemplateKey::RoleRejected => "role_rejected",
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            TemplateKey::KycVerified => "Your identity verification was approved",
            TemplateKey::KycRejected => "Your identity verification needs attention",
            TemplateKey::RoleApproved => "Your role upgrade request was approved",
            TemplateKey::RoleRejected => "Your role upgrade request was not approved",
        }
    }
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendering context
pub struct TemplateContext<'a> {
    pub account: &'a Account,
    pub request: &'a UpgradeRequest,
    pub notes: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
    /// Same paragraphs as `body`, escaped and wrapped for an HTML alternative part
    pub html_body: String,
}

pub fn render(key: TemplateKey, ctx: &TemplateContext<'_>) -> RenderedMessage {
    let name = if ctx.account.display_name.trim().is_empty() {
        ctx.account.email.as_str()
    } else {
        ctx.account.display_name.as_str()
    };
    let label = ctx.request.request_type.label();
    let notes = ctx.notes.trim();

    let mut paragraphs = vec![format!("Hello {},", name)];
    match key {
        TemplateKey::KycVerified => {
            paragraphs.push(format!(
                "The identity documents attached to your request #{} ({}) have been verified. \
                 An administrator will now review the request itself.",
                ctx.request.id, label
            ));
        }
        TemplateKey::KycRejected => {
            paragraphs.push(format!(
                "We could not verify the identity documents attached to your request #{} ({}).",
                ctx.request.id, label
            ));
            let reason = ctx
                .request
                .kyc_reject_reason
                .as_deref()
                .filter(|r| !r.trim().is_empty())
                .unwrap_or(notes);
            if !reason.is_empty() {
                paragraphs.push(format!("Reason: {}", reason));
            }
        }
        TemplateKey::RoleApproved => {
            paragraphs.push(format!(
                "Your request #{} ({}) has been approved. Your account now shows as \"{}\".",
                ctx.request.id,
                label,
                ctx.account.display_role()
            ));
        }
        TemplateKey::RoleRejected => {
            paragraphs.push(format!(
                "Your request #{} ({}) was not approved.",
                ctx.request.id, label
            ));
        }
    }

    if !notes.is_empty() && key != TemplateKey::KycRejected {
        paragraphs.push(format!("Notes from the reviewer: {}", notes));
    }
    paragraphs.push("The StagePass team".to_string());

    let subject = key.subject();
    let mut body = paragraphs.join("\n\n");
    body.push('\n');

    let html_paragraphs: String = paragraphs
        .iter()
        .map(|p| format!("    <p>{}</p>\n", escape_html(p)))
        .collect();
    let html_body = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{}</title>
</head>
<body>
{}</body>
</html>
"#,
        escape_html(subject),
        html_paragraphs
    );

    RenderedMessage {
        subject: subject.to_string(),
        body,
        html_body,
    }
}

/// Escape text for an HTML element body or quoted attribute
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{KycEvidence, NewUpgradeRequest};
    use chrono::Utc;

    fn fixtures() -> (Account, UpgradeRequest) {
        let now = Utc::now();
        let account = Account {
            id: 3,
            email: "dj@example.com".into(),
            display_name: "DJ Nova".into(),
            is_artist: true,
            is_host: false,
            is_superuser: false,
            created_at: now,
            updated_at: now,
        };
        let new = NewUpgradeRequest::new(3, "to_artist", "I play sets", KycEvidence::default())
            .unwrap();
        (account, UpgradeRequest::from_new(12, new, now))
    }

    #[test]
    fn test_cancel_has_no_template() {
        assert_eq!(TemplateKey::for_action(AuditAction::RequestCanceled), None);
        assert_eq!(
            TemplateKey::for_action(AuditAction::RoleApproved),
            Some(TemplateKey::RoleApproved)
        );
    }

    #[test]
    fn test_role_approved_mentions_request_and_role() {
        let (account, request) = fixtures();
        let msg = render(
            TemplateKey::RoleApproved,
            &TemplateContext {
                account: &account,
                request: &request,
                notes: "Welcome aboard",
            },
        );
        assert_eq!(msg.subject, "Your role upgrade request was approved");
        assert!(msg.body.starts_with("Hello DJ Nova,"));
        assert!(msg.body.contains("#12 (Upgrade to Artist)"));
        assert!(msg.body.contains("\"Artist\""));
        assert!(msg.body.contains("Welcome aboard"));
    }

    #[test]
    fn test_kyc_rejected_includes_reason_once() {
        let (account, mut request) = fixtures();
        request.verify_kyc(1, false, "Blurry document", Utc::now());
        let msg = render(
            TemplateKey::KycRejected,
            &TemplateContext {
                account: &account,
                request: &request,
                notes: "Blurry document",
            },
        );
        assert_eq!(msg.body.matches("Blurry document").count(), 1);
    }

    #[test]
    fn test_html_body_escapes_user_text() {
        let (mut account, request) = fixtures();
        account.display_name = "DJ <Nova>".into();
        let msg = render(
            TemplateKey::RoleRejected,
            &TemplateContext {
                account: &account,
                request: &request,
                notes: "Use <b>real</b> links & \"quotes\"",
            },
        );
        assert!(msg.body.contains("Hello DJ <Nova>,"));
        assert!(msg.html_body.starts_with("<!DOCTYPE html>"));
        assert!(msg.html_body.contains("<title>Your role upgrade request was not approved</title>"));
        assert!(msg.html_body.contains("<p>Hello DJ &lt;Nova&gt;,</p>"));
        assert!(msg
            .html_body
            .contains("Use &lt;b&gt;real&lt;/b&gt; links &amp; &quot;quotes&quot;"));
        assert!(!msg.html_body.contains("<b>"));
        assert_eq!(msg.html_body.matches("<p>").count(), 4);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("plain"), "plain");
        assert_eq!(escape_html("a<b>&'c'"), "a&lt;b&gt;&amp;&#39;c&#39;");
    }
}
