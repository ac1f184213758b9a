//! Operator notifications.
//!
//! Delivery is best-effort: implementations log their own failures and
//! report an outcome instead of returning an error, so alerting never
//! interrupts the caller's loop.

use std::sync::Arc;
use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info, warn};

use gridx_telemetry::Metrics;

use crate::config::NotifierConfig;
use crate::directory::BoxFuture;
use crate::error::{DevicesError, DevicesResult};

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub const SMTP_USERNAME_ENV: &str = "GRIDX_SMTP_USERNAME";
pub const SMTP_PASSWORD_ENV: &str = "GRIDX_SMTP_PASSWORD";

/// Result of one notification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    Failed(String),
    /// Delivery is not configured.
    Disabled,
}

impl NotifyOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed(_) => "failed",
            Self::Disabled => "disabled",
        }
    }
}

/// Sends an alert to one recipient.
pub trait Notifier: Send + Sync {
    fn send<'a>(
        &'a self,
        recipient: &'a str,
        subject: &'a str,
        html_body: &'a str,
    ) -> BoxFuture<'a, NotifyOutcome>;
}

/// Arc wrapper for Notifier trait objects.
pub type DynNotifier = Arc<dyn Notifier>;

/// Wrap a plain-text alert in the HTML mail body.
pub fn render_alert_html(message: &str) -> String {
    let body = escape_html(message).replace('\n', "<br>");
    format!("<p><b>Device Alert:</b></p><p>{body}</p>")
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug, Serialize)]
struct MailRequest<'a> {
    from: String,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

/// Delivers alerts through an HTTP mail relay.
pub struct HttpMailNotifier {
    client: Client,
    config: NotifierConfig,
    enabled: bool,
}

impl HttpMailNotifier {
    pub fn new(config: NotifierConfig) -> DevicesResult<Self> {
        let client = Client::builder().timeout(SEND_TIMEOUT).build()?;
        let enabled = !config.sender.is_empty() && !config.relay_url.is_empty();
        if !enabled {
            warn!("Mail sender or relay not configured, email alerts disabled");
        }
        Ok(Self {
            client,
            config,
            enabled,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn from_header(&self) -> String {
        format!("{} <{}>", self.config.sender_name, self.config.sender)
    }

    async fn deliver(&self, recipient: &str, subject: &str, html_body: &str) -> NotifyOutcome {
        if !self.enabled {
            Metrics::notification(NotifyOutcome::Disabled.as_str());
            return NotifyOutcome::Disabled;
        }

        let request = MailRequest {
            from: self.from_header(),
            to: recipient,
            subject,
            html: html_body,
        };
        let mut builder = self.client.post(&self.config.relay_url).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let outcome = match builder.send().await {
            Ok(response) if response.status().is_success() => {
                info!(recipient, "Email alert sent");
                NotifyOutcome::Sent
            }
            Ok(response) => {
                let status = response.status();
                error!(recipient, %status, "Mail relay rejected alert");
                NotifyOutcome::Failed(format!("HTTP {status}"))
            }
            Err(e) => {
                error!(recipient, error = %e, "Failed to send email alert");
                NotifyOutcome::Failed(e.to_string())
            }
        };
        Metrics::notification(outcome.as_str());
        outcome
    }
}

impl Notifier for HttpMailNotifier {
    fn send<'a>(
        &'a self,
        recipient: &'a str,
        subject: &'a str,
        html_body: &'a str,
    ) -> BoxFuture<'a, NotifyOutcome> {
        Box::pin(self.deliver(recipient, subject, html_body))
    }
}

/// Build the alert mail for one recipient.
pub fn build_alert_message(
    from: &Mailbox,
    recipient: &str,
    subject: &str,
    html_body: &str,
) -> DevicesResult<Message> {
    let to: Mailbox = recipient
        .parse()
        .map_err(|e| DevicesError::Mail(format!("invalid recipient {recipient}: {e}")))?;
    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(subject)
        .header(ContentType::TEXT_HTML)
        .body(html_body.to_string())
        .map_err(|e| DevicesError::Mail(e.to_string()))
}

/// Config value, or the environment variable when the value is unset or empty.
fn setting(value: Option<&str>, env_key: &str) -> Option<String> {
    value
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| std::env::var(env_key).ok().filter(|v| !v.is_empty()))
}

/// SMTP login as `(username, password)`.
fn smtp_login(config: &NotifierConfig) -> Option<(String, String)> {
    let username = setting(config.smtp_username.as_deref(), SMTP_USERNAME_ENV)?;
    let password = setting(config.smtp_password.as_deref(), SMTP_PASSWORD_ENV)?;
    Some((username, password))
}

/// `From` mailbox: the configured sender, or the SMTP login when unset.
fn sender_mailbox(config: &NotifierConfig, username: &str) -> DevicesResult<Mailbox> {
    let sender = if config.sender.is_empty() {
        username
    } else {
        config.sender.as_str()
    };
    let address: Address = sender
        .parse()
        .map_err(|e| DevicesError::Config(format!("invalid sender {sender}: {e}")))?;
    Ok(Mailbox::new(Some(config.sender_name.clone()), address))
}

struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

/// Delivers alerts over SMTP with implicit TLS.
pub struct SmtpNotifier {
    sender: Option<SmtpSender>,
}

impl SmtpNotifier {
    /// Disabled, with a warning, when username or password is missing.
    pub fn new(config: &NotifierConfig) -> DevicesResult<Self> {
        let Some((username, password)) = smtp_login(config) else {
            warn!(
                host = %config.smtp_host,
                "SMTP username or password not set, email alerts disabled"
            );
            return Ok(Self { sender: None });
        };

        let from = sender_mailbox(config, &username)?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(Credentials::new(username, password))
            .timeout(Some(SEND_TIMEOUT))
            .build();

        info!(host = %config.smtp_host, port = config.smtp_port, "SMTP alerts enabled");
        Ok(Self {
            sender: Some(SmtpSender { transport, from }),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    async fn deliver(&self, recipient: &str, subject: &str, html_body: &str) -> NotifyOutcome {
        let Some(sender) = &self.sender else {
            Metrics::notification(NotifyOutcome::Disabled.as_str());
            return NotifyOutcome::Disabled;
        };

        let outcome = match build_alert_message(&sender.from, recipient, subject, html_body) {
            Ok(message) => match sender.transport.send(message).await {
                Ok(_) => {
                    info!(recipient, "Email alert sent");
                    NotifyOutcome::Sent
                }
                Err(e) => {
                    error!(recipient, error = %e, "Failed to send email alert");
                    NotifyOutcome::Failed(e.to_string())
                }
            },
            Err(e) => {
                error!(recipient, error = %e, "Could not build email alert");
                NotifyOutcome::Failed(e.to_string())
            }
        };
        Metrics::notification(outcome.as_str());
        outcome
    }
}

impl Notifier for SmtpNotifier {
    fn send<'a>(
        &'a self,
        recipient: &'a str,
        subject: &'a str,
        html_body: &'a str,
    ) -> BoxFuture<'a, NotifyOutcome> {
        Box::pin(self.deliver(recipient, subject, html_body))
    }
}

/// Writes alerts to the log only.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send<'a>(
        &'a self,
        recipient: &'a str,
        subject: &'a str,
        html_body: &'a str,
    ) -> BoxFuture<'a, NotifyOutcome> {
        Box::pin(async move {
            warn!(recipient, subject, body = html_body, "Device alert");
            Metrics::notification(NotifyOutcome::Sent.as_str());
            NotifyOutcome::Sent
        })
    }
}

/// Pick the notifier the configuration asks for.
pub fn notifier_from_config(config: &NotifierConfig) -> DevicesResult<DynNotifier> {
    if !config.smtp_host.is_empty() {
        return Ok(Arc::new(SmtpNotifier::new(config)?));
    }
    if config.relay_url.is_empty() {
        return Ok(Arc::new(LogNotifier));
    }
    Ok(Arc::new(HttpMailNotifier::new(config.clone())?))
}

/// A notification captured by [`MockNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub recipient: String,
    pub subject: String,
    pub html_body: String,
}

/// Recording notifier for testing.
#[derive(Debug)]
pub struct MockNotifier {
    sent: parking_lot::Mutex<Vec<SentNotification>>,
    next_outcome: parking_lot::Mutex<NotifyOutcome>,
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            sent: parking_lot::Mutex::new(Vec::new()),
            next_outcome: parking_lot::Mutex::new(NotifyOutcome::Sent),
        }
    }

    pub fn set_next_outcome(&self, outcome: NotifyOutcome) {
        *self.next_outcome.lock() = outcome;
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().clone()
    }
}

impl Notifier for MockNotifier {
    fn send<'a>(
        &'a self,
        recipient: &'a str,
        subject: &'a str,
        html_body: &'a str,
    ) -> BoxFuture<'a, NotifyOutcome> {
        Box::pin(async move {
            self.sent.lock().push(SentNotification {
                recipient: recipient.to_string(),
                subject: subject.to_string(),
                html_body: html_body.to_string(),
            });
            self.next_outcome.lock().clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_alert_html() {
        assert_eq!(
            render_alert_html("Heater at 48.0C\nSwitched off"),
            "<p><b>Device Alert:</b></p><p>Heater at 48.0C<br>Switched off</p>"
        );
    }

    #[test]
    fn test_render_escapes_markup() {
        let html = render_alert_html("<script>\"x\" & 'y'</script>");
        assert!(html.contains("&lt;script&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[tokio::test]
    async fn test_mail_notifier_disabled_without_sender() {
        let notifier = HttpMailNotifier::new(NotifierConfig {
            relay_url: "http://127.0.0.1:9/send".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert!(!notifier.is_enabled());

        let outcome = notifier.send("ops@example.com", "subject", "<p>x</p>").await;
        assert_eq!(outcome, NotifyOutcome::Disabled);
    }

    #[test]
    fn test_from_header() {
        let notifier = HttpMailNotifier::new(NotifierConfig {
            relay_url: "http://127.0.0.1:9/send".to_string(),
            sender: "alerts@example.com".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert!(notifier.is_enabled());
        assert_eq!(notifier.from_header(), "Gridx Alerts <alerts@example.com>");
    }

    #[tokio::test]
    async fn test_log_notifier_always_sends() {
        let outcome = LogNotifier.send("ops@example.com", "s", "b").await;
        assert_eq!(outcome, NotifyOutcome::Sent);
    }

    #[tokio::test]
    async fn test_mock_notifier_records() {
        let mock = MockNotifier::new();
        mock.set_next_outcome(NotifyOutcome::Failed("smtp down".to_string()));
        let outcome = mock.send("a@example.com", "subj", "body").await;

        assert_eq!(outcome.as_str(), "failed");
        assert_eq!(mock.sent()[0].recipient, "a@example.com");
    }

    #[test]
    fn test_notifier_from_config_falls_back_to_log() {
        assert!(notifier_from_config(&NotifierConfig::default()).is_ok());
    }

    fn mailbox(name: &str, address: &str) -> Mailbox {
        Mailbox::new(Some(name.to_string()), address.parse().unwrap())
    }

    #[test]
    fn test_alert_message_headers_and_body() {
        let from = mailbox("Gridx Alerts", "alerts@example.com");
        let message = build_alert_message(
            &from,
            "ops@example.com",
            "Device alert",
            &render_alert_html("Heater at 48.0C"),
        )
        .unwrap();

        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Gridx Alerts"));
        assert!(raw.contains("<alerts@example.com>"));
        assert!(raw.contains("To: ops@example.com"));
        assert!(raw.contains("Subject: Device alert"));
        assert!(raw.contains("text/html"));
        assert!(raw.contains("Heater at 48.0C"));
    }

    #[test]
    fn test_alert_message_rejects_bad_recipient() {
        let from = mailbox("Gridx Alerts", "alerts@example.com");
        let result = build_alert_message(&from, "not an address", "s", "b");
        assert!(matches!(result, Err(DevicesError::Mail(_))));
    }

    #[test]
    fn test_sender_defaults_to_smtp_login() {
        let config = NotifierConfig::default();
        let from = sender_mailbox(&config, "me@example.com").unwrap();
        assert_eq!(from.email.to_string(), "me@example.com");
        assert_eq!(from.name.as_deref(), Some("Gridx Alerts"));

        let config = NotifierConfig {
            sender: "alerts@example.com".to_string(),
            ..Default::default()
        };
        let from = sender_mailbox(&config, "me@example.com").unwrap();
        assert_eq!(from.email.to_string(), "alerts@example.com");
    }

    #[test]
    fn test_config_credentials_take_precedence() {
        assert_eq!(
            setting(Some("from-config"), "GRIDX_TEST_UNSET_VARIABLE"),
            Some("from-config".to_string())
        );
        assert_eq!(setting(Some(""), "GRIDX_TEST_UNSET_VARIABLE"), None);
        assert_eq!(setting(None, "GRIDX_TEST_UNSET_VARIABLE"), None);
    }

    #[tokio::test]
    async fn test_smtp_notifier_disabled_without_password() {
        let notifier = SmtpNotifier::new(&NotifierConfig {
            smtp_host: "smtp.example.com".to_string(),
            smtp_username: Some("me@example.com".to_string()),
            ..Default::default()
        })
        .unwrap();

        if std::env::var(SMTP_PASSWORD_ENV).is_err() {
            assert!(!notifier.is_enabled());
            let outcome = notifier.send("ops@example.com", "s", "b").await;
            assert_eq!(outcome, NotifyOutcome::Disabled);
        }
    }
}
