mod smtp;
mod templates;

pub use smtp::SmtpReporter;
pub use templates::ReportTemplate;

use async_trait::async_trait;
use forecast_core::ForecastReport;

/// Trait for report delivery channels.
#[async_trait]
pub trait ReportChannel: Send + Sync {
    async fn send(&self, report: &ForecastReport) -> Result<(), MailerError>;
    fn name(&self) -> &str;
}

/// Errors from report delivery.
#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("SMTP error: {0}")]
    Smtp(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Configuration for SMTP delivery.
#[derive(Clone)]
pub struct MailerConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
    pub smtp_to: Vec<String>,
    pub smtp_tls: SmtpTls,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum SmtpTls {
    /// Implicit TLS (SMTPS, usually port 465).
    #[default]
    Tls,
    StartTls,
    None,
}

impl MailerConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. `MY_MAIL` / `EMAIL_PASS` act as a single
    /// mailbox fallback for sender, recipient and credentials.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let mailbox = get("MY_MAIL");

        let smtp_to = get("REPORT_EMAIL_TO")
            .or_else(|| mailbox.clone())
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let smtp_tls = match get("SMTP_TLS").unwrap_or_default().to_ascii_lowercase().as_str() {
            "starttls" => SmtpTls::StartTls,
            "none" => SmtpTls::None,
            _ => SmtpTls::Tls,
        };

        Self {
            smtp_host: get("SMTP_HOST"),
            smtp_port: get("SMTP_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(465),
            smtp_username: get("SMTP_USERNAME").or_else(|| mailbox.clone()),
            smtp_password: get("SMTP_PASSWORD").or_else(|| get("EMAIL_PASS")),
            smtp_from: get("SMTP_FROM_ADDRESS").or(mailbox),
            smtp_to,
            smtp_tls,
        }
    }

    pub fn smtp_enabled(&self) -> bool {
        self.smtp_host.is_some() && self.smtp_from.is_some() && !self.smtp_to.is_empty()
    }
}

impl std::fmt::Debug for MailerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailerConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &self.smtp_password.as_ref().map(|_| "***"))
            .field("smtp_from", &self.smtp_from)
            .field("smtp_to", &self.smtp_to)
            .field("smtp_tls", &self.smtp_tls)
            .finish()
    }
}

/// Delivers a rendered report to every configured channel.
pub struct ReportMailer {
    channels: Vec<Box<dyn ReportChannel>>,
}

impl ReportMailer {
    pub fn new(config: &MailerConfig) -> Self {
        let mut channels: Vec<Box<dyn ReportChannel>> = Vec::new();

        if config.smtp_enabled() {
            match SmtpReporter::new(config) {
                Ok(reporter) => {
                    tracing::info!(
                        "Email delivery enabled (SMTP -> {} recipients)",
                        config.smtp_to.len()
                    );
                    channels.push(Box::new(reporter));
                }
                Err(e) => {
                    tracing::warn!("Failed to initialize SMTP reporter: {}", e);
                }
            }
        } else {
            tracing::info!(
                "No delivery channels configured (set SMTP_HOST, SMTP_FROM_ADDRESS and REPORT_EMAIL_TO)"
            );
        }

        Self { channels }
    }

    pub fn with_channel(mut self, channel: Box<dyn ReportChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn has_channels(&self) -> bool {
        !self.channels.is_empty()
    }

    /// Send to all channels, awaiting each. Returns the number of channels
    /// that accepted the report.
    pub async fn deliver(&self, report: &ForecastReport) -> usize {
        let mut delivered = 0;
        for channel in &self.channels {
            match channel.send(report).await {
                Ok(()) => {
                    tracing::info!("Sent report via {}", channel.name());
                    delivered += 1;
                }
                Err(e) => {
                    tracing::warn!("Failed to send report via {}: {}", channel.name(), e)
                }
            }
        }
        delivered
    }
}
