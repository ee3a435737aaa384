use async_trait::async_trait;
use forecast_core::ForecastReport;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::templates::ReportTemplate;
use crate::{MailerConfig, MailerError, ReportChannel, SmtpTls};

/// Display name used when `SMTP_FROM_ADDRESS` is a bare address.
pub const DEFAULT_SENDER_NAME: &str = "Forecast Sentinel";

pub struct SmtpReporter {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl SmtpReporter {
    pub fn new(config: &MailerConfig) -> Result<Self, MailerError> {
        let host = config
            .smtp_host
            .as_deref()
            .ok_or_else(|| MailerError::Config("SMTP_HOST not set".into()))?;
        let from_addr = config
            .smtp_from
            .as_deref()
            .ok_or_else(|| MailerError::Config("SMTP_FROM_ADDRESS not set".into()))?;

        let mut from: Mailbox = from_addr
            .parse()
            .map_err(|e| MailerError::Config(format!("Invalid from address: {}", e)))?;
        if from.name.is_none() {
            from = Mailbox::new(Some(DEFAULT_SENDER_NAME.to_string()), from.email);
        }

        let to: Vec<Mailbox> = config
            .smtp_to
            .iter()
            .filter_map(|addr| match addr.parse::<Mailbox>() {
                Ok(mailbox) => Some(mailbox),
                Err(e) => {
                    tracing::warn!("Skipping invalid recipient {}: {}", addr, e);
                    None
                }
            })
            .collect();

        if to.is_empty() {
            return Err(MailerError::Config(
                "No valid REPORT_EMAIL_TO addresses".into(),
            ));
        }

        let mut builder = match config.smtp_tls {
            SmtpTls::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host),
            SmtpTls::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host),
            SmtpTls::None => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(
                host,
            )),
        }
        .map_err(|e| MailerError::Smtp(format!("SMTP transport error: {}", e)))?;

        builder = builder.port(config.smtp_port);

        if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }

    /// One message addressed to every recipient, so the relay accepts or
    /// rejects the report as a whole.
    fn build_message(&self, report: &ForecastReport) -> Result<Message, MailerError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(&report.subject)
            .header(ContentType::TEXT_HTML);
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }
        builder
            .body(ReportTemplate::render(report))
            .map_err(|e| MailerError::Smtp(format!("Failed to build email: {}", e)))
    }
}

#[async_trait]
impl ReportChannel for SmtpReporter {
    async fn send(&self, report: &ForecastReport) -> Result<(), MailerError> {
        let email = self.build_message(report)?;
        self.transport
            .send(email)
            .await
            .map_err(|e| MailerError::Smtp(format!("Failed to send email: {}", e)))?;
        tracing::info!(
            "Report '{}' sent to {} recipient(s)",
            report.subject,
            self.to.len()
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "smtp"
    }
}
