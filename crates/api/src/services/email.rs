//! Email service for sending sign-in codes.
//!
//! Uses SMTP via lettre for delivery with Askama templates. Without SMTP
//! configuration the service only logs that a message would have been sent.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use univendor_core::{Email, OtpCode};

use crate::config::EmailConfig;

#[derive(Template)]
#[template(path = "email/otp_code.html")]
struct OtpCodeEmailHtml<'a> {
    code: &'a str,
    ttl_minutes: i64,
}

#[derive(Template)]
#[template(path = "email/otp_code.txt")]
struct OtpCodeEmailText<'a> {
    code: &'a str,
    ttl_minutes: i64,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

#[derive(Clone)]
struct Smtp {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    smtp: Option<Smtp>,
}

impl EmailService {
    /// Create an email service that delivers over SMTP.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            smtp: Some(Smtp {
                mailer,
                from_address: config.from_address.clone(),
            }),
        })
    }

    /// Create an email service that logs instead of sending.
    #[must_use]
    pub const fn log_only() -> Self {
        Self { smtp: None }
    }

    /// Whether messages are actually delivered.
    #[must_use]
    pub const fn is_delivering(&self) -> bool {
        self.smtp.is_some()
    }

    /// Send a sign-in code.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_otp(
        &self,
        to: &Email,
        code: &OtpCode,
        ttl_minutes: i64,
    ) -> Result<(), EmailError> {
        let code = code.as_str();
        let html = OtpCodeEmailHtml { code, ttl_minutes }.render()?;
        let text = OtpCodeEmailText { code, ttl_minutes }.render()?;

        if self.smtp.is_none() {
            tracing::info!(to = %to, "SMTP not configured; sign-in code not emailed");
            tracing::debug!(to = %to, code = %code, "Sign-in code");
            return Ok(());
        }

        self.send_multipart_email(to.as_str(), "Your UniVendor sign-in code", &text, &html)
            .await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let Some(smtp) = &self.smtp else {
            return Ok(());
        };

        let email = Message::builder()
            .from(
                smtp.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(smtp.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        smtp.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_templates_render_code() {
        let html = OtpCodeEmailHtml {
            code: "482913",
            ttl_minutes: 10,
        }
        .render()
        .expect("html renders");
        let text = OtpCodeEmailText {
            code: "482913",
            ttl_minutes: 10,
        }
        .render()
        .expect("text renders");

        assert!(html.contains("482913"));
        assert!(text.contains("482913"));
        assert!(text.contains("10 minutes"));
    }

    #[tokio::test]
    async fn test_log_only_send_succeeds() {
        let service = EmailService::log_only();
        assert!(!service.is_delivering());

        let to = Email::parse("shopper@example.com").expect("valid email");
        let code = OtpCode::parse("123456").expect("valid code");
        service.send_otp(&to, &code, 10).await.expect("log-only send");
    }
}
