use std::fs;

use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use tokio::time::{sleep, Duration};

use crate::config::SmtpConfig;

pub type MailError = Box<dyn std::error::Error + Send + Sync>;

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_MS: u64 = 1000;

/// Fills `{{placeholder}}` markers in the template at `template_path`.
pub fn render_template(
    template_path: &str,
    placeholders: &[(String, String)],
) -> Result<String, MailError> {
    let mut html_template = match fs::read_to_string(template_path) {
        Ok(content) => content,
        Err(e) => {
            tracing::error!("Failed to read email template {}: {}", template_path, e);
            return Err(format!("Template not found: {}", template_path).into());
        }
    };

    for (key, value) in placeholders {
        html_template = html_template.replace(key, value);
    }

    Ok(html_template)
}

pub async fn send_email(
    smtp: &SmtpConfig,
    to_email: &str,
    subject: &str,
    template_path: &str,
    placeholders: &[(String, String)],
) -> Result<(), MailError> {
    if to_email.is_empty() {
        return Err("Email recipient cannot be empty".into());
    }
    if !to_email.contains('@') {
        return Err(format!("Invalid email address: {}", to_email).into());
    }

    let html_body = render_template(template_path, placeholders)?;
    send_with_retries(smtp, to_email, subject, &html_body).await
}

async fn send_with_retries(
    smtp: &SmtpConfig,
    to_email: &str,
    subject: &str,
    html_body: &str,
) -> Result<(), MailError> {
    let mut last_error = None;

    for attempt in 1..=MAX_RETRIES {
        match send_via_smtp(smtp, to_email, subject, html_body).await {
            Ok(()) => {
                tracing::info!("Email sent successfully to {}", to_email);
                return Ok(());
            }
            Err(e) => {
                last_error = Some(e);
                if attempt < MAX_RETRIES {
                    let delay = RETRY_DELAY_MS * (2_u64.pow(attempt - 1));
                    tracing::warn!(
                        "Email send attempt {} failed for {}. Retrying in {}ms...",
                        attempt,
                        to_email,
                        delay
                    );
                    sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }

    let error_msg = last_error
        .map(|e| format!("Failed after {} retries: {}", MAX_RETRIES, e))
        .unwrap_or_else(|| "Unknown email sending error".to_string());

    tracing::error!("Email failed for {}: {}", to_email, error_msg);
    Err(error_msg.into())
}

async fn send_via_smtp(
    smtp: &SmtpConfig,
    to_email: &str,
    subject: &str,
    html_body: &str,
) -> Result<(), MailError> {
    let email = Message::builder()
        .from(smtp.from.parse()?)
        .to(to_email.parse()?)
        .subject(subject)
        .multipart(
            MultiPart::alternative().singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_HTML)
                    .body(html_body.to_string()),
            ),
        )?;

    let creds = Credentials::new(smtp.username.clone(), smtp.password.clone());
    let mailer = SmtpTransport::relay(&smtp.host)?
        .port(smtp.port)
        .credentials(creds)
        .build();

    // SmtpTransport blocks
    tokio::task::spawn_blocking(move || mailer.send(&email))
        .await?
        .map_err(|e| format!("SMTP send failed: {}", e))?;

    Ok(())
}
