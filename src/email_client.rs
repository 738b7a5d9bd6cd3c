/// Outbound transactional email.
///
/// Thin JSON client over an HTTP email relay. Callers that must stay
/// enumeration-safe (the password-reset flow) log and discard the returned
/// error; nothing here retries.
use serde::Serialize;

use crate::error::EmailError;

#[derive(Clone)]
pub struct EmailClient {
    http_client: reqwest::Client,
    base_url: String,
    sender: String,
}

#[derive(Serialize)]
struct SendEmailRequest {
    from: String,
    to: String,
    subject: String,
    html: String,
}

impl EmailClient {
    pub fn new(base_url: String, sender: String) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url,
            sender,
        }
    }

    /// Deliver a password-reset code.
    pub async fn send_reset_code(&self, recipient: &str, code: &str) -> Result<(), EmailError> {
        let html = format!(
            "<div style=\"font-family: Arial, sans-serif; padding: 20px; color: #333;\">\
             <h2>Password Reset Request</h2>\
             <p>You requested a password reset for your ExpenseX account.</p>\
             <p>Your verification code is:</p>\
             <h1 style=\"color: #10b981; font-size: 32px; letter-spacing: 5px;\">{}</h1>\
             <p>This code will expire in 15 minutes.</p>\
             <p>If you did not request this, please ignore this email.</p>\
             </div>",
            code
        );

        self.send_email(recipient, "Reset Code for ExpenseX", &html)
            .await
    }

    async fn send_email(
        &self,
        recipient: &str,
        subject: &str,
        html_content: &str,
    ) -> Result<(), EmailError> {
        let url = format!("{}/email", self.base_url);
        let request = SendEmailRequest {
            from: self.sender.clone(),
            to: recipient.to_string(),
            subject: subject.to_string(),
            html: html_content.to_string(),
        };

        self.http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| EmailError::ServiceUnavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| EmailError::SendFailed(e.to_string()))?;

        Ok(())
    }
}
