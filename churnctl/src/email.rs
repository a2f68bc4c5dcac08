//! Email service for sending prediction reports.

use lettre::{
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::path::Path;

use crate::{
    config::{Config, EmailMode},
    db::models::predictions::PredictionDBResponse,
    errors::Error,
    export::format_inr,
};

pub struct EmailService {
    transport: EmailTransport,
    from_address: String,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

impl EmailService {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let email_config = &config.email;

        let transport = match email_config.mode {
            EmailMode::Smtp => {
                let smtp = &email_config.smtp;
                let builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
                    .map_err(|e| Error::Internal {
                        operation: format!("create SMTP transport: {e}"),
                    })?
                    .port(smtp.port)
                    .credentials(Credentials::new(smtp.username.clone(), smtp.password.clone()));

                EmailTransport::Smtp(builder.build())
            }
            EmailMode::File => {
                let emails_dir = Path::new(&email_config.file_path);
                if !emails_dir.exists() {
                    std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                        operation: format!("create emails directory: {e}"),
                    })?;
                }
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(emails_dir))
            }
        };

        Ok(Self {
            transport,
            from_address: email_config.from_address.clone(),
        })
    }

    /// Email one prediction's summary to a recipient.
    pub async fn send_prediction_report(&self, to_email: &str, record: &PredictionDBResponse) -> Result<(), Error> {
        let subject = format!("Churn Prediction Report - {}", record.customer_name);
        let body = create_prediction_body(record);
        self.send_email(to_email, &subject, &body).await
    }

    /// Email a summary of the requester's most recent predictions.
    pub async fn send_bulk_report(&self, to_email: &str, records: &[PredictionDBResponse]) -> Result<(), Error> {
        let subject = "Churn Prediction Summary Report".to_string();
        let body = create_bulk_body(records);
        self.send_email(to_email, &subject, &body).await
    }

    async fn send_email(&self, to_email: &str, subject: &str, body: &str) -> Result<(), Error> {
        let from = self.from_address.parse::<Mailbox>().map_err(|e| Error::Internal {
            operation: format!("parse from email: {e}"),
        })?;

        let to = to_email.parse::<Mailbox>().map_err(|e| Error::BadRequest {
            message: format!("Invalid recipient address: {e}"),
        })?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body.to_string())
            .map_err(|e| Error::Internal {
                operation: format!("build email message: {e}"),
            })?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send SMTP email: {e}"),
                })?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send file email: {e}"),
                })?;
            }
        }

        Ok(())
    }
}

fn prediction_label(prediction: i32) -> &'static str {
    if prediction == 1 { "Churn" } else { "No Churn" }
}

fn create_prediction_body(record: &PredictionDBResponse) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Churn Prediction Report</title>
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        table {{ border-collapse: collapse; width: 100%; }}
        td, th {{ border: 1px solid #ddd; padding: 8px; text-align: left; }}
        .footer {{ margin-top: 30px; font-size: 12px; color: #666; }}
    </style>
</head>
<body>
    <div class="container">
        <h2>Churn Prediction Report</h2>
        <p>Prediction summary for <strong>{name}</strong>:</p>
        <table>
            <tr><th>Prediction</th><td>{label}</td></tr>
            <tr><th>Probability</th><td>{probability:.3}</td></tr>
            <tr><th>Risk Score</th><td>{risk}%</td></tr>
            <tr><th>Tenure</th><td>{tenure} months</td></tr>
            <tr><th>Monthly Charges</th><td>{monthly}</td></tr>
            <tr><th>Total Charges</th><td>{total}</td></tr>
            <tr><th>Contract Type</th><td>{contract}</td></tr>
            <tr><th>Payment Method</th><td>{payment}</td></tr>
        </table>
        <div class="footer">
            <p>This is an automated message, please do not reply to this email.</p>
        </div>
    </div>
</body>
</html>"#,
        name = record.customer_name,
        label = prediction_label(record.prediction),
        probability = record.probability,
        risk = record.risk_score,
        tenure = record.tenure,
        monthly = format_inr(record.monthly_charges),
        total = format_inr(record.total_charges),
        contract = record.contract_type,
        payment = record.payment_method,
    )
}

fn create_bulk_body(records: &[PredictionDBResponse]) -> String {
    let churn_count = records.iter().filter(|r| r.prediction == 1).count();

    let rows: String = records
        .iter()
        .map(|r| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}%</td><td>{}</td></tr>\n",
                r.customer_name,
                prediction_label(r.prediction),
                r.risk_score,
                r.created_at.format("%Y-%m-%d %H:%M:%S"),
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Churn Prediction Summary</title>
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        table {{ border-collapse: collapse; width: 100%; }}
        td, th {{ border: 1px solid #ddd; padding: 8px; text-align: left; }}
        .footer {{ margin-top: 30px; font-size: 12px; color: #666; }}
    </style>
</head>
<body>
    <div class="container">
        <h2>Churn Prediction Summary</h2>
        <p>Customers analyzed: <strong>{total}</strong></p>
        <p>Predicted churn: <strong>{churn}</strong></p>
        <table>
            <tr><th>Customer</th><th>Prediction</th><th>Risk Score</th><th>Date</th></tr>
            {rows}
        </table>
        <div class="footer">
            <p>This is an automated message, please do not reply to this email.</p>
        </div>
    </div>
</body>
</html>"#,
        total = records.len(),
        churn = churn_count,
        rows = rows,
    )
}
