use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{error, info, instrument};

use crate::config::EmailConfig;

/// Email service errors
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("SMTP error: {0}")]
    SmtpError(String),

    #[error("Message building error: {0}")]
    MessageError(String),

    #[error("Address error: {0}")]
    AddressError(String),
}

/// Everything needed to tell a client a quote is waiting for them.
#[derive(Debug, Clone)]
pub struct QuoteEmail {
    pub to: String,
    pub client_name: String,
    pub provider_name: String,
    pub quote_label: String,
    pub quote_title: String,
    pub total: String,
    pub link: String,
}

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

#[async_trait]
pub trait QuoteMailer: Send + Sync {
    async fn send_quote(&self, email: QuoteEmail) -> Result<(), EmailError>;
}

/// SMTP email service implementation
pub struct SmtpEmailService {
    pub config: EmailConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpEmailService {
    #[instrument(skip(config), fields(host = %config.smtp_host, port = config.smtp_port))]
    pub fn new(config: EmailConfig) -> Result<Self, EmailError> {
        info!("Initializing SMTP email service");

        config.validate().map_err(|e| EmailError::ConfigError(e.to_string()))?;

        let mut transport_builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
            .port(config.smtp_port)
            .timeout(Some(std::time::Duration::from_secs(config.connection_timeout_secs)));

        if config.use_tls {
            let tls_parameters = TlsParameters::new(config.smtp_host.clone())
                .map_err(|e| EmailError::ConfigError(format!("TLS configuration error: {}", e)))?;
            transport_builder = if config.use_starttls {
                transport_builder.tls(Tls::Required(tls_parameters))
            } else {
                transport_builder.tls(Tls::Wrapper(tls_parameters))
            };
        } else {
            transport_builder = transport_builder.tls(Tls::None);
        }

        if !config.smtp_username.is_empty() {
            transport_builder = transport_builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }

        let transport = transport_builder.build();
        Ok(Self { config, transport })
    }

    #[instrument(skip(self, message), fields(to = %message.to, subject = %message.subject))]
    pub async fn send_email(&self, message: EmailMessage) -> Result<(), EmailError> {
        let email_message = self.build_message(message)?;

        self.transport.send(email_message).await.map_err(|e| {
            error!("Failed to send email: {}", e);
            EmailError::SmtpError(format!("Failed to send email: {}", e))
        })?;

        info!("Email sent successfully");
        Ok(())
    }

    fn build_message(&self, email_message: EmailMessage) -> Result<Message, EmailError> {
        let from_mailbox: Mailbox = format!("{} <{}>", self.config.from_name, self.config.from_email)
            .parse()
            .map_err(|e| EmailError::AddressError(format!("Invalid from address: {}", e)))?;

        let to_mailbox: Mailbox = email_message
            .to
            .parse()
            .map_err(|e| EmailError::AddressError(format!("Invalid to address: {}", e)))?;

        Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(&email_message.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(SinglePart::builder().header(ContentType::TEXT_PLAIN).body(email_message.text_body))
                    .singlepart(SinglePart::builder().header(ContentType::TEXT_HTML).body(email_message.html_body)),
            )
            .map_err(|e| EmailError::MessageError(format!("Failed to build message: {}", e)))
    }
}

#[async_trait]
impl QuoteMailer for SmtpEmailService {
    async fn send_quote(&self, email: QuoteEmail) -> Result<(), EmailError> {
        self.send_email(render_quote_email(&email)).await
    }
}

pub fn render_quote_email(email: &QuoteEmail) -> EmailMessage {
    let subject = format!("Orçamento {} de {}", email.quote_label, email.provider_name);

    let text_body = format!(
        r#"Olá {client},

{provider} enviou o orçamento {label} ("{title}") no valor de {total}.

Para ver os detalhes, aprovar ou recusar, acesse:
{link}

Este é um email automático enviado pelo Fechou!."#,
        client = email.client_name,
        provider = email.provider_name,
        label = email.quote_label,
        title = email.quote_title,
        total = email.total,
        link = email.link,
    );

    let html_body = format!(
        r#"<!DOCTYPE html>
<html lang="pt-BR">
<head><meta charset="UTF-8"><title>{label}</title></head>
<body style="font-family: Arial, sans-serif; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <p>Olá {client},</p>
    <p><strong>{provider}</strong> enviou o orçamento <strong>{label}</strong> ("{title}") no valor de <strong>{total}</strong>.</p>
    <p style="text-align: center;">
        <a href="{link}" style="display: inline-block; padding: 12px 24px; background-color: #16a34a; color: #fff; text-decoration: none; border-radius: 4px; font-weight: bold;">Ver orçamento</a>
    </p>
    <p style="word-break: break-all; font-size: 12px; color: #6c757d;">{link}</p>
    <p style="font-size: 12px; color: #6c757d;">Este é um email automático enviado pelo Fechou!.</p>
</body>
</html>"#,
        client = html_escape::encode_text(&email.client_name),
        provider = html_escape::encode_text(&email.provider_name),
        label = html_escape::encode_text(&email.quote_label),
        title = html_escape::encode_text(&email.quote_title),
        total = html_escape::encode_text(&email.total),
        link = html_escape::encode_double_quoted_attribute(&email.link),
    );

    EmailMessage { to: email.to.clone(), subject, text_body, html_body }
}
