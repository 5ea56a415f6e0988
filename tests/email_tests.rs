use fechou_backend::config::EmailConfig;
use fechou_backend::util::email::*;

fn sample_email() -> QuoteEmail {
    QuoteEmail {
        to: "cliente@example.com".to_string(),
        client_name: "João & Filhos".to_string(),
        provider_name: "Souza Reformas".to_string(),
        quote_label: "#0007".to_string(),
        quote_title: "Pintura <sala>".to_string(),
        total: "R$ 1.250,00".to_string(),
        link: "https://app.fechou.test/orcamento/2b1f?x=1&y=2".to_string(),
    }
}

#[cfg(test)]
mod render_tests {
    use super::*;

    #[test]
    fn test_subject_names_quote_and_provider() {
        let message = render_quote_email(&sample_email());
        assert_eq!(message.to, "cliente@example.com");
        assert_eq!(message.subject, "Orçamento #0007 de Souza Reformas");
    }

    #[test]
    fn test_text_body_contains_link_and_total() {
        let message = render_quote_email(&sample_email());
        assert!(message.text_body.contains("Olá João & Filhos"));
        assert!(message.text_body.contains("R$ 1.250,00"));
        assert!(message.text_body.contains("https://app.fechou.test/orcamento/2b1f?x=1&y=2"));
    }

    #[test]
    fn test_html_body_escapes_user_content() {
        let message = render_quote_email(&sample_email());
        assert!(message.html_body.contains("João &amp; Filhos"));
        assert!(message.html_body.contains("Pintura &lt;sala&gt;"));
        assert!(!message.html_body.contains("<sala>"));
        assert!(message.html_body.contains("x=1&amp;y=2"));
    }
}

#[cfg(test)]
mod service_tests {
    use super::*;

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EmailConfig::default();
        config.smtp_host = "".to_string();

        let result = SmtpEmailService::new(config);
        assert!(matches!(result, Err(EmailError::ConfigError(_))));
    }

    #[test]
    fn test_error_display() {
        let errors = vec![
            EmailError::ConfigError("Config error".to_string()),
            EmailError::SmtpError("SMTP error".to_string()),
            EmailError::MessageError("Message error".to_string()),
            EmailError::AddressError("Address error".to_string()),
        ];

        for error in errors {
            assert!(!format!("{}", error).is_empty());
        }
    }
}
