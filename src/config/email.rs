//! Email configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Email configuration (Resend)
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Send through Resend; when false, notifications are only logged
    #[serde(default)]
    pub enabled: bool,

    /// Resend API key
    #[serde(default)]
    pub resend_api_key: String,

    /// From email address
    #[serde(default = "default_from_email")]
    pub from_email: String,

    /// From name
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

impl EmailConfig {
    /// Get formatted "From" header value
    pub fn from_header(&self) -> String {
        format!("{} <{}>", self.from_name, self.from_email)
    }

    /// Validate email configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.enabled {
            return Ok(());
        }
        if self.resend_api_key.is_empty() {
            return Err(ValidationError::MissingRequired("EMAIL__RESEND_API_KEY"));
        }
        if !self.resend_api_key.starts_with("re_") {
            return Err(ValidationError::InvalidResendKey);
        }
        if !self.from_email.contains('@') {
            return Err(ValidationError::InvalidFromEmail);
        }
        Ok(())
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            resend_api_key: String::new(),
            from_email: default_from_email(),
            from_name: default_from_name(),
        }
    }
}

fn default_from_email() -> String {
    "noreply@neocare.app".to_string()
}

fn default_from_name() -> String {
    "NeoCare".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> EmailConfig {
        EmailConfig {
            enabled: true,
            resend_api_key: "re_abcd1234".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_disabled_needs_no_key() {
        assert!(EmailConfig::default().validate().is_ok());
    }

    #[test]
    fn test_from_header() {
        assert_eq!(EmailConfig::default().from_header(), "NeoCare <noreply@neocare.app>");
    }

    #[test]
    fn test_validation_invalid_api_key_prefix() {
        let config = EmailConfig {
            resend_api_key: "sk_xxx".to_string(),
            ..enabled()
        };
        assert!(matches!(config.validate(), Err(ValidationError::InvalidResendKey)));
    }

    #[test]
    fn test_validation_invalid_from_email() {
        let config = EmailConfig {
            from_email: "invalid-email".to_string(),
            ..enabled()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_valid_config() {
        assert!(enabled().validate().is_ok());
    }
}
