use super::traits::{BaseSecretsProvider, WebhookSecrets};
use crate::config::Config;

/// Reads webhook secrets from the loaded configuration.
pub struct ConfigSecretsProvider {
    config: Config,
}

impl ConfigSecretsProvider {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl BaseSecretsProvider for ConfigSecretsProvider {
    fn webhook_secrets(&self, provider: &str) -> WebhookSecrets {
        let (primary, next) = self.config.webhook_secrets(provider);
        WebhookSecrets {
            primary: primary.map(str::to_string),
            next: next.map(str::to_string),
        }
    }
}
