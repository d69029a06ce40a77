use crate::core::config::data::Config;

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        match &self.default_provider {
            Some(provider) => println!("  default-provider: {provider}"),
            None => println!("  default-provider: (unset, using {})", self.provider()),
        }
        match &self.default_model {
            Some(model) => println!("  default-model: {model}"),
            None => println!("  default-model: (unset, using {})", self.model()),
        }
        match &self.base_url {
            Some(url) => println!("  base-url: {url}"),
            None => println!("  base-url: (provider default)"),
        }
        match &self.system_prompt {
            Some(_) => println!("  system-prompt: (custom)"),
            None => println!("  system-prompt: (default)"),
        }
        if !self.providers.is_empty() {
            println!("  custom providers:");
            for provider in &self.providers {
                println!("    {}: {}", provider.id, provider.models.url);
            }
        }
        if self.capability_rules.is_empty() {
            println!("  capability-rules: (default table)");
        } else {
            println!("  capability-rules: {} configured", self.capability_rules.len());
        }
    }
}
