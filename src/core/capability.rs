//! Model capability classification
//!
//! Decides per model whether a reply is consumed incrementally or fetched as
//! one blocking call. The decision is an ordered list of `(matcher, mode)`
//! rules evaluated first-match-wins. Narrow overrides sit ahead of the broad
//! reasoning-model patterns so that identifiers such as
//! `grok-4-fast-non-reasoning` are not swept up by `^grok-4.*`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::error::ConfigurationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    #[default]
    Incremental,
    Blocking,
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryMode::Incremental => f.write_str("incremental"),
            DeliveryMode::Blocking => f.write_str("blocking"),
        }
    }
}

/// A rule as written in configuration. Exactly one matcher field must be set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRuleConfig {
    pub mode: DeliveryMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exact: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contains_all: Vec<String>,
}

impl CapabilityRuleConfig {
    fn describe(&self) -> String {
        if let Some(pattern) = &self.pattern {
            format!("pattern {pattern}")
        } else if let Some(exact) = &self.exact {
            format!("exact {exact}")
        } else if !self.contains_all.is_empty() {
            format!("contains_all {}", self.contains_all.join("+"))
        } else {
            "<empty>".to_string()
        }
    }
}

#[derive(Debug, Clone)]
pub enum RuleMatcher {
    Pattern(Regex),
    Exact(String),
    ContainsAll(Vec<String>),
}

impl RuleMatcher {
    pub fn matches(&self, model: &str) -> bool {
        match self {
            RuleMatcher::Pattern(regex) => regex.is_match(model),
            RuleMatcher::Exact(literal) => model == literal,
            RuleMatcher::ContainsAll(tokens) => tokens.iter().all(|token| model.contains(token)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CapabilityRule {
    pub matcher: RuleMatcher,
    pub mode: DeliveryMode,
}

impl TryFrom<&CapabilityRuleConfig> for CapabilityRule {
    type Error = ConfigurationError;

    fn try_from(config: &CapabilityRuleConfig) -> Result<Self, Self::Error> {
        let invalid = |reason: &str| ConfigurationError::InvalidRule {
            rule: config.describe(),
            reason: reason.to_string(),
        };

        let set = [
            config.pattern.is_some(),
            config.exact.is_some(),
            !config.contains_all.is_empty(),
        ]
        .iter()
        .filter(|present| **present)
        .count();
        if set != 1 {
            return Err(invalid(
                "exactly one of pattern, exact or contains_all must be set",
            ));
        }

        let matcher = if let Some(pattern) = &config.pattern {
            Regex::new(pattern)
                .map(RuleMatcher::Pattern)
                .map_err(|err| invalid(&err.to_string()))?
        } else if let Some(exact) = &config.exact {
            RuleMatcher::Exact(exact.clone())
        } else {
            RuleMatcher::ContainsAll(config.contains_all.clone())
        };

        Ok(CapabilityRule {
            matcher,
            mode: config.mode,
        })
    }
}

/// Default rule table. Overrides first, broad reasoning patterns last.
pub fn default_rules() -> Vec<CapabilityRuleConfig> {
    fn pattern(pattern: &str, mode: DeliveryMode) -> CapabilityRuleConfig {
        CapabilityRuleConfig {
            mode,
            pattern: Some(pattern.to_string()),
            exact: None,
            contains_all: Vec::new(),
        }
    }

    let mut rules = vec![
        // search-augmented chat models stream
        pattern(r"gpt-.+-search", DeliveryMode::Incremental),
        CapabilityRuleConfig {
            mode: DeliveryMode::Blocking,
            pattern: None,
            exact: Some("gpt-5".to_string()),
            contains_all: Vec::new(),
        },
        CapabilityRuleConfig {
            mode: DeliveryMode::Blocking,
            pattern: None,
            exact: None,
            contains_all: vec!["gpt".to_string(), "codex".to_string()],
        },
        pattern(
            r"grok-4(-\d+)?-fast.*non-reasoning",
            DeliveryMode::Incremental,
        ),
    ];

    rules.extend(
        [
            r"^o\d+",
            r"^(models/)?gemini-\d+\.\d+-pro.*",
            r"gemini-3-pro-preview$",
            r"^deepseek-reasoner$",
            r"^grok-4.*",
            r"^claude-opus-4.*",
        ]
        .into_iter()
        .map(|p| pattern(p, DeliveryMode::Blocking)),
    );

    rules
}

#[derive(Debug, Clone)]
pub struct CapabilityClassifier {
    rules: Vec<CapabilityRule>,
}

impl CapabilityClassifier {
    pub fn from_rules(rules: &[CapabilityRuleConfig]) -> Result<Self, ConfigurationError> {
        let rules = rules
            .iter()
            .map(CapabilityRule::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Build from user-configured rules, falling back to the default table
    /// when none are configured.
    pub fn from_config(rules: &[CapabilityRuleConfig]) -> Result<Self, ConfigurationError> {
        if rules.is_empty() {
            Self::from_rules(&default_rules())
        } else {
            Self::from_rules(rules)
        }
    }

    pub fn classify(&self, model: &str) -> DeliveryMode {
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(model))
            .map(|rule| rule.mode)
            .unwrap_or_default()
    }
}

impl Default for CapabilityClassifier {
    fn default() -> Self {
        let rules = default_rules()
            .iter()
            .filter_map(|rule| CapabilityRule::try_from(rule).ok())
            .collect();
        Self { rules }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_compiles_completely() {
        let classifier = CapabilityClassifier::from_rules(&default_rules()).expect("compile");
        assert_eq!(classifier.rules.len(), default_rules().len());
        assert_eq!(
            CapabilityClassifier::default().rules.len(),
            default_rules().len()
        );
    }

    #[test]
    fn known_models_classify_as_documented() {
        let classifier = CapabilityClassifier::default();
        let cases = [
            ("gpt-5", DeliveryMode::Blocking),
            ("o1-preview", DeliveryMode::Blocking),
            ("o3-mini", DeliveryMode::Blocking),
            ("gpt-4.1-mini", DeliveryMode::Incremental),
            ("gpt-4o", DeliveryMode::Incremental),
            ("gpt-5-codex", DeliveryMode::Blocking),
            ("gpt-4o-search-preview", DeliveryMode::Incremental),
            ("grok-4", DeliveryMode::Blocking),
            ("grok-4-fast-non-reasoning", DeliveryMode::Incremental),
            ("grok-4-0709-fast-non-reasoning", DeliveryMode::Incremental),
            ("grok-4-fast-reasoning", DeliveryMode::Blocking),
            ("gemini-2.5-pro", DeliveryMode::Blocking),
            ("models/gemini-2.5-pro-preview", DeliveryMode::Blocking),
            ("gemini-2.5-flash", DeliveryMode::Incremental),
            ("deepseek-reasoner", DeliveryMode::Blocking),
            ("deepseek-chat", DeliveryMode::Incremental),
            ("claude-opus-4-1", DeliveryMode::Blocking),
            ("claude-sonnet-4", DeliveryMode::Incremental),
            ("llama-3.3-70b-versatile", DeliveryMode::Incremental),
        ];

        for (model, expected) in cases {
            assert_eq!(classifier.classify(model), expected, "model {model}");
        }
    }

    #[test]
    fn classification_is_deterministic() {
        let classifier = CapabilityClassifier::default();
        for _ in 0..3 {
            assert_eq!(classifier.classify("o1-preview"), DeliveryMode::Blocking);
        }
    }

    #[test]
    fn search_override_wins_over_later_blocking_rules() {
        // contains both "gpt" and "codex" but is a search model
        let classifier = CapabilityClassifier::default();
        assert_eq!(
            classifier.classify("gpt-codex-search"),
            DeliveryMode::Incremental
        );
    }

    #[test]
    fn configured_rules_replace_the_default_table() {
        let rules = vec![CapabilityRuleConfig {
            mode: DeliveryMode::Blocking,
            pattern: Some("^slow-".to_string()),
            exact: None,
            contains_all: Vec::new(),
        }];
        let classifier = CapabilityClassifier::from_config(&rules).expect("compile");

        assert_eq!(classifier.classify("slow-model"), DeliveryMode::Blocking);
        assert_eq!(classifier.classify("gpt-5"), DeliveryMode::Incremental);
    }

    #[test]
    fn empty_configuration_uses_defaults() {
        let classifier = CapabilityClassifier::from_config(&[]).expect("compile");
        assert_eq!(classifier.classify("gpt-5"), DeliveryMode::Blocking);
    }

    #[test]
    fn invalid_rules_are_configuration_errors() {
        let bad_regex = CapabilityRuleConfig {
            mode: DeliveryMode::Blocking,
            pattern: Some("(unclosed".to_string()),
            exact: None,
            contains_all: Vec::new(),
        };
        assert!(matches!(
            CapabilityClassifier::from_rules(&[bad_regex]),
            Err(ConfigurationError::InvalidRule { .. })
        ));

        let two_matchers = CapabilityRuleConfig {
            mode: DeliveryMode::Blocking,
            pattern: Some("x".to_string()),
            exact: Some("x".to_string()),
            contains_all: Vec::new(),
        };
        assert!(CapabilityClassifier::from_rules(&[two_matchers]).is_err());

        let no_matcher = CapabilityRuleConfig {
            mode: DeliveryMode::Blocking,
            pattern: None,
            exact: None,
            contains_all: Vec::new(),
        };
        assert!(CapabilityClassifier::from_rules(&[no_matcher]).is_err());
    }

    #[test]
    fn rules_parse_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            capability_rules: Vec<CapabilityRuleConfig>,
        }

        let wrapper: Wrapper = toml::from_str(
            r#"
            [[capability_rules]]
            mode = "incremental"
            exact = "o1-fast"

            [[capability_rules]]
            mode = "blocking"
            pattern = "^o\\d+"
            "#,
        )
        .expect("parse");

        let classifier = CapabilityClassifier::from_config(&wrapper.capability_rules)
            .expect("compile");
        assert_eq!(classifier.classify("o1-fast"), DeliveryMode::Incremental);
        assert_eq!(classifier.classify("o1"), DeliveryMode::Blocking);
    }
}
