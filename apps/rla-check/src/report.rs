use std::path::PathBuf;

use anyhow::Context;
use rla_security::{UserMethodRegistry, UserValue};
use row_level_access::{RlaSettings, RuleRegistry};
use serde::Serialize;

use crate::cli::Cli;

#[derive(Debug, Serialize)]
pub struct Report {
    pub rules_file: PathBuf,
    pub default_type: String,
    pub rules: Vec<RuleEntry>,
}

#[derive(Debug, Serialize)]
pub struct RuleEntry {
    pub model: String,
    #[serde(rename = "type")]
    pub rule_type: String,
}

impl Report {
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut lines = vec![
            format!("rules file:   {}", self.rules_file.display()),
            format!("default type: {}", self.default_type),
        ];
        if self.rules.is_empty() {
            lines.push("no models are restricted".to_owned());
        }
        let width = self.rules.iter().map(|r| r.model.len()).max().unwrap_or(0);
        for rule in &self.rules {
            lines.push(format!("  {:<width$}  {}", rule.model, rule.rule_type));
        }
        lines.push(String::new());
        lines.join("\n")
    }
}

/// Resolve settings from the command line, load every rule and describe
/// the result.
///
/// # Errors
///
/// Fails when the settings or the rules file cannot be loaded, or when any
/// rule does not build.
pub fn build(cli: &Cli) -> anyhow::Result<Report> {
    let mut settings = RlaSettings::load(cli.settings.as_deref())
        .context("failed to load row level access settings")?;
    if let Some(dir) = &cli.config_dir {
        settings.config_dir.clone_from(dir);
    }

    // Host methods are unknown here; bind them to placeholders so their
    // rules still load.
    let mut methods = UserMethodRegistry::with_builtins();
    for name in &cli.user_methods {
        methods.register(name, |_| UserValue::Null);
    }

    tracing::debug!(path = %settings.rules_path().display(), "checking rules file");
    let registry = RuleRegistry::from_settings(&settings, methods);
    let rules = registry
        .get_rules()
        .with_context(|| format!("invalid rules in {}", settings.rules_path().display()))?;

    Ok(Report {
        rules_file: settings.rules_path(),
        default_type: registry.default_type().to_owned(),
        rules: rules
            .entries()
            .map(|(model, rule)| RuleEntry {
                model: model.to_owned(),
                rule_type: rule.type_name().to_owned(),
            })
            .collect(),
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::cli::Format;
    use tempfile::TempDir;

    fn cli(dir: &TempDir, user_methods: &[&str]) -> Cli {
        Cli {
            settings: None,
            config_dir: Some(dir.path().to_path_buf()),
            user_methods: user_methods.iter().map(|m| (*m).to_owned()).collect(),
            format: Format::Text,
            log_level: "info".to_owned(),
        }
    }

    #[test]
    fn reports_every_configured_model() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("rla.yml"),
            "Contact:\n  field: Customer.team_id\n  user_method: team_ids\nInvoice:\n  type: no_op\n",
        )
        .unwrap();

        let report = build(&cli(&dir, &["team_ids"])).unwrap();
        let text = report.to_text();
        assert!(text.contains("Contact  field_equals_user_method"), "{text}");
        assert!(text.contains("Invoice  no_op"), "{text}");

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["rules"][1]["type"], "no_op");
        assert_eq!(json["default_type"], "field_equals_user_method");
    }

    #[test]
    fn undeclared_user_method_fails() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("rla.yml"),
            "Contact:\n  field: Customer.team_id\n  user_method: team_ids\n",
        )
        .unwrap();

        let err = build(&cli(&dir, &[])).unwrap_err();
        assert!(format!("{err:#}").contains("team_ids"), "{err:#}");
    }

    #[test]
    fn empty_file_reports_no_restrictions() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("rla.yml"), "").unwrap();

        let text = build(&cli(&dir, &[])).unwrap().to_text();
        assert!(text.contains("no models are restricted"), "{text}");
    }
}
