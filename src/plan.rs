use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::session::SessionConfig;

/// A list of replacements run one after another, each in its own session.
#[derive(Debug, Deserialize)]
pub struct BatchPlan {
    pub steps: Vec<ReplaceStep>,
}

/// Settings a step may override; anything left out falls back to the
/// command line.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct PlanCommon {
    pub lang: Option<String>,
    #[serde(default)]
    pub components: Option<Vec<String>>,
    pub assume_yes: Option<bool>,
    pub assume_no: Option<bool>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceStep {
    #[serde(default)]
    pub common: PlanCommon,
    pub search: String,
    pub replacement: Option<String>,
    #[serde(default)]
    pub regex: bool,
}

impl ReplaceStep {
    pub fn session_config(&self, base: &SessionConfig) -> SessionConfig {
        let mut config = merge_common(base, &self.common);
        config.search = Some(self.search.clone());
        config.replacement = self.replacement.clone();
        config.regex = self.regex;
        config
    }
}

pub fn load_plan(path: &Path) -> Result<BatchPlan> {
    let data = fs::read(path).with_context(|| format!("reading plan {}", path.display()))?;
    if path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
    {
        serde_json::from_slice(&data).with_context(|| format!("parsing plan {}", path.display()))
    } else {
        serde_yaml::from_slice(&data).with_context(|| format!("parsing plan {}", path.display()))
    }
}

fn merge_common(base: &SessionConfig, overrides: &PlanCommon) -> SessionConfig {
    let mut merged = base.clone();
    if let Some(lang) = &overrides.lang {
        merged.lang = lang.clone();
    }
    if let Some(components) = &overrides.components {
        merged.components = components.clone();
    }
    if let Some(assume_yes) = overrides.assume_yes {
        merged.assume_yes = assume_yes;
    }
    if let Some(assume_no) = overrides.assume_no {
        merged.assume_no = assume_no;
    }
    if let Some(prefix) = &overrides.prefix {
        merged.prefix = Some(prefix.clone());
    }
    if let Some(suffix) = &overrides.suffix {
        merged.suffix = Some(suffix.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const YAML_PLAN: &str = r#"
steps:
  - search: course
    replacement: subject
    common:
      suffix: s
  - search: '(\d+) students'
    replacement: '$1 learners'
    regex: true
    common:
      lang: de
      components: ["mod_*"]
      assume_yes: true
"#;

    #[test]
    fn yaml_plan_overrides_command_line_defaults() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("plan.yaml");
        fs::write(&path, YAML_PLAN).unwrap();
        let plan = load_plan(&path).unwrap();
        assert_eq!(plan.steps.len(), 2);

        let base = SessionConfig {
            lang: "en".to_string(),
            components: vec!["core".to_string()],
            ..SessionConfig::default()
        };
        let first = plan.steps[0].session_config(&base);
        assert_eq!(first.lang, "en");
        assert_eq!(first.suffix.as_deref(), Some("s"));
        assert_eq!(first.search.as_deref(), Some("course"));
        assert!(!first.regex);

        let second = plan.steps[1].session_config(&base);
        assert_eq!(second.lang, "de");
        assert_eq!(second.components, ["mod_*"]);
        assert!(second.assume_yes);
        assert!(second.regex);
        assert_eq!(second.replacement.as_deref(), Some("$1 learners"));
    }

    #[test]
    fn json_plan_is_detected_by_extension() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("plan.JSON");
        fs::write(&path, r#"{"steps":[{"search":"a","replacement":"b"}]}"#).unwrap();
        let plan = load_plan(&path).unwrap();
        assert_eq!(plan.steps[0].search, "a");
    }

    #[test]
    fn step_without_replacement_leaves_it_unset() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("plan.yml");
        fs::write(&path, "steps:\n  - search: a\n").unwrap();
        let plan = load_plan(&path).unwrap();
        let config = plan.steps[0].session_config(&SessionConfig::default());
        assert!(config.replacement.is_none());
    }
}
