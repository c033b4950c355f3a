//! Placeholder substitution for `{{name}}` templates
//!
//! Compilation is fail-open: a placeholder without a usable value is rendered
//! as `[name]` instead of failing, so a preview always produces text.
//! [`validate`] is the gate to use before actually sending.

use prospecta_storage::models::EmailTemplate;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Variable values keyed by placeholder name
pub type TemplateVars = HashMap<String, String>;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("placeholder regex is valid"))
}

/// Rendered subject and body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledTemplate {
    pub subject: String,
    pub body: String,
}

/// Mismatch between declared variables and the placeholders in use
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableCheck {
    /// Used in subject or body but not declared
    pub undeclared: Vec<String>,
    /// Declared but never used
    pub unused: Vec<String>,
}

impl VariableCheck {
    pub fn is_consistent(&self) -> bool {
        self.undeclared.is_empty() && self.unused.is_empty()
    }
}

fn usable<'a>(vars: &'a TemplateVars, name: &str) -> Option<&'a str> {
    vars.get(name)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
}

/// Substitute every placeholder in `text`
pub fn render(text: &str, vars: &TemplateVars) -> String {
    placeholder_regex()
        .replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            match usable(vars, name) {
                Some(value) => value.to_string(),
                None => format!("[{}]", name),
            }
        })
        .into_owned()
}

/// Render subject and body
pub fn compile(template: &EmailTemplate, vars: &TemplateVars) -> CompiledTemplate {
    CompiledTemplate {
        subject: render(&template.subject, vars),
        body: render(&template.body, vars),
    }
}

/// Declared variables that are absent or blank in `vars`, in declaration order
pub fn validate(template: &EmailTemplate, vars: &TemplateVars) -> Vec<String> {
    template
        .variables
        .iter()
        .filter(|name| usable(vars, name).is_none())
        .cloned()
        .collect()
}

/// Placeholder names found in `text`, de-duplicated in first-seen order
pub fn extract_variables(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    placeholder_regex()
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Compare the declared variable list against subject and body
pub fn check_declared_variables(template: &EmailTemplate) -> VariableCheck {
    let used = extract_variables(&format!("{}\n{}", template.subject, template.body));

    let undeclared = used
        .iter()
        .filter(|name| !template.variables.contains(name))
        .cloned()
        .collect();
    let unused = template
        .variables
        .iter()
        .filter(|name| !used.contains(name))
        .cloned()
        .collect();

    VariableCheck { undeclared, unused }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use prospecta_common::types::{TemplateCategory, TemplatePriority};
    use uuid::Uuid;

    fn template(subject: &str, body: &str, variables: &[&str]) -> EmailTemplate {
        let now = Utc::now();
        EmailTemplate {
            id: Uuid::new_v4(),
            key: "intro".to_string(),
            name: "Intro".to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            variables: variables.iter().map(|v| v.to_string()).collect(),
            category: TemplateCategory::Introduction,
            priority: TemplatePriority::Medium,
            target_segments: vec![],
            variant: None,
            is_active: true,
            performance: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn vars(pairs: &[(&str, &str)]) -> TemplateVars {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_compile_falls_back_to_visible_placeholder() {
        let t = template("Hi {{name}}", "{{x}}", &["name", "x"]);
        let compiled = compile(&t, &vars(&[("name", "Ana")]));

        assert_eq!(compiled.subject, "Hi Ana");
        assert_eq!(compiled.body, "[x]");
    }

    #[test]
    fn test_compile_blank_value_is_missing() {
        let t = template("Hi {{ name }}", "See you at {{company}}", &["name", "company"]);
        let compiled = compile(&t, &vars(&[("name", "  "), ("company", "Maison")]));

        assert_eq!(compiled.subject, "Hi [name]");
        assert_eq!(compiled.body, "See you at Maison");
    }

    #[test]
    fn test_compile_ignores_unknown_vars() {
        let t = template("Plain subject", "Plain body", &[]);
        let compiled = compile(&t, &vars(&[("name", "Ana")]));
        assert_eq!(compiled.subject, "Plain subject");
        assert_eq!(compiled.body, "Plain body");
    }

    #[test]
    fn test_validate_lists_missing_and_blank() {
        let t = template("{{a}}", "{{b}} {{c}}", &["a", "b", "c"]);
        let missing = validate(&t, &vars(&[("a", "1"), ("b", "")]));
        assert_eq!(missing, vec!["b", "c"]);

        let ready = validate(&t, &vars(&[("a", "1"), ("b", "2"), ("c", "3")]));
        assert!(ready.is_empty());
    }

    #[test]
    fn test_extract_variables_dedup_order() {
        let found = extract_variables("{{name}} at {{ company }}, bye {{name}} {{date}}");
        assert_eq!(found, vec!["name", "company", "date"]);
    }

    #[test]
    fn test_check_declared_variables() {
        let t = template("Hello {{name}}", "{{company}} {{unlisted}}", &["name", "company", "stale"]);
        let check = check_declared_variables(&t);

        assert_eq!(check.undeclared, vec!["unlisted"]);
        assert_eq!(check.unused, vec!["stale"]);
        assert!(!check.is_consistent());
    }
}
