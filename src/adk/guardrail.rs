// SPDX-License-Identifier: MIT

//! Guardrails - post-hoc checks on a node's textual output
//!
//! A guardrail reports issues; the registry decides what happens:
//! - `block` fails the call with [`FlowError::GuardrailViolation`]
//! - `warn` logs and lets the text through
//! - `redact` rewrites the text through the guardrail's `fix` (regex
//!   guardrails replace matches with `[REDACTED]`)

use crate::adk::error::{FlowError, Result};
use jsonschema::JSONSchema;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub const REDACTED: &str = "[REDACTED]";

/// What to do when a guardrail pattern matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GuardAction {
    #[default]
    Block,
    Warn,
    Redact,
}

/// One `(pattern, action, message)` rule of a regex guardrail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardPattern {
    pub pattern: String,
    #[serde(default)]
    pub action: GuardAction,
    pub message: String,
}

impl GuardPattern {
    pub fn new(pattern: impl Into<String>, action: GuardAction, message: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            action,
            message: message.into(),
        }
    }
}

/// A problem found in an output
#[derive(Debug, Clone, PartialEq)]
pub struct GuardrailIssue {
    pub action: GuardAction,
    pub pattern: Option<String>,
    pub matches: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub issues: Vec<GuardrailIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Trait for checks applied to model output
pub trait Guardrail: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Inspect `output` and report every issue found
    fn validate(&self, output: &str) -> ValidationReport;

    /// Rewrite `output` for the given `redact` issues
    fn fix(&self, output: &str, _issues: &[GuardrailIssue]) -> String {
        output.to_string()
    }
}

/// Guardrail driven by case-insensitive regular expressions
pub struct RegexGuardrail {
    name: String,
    description: String,
    rules: Vec<(Regex, GuardPattern)>,
}

impl RegexGuardrail {
    /// Compile all patterns; an invalid pattern fails with a validation error
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        patterns: Vec<GuardPattern>,
    ) -> Result<Self> {
        let name = name.into();
        let rules = patterns
            .into_iter()
            .map(|p| {
                RegexBuilder::new(&p.pattern)
                    .case_insensitive(true)
                    .build()
                    .map(|re| (re, p.clone()))
                    .map_err(|e| {
                        FlowError::validation(format!(
                            "Invalid pattern '{}' in guardrail '{}': {}",
                            p.pattern, name, e
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name,
            description: description.into(),
            rules,
        })
    }
}

impl Guardrail for RegexGuardrail {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn validate(&self, output: &str) -> ValidationReport {
        let issues = self
            .rules
            .iter()
            .filter_map(|(re, rule)| {
                let matches: Vec<String> = re
                    .find_iter(output)
                    .map(|m| m.as_str().to_string())
                    .collect();
                (!matches.is_empty()).then(|| GuardrailIssue {
                    action: rule.action,
                    pattern: Some(rule.pattern.clone()),
                    matches,
                    message: rule.message.clone(),
                })
            })
            .collect();

        ValidationReport { issues }
    }

    fn fix(&self, output: &str, issues: &[GuardrailIssue]) -> String {
        let mut fixed = output.to_string();
        for (re, rule) in &self.rules {
            let flagged = issues
                .iter()
                .any(|i| i.pattern.as_deref() == Some(rule.pattern.as_str()));
            if flagged {
                fixed = re.replace_all(&fixed, REDACTED).into_owned();
            }
        }
        fixed
    }
}

/// Repairs output that failed a [`SchemaGuardrail`]: `(output, issues, schema) -> fixed`
pub type SchemaFixer = Arc<dyn Fn(&str, &[GuardrailIssue], &Value) -> String + Send + Sync>;

/// Guardrail requiring the output to be JSON that validates against a schema
pub struct SchemaGuardrail {
    name: String,
    description: String,
    action: GuardAction,
    schema: Value,
    validator: JSONSchema,
    fixer: Option<SchemaFixer>,
}

impl SchemaGuardrail {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: &Value,
    ) -> Result<Self> {
        let name = name.into();
        let validator = JSONSchema::compile(schema).map_err(|e| {
            FlowError::validation(format!("Invalid schema in guardrail '{}': {}", name, e))
        })?;

        Ok(Self {
            name,
            description: description.into(),
            action: GuardAction::Block,
            schema: schema.clone(),
            validator,
            fixer: None,
        })
    }

    /// Report violations with `action` instead of blocking
    pub fn with_action(mut self, action: GuardAction) -> Self {
        self.action = action;
        self
    }

    /// Rewrite invalid output with `fixer` instead of blocking
    ///
    /// Switches the action to [`GuardAction::Redact`]; the registry then
    /// passes the offending output through `fix`. An output the fixer cannot
    /// repair is returned as the fixer left it.
    pub fn with_fixer<F>(mut self, fixer: F) -> Self
    where
        F: Fn(&str, &[GuardrailIssue], &Value) -> String + Send + Sync + 'static,
    {
        self.fixer = Some(Arc::new(fixer));
        self.action = GuardAction::Redact;
        self
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    fn issue(&self, message: String) -> GuardrailIssue {
        GuardrailIssue {
            action: self.action,
            pattern: None,
            matches: vec![],
            message,
        }
    }
}

impl Guardrail for SchemaGuardrail {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn validate(&self, output: &str) -> ValidationReport {
        let data: Value = match serde_json::from_str(output.trim()) {
            Ok(v) => v,
            Err(e) => {
                return ValidationReport {
                    issues: vec![self.issue(format!("Invalid JSON: {}", e))],
                }
            }
        };

        let issues = match self.validator.validate(&data) {
            Ok(()) => vec![],
            Err(errors) => errors.map(|e| self.issue(e.to_string())).collect(),
        };

        ValidationReport { issues }
    }

    fn fix(&self, output: &str, issues: &[GuardrailIssue]) -> String {
        match &self.fixer {
            Some(fixer) => fixer(output, issues, &self.schema),
            None => output.to_string(),
        }
    }
}

/// Node-local guardrail set, applied in registration order
#[derive(Clone, Default)]
pub struct GuardrailRegistry {
    guardrails: Vec<Arc<dyn Guardrail>>,
    index: HashMap<String, usize>,
}

impl GuardrailRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a guardrail; an existing one with the same name is replaced in place
    pub fn register(&mut self, guardrail: Arc<dyn Guardrail>) {
        match self.index.get(guardrail.name()) {
            Some(&i) => self.guardrails[i] = guardrail,
            None => {
                self.index
                    .insert(guardrail.name().to_string(), self.guardrails.len());
                self.guardrails.push(guardrail);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Guardrail>> {
        self.index.get(name).map(|&i| &self.guardrails[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.guardrails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guardrails.is_empty()
    }

    /// Run every guardrail over `output`
    ///
    /// The first `block` issue aborts with [`FlowError::GuardrailViolation`];
    /// the unsafe text is never returned.
    pub fn apply_all(&self, output: &str) -> Result<String> {
        let mut current = output.to_string();

        for guardrail in &self.guardrails {
            let report = guardrail.validate(&current);
            if report.is_valid() {
                continue;
            }

            if let Some(issue) = report
                .issues
                .iter()
                .find(|i| i.action == GuardAction::Block)
            {
                log::error!(
                    "Guardrail '{}' blocked output: {}",
                    guardrail.name(),
                    issue.message
                );
                return Err(FlowError::GuardrailViolation {
                    guardrail: guardrail.name().to_string(),
                    pattern: issue.pattern.clone(),
                    message: issue.message.clone(),
                });
            }

            for issue in report.issues.iter().filter(|i| i.action == GuardAction::Warn) {
                log::warn!(
                    "Guardrail '{}' warning: {} (matches: {:?})",
                    guardrail.name(),
                    issue.message,
                    issue.matches
                );
            }

            let redactions: Vec<GuardrailIssue> = report
                .issues
                .into_iter()
                .filter(|i| i.action == GuardAction::Redact)
                .collect();
            if !redactions.is_empty() {
                log::info!(
                    "Guardrail '{}' redacted {} pattern(s)",
                    guardrail.name(),
                    redactions.len()
                );
                current = guardrail.fix(&current, &redactions);
            }
        }

        Ok(current)
    }
}
