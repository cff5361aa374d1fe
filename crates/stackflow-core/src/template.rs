//! Template expansion
//!
//! Descriptor files are rendered with Tera before they are parsed, so
//! `{{ region }}` can be used anywhere in the file.

use crate::error::{ConfigError, Result};
use kdl::{KdlDocument, KdlValue};
use regex::Regex;
use std::collections::HashMap;
use tera::{Context, Tera};
use tracing::{debug, info};

/// Variable context
pub type Variables = HashMap<String, serde_json::Value>;

/// Environment prefixes exposed to templates
const ALLOWED_ENV_PREFIXES: &[&str] = &["STACK_", "CI_", "APP_"];

pub struct TemplateProcessor {
    tera: Tera,
    context: Context,
}

impl TemplateProcessor {
    pub fn new() -> Self {
        Self {
            tera: Tera::default(),
            context: Context::new(),
        }
    }

    pub fn add_variable(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.context.insert(key.into(), &value);
    }

    pub fn add_variables(&mut self, variables: Variables) {
        for (key, value) in variables {
            self.context.insert(key, &value);
        }
    }

    /// Add environment variables carrying one of the allowed prefixes.
    ///
    /// The rest of the environment is kept out of templates so that
    /// credentials exported for the provider CLI never end up in descriptors.
    #[tracing::instrument(skip(self))]
    pub fn add_env_variables(&mut self) {
        let mut count = 0;
        for (key, value) in std::env::vars() {
            if ALLOWED_ENV_PREFIXES
                .iter()
                .any(|prefix| key.starts_with(prefix))
            {
                debug!(key = %key, "Adding environment variable");
                self.context.insert(key, &serde_json::Value::String(value));
                count += 1;
            }
        }
        info!(env_var_count = count, "Added filtered environment variables");
    }

    pub fn render_str(&mut self, template: &str) -> Result<String> {
        self.tera
            .render_str(template, &self.context)
            .map_err(|e| ConfigError::TemplateRenderError(extract_tera_error_detail(&e)))
    }
}

impl Default for TemplateProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk the tera error chain; the top-level message alone is rarely useful
fn extract_tera_error_detail(error: &tera::Error) -> String {
    use std::error::Error;

    let mut messages = vec![error.to_string()];
    let mut source = error.source();
    while let Some(err) = source {
        messages.push(err.to_string());
        source = err.source();
    }
    messages.join(": ")
}

/// Extract the top-level `variables { ... }` block.
///
/// The block is cut out with a regex and parsed on its own, so template
/// expressions elsewhere in the file cannot break variable extraction.
pub fn extract_variables(kdl_content: &str) -> Result<Variables> {
    let re = Regex::new(r"(?m)^\s*variables\s*\{")
        .map_err(|e| ConfigError::InvalidConfig(format!("variables pattern: {}", e)))?;

    let mut vars = Variables::new();
    for mat in re.find_iter(kdl_content) {
        let open = mat.end() - 1;
        let Some(close) = find_matching_brace(kdl_content, open) else {
            return Err(ConfigError::InvalidConfig(
                "unterminated variables block".to_string(),
            ));
        };

        let block = &kdl_content[mat.start()..=close];
        let doc: KdlDocument = block.parse()?;
        for node in doc.nodes() {
            if let Some(children) = node.children() {
                for var in children.nodes() {
                    if let Some(value) = var.entries().first().map(|e| kdl_to_json(e.value())) {
                        vars.insert(var.name().value().to_string(), value);
                    }
                }
            }
        }
    }

    debug!(count = vars.len(), "Extracted variables");
    Ok(vars)
}

fn find_matching_brace(content: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in content[open..].char_indices() {
        if in_string {
            match ch {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => in_string = false,
                _ => escaped = false,
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Convert a KDL scalar into JSON
pub fn kdl_to_json(value: &KdlValue) -> serde_json::Value {
    if let Some(s) = value.as_string() {
        serde_json::Value::String(s.to_string())
    } else if let Some(i) = value.as_integer() {
        i64::try_from(i)
            .map(serde_json::Value::from)
            .unwrap_or_else(|_| serde_json::Value::String(i.to_string()))
    } else if let Some(f) = value.as_float() {
        serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    } else if let Some(b) = value.as_bool() {
        serde_json::Value::Bool(b)
    } else {
        serde_json::Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_render_variables() {
        let mut processor = TemplateProcessor::new();
        processor.add_variable("region", serde_json::json!("us-central1"));
        let rendered = processor
            .render_str(r#"region "{{ region }}""#)
            .unwrap();
        assert_eq!(rendered, r#"region "us-central1""#);
    }

    #[test]
    fn test_undefined_variable_is_an_error() {
        let mut processor = TemplateProcessor::new();
        let result = processor.render_str("{{ missing }}");
        assert!(matches!(result, Err(ConfigError::TemplateRenderError(_))));
    }

    #[test]
    fn test_output_references_survive_rendering() {
        let mut processor = TemplateProcessor::new();
        let rendered = processor.render_str(r#"DB_HOST "${db.endpoint}""#).unwrap();
        assert_eq!(rendered, r#"DB_HOST "${db.endpoint}""#);
    }

    #[test]
    #[serial]
    fn test_env_variables_are_filtered() {
        unsafe {
            std::env::set_var("STACK_TEST_REGION", "asia-northeast1");
            std::env::set_var("UNRELATED_TEST_SECRET", "nope");
        }

        let mut processor = TemplateProcessor::new();
        processor.add_env_variables();
        assert_eq!(
            processor.render_str("{{ STACK_TEST_REGION }}").unwrap(),
            "asia-northeast1"
        );
        assert!(processor.render_str("{{ UNRELATED_TEST_SECRET }}").is_err());

        unsafe {
            std::env::remove_var("STACK_TEST_REGION");
            std::env::remove_var("UNRELATED_TEST_SECRET");
        }
    }

    #[test]
    fn test_extract_variables() {
        let content = r#"
deployment "demo"

variables {
    region "us-central1"
    replicas 2
    public #true
}

resource "db" kind="database-instance" {
    region "{{ region }}"
}
"#;
        let vars = extract_variables(content).unwrap();
        assert_eq!(vars["region"], serde_json::json!("us-central1"));
        assert_eq!(vars["replicas"], serde_json::json!(2));
        assert_eq!(vars["public"], serde_json::json!(true));
    }

    #[test]
    fn test_braces_inside_strings_are_skipped() {
        let content = "variables {\n    pattern \"a}b\"\n}\n";
        let vars = extract_variables(content).unwrap();
        assert_eq!(vars["pattern"], serde_json::json!("a}b"));
    }
}
