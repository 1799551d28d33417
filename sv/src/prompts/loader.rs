//! Prompt Loader
//!
//! Loads prompt templates from an override directory or falls back to the
//! embedded defaults.

use std::path::PathBuf;

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;
use crate::eval::ScriptLanguage;
use crate::r#loop::RepairFeedback;

/// How a candidate in `language` must expose `solve`
fn entry_contract(language: ScriptLanguage) -> &'static str {
    match language {
        ScriptLanguage::Python => {
            "- `solve(input_str: str)` receives the whole test input as one string (stdin is also \
             available) and either prints the answer or returns it."
        }
        ScriptLanguage::Shell => {
            "- `solve` is a POSIX shell function; the whole test input arrives as \"$1\" and the \
             answer is written to stdout."
        }
    }
}

/// Variables for the `planning` / `planning-request` templates
#[derive(Debug, Clone, Serialize)]
pub struct PlanningContext {
    pub language: String,
    pub problem: String,
    pub tests: String,
    pub plan_count: u32,
}

impl PlanningContext {
    pub fn new(language: ScriptLanguage, problem: &str, tests: String, plan_count: u32) -> Self {
        debug!(%language, plan_count, "PlanningContext::new: called");
        Self {
            language: language.name().to_string(),
            problem: problem.to_string(),
            tests,
            plan_count,
        }
    }
}

/// Variables for the `coding` / `coding-request` templates
#[derive(Debug, Clone, Serialize)]
pub struct CodingContext {
    pub language: String,
    pub contract: String,
    pub problem: String,
    pub plan: String,
    pub tests: String,
}

impl CodingContext {
    pub fn new(language: ScriptLanguage, problem: &str, plan: &str, tests: String) -> Self {
        debug!(%language, tests_len = tests.len(), "CodingContext::new: called");
        Self {
            language: language.name().to_string(),
            contract: entry_contract(language).to_string(),
            problem: problem.to_string(),
            plan: plan.to_string(),
            tests,
        }
    }
}

/// Variables for the `debugging` / `debugging-request` templates
#[derive(Debug, Clone, Serialize)]
pub struct DebuggingContext {
    pub language: String,
    pub contract: String,
    pub original_code: String,
    pub failed_tests: String,
    pub compiler_error: String,
    pub plan: String,
}

impl DebuggingContext {
    pub fn new(language: ScriptLanguage, feedback: &RepairFeedback) -> Self {
        debug!(%language, "DebuggingContext::new: called");
        Self {
            language: language.name().to_string(),
            contract: entry_contract(language).to_string(),
            original_code: feedback.original_code.clone(),
            failed_tests: feedback.failed_tests_formatted.clone(),
            compiler_error: feedback.compiler_error.clone(),
            plan: feedback.solution_plan.clone(),
        }
    }
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine (no HTML escaping: prompts carry code)
    hbs: Handlebars<'static>,
    /// User override directory
    override_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader that checks `override_dir` before the embedded prompts
    pub fn new(override_dir: Option<PathBuf>) -> Self {
        debug!(?override_dir, "PromptLoader::new: called");
        let override_dir = override_dir.filter(|dir| {
            let exists = dir.is_dir();
            if !exists {
                debug!(?dir, "PromptLoader::new: override directory missing, ignoring");
            }
            exists
        });

        let mut hbs = Handlebars::new();
        hbs.register_escape_fn(handlebars::no_escape);

        Self { hbs, override_dir }
    }

    /// Create a loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self::new(None)
    }

    /// Load a template by name
    fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(ref dir) = self.override_dir {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found in override directory");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read prompt {}: {}", path.display(), e));
            }
            debug!(?path, "PromptLoader::load_template: not found in override directory");
        }

        embedded::get_embedded(name)
            .map(str::to_string)
            .ok_or_else(|| eyre!("Prompt template not found: {}", name))
    }

    /// Render a template with the given context
    pub fn render<T: Serialize>(&self, template_name: &str, context: &T) -> Result<String> {
        debug!(%template_name, "PromptLoader::render: called");
        let template = self.load_template(template_name)?;
        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn feedback() -> RepairFeedback {
        RepairFeedback {
            solution_plan: "Algorithm name: Math\nPlan: add".to_string(),
            original_code: "def solve(s):\n    return 1 < 2".to_string(),
            failed_tests_formatted: "Test Case 1:\nInput: 1 2\nExpected: 3\nGot: True".to_string(),
            compiler_error: "No compiler errors.".to_string(),
        }
    }

    #[test]
    fn test_render_coding_request() {
        let loader = PromptLoader::embedded_only();
        let context = CodingContext::new(
            ScriptLanguage::Python,
            "Add two numbers",
            "Algorithm name: Math\nPlan: add",
            "Input: 1 2\nOutput: 3".to_string(),
        );

        let system = loader.render("coding", &context).unwrap();
        assert!(system.contains("`solve` in python"));
        assert!(system.contains("input_str"));

        let user = loader.render("coding-request", &context).unwrap();
        assert!(user.contains("Add two numbers"));
        assert!(user.contains("Plan: add"));
        assert!(user.contains("Input: 1 2\nOutput: 3"));
    }

    #[test]
    fn test_render_planning_request() {
        let loader = PromptLoader::embedded_only();
        let context = PlanningContext::new(ScriptLanguage::Python, "Sort the array", "Input: 3 1 2".to_string(), 3);

        let system = loader.render("planning", &context).unwrap();
        assert!(system.contains("Propose 3 genuinely different approaches"));

        let user = loader.render("planning-request", &context).unwrap();
        assert!(user.contains("Sort the array"));
        assert!(user.contains("Input: 3 1 2"));
        assert!(user.contains("in python"));
    }

    #[test]
    fn test_render_does_not_escape_code() {
        let loader = PromptLoader::embedded_only();
        let context = DebuggingContext::new(ScriptLanguage::Python, &feedback());

        let user = loader.render("debugging-request", &context).unwrap();
        assert!(user.contains("return 1 < 2"));
        assert!(!user.contains("&lt;"));
        assert!(user.contains("No compiler errors."));

        let system = loader.render("debugging", &context).unwrap();
        assert!(system.contains("```python"));
    }

    #[test]
    fn test_shell_contract() {
        let loader = PromptLoader::embedded_only();
        let context = CodingContext::new(ScriptLanguage::Shell, "p", "q", String::new());
        let system = loader.render("coding", &context).unwrap();
        assert!(system.contains("POSIX shell function"));
    }

    #[test]
    fn test_override_directory_wins() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("coding.pmt"), "custom prompt for {{language}}").unwrap();

        let loader = PromptLoader::new(Some(dir.path().to_path_buf()));
        let context = CodingContext::new(ScriptLanguage::Shell, "p", "q", String::new());

        assert_eq!(loader.render("coding", &context).unwrap(), "custom prompt for shell");
        // Templates missing from the override directory still come from the embedded set
        assert!(loader.render("coding-request", &context).unwrap().contains("<PROBLEM>"));
    }

    #[test]
    fn test_missing_override_directory_is_ignored() {
        let loader = PromptLoader::new(Some(PathBuf::from("/nonexistent/sv-prompts")));
        assert!(loader.load_template("debugging").is_ok());
    }

    #[test]
    fn test_unknown_template() {
        let loader = PromptLoader::embedded_only();
        assert!(loader.load_template("nonexistent-template").is_err());
    }
}
