//! LLM-backed candidate source
//!
//! Planning asks for tagged `<algorithm_name>`/`<plan>`/`<confidence>` triples.
//! Generation asks for code inside `<code>` tags; repair replies are markdown
//! ending in a fenced block. Every reply has its `<thinking>` sections dropped
//! before anything is extracted.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{Plan, Problem, TestCase};
use crate::eval::ScriptLanguage;
use crate::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, StopReason};
use crate::prompts::{CodingContext, DebuggingContext, PlanningContext, PromptLoader};
use crate::r#loop::{CandidateSource, RepairFeedback};

/// Sampling temperature for drafting plans
pub const PLANNING_TEMPERATURE: f32 = 0.3;

/// Plans requested when none is configured
pub const DEFAULT_PLAN_COUNT: u32 = 3;

/// Sampling temperature for fresh generations
pub const CODING_TEMPERATURE: f32 = 0.1;

/// Sampling temperature for repairs
pub const DEBUGGING_TEMPERATURE: f32 = 0.3;

/// Rate-limit waits tolerated per request before the error is returned
const MAX_RATE_LIMIT_WAITS: u32 = 3;

/// Longest single rate-limit wait honoured
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(120);

/// Failures talking to the model or reading its reply
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("LLM request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Model reply contained no text")]
    EmptyReply,

    #[error("No code found in model reply ({len} chars)")]
    NoCode { len: usize },

    #[error("No plans found in model reply ({len} chars)")]
    NoPlans { len: usize },

    #[error("Prompt rendering failed: {0}")]
    Prompt(String),

    #[error("Invalid extraction pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Pulls candidate code out of model replies
#[derive(Debug, Clone)]
pub struct CodeExtractor {
    thinking: Regex,
    code_tag: Regex,
    fence: Regex,
}

impl CodeExtractor {
    pub fn new() -> Result<Self, AgentError> {
        Ok(Self {
            thinking: Regex::new(r"(?s)<thinking>.*?(</thinking>|$)")?,
            code_tag: Regex::new(r"(?s)<code>(.*?)</code>")?,
            fence: Regex::new(r"(?s)```[A-Za-z0-9_+\-]*[ \t]*\r?\n(.*?)```")?,
        })
    }

    /// Remove `<thinking>` sections, including an unterminated trailing one
    pub fn strip_thinking(&self, text: &str) -> String {
        self.thinking.replace_all(text, "").into_owned()
    }

    /// Code from a reply: the first `<code>` block, else the last fenced block
    pub fn extract(&self, reply: &str) -> Option<String> {
        debug!(reply_len = reply.len(), "extract: called");
        let visible = self.strip_thinking(reply);

        if let Some(caps) = self.code_tag.captures(&visible) {
            debug!("extract: found <code> block");
            let code = self.strip_fences(caps[1].trim());
            return (!code.is_empty()).then_some(code);
        }

        if let Some(caps) = self.fence.captures_iter(&visible).last() {
            debug!("extract: using last fenced block");
            let code = caps[1].trim().to_string();
            return (!code.is_empty()).then_some(code);
        }

        debug!("extract: no code found");
        None
    }

    /// Models sometimes fence the code inside the `<code>` tags too
    fn strip_fences(&self, code: &str) -> String {
        match self.fence.captures(code) {
            Some(caps) if code.starts_with("```") => caps[1].trim().to_string(),
            _ => code.to_string(),
        }
    }
}

/// Reads `<algorithm_name>`, `<plan>`, `<confidence>` triples from a planning reply
#[derive(Debug, Clone)]
pub struct PlanParser {
    thinking: Regex,
    triple: Regex,
}

impl PlanParser {
    pub fn new() -> Result<Self, AgentError> {
        Ok(Self {
            thinking: Regex::new(r"(?s)<thinking>.*?(</thinking>|$)")?,
            triple: Regex::new(
                r"(?s)<algorithm_name>(.*?)</algorithm_name>\s*<plan>(.*?)</plan>(?:\s*<confidence>\s*(\d+)\s*</confidence>)?",
            )?,
        })
    }

    /// Plans in reply order; a missing confidence counts as 0, larger than 100 as 100
    pub fn parse(&self, reply: &str) -> Vec<Plan> {
        debug!(reply_len = reply.len(), "PlanParser::parse: called");
        let visible = self.thinking.replace_all(reply, "");
        self.triple
            .captures_iter(&visible)
            .filter_map(|caps| {
                let name = caps[1].trim();
                let steps = caps[2].trim();
                if name.is_empty() || steps.is_empty() {
                    debug!("PlanParser::parse: skipping empty plan");
                    return None;
                }
                let confidence = caps
                    .get(3)
                    .and_then(|m| m.as_str().parse::<u32>().ok())
                    .map_or(0, |c| c.min(100) as u8);
                Some(Plan::new(name, steps, confidence))
            })
            .collect()
    }
}

/// Public cases rendered for the generation prompt
fn format_examples(cases: &[TestCase]) -> String {
    cases
        .iter()
        .enumerate()
        .map(|(i, case)| {
            format!(
                "Test {}:\nInput:\n{}\nExpected output:\n{}",
                i + 1,
                case.input.trim_end(),
                case.expected_output.trim_end()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Generates and repairs candidates with an LLM
pub struct LlmCandidateSource {
    llm: Arc<dyn LlmClient>,
    extractor: CodeExtractor,
    planner: PlanParser,
    plan_count: u32,
    prompts: PromptLoader,
    language: ScriptLanguage,
    max_tokens: u32,
}

impl LlmCandidateSource {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        prompts: PromptLoader,
        language: ScriptLanguage,
        max_tokens: u32,
    ) -> Result<Self, AgentError> {
        debug!(%language, max_tokens, "LlmCandidateSource::new: called");
        Ok(Self {
            llm,
            extractor: CodeExtractor::new()?,
            planner: PlanParser::new()?,
            plan_count: DEFAULT_PLAN_COUNT,
            prompts,
            language,
            max_tokens,
        })
    }

    /// Number of plans to ask for when a problem has none
    pub fn with_plan_count(mut self, plan_count: u32) -> Self {
        self.plan_count = plan_count.max(1);
        self
    }

    /// Code extracted from the model's reply
    async fn ask(&self, system: &str, user: String, temperature: f32) -> Result<String, AgentError> {
        let reply = self.ask_text(system, user, temperature).await?;
        self.extractor
            .extract(&reply)
            .ok_or(AgentError::NoCode { len: reply.len() })
    }

    async fn ask_text(&self, system: &str, user: String, temperature: f32) -> Result<String, AgentError> {
        debug!(system_len = system.len(), user_len = user.len(), temperature, "ask_text: called");
        let request = CompletionRequest::new(system, user, self.max_tokens).with_temperature(temperature);
        let response = self.complete(request).await?;

        if response.stop_reason == StopReason::MaxTokens {
            warn!("Model reply hit the token limit; it may be truncated");
        }
        debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "ask_text: response received"
        );

        response.content.ok_or(AgentError::EmptyReply)
    }

    /// Send `request`, sleeping out rate limits a bounded number of times
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, AgentError> {
        let mut waits = 0;
        loop {
            match self.llm.complete(request.clone()).await {
                Err(LlmError::RateLimited { retry_after }) if waits < MAX_RATE_LIMIT_WAITS => {
                    waits += 1;
                    let wait = retry_after.min(MAX_RATE_LIMIT_WAIT);
                    warn!("Rate limited, sleeping for {:?} ({}/{})", wait, waits, MAX_RATE_LIMIT_WAITS);
                    tokio::time::sleep(wait).await;
                }
                result => return Ok(result?),
            }
        }
    }

    fn render(&self, name: &str, context: &impl serde::Serialize) -> Result<String, AgentError> {
        self.prompts
            .render(name, context)
            .map_err(|e| AgentError::Prompt(e.to_string()))
    }
}

#[async_trait]
impl CandidateSource for LlmCandidateSource {
    async fn generate(&self, problem: &Problem, plan: &Plan) -> eyre::Result<String> {
        debug!(problem = %problem.name, algorithm = %plan.algorithm_name, "generate: called");
        let context = CodingContext::new(
            self.language,
            &problem.statement,
            &plan.describe(),
            format_examples(&problem.public_cases()),
        );
        let system = self.render("coding", &context)?;
        let user = self.render("coding-request", &context)?;

        let code = self.ask(&system, user, CODING_TEMPERATURE).await?;
        info!("Generated candidate for plan '{}' ({} chars)", plan.algorithm_name, code.len());
        Ok(code)
    }

    async fn repair(&self, problem: &Problem, feedback: &RepairFeedback) -> eyre::Result<String> {
        debug!(problem = %problem.name, "repair: called");
        let context = DebuggingContext::new(self.language, feedback);
        let system = self.render("debugging", &context)?;
        let user = self.render("debugging-request", &context)?;

        let code = self.ask(&system, user, DEBUGGING_TEMPERATURE).await?;
        info!("Repaired candidate ({} chars)", code.len());
        Ok(code)
    }

    async fn plan(&self, problem: &Problem) -> eyre::Result<Vec<Plan>> {
        debug!(problem = %problem.name, plan_count = self.plan_count, "plan: called");
        let context = PlanningContext::new(
            self.language,
            &problem.statement,
            format_examples(&problem.public_cases()),
            self.plan_count,
        );
        let system = self.render("planning", &context)?;
        let user = self.render("planning-request", &context)?;

        let reply = self.ask_text(&system, user, PLANNING_TEMPERATURE).await?;
        let plans = self.planner.parse(&reply);
        if plans.is_empty() {
            return Err(AgentError::NoPlans { len: reply.len() }.into());
        }
        info!("Drafted {} plan(s) for '{}'", plans.len(), problem.name);
        Ok(plans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TestSet;
    use crate::llm::client::mock::MockLlmClient;

    fn problem() -> Problem {
        Problem {
            name: "sum".to_string(),
            statement: "Print a + b.".to_string(),
            plans: vec![Plan::new("Arithmetic", "Parse and add", 90)],
            public_tests: TestSet {
                input: vec!["1 2".to_string()],
                output: vec!["3".to_string()],
            },
            private_tests: Some(TestSet {
                input: vec!["secret".to_string()],
                output: vec!["hidden".to_string()],
            }),
        }
    }

    fn source(mock: Arc<MockLlmClient>) -> LlmCandidateSource {
        LlmCandidateSource::new(mock, PromptLoader::embedded_only(), ScriptLanguage::Python, 2048).unwrap()
    }

    fn extract_code(reply: &str) -> Option<String> {
        CodeExtractor::new().unwrap().extract(reply)
    }

    #[test]
    fn test_extract_code_tags() {
        let reply = "<thinking>use <code>fake</code> here</thinking>\n<code>\ndef solve(s):\n    return s\n</code>";
        assert_eq!(extract_code(reply).unwrap(), "def solve(s):\n    return s");
    }

    #[test]
    fn test_extract_code_tags_with_inner_fence() {
        let reply = "<code>\n```python\nprint(1)\n```\n</code>";
        assert_eq!(extract_code(reply).unwrap(), "print(1)");
    }

    #[test]
    fn test_extract_last_fenced_block() {
        let reply = "# Analysis\n```python\nold()\n```\n## 5. Debugged Code\n```python\ndef solve(s):\n    pass\n```\n";
        assert_eq!(extract_code(reply).unwrap(), "def solve(s):\n    pass");
    }

    #[test]
    fn test_extract_ignores_code_in_unterminated_thinking() {
        let reply = "```python\nkeep()\n```\n<thinking>\n```python\ndraft()\n```";
        assert_eq!(extract_code(reply).unwrap(), "keep()");
    }

    #[test]
    fn test_extract_none() {
        assert!(extract_code("I could not solve this.").is_none());
        assert!(extract_code("<code>   </code>").is_none());
    }

    #[test]
    fn test_parse_plans() {
        let reply = "<thinking>\n<algorithm_name>Draft</algorithm_name><plan>ignore</plan>\n</thinking>\n\
            <algorithm_name>Greedy</algorithm_name>\n<plan>\n1. Sort\n2. Take\n</plan>\n<confidence>70</confidence>\n\
            <algorithm_name>Brute force</algorithm_name>\n<plan>Try all</plan>\n<confidence> 250 </confidence>\n\
            <algorithm_name>DP</algorithm_name>\n<plan>Table</plan>";
        let plans = PlanParser::new().unwrap().parse(reply);

        assert_eq!(
            plans,
            vec![
                Plan::new("Greedy", "1. Sort\n2. Take", 70),
                Plan::new("Brute force", "Try all", 100),
                Plan::new("DP", "Table", 0),
            ]
        );
    }

    #[test]
    fn test_parse_plans_skips_empty() {
        let parser = PlanParser::new().unwrap();
        assert!(parser.parse("<algorithm_name> </algorithm_name><plan>x</plan>").is_empty());
        assert!(parser.parse("no plans here").is_empty());
    }

    #[test]
    fn test_format_examples() {
        let text = format_examples(&[TestCase::public("1 2\n", "3\n"), TestCase::public("4 5", "9")]);
        assert_eq!(
            text,
            "Test 1:\nInput:\n1 2\nExpected output:\n3\n\nTest 2:\nInput:\n4 5\nExpected output:\n9"
        );
    }

    #[tokio::test]
    async fn test_generate_uses_public_tests_only() {
        let mock = Arc::new(MockLlmClient::with_texts(&[
            "<thinking>easy</thinking><code>def solve(s):\n    a, b = map(int, s.split())\n    return a + b</code>",
        ]));
        let source = source(mock.clone());

        let code = source.generate(&problem(), &problem().plans[0]).await.unwrap();
        assert!(code.starts_with("def solve(s):"));

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].temperature, Some(CODING_TEMPERATURE));
        let user = &requests[0].messages[0].content;
        assert!(user.contains("Print a + b."));
        assert!(user.contains("Algorithm name: Arithmetic"));
        assert!(user.contains("1 2"));
        assert!(!user.contains("secret"));
    }

    #[tokio::test]
    async fn test_repair_sends_feedback() {
        let mock = Arc::new(MockLlmClient::with_texts(&["Fixed it:\n```python\ndef solve(s):\n    return 3\n```"]));
        let source = source(mock.clone());
        let feedback = RepairFeedback {
            solution_plan: "Algorithm name: Arithmetic\nPlan: Parse and add".to_string(),
            original_code: "def solve(s):\n    return 0".to_string(),
            failed_tests_formatted: "Test Case 1:\nInput: 1 2\nExpected: 3\nGot: 0".to_string(),
            compiler_error: "No compiler errors.".to_string(),
        };

        let code = source.repair(&problem(), &feedback).await.unwrap();
        assert_eq!(code, "def solve(s):\n    return 3");

        let request = &mock.requests()[0];
        assert_eq!(request.temperature, Some(DEBUGGING_TEMPERATURE));
        assert!(request.messages[0].content.contains("Got: 0"));
        assert!(request.messages[0].content.contains("return 0"));
    }

    #[tokio::test]
    async fn test_reply_without_code_is_error() {
        let mock = Arc::new(MockLlmClient::with_texts(&["Sorry, no idea."]));
        let err = source(mock).generate(&problem(), &problem().plans[0]).await.unwrap_err();
        assert!(err.to_string().contains("No code found"));
    }

    #[tokio::test]
    async fn test_empty_reply_is_error() {
        let mock = Arc::new(MockLlmClient::new(vec![CompletionResponse {
            content: None,
            stop_reason: StopReason::EndTurn,
            usage: Default::default(),
        }]));
        let err = source(mock).generate(&problem(), &problem().plans[0]).await.unwrap_err();
        assert!(err.to_string().contains("no text"));
    }

    #[tokio::test]
    async fn test_plan_drafts_from_public_tests() {
        let mock = Arc::new(MockLlmClient::with_texts(&[
            "<thinking>two ideas</thinking>\n\
             <algorithm_name>Arithmetic</algorithm_name><plan>1. Split\n2. Add</plan><confidence>95</confidence>\n\
             <algorithm_name>Big integers</algorithm_name><plan>1. Add digit by digit</plan><confidence>40</confidence>",
        ]));
        let source = source(mock.clone()).with_plan_count(2);

        let plans = source.plan(&problem()).await.unwrap();
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].algorithm_name, "Arithmetic");
        assert_eq!(plans[0].confidence, 95);
        assert_eq!(plans[1].plan, "1. Add digit by digit");

        let request = &mock.requests()[0];
        assert_eq!(request.temperature, Some(PLANNING_TEMPERATURE));
        assert!(request.system_prompt.contains("Propose 2 genuinely"));
        let user = &request.messages[0].content;
        assert!(user.contains("Print a + b."));
        assert!(user.contains("1 2"));
        assert!(!user.contains("secret"));
    }

    #[tokio::test]
    async fn test_plan_reply_without_plans_is_error() {
        let mock = Arc::new(MockLlmClient::with_texts(&["Just brute force it."]));
        let err = source(mock).plan(&problem()).await.unwrap_err();
        assert!(err.to_string().contains("No plans found"));
    }

    #[tokio::test]
    async fn test_rate_limit_is_waited_out() {
        let mock = Arc::new(MockLlmClient::with_results(vec![
            Err(LlmError::RateLimited {
                retry_after: Duration::from_millis(10),
            }),
            Ok(CompletionResponse::text("<code>def solve(s):\n    return 1</code>")),
        ]));

        let code = source(mock.clone()).generate(&problem(), &problem().plans[0]).await.unwrap();
        assert_eq!(code, "def solve(s):\n    return 1");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_persistent_rate_limit_gives_up() {
        let limited = || -> Result<CompletionResponse, LlmError> {
            Err(LlmError::RateLimited {
                retry_after: Duration::from_millis(1),
            })
        };
        let mock = Arc::new(MockLlmClient::with_results(vec![limited(), limited(), limited(), limited()]));

        let err = source(mock.clone()).generate(&problem(), &problem().plans[0]).await.unwrap_err();
        assert!(err.to_string().contains("Rate limited"));
        assert_eq!(mock.call_count(), MAX_RATE_LIMIT_WAITS as usize + 1);
    }
}
