//! Prompt templates for the analysis pipeline.
//!
//! Templates are compiled in and can be overridden per name by markdown
//! files in a directory (`<dir>/<name>.md`). Placeholders use the
//! `[TOKEN]` form and are replaced verbatim.

use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::{PromptError, PromptResult};

/// Template name for the decomposition step.
pub const ORCHESTRATOR_TEMPLATE: &str = "orchestrator";
/// Template name shared by the five specialists.
pub const AGENTS_TEMPLATE: &str = "agents";
/// Template name for the synthesis step.
pub const SYNTHESIS_TEMPLATE: &str = "synthesis";

/// Placeholder in [`AGENTS_TEMPLATE`] replaced by the specialist identity.
pub const AGENT_NAME_TOKEN: &str = "AGENT_NAME";

/// Appended to every system instruction so answers follow the user's language.
pub const LANGUAGE_FIDELITY_DIRECTIVE: &str = "IMPORTANT: You must output your analysis in the SAME language as the user's decision (e.g. if the decision is in English, respond in English; if French, in French).
This overrides the language of the system prompt. Maintain the JSON structure rigorously.";

/// System prompt for decomposing a decision into specialist missions.
pub const ORCHESTRATOR_PROMPT: &str = r#"You are the orchestrator of a cognitive audit. A user submits a decision and, optionally, the reasoning behind it. Your job is to frame the problem and hand each specialist a precise mission.

Specialists:
- logical: checks internal coherence, hidden premises and logical fallacies
- causal: maps cause-and-effect chains and second-order effects
- risk: identifies exposures, failure modes and their severity
- skeptic: will later contest the logical report; tell it what to attack
- stress: will later amplify the risk report; tell it which scenarios to push to the extreme

Your response MUST be valid JSON in this exact format:
{
  "decision_summary": "one or two sentences restating the decision",
  "assumptions": ["implicit assumption the decision relies on"],
  "agent_tasks": {
    "logical": "mission for the logical specialist",
    "causal": "mission for the causal specialist",
    "risk": "mission for the risk specialist",
    "skeptic": "mission for the skeptic specialist",
    "stress": "mission for the stress-test specialist"
  }
}

Guidelines:
- Every one of the five agent_tasks entries is required and must be specific to this decision
- List the assumptions the user did not state but depends on
- Do not analyse the decision yourself

Always respond with valid JSON only, no other text."#;

/// System prompt for one specialist; `[AGENT_NAME]` is substituted.
pub const AGENTS_PROMPT: &str = r#"You are the [AGENT_NAME] specialist of a cognitive audit team. You receive a specific mission, the user's decision and, for some specialists, an upstream report to contest or amplify.

Your response MUST be valid JSON in this exact format:
{
  "agent_name": "[AGENT_NAME]",
  "rationale": "your private reasoning before the findings",
  "findings": [
    {
      "point": "short statement of the finding",
      "explanation": "one or two sentences",
      "severity": "low|medium|high",
      "detailed_explanation": "in-depth explanation with evidence"
    }
  ],
  "causal_elements": [
    { "cause": "cause", "effect": "effect", "confidence": 0.7 }
  ]
}

Guidelines:
- Stay strictly within your mission
- Verify factual claims with the search tool when available
- severity is one of low, medium, high
- causal_elements is mainly for the causal specialist; confidence is between 0.0 and 1.0
- An empty findings list is acceptable when nothing relevant is found

Always respond with valid JSON only, no other text."#;

/// System prompt for merging every report into the final verdict.
pub const SYNTHESIS_PROMPT: &str = r#"You are the synthesis judge of a cognitive audit. You receive the orchestrator's framing and the reports of five specialists (logical, causal, risk, skeptic, stress).

Your response MUST be valid JSON in this exact format:
{
  "critical_flaws": [
    {
      "title": "name of the flaw",
      "impact": "what happens if it is ignored",
      "evidence": ["specialist finding supporting it"],
      "detailed_explanation": "in-depth explanation",
      "solution": "how to fix or mitigate it"
    }
  ],
  "decision_paths": [
    {
      "path": "a viable way forward",
      "valid_if": "conditions under which it holds",
      "fails_if": "conditions under which it breaks",
      "robustness_score": 70,
      "detailed_explanation": "why this score"
    }
  ],
  "synthesis_summary": "overall verdict in a few sentences"
}

Guidelines:
- Only keep flaws supported by at least one specialist
- robustness_score is an integer between 0 and 100
- synthesis_summary must never be empty

Always respond with valid JSON only, no other text."#;

/// Built-in template text by name.
pub fn builtin_template(name: &str) -> Option<&'static str> {
    match name {
        ORCHESTRATOR_TEMPLATE => Some(ORCHESTRATOR_PROMPT),
        AGENTS_TEMPLATE => Some(AGENTS_PROMPT),
        SYNTHESIS_TEMPLATE => Some(SYNTHESIS_PROMPT),
        _ => None,
    }
}

/// Append the language-fidelity directive to a system instruction.
pub fn with_language_directive(system: &str) -> String {
    format!("{}\n\n{}", system.trim_end(), LANGUAGE_FIDELITY_DIRECTIVE)
}

const TEMPLATE_NAMES: [&str; 3] = [ORCHESTRATOR_TEMPLATE, AGENTS_TEMPLATE, SYNTHESIS_TEMPLATE];

/// Resolves named templates and substitutes `[TOKEN]` placeholders.
///
/// Override files are read once, when the store is built, so resolving a
/// template never touches the filesystem.
#[derive(Debug, Clone, Default)]
pub struct PromptStore {
    overrides: HashMap<String, String>,
}

impl PromptStore {
    /// Store backed only by the built-in templates.
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Store that prefers `<dir>/<name>.md` over the built-in template.
    pub fn with_override_dir(dir: &Path) -> PromptResult<Self> {
        let mut overrides = HashMap::new();

        for name in TEMPLATE_NAMES {
            let path = dir.join(format!("{}.md", name));
            if !path.is_file() {
                continue;
            }

            debug!(template = %name, path = %path.display(), "Loading prompt override");
            let content = std::fs::read_to_string(&path).map_err(|e| PromptError::Io {
                name: name.to_string(),
                message: e.to_string(),
            })?;
            overrides.insert(name.to_string(), content);
        }

        Ok(Self { overrides })
    }

    /// Build from an optional directory.
    pub fn from_dir(dir: Option<&Path>) -> PromptResult<Self> {
        match dir {
            Some(d) => Self::with_override_dir(d),
            None => Ok(Self::builtin()),
        }
    }

    /// Resolve `name` and apply `substitutions` (token without brackets → value).
    pub fn resolve(&self, name: &str, substitutions: &HashMap<&str, &str>) -> PromptResult<String> {
        let mut content = self.load(name)?;

        // Sorted so the result does not depend on map iteration order.
        let mut tokens: Vec<_> = substitutions.iter().collect();
        tokens.sort_by(|a, b| a.0.cmp(b.0));
        for (token, value) in tokens {
            content = content.replace(&format!("[{}]", token), value);
        }

        Ok(content)
    }

    /// Resolve without substitutions.
    pub fn get(&self, name: &str) -> PromptResult<String> {
        self.resolve(name, &HashMap::new())
    }

    fn load(&self, name: &str) -> PromptResult<String> {
        if let Some(content) = self.overrides.get(name) {
            return Ok(content.clone());
        }

        builtin_template(name)
            .map(str::to_string)
            .ok_or_else(|| PromptError::TemplateNotFound {
                name: name.to_string(),
            })
    }
}
