//! ABOUTME: The tagged `Step` variant and its per-tool payloads
//! ABOUTME: Discriminated on `tool`; avoids class-based inheritance per spec.md §9

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::variables::Variables;

/// One step in a recipe, tagged by its `tool` discriminant.
///
/// The common header (name, description, `when`, `dependsOn`, retries,
/// timeout, exports, ...) lives on `Step` itself; the tool-specific
/// payload lives in `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub when: Option<String>,
    #[serde(default, rename = "dependsOn")]
    pub depends_on: Vec<String>,
    /// Advisory only (spec.md §9(c)); real concurrency is expressed via
    /// the `Parallel` tool.
    #[serde(default)]
    pub parallel: bool,
    #[serde(default, rename = "continueOnError")]
    pub continue_on_error: bool,
    #[serde(default, rename = "timeout")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    #[serde(default)]
    pub environment: HashMap<String, String>,
    #[serde(default)]
    pub exports: HashMap<String, String>,
    #[serde(flatten)]
    pub kind: StepKind,
}

impl Step {
    pub fn step_variables(&self) -> Variables {
        self.variables.clone().into_iter().collect::<HashMap<_, _>>().into()
    }

    /// The tool discriminant name, used for registry lookup and error
    /// reporting.
    pub fn tool_name(&self) -> &'static str {
        self.kind.tool_name()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "camelCase")]
pub enum StepKind {
    Template(TemplateStep),
    Action(ActionStep),
    #[serde(rename = "codemod")]
    CodeMod(CodeModStep),
    Recipe(RecipeStepPayload),
    Shell(ShellStep),
    Prompt(PromptStep),
    Install(InstallStep),
    Query(QueryStep),
    Patch(PatchStep),
    #[serde(rename = "ensureDirs")]
    EnsureDirs(EnsureDirsStep),
    Sequence(SequenceStep),
    Parallel(ParallelStep),
    #[serde(rename = "ai")]
    Ai(AiStep),
}

impl StepKind {
    pub fn tool_name(&self) -> &'static str {
        match self {
            Self::Template(_) => "template",
            Self::Action(_) => "action",
            Self::CodeMod(_) => "codemod",
            Self::Recipe(_) => "recipe",
            Self::Shell(_) => "shell",
            Self::Prompt(_) => "prompt",
            Self::Install(_) => "install",
            Self::Query(_) => "query",
            Self::Patch(_) => "patch",
            Self::EnsureDirs(_) => "ensureDirs",
            Self::Sequence(_) => "sequence",
            Self::Parallel(_) => "parallel",
            Self::Ai(_) => "ai",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateStep {
    pub template: String,
    #[serde(default, rename = "outputDir")]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub overwrite: Option<bool>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionStep {
    pub action: String,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    #[serde(default, rename = "dryRun")]
    pub dry_run: Option<bool>,
    #[serde(default)]
    pub force: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeModStep {
    pub codemod: String,
    pub files: Vec<String>,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeStepPayload {
    pub recipe: String,
    #[serde(default, rename = "inheritVariables")]
    pub inherit_variables: bool,
    #[serde(default, rename = "variableOverrides")]
    pub variable_overrides: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellStep {
    pub command: String,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptStep {
    #[serde(default)]
    pub message: Option<String>,
    pub variable: String,
    #[serde(rename = "promptType")]
    pub prompt_type: String,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub validate: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallStep {
    pub packages: Vec<String>,
    #[serde(default)]
    pub dev: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, rename = "packageManager")]
    pub package_manager: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryStep {
    pub file: String,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub checks: Vec<String>,
    #[serde(default)]
    pub expression: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchStep {
    pub file: String,
    #[serde(default)]
    pub format: Option<String>,
    pub merge: Value,
    #[serde(default = "default_true", rename = "createIfMissing")]
    pub create_if_missing: bool,
    #[serde(default)]
    pub indent: Option<usize>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsureDirsStep {
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceStep {
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelStep {
    pub steps: Vec<Step>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiStep {
    pub prompt: String,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    pub output: String,
    #[serde(default)]
    pub context: Vec<String>,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub guardrails: Option<AiGuardrails>,
    #[serde(default)]
    pub budget: Option<u64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default, rename = "maxTokens")]
    pub max_tokens: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AiGuardrails {
    #[serde(default, rename = "validateSyntax")]
    pub validate_syntax: bool,
    #[serde(default, rename = "requireKnownImports")]
    pub require_known_imports: bool,
    #[serde(default, rename = "allowedImports")]
    pub allowed_imports: Vec<String>,
    #[serde(default, rename = "maxTokens")]
    pub max_tokens: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_kind_tool_name_matches_discriminant() {
        let step = Step {
            name: "write".into(),
            description: None,
            when: None,
            depends_on: vec![],
            parallel: false,
            continue_on_error: false,
            timeout_ms: None,
            retries: 0,
            variables: HashMap::new(),
            environment: HashMap::new(),
            exports: HashMap::new(),
            kind: StepKind::Template(TemplateStep {
                template: "foo.jig".into(),
                output_dir: None,
                overwrite: None,
                exclude: vec![],
            }),
        };
        assert_eq!(step.tool_name(), "template");
    }
}
