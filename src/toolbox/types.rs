//! Shared types for the planning pipeline.
//!
//! Everything here is created once per request and read-only afterwards.
//! Serialized field names are camelCase because the toolbar UI consumes them
//! as JSON.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::ToolboxError;
use super::reconciler::PriorityMap;

/// Longest accepted object description, in characters.
pub const MAX_OBJECT_CHARS: usize = 500;

// ─── User Context ───────────────────────────────────────────────────────────

/// How much the user wants to be guided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuidanceLevel {
    /// Walk the user through the simplest approach.
    #[default]
    Guided,
    /// The user picked one of the suggested approaches.
    ChooseApproach,
    /// The user described their own approach.
    CustomApproach,
}

impl GuidanceLevel {
    /// Approach text used when the user supplied none.
    pub fn default_approach(self) -> &'static str {
        match self {
            GuidanceLevel::Guided => "Guide me step by step using the simplest approach.",
            GuidanceLevel::ChooseApproach => "Use the most common modeling approach.",
            GuidanceLevel::CustomApproach => "Use whatever approach fits the object best.",
        }
    }
}

impl FromStr for GuidanceLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "guided" => Ok(GuidanceLevel::Guided),
            "choose" | "choose_approach" => Ok(GuidanceLevel::ChooseApproach),
            "custom" | "custom_approach" => Ok(GuidanceLevel::CustomApproach),
            other => Err(format!(
                "unknown guidance level '{other}' (expected guided, choose or custom)"
            )),
        }
    }
}

impl fmt::Display for GuidanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GuidanceLevel::Guided => "guided",
            GuidanceLevel::ChooseApproach => "choose_approach",
            GuidanceLevel::CustomApproach => "custom_approach",
        };
        f.write_str(s)
    }
}

/// What the user wants to make and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    object_to_make: String,
    user_approach: String,
    guidance_level: GuidanceLevel,
}

impl UserContext {
    /// Sanitize raw user input into a planning context.
    ///
    /// Rejects an object description that is empty after sanitization.
    pub fn new(
        object_to_make: &str,
        guidance_level: GuidanceLevel,
        user_approach: Option<&str>,
    ) -> Result<Self, ToolboxError> {
        let object_to_make = sanitize_input(object_to_make, MAX_OBJECT_CHARS);
        if object_to_make.is_empty() {
            return Err(ToolboxError::EmptyObject);
        }

        let user_approach = user_approach
            .map(|a| sanitize_input(a, MAX_OBJECT_CHARS))
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| guidance_level.default_approach().to_string());

        Ok(Self {
            object_to_make,
            user_approach,
            guidance_level,
        })
    }

    pub fn object_to_make(&self) -> &str {
        &self.object_to_make
    }

    pub fn user_approach(&self) -> &str {
        &self.user_approach
    }

    pub fn guidance_level(&self) -> GuidanceLevel {
        self.guidance_level
    }
}

/// Strip markup and control characters, collapse whitespace, cap length.
pub(crate) fn sanitize_input(raw: &str, max_chars: usize) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != '<' && *c != '>')
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();

    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(max_chars)
        .collect::<String>()
        .trim_end()
        .to_string()
}

// ─── Parsed Plan ────────────────────────────────────────────────────────────

/// One numbered step of the action plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedStep {
    /// 1-based position in the plan.
    pub index: usize,
    /// Step text as the model wrote it, including the "N. " prefix.
    pub raw_text: String,
    /// Step text with numbering and tool mention removed, first letter capitalized.
    pub normalized_description: String,
}

// ─── Task Model ─────────────────────────────────────────────────────────────

/// The planning result handed to the toolbar UI.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskModel {
    request_id: Uuid,
    created_at: DateTime<Utc>,
    action_plan: String,
    tool_order: Vec<String>,
    priority: PriorityMap,
    unknown_tools: Vec<String>,
    steps: Vec<ParsedStep>,
    user_context: UserContext,
}

impl TaskModel {
    pub(crate) fn new(
        action_plan: String,
        tool_order: Vec<String>,
        priority: PriorityMap,
        unknown_tools: Vec<String>,
        steps: Vec<ParsedStep>,
        user_context: UserContext,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            created_at: Utc::now(),
            action_plan,
            tool_order,
            priority,
            unknown_tools,
            steps,
            user_context,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The raw model answer (or the rendered default plan).
    pub fn action_plan(&self) -> &str {
        &self.action_plan
    }

    /// Full, untruncated tool order.
    pub fn tool_order(&self) -> &[String] {
        &self.tool_order
    }

    pub fn priority(&self) -> &PriorityMap {
        &self.priority
    }

    /// Unique tools in rank order, at most `max`.
    pub fn primary_tools(&self, max: usize) -> Vec<String> {
        self.priority.top(max)
    }

    /// Tool-order entries that are not in the taxonomy.
    pub fn unknown_tools(&self) -> &[String] {
        &self.unknown_tools
    }

    pub fn steps(&self) -> &[ParsedStep] {
        &self.steps
    }

    pub fn user_context(&self) -> &UserContext {
        &self.user_context
    }
}

// ─── Outcomes ───────────────────────────────────────────────────────────────

/// Why a planning request fell back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DegradeReason {
    /// The model call failed; the whole task model is the default.
    ModelCallFailed { message: String },
    /// The answer had steps but no extractable tool order.
    DefaultToolOrder,
    /// The answer contained no usable steps; the default steps were used.
    NoSteps,
}

impl fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradeReason::ModelCallFailed { message } => write!(f, "model call failed: {message}"),
            DegradeReason::DefaultToolOrder => f.write_str("no tool order found, using default"),
            DegradeReason::NoSteps => f.write_str("no steps found, using default steps"),
        }
    }
}

/// A task model tagged with how it was produced.
///
/// Both variants carry a usable model; callers that do not care use
/// [`PlanOutcome::into_task_model`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlanOutcome {
    Planned(TaskModel),
    Degraded {
        model: TaskModel,
        reason: DegradeReason,
    },
}

impl PlanOutcome {
    pub fn task_model(&self) -> &TaskModel {
        match self {
            PlanOutcome::Planned(model) | PlanOutcome::Degraded { model, .. } => model,
        }
    }

    pub fn into_task_model(self) -> TaskModel {
        match self {
            PlanOutcome::Planned(model) | PlanOutcome::Degraded { model, .. } => model,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, PlanOutcome::Degraded { .. })
    }

    pub fn degrade_reason(&self) -> Option<&DegradeReason> {
        match self {
            PlanOutcome::Planned(_) => None,
            PlanOutcome::Degraded { reason, .. } => Some(reason),
        }
    }
}

/// Everything the toolbar needs to rebuild itself.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartToolbox {
    pub task: PlanOutcome,
    /// Unique tools in priority order, capped at `max_primary_tools`.
    pub primary_tools: Vec<String>,
    /// Supplementary tools, capped at `max_secondary_tools`.
    pub secondary_tools: Vec<String>,
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_markup_and_collapses_whitespace() {
        let cleaned = sanitize_input("  a <b>bird</b>house\n\twith\u{0007} roof  ", 500);
        assert_eq!(cleaned, "a bbird/bhouse with roof");
    }

    #[test]
    fn sanitize_truncates_on_char_boundary() {
        let long = "é".repeat(600);
        let cleaned = sanitize_input(&long, MAX_OBJECT_CHARS);
        assert_eq!(cleaned.chars().count(), MAX_OBJECT_CHARS);
    }

    #[test]
    fn user_context_rejects_empty_object() {
        let result = UserContext::new("  <>  ", GuidanceLevel::Guided, None);
        assert!(matches!(result, Err(ToolboxError::EmptyObject)));
    }

    #[test]
    fn user_context_defaults_approach_from_level() {
        let ctx = UserContext::new("a chess pawn", GuidanceLevel::Guided, None).unwrap();
        assert_eq!(ctx.user_approach(), GuidanceLevel::Guided.default_approach());

        let ctx = UserContext::new("a chess pawn", GuidanceLevel::CustomApproach, Some("   ")).unwrap();
        assert_eq!(ctx.user_approach(), GuidanceLevel::CustomApproach.default_approach());
    }

    #[test]
    fn user_context_keeps_custom_approach() {
        let ctx = UserContext::new(
            "a mug",
            GuidanceLevel::CustomApproach,
            Some("revolve a sketched profile"),
        )
        .unwrap();
        assert_eq!(ctx.object_to_make(), "a mug");
        assert_eq!(ctx.user_approach(), "revolve a sketched profile");
        assert_eq!(ctx.guidance_level(), GuidanceLevel::CustomApproach);
    }

    #[test]
    fn guidance_level_parses_aliases() {
        assert_eq!("guided".parse::<GuidanceLevel>(), Ok(GuidanceLevel::Guided));
        assert_eq!("Choose".parse::<GuidanceLevel>(), Ok(GuidanceLevel::ChooseApproach));
        assert_eq!(
            "custom-approach".parse::<GuidanceLevel>(),
            Ok(GuidanceLevel::CustomApproach)
        );
        assert!("expert".parse::<GuidanceLevel>().is_err());
    }

    #[test]
    fn user_context_serializes_camel_case() {
        let ctx = UserContext::new("a vase", GuidanceLevel::ChooseApproach, None).unwrap();
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["objectToMake"], "a vase");
        assert_eq!(json["guidanceLevel"], "CHOOSE_APPROACH");
    }
}
