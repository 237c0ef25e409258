//! Task model assembly: the end-to-end planning pipeline.
//!
//! prompt → model call → parse → reconcile → `TaskModel`. Every failure is
//! caught here and the missing part is replaced by a deterministic default. The returned [`PlanOutcome`] records whether a fallback
//! was taken.

use std::collections::HashSet;

use super::plan_parser::{self, render_tool_order_line, ExtractionTier};
use super::reconciler::reconcile;
use super::secondary::select_secondary;
use super::taxonomy::Taxonomy;
use super::types::{
    DegradeReason, GuidanceLevel, ParsedStep, PlanOutcome, SmartToolbox, TaskModel, UserContext,
};
use crate::inference::{CallOptions, ModelCall, PlannerConfig, UnknownToolPolicy};

/// Steps of the plan returned when planning fails.
pub const DEFAULT_STEPS: [&str; 2] = ["Start with basic shapes", "Transform as needed"];

// ─── Pipeline ───────────────────────────────────────────────────────────────

/// Plan the task for one user request. Never fails.
pub async fn build_task_model<M: ModelCall + ?Sized>(
    context: &UserContext,
    taxonomy: &Taxonomy,
    model: &M,
    config: &PlannerConfig,
) -> PlanOutcome {
    let prompt = build_plan_prompt(context, taxonomy);

    tracing::info!(
        object = context.object_to_make(),
        guidance = %context.guidance_level(),
        taxonomy_size = taxonomy.len(),
        "planning task"
    );

    let text = match model.call(&prompt, CallOptions::default()).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "plan model call failed, using default task model");
            return PlanOutcome::Degraded {
                model: default_task_model(context, taxonomy),
                reason: DegradeReason::ModelCallFailed {
                    message: e.to_string(),
                },
            };
        }
    };

    let parsed = plan_parser::parse(&text, taxonomy);
    let mut reason = None;
    let steps = if parsed.steps.is_empty() {
        tracing::warn!("plan answer contained no steps, using default steps");
        reason = Some(DegradeReason::NoSteps);
        default_steps()
    } else {
        parsed.steps
    };

    let mut tier = parsed.tier;
    let mut reconciled = reconcile(&parsed.tool_order, taxonomy, config.unknown_tools);
    if reconciled.tool_order.is_empty() {
        tracing::warn!("no tool survived reconciliation, using default tool order");
        reconciled = reconcile(
            &plan_parser::default_tool_order(),
            taxonomy,
            UnknownToolPolicy::PassThrough,
        );
        tier = ExtractionTier::Default;
    }
    if reason.is_none() && tier == ExtractionTier::Default {
        reason = Some(DegradeReason::DefaultToolOrder);
    }

    let task = TaskModel::new(
        text,
        reconciled.tool_order,
        reconciled.priority,
        reconciled.unknown,
        steps,
        context.clone(),
    );

    tracing::info!(
        request_id = %task.request_id(),
        tier = ?tier,
        tools = task.tool_order().len(),
        steps = task.steps().len(),
        "task model ready"
    );

    match reason {
        Some(reason) => PlanOutcome::Degraded {
            model: task,
            reason,
        },
        None => PlanOutcome::Planned(task),
    }
}

/// Plan the task, then pick secondary tools, and apply the toolbox caps.
///
/// The two model calls run one after the other.
pub async fn plan_toolbox<M: ModelCall + ?Sized>(
    context: &UserContext,
    taxonomy: &Taxonomy,
    model: &M,
    config: &PlannerConfig,
) -> SmartToolbox {
    let outcome = build_task_model(context, taxonomy, model, config).await;
    let task = outcome.task_model();

    let primary_tools = task.primary_tools(config.max_primary_tools);
    let used: HashSet<String> = task.tool_order().iter().cloned().collect();

    let mut secondary = select_secondary(
        &used,
        context.object_to_make(),
        taxonomy,
        model,
        CallOptions::new(config.secondary_max_tokens, config.secondary_temperature),
    )
    .await;
    secondary.tools.truncate(config.max_secondary_tools);

    tracing::info!(
        degraded = outcome.is_degraded(),
        primary = primary_tools.len(),
        secondary = secondary.tools.len(),
        secondary_source = ?secondary.source,
        "toolbox planned"
    );

    SmartToolbox {
        task: outcome,
        primary_tools,
        secondary_tools: secondary.tools,
    }
}

// ─── Defaults ───────────────────────────────────────────────────────────────

/// The plan text behind the default task model.
pub fn default_plan_text() -> String {
    let mut text: String = DEFAULT_STEPS
        .iter()
        .enumerate()
        .map(|(i, step)| format!("{}. {step}\n", i + 1))
        .collect();
    text.push_str(&render_tool_order_line(&plan_parser::default_tool_order()));
    text
}

fn default_steps() -> Vec<ParsedStep> {
    plan_parser::extract_steps(&default_plan_text())
}

/// Deterministic task model used when the model call fails.
fn default_task_model(context: &UserContext, taxonomy: &Taxonomy) -> TaskModel {
    let text = default_plan_text();
    let parsed = plan_parser::parse(&text, taxonomy);
    // The default order is kept whole even when a custom taxonomy lacks it.
    let reconciled = reconcile(&parsed.tool_order, taxonomy, UnknownToolPolicy::PassThrough);
    TaskModel::new(
        text,
        reconciled.tool_order,
        reconciled.priority,
        reconciled.unknown,
        parsed.steps,
        context.clone(),
    )
}

// ─── Prompt ─────────────────────────────────────────────────────────────────

/// Build the planning prompt.
pub fn build_plan_prompt(context: &UserContext, taxonomy: &Taxonomy) -> String {
    let guidance = match context.guidance_level() {
        GuidanceLevel::Guided => "The user is a beginner: keep each step small and concrete.",
        GuidanceLevel::ChooseApproach => "Follow the approach the user chose.",
        GuidanceLevel::CustomApproach => "Follow the user's own approach as closely as the tools allow.",
    };

    format!(
        "You are an expert CAD instructor helping a user build an object in a web-based 3D modeling application.\n\n\
         Object to make: {object}\n\
         User approach: {approach}\n\
         {guidance}\n\n\
         Available tools (JSON):\n{tools}\n\n\
         Write a numbered action plan of 3 to 8 steps. Put each step on its own line in the form:\n\
         1. Use the <ToolName> tool to <action>.\n\
         Use exact tool names from the list above.\n\
         After the last step, end with one line listing the tools in the order they are used:\n\
         TOOL_ORDER: ToolName1, ToolName2, ToolName3",
        object = context.object_to_make(),
        approach = context.user_approach(),
        tools = taxonomy.to_prompt_json(),
    )
}

// ─── Tests ──────────────────────────────────────────────────────────────────
