//! Secondary-tool selection.
//!
//! After the primary plan is known, a second model call asks for
//! supplementary taxonomy tools the user may want within reach. The answer is
//! parsed with the same marker-then-scan-then-default discipline as the
//! primary plan, and the result never repeats a primary tool.

use std::collections::HashSet;

use serde::Serialize;

use super::plan_parser::marker_list;
use super::taxonomy::Taxonomy;
use crate::inference::{CallOptions, ModelCall};

/// Marker introducing the comma-separated secondary tools.
pub const SECONDARY_TOOLS_MARKER: &str = "SECONDARY_TOOLS:";

/// Secondary tools used when nothing else works.
pub const DEFAULT_SECONDARY_TOOLS: [&str; 4] = ["Fillet", "Chamfer", "Boolean", "Group"];

/// Where the secondary tools came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondarySource {
    Marker,
    TaxonomyScan,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecondarySelection {
    /// Insertion order from the answer; not ranked.
    pub tools: Vec<String>,
    pub source: SecondarySource,
}

impl SecondarySelection {
    fn default_set() -> Self {
        Self {
            tools: DEFAULT_SECONDARY_TOOLS.iter().map(|s| s.to_string()).collect(),
            source: SecondarySource::Default,
        }
    }
}

/// Ask the model for supplementary tools.
///
/// Never fails: a failed model call yields the default set.
pub async fn select_secondary<M: ModelCall + ?Sized>(
    primary: &HashSet<String>,
    object_to_make: &str,
    taxonomy: &Taxonomy,
    model: &M,
    options: CallOptions,
) -> SecondarySelection {
    let prompt = build_secondary_prompt(primary, object_to_make, taxonomy);

    match model.call(&prompt, options).await {
        Ok(text) => parse_secondary(&text, primary, taxonomy),
        Err(e) => {
            tracing::warn!(error = %e, "secondary tool call failed, using default set");
            SecondarySelection::default_set()
        }
    }
}

/// Extract secondary tools from a model answer.
pub fn parse_secondary(
    text: &str,
    primary: &HashSet<String>,
    taxonomy: &Taxonomy,
) -> SecondarySelection {
    if let Some(listed) = marker_list(text, SECONDARY_TOOLS_MARKER) {
        let mut seen = HashSet::new();
        let tools: Vec<String> = listed
            .into_iter()
            .filter(|tool| !primary.contains(tool))
            .filter(|tool| seen.insert(tool.clone()))
            .collect();
        if !tools.is_empty() {
            tracing::info!(tools = tools.len(), "extracted secondary tools from marker");
            return SecondarySelection {
                tools,
                source: SecondarySource::Marker,
            };
        }
        tracing::debug!("secondary marker listed only primary tools");
    }

    let scanned: Vec<String> = taxonomy
        .names()
        .filter(|name| !primary.contains(*name) && text.contains(*name))
        .map(str::to_string)
        .collect();
    if !scanned.is_empty() {
        tracing::info!(tools = scanned.len(), "extracted secondary tools by taxonomy scan");
        return SecondarySelection {
            tools: scanned,
            source: SecondarySource::TaxonomyScan,
        };
    }

    tracing::warn!("no secondary tools found, using default set");
    SecondarySelection::default_set()
}

fn build_secondary_prompt(primary: &HashSet<String>, object_to_make: &str, taxonomy: &Taxonomy) -> String {
    let available = taxonomy.names().collect::<Vec<_>>().join(", ");
    // HashSet order is arbitrary; keep the prompt stable across runs.
    let mut already: Vec<&str> = primary.iter().map(String::as_str).collect();
    already.sort_unstable();

    format!(
        "The user is modeling: {object_to_make}\n\
         Their plan already uses these tools: {already}\n\
         Available tools: {available}\n\n\
         Pick the other available tools that would be useful for refining or finishing this object. \
         Only use names from the available tools list and do not repeat tools the plan already uses.\n\
         Answer with a single line in exactly this format:\n\
         {SECONDARY_TOOLS_MARKER} tool1, tool2, tool3",
        already = already.join(", "),
    )
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolbox::testing::ScriptedModel;

    fn primary(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn marker_excludes_primary_tools() {
        let result = parse_secondary(
            "SECONDARY_TOOLS: Fillet, Chamfer, Cube",
            &primary(&["Cube", "Move"]),
            &Taxonomy::builtin(),
        );
        assert_eq!(result.source, SecondarySource::Marker);
        assert_eq!(result.tools, strings(&["Fillet", "Chamfer"]));
    }

    #[test]
    fn marker_collapses_duplicates() {
        let result = parse_secondary(
            "Sure.\nSECONDARY_TOOLS: Mirror, Align, Mirror\n",
            &primary(&["Cube"]),
            &Taxonomy::builtin(),
        );
        assert_eq!(result.tools, strings(&["Mirror", "Align"]));
    }

    #[test]
    fn missing_marker_scans_taxonomy_in_catalog_order() {
        let result = parse_secondary(
            "You might also like Group, Mirror and of course Cube.",
            &primary(&["Cube"]),
            &Taxonomy::builtin(),
        );
        assert_eq!(result.source, SecondarySource::TaxonomyScan);
        // Catalog order: Mirror comes before Group.
        assert_eq!(result.tools, strings(&["Mirror", "Group"]));
    }

    #[test]
    fn marker_with_only_primary_tools_falls_through_to_scan() {
        let result = parse_secondary(
            "Consider Shell too.\nSECONDARY_TOOLS: Cube, Move",
            &primary(&["Cube", "Move"]),
            &Taxonomy::builtin(),
        );
        assert_eq!(result.source, SecondarySource::TaxonomyScan);
        assert_eq!(result.tools, strings(&["Shell"]));
    }

    #[test]
    fn nothing_recognizable_uses_default() {
        let result = parse_secondary("no idea", &primary(&[]), &Taxonomy::builtin());
        assert_eq!(result.source, SecondarySource::Default);
        assert_eq!(result.tools, strings(&["Fillet", "Chamfer", "Boolean", "Group"]));
    }

    #[test]
    fn non_default_results_never_contain_primary_tools() {
        let taxonomy = Taxonomy::builtin();
        let used = primary(&["Cube", "Fillet", "Move"]);
        let answers = [
            "SECONDARY_TOOLS: Fillet, Cube, Chamfer, Move",
            "Cube Fillet Move Chamfer Group",
            "SECONDARY_TOOLS: Cube\nAlso Boolean",
        ];
        for answer in answers {
            let result = parse_secondary(answer, &used, &taxonomy);
            assert_ne!(result.source, SecondarySource::Default);
            assert!(
                result.tools.iter().all(|t| !used.contains(t)),
                "{answer:?} produced {:?}",
                result.tools
            );
        }
    }

    #[tokio::test]
    async fn model_failure_maps_to_default() {
        let model = ScriptedModel::failing();
        let result = select_secondary(
            &primary(&["Cube"]),
            "a birdhouse",
            &Taxonomy::builtin(),
            &model,
            CallOptions::new(200, 0.5),
        )
        .await;
        assert_eq!(result.source, SecondarySource::Default);
        assert_eq!(result.tools.len(), 4);
    }

    #[tokio::test]
    async fn prompt_lists_taxonomy_and_primary_tools() {
        let model = ScriptedModel::answering(&["SECONDARY_TOOLS: Shell"]);
        let result = select_secondary(
            &primary(&["Move", "Cube"]),
            "a birdhouse",
            &Taxonomy::builtin(),
            &model,
            CallOptions::new(200, 0.5),
        )
        .await;
        assert_eq!(result.tools, strings(&["Shell"]));

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        let (prompt, options) = &prompts[0];
        assert!(prompt.contains("a birdhouse"));
        assert!(prompt.contains("already uses these tools: Cube, Move"));
        assert!(prompt.contains("Torus"));
        assert!(prompt.contains(SECONDARY_TOOLS_MARKER));
        assert_eq!(options.max_tokens, Some(200));
    }
}
