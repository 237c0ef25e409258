//! Action-plan parser for the planning model's free-text answer.
//!
//! The tool order is extracted by a cascade of named strategies, tried in
//! order until one yields a non-empty list:
//! - **Marker**: trailing `TOOL_ORDER: Cube, Move, ...` line (authoritative)
//! - **Use-tool lines**: numbered lines of the form `3. Use the Fillet tool ...`
//! - **Taxonomy scan**: first taxonomy name mentioned on each numbered line
//! - **Default**: a fixed starter sequence
//!
//! Steps are extracted independently of which tier fired. Parsing never fails.

use serde::Serialize;

use super::taxonomy::Taxonomy;
use super::types::ParsedStep;

/// Marker introducing the comma-separated tool order.
pub const TOOL_ORDER_MARKER: &str = "TOOL_ORDER:";

/// Tool order used when no strategy matches.
pub const DEFAULT_TOOL_ORDER: [&str; 6] = ["Cube", "Sphere", "Cylinder", "Scale", "Move", "Rotate"];

// ─── Public Types ───────────────────────────────────────────────────────────

/// Which cascade tier produced the tool order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionTier {
    Marker,
    UseToolLines,
    TaxonomyScan,
    Default,
}

/// Parser output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedPlan {
    pub tool_order: Vec<String>,
    pub steps: Vec<ParsedStep>,
    pub tier: ExtractionTier,
}

type Strategy = fn(&str, &Taxonomy) -> Option<Vec<String>>;

const STRATEGIES: [(ExtractionTier, Strategy); 3] = [
    (ExtractionTier::Marker, tool_order_from_marker as Strategy),
    (ExtractionTier::UseToolLines, tool_order_from_use_lines as Strategy),
    (ExtractionTier::TaxonomyScan, tool_order_from_taxonomy_scan as Strategy),
];

// ─── Entry Points ───────────────────────────────────────────────────────────

/// Parse a model answer into a tool order and numbered steps.
pub fn parse(text: &str, taxonomy: &Taxonomy) -> ParsedPlan {
    let (tool_order, tier) = extract_tool_order(text, taxonomy);
    let steps = extract_steps(text);
    ParsedPlan {
        tool_order,
        steps,
        tier,
    }
}

/// Run the tool-order cascade. The first strategy with a non-empty result wins.
pub fn extract_tool_order(text: &str, taxonomy: &Taxonomy) -> (Vec<String>, ExtractionTier) {
    for (tier, strategy) in STRATEGIES {
        match strategy(text, taxonomy) {
            Some(order) if !order.is_empty() => {
                tracing::info!(tier = ?tier, tools = order.len(), "extracted tool order");
                return (order, tier);
            }
            Some(_) => tracing::debug!(tier = ?tier, "strategy matched but produced no tools"),
            None => tracing::debug!(tier = ?tier, "strategy did not match"),
        }
    }

    tracing::warn!(
        chars = text.len(),
        "tool order extraction failed, using default tool order"
    );
    (default_tool_order(), ExtractionTier::Default)
}

pub fn default_tool_order() -> Vec<String> {
    DEFAULT_TOOL_ORDER.iter().map(|s| s.to_string()).collect()
}

/// Render a tool order as the `TOOL_ORDER:` line the parser reads back.
pub fn render_tool_order_line(order: &[String]) -> String {
    format!("{TOOL_ORDER_MARKER} {}", order.join(", "))
}

// ─── Strategies ─────────────────────────────────────────────────────────────

/// Tier 1: the `TOOL_ORDER:` marker list, used verbatim (no taxonomy check).
fn tool_order_from_marker(text: &str, _taxonomy: &Taxonomy) -> Option<Vec<String>> {
    marker_list(text, TOOL_ORDER_MARKER)
}

/// Tier 2: `<N>. Use the <Word> tool` anywhere in the text, in order of appearance.
fn tool_order_from_use_lines(text: &str, _taxonomy: &Taxonomy) -> Option<Vec<String>> {
    let tools: Vec<String> = step_boundaries(text)
        .into_iter()
        .filter_map(|start| strip_number_prefix(&text[start..]))
        .filter_map(|rest| match_use_tool(rest.trim_start()))
        .map(|(word, _)| word.to_string())
        .collect();

    (!tools.is_empty()).then_some(tools)
}

/// Tier 3: for each numbered line, the first taxonomy name it mentions.
fn tool_order_from_taxonomy_scan(text: &str, taxonomy: &Taxonomy) -> Option<Vec<String>> {
    let tools: Vec<String> = text
        .lines()
        .filter(|line| strip_number_prefix(line).is_some())
        .filter_map(|line| taxonomy.names().find(|name| line.contains(*name)))
        .map(str::to_string)
        .collect();

    (!tools.is_empty()).then_some(tools)
}

// ─── Marker Lists ───────────────────────────────────────────────────────────

/// Read the comma-separated list after the last occurrence of `marker`, up to
/// the end of that line.
///
/// Returns `None` when the marker is absent and `Some(vec![])` when it is
/// present but lists nothing.
pub(crate) fn marker_list(text: &str, marker: &str) -> Option<Vec<String>> {
    let start = text.rfind(marker)? + marker.len();
    let rest = &text[start..];
    let line = rest.find(['\r', '\n']).map_or(rest, |end| &rest[..end]);

    Some(
        line.split(',')
            .map(clean_list_entry)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

/// Trim whitespace and markdown emphasis around a list entry.
fn clean_list_entry(entry: &str) -> &str {
    entry.trim_matches(|c: char| c.is_whitespace() || c == '*' || c == '`')
}

// ─── Steps ──────────────────────────────────────────────────────────────────

/// Split the plan into numbered steps.
///
/// Everything from the `TOOL_ORDER:` marker onward is ignored. A step starts
/// at each `N.` followed by whitespace that opens the text or follows
/// whitespace, so several steps may share one line. Whitespace runs inside a
/// step collapse to one space and text before the first step is dropped.
/// Without any numbered step, every non-blank line becomes a step.
pub fn extract_steps(text: &str) -> Vec<ParsedStep> {
    let body = text
        .find(TOOL_ORDER_MARKER)
        .map_or(text, |idx| &text[..idx])
        .trim_end_matches(|c: char| c == '*' || c.is_whitespace());

    let starts = step_boundaries(body);
    let raw_steps: Vec<String> = if starts.is_empty() {
        body.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        starts
            .iter()
            .enumerate()
            .map(|(i, &start)| {
                let end = starts.get(i + 1).copied().unwrap_or(body.len());
                body[start..end].split_whitespace().collect::<Vec<_>>().join(" ")
            })
            .collect()
    };

    raw_steps
        .into_iter()
        .enumerate()
        .map(|(i, raw_text)| ParsedStep {
            index: i + 1,
            normalized_description: normalize_step(&raw_text),
            raw_text,
        })
        .collect()
}

/// Strip the `N. ` prefix and a leading `Use the <tool> tool to `, then
/// capitalize the first letter.
pub fn normalize_step(raw: &str) -> String {
    let mut text = raw.trim();
    if let Some(rest) = strip_number_prefix(text) {
        text = rest.trim_start();
    }
    if let Some(rest) = strip_use_tool_phrase(text) {
        text = rest;
    }
    capitalize_first(text.trim())
}

/// Byte offsets of every step number in `text`.
///
/// A step number is `<digits>.` at the start of the text or right after
/// whitespace, with whitespace or the end of the text after the dot. `1.5mm`
/// and `v2.` are not step numbers.
fn step_boundaries(text: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut after_space = true;
    for (i, c) in text.char_indices() {
        if after_space && c.is_ascii_digit() && is_step_start(&text[i..]) {
            starts.push(i);
        }
        after_space = c.is_whitespace();
    }
    starts
}

fn is_step_start(s: &str) -> bool {
    strip_number_prefix(s).is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
}

// ─── Lexing Helpers ─────────────────────────────────────────────────────────

/// If `line` starts (after indentation) with `<digits>.`, return what follows the dot.
fn strip_number_prefix(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let digits = trimmed.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    trimmed[digits..].strip_prefix('.')
}

/// Match `Use the <Word> tool` (case-insensitive) at the start of `s`.
///
/// Returns the tool word and the text after `tool`.
fn match_use_tool(s: &str) -> Option<(&str, &str)> {
    let rest = strip_word_ci(s, "use")?;
    let rest = skip_whitespace1(rest)?;
    let rest = strip_word_ci(rest, "the")?;
    let rest = skip_whitespace1(rest)?;

    let word_len: usize = rest
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .map(char::len_utf8)
        .sum();
    if word_len == 0 {
        return None;
    }
    let (word, rest) = rest.split_at(word_len);

    let rest = skip_whitespace1(rest)?;
    let rest = strip_word_ci(rest, "tool")?;
    Some((word, rest))
}

/// Strip a leading `Use the <Word> tool to ` phrase.
fn strip_use_tool_phrase(s: &str) -> Option<&str> {
    let (_, rest) = match_use_tool(s)?;
    let rest = skip_whitespace1(rest)?;
    let rest = strip_word_ci(rest, "to")?;
    skip_whitespace1(rest)
}

/// Case-insensitive ASCII prefix strip.
fn strip_word_ci<'a>(s: &'a str, word: &str) -> Option<&'a str> {
    let head = s.get(..word.len())?;
    head.eq_ignore_ascii_case(word).then(|| &s[word.len()..])
}

/// Skip one or more whitespace characters; `None` if there are none.
fn skip_whitespace1(s: &str) -> Option<&str> {
    let trimmed = s.trim_start();
    (trimmed.len() < s.len()).then_some(trimmed)
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
