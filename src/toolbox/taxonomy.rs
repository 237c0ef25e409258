//! Tool taxonomy, the static catalog generated plans are checked against.
//!
//! Loaded once at startup and never mutated afterwards, so a single
//! `Taxonomy` can be shared by any number of concurrent planning requests.
//! Iteration order is the catalog order; several fallback tiers depend on it.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::ToolboxError;

/// One entry in the taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique, case-sensitive identifier (matches the toolbar button label).
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

impl ToolDescriptor {
    pub fn new(name: &str, description: &str, categories: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Taxonomy file layout: either a bare list or `{ tools: [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum TaxonomyFile {
    List(Vec<ToolDescriptor>),
    Wrapped { tools: Vec<ToolDescriptor> },
}

/// Ordered, immutable tool catalog with O(1) name lookup.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    tools: Vec<ToolDescriptor>,
    index: HashSet<String>,
}

impl Taxonomy {
    /// Build a taxonomy, rejecting empty catalogs and duplicate names.
    pub fn new(mut tools: Vec<ToolDescriptor>) -> Result<Self, ToolboxError> {
        if tools.is_empty() {
            return Err(ToolboxError::EmptyTaxonomy);
        }

        let mut index = HashSet::with_capacity(tools.len());
        for (i, tool) in tools.iter_mut().enumerate() {
            tool.name = tool.name.trim().to_string();
            if tool.name.is_empty() {
                return Err(ToolboxError::EmptyToolName { position: i + 1 });
            }
            if !index.insert(tool.name.clone()) {
                return Err(ToolboxError::DuplicateTool {
                    name: tool.name.clone(),
                });
            }
        }

        Ok(Self { tools, index })
    }

    /// Convenience constructor from bare names (no descriptions).
    pub fn from_names(names: &[&str]) -> Result<Self, ToolboxError> {
        Self::new(
            names
                .iter()
                .map(|n| ToolDescriptor::new(n, "", &[]))
                .collect(),
        )
    }

    /// Load a taxonomy from a YAML or JSON file.
    pub fn load(path: &Path) -> Result<Self, ToolboxError> {
        let load_err = |reason: String| ToolboxError::TaxonomyLoad {
            path: path.display().to_string(),
            reason,
        };

        let raw = std::fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        // serde_yaml accepts JSON documents too.
        let file: TaxonomyFile =
            serde_yaml::from_str(&raw).map_err(|e| load_err(format!("invalid taxonomy: {e}")))?;
        let tools = match file {
            TaxonomyFile::List(tools) | TaxonomyFile::Wrapped { tools } => tools,
        };

        let taxonomy = Self::new(tools).map_err(|e| load_err(e.to_string()))?;
        tracing::info!(path = %path.display(), tools = taxonomy.len(), "loaded tool taxonomy");
        Ok(taxonomy)
    }

    /// Pick the catalog: `explicit` file first, then `configured`, then the
    /// built-in one.
    pub fn resolve(explicit: Option<&Path>, configured: Option<&Path>) -> Result<Self, ToolboxError> {
        match explicit.or(configured) {
            Some(path) => Self::load(path),
            None => Ok(Self::builtin()),
        }
    }

    /// The built-in catalog of the web CAD toolbar.
    pub fn builtin() -> Self {
        let tools = builtin_tools();
        let index = tools.iter().map(|t| t.name.clone()).collect();
        Self { tools, index }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains(name)
    }

    /// Tool names in catalog order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|t| t.name.as_str())
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Serialize the full catalog for embedding in a prompt.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(&self.tools).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "taxonomy serialization failed, sending names only");
            self.names().collect::<Vec<_>>().join(", ")
        })
    }
}

fn builtin_tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new("Cube", "Create a box primitive", &["shapes"]),
        ToolDescriptor::new("Sphere", "Create a sphere primitive", &["shapes"]),
        ToolDescriptor::new("Cylinder", "Create a cylinder primitive", &["shapes"]),
        ToolDescriptor::new("Cone", "Create a cone primitive", &["shapes"]),
        ToolDescriptor::new("Torus", "Create a ring-shaped primitive", &["shapes"]),
        ToolDescriptor::new("Sketch", "Draw a 2D profile on a plane", &["sketch"]),
        ToolDescriptor::new("Extrude", "Pull a 2D profile into a solid", &["modify"]),
        ToolDescriptor::new("Revolve", "Spin a 2D profile around an axis", &["modify"]),
        ToolDescriptor::new("Move", "Translate the selection", &["transform"]),
        ToolDescriptor::new("Rotate", "Rotate the selection around an axis", &["transform"]),
        ToolDescriptor::new("Scale", "Resize the selection", &["transform"]),
        ToolDescriptor::new("Mirror", "Reflect the selection across a plane", &["transform"]),
        ToolDescriptor::new("Align", "Line up selected objects", &["transform"]),
        ToolDescriptor::new("Duplicate", "Copy the selection in place", &["edit"]),
        ToolDescriptor::new("Fillet", "Round selected edges", &["modify"]),
        ToolDescriptor::new("Chamfer", "Bevel selected edges", &["modify"]),
        ToolDescriptor::new("Shell", "Hollow out a solid with a wall thickness", &["modify"]),
        ToolDescriptor::new("Boolean", "Union, subtract or intersect solids", &["combine"]),
        ToolDescriptor::new("Group", "Combine objects into one selectable group", &["combine"]),
        ToolDescriptor::new("Measure", "Measure distances and angles", &["inspect"]),
        ToolDescriptor::new("Text", "Add 3D text", &["shapes"]),
    ]
}

// ─── Tests ───────────────────────────────────────────────────────────────────
