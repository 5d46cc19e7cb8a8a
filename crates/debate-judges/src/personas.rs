//! Judge personas.
//!
//! The panel is static reference data. An odd number of judges keeps
//! split decisions rare; an even split is scored as a tie by the engine.

use std::path::Path;

use anyhow::{bail, Context, Result};
use debate_engine::{Judge, JudgePanel};
use serde::Deserialize;

/// The built-in three-judge panel.
pub fn default_panel() -> JudgePanel {
    JudgePanel::new(vec![
        Judge::new(
            "logician",
            "The Logician",
            "You care about the structure of arguments. Reward valid inferences, \
             penalise fallacies, contradictions and unsupported leaps.",
        ),
        Judge::new(
            "rhetorician",
            "The Rhetorician",
            "You care about persuasion. Reward clarity, framing and direct \
             engagement with the other side; penalise evasion and filler.",
        ),
        Judge::new(
            "skeptic",
            "The Skeptic",
            "You care about evidence. Reward concrete, checkable support and \
             honest concessions; penalise vague claims and appeals to authority.",
        ),
    ])
}

#[derive(Debug, Deserialize)]
struct PanelFile {
    judges: Vec<PersonaEntry>,
}

#[derive(Debug, Deserialize)]
struct PersonaEntry {
    id: String,
    name: String,
    persona: String,
}

/// Parse a panel from TOML:
///
/// ```toml
/// [[judges]]
/// id = "logician"
/// name = "The Logician"
/// persona = "You care about the structure of arguments."
/// ```
pub fn parse_panel(raw: &str) -> Result<JudgePanel> {
    let file: PanelFile = toml::from_str(raw).context("Failed to parse judge panel")?;
    if file.judges.is_empty() {
        bail!("judge panel is empty");
    }
    if let Some(entry) = file.judges.iter().find(|j| j.id.trim().is_empty()) {
        bail!("judge '{}' has an empty id", entry.name);
    }
    let panel = JudgePanel::new(
        file.judges
            .into_iter()
            .map(|j| Judge::new(j.id.trim(), j.name, j.persona)),
    );
    Ok(panel)
}

/// Load a panel file, replacing the built-in personas.
pub fn load_panel(path: impl AsRef<Path>) -> Result<JudgePanel> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read judge panel {}", path.display()))?;
    parse_panel(&raw)
}
