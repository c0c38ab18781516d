//! Declarative YAML scenario definitions

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{E2eError, E2eResult};

/// A complete browser scenario parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering which scenarios to run
    #[serde(default)]
    pub tags: Vec<String>,

    /// Viewport size for the browser
    #[serde(default = "default_viewport")]
    pub viewport: Viewport,

    /// Steps to execute in order
    pub steps: Vec<ScenarioStep>,
}

fn default_viewport() -> Viewport {
    Viewport { width: 1280, height: 720 }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// A single step in a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// Navigate to a URL (relative to base)
    Navigate {
        url: String,
        #[serde(default)]
        wait_for_selector: Option<String>,
    },

    /// Wait for an element to reach a state
    Wait {
        selector: String,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
        #[serde(default)]
        state: WaitState,
    },

    /// Activate the sidebar checkbox whose accessible name is the tag
    CheckFilter {
        tag: String,
    },

    /// Deactivate the sidebar checkbox whose accessible name is the tag
    UncheckFilter {
        tag: String,
    },

    /// Block until the current URL matches a regex pattern
    WaitForUrl {
        pattern: String,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
    },

    /// Wait for a fixed amount of time (use sparingly)
    Sleep {
        ms: u64,
    },

    /// Record the current card set without asserting on it
    CollectCards,

    /// Re-query the cards and assert on the result
    AssertCards {
        #[serde(default)]
        min_count: Option<usize>,
        #[serde(default)]
        each_has_tag: Option<String>,
    },

    /// Take a diagnostic screenshot
    Screenshot {
        name: String,
        #[serde(default)]
        full_page: bool,
    },

    /// Log a message (for debugging)
    Log {
        message: String,
    },
}

fn default_wait_timeout() -> u64 {
    5000 // 5 seconds default
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl Scenario {
    /// Parse a scenario from a YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        serde_yaml::from_str(yaml).map_err(E2eError::from)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load all scenarios from a directory
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut scenarios = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            let scenario = Self::from_file(entry.path())?;
            scenarios.push(scenario);
        }

        Ok(scenarios)
    }

    /// Whether this scenario carries the given filter tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn parse_tag_filter_scenario() {
        let yaml = r#"
name: filter-by-tag
description: Filtering the prompt list narrows it to tagged cards
tags:
  - filters
steps:
  - action: navigate
    url: /prompts
    wait_for_selector: '[data-testid="prompt-card"]'
  - action: check_filter
    tag: IDE
  - action: wait_for_url
    pattern: tags
  - action: assert_cards
    min_count: 1
    each_has_tag: IDE
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        assert_eq!(scenario.name, "filter-by-tag");
        assert_eq!(scenario.steps.len(), 4);
        assert!(scenario.has_tag("filters"));

        match &scenario.steps[2] {
            ScenarioStep::WaitForUrl { pattern, timeout_ms } => {
                assert_eq!(pattern, "tags");
                assert_eq!(*timeout_ms, 5000);
            }
            other => panic!("expected wait_for_url, got {other:?}"),
        }
    }

    #[test]
    fn parse_viewport_override() {
        let yaml = r#"
name: wide-listing
viewport:
  width: 1920
  height: 1080
steps:
  - action: navigate
    url: /prompts
  - action: screenshot
    name: listing-wide
    full_page: true
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        assert_eq!(scenario.viewport.width, 1920);
        assert_eq!(scenario.viewport.height, 1080);
    }

    #[test]
    fn unknown_action_is_rejected() {
        let yaml = r#"
name: bad
steps:
  - action: teleport
    url: /prompts
"#;
        assert!(Scenario::from_yaml(yaml).is_err());
    }

    #[test]
    fn bundled_scenarios_parse() {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios");
        let scenarios = Scenario::load_all(&dir).unwrap();
        assert!(
            scenarios.iter().any(|s| s.name == "filter-prompts-by-tag"),
            "shipped scenario missing"
        );
    }
}
