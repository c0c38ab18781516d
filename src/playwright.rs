//! Playwright browser automation
//!
//! Each scenario is compiled into a single Node script so every step shares
//! one browser page. Steps report back over stdout as `@@E2E {json}` marker
//! lines carrying timings and any DOM observations (cards, current URL),
//! which the runner parses and asserts on from Rust.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::process::Command as TokioCommand;
use tracing::debug;

use crate::cards::PromptCard;
use crate::error::{E2eError, E2eResult};
use crate::scenario::{ScenarioStep, WaitState};

/// Stable marker attribute of one listed prompt
pub const PROMPT_CARD_SELECTOR: &str = r#"[data-testid="prompt-card"]"#;

/// Stable marker attribute of a tag chip inside a card
pub const TAG_CHIP_SELECTOR: &str = r#"[data-testid="tag"]"#;

/// Playwright browser handle
pub struct PlaywrightHandle {
    /// Base URL of the app under test
    base_url: String,

    /// Directory for screenshots
    screenshot_dir: PathBuf,

    /// Viewport dimensions
    viewport_width: u32,
    viewport_height: u32,

    /// Browser type
    browser: Browser,

    /// Run without a visible window
    headless: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

/// What one executed step reported back
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub index: usize,
    pub duration_ms: u64,
    /// Cards observed by collect/assert steps
    pub cards: Option<Vec<PromptCard>>,
    /// Current URL, reported by URL waits
    pub url: Option<String>,
}

/// One `@@E2E` record as emitted by the generated script
#[derive(Debug, Deserialize)]
struct Emitted {
    step: Option<usize>,
    ms: Option<u64>,
    cards: Option<Vec<PromptCard>>,
    url: Option<String>,
    error: Option<String>,
    #[serde(default)]
    done: bool,
}

impl PlaywrightHandle {
    /// Create a new Playwright handle
    pub fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        // Verify playwright is installed
        Self::check_playwright_installed()?;

        // Create screenshot directory
        std::fs::create_dir_all(&config.screenshot_dir)?;

        Ok(Self {
            base_url: config.base_url,
            screenshot_dir: config.screenshot_dir,
            viewport_width: config.viewport_width,
            viewport_height: config.viewport_height,
            browser: config.browser,
            headless: config.headless,
        })
    }

    /// Check if Playwright is installed
    fn check_playwright_installed() -> E2eResult<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    /// Short name for a step, used in logs and failure reports
    pub fn step_name(step: &ScenarioStep) -> String {
        match step {
            ScenarioStep::Navigate { url, .. } => format!("navigate:{}", url),
            ScenarioStep::Wait { selector, .. } => format!("wait:{}", selector),
            ScenarioStep::CheckFilter { tag } => format!("check_filter:{}", tag),
            ScenarioStep::UncheckFilter { tag } => format!("uncheck_filter:{}", tag),
            ScenarioStep::WaitForUrl { pattern, .. } => format!("wait_for_url:{}", pattern),
            ScenarioStep::Sleep { ms } => format!("sleep:{}ms", ms),
            ScenarioStep::CollectCards => "collect_cards".to_string(),
            ScenarioStep::AssertCards { .. } => "assert_cards".to_string(),
            ScenarioStep::Screenshot { name, .. } => format!("screenshot:{}", name),
            ScenarioStep::Log { message } => {
                // Truncate by characters, not bytes: messages are free-form YAML
                format!("log:{}", message.chars().take(30).collect::<String>())
            }
        }
    }

    /// Build the Node script executing every step in one page session
    pub fn build_script(&self, steps: &[ScenarioStep]) -> String {
        let mut script = String::new();

        // Header
        script.push_str(&format!(
            r#"const {{ chromium, firefox, webkit }} = require('playwright');

(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  const context = await browser.newContext({{
    viewport: {{ width: {width}, height: {height} }}
  }});
  const page = await context.newPage();
  const baseUrl = {base_url};
  const emit = (record) => console.log('@@E2E ' + JSON.stringify(record));
  let current = -1;

  try {{
"#,
            browser = self.browser.as_str(),
            headless = self.headless,
            width = self.viewport_width,
            height = self.viewport_height,
            base_url = js_str(&self.base_url),
        ));

        // Generate step code
        for (i, step) in steps.iter().enumerate() {
            script.push_str(&format!("\n    // Step {}: {}\n", i + 1, Self::step_name(step)));
            script.push_str(&format!("    current = {};\n", i));
            script.push_str("    {\n      const t0 = Date.now();\n");
            script.push_str(&self.step_to_js(step, i));
            script.push_str("\n    }\n");
        }

        // Footer
        script.push_str(
            r#"
    emit({ done: true });
  } catch (error) {
    emit({ step: current, error: error.message });
    process.exit(1);
  } finally {
    await browser.close();
  }
})();
"#,
        );

        script
    }

    /// Convert a step to its JavaScript body (runs inside a timed block)
    fn step_to_js(&self, step: &ScenarioStep, index: usize) -> String {
        let emit_plain = format!("      emit({{ step: {index}, ms: Date.now() - t0 }});");

        match step {
            ScenarioStep::Navigate { url, wait_for_selector } => {
                let wait = wait_for_selector
                    .as_ref()
                    .map(|s| format!("\n      await page.waitForSelector({});", js_str(s)))
                    .unwrap_or_default();
                format!(
                    "      await page.goto(baseUrl + {});{}\n{}",
                    js_str(url),
                    wait,
                    emit_plain
                )
            }
            ScenarioStep::Wait { selector, timeout_ms, state } => {
                let state_str = match state {
                    WaitState::Visible => "visible",
                    WaitState::Hidden => "hidden",
                    WaitState::Attached => "attached",
                    WaitState::Detached => "detached",
                };
                format!(
                    "      await page.waitForSelector({}, {{ state: '{}', timeout: {} }});\n{}",
                    js_str(selector),
                    state_str,
                    timeout_ms,
                    emit_plain
                )
            }
            ScenarioStep::CheckFilter { tag } => {
                format!(
                    "      await page.getByRole('checkbox', {{ name: {} }}).check();\n{}",
                    js_str(tag),
                    emit_plain
                )
            }
            ScenarioStep::UncheckFilter { tag } => {
                format!(
                    "      await page.getByRole('checkbox', {{ name: {} }}).uncheck();\n{}",
                    js_str(tag),
                    emit_plain
                )
            }
            ScenarioStep::WaitForUrl { pattern, timeout_ms } => {
                format!(
                    "      await page.waitForURL(new RegExp({}), {{ timeout: {} }});\n      \
                     emit({{ step: {index}, ms: Date.now() - t0, url: page.url() }});",
                    js_str(pattern),
                    timeout_ms
                )
            }
            ScenarioStep::Sleep { ms } => {
                format!("      await page.waitForTimeout({});\n{}", ms, emit_plain)
            }
            ScenarioStep::CollectCards | ScenarioStep::AssertCards { .. } => {
                format!(
                    "      const cards = await page.$$eval({card_sel}, (nodes) =>\n        \
                     nodes.map((node) => ({{\n          \
                     tags: Array.from(node.querySelectorAll({chip_sel}))\n            \
                     .map((chip) => (chip.textContent || '').trim()),\n        \
                     }})));\n      \
                     emit({{ step: {index}, ms: Date.now() - t0, cards, url: page.url() }});",
                    card_sel = js_str(PROMPT_CARD_SELECTOR),
                    chip_sel = js_str(TAG_CHIP_SELECTOR),
                )
            }
            ScenarioStep::Screenshot { name, full_page } => {
                let path = self.screenshot_dir.join(format!("{}.png", name));
                format!(
                    "      await page.screenshot({{ path: {}, fullPage: {} }});\n{}",
                    js_str(&path.to_string_lossy()),
                    full_page,
                    emit_plain
                )
            }
            ScenarioStep::Log { message } => {
                format!("      console.log('[TEST] ' + {});\n{}", js_str(message), emit_plain)
            }
        }
    }

    /// Run a whole scenario's steps in one browser session
    pub async fn run_scenario(&self, steps: &[ScenarioStep]) -> E2eResult<Vec<StepOutcome>> {
        let script = self.build_script(steps);

        // Write script to temp file
        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join("scenario.js");
        std::fs::write(&script_path, &script)?;

        debug!("Running Playwright script: {}", script_path.display());

        let output = TokioCommand::new("node")
            .arg(&script_path)
            .current_dir(temp_dir.path())
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let records = parse_marker_lines(&stdout)?;

        if !output.status.success() {
            // Map the emitted error record back onto the failing step
            if let Some(failed) = records.iter().find(|r| r.error.is_some()) {
                let step = failed
                    .step
                    .and_then(|i| steps.get(i))
                    .map(Self::step_name)
                    .unwrap_or_else(|| "startup".to_string());
                let reason = failed.error.clone().unwrap_or_default();
                return Err(E2eError::StepFailed { step, reason });
            }

            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(E2eError::Playwright(format!(
                "Script failed without a step record:\nstdout: {}\nstderr: {}",
                stdout, stderr
            )));
        }

        if !records.iter().any(|r| r.done) {
            return Err(E2eError::Playwright(
                "Script exited cleanly but never completed".to_string(),
            ));
        }

        Ok(records
            .into_iter()
            .filter_map(|r| {
                let index = r.step?;
                Some(StepOutcome {
                    index,
                    duration_ms: r.ms.unwrap_or(0),
                    cards: r.cards,
                    url: r.url,
                })
            })
            .collect())
    }

    /// Path a named screenshot will be written to
    pub fn screenshot_path(&self, name: &str) -> PathBuf {
        self.screenshot_dir.join(format!("{}.png", name))
    }
}

/// Parse `@@E2E {json}` marker lines out of script output
fn parse_marker_lines(stdout: &str) -> E2eResult<Vec<Emitted>> {
    // The script may interleave its own console output with marker lines
    let re = Regex::new(r"@@E2E (\{.*\})").expect("static regex");
    let mut records = Vec::new();

    for line in stdout.lines() {
        if let Some(caps) = re.captures(line) {
            let record: Emitted = serde_json::from_str(&caps[1])?;
            records.push(record);
        }
    }

    Ok(records)
}

/// Quote a Rust string as a single-quoted JavaScript string literal
fn js_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub base_url: String,
    pub screenshot_dir: PathBuf,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub browser: Browser,
    pub headless: bool,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            screenshot_dir: PathBuf::from("test-results/screenshots"),
            viewport_width: 1280,
            viewport_height: 720,
            browser: Browser::Chromium,
            headless: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> PlaywrightHandle {
        PlaywrightHandle {
            base_url: "http://127.0.0.1:8080".to_string(),
            screenshot_dir: PathBuf::from("test-results/screenshots"),
            viewport_width: 1280,
            viewport_height: 720,
            browser: Browser::Chromium,
            headless: true,
        }
    }

    #[test]
    fn check_filter_targets_accessible_checkbox() {
        let script = handle().build_script(&[ScenarioStep::CheckFilter {
            tag: "IDE".to_string(),
        }]);
        assert!(script.contains("getByRole('checkbox', { name: 'IDE' }).check()"));
    }

    #[test]
    fn wait_for_url_polls_instead_of_sleeping() {
        let script = handle().build_script(&[ScenarioStep::WaitForUrl {
            pattern: "tags".to_string(),
            timeout_ms: 5000,
        }]);
        assert!(script.contains("page.waitForURL(new RegExp('tags'), { timeout: 5000 })"));
        assert!(!script.contains("waitForTimeout"));
    }

    #[test]
    fn assert_cards_extracts_trimmed_tag_chips() {
        let script = handle().build_script(&[ScenarioStep::AssertCards {
            min_count: Some(1),
            each_has_tag: Some("IDE".to_string()),
        }]);
        assert!(script.contains(r#"$$eval('[data-testid="prompt-card"]'"#));
        assert!(script.contains(r#"querySelectorAll('[data-testid="tag"]')"#));
        assert!(script.contains(".trim()"));
    }

    #[test]
    fn navigate_blocks_on_initial_render() {
        let script = handle().build_script(&[ScenarioStep::Navigate {
            url: "/prompts".to_string(),
            wait_for_selector: Some(PROMPT_CARD_SELECTOR.to_string()),
        }]);
        assert!(script.contains("page.goto(baseUrl + '/prompts')"));
        assert!(script.contains(r#"waitForSelector('[data-testid="prompt-card"]')"#));
    }

    #[test]
    fn log_step_name_truncates_on_char_boundary() {
        // 29 one-byte chars followed by a two-byte char straddling byte 30
        let message = format!("{}é fin", "x".repeat(29));
        let name = PlaywrightHandle::step_name(&ScenarioStep::Log { message });
        assert_eq!(name, format!("log:{}é", "x".repeat(29)));
    }

    #[test]
    fn screenshot_path_matches_script_target() {
        let handle = handle();
        let path = handle.screenshot_path("prompts-list");
        assert_eq!(
            path,
            PathBuf::from("test-results/screenshots/prompts-list.png")
        );

        let script = handle.build_script(&[ScenarioStep::Screenshot {
            name: "prompts-list".to_string(),
            full_page: true,
        }]);
        assert!(script.contains("test-results/screenshots/prompts-list.png"));
    }

    #[test]
    fn js_str_escapes_quotes_and_backslashes() {
        assert_eq!(js_str("plain"), "'plain'");
        assert_eq!(js_str("it's"), r"'it\'s'");
        assert_eq!(js_str(r"a\b"), r"'a\\b'");
    }

    #[test]
    fn marker_lines_parse_into_records() {
        let stdout = concat!(
            "noise from the app\n",
            "@@E2E {\"step\":0,\"ms\":120}\n",
            "@@E2E {\"step\":1,\"ms\":45,\"cards\":[{\"tags\":[\"IDE\",\"CLI\"]}],",
            "\"url\":\"http://127.0.0.1:8080/prompts?tags=IDE\"}\n",
            "@@E2E {\"done\":true}\n",
        );
        let records = parse_marker_lines(stdout).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].step, Some(1));
        let cards = records[1].cards.as_ref().unwrap();
        assert_eq!(cards[0].tags, vec!["IDE", "CLI"]);
        assert!(records[2].done);
    }

    #[test]
    fn error_record_carries_failing_step() {
        let stdout = "@@E2E {\"step\":2,\"error\":\"Timeout 5000ms exceeded\"}\n";
        let records = parse_marker_lines(stdout).unwrap();
        assert_eq!(records[0].step, Some(2));
        assert_eq!(records[0].error.as_deref(), Some("Timeout 5000ms exceeded"));
    }
}
