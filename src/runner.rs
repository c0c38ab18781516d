//! Main test runner that orchestrates the app server, Playwright, and assertions

use std::path::PathBuf;
use std::time::Instant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::cards::{missing_tag, PromptCard};
use crate::error::{E2eError, E2eResult};
use crate::playwright::{PlaywrightConfig, PlaywrightHandle, StepOutcome};
use crate::scenario::{Scenario, ScenarioStep};
use crate::server::{ServerConfig, ServerHandle};

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    /// Captured when this run begins; owned by the result, never shared
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub steps: Vec<StepReport>,
    pub error: Option<String>,
}

/// What one executed step looked like, for the results file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub name: String,
    pub duration_ms: u64,
    /// Number of cards observed, for collect/assert steps
    pub cards_seen: Option<usize>,
    /// URL reported by URL waits and card queries
    pub url: Option<String>,
    /// Where a screenshot step wrote its image
    pub screenshot: Option<String>,
}

/// Result of running all scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

/// Main E2E test runner
pub struct TestRunner {
    server_config: ServerConfig,
    playwright_config: PlaywrightConfig,

    /// Running server handle (if any)
    server: Option<ServerHandle>,

    /// Scenario files directory
    scenarios_dir: PathBuf,

    /// Output directory for results
    output_dir: PathBuf,
}

impl TestRunner {
    /// Create a test runner with the given configuration
    pub fn with_config(config: RunnerConfig) -> Self {
        Self {
            server_config: config.server,
            playwright_config: config.playwright,
            server: None,
            scenarios_dir: config.scenarios_dir,
            output_dir: config.output_dir,
        }
    }

    /// Start (or attach to) the app under test
    pub async fn start_server(&mut self) -> E2eResult<()> {
        if self.server.is_some() {
            return Ok(()); // Already running
        }

        let server = if self.server_config.is_attach() {
            ServerHandle::attach(self.server_config.clone()).await?
        } else {
            ServerHandle::spawn(self.server_config.clone()).await?
        };

        // Point the browser at the actual server URL
        self.playwright_config.base_url = server.base_url().to_string();

        self.server = Some(server);
        Ok(())
    }

    /// Stop the app under test
    pub fn stop_server(&mut self) -> E2eResult<()> {
        if let Some(mut server) = self.server.take() {
            server.stop()?;
        }
        Ok(())
    }

    /// Run all scenarios in the scenarios directory
    pub async fn run_all(&mut self) -> E2eResult<SuiteResult> {
        let scenarios = Scenario::load_all(&self.scenarios_dir)?;
        self.run_scenarios(&scenarios).await
    }

    /// Run scenarios matching a tag
    pub async fn run_tagged(&mut self, tag: &str) -> E2eResult<SuiteResult> {
        let scenarios: Vec<Scenario> = Scenario::load_all(&self.scenarios_dir)?
            .into_iter()
            .filter(|s| s.has_tag(tag))
            .collect();
        self.run_scenarios(&scenarios).await
    }

    /// Run a specific scenario by name
    pub async fn run_named(&mut self, name: &str) -> E2eResult<ScenarioResult> {
        let scenario = Scenario::load_all(&self.scenarios_dir)?
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::ScenarioParse(format!("Scenario not found: {}", name)))?;

        self.start_server().await?;
        self.run_scenario(&scenario).await
    }

    /// Run a list of scenarios
    pub async fn run_scenarios(&mut self, scenarios: &[Scenario]) -> E2eResult<SuiteResult> {
        let start = Instant::now();
        let mut results = Vec::new();
        let mut passed = 0;
        let mut failed = 0;

        // Ensure the app is reachable first
        self.start_server().await?;

        info!("Running {} scenario(s)...", scenarios.len());

        for scenario in scenarios {
            match self.run_scenario(scenario).await {
                Ok(result) => {
                    if result.success {
                        passed += 1;
                        info!("✓ {} ({} ms)", result.name, result.duration_ms);
                    } else {
                        failed += 1;
                        error!(
                            "✗ {} - {}",
                            result.name,
                            result.error.as_deref().unwrap_or("unknown error")
                        );
                    }
                    results.push(result);
                }
                Err(e) => {
                    failed += 1;
                    error!("✗ {} - {}", scenario.name, e);
                    results.push(ScenarioResult {
                        name: scenario.name.clone(),
                        success: false,
                        started_at: Utc::now(),
                        duration_ms: 0,
                        steps: vec![],
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!(
            "Scenario results: {} passed, {} failed ({} ms)",
            passed, failed, duration_ms
        );

        Ok(SuiteResult {
            total: scenarios.len(),
            passed,
            failed,
            duration_ms,
            results,
        })
    }

    /// Run a single scenario in one browser session
    pub async fn run_scenario(&mut self, scenario: &Scenario) -> E2eResult<ScenarioResult> {
        let started_at = Utc::now();
        let start = Instant::now();
        debug!("Running scenario: {}", scenario.name);

        // Apply the scenario's viewport
        let mut pw_config = self.playwright_config.clone();
        pw_config.viewport_width = scenario.viewport.width;
        pw_config.viewport_height = scenario.viewport.height;

        let playwright = PlaywrightHandle::new(pw_config)?;

        let mut step_reports = Vec::new();
        let mut scenario_error: Option<String> = None;

        match playwright.run_scenario(&scenario.steps).await {
            Ok(outcomes) => {
                for outcome in &outcomes {
                    let Some(step) = scenario.steps.get(outcome.index) else {
                        continue;
                    };

                    let screenshot = match step {
                        ScenarioStep::Screenshot { name, .. } => Some(
                            playwright.screenshot_path(name).to_string_lossy().to_string(),
                        ),
                        _ => None,
                    };

                    step_reports.push(StepReport {
                        name: PlaywrightHandle::step_name(step),
                        duration_ms: outcome.duration_ms,
                        cards_seen: outcome.cards.as_ref().map(|c| c.len()),
                        url: outcome.url.clone(),
                        screenshot,
                    });

                    if let Err(e) = check_step(step, outcome) {
                        scenario_error = Some(e.to_string());
                        break;
                    }
                }
            }
            Err(E2eError::StepFailed { step, reason }) => {
                scenario_error = Some(format!("{}: {}", step, reason));
            }
            Err(e) => return Err(e),
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let success = scenario_error.is_none();

        Ok(ScenarioResult {
            name: scenario.name.clone(),
            success,
            started_at,
            duration_ms,
            steps: step_reports,
            error: scenario_error,
        })
    }

    /// Write suite results to a JSON file
    pub fn write_results(&self, results: &SuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

impl Drop for TestRunner {
    fn drop(&mut self) {
        let _ = self.stop_server();
    }
}

/// Evaluate what a step's outcome must satisfy
fn check_step(step: &ScenarioStep, outcome: &StepOutcome) -> E2eResult<()> {
    match step {
        ScenarioStep::CollectCards => {
            let count = outcome.cards.as_ref().map(|c| c.len()).unwrap_or(0);
            info!("Observed {} prompt card(s)", count);
            Ok(())
        }
        ScenarioStep::AssertCards { min_count, each_has_tag } => {
            let cards = outcome.cards.as_deref().ok_or_else(|| {
                E2eError::Playwright("assert_cards step returned no card data".to_string())
            })?;
            check_cards(cards, *min_count, each_has_tag.as_deref())
        }
        _ => Ok(()),
    }
}

/// Assert a card query result against the declared expectations
fn check_cards(
    cards: &[PromptCard],
    min_count: Option<usize>,
    each_has_tag: Option<&str>,
) -> E2eResult<()> {
    if let Some(min) = min_count {
        if cards.len() < min {
            return Err(E2eError::AssertionFailed(format!(
                "expected at least {} prompt card(s), found {}",
                min,
                cards.len()
            )));
        }
    }

    if let Some(wanted) = each_has_tag {
        let missing = missing_tag(cards, wanted);
        if !missing.is_empty() {
            let details: Vec<String> = missing
                .iter()
                .map(|&i| format!("card {} has tags {:?}", i, cards[i].tags))
                .collect();
            return Err(E2eError::AssertionFailed(format!(
                "{} of {} card(s) missing tag {:?}: {}",
                missing.len(),
                cards.len(),
                wanted,
                details.join("; ")
            )));
        }
    }

    Ok(())
}

/// Configuration for the test runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub server: ServerConfig,
    pub playwright: PlaywrightConfig,
    pub scenarios_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            playwright: PlaywrightConfig::default(),
            scenarios_dir: PathBuf::from("scenarios"),
            output_dir: PathBuf::from("test-results"),
        }
    }
}
