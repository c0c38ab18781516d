//! Promptlib E2E Test Framework
//!
//! This crate provides a Rust-controlled E2E testing framework that:
//! - Spawns the Promptlib web app as a subprocess (or attaches to one)
//! - Controls Playwright through generated Node scripts
//! - Parses declarative YAML scenarios
//! - Extracts prompt-card observations and asserts on them from Rust
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── start_server() -> ServerHandle                       │
//! │    ├── run_scenario(scenario) -> ScenarioResult             │
//! │    └── check_cards(cards, expectations)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Scenario (YAML)                                            │
//! │    ├── name, description, tags                              │
//! │    └── steps: [Step]                                        │
//! │          ├── navigate { url, wait_for_selector? }           │
//! │          ├── check_filter { tag }                           │
//! │          ├── wait_for_url { pattern, timeout_ms }           │
//! │          ├── collect_cards                                  │
//! │          └── assert_cards { min_count?, each_has_tag? }     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! One scenario runs as one Node process driving one browser page, so
//! navigation and filter state carry across steps. The script reports
//! each step back over stdout as an `@@E2E {json}` marker line; card
//! contents and the current URL come back with it, and the runner does
//! the actual assertions Rust-side with expected/actual diagnostics.

pub mod cards;
pub mod error;
pub mod playwright;
pub mod runner;
pub mod scenario;
pub mod server;

pub use error::{E2eError, E2eResult};
pub use runner::TestRunner;
pub use scenario::{Scenario, ScenarioStep};
