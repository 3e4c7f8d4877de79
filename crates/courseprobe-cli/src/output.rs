//! Output formatting and step reporting

use console::{style, Style, Term};
use courseprobe::flow::{Checkpoint, Comparison};
use courseprobe::{FlowReport, RunConfig, StepRecord};
use serde::{Deserialize, Serialize};

/// Output format for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Writes run progress to stderr
#[derive(Debug)]
pub struct Reporter {
    term: Term,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl Reporter {
    /// Create a new reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            use_color,
            quiet,
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "PASS".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message, even in quiet mode
    pub fn failure(&self, message: &str) {
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("ℹ").blue().bold().to_string()
        } else {
            "INFO".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }
        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };
        let _ = self.term.write_line("");
        let _ = self.term.write_line(&styled);
    }

    /// Print one line per recorded step
    pub fn steps(&self, report: &FlowReport) {
        for record in &report.steps {
            let line = step_line(record);
            if record.status.is_passed() {
                self.success(&line);
            } else {
                self.failure(&line);
            }
        }
    }

    /// Print the run summary
    pub fn summary(&self, report: &FlowReport) {
        let passed = report.passed();
        if self.quiet && passed {
            return;
        }
        let _ = self.term.write_line("");
        let secs = report.total_elapsed().as_secs_f64();
        let status = if passed { "PASSED" } else { "FAILED" };
        let status = if self.use_color {
            let status_style = if passed {
                Style::new().green().bold()
            } else {
                Style::new().red().bold()
            };
            status_style.apply_to(status).to_string()
        } else {
            status.to_string()
        };
        let _ = self.term.write_line(&format!(
            "{status} {} of {} steps in {secs:.2}s, reached {}",
            report.passed_count(),
            report.steps.len(),
            report.final_state
        ));
        if let Some(failure) = &report.failure {
            let _ = self.term.write_line(&format!("  {failure}"));
        }
    }
}

/// One report line for a step
#[must_use]
pub fn step_line(record: &StepRecord) -> String {
    let ms = record.elapsed.as_millis();
    match (&record.observation, &record.error) {
        (Some(observation), _) => format!("{} ({observation}, {ms} ms)", record.state),
        (None, Some(error)) => format!("{} ({error}, {ms} ms)", record.state),
        (None, None) => format!("{} ({ms} ms)", record.state),
    }
}

/// Checkpoint table as text
#[must_use]
pub fn checkpoint_table(checkpoints: &[Checkpoint]) -> String {
    let mut out = format!("{:<22} {:>5}  {}\n", "STATE", "VALUE", "CHECK");
    for checkpoint in checkpoints {
        let check = match checkpoint.comparison {
            Comparison::Equals => format!("percent == {}", checkpoint.value),
            Comparison::AtLeast => format!("percent >= {}", checkpoint.value),
            Comparison::ContainsToken => format!("text contains {:?}", checkpoint.token()),
        };
        out.push_str(&format!(
            "{:<22} {:>4}%  {check}\n",
            checkpoint.state.as_str(),
            checkpoint.value
        ));
    }
    out
}

/// Resolved configuration with the password masked
#[must_use]
pub fn config_json(config: &RunConfig) -> serde_json::Value {
    serde_json::json!({
        "base_url": config.base_url,
        "browser": config.session.browser.as_str(),
        "headless": config.session.headless,
        "implicit_wait_secs": config.session.implicit_wait.as_secs(),
        "page_load_timeout_secs": config.session.page_load_timeout.as_secs(),
        "executable": config.session.executable,
        "user_email": config.credentials.email,
        "user_password": mask(&config.credentials.password),
        "user_org": config.credentials.org,
    })
}

/// Resolved configuration as `key = value` lines
#[must_use]
pub fn config_text(config: &RunConfig) -> String {
    let mut out = String::new();
    if let serde_json::Value::Object(map) = config_json(config) {
        for (key, value) in map {
            let shown = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => "(unset)".to_string(),
                other => other.to_string(),
            };
            out.push_str(&format!("{key} = {shown}\n"));
        }
    }
    out
}

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        String::new()
    } else {
        "********".to_string()
    }
}
