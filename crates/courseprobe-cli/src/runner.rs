//! Flow runner: owns the session, runs the flow, writes the report

use crate::commands::RunArgs;
use crate::error::{CliError, CliResult};
use crate::output::Reporter;
use courseprobe::mock::{AppOptions, AssignmentApp};
use courseprobe::{
    AssignmentFlow, FakeClock, FlowReport, FlowTimeouts, RunConfig, Session, SessionConfig,
    SessionGuard, ShadowClickPolicy, SharedClock,
};
use std::path::PathBuf;
use tracing::{info, warn};

/// Everything the runner needs besides the session
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// Resolved configuration
    pub config: RunConfig,
    /// Wait budgets
    pub timeouts: FlowTimeouts,
    /// Where to write the JSON report
    pub report_path: Option<PathBuf>,
}

impl RunPlan {
    /// Resolve configuration and apply command-line overrides
    pub fn from_args(args: &RunArgs) -> CliResult<Self> {
        let timeouts = timeouts(args)?;
        let mut config = RunConfig::from_dir(args.config_dir.clone())?;
        if args.headless {
            config.session = config.session.with_headless(true);
        }
        Ok(Self {
            config,
            timeouts,
            report_path: args.report.clone(),
        })
    }

    /// Plan for the mock site; configuration files are not read
    pub fn dry_run(args: &RunArgs, options: &AppOptions) -> CliResult<Self> {
        Ok(Self {
            config: RunConfig {
                base_url: DRY_RUN_URL.to_string(),
                session: SessionConfig::new().with_headless(true),
                credentials: options.credentials().clone(),
            },
            timeouts: timeouts(args)?,
            report_path: args.report.clone(),
        })
    }
}

/// Landing URL reported by dry runs
pub const DRY_RUN_URL: &str = "mock://assignment/";

fn timeouts(args: &RunArgs) -> CliResult<FlowTimeouts> {
    if args.poll_interval == 0 {
        return Err(CliError::invalid_argument("--poll-interval must be positive"));
    }
    Ok(FlowTimeouts::default()
        .with_login_timeout(args.login_timeout)
        .with_step_timeout(args.step_timeout)
        .with_poll_interval(args.poll_interval))
}

/// Runs one flow against one session
#[derive(Debug)]
pub struct FlowRunner<'a> {
    plan: RunPlan,
    reporter: &'a Reporter,
}

impl<'a> FlowRunner<'a> {
    /// Create a runner
    #[must_use]
    pub const fn new(plan: RunPlan, reporter: &'a Reporter) -> Self {
        Self { plan, reporter }
    }

    /// Run the flow, then quit the session before reporting any failure
    pub fn execute<S: Session>(&self, session: S, clock: SharedClock) -> CliResult<FlowReport> {
        let config = &self.plan.config;
        self.reporter.header("Assignment flow");
        self.reporter.info(&format!("Landing page: {}", config.base_url));

        let mut guard = SessionGuard::new(session);
        let mut flow = AssignmentFlow::new(&config.base_url, config.credentials.clone(), clock)
            .with_timeouts(self.plan.timeouts, ShadowClickPolicy::default());
        let result = flow.run(&mut *guard);
        if let Err(e) = guard.close() {
            warn!(error = %e, "session did not quit cleanly");
        }

        let report = flow.into_report();
        self.reporter.steps(&report);
        self.reporter.summary(&report);
        if let Some(path) = &self.plan.report_path {
            report.write_json(path)?;
            info!(path = %path.display(), "flow report written");
            self.reporter.info(&format!("Report written to {}", path.display()));
        }

        result.map_err(CliError::Flow)?;
        Ok(report)
    }

    /// Run the flow against the mock site on a fake clock
    pub fn execute_mock(&self, options: AppOptions) -> CliResult<FlowReport> {
        let clock = FakeClock::shared();
        let session = AssignmentApp::session(options, clock.clone());
        self.execute(session, clock)
    }

    /// Launch the configured browser and run the flow
    #[cfg(feature = "browser")]
    pub fn launch_and_execute(&self) -> CliResult<FlowReport> {
        let session = courseprobe::ChromiumSession::launch(self.plan.config.session.clone())?;
        self.execute(session, courseprobe::SystemClock::shared())
    }

    /// Launch the configured browser and run the flow
    #[cfg(not(feature = "browser"))]
    pub fn launch_and_execute(&self) -> CliResult<FlowReport> {
        Err(CliError::config(
            "courseprobe was built without browser support. Rebuild with --features browser",
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use courseprobe::mock::Milestone;
    use courseprobe::FlowState;
    use std::sync::atomic::Ordering;

    fn plan(options: &AppOptions, report_path: Option<PathBuf>) -> RunPlan {
        RunPlan {
            config: RunConfig {
                base_url: "https://app.test/".to_string(),
                session: SessionConfig::new(),
                credentials: options.credentials().clone(),
            },
            timeouts: FlowTimeouts::default(),
            report_path,
        }
    }

    mod plan_tests {
        use super::*;
        use clap::Parser;

        fn write_properties(dir: &std::path::Path) {
            std::fs::write(
                dir.join("config.properties"),
                "base_url=https://app.test/\nheadless=false\n",
            )
            .unwrap();
            std::fs::write(
                dir.join("credentials.properties"),
                "user_email=a@b.test\nuser_password=pw\nuser_org=acme\n",
            )
            .unwrap();
        }

        fn run_args(extra: &[&str]) -> RunArgs {
            let mut argv = vec!["courseprobe", "run"];
            argv.extend_from_slice(extra);
            match crate::commands::Cli::parse_from(argv).command {
                crate::commands::Commands::Run(args) => args,
                other => unreachable!("parsed {other:?}"),
            }
        }

        #[test]
        fn test_headless_flag_overrides_config() {
            let dir = tempfile::tempdir().unwrap();
            write_properties(dir.path());
            let dir_arg = dir.path().to_str().unwrap();

            let plan = RunPlan::from_args(&run_args(&["-d", dir_arg])).unwrap();
            assert!(!plan.config.session.headless);

            let plan = RunPlan::from_args(&run_args(&["-d", dir_arg, "--headless"])).unwrap();
            assert!(plan.config.session.headless);
            assert_eq!(plan.config.credentials.org, "acme");
        }

        #[test]
        fn test_zero_poll_interval_rejected() {
            let dir = tempfile::tempdir().unwrap();
            write_properties(dir.path());
            let dir_arg = dir.path().to_str().unwrap();
            let err = RunPlan::from_args(&run_args(&["-d", dir_arg, "--poll-interval", "0"]))
                .unwrap_err();
            assert!(matches!(err, CliError::InvalidArgument { .. }));
        }

        #[test]
        fn test_dry_run_ignores_config_dir() {
            let args = run_args(&["-d", "/nonexistent/courseprobe", "--dry-run"]);
            let plan = RunPlan::dry_run(&args, &AppOptions::new()).unwrap();
            assert_eq!(plan.config.base_url, DRY_RUN_URL);
            assert_eq!(plan.config.credentials.org, "acme");
        }
    }

    mod execute_tests {
        use super::*;

        #[test]
        fn test_successful_run_writes_report() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("report.json");
            let options = AppOptions::new();
            let plan = plan(&options, Some(path.clone()));
            let clock = FakeClock::shared();
            let session = AssignmentApp::session(options, clock.clone());
            let quits = session.quit_tracker();

            let reporter = Reporter::new(false, true);
            let report = FlowRunner::new(plan, &reporter)
                .execute(session, clock)
                .unwrap();

            assert_eq!(report.final_state, FlowState::ResultsShown);
            assert_eq!(quits.load(Ordering::SeqCst), 1);
            let written: FlowReport =
                serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
            assert_eq!(written.run_id, report.run_id);
        }

        #[test]
        fn test_failed_run_still_quits_and_reports() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("report.json");
            let options = AppOptions::new().skipping(Milestone::Answered);
            let plan = plan(&options, Some(path.clone()));
            let clock = FakeClock::shared();
            let session = AssignmentApp::session(options, clock.clone());
            let quits = session.quit_tracker();

            let reporter = Reporter::new(false, true);
            let err = FlowRunner::new(plan, &reporter)
                .execute(session, clock)
                .unwrap_err();

            assert_eq!(err.exit_code(), 1);
            assert!(err.to_string().contains("QuestionAnswered"));
            assert_eq!(quits.load(Ordering::SeqCst), 1);
            assert!(path.exists());
        }

        #[test]
        fn test_execute_mock() {
            let options = AppOptions::new();
            let plan = plan(&options, None);
            let reporter = Reporter::new(false, true);
            let report = FlowRunner::new(plan, &reporter)
                .execute_mock(options)
                .unwrap();
            assert_eq!(report.passed_count(), 15);
        }
    }
}
