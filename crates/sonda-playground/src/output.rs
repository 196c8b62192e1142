//! Output formatting for scenario runs

use console::{style, Style, Term};
use sonda::{Outcome, RunSummary, Scenario, ScenarioReport};

/// Writes scenario listings and run results to stderr
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
        let _ = self.term.write_line(&styled);
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

    /// Print one report line; unexpected outcomes print even in quiet mode
    pub fn report(&self, report: &ScenarioReport) {
        if self.quiet && report.outcome.is_ok() {
            return;
        }
        let _ = self
            .term
            .write_line(&format!("{} {}", self.badge(report.outcome), report.summary()));
    }

    fn badge(&self, outcome: Outcome) -> String {
        let (symbol, plain) = match outcome {
            Outcome::Passed => ("✓", "PASS"),
            Outcome::ExpectedFailure => ("✓", "XFAIL"),
            Outcome::Failed => ("✗", "FAIL"),
            Outcome::UnexpectedPass => ("✗", "XPASS"),
        };
        if !self.use_color {
            return plain.to_string();
        }
        let styled = match outcome {
            Outcome::Passed => style(symbol).green().bold(),
            Outcome::ExpectedFailure => style(symbol).yellow().bold(),
            Outcome::Failed | Outcome::UnexpectedPass => style(symbol).red().bold(),
        };
        styled.to_string()
    }

    /// Print the run summary line
    pub fn summary(&self, summary: &RunSummary) {
        if self.quiet && summary.all_ok() {
            return;
        }
        let _ = self.term.write_line("");
        let elapsed_ms: u64 = summary.reports.iter().map(|r| r.elapsed_ms).sum();
        let line = format!("{} ({elapsed_ms}ms of scenario time)", summary.summary());
        if self.use_color {
            let status = if summary.all_ok() {
                Style::new().green().bold().apply_to("OK")
            } else {
                Style::new().red().bold().apply_to("FAILED")
            };
            let _ = self.term.write_line(&format!("{status} {line}"));
        } else {
            let status = if summary.all_ok() { "OK" } else { "FAILED" };
            let _ = self.term.write_line(&format!("{status} {line}"));
        }
    }
}

/// One line per scenario: name, expected-failure marker, description
#[must_use]
pub fn render_listing(scenarios: &[Scenario]) -> String {
    let width = scenarios.iter().map(|s| s.name().len()).max().unwrap_or(0);
    let mut out = String::new();
    for scenario in scenarios {
        let marker = if scenario.expected_failure().is_some() {
            " [fails by design]"
        } else {
            ""
        };
        out.push_str(&format!(
            "{:width$}  {}{marker}\n",
            scenario.name(),
            scenario.description()
        ));
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_render_listing_marks_expected_failures() {
        let scenarios = vec![
            Scenario::new("click").with_description("Physical click"),
            Scenario::new("verify_text_exact")
                .with_description("Raw text equality")
                .expecting_failure("surrounding whitespace"),
        ];
        let listing = render_listing(&scenarios);
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("click              Physical click"));
        assert!(!lines[0].contains("fails by design"));
        assert!(lines[1].ends_with("[fails by design]"));
    }

    #[test]
    fn test_plain_badges() {
        let reporter = Reporter::new(false, false);
        assert_eq!(reporter.badge(Outcome::Passed), "PASS");
        assert_eq!(reporter.badge(Outcome::ExpectedFailure), "XFAIL");
        assert_eq!(reporter.badge(Outcome::Failed), "FAIL");
        assert_eq!(reporter.badge(Outcome::UnexpectedPass), "XPASS");
    }
}
