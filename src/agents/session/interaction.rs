use crate::agents::candidate::PackageCandidate;
use crate::agents::risk_classifier::RiskTier;
use crate::agents::session::context::SessionLedger;
use crate::agents::upgrade_executor::BatchReport;
use crate::error::{GuardianError, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::io::{self, BufRead, Write};
use std::path::Path;

/// Actions offered after the tier table is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    ApplyLow,
    ApplyLowAndMedium,
    Custom,
    CriticalOnly,
    Refresh,
    Exit,
}

impl MenuChoice {
    pub const ALL: [MenuChoice; 6] = [
        MenuChoice::ApplyLow,
        MenuChoice::ApplyLowAndMedium,
        MenuChoice::Custom,
        MenuChoice::CriticalOnly,
        MenuChoice::Refresh,
        MenuChoice::Exit,
    ];

    pub fn key(self) -> &'static str {
        match self {
            MenuChoice::ApplyLow => "1",
            MenuChoice::ApplyLowAndMedium => "2",
            MenuChoice::Custom => "3",
            MenuChoice::CriticalOnly => "4",
            MenuChoice::Refresh => "5",
            MenuChoice::Exit => "0",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|choice| choice.key() == key)
    }
}

impl fmt::Display for MenuChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MenuChoice::ApplyLow => "Upgrade all LOW risk",
            MenuChoice::ApplyLowAndMedium => "Upgrade LOW + MEDIUM risk",
            MenuChoice::Custom => "Custom selection",
            MenuChoice::CriticalOnly => "Upgrade critical packages (pip, setuptools, wheel)",
            MenuChoice::Refresh => "Refresh package list",
            MenuChoice::Exit => "Exit",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Info,
    Success,
    Warning,
    Error,
}

/// Everything the session loop needs from the operator's terminal.
pub trait Presenter {
    fn render_grouped_by_tier(&mut self, candidates: &[PackageCandidate]);

    fn render_outcome_summary(&mut self, report: &BatchReport, rollback: Option<&Path>);

    fn render_ledger(&mut self, ledger: &SessionLedger);

    fn notify(&mut self, level: Notice, message: &str);

    fn prompt_choice(&mut self, options: &[MenuChoice]) -> Result<MenuChoice>;

    fn prompt_free_text(&mut self, label: &str) -> Result<String>;

    fn confirm(&mut self, question: &str, default: bool) -> Result<bool>;

    /// Progress indicator for a loop over `total` items.
    fn progress(&mut self, total: usize) -> ProgressBar {
        let _ = total;
        ProgressBar::hidden()
    }
}

/// Colored, line-oriented terminal front end.
pub struct TerminalPresenter<R, W> {
    input: R,
    output: W,
    show_progress: bool,
}

impl TerminalPresenter<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self {
            input: io::stdin().lock(),
            output: io::stdout(),
            show_progress: true,
        }
    }
}

impl<R: BufRead, W: Write> TerminalPresenter<R, W> {
    /// Presenter over arbitrary streams, without a progress bar.
    #[cfg(test)]
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            show_progress: false,
        }
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.output
    }

    fn read_answer(&mut self, prompt: &str) -> Result<String> {
        write!(self.output, "{}", prompt.bold())?;
        self.output.flush()?;

        let mut line = String::new();
        let read = self.input.read_line(&mut line)?;
        if read == 0 {
            return Err(GuardianError::UserCancelled);
        }
        Ok(line.trim().to_string())
    }

    // Output errors on a terminal are not actionable; rendering is best-effort.
    fn line(&mut self, text: impl fmt::Display) {
        let _ = writeln!(self.output, "{text}");
    }

    fn render_tier(&mut self, tier: RiskTier, members: &[&PackageCandidate]) {
        if members.is_empty() {
            return;
        }

        let heading = match tier {
            RiskTier::Low => format!("LOW RISK ({} packages)", members.len()).green(),
            RiskTier::Medium => format!("MEDIUM RISK ({} packages)", members.len()).yellow(),
            RiskTier::High => format!("HIGH RISK ({} packages)", members.len()).red(),
            RiskTier::Critical => {
                format!("CRITICAL PACKAGES ({} packages)", members.len()).magenta()
            }
        };
        self.line(format!("\n{}", heading.bold()));

        for pkg in members {
            let dev = if pkg.is_dev_tool() {
                format!(" {}", "[dev]".dimmed())
            } else {
                String::new()
            };
            let base = format!(
                "  • {} {} → {}{}",
                pkg.name().white().bold(),
                pkg.current_version().red(),
                pkg.latest_version().green(),
                dev
            );

            match tier {
                RiskTier::Medium if !pkg.dependents().is_empty() => {
                    self.line(format!("{base} ({} dependents)", pkg.dependents().len()));
                }
                RiskTier::High => {
                    self.line(format!("{base} {}", "MAJOR UPDATE".red().bold()));
                    if !pkg.dependents().is_empty() {
                        let shown: Vec<_> =
                            pkg.dependents().iter().take(3).map(String::as_str).collect();
                        self.line(format!("    Dependents: {}", shown.join(", ")).dimmed());
                    }
                }
                RiskTier::Low if !pkg.dependents().is_empty() => {
                    self.line(format!("{base} ({} deps)", pkg.dependents().len()));
                }
                _ => self.line(base),
            }
        }
    }
}

impl<R: BufRead, W: Write> Presenter for TerminalPresenter<R, W> {
    fn render_grouped_by_tier(&mut self, candidates: &[PackageCandidate]) {
        for tier in RiskTier::ALL {
            let members: Vec<&PackageCandidate> = candidates
                .iter()
                .filter(|c| c.risk_tier() == tier)
                .collect();
            self.render_tier(tier, &members);
        }
    }

    fn render_outcome_summary(&mut self, report: &BatchReport, rollback: Option<&Path>) {
        self.line(format!(
            "\n{} ({} attempted)",
            "Upgrade Summary:".bold(),
            report.attempted()
        ));
        self.line(format!(
            "  {} Upgraded: {}",
            "✓".green(),
            report.success_count()
        ));
        if report.verify_warning_count() > 0 {
            self.line(format!(
                "  {} Import check failed: {}",
                "⚠".yellow(),
                report.verify_warning_count()
            ));
        }
        if report.failure_count() > 0 {
            self.line(format!("  {} Failed: {}", "✗".red(), report.failure_count()));
        }

        if report.success_count() > 0 {
            if let Some(path) = rollback {
                self.line(format!(
                    "\n{} bash {}",
                    "Rollback available:".green(),
                    path.display()
                ));
            }
        }
    }

    fn render_ledger(&mut self, ledger: &SessionLedger) {
        if ledger.is_empty() {
            return;
        }
        self.line(format!("\n{}", "Session Summary:".cyan().bold()));
        self.line(format!("Created {} log file(s):", ledger.len()));
        for log in ledger.logs() {
            self.line(format!("  • {}", log.display()));
        }
        self.line(
            format!("\nAll logs stored in: {}", ledger.log_dir().display()).dimmed(),
        );
    }

    fn notify(&mut self, level: Notice, message: &str) {
        let styled = match level {
            Notice::Info => message.cyan(),
            Notice::Success => format!("✓ {message}").green(),
            Notice::Warning => format!("⚠ {message}").yellow(),
            Notice::Error => format!("✗ {message}").red(),
        };
        self.line(styled);
    }

    fn prompt_choice(&mut self, options: &[MenuChoice]) -> Result<MenuChoice> {
        self.line(format!("\n{}", "Select packages to upgrade:".bold()));
        for option in options {
            self.line(format!("[{}] {}", option.key(), option));
        }
        let keys: Vec<_> = options.iter().map(|o| o.key()).collect();

        loop {
            let answer = self.read_answer(&format!("Select option [{}]: ", keys.join("/")))?;
            if let Some(choice) = MenuChoice::from_key(&answer).filter(|c| options.contains(c)) {
                return Ok(choice);
            }
            self.line("Invalid selection. Please try again.".red());
        }
    }

    fn prompt_free_text(&mut self, label: &str) -> Result<String> {
        self.read_answer(&format!("{label}: "))
    }

    fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            let answer = self.read_answer(&format!("{question} {hint}: "))?;
            match answer.to_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => self.line("Please answer with y(es) or n(o).".red()),
            }
        }
    }

    fn progress(&mut self, total: usize) -> ProgressBar {
        if !self.show_progress || total == 0 {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar().template("  [{bar:40}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("=>-"));
        }
        pb
    }
}
