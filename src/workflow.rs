use crate::agents::session::{
    CycleJournal, Presenter, SessionLedger, SessionOrchestrator, SessionRecord, SessionStatus,
    TerminalPresenter, survey,
};
use crate::agents::{
    EnvironmentInspector, PackageCandidate, PythonEnvironment, RiskTier, SnapshotManager,
};
use crate::backend::BackendFactory;
use crate::config::GuardianConfig;
use crate::error::{GuardianError, Result};
use colored::Colorize;
use std::fs;

/// Run the interactive upgrade loop
pub fn execute_upgrade(config: &GuardianConfig) -> Result<()> {
    println!("{}", "Starting pip upgrade session...".cyan().bold());

    let backend = BackendFactory::create_pip(config);

    // Step 1: Refuse to touch an unsafe interpreter
    println!("\n{}", "1. Detecting Python environment...".yellow());
    let environment = EnvironmentInspector::detect(backend.as_ref());
    print_environment(&environment);
    EnvironmentInspector::ensure_safe(&environment)?;

    // Step 2: Log directory
    println!("\n{}", "2. Preparing log directory...".yellow());
    let mut ledger = SessionLedger::new(&config.log_dir)?;
    println!(
        "{}",
        format!("✓ Logs will be written to {}", ledger.log_dir().display()).green()
    );

    // Step 3: Session loop
    println!("\n{}", "3. Scanning for outdated packages...".yellow());
    let mut presenter = TerminalPresenter::stdio();

    let records =
        match SessionOrchestrator::new(backend.as_ref(), &mut presenter, &mut ledger).run() {
            Ok(records) => records,
            Err(GuardianError::UserCancelled) => {
                println!("\n{}", "Upgrade cancelled by user.".yellow());
                return Ok(());
            }
            Err(e) => return Err(e),
        };

    for record in &records {
        print_session_record(record);
    }

    let completed = records
        .iter()
        .filter(|r| r.status == SessionStatus::Completed)
        .count();
    if completed > 0 {
        println!(
            "\n{}",
            format!("✨ {completed} upgrade session(s) completed").green().bold()
        );
    } else {
        println!("\n{}", "No packages were upgraded.".yellow());
    }

    Ok(())
}

/// Show pending upgrades grouped by risk. Never modifies anything.
pub fn execute_check(config: &GuardianConfig) -> Result<()> {
    println!("{}", "Checking for available upgrades...".cyan().bold());

    let backend = BackendFactory::create_pip(config);

    println!("\n{}", "1. Detecting Python environment...".yellow());
    let environment = EnvironmentInspector::detect(backend.as_ref());
    print_environment(&environment);
    if let Err(e) = EnvironmentInspector::ensure_safe(&environment) {
        println!("{}", format!("⚠ {e}").yellow());
        println!("   Upgrades will be refused in this environment.");
    }

    println!("\n{}", "2. Assessing outdated packages...".yellow());
    let mut presenter = TerminalPresenter::stdio();
    let mut journal = CycleJournal::new();
    let candidates = survey(backend.as_ref(), &mut presenter, &mut journal)?;

    if candidates.is_empty() {
        println!("{}", "✓ All packages are up to date!".green());
        return Ok(());
    }

    presenter.render_grouped_by_tier(&candidates);
    print_tier_counts(&candidates);

    println!(
        "\n{}",
        "Run 'pipguard upgrade' to review and apply upgrades.".dimmed()
    );

    Ok(())
}

/// Write a standalone requirements snapshot
pub fn execute_snapshot(config: &GuardianConfig) -> Result<()> {
    println!("{}", "Creating environment snapshot...".cyan().bold());

    let backend = BackendFactory::create_pip(config);

    println!("\n{}", "1. Detecting Python environment...".yellow());
    let environment = EnvironmentInspector::detect(backend.as_ref());
    print_environment(&environment);
    EnvironmentInspector::ensure_safe(&environment)?;

    println!("\n{}", "2. Freezing installed packages...".yellow());
    let ledger = SessionLedger::new(&config.log_dir)?;
    let target = ledger.claim_snapshot()?;
    let written = match SnapshotManager::new(backend.as_ref(), ledger.log_dir())
        .capture_snapshot(&target)
    {
        Ok(written) => written,
        Err(e) => {
            // Release the reserved name so no empty snapshot is left behind.
            let _ = fs::remove_file(&target);
            return Err(e);
        }
    };

    println!(
        "{}",
        format!("✓ Snapshot saved to {}", written.display()).green()
    );
    println!(
        "   Restore with: {} -m pip install -r {}",
        backend.interpreter(),
        written.display()
    );

    Ok(())
}

fn print_environment(environment: &PythonEnvironment) {
    let line = format!("{}: {}", environment.kind, environment.name);
    if environment.safe_to_modify() {
        println!("{}", format!("✓ {line}").green());
    } else {
        println!("{}", format!("✗ {line} (PROTECTED)").red());
    }
    println!("   Path: {}", environment.interpreter.display().to_string().dimmed());
}

fn print_session_record(record: &SessionRecord) {
    match record.status {
        SessionStatus::Completed => {
            println!("{}", format!("✓ Session {}", record.id).green());
        }
        SessionStatus::Aborted => {
            println!("{}", format!("✗ Session {} aborted", record.id).yellow());
        }
    }
    println!("   Log: {}", record.log.display());
    if let Some(snapshot) = &record.snapshot {
        println!("   Snapshot: {}", snapshot.display());
    }
    if let Some(rollback) = &record.rollback {
        println!("   Rollback: bash {}", rollback.display());
    }
}

fn print_tier_counts(candidates: &[PackageCandidate]) {
    println!("\n{}", "Summary:".bold());
    for tier in RiskTier::ALL {
        let count = candidates.iter().filter(|c| c.risk_tier() == tier).count();
        if count > 0 {
            println!("  {}: {}", tier.colored_label(), count);
        }
    }
}
