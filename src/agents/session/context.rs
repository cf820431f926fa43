use crate::error::Result;
use crate::utils::PathValidator;
use crate::utils::artifact_file::{append_private_line, claim_private};
use jiff::Zoned;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Identity of one executed upgrade action: `<YYYYmmdd_HHMMSS>-<ordinal>`.
///
/// Only [`SessionLedger`] hands these out, after claiming the artifact names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    fn new(ordinal: usize) -> Self {
        let stamp = Zoned::now().strftime("%Y%m%d_%H%M%S").to_string();
        Self(format!("{stamp}-{ordinal}"))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

type ArtifactName = fn(&Path, &SessionId) -> PathBuf;

pub fn snapshot_path(log_dir: &Path, id: &SessionId) -> PathBuf {
    log_dir.join(format!("requirements_{id}.txt"))
}

pub fn rollback_path(log_dir: &Path, id: &SessionId) -> PathBuf {
    log_dir.join(format!("rollback_{id}.sh"))
}

pub fn log_path(log_dir: &Path, id: &SessionId) -> PathBuf {
    log_dir.join(format!("upgrade_{id}.log"))
}

fn human_timestamp() -> String {
    Zoned::now().strftime("%Y-%m-%d %H:%M:%S").to_string()
}

/// Append-only, timestamped action log for one session.
#[derive(Debug)]
pub struct SessionLog {
    path: PathBuf,
    write_failures: usize,
}

impl SessionLog {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_failures: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record one action. A failed write is reported and counted, never fatal.
    pub fn record(&mut self, message: impl AsRef<str>) {
        let message = message.as_ref();
        log::info!("{message}");
        let line = format!("[{}] {message}", human_timestamp());
        if let Err(err) = append_private_line(&self.path, &line) {
            self.write_failures += 1;
            log::warn!(
                "Could not write to log file {}: {err}",
                self.path.display()
            );
        }
    }

    pub fn write_failures(&self) -> usize {
        self.write_failures
    }
}

/// Events observed before any session exists in the current scan cycle.
///
/// They are replayed into the session log once the operator confirms, so the
/// log also covers scan and classification for that action.
#[derive(Debug, Default)]
pub struct CycleJournal {
    entries: Vec<String>,
}

impl CycleJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::debug!("{message}");
        self.entries.push(format!("[{}] {message}", human_timestamp()));
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    fn flush_into(self, log: &mut SessionLog) {
        for entry in self.entries {
            if let Err(err) = append_private_line(&log.path, &entry) {
                log.write_failures += 1;
                log::warn!("Could not write to log file {}: {err}", log.path.display());
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Completed,
    Aborted,
}

/// One operator-confirmed upgrade action and the artifacts it owns.
#[derive(Debug)]
pub struct UpgradeSession {
    id: SessionId,
    log_dir: PathBuf,
    log: SessionLog,
    snapshot: Option<PathBuf>,
    rollback: Option<PathBuf>,
}

impl UpgradeSession {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn log(&mut self) -> &mut SessionLog {
        &mut self.log
    }

    pub fn log_path(&self) -> &Path {
        self.log.path()
    }

    pub fn snapshot_target(&self) -> PathBuf {
        snapshot_path(&self.log_dir, &self.id)
    }

    pub fn rollback_target(&self) -> PathBuf {
        rollback_path(&self.log_dir, &self.id)
    }

    pub fn set_snapshot(&mut self, path: PathBuf) {
        self.snapshot = Some(path);
    }

    pub fn set_rollback(&mut self, path: PathBuf) {
        self.rollback = Some(path);
    }

    pub fn rollback(&self) -> Option<&Path> {
        self.rollback.as_deref()
    }

    /// Close the session. The returned record is all that remains of it.
    pub fn finish(mut self, status: SessionStatus) -> SessionRecord {
        let verb = match status {
            SessionStatus::Completed => "completed",
            SessionStatus::Aborted => "aborted",
        };
        self.log.record(format!("=== Upgrade session {} {verb} ===", self.id));
        SessionRecord {
            id: self.id,
            log: self.log.path,
            snapshot: self.snapshot,
            rollback: self.rollback,
            status,
        }
    }
}

/// Immutable summary of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: SessionId,
    pub log: PathBuf,
    pub snapshot: Option<PathBuf>,
    pub rollback: Option<PathBuf>,
    pub status: SessionStatus,
}

/// Run-wide, append-only list of session logs, in creation order.
#[derive(Debug)]
pub struct SessionLedger {
    log_dir: PathBuf,
    logs: Vec<PathBuf>,
}

impl SessionLedger {
    /// `log_dir` is created if missing and must not be a system directory.
    pub fn new(log_dir: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            log_dir: PathValidator::prepare_log_dir(log_dir)?,
            logs: Vec::new(),
        })
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn logs(&self) -> &[PathBuf] {
        &self.logs
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    /// Allocate a fresh session identity and replay the cycle journal into its log.
    pub fn open_session(&mut self, journal: CycleJournal) -> Result<UpgradeSession> {
        let (id, path) = self.claim(log_path)?;
        self.logs.push(path.clone());

        let mut log = SessionLog::new(path);
        journal.flush_into(&mut log);
        log.record(format!("=== Starting upgrade session {id} ==="));

        Ok(UpgradeSession {
            id,
            log_dir: self.log_dir.clone(),
            log,
            snapshot: None,
            rollback: None,
        })
    }

    /// Reserve a snapshot path for use outside any upgrade session.
    pub fn claim_snapshot(&self) -> Result<PathBuf> {
        let (_, path) = self.claim(snapshot_path)?;
        Ok(path)
    }

    /// Find an identity none of whose artifacts exist yet and create `artifact`
    /// for it exclusively. Other runs sharing the directory skip it from then on.
    fn claim(&self, artifact: ArtifactName) -> Result<(SessionId, PathBuf)> {
        let names: [ArtifactName; 3] = [snapshot_path, rollback_path, log_path];
        let mut ordinal = self.logs.len() + 1;
        loop {
            let id = SessionId::new(ordinal);
            ordinal += 1;

            if names.iter().any(|name| name(&self.log_dir, &id).exists()) {
                log::debug!("Session id {id} is already taken");
                continue;
            }

            let path = artifact(&self.log_dir, &id);
            match claim_private(&path) {
                Ok(()) => return Ok((id, path)),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    log::debug!("Lost the race for {}", path.display());
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn sessions_get_distinct_ids_and_paths() {
        let dir = tempdir().unwrap();
        let mut ledger = SessionLedger::new(dir.path()).unwrap();

        let first = ledger.open_session(CycleJournal::new()).unwrap();
        let second = ledger.open_session(CycleJournal::new()).unwrap();

        assert_ne!(first.id(), second.id());
        assert_ne!(first.log_path(), second.log_path());
        assert_ne!(first.snapshot_target(), second.snapshot_target());
        assert_ne!(first.rollback_target(), second.rollback_target());
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.logs()[0], first.log_path());
    }

    #[test]
    fn separate_ledgers_on_one_directory_never_share_artifacts() {
        let dir = tempdir().unwrap();
        let mut first_run = SessionLedger::new(dir.path()).unwrap();
        let mut second_run = SessionLedger::new(dir.path()).unwrap();

        let mut a = first_run.open_session(CycleJournal::new()).unwrap();
        a.log().record("run A action");
        let mut b = second_run.open_session(CycleJournal::new()).unwrap();
        b.log().record("run B action");

        assert_ne!(a.id(), b.id());
        assert_ne!(a.log_path(), b.log_path());
        assert_ne!(a.snapshot_target(), b.snapshot_target());
        assert_ne!(a.rollback_target(), b.rollback_target());

        let b_log = fs::read_to_string(b.log_path()).unwrap();
        assert!(b_log.contains("run B action"));
        assert!(!b_log.contains("run A action"));

        let standalone = SessionLedger::new(dir.path()).unwrap().claim_snapshot().unwrap();
        assert_ne!(standalone, a.snapshot_target());
        assert_ne!(standalone, b.snapshot_target());
        assert!(standalone.exists());
    }

    #[test]
    fn artifact_names_follow_session_id() {
        let id = SessionId("20240101_120000-1".to_string());
        let dir = Path::new("/logs");
        assert_eq!(
            snapshot_path(dir, &id),
            PathBuf::from("/logs/requirements_20240101_120000-1.txt")
        );
        assert_eq!(
            rollback_path(dir, &id),
            PathBuf::from("/logs/rollback_20240101_120000-1.sh")
        );
        assert_eq!(
            log_path(dir, &id),
            PathBuf::from("/logs/upgrade_20240101_120000-1.log")
        );
    }

    #[test]
    fn journal_is_replayed_into_new_session_log() {
        let dir = tempdir().unwrap();
        let mut ledger = SessionLedger::new(dir.path()).unwrap();

        let mut journal = CycleJournal::new();
        journal.note("Scan started");
        journal.note("requests classified LOW");

        let mut session = ledger.open_session(journal).unwrap();
        session.log().record("Upgrading requests");
        let record = session.finish(SessionStatus::Completed);

        let content = fs::read_to_string(&record.log).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].ends_with("Scan started"));
        assert!(lines[1].ends_with("requests classified LOW"));
        assert!(lines[2].contains("Starting upgrade session"));
        assert!(lines[3].ends_with("Upgrading requests"));
        assert!(lines[4].contains("completed"));
        assert!(lines.iter().all(|l| l.starts_with('[')));
    }

    #[test]
    fn unwritable_log_is_counted_not_fatal() {
        let dir = tempdir().unwrap();
        let mut ledger = SessionLedger::new(dir.path()).unwrap();
        let mut session = ledger.open_session(CycleJournal::new()).unwrap();
        fs::remove_file(session.log_path()).unwrap();
        fs::create_dir(session.log_path()).unwrap();

        session.log().record("this cannot be written");
        assert_eq!(session.log().write_failures(), 1);
    }

    #[test]
    fn finished_record_carries_artifacts() {
        let dir = tempdir().unwrap();
        let mut ledger = SessionLedger::new(dir.path()).unwrap();
        let mut session = ledger.open_session(CycleJournal::new()).unwrap();
        let rollback = session.rollback_target();
        session.set_rollback(rollback.clone());

        let record = session.finish(SessionStatus::Aborted);
        assert_eq!(record.rollback, Some(rollback));
        assert_eq!(record.snapshot, None);
        assert_eq!(record.status, SessionStatus::Aborted);
    }
}
