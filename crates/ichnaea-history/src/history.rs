use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use ichnaea_crypto::HashChainVerifier;
use ichnaea_types::{CommitId, DatasetPath};
use tracing::{debug, info};

use crate::error::{HistoryError, HistoryResult};
use crate::journal::{Journal, JournalEntry};
use crate::record::{RecordDraft, VersionRecord};

/// Per-path linear chains of version records plus sync markers.
///
/// Appends are serialized by the internal write lock; reads run
/// concurrently. When backed by a [`Journal`], every change is durable
/// before it becomes visible.
pub struct History {
    journal: Option<Journal>,
    state: RwLock<HistoryState>,
}

#[derive(Default)]
struct HistoryState {
    chains: BTreeMap<DatasetPath, Vec<VersionRecord>>,
    index: HashMap<CommitId, (DatasetPath, usize)>,
    synced: HashSet<CommitId>,
}

impl HistoryState {
    fn head(&self, path: &DatasetPath) -> Option<&VersionRecord> {
        self.chains.get(path).and_then(|chain| chain.last())
    }

    fn check_extends(&self, record: &VersionRecord) -> HistoryResult<()> {
        HashChainVerifier::verify_extends(self.head(&record.path), record).map_err(|source| {
            HistoryError::Integrity {
                path: record.path.clone(),
                source,
            }
        })
    }

    fn push(&mut self, record: VersionRecord) {
        let chain = self.chains.entry(record.path.clone()).or_default();
        self.index
            .insert(record.commit_id, (record.path.clone(), chain.len()));
        chain.push(record);
    }

    fn apply(&mut self, entry: JournalEntry) -> HistoryResult<()> {
        match entry {
            JournalEntry::Committed(record) => {
                self.check_extends(&record)?;
                self.push(record);
            }
            JournalEntry::Synced(commit) => {
                if !self.index.contains_key(&commit) {
                    return Err(HistoryError::UnknownCommit(commit));
                }
                self.synced.insert(commit);
            }
        }
        Ok(())
    }
}

impl History {
    /// A history with no journal, for tests and embedding.
    pub fn in_memory() -> Self {
        Self {
            journal: None,
            state: RwLock::new(HistoryState::default()),
        }
    }

    /// Open a journaled history, replaying every recovered entry.
    pub fn open(journal_path: &Path) -> HistoryResult<Self> {
        let journal = Journal::open(journal_path)?;
        let mut state = HistoryState::default();
        for entry in journal.recover()? {
            state.apply(entry)?;
        }
        info!(
            journal = %journal_path.display(),
            paths = state.chains.len(),
            records = state.index.len(),
            "history opened"
        );
        Ok(Self {
            journal: Some(journal),
            state: RwLock::new(state),
        })
    }

    fn read(&self) -> HistoryResult<RwLockReadGuard<'_, HistoryState>> {
        self.state.read().map_err(|_| HistoryError::LockPoisoned)
    }

    fn write(&self) -> HistoryResult<RwLockWriteGuard<'_, HistoryState>> {
        self.state.write().map_err(|_| HistoryError::LockPoisoned)
    }

    fn persist(&self, entry: &JournalEntry) -> HistoryResult<()> {
        if let Some(journal) = &self.journal {
            journal.append(entry)?;
        }
        Ok(())
    }

    /// Seal `draft` as the next record on its path and append it.
    ///
    /// Fails with [`HistoryError::Unchanged`] when the draft's content is
    /// already the path's head.
    pub fn append(&self, draft: RecordDraft) -> HistoryResult<VersionRecord> {
        let mut state = self.write()?;
        let head = state.head(&draft.path);
        if head.is_some_and(|h| h.content_hash == draft.content_hash) {
            return Err(HistoryError::Unchanged { path: draft.path });
        }
        let seq = head.map(|h| h.seq + 1).unwrap_or(1);
        let parent = head.map(|h| h.commit_id);

        let record = VersionRecord::seal(draft, seq, parent, Utc::now())?;
        self.persist(&JournalEntry::Committed(record.clone()))?;
        state.push(record.clone());

        debug!(path = %record.path, seq, commit = %record.commit_id.short_hex(), "record appended");
        Ok(record)
    }

    /// Append a record sealed elsewhere (e.g. received by a replica).
    ///
    /// The record must extend its path's chain. Re-importing a record that
    /// is already present at the same position is a no-op and returns
    /// `false`.
    pub fn import(&self, record: VersionRecord) -> HistoryResult<bool> {
        let mut state = self.write()?;
        if let Some((path, index)) = state.index.get(&record.commit_id) {
            if *path == record.path && *index as u64 + 1 == record.seq {
                return Ok(false);
            }
            return Err(HistoryError::Conflict {
                path: record.path.clone(),
                commit: record.commit_id,
            });
        }
        state.check_extends(&record)?;
        self.persist(&JournalEntry::Committed(record.clone()))?;
        state.push(record);
        Ok(true)
    }

    /// Record that `commit` was accepted by the replica. Idempotent.
    pub fn mark_synced(&self, commit: &CommitId) -> HistoryResult<()> {
        let mut state = self.write()?;
        if !state.index.contains_key(commit) {
            return Err(HistoryError::UnknownCommit(*commit));
        }
        if state.synced.contains(commit) {
            return Ok(());
        }
        self.persist(&JournalEntry::Synced(*commit))?;
        state.synced.insert(*commit);
        Ok(())
    }

    pub fn get(&self, commit: &CommitId) -> HistoryResult<Option<VersionRecord>> {
        let state = self.read()?;
        Ok(state
            .index
            .get(commit)
            .and_then(|(path, i)| state.chains.get(path).and_then(|c| c.get(*i)))
            .cloned())
    }

    /// Latest record on `path`.
    pub fn head(&self, path: &DatasetPath) -> HistoryResult<Option<VersionRecord>> {
        Ok(self.read()?.head(path).cloned())
    }

    /// All records on `path`, oldest first.
    pub fn records(&self, path: &DatasetPath) -> HistoryResult<Vec<VersionRecord>> {
        Ok(self.read()?.chains.get(path).cloned().unwrap_or_default())
    }

    pub fn commit_count(&self, path: &DatasetPath) -> HistoryResult<u64> {
        Ok(self.read()?.chains.get(path).map(|c| c.len() as u64).unwrap_or(0))
    }

    /// Every path with at least one record, sorted.
    pub fn paths(&self) -> HistoryResult<Vec<DatasetPath>> {
        Ok(self.read()?.chains.keys().cloned().collect())
    }

    /// Records on `path` not yet accepted by the replica, oldest first.
    pub fn unsynced(&self, path: &DatasetPath) -> HistoryResult<Vec<VersionRecord>> {
        let state = self.read()?;
        Ok(state
            .chains
            .get(path)
            .map(|chain| {
                chain
                    .iter()
                    .filter(|r| !state.synced.contains(&r.commit_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    pub fn is_synced(&self, commit: &CommitId) -> HistoryResult<bool> {
        Ok(self.read()?.synced.contains(commit))
    }

    /// Re-verify every id, parent link and sequence number on `path`.
    pub fn verify_chain(&self, path: &DatasetPath) -> HistoryResult<()> {
        let records = self.records(path)?;
        HashChainVerifier::verify_chain(&records).map_err(|source| HistoryError::Integrity {
            path: path.clone(),
            source,
        })
    }
}

impl std::fmt::Debug for History {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("History")
            .field("journal", &self.journal)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ichnaea_crypto::ChainError;
    use ichnaea_types::ContentHash;
    use std::sync::Arc;

    fn path(p: &str) -> DatasetPath {
        DatasetPath::new(p).unwrap()
    }

    fn draft(p: &str, content: &[u8]) -> RecordDraft {
        RecordDraft {
            path: path(p),
            content_hash: ContentHash::compute(content),
            size: content.len() as u64,
            message: "test".into(),
        }
    }

    #[test]
    fn append_builds_linear_chain() {
        let history = History::in_memory();
        let first = history.append(draft("t.csv", b"1")).unwrap();
        let second = history.append(draft("t.csv", b"2")).unwrap();

        assert_eq!(first.seq, 1);
        assert_eq!(first.parent, None);
        assert_eq!(second.seq, 2);
        assert_eq!(second.parent, Some(first.commit_id));
        assert_eq!(history.commit_count(&path("t.csv")).unwrap(), 2);
        assert_eq!(history.head(&path("t.csv")).unwrap(), Some(second));
        history.verify_chain(&path("t.csv")).unwrap();
    }

    #[test]
    fn append_rejects_unchanged_head() {
        let history = History::in_memory();
        history.append(draft("t.csv", b"1")).unwrap();
        assert!(matches!(
            history.append(draft("t.csv", b"1")),
            Err(HistoryError::Unchanged { .. })
        ));
        history.append(draft("t.csv", b"2")).unwrap();
        history.append(draft("t.csv", b"1")).unwrap();
        assert_eq!(history.commit_count(&path("t.csv")).unwrap(), 3);
    }

    #[test]
    fn damaged_journal_refuses_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let journal_path = dir.path().join("history.log");
        {
            let history = History::open(&journal_path).unwrap();
            history.append(draft("t.csv", b"1")).unwrap();
            history.append(draft("t.csv", b"2")).unwrap();
        }

        let mut bytes = std::fs::read(&journal_path).unwrap();
        bytes[8] ^= 0xFF;
        std::fs::write(&journal_path, bytes).unwrap();

        match History::open(&journal_path) {
            Err(HistoryError::Corrupt { offset, journal }) => {
                assert_eq!(offset, 0);
                assert_eq!(journal, journal_path);
            }
            other => panic!("expected corruption, got {other:?}"),
        }
    }

    #[test]
    fn failed_persist_leaves_no_record() {
        let full = Path::new("/dev/full");
        if !full.exists() {
            return;
        }
        let history = History::open(full).unwrap();
        assert!(matches!(history.append(draft("t.csv", b"1")), Err(HistoryError::Io(_))));
        assert_eq!(history.head(&path("t.csv")).unwrap(), None);
        assert_eq!(history.commit_count(&path("t.csv")).unwrap(), 0);
    }

    #[test]
    fn paths_are_independent() {
        let history = History::in_memory();
        history.append(draft("a.csv", b"1")).unwrap();
        let b = history.append(draft("b.json", b"{}")).unwrap();
        assert_eq!(b.seq, 1);
        assert_eq!(history.paths().unwrap(), vec![path("a.csv"), path("b.json")]);
        assert_eq!(history.commit_count(&path("missing.csv")).unwrap(), 0);
    }

    #[test]
    fn get_resolves_any_commit() {
        let history = History::in_memory();
        let first = history.append(draft("t.csv", b"1")).unwrap();
        history.append(draft("t.csv", b"2")).unwrap();
        assert_eq!(history.get(&first.commit_id).unwrap(), Some(first));
        assert_eq!(history.get(&CommitId::from_hash([7; 32])).unwrap(), None);
    }

    #[test]
    fn sync_markers_do_not_touch_records() {
        let history = History::in_memory();
        let first = history.append(draft("t.csv", b"1")).unwrap();
        let second = history.append(draft("t.csv", b"2")).unwrap();

        assert_eq!(history.unsynced(&path("t.csv")).unwrap().len(), 2);
        history.mark_synced(&first.commit_id).unwrap();
        history.mark_synced(&first.commit_id).unwrap();

        assert!(history.is_synced(&first.commit_id).unwrap());
        assert_eq!(history.unsynced(&path("t.csv")).unwrap(), vec![second]);
        assert_eq!(history.get(&first.commit_id).unwrap(), Some(first));
    }

    #[test]
    fn mark_unknown_commit_fails() {
        let history = History::in_memory();
        assert!(matches!(
            history.mark_synced(&CommitId::from_hash([1; 32])),
            Err(HistoryError::UnknownCommit(_))
        ));
    }

    #[test]
    fn import_accepts_chain_and_is_idempotent() {
        let source = History::in_memory();
        let r1 = source.append(draft("t.csv", b"1")).unwrap();
        let r2 = source.append(draft("t.csv", b"2")).unwrap();

        let mirror = History::in_memory();
        assert!(mirror.import(r1.clone()).unwrap());
        assert!(!mirror.import(r1).unwrap());
        assert!(mirror.import(r2.clone()).unwrap());
        assert_eq!(mirror.head(&path("t.csv")).unwrap(), Some(r2));
    }

    #[test]
    fn import_rejects_gap() {
        let source = History::in_memory();
        source.append(draft("t.csv", b"1")).unwrap();
        let r2 = source.append(draft("t.csv", b"2")).unwrap();

        let mirror = History::in_memory();
        let err = mirror.import(r2).unwrap_err();
        assert!(matches!(
            err,
            HistoryError::Integrity {
                source: ChainError::SequenceGap { .. },
                ..
            }
        ));
        assert_eq!(mirror.commit_count(&path("t.csv")).unwrap(), 0);
    }

    #[test]
    fn import_rejects_tampered_record() {
        let source = History::in_memory();
        let mut r1 = source.append(draft("t.csv", b"1")).unwrap();
        r1.size += 1;

        let mirror = History::in_memory();
        assert!(matches!(
            mirror.import(r1),
            Err(HistoryError::Integrity {
                source: ChainError::IdMismatch { .. },
                ..
            })
        ));
    }

    #[test]
    fn journaled_history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let journal_path = dir.path().join("history.log");

        let (first, second) = {
            let history = History::open(&journal_path).unwrap();
            let first = history.append(draft("t.csv", b"1")).unwrap();
            let second = history.append(draft("t.csv", b"2")).unwrap();
            history.mark_synced(&first.commit_id).unwrap();
            (first, second)
        };

        let history = History::open(&journal_path).unwrap();
        assert_eq!(history.records(&path("t.csv")).unwrap(), vec![first.clone(), second.clone()]);
        assert!(history.is_synced(&first.commit_id).unwrap());
        assert!(!history.is_synced(&second.commit_id).unwrap());

        let third = history.append(draft("t.csv", b"3")).unwrap();
        assert_eq!(third.seq, 3);
        assert_eq!(third.parent, Some(second.commit_id));
    }

    #[test]
    fn concurrent_appends_serialize() {
        let history = Arc::new(History::in_memory());
        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let history = Arc::clone(&history);
                std::thread::spawn(move || history.append(draft("t.csv", &[i])).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let records = history.records(&path("t.csv")).unwrap();
        assert_eq!(records.len(), 8);
        assert!(records.iter().enumerate().all(|(i, r)| r.seq == i as u64 + 1));
        history.verify_chain(&path("t.csv")).unwrap();
    }
}
