//! Per-date story storage.
//!
//! The store owns one append-only story document and one author ledger per calendar date.
//! Both are flat UTF-8 files named after the date, so "current" can always be re-derived from
//! the wall-clock date and the files present on disk:
//!
//! ```text
//! story_data/
//!   story-2024-06-02.txt     # opening line, newline, contributions joined by the separator
//!   authors-2024-06-02.txt   # one name per accepted contribution, newline terminated
//!   story-2024-06-03.txt
//!   authors-2024-06-03.txt
//! ```
//!
//! ## Consistency
//!
//! Every date has its own `RwLock`. Appends and document creation hold the write side;
//! reads hold the read side and therefore observe either the state before or after an append,
//! never a partial write. An append touches the story file first and the ledger second; if
//! either write fails both files are truncated back to their previous length.
//!
//! Locks are never held outside this module, in particular not while a relay is in flight.

use crate::config::{CoreConfig, Separator};
use crate::constants::{AUTHORS_FILE_PREFIX, DATE_FORMAT, STORE_FILE_EXTENSION, STORY_FILE_PREFIX};
use crate::{StoryError, StoryResult};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

#[cfg(test)]
use std::collections::HashSet;
#[cfg(test)]
use std::sync::LazyLock;

/// The shared story for one calendar date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryDocument {
    date: NaiveDate,
    opening_line: String,
    words: Vec<String>,
    text: String,
}

impl StoryDocument {
    fn parse(date: NaiveDate, text: String, separator: Separator) -> Self {
        let (opening_line, body) = text.split_once('\n').unwrap_or((text.as_str(), ""));
        let words = match separator {
            Separator::Space => body.split_whitespace().map(str::to_string).collect(),
            Separator::CommaNewline => body
                .split(separator.as_str())
                .flat_map(str::split_whitespace)
                .map(str::to_string)
                .collect(),
        };

        Self {
            date,
            opening_line: opening_line.trim().to_string(),
            words,
            text,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn opening_line(&self) -> &str {
        &self.opening_line
    }

    /// Contributed words in the order they were appended, excluding the opening line.
    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// The trimmed story text, opening line included.
    pub fn full_text(&self) -> &str {
        self.text.trim()
    }
}

/// Display names of contributors for one date, one entry per accepted contribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorRecord {
    pub date: NaiveDate,
    pub names: Vec<String>,
}

/// File-backed store of story documents and author ledgers.
#[derive(Debug)]
pub struct StoryStore {
    cfg: Arc<CoreConfig>,
    locks: Mutex<HashMap<NaiveDate, Arc<RwLock<()>>>>,
}

impl StoryStore {
    /// Opens the store, creating the storage directory if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StoryError::StorageDirCreation` if the directory cannot be created.
    pub fn open(cfg: Arc<CoreConfig>) -> StoryResult<Self> {
        fs::create_dir_all(cfg.story_data_dir()).map_err(StoryError::StorageDirCreation)?;

        Ok(Self {
            cfg,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn data_dir(&self) -> &Path {
        self.cfg.story_data_dir()
    }

    /// Returns the document for `date`, creating and seeding it on first access.
    pub fn current_document(&self, date: NaiveDate) -> StoryResult<StoryDocument> {
        self.ensure_document(date)?;

        let lock = self.lock_for(date);
        let _guard = lock.read().unwrap_or_else(PoisonError::into_inner);
        self.read_document(date)
    }

    /// Returns the trimmed live text of the document for `date`.
    pub fn full_text(&self, date: NaiveDate) -> StoryResult<String> {
        Ok(self.current_document(date)?.full_text().to_string())
    }

    /// Returns the author ledger for `date`, creating the day's files on first access.
    pub fn authors(&self, date: NaiveDate) -> StoryResult<AuthorRecord> {
        self.ensure_document(date)?;

        let lock = self.lock_for(date);
        let _guard = lock.read().unwrap_or_else(PoisonError::into_inner);
        self.read_authors(date)
    }

    /// Returns the document for `date` if one is on record. Never creates anything.
    pub fn document_on(&self, date: NaiveDate) -> StoryResult<Option<StoryDocument>> {
        if !self.story_path(date).is_file() {
            return Ok(None);
        }

        let lock = self.lock_for(date);
        let _guard = lock.read().unwrap_or_else(PoisonError::into_inner);
        match self.read_document(date) {
            Ok(doc) => Ok(Some(doc)),
            Err(StoryError::FileRead(e)) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Returns the author ledger for `date` if one is on record. Never creates anything.
    pub fn authors_on(&self, date: NaiveDate) -> StoryResult<Option<AuthorRecord>> {
        if !self.authors_path(date).is_file() {
            return Ok(None);
        }

        let lock = self.lock_for(date);
        let _guard = lock.read().unwrap_or_else(PoisonError::into_inner);
        match self.read_authors(date) {
            Ok(record) => Ok(Some(record)),
            Err(StoryError::FileRead(e)) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Appends one contribution to the document for `date` and records its author.
    ///
    /// The first contribution follows the opening line directly; later ones are preceded by
    /// the configured separator. Concurrent appends to the same date are serialised.
    ///
    /// # Returns
    ///
    /// The document as it is immediately after this append.
    ///
    /// # Errors
    ///
    /// Returns `StoryError::InvalidInput` if `words` is blank or `author` contains a line
    /// break, `StoryError::FileRead` / `StoryError::FileWrite` on I/O failure. On a write
    /// failure neither file keeps any part of the contribution.
    pub fn append(&self, date: NaiveDate, words: &str, author: &str) -> StoryResult<StoryDocument> {
        let words = words.trim();
        if words.is_empty() {
            return Err(StoryError::InvalidInput("cannot append empty words".into()));
        }
        if author.contains('\n') || author.contains('\r') {
            return Err(StoryError::InvalidInput(
                "author name cannot contain line breaks".into(),
            ));
        }

        self.ensure_document(date)?;

        let lock = self.lock_for(date);
        let _guard = lock.write().unwrap_or_else(PoisonError::into_inner);

        let story_path = self.story_path(date);
        let current = fs::read_to_string(&story_path).map_err(StoryError::FileRead)?;
        let separator = self.cfg.separator();
        let chunk = match current.split_once('\n') {
            Some((_, body)) if !body.is_empty() => format!("{}{}", separator.as_str(), words),
            Some(_) => words.to_string(),
            None => format!("\n{words}"),
        };

        let story_len = append_all_or_nothing(&story_path, chunk.as_bytes())?;
        if let Err(e) = append_ledger_line(&self.authors_path(date), author) {
            if let Err(rollback) = truncate_to(&story_path, story_len) {
                tracing::error!(
                    "failed to roll back story file {} after ledger failure: {}",
                    story_path.display(),
                    rollback
                );
            }
            return Err(e);
        }

        Ok(StoryDocument::parse(date, current + &chunk, separator))
    }

    /// Lists every date with a story document on record, oldest first.
    pub fn dates(&self) -> StoryResult<Vec<NaiveDate>> {
        let entries = match fs::read_dir(self.data_dir()) {
            Ok(it) => it,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoryError::FileRead(e)),
        };

        let mut dates: Vec<NaiveDate> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name();
                let stem = name
                    .to_str()?
                    .strip_prefix(STORY_FILE_PREFIX)?
                    .strip_suffix(STORE_FILE_EXTENSION)?
                    .strip_suffix('.')?;
                NaiveDate::parse_from_str(stem, DATE_FORMAT).ok()
            })
            .collect();
        dates.sort();

        Ok(dates)
    }

    fn ensure_document(&self, date: NaiveDate) -> StoryResult<()> {
        if self.story_path(date).is_file() && self.authors_path(date).is_file() {
            return Ok(());
        }

        let lock = self.lock_for(date);
        let _guard = lock.write().unwrap_or_else(PoisonError::into_inner);

        let opening_line = self.cfg.opening_lines().for_date(date);
        if create_seeded(&self.story_path(date), format!("{opening_line}\n").as_bytes())? {
            tracing::info!("created story document for {}", date.format(DATE_FORMAT));
        }
        create_seeded(&self.authors_path(date), b"")?;

        Ok(())
    }

    fn read_document(&self, date: NaiveDate) -> StoryResult<StoryDocument> {
        let text = fs::read_to_string(self.story_path(date)).map_err(StoryError::FileRead)?;
        Ok(StoryDocument::parse(date, text, self.cfg.separator()))
    }

    fn read_authors(&self, date: NaiveDate) -> StoryResult<AuthorRecord> {
        let contents =
            fs::read_to_string(self.authors_path(date)).map_err(StoryError::FileRead)?;
        Ok(AuthorRecord {
            date,
            names: contents.lines().map(str::to_string).collect(),
        })
    }

    fn lock_for(&self, date: NaiveDate) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(date).or_default().clone()
    }

    fn story_path(&self, date: NaiveDate) -> PathBuf {
        self.dated_path(STORY_FILE_PREFIX, date)
    }

    fn authors_path(&self, date: NaiveDate) -> PathBuf {
        self.dated_path(AUTHORS_FILE_PREFIX, date)
    }

    fn dated_path(&self, prefix: &str, date: NaiveDate) -> PathBuf {
        self.data_dir().join(format!(
            "{}{}.{}",
            prefix,
            date.format(DATE_FORMAT),
            STORE_FILE_EXTENSION
        ))
    }
}

/// Creates `path` with `contents` unless it already exists. Returns whether it was created.
fn create_seeded(path: &Path, contents: &[u8]) -> StoryResult<bool> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(StoryError::FileWrite(e)),
    };

    if let Err(e) = file.write_all(contents).and_then(|()| file.sync_all()) {
        drop(file);
        let _ = fs::remove_file(path);
        return Err(StoryError::FileWrite(e));
    }

    Ok(true)
}

/// Appends `bytes` in a single write, returning the length the file had before.
///
/// On failure the file is truncated back to that length.
fn append_all_or_nothing(path: &Path, bytes: &[u8]) -> StoryResult<u64> {
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(StoryError::FileWrite)?;
    let original_len = file.metadata().map_err(StoryError::FileWrite)?.len();

    if let Err(e) = file.write_all(bytes).and_then(|()| file.sync_data()) {
        if let Err(rollback) = file.set_len(original_len) {
            tracing::error!("failed to truncate {}: {}", path.display(), rollback);
        }
        return Err(StoryError::FileWrite(e));
    }

    Ok(original_len)
}

fn append_ledger_line(path: &Path, author: &str) -> StoryResult<()> {
    #[cfg(test)]
    {
        let current_id = std::thread::current().id();
        let mut guard = FORCE_LEDGER_ERROR_FOR_THREADS
            .lock()
            .expect("FORCE_LEDGER_ERROR_FOR_THREADS mutex poisoned");

        if guard.remove(&current_id) {
            return Err(StoryError::FileWrite(io::Error::other(
                "forced ledger failure (test hook)",
            )));
        }
    }

    append_all_or_nothing(path, format!("{author}\n").as_bytes()).map(|_| ())
}

fn truncate_to(path: &Path, len: u64) -> io::Result<()> {
    OpenOptions::new().write(true).open(path)?.set_len(len)
}

#[cfg(test)]
static FORCE_LEDGER_ERROR_FOR_THREADS: LazyLock<Mutex<HashSet<std::thread::ThreadId>>> =
    LazyLock::new(|| Mutex::new(HashSet::new()));

#[cfg(test)]
fn force_ledger_error_for_current_thread() {
    let mut guard = FORCE_LEDGER_ERROR_FOR_THREADS
        .lock()
        .expect("FORCE_LEDGER_ERROR_FOR_THREADS mutex poisoned");
    guard.insert(std::thread::current().id());
}
