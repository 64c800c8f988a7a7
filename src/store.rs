//! Corpus persistence: dedup-set loading, backup-before-write, and
//! append-only batch writes with a format fallback.
//!
//! The corpus is a single append-only tabular file keyed by `url`. The output
//! path's extension selects the primary format (`.jsonl` for JSON Lines,
//! anything else CSV). On the first primary write failure the run switches to
//! the other format at the same logical path with the extension substituted;
//! a failure of the fallback as well is fatal.
//!
//! This store is the only component that writes the corpus file. One process
//! instance per corpus at a time; there is no external locking.

use crate::models::ArticleRecord;
use chrono::Local;
use serde::Deserialize;
use std::collections::HashSet;
use std::error::Error;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// On-disk representation of the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusFormat {
    Csv,
    JsonLines,
}

impl CorpusFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("jsonl") | Some("ndjson") => CorpusFormat::JsonLines,
            _ => CorpusFormat::Csv,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            CorpusFormat::Csv => "csv",
            CorpusFormat::JsonLines => "jsonl",
        }
    }

    /// The format a failed write falls back to.
    pub fn fallback(self) -> Self {
        match self {
            CorpusFormat::Csv => CorpusFormat::JsonLines,
            CorpusFormat::JsonLines => CorpusFormat::Csv,
        }
    }
}

/// Handle on the corpus file, owning all writes to it for the run.
pub struct CorpusStore {
    path: PathBuf,
    format: CorpusFormat,
    /// Whether the corpus file existed before this run touched it.
    existed: bool,
    backed_up: bool,
    fallback_engaged: bool,
}

impl CorpusStore {
    /// Open the corpus at `path`, creating an empty file with the full schema
    /// when it does not exist yet.
    pub fn open(path: &Path) -> Result<Self, Box<dyn Error>> {
        let format = CorpusFormat::from_path(path);
        let existed = path.exists();
        if !existed {
            match format {
                CorpusFormat::Csv => {
                    let mut writer = csv::Writer::from_path(path)?;
                    writer.write_record([
                        "date", "title", "summary", "body", "url", "section", "id", "status",
                    ])?;
                    writer.flush()?;
                }
                CorpusFormat::JsonLines => {
                    fs::File::create(path)?;
                }
            }
            info!(path = %path.display(), "Created empty corpus");
        }
        Ok(Self {
            path: path.to_path_buf(),
            format,
            existed,
            backed_up: false,
            fallback_engaged: false,
        })
    }

    /// Read only the `url` column of the corpus into the dedup set.
    pub fn load_seen_urls(&self) -> Result<HashSet<String>, Box<dyn Error>> {
        let mut seen = HashSet::new();
        match self.format {
            CorpusFormat::Csv => {
                let mut reader = csv::Reader::from_path(&self.path)?;
                let url_idx = reader
                    .headers()?
                    .iter()
                    .position(|h| h == "url")
                    .ok_or("corpus has no url column")?;
                for row in reader.records() {
                    let row = row?;
                    if let Some(url) = row.get(url_idx) {
                        seen.insert(url.to_string());
                    }
                }
            }
            CorpusFormat::JsonLines => {
                #[derive(Deserialize)]
                struct UrlOnly {
                    url: String,
                }
                let reader = BufReader::new(fs::File::open(&self.path)?);
                for line in reader.lines() {
                    let line = line?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<UrlOnly>(&line) {
                        Ok(row) => {
                            seen.insert(row.url);
                        }
                        Err(e) => warn!(error = %e, "Skipping unreadable corpus line"),
                    }
                }
            }
        }
        info!(count = seen.len(), path = %self.path.display(), "Loaded dedup set");
        Ok(seen)
    }

    /// Append one batch of records.
    ///
    /// Before the first append of the run, a pre-existing corpus is copied
    /// byte-for-byte to the backup path. A primary-format write failure
    /// engages the fallback format once; a fallback failure propagates and
    /// ends the run.
    pub fn append(&mut self, records: &[ArticleRecord]) -> Result<usize, Box<dyn Error>> {
        if records.is_empty() {
            return Ok(0);
        }
        if self.existed && !self.backed_up {
            let backup = self.backup_path();
            fs::copy(&self.path, &backup)?;
            self.backed_up = true;
            info!(backup = %backup.display(), "Backed up corpus before first append");
        }

        match write_records(&self.path, self.format, records) {
            Ok(()) => Ok(records.len()),
            Err(e) if !self.fallback_engaged => {
                let fallback = self.format.fallback();
                let fallback_path = self.path.with_extension(fallback.extension());
                warn!(
                    error = %e,
                    from = %self.path.display(),
                    to = %fallback_path.display(),
                    "Primary corpus write failed; falling back"
                );
                write_records(&fallback_path, fallback, records)?;
                self.path = fallback_path;
                self.format = fallback;
                self.fallback_engaged = true;
                Ok(records.len())
            }
            Err(e) => Err(e),
        }
    }

    fn backup_path(&self) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("corpus");
        self.path
            .with_file_name(format!("{stem}_backup_{stamp}.{}", self.format.extension()))
    }
}

/// Append records to `path` in `format`, creating the file (with the CSV
/// header when applicable) if it does not exist. Never rewrites prior rows.
fn write_records(
    path: &Path,
    format: CorpusFormat,
    records: &[ArticleRecord],
) -> Result<(), Box<dyn Error>> {
    let is_new = !path.exists() || fs::metadata(path)?.len() == 0;
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    match format {
        CorpusFormat::Csv => {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(is_new)
                .from_writer(file);
            for record in records {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }
        CorpusFormat::JsonLines => {
            let mut out = std::io::BufWriter::new(file);
            for record in records {
                serde_json::to_writer(&mut out, record)?;
                out.write_all(b"\n")?;
            }
            out.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DateValue;
    use chrono::NaiveDate;

    fn record(url: &str) -> ArticleRecord {
        ArticleRecord {
            date: DateValue::Timestamp(
                NaiveDate::from_ymd_opt(2025, 1, 3)
                    .unwrap()
                    .and_hms_opt(10, 30, 0)
                    .unwrap(),
            ),
            title: "Título".to_string(),
            summary: "Resumen".to_string(),
            body: "Cuerpo, con coma".to_string(),
            url: url.to_string(),
            section: "politica".to_string(),
            id: None,
            status: None,
        }
    }

    #[test]
    fn open_creates_empty_corpus_with_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.csv");
        let store = CorpusStore::open(&path).unwrap();
        assert!(path.exists());
        assert!(store.load_seen_urls().unwrap().is_empty());
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim(), "date,title,summary,body,url,section,id,status");
    }

    #[test]
    fn append_then_reload_dedup_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.csv");
        let mut store = CorpusStore::open(&path).unwrap();
        store
            .append(&[record("https://a.example/1"), record("https://a.example/2")])
            .unwrap();

        let reopened = CorpusStore::open(&path).unwrap();
        let seen = reopened.load_seen_urls().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.contains("https://a.example/1"));
        assert!(seen.contains("https://a.example/2"));
    }

    #[test]
    fn appends_never_rewrite_prior_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.csv");
        let mut store = CorpusStore::open(&path).unwrap();
        store.append(&[record("https://a.example/1")]).unwrap();
        let after_first = fs::read_to_string(&path).unwrap();
        store.append(&[record("https://a.example/2")]).unwrap();
        let after_second = fs::read_to_string(&path).unwrap();
        assert!(after_second.starts_with(&after_first));
        assert_eq!(after_second.lines().count(), 3);
    }

    #[test]
    fn backup_is_byte_identical_and_taken_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.csv");
        {
            let mut store = CorpusStore::open(&path).unwrap();
            store.append(&[record("https://a.example/1")]).unwrap();
            // a freshly created corpus gets no backup
            assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
        }
        let pre_run = fs::read(&path).unwrap();

        let mut store = CorpusStore::open(&path).unwrap();
        store.append(&[record("https://a.example/2")]).unwrap();
        store.append(&[record("https://a.example/3")]).unwrap();

        let backups: Vec<PathBuf> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| {
                p.file_name()
                    .unwrap()
                    .to_str()
                    .unwrap()
                    .contains("_backup_")
            })
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(fs::read(&backups[0]).unwrap(), pre_run);
    }

    #[test]
    fn jsonl_corpus_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.jsonl");
        let mut store = CorpusStore::open(&path).unwrap();
        store.append(&[record("https://a.example/1")]).unwrap();

        let seen = CorpusStore::open(&path).unwrap().load_seen_urls().unwrap();
        assert!(seen.contains("https://a.example/1"));
        let line = fs::read_to_string(&path).unwrap();
        assert!(line.contains("\"date\":\"2025-01-03T10:30:00\""));
    }

    #[test]
    fn format_follows_extension_and_fallback_swaps_it() {
        assert_eq!(CorpusFormat::from_path(Path::new("x/corpus.csv")), CorpusFormat::Csv);
        assert_eq!(
            CorpusFormat::from_path(Path::new("x/corpus.jsonl")),
            CorpusFormat::JsonLines
        );
        assert_eq!(CorpusFormat::Csv.fallback(), CorpusFormat::JsonLines);
        assert_eq!(CorpusFormat::JsonLines.fallback(), CorpusFormat::Csv);
        assert_eq!(
            Path::new("x/corpus.csv").with_extension(CorpusFormat::Csv.fallback().extension()),
            Path::new("x/corpus.jsonl")
        );
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.csv");
        let mut store = CorpusStore::open(&path).unwrap();
        assert_eq!(store.append(&[]).unwrap(), 0);
        // no backup triggered either
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
