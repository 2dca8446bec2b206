//! Bundling of pending report files into timestamped archives.

use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{MirrorError, Result};

/// Extension of report files picked up by the archiver.
pub const REPORT_EXTENSION: &str = ".txt";

/// Archive file name for a run at `timestamp`: `2024-05-01_13-45-00.zip`.
pub fn archive_name(timestamp: NaiveDateTime) -> String {
    format!("{}.zip", archive_stem(timestamp))
}

fn archive_stem(timestamp: NaiveDateTime) -> String {
    timestamp.format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// Zip every pending `*.txt` report in `dir` and remove the originals.
///
/// Returns the archive path, or `None` when there was nothing to archive.
/// An existing archive is never replaced: a second run in the same second
/// gets a numbered name such as `2024-05-01_13-45-00-1.zip`.
pub fn archive_reports(dir: &Path, timestamp: NaiveDateTime) -> Result<Option<PathBuf>> {
    let pending = pending_reports(dir)?;
    if pending.is_empty() {
        log::debug!("no pending reports in {}", dir.display());
        return Ok(None);
    }

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for name in &pending {
        let path = dir.join(name);
        let data = std::fs::read(&path).map_err(|e| MirrorError::store(&path, e))?;
        zip.start_file(name.as_str(), options)?;
        zip.write_all(&data)?;
    }
    let bytes = zip.finish()?.into_inner();

    let archive = persist_new(dir, timestamp, &bytes)?;

    for name in &pending {
        let path = dir.join(name);
        std::fs::remove_file(&path).map_err(|e| MirrorError::store(&path, e))?;
    }

    log::info!("archived {} report(s) into {}", pending.len(), archive.display());
    Ok(Some(archive))
}

/// Write `bytes` under the first free archive name for `timestamp`.
fn persist_new(dir: &Path, timestamp: NaiveDateTime, bytes: &[u8]) -> Result<PathBuf> {
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| MirrorError::store(dir, e))?;
    tmp.write_all(bytes)
        .map_err(|e| MirrorError::store(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| MirrorError::store(tmp.path(), e))?;

    let stem = archive_stem(timestamp);
    let mut attempt = 0u32;
    loop {
        let name = match attempt {
            0 => archive_name(timestamp),
            n => format!("{stem}-{n}.zip"),
        };
        let path = dir.join(name);
        match tmp.persist_noclobber(&path) {
            Ok(_) => return Ok(path),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                log::debug!("{} exists, trying the next name", path.display());
                tmp = e.file;
                attempt += 1;
            }
            Err(e) => return Err(MirrorError::store(&path, e.error)),
        }
    }
}

fn pending_reports(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| MirrorError::store(dir, e))? {
        let entry = entry.map_err(|e| MirrorError::store(dir, e))?;
        if !entry.path().is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if name.ends_with(REPORT_EXTENSION) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Read;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(13, 45, 0)
            .unwrap()
    }

    #[test]
    fn name_format() {
        assert_eq!(archive_name(ts()), "2024-05-01_13-45-00.zip");
    }

    #[test]
    fn archives_and_removes_reports() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tool.txt"), "report").unwrap();
        std::fs::write(dir.path().join("update_log.txt"), "log").unwrap();
        std::fs::write(dir.path().join("older.zip"), "zip").unwrap();

        let archive = archive_reports(dir.path(), ts()).unwrap().unwrap();
        assert_eq!(archive, dir.path().join("2024-05-01_13-45-00.zip"));
        assert!(!dir.path().join("tool.txt").exists());
        assert!(!dir.path().join("update_log.txt").exists());
        assert!(dir.path().join("older.zip").exists());

        let file = std::fs::File::open(&archive).unwrap();
        let mut zip = zip::ZipArchive::new(file).unwrap();
        assert_eq!(zip.len(), 2);
        let mut text = String::new();
        zip.by_name("tool.txt")
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "report");
    }

    fn entries(path: &Path) -> Vec<String> {
        let zip = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
        let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
        names.sort();
        names
    }

    #[test]
    fn same_second_archive_keeps_earlier_one() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "first").unwrap();
        let first = archive_reports(dir.path(), ts()).unwrap().unwrap();

        std::fs::write(dir.path().join("b.txt"), "second").unwrap();
        let second = archive_reports(dir.path(), ts()).unwrap().unwrap();

        std::fs::write(dir.path().join("c.txt"), "third").unwrap();
        let third = archive_reports(dir.path(), ts()).unwrap().unwrap();

        assert_eq!(first, dir.path().join("2024-05-01_13-45-00.zip"));
        assert_eq!(second, dir.path().join("2024-05-01_13-45-00-1.zip"));
        assert_eq!(third, dir.path().join("2024-05-01_13-45-00-2.zip"));
        assert_eq!(entries(&first), ["a.txt"]);
        assert_eq!(entries(&second), ["b.txt"]);
        assert_eq!(entries(&third), ["c.txt"]);
    }

    #[test]
    fn nothing_pending_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(archive_reports(dir.path(), ts()).unwrap(), None);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(
            archive_reports(&dir.path().join("missing"), ts()).unwrap(),
            None
        );
    }
}
