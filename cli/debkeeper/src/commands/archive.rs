//! `debkeeper archive`: bundle pending reports.

use std::path::Path;

use anyhow::{Context, Result};

/// Zip pending reports in `reports_dir` under the current local time.
pub fn run(reports_dir: &Path) -> Result<()> {
    let now = chrono::Local::now().naive_local();
    match debkeeper_core::archive_reports(reports_dir, now)
        .with_context(|| format!("failed to archive reports in {}", reports_dir.display()))?
    {
        Some(path) => println!("Archived reports to {}", path.display()),
        None => println!("No pending reports in {}", reports_dir.display()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_empty_dir_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path()).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn archive_moves_reports_into_zip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tool.txt"), "report").unwrap();
        run(dir.path()).unwrap();
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with(".zip"));
    }
}
