use crate::error::CoreResult;
use crate::report::Report;
use crate::run::id::run_id_ulid;
use std::fs;
use std::path::{Path, PathBuf};

const EXTRACT_DIR: &str = "unzipped";
const REPORT_FILE: &str = "report.json";

/// Per-run scratch directory: `<runs_root>/<run_id>/` holding the extracted
/// tree under `unzipped/` and one screenshot per capture offset.
#[derive(Debug, Clone)]
pub struct RunWorkspace {
    pub run_id: String,
    pub root: PathBuf,
}

impl RunWorkspace {
    /// Fails if the run directory already exists; run directories are never reused.
    pub fn create(runs_root: &Path) -> CoreResult<Self> {
        let run_id = run_id_ulid();
        Self::create_with_id(runs_root, &run_id)
    }

    pub fn create_with_id(runs_root: &Path, run_id: &str) -> CoreResult<Self> {
        fs::create_dir_all(runs_root)?;
        let root = runs_root.join(run_id);
        fs::create_dir(&root)?;
        fs::create_dir(root.join(EXTRACT_DIR))?;
        Ok(Self {
            run_id: run_id.to_string(),
            root,
        })
    }

    pub fn extract_dir(&self) -> PathBuf {
        self.root.join(EXTRACT_DIR)
    }

    pub fn entry_document(&self) -> PathBuf {
        self.extract_dir().join("index.html")
    }

    pub fn backup_path(&self, t_sec: f64) -> PathBuf {
        self.root.join(backup_file_name(t_sec))
    }

    pub fn report_path(&self) -> PathBuf {
        self.root.join(REPORT_FILE)
    }

    pub fn write_report(&self, report: &Report) -> CoreResult<PathBuf> {
        let path = self.report_path();
        fs::write(&path, serde_json::to_vec_pretty(report)?)?;
        Ok(path)
    }
}

/// `1.4` -> `backup_1_4.png`
pub fn backup_file_name(t_sec: f64) -> String {
    format!("backup_{}.png", t_sec.to_string().replace('.', "_"))
}
