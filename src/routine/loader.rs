use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const ROUTINE_FILE: &str = "routine.json";

/// Locate the bundled `routines/` directory: next to the executable, up the
/// target/ layout, then the crate root.
pub fn find_routines_dir() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()));

    if let Some(dir) = exe_dir {
        for ancestor in dir.ancestors().take(3) {
            let routines_dir = ancestor.join("routines");
            if routines_dir.exists() {
                return routines_dir;
            }
        }
    }

    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("routines")
}

/// Names of subdirectories holding a `routine.json`, sorted.
pub fn list_routines(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    if dir.exists() {
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("Failed to list routines in {}", dir.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_dir() && entry.path().join(ROUTINE_FILE).exists() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Raw routine text. Admission happens separately.
pub fn load_routine_text(dir: &Path, name: &str) -> Result<String> {
    let routine_dir = dir.join(name);
    if !routine_dir.exists() {
        anyhow::bail!(
            "Routine '{}' not found. Available routines: {:?}",
            name,
            list_routines(dir).unwrap_or_default()
        );
    }
    let path = routine_dir.join(ROUTINE_FILE);
    std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read routine: {}", path.display()))
}

#[derive(Debug, Deserialize)]
pub struct RoutineSummary {
    pub display_name: String,
    #[serde(default)]
    pub description: String,
}

/// Display name and description for `--list-routines`, without admitting
/// the routine.
pub fn summarize(text: &str) -> Option<RoutineSummary> {
    serde_json::from_str(text).ok()
}

/// Resolve `--routine`: `all` expands to every routine in the directory.
pub fn resolve_names(dir: &Path, requested: &[String]) -> Result<Vec<String>> {
    if requested.iter().any(|r| r == "all") {
        return list_routines(dir);
    }
    Ok(requested
        .iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect())
}
