use {
    crate::pipeline::SeriesSnapshot,
    serde::{Deserialize, Serialize},
    std::{fs, path::Path},
};

/// End-of-run export of both series for offline plotting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesExport {
    /// "Moving Average" or "Simple Mean"
    pub aggregate_label: String,
    pub series: SeriesSnapshot,
    /// Export time (Unix milliseconds)
    pub exported_at_ms: i64,
}

/// Write the series snapshot as pretty JSON, replacing any existing file
pub fn save_series_snapshot(
    path: &Path,
    aggregate_label: &str,
    series: &SeriesSnapshot,
) -> Result<(), Box<dyn std::error::Error>> {
    let export = SeriesExport {
        aggregate_label: aggregate_label.to_string(),
        series: series.clone(),
        exported_at_ms: chrono::Utc::now().timestamp_millis(),
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_string_pretty(&export)?;
    fs::write(path, json)?;

    log::info!(
        "💾 Saved {} samples and {} aggregates to {}",
        series.raw.len(),
        series.aggregates.len(),
        path.display()
    );
    Ok(())
}

/// Load a snapshot written by `save_series_snapshot`
pub fn load_series_snapshot(path: &Path) -> Result<SeriesExport, Box<dyn std::error::Error>> {
    let json = fs::read_to_string(path)?;
    let export: SeriesExport = serde_json::from_str(&json)?;
    Ok(export)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_snapshot_written_and_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("runs").join("series.json");

        let snapshot = SeriesSnapshot {
            raw: vec![(1_000, 19.5), (1_400, 20.25)],
            aggregates: vec![(6_000, 19.88)],
            raw_origin_ms: Some(1_000),
            aggregate_origin_ms: Some(6_000),
        };

        save_series_snapshot(&path, "Simple Mean", &snapshot).unwrap();
        let loaded = load_series_snapshot(&path).unwrap();

        assert_eq!(loaded.aggregate_label, "Simple Mean");
        assert_eq!(loaded.series, snapshot);
        assert!(loaded.exported_at_ms > 0);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempdir().unwrap();
        assert!(load_series_snapshot(&dir.path().join("absent.json")).is_err());
    }
}
