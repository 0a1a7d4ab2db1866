//! Input files: study configurations and unbinned samples.

use anyhow::{Context, Result};
use gs_core::UnbinnedSample;
use gs_inference::StudyConfig;
use std::path::Path;

fn extension(path: &Path) -> String {
    path.extension().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase()
}

/// Read a [`StudyConfig`] from JSON (`.json`) or YAML (anything else).
pub fn read_study_config(path: &Path) -> Result<StudyConfig> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let cfg: StudyConfig = if extension(path) == "json" {
        serde_json::from_slice(&bytes)?
    } else {
        // Default: YAML (serde_yaml_ng).
        serde_yaml_ng::from_slice(&bytes)?
    };
    Ok(cfg)
}

/// Read observations: a JSON array for `.json`, otherwise whitespace-separated numbers
/// (`#` starts a comment).
pub fn read_sample(path: &Path) -> Result<UnbinnedSample> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    if extension(path) == "json" {
        return Ok(serde_json::from_str(&text)?);
    }
    let values: Vec<f64> = text
        .lines()
        .map(|l| l.split('#').next().unwrap_or(""))
        .flat_map(str::split_whitespace)
        .map(|tok| tok.parse::<f64>().with_context(|| format!("invalid number '{tok}'")))
        .collect::<Result<_>>()?;
    Ok(UnbinnedSample::new(values)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp(name: &str, content: &str) -> std::path::PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("gofstat_cfg_{}_{}", std::process::id(), name));
        std::fs::write(&p, content).unwrap();
        p
    }

    #[test]
    fn test_read_sample_text_and_json() {
        let txt = tmp("a.txt", "# header\n3.0 1.0\n2.0 # trailing\n");
        assert_eq!(read_sample(&txt).unwrap().values(), &[1.0, 2.0, 3.0]);
        let json = tmp("a.json", "[5.0, 4.0]");
        assert_eq!(read_sample(&json).unwrap().values(), &[4.0, 5.0]);
        let bad = tmp("b.txt", "1.0 abc\n");
        assert!(read_sample(&bad).is_err());
    }

    #[test]
    fn test_read_study_config() {
        let yaml = tmp("s.yaml", "n_trials: 3\nbatch_size: 2\n");
        let cfg = read_study_config(&yaml).unwrap();
        assert_eq!(cfg.n_trials, 3);
        assert_eq!(cfg.batch_size, 2);
        assert_eq!(cfg.n_events, StudyConfig::default().n_events);
        let json = tmp("s.json", r#"{"n_trials": 4, "range": [1.0, 9.0]}"#);
        let cfg = read_study_config(&json).unwrap();
        assert_eq!(cfg.n_trials, 4);
        assert_eq!(cfg.range.map(|r| r.lo()), Some(1.0));
    }
}
