//! Content-addressed plan cache (§4.F "Cache", §6.4 "Persisted state").

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};

use mc_common::consts::MAX_CACHED_PLANS_PER_FILE;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),
}

/// SHA-256 of `"v2"` + canonical config JSON + file bytes (§4.F "Cache").
/// `canonical_config_json` must already be compact with sorted keys — the
/// caller builds it via `serde_json::to_value` (whose `Map` is BTreeMap-
/// backed by default, giving sorted keys for free).
pub fn plan_key(canonical_config_json: &str, file_bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"v2");
    hasher.update(canonical_config_json.as_bytes());
    hasher.update(file_bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

pub struct PlanCache {
    plans_dir: PathBuf,
    meta_dir: PathBuf,
}

impl PlanCache {
    pub fn new(plans_dir: impl Into<PathBuf>, meta_dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let plans_dir = plans_dir.into();
        let meta_dir = meta_dir.into();
        fs::create_dir_all(&plans_dir)?;
        fs::create_dir_all(&meta_dir)?;
        Ok(PlanCache { plans_dir, meta_dir })
    }

    fn plan_path(&self, name: &str, key: &str) -> PathBuf {
        self.plans_dir.join(format!("{name}.{key}.gz"))
    }

    fn meta_path(&self, name: &str, key: &str) -> PathBuf {
        self.meta_dir.join(format!("{name}.{key}.gz"))
    }

    /// Returns the cached (preview, meta) JSON text if both files exist.
    pub fn get(&self, name: &str, key: &str) -> Option<(String, String)> {
        let preview = read_gz(&self.plan_path(name, key)).ok()?;
        let meta = read_gz(&self.meta_path(name, key)).ok()?;
        Some((preview, meta))
    }

    /// Writes both cache files and prunes all but the
    /// [`MAX_CACHED_PLANS_PER_FILE`] most recent entries for this filename.
    pub fn put(&self, name: &str, key: &str, preview_json: &str, meta_json: &str) -> Result<(), CacheError> {
        write_gz(&self.plan_path(name, key), preview_json)?;
        write_gz(&self.meta_path(name, key), meta_json)?;
        prune(&self.plans_dir, name)?;
        prune(&self.meta_dir, name)?;
        Ok(())
    }
}

fn read_gz(path: &Path) -> std::io::Result<String> {
    let file = fs::File::open(path)?;
    let mut decoder = GzDecoder::new(file);
    let mut out = String::new();
    decoder.read_to_string(&mut out)?;
    Ok(out)
}

fn write_gz(path: &Path, text: &str) -> std::io::Result<()> {
    let file = fs::File::create(path)?;
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(text.as_bytes())?;
    encoder.finish()?;
    Ok(())
}

/// Keep only the `MAX_CACHED_PLANS_PER_FILE` most recently modified cache
/// entries for `name` in `dir`, unlinking the rest (§4.F "Cache").
fn prune(dir: &Path, name: &str) -> std::io::Result<()> {
    let prefix = format!("{name}.");
    let mut entries: Vec<(PathBuf, std::time::SystemTime)> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|f| f.to_str())
                .is_some_and(|f| f.starts_with(&prefix) && f.ends_with(".gz"))
        })
        .filter_map(|p| fs::metadata(&p).and_then(|m| m.modified()).ok().map(|m| (p, m)))
        .collect();

    entries.sort_by(|a, b| b.1.cmp(&a.1));
    for (path, _) in entries.into_iter().skip(MAX_CACHED_PLANS_PER_FILE) {
        let _ = fs::remove_file(path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn same_inputs_produce_same_key() {
        let a = plan_key("{\"x\":1}", b"G0 X1");
        let b = plan_key("{\"x\":1}", b"G0 X1");
        assert_eq!(a, b);
        let c = plan_key("{\"x\":2}", b"G0 X1");
        assert_ne!(a, c);
    }

    #[test]
    fn put_then_get_roundtrips() {
        let dir = tempdir().unwrap();
        let cache = PlanCache::new(dir.path().join("plans"), dir.path().join("meta")).unwrap();
        cache.put("prog", "abc123", "{\"time\":1}", "{\"bounds\":{}}").unwrap();
        let (preview, meta) = cache.get("prog", "abc123").unwrap();
        assert_eq!(preview, "{\"time\":1}");
        assert_eq!(meta, "{\"bounds\":{}}");
    }

    #[test]
    fn prune_keeps_only_most_recent_two() {
        let dir = tempdir().unwrap();
        let cache = PlanCache::new(dir.path().join("plans"), dir.path().join("meta")).unwrap();
        for i in 0..4 {
            cache.put("prog", &format!("k{i}"), "{}", "{}").unwrap();
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        let remaining: Vec<_> = fs::read_dir(dir.path().join("plans"))
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(remaining.len(), MAX_CACHED_PLANS_PER_FILE);
    }

    #[test]
    fn miss_returns_none() {
        let dir = tempdir().unwrap();
        let cache = PlanCache::new(dir.path().join("plans"), dir.path().join("meta")).unwrap();
        assert!(cache.get("nope", "00").is_none());
    }
}
