//! Local signature cache: maps a subject digest to its known signature
//! digests and their on-disk payloads. The push engine only reads it;
//! population happens elsewhere.
//!
//! Layout: `<root>/signatures/<subject-alg>/<subject-hex>/<sig-alg>/<sig-hex>.sig`

use std::fs;
use std::path::{Path, PathBuf};

use crate::descriptor::Digest;
use crate::error::CrestError;

const SIGNATURES_DIR: &str = "signatures";
const SIGNATURE_EXT: &str = "sig";

/// Cache root. Uses CREST_CACHE_DIR if set; then the .crestrc cacheDir;
/// otherwise ~/.crest-cache.
pub fn cache_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CREST_CACHE_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    if let Some(dir) = crate::config::load_config(Path::new(".")).cache_dir {
        return PathBuf::from(dir);
    }
    let base = if cfg!(target_os = "windows") {
        std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string())
    } else {
        std::env::var("HOME").unwrap_or_else(|_| ".".to_string())
    };
    Path::new(&base).join(".crest-cache")
}

fn signatures_dir(root: &Path) -> PathBuf {
    root.join(SIGNATURES_DIR)
}

fn subject_dir(root: &Path, subject: &Digest) -> PathBuf {
    signatures_dir(root).join(&subject.algorithm).join(&subject.hex)
}

/// Deterministic on-disk path for a (subject, signature) pair.
pub fn signature_path(root: &Path, subject: &Digest, signature: &Digest) -> PathBuf {
    subject_dir(root, subject)
        .join(&signature.algorithm)
        .join(format!("{}.{}", signature.hex, SIGNATURE_EXT))
}

/// Known signature digests for a subject, in sorted order.
/// A missing subject directory means no signatures; an unreadable one is an error.
pub fn signature_digests(root: &Path, subject: &Digest) -> Result<Vec<Digest>, CrestError> {
    let lookup_err = |source: String| CrestError::CacheLookup {
        subject: subject.to_string(),
        source,
    };
    let dir = subject_dir(root, subject);
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    let entries = fs::read_dir(&dir).map_err(|e| lookup_err(e.to_string()))?;
    for entry in entries {
        let entry = entry.map_err(|e| lookup_err(e.to_string()))?;
        let alg_dir = entry.path();
        if !alg_dir.is_dir() {
            continue;
        }
        let Some(algorithm) = alg_dir.file_name().and_then(|s| s.to_str()).map(String::from)
        else {
            continue;
        };
        let files = fs::read_dir(&alg_dir).map_err(|e| lookup_err(e.to_string()))?;
        for file in files {
            let file = file.map_err(|e| lookup_err(e.to_string()))?;
            let path = file.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some(SIGNATURE_EXT)
            {
                continue;
            }
            let Some(hex) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            // Stray files that don't parse as digests are ignored.
            if let Ok(digest) = Digest::parse(&format!("{}:{}", algorithm, hex)) {
                out.push(digest);
            }
        }
    }
    out.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
    Ok(out)
}

/// All (subject, signature) pairs in the cache, subjects in sorted order.
pub fn list_signatures(root: &Path) -> Result<Vec<(Digest, Digest)>, String> {
    let mut subjects = Vec::new();
    let base = signatures_dir(root);
    if !base.exists() {
        return Ok(Vec::new());
    }
    let algs = fs::read_dir(&base).map_err(|e| e.to_string())?;
    for alg in algs {
        let alg = alg.map_err(|e| e.to_string())?;
        let alg_dir = alg.path();
        if !alg_dir.is_dir() {
            continue;
        }
        let Some(algorithm) = alg_dir.file_name().and_then(|s| s.to_str()).map(String::from)
        else {
            continue;
        };
        let hexes = fs::read_dir(&alg_dir).map_err(|e| e.to_string())?;
        for hex in hexes {
            let hex = hex.map_err(|e| e.to_string())?;
            let Some(hex) = hex.path().file_name().and_then(|s| s.to_str()).map(String::from)
            else {
                continue;
            };
            if let Ok(subject) = Digest::parse(&format!("{}:{}", algorithm, hex)) {
                subjects.push(subject);
            }
        }
    }
    subjects.sort_by(|a, b| a.to_string().cmp(&b.to_string()));

    let mut out = Vec::new();
    for subject in subjects {
        let sigs = signature_digests(root, &subject).map_err(|e| e.to_string())?;
        for sig in sigs {
            out.push((subject.clone(), sig));
        }
    }
    Ok(out)
}

/// Total bytes of cached signature payloads. Best-effort; unreadable entries count as zero.
pub fn cache_size_bytes(root: &Path) -> u64 {
    fn walk(dir: &Path) -> u64 {
        let mut total = 0u64;
        if let Ok(entries) = fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    total += walk(&path);
                } else if let Ok(meta) = entry.metadata() {
                    total += meta.len();
                }
            }
        }
        total
    }
    walk(&signatures_dir(root))
}

/// Remove all cached signatures.
pub fn cache_clean(root: &Path) -> Result<(), String> {
    let base = signatures_dir(root);
    if base.exists() {
        fs::remove_dir_all(&base).map_err(|e| e.to_string())?;
    }
    Ok(())
}
