// Candidate table locations handed to the prediction service.
//
// The service usually runs in a container with its own view of the
// filesystem, so the local table path is rarely the right one. Candidates
// are tried in order; the first that scores wins.

use std::path::{Component, Path, PathBuf};

use crate::config::PredictionConfig;

/// Ordered, de-duplicated locations for the table at `local_table`:
///
/// 1. `prediction.service_table_path`, when configured
/// 2. the local path remapped at `path_marker` under `container_root`
/// 3. `container_root/<dir>/<file name>` for each of `fallback_dirs`
pub fn build_candidates(config: &PredictionConfig, local_table: &Path) -> Vec<String> {
    let mut raw = Vec::new();
    if let Some(primary) = &config.service_table_path {
        raw.push(primary.clone());
    }
    if let Some(remapped) = remap_to_container(local_table, &config.path_marker, &config.container_root)
    {
        raw.push(remapped);
    }
    if let Some(file_name) = local_table.file_name().and_then(|n| n.to_str()) {
        for dir in &config.fallback_dirs {
            raw.push(join_posix(&[&config.container_root, dir, file_name]));
        }
    }
    dedupe(raw)
}

/// Candidates for an explicitly named location: the location itself, then
/// its container remapping if it has one.
pub fn explicit_candidates(config: &PredictionConfig, location: &str) -> Vec<String> {
    let mut raw = vec![location.to_string()];
    if let Some(remapped) =
        remap_to_container(Path::new(location), &config.path_marker, &config.container_root)
    {
        raw.push(remapped);
    }
    dedupe(raw)
}

/// Rewrite `local` so everything from the first `marker` segment onward sits
/// under `root`. `None` when the marker is empty or absent from the path.
///
/// `/home/dev/project/backend/data/t.csv` with marker `backend` and root
/// `/app` becomes `/app/backend/data/t.csv`.
pub fn remap_to_container(local: &Path, marker: &str, root: &str) -> Option<String> {
    if marker.is_empty() {
        return None;
    }
    let absolute = absolutize(local);
    let segments: Vec<&str> = absolute
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect();
    let start = segments.iter().position(|s| *s == marker)?;
    let mut parts = vec![root];
    parts.extend(&segments[start..]);
    Some(join_posix(&parts))
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

/// Join with `/` regardless of host platform; the service is always POSIX.
fn join_posix(parts: &[&str]) -> String {
    let mut out = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i == 0 {
            out.push_str(part.trim_end_matches('/'));
            continue;
        }
        let piece = part.trim_matches('/');
        if piece.is_empty() {
            continue;
        }
        out.push('/');
        out.push_str(piece);
    }
    out
}

fn dedupe(raw: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for candidate in raw {
        let candidate = candidate.trim().to_string();
        if candidate.is_empty() || out.contains(&candidate) {
            continue;
        }
        out.push(candidate);
    }
    out
}
