//! Filesystem transport, used for local stores and as the test backend.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use tracing::warn;
use wildmatch::WildMatch;

use crate::status::RunStatus;
use crate::transport::Transport;

pub struct LocalTransport {
    root: PathBuf,
}

impl LocalTransport {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        if path.is_empty() {
            self.root.clone()
        } else {
            self.root.join(path)
        }
    }
}

impl Transport for LocalTransport {
    fn list(&self, path: &str) -> anyhow::Result<Vec<String>> {
        let dir = self.resolve(path);
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("listing {}", dir.display()))? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort_unstable();
        Ok(names)
    }

    fn sync_incremental(
        &self,
        sources: &[PathBuf],
        dest: &str,
        link_ref: Option<&str>,
        excludes: &[String],
    ) -> anyhow::Result<RunStatus> {
        let dest_dir = self.resolve(dest);
        fs::create_dir_all(&dest_dir)
            .with_context(|| format!("creating {}", dest_dir.display()))?;
        // The link reference names a sibling of the destination entry.
        let link_root = match (link_ref, dest_dir.parent()) {
            (Some(reference), Some(parent)) => Some(parent.join(reference)),
            _ => None,
        };
        let mut status = RunStatus::Ok;
        for source in sources {
            let Some(name) = source.file_name() else {
                anyhow::bail!("source path {} has no final component", source.display());
            };
            let link = link_root.as_ref().map(|root| root.join(name));
            status = status.worst(copy_tree(
                source,
                &dest_dir.join(name),
                link.as_deref(),
                excludes,
            )?);
        }
        Ok(status)
    }

    fn mirror(&self, local_dir: &Path, remote_dir: &str) -> anyhow::Result<RunStatus> {
        copy_tree(local_dir, &self.resolve(remote_dir), None, &[])
    }

    fn replace_empty(&self, entry: &str) -> anyhow::Result<()> {
        let path = self.resolve(entry);
        let meta = match fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => {
                return Err(err).with_context(|| format!("removing {}", path.display()));
            }
        };
        if meta.is_dir() {
            fs::remove_dir_all(&path).with_context(|| format!("removing {}", path.display()))?;
        } else {
            fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
        }
        Ok(())
    }

    fn symlink(&self, entry: &str, target: &str) -> anyhow::Result<()> {
        let link = self.resolve(entry);
        // Build next to the link and rename over it, so the pointer is
        // valid at every instant.
        let staged = link.with_extension("new");
        match fs::remove_file(&staged) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err).with_context(|| format!("clearing {}", staged.display()));
            }
        }
        std::os::unix::fs::symlink(target, &staged)
            .with_context(|| format!("linking {}", staged.display()))?;
        fs::rename(&staged, &link).with_context(|| format!("renaming over {}", link.display()))
    }
}

fn copy_tree(
    src: &Path,
    dst: &Path,
    link: Option<&Path>,
    excludes: &[String],
) -> anyhow::Result<RunStatus> {
    let mut status = RunStatus::Ok;
    fs::create_dir_all(dst).with_context(|| format!("creating {}", dst.display()))?;
    for entry in fs::read_dir(src).with_context(|| format!("reading {}", src.display()))? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if excluded(&name, excludes) {
            continue;
        }
        let src_path = entry.path();
        let dst_path = dst.join(&name);
        let link_path = link.map(|l| l.join(&name));
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            status = status.worst(copy_tree(
                &src_path,
                &dst_path,
                link_path.as_deref(),
                excludes,
            )?);
        } else if file_type.is_file() {
            if let Some(reference) = link_path.as_deref()
                && unchanged_since(reference, &src_path)
                && fs::hard_link(reference, &dst_path).is_ok()
            {
                continue;
            }
            if let Err(err) = fs::copy(&src_path, &dst_path) {
                warn!(path = %src_path.display(), error = %err, "skipping unreadable file");
                status = status.worst(RunStatus::Degraded);
            }
        }
        // Symlinks and special files are not carried by this backend.
    }
    Ok(status)
}

/// Same size and mtime as the link reference, so the file can be
/// hard-linked instead of copied.
fn unchanged_since(reference: &Path, src: &Path) -> bool {
    let (Ok(a), Ok(b)) = (fs::metadata(reference), fs::metadata(src)) else {
        return false;
    };
    match (a.modified(), b.modified()) {
        (Ok(ref_mtime), Ok(src_mtime)) => a.len() == b.len() && ref_mtime == src_mtime,
        _ => false,
    }
}

/// Exclude patterns use the same wildcard syntax on both backends, so a
/// `--exclude` behaves identically on a local store and a daemon store.
fn excluded(name: &str, excludes: &[String]) -> bool {
    excludes.iter().any(|pat| WildMatch::new(pat).matches(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclude_patterns_match_wildcards() {
        let patterns = vec!["*.tmp".to_string(), "cache*".to_string(), ".git".to_string()];
        assert!(excluded("x.tmp", &patterns));
        assert!(excluded("cachedir", &patterns));
        assert!(excluded(".git", &patterns));
        assert!(!excluded("data", &patterns));
        assert!(!excluded("gitignore", &patterns));
    }
}
