//! Per-session workspaces: `<base>/<token>/inputs` and `<base>/<token>/outputs`.
//!
//! A workspace path is derived only from its token, and tokens are UUIDs, so
//! two sessions can never resolve to overlapping directories.

use dashmap::DashSet;
use log::info;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

use crate::common::errors::JobError;
use crate::common::{INPUTS_DIR, OUTPUTS_DIR};
use crate::utils::{colorized_name, sanitize_filename};

// ────────────────────────────────────────────────────────────────
// Session token
// ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionToken(Uuid);

impl SessionToken {
    pub fn generate() -> Self {
        SessionToken(Uuid::new_v4())
    }
}

impl FromStr for SessionToken {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(SessionToken)
            .map_err(|_| JobError::usage(format!("invalid session token: {:?}", s)))
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

// ────────────────────────────────────────────────────────────────
// Workspace & image pairs
// ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub inputs: PathBuf,
    pub outputs: PathBuf,
}

/// An uploaded input and, once resolved, its colorized output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImagePair {
    pub input: String,
    pub output: Option<String>,
}

/// Where an upload is staged and where it lands once complete.
#[derive(Debug, Clone)]
pub struct UploadTarget {
    pub name: String,
    pub tmp_path: PathBuf,
    pub final_path: PathBuf,
}

impl UploadTarget {
    pub fn commit(&self) -> Result<(), JobError> {
        fs::rename(&self.tmp_path, &self.final_path)
            .map_err(|err| JobError::io(&self.final_path, err))
    }
}

// ────────────────────────────────────────────────────────────────
// Manager
// ────────────────────────────────────────────────────────────────

pub struct WorkspaceManager {
    base: PathBuf,
    sessions: DashSet<SessionToken>,
}

impl WorkspaceManager {
    pub fn new(base: impl Into<PathBuf>) -> Result<Self, JobError> {
        let base = base.into();
        fs::create_dir_all(&base).map_err(|err| JobError::io(&base, err))?;
        Ok(Self {
            base,
            sessions: DashSet::new(),
        })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Mint and remember a fresh token. No directories are created yet.
    pub fn new_session(&self) -> SessionToken {
        let token = SessionToken::generate();
        self.sessions.insert(token);
        token
    }

    pub fn is_known(&self, token: &SessionToken) -> bool {
        self.sessions.contains(token)
    }

    /// Register a token minted elsewhere. Returns false if it was already known.
    pub fn adopt(&self, token: SessionToken) -> bool {
        self.sessions.insert(token)
    }

    fn root(&self, token: &SessionToken) -> PathBuf {
        self.base.join(token.to_string())
    }

    /// Ensure both directories exist and return them. Idempotent.
    pub fn get_or_create(&self, token: &SessionToken) -> Result<Workspace, JobError> {
        let root = self.root(token);
        let workspace = Workspace {
            inputs: root.join(INPUTS_DIR),
            outputs: root.join(OUTPUTS_DIR),
        };
        for dir in [&workspace.inputs, &workspace.outputs] {
            fs::create_dir_all(dir).map_err(|err| JobError::io(dir, err))?;
        }
        self.sessions.insert(*token);
        Ok(workspace)
    }

    /// Remove the whole workspace tree. A missing tree counts as already clean.
    pub fn destroy(&self, token: &SessionToken) -> Result<(), JobError> {
        let root = self.root(token);
        match fs::remove_dir_all(&root) {
            Ok(()) => info!("Destroyed workspace {:?}", root),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(JobError::io(root, err)),
        }
        self.sessions.remove(token);
        Ok(())
    }

    /// Reserve a sanitized name in the inputs directory for an upload.
    pub fn upload_target(
        &self,
        token: &SessionToken,
        raw_name: &str,
    ) -> Result<UploadTarget, JobError> {
        let name = sanitize_filename(raw_name);
        if name.is_empty() {
            return Err(JobError::usage(format!(
                "unusable upload file name: {:?}",
                raw_name
            )));
        }
        let workspace = self.get_or_create(token)?;
        Ok(UploadTarget {
            tmp_path: workspace
                .inputs
                .join(format!(".{}-{}.tmp", name, Uuid::new_v4())),
            final_path: workspace.inputs.join(&name),
            name,
        })
    }

    /// Store an input read from `reader`; returns the sanitized name.
    ///
    /// Re-uploading an existing name replaces the input but keeps any cached
    /// output, since the cache is keyed by name only.
    pub fn save_input(
        &self,
        token: &SessionToken,
        raw_name: &str,
        mut reader: impl Read,
    ) -> Result<String, JobError> {
        let target = self.upload_target(token, raw_name)?;
        let mut file =
            fs::File::create(&target.tmp_path).map_err(|err| JobError::io(&target.tmp_path, err))?;
        if let Err(err) = io::copy(&mut reader, &mut file) {
            let _ = fs::remove_file(&target.tmp_path);
            return Err(JobError::io(&target.tmp_path, err));
        }
        target.commit()?;
        Ok(target.name)
    }

    /// Inputs sorted by name, each paired with its output when one exists.
    pub fn list_pairs(&self, token: &SessionToken) -> Result<Vec<ImagePair>, JobError> {
        let workspace = self.get_or_create(token)?;
        let mut inputs = visible_files(&workspace.inputs)?;
        inputs.sort();

        Ok(inputs
            .into_iter()
            .map(|input| {
                let candidate = colorized_name(&input);
                let output = workspace
                    .outputs
                    .join(&candidate)
                    .is_file()
                    .then_some(candidate);
                ImagePair { input, output }
            })
            .collect())
    }

    /// Delete an input and its derived output. Either being absent is fine.
    pub fn delete_image(&self, token: &SessionToken, input_name: &str) -> Result<(), JobError> {
        let name = checked_name(input_name)?;
        let workspace = self.get_or_create(token)?;
        remove_if_present(&workspace.inputs.join(name))?;
        remove_if_present(&workspace.outputs.join(colorized_name(name)))?;
        Ok(())
    }

    /// Path of a file inside the caller's own workspace.
    pub fn file_path(
        &self,
        token: &SessionToken,
        kind: &str,
        name: &str,
    ) -> Result<PathBuf, JobError> {
        let name = checked_name(name)?;
        let workspace = self.get_or_create(token)?;
        let dir = match kind {
            INPUTS_DIR => workspace.inputs,
            OUTPUTS_DIR => workspace.outputs,
            other => return Err(JobError::usage(format!("unknown file kind: {:?}", other))),
        };
        Ok(dir.join(name))
    }
}

/// Accept a name only if it is already a single sanitized path component.
pub fn checked_name(name: &str) -> Result<&str, JobError> {
    if name.is_empty() || sanitize_filename(name) != name {
        return Err(JobError::usage(format!("invalid image name: {:?}", name)));
    }
    Ok(name)
}

fn visible_files(dir: &Path) -> Result<Vec<String>, JobError> {
    let entries = fs::read_dir(dir).map_err(|err| JobError::io(dir, err))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| JobError::io(dir, err))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        // staging files are dot-prefixed; sanitized names never are
        if name.starts_with('.') || !entry.path().is_file() {
            continue;
        }
        names.push(name);
    }
    Ok(names)
}

fn remove_if_present(path: &Path) -> Result<(), JobError> {
    match fs::remove_file(path) {
        Ok(()) => {
            info!("Deleted file: {:?}", path);
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(JobError::io(path, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager() -> (TempDir, WorkspaceManager) {
        let temp_dir = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(temp_dir.path().join("sessions")).unwrap();
        (temp_dir, manager)
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let (_tmp, manager) = manager();
        let token = manager.new_session();

        let first = manager.get_or_create(&token).unwrap();
        let second = manager.get_or_create(&token).unwrap();

        assert_eq!(first, second);
        assert!(first.inputs.is_dir());
        assert!(first.outputs.is_dir());
        assert_eq!(
            first.inputs,
            manager.base().join(token.to_string()).join("inputs")
        );
    }

    #[test]
    fn sessions_do_not_see_each_other() {
        let (_tmp, manager) = manager();
        let alice = manager.new_session();
        let bob = manager.new_session();
        assert_ne!(alice, bob);

        manager
            .save_input(&alice, "page.png", &b"alice"[..])
            .unwrap();

        let alice_pairs = manager.list_pairs(&alice).unwrap();
        let bob_pairs = manager.list_pairs(&bob).unwrap();
        assert_eq!(alice_pairs.len(), 1);
        assert!(bob_pairs.is_empty());

        let alice_ws = manager.get_or_create(&alice).unwrap();
        let bob_ws = manager.get_or_create(&bob).unwrap();
        assert!(!bob_ws.inputs.starts_with(alice_ws.inputs.parent().unwrap()));
    }

    #[test]
    fn destroy_is_absorbing() {
        let (_tmp, manager) = manager();
        let token = manager.new_session();
        let workspace = manager.get_or_create(&token).unwrap();
        manager.save_input(&token, "a.jpg", &b"x"[..]).unwrap();

        manager.destroy(&token).unwrap();
        assert!(!workspace.inputs.exists());
        assert!(!manager.is_known(&token));

        manager.destroy(&token).unwrap();
        assert!(!workspace.inputs.exists());
    }

    #[test]
    fn invalid_tokens_are_usage_errors() {
        for raw in ["../etc", "", "not-a-uuid", "00000000-0000-0000-0000"] {
            assert!(matches!(
                raw.parse::<SessionToken>(),
                Err(JobError::Usage(_))
            ));
        }
        let token = SessionToken::generate();
        assert_eq!(token.to_string().parse::<SessionToken>().unwrap(), token);
    }

    #[test]
    fn uploads_are_sanitized_and_listed_in_order() {
        let (_tmp, manager) = manager();
        let token = manager.new_session();

        let name = manager
            .save_input(&token, "../../evil dir/b page.jpg", &b"b"[..])
            .unwrap();
        assert_eq!(name, "evil_dir_b_page.jpg");
        manager.save_input(&token, "a.png", &b"a"[..]).unwrap();

        let workspace = manager.get_or_create(&token).unwrap();
        fs::write(workspace.outputs.join("a_colorized.png"), b"out").unwrap();

        let pairs = manager.list_pairs(&token).unwrap();
        assert_eq!(
            pairs,
            vec![
                ImagePair {
                    input: "a.png".to_string(),
                    output: Some("a_colorized.png".to_string()),
                },
                ImagePair {
                    input: "evil_dir_b_page.jpg".to_string(),
                    output: None,
                },
            ]
        );

        assert!(matches!(
            manager.save_input(&token, "..", &b""[..]),
            Err(JobError::Usage(_))
        ));
    }

    #[test]
    fn delete_removes_input_and_output_and_tolerates_absence() {
        let (_tmp, manager) = manager();
        let token = manager.new_session();
        let workspace = manager.get_or_create(&token).unwrap();
        manager.save_input(&token, "p.jpg", &b"p"[..]).unwrap();
        fs::write(workspace.outputs.join("p_colorized.png"), b"out").unwrap();

        manager.delete_image(&token, "p.jpg").unwrap();
        assert!(!workspace.inputs.join("p.jpg").exists());
        assert!(!workspace.outputs.join("p_colorized.png").exists());

        manager.delete_image(&token, "p.jpg").unwrap();
        assert!(manager.delete_image(&token, "../p.jpg").is_err());
    }

    #[test]
    fn file_path_stays_inside_the_workspace() {
        let (_tmp, manager) = manager();
        let token = manager.new_session();
        let workspace = manager.get_or_create(&token).unwrap();

        assert_eq!(
            manager.file_path(&token, "outputs", "a_colorized.png").unwrap(),
            workspace.outputs.join("a_colorized.png")
        );
        assert!(manager.file_path(&token, "secrets", "a.png").is_err());
        assert!(manager.file_path(&token, "inputs", "../a.png").is_err());
    }
}
