//! Session operations behind the request surface: submit, list, colorize,
//! delete, end. Each call resolves the caller's own workspace first.

use log::info;
use std::io::Read;
use std::path::PathBuf;

use super::job::{JobOutcome, Orchestrator};
use crate::common::errors::JobError;
use crate::config::ColorizeConfig;
use crate::workspace::{ImagePair, SessionToken, UploadTarget, WorkspaceManager, checked_name};

pub struct SessionService {
    workspaces: WorkspaceManager,
    orchestrator: Orchestrator,
    config: ColorizeConfig,
}

impl SessionService {
    pub fn new(
        workspaces: WorkspaceManager,
        orchestrator: Orchestrator,
        config: ColorizeConfig,
    ) -> Self {
        Self {
            workspaces,
            orchestrator,
            config,
        }
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Resolve the token a client presented, or mint one on first contact.
    pub fn open(&self, presented: Option<&str>) -> SessionToken {
        match presented.map(str::parse::<SessionToken>) {
            Some(Ok(token)) => {
                if !self.workspaces.is_known(&token) {
                    // issued before a restart, or by another instance
                    info!("Resuming session {} not issued by this process", token);
                    self.workspaces.adopt(token);
                }
                token
            }
            _ => self.workspaces.new_session(),
        }
    }

    pub fn submit(
        &self,
        token: &SessionToken,
        raw_name: &str,
        reader: impl Read,
    ) -> Result<String, JobError> {
        self.workspaces.save_input(token, raw_name, reader)
    }

    pub fn upload_target(
        &self,
        token: &SessionToken,
        raw_name: &str,
    ) -> Result<UploadTarget, JobError> {
        self.workspaces.upload_target(token, raw_name)
    }

    pub fn images(&self, token: &SessionToken) -> Result<Vec<ImagePair>, JobError> {
        self.workspaces.list_pairs(token)
    }

    /// Colorize a named input of this session. Idempotent.
    pub fn colorize(&self, token: &SessionToken, input_name: &str) -> Result<JobOutcome, JobError> {
        let name = checked_name(input_name)?;
        let workspace = self.workspaces.get_or_create(token)?;
        self.orchestrator.ensure_colorized_from(
            &workspace.inputs.join(name),
            &workspace.outputs,
            name,
            &self.config,
        )
    }

    pub fn delete(&self, token: &SessionToken, input_name: &str) -> Result<(), JobError> {
        self.workspaces.delete_image(token, input_name)
    }

    pub fn end(&self, token: &SessionToken) -> Result<(), JobError> {
        self.workspaces.destroy(token)
    }

    pub fn file(&self, token: &SessionToken, kind: &str, name: &str) -> Result<PathBuf, JobError> {
        self.workspaces.file_path(token, kind, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::testing::{FakeColorizer, png_bytes};
    use crate::config::MonitorSettings;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    fn service() -> (TempDir, SessionService, Arc<AtomicUsize>) {
        let tmp = TempDir::new().unwrap();
        let (fake, calls) = FakeColorizer::new();
        let orchestrator = Orchestrator::new(
            Box::new(fake),
            MonitorSettings {
                sample_interval: Duration::from_millis(5),
                ..MonitorSettings::default()
            },
        );
        let workspaces = WorkspaceManager::new(tmp.path().join("sessions")).unwrap();
        let service = SessionService::new(workspaces, orchestrator, ColorizeConfig::default());
        (tmp, service, calls)
    }

    #[test]
    fn open_reuses_valid_tokens_and_mints_otherwise() {
        let (_tmp, service, _) = service();
        let token = service.open(None);
        assert_eq!(service.open(Some(&token.to_string())), token);
        assert_ne!(service.open(Some("../../etc")), token);
    }

    #[test]
    fn open_adopts_tokens_from_a_previous_run() {
        let (_tmp, service, _) = service();
        let earlier = SessionToken::generate();
        assert!(!service.workspaces().is_known(&earlier));

        assert_eq!(service.open(Some(&earlier.to_string())), earlier);
        assert!(service.workspaces().is_known(&earlier));
    }

    #[test]
    fn full_session_lifecycle() {
        let (_tmp, service, calls) = service();
        let token = service.open(None);

        let name = service
            .submit(&token, "page one.jpg", png_bytes().as_slice())
            .unwrap();
        assert_eq!(name, "page_one.jpg");

        let first = service.colorize(&token, &name).unwrap();
        let second = service.colorize(&token, &name).unwrap();
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.output_path, second.output_path);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let pairs = service.images(&token).unwrap();
        assert_eq!(pairs[0].output.as_deref(), Some("page_one_colorized.png"));

        service.delete(&token, &name).unwrap();
        assert!(service.images(&token).unwrap().is_empty());
        assert!(!first.output_path.exists());

        service.end(&token).unwrap();
        service.end(&token).unwrap();
        assert!(!service.workspaces().base().join(token.to_string()).exists());
    }

    #[test]
    fn colorize_rejects_path_like_names() {
        let (_tmp, service, _) = service();
        let token = service.open(None);
        assert!(matches!(
            service.colorize(&token, "../other/page.png"),
            Err(JobError::Usage(_))
        ));
        assert!(matches!(
            service.colorize(&token, "missing.png"),
            Err(JobError::SourceNotFound(_))
        ));
    }
}
