// ABOUTME: Uploads the current module's content unless an equal package can be reused.
// ABOUTME: Asynchronous with a timeout; the extracted archive never outlives the upload.

use async_trait::async_trait;
use std::io::Read;

use super::StepServices;
use crate::cluster::OperationalResultExt;
use crate::context::ExecutionContext;
use crate::context::variables::{
    APP_ARCHIVE_ID, APP_CONTENT_CHANGED, APP_TO_PROCESS, MTA_ARCHIVE_ELEMENTS, SPACE_GUID,
    UPLOAD_TOKEN,
};
use crate::engine::{Step, StepCapabilities, StepError, StepPhase};
use crate::files::archive::{extract_module, module_digest};
use crate::files::{FileError, process_file_content};
use crate::types::{ArchiveId, SpaceId, UploadJobId};
use crate::upload::{
    UploadDecision, UploadDecisionEngine, UploadProgress, UploadToken, progress_channel,
};

/// Extraction feeds an upload that is about to start, so it goes first.
const EXTRACT_PRIORITY: i32 = 10;
const DIGEST_PRIORITY: i32 = 0;

pub struct UploadAppStep {
    services: StepServices,
}

impl UploadAppStep {
    pub fn new(services: StepServices) -> Self {
        Self { services }
    }

    /// Stream the MTA archive through `processor` on the file-storage pool.
    async fn read_archive<T, F>(
        &self,
        space: SpaceId,
        archive: ArchiveId,
        priority: i32,
        processor: F,
    ) -> Result<T, StepError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn Read) -> Result<T, FileError> + Send + 'static,
    {
        let files = self.services.files.clone();
        let task = self.services.pools.file_storage.submit(priority, async move {
            tokio::task::spawn_blocking(move || {
                process_file_content(files.as_ref(), &space, &archive, processor)
            })
            .await
        })?;
        let result = task
            .join()
            .await?
            .map_err(|e| StepError::invariant(format!("archive worker failed: {e}")))?;
        Ok(result?)
    }

    async fn start_upload(
        &self,
        app_name: &str,
        space: SpaceId,
        archive: ArchiveId,
        entry: String,
    ) -> Result<UploadToken, StepError> {
        let max_size = self.services.upload.max_resource_size;
        let file = self
            .read_archive(space, archive, EXTRACT_PRIORITY, move |reader| {
                extract_module(reader, &entry, max_size)
            })
            .await?;

        // From here on `file` is deleted on every early return.
        let (progress, events) = progress_channel();
        let cluster = self.services.cluster.clone();
        let name = app_name.to_string();
        let path = file.to_path_buf();
        let upload = self.services.pools.controller.try_submit(async move {
            cluster.async_upload_application(&name, &path, progress).await
        })?;
        let package = upload.join().await?.context_op("upload", app_name)?;

        let job = UploadJobId::random();
        tracing::info!("uploading application {} as package {}", app_name, package);
        self.services.uploads.register(job.clone(), app_name, file, events);
        Ok(UploadToken::Started { job, package })
    }
}

#[async_trait]
impl Step for UploadAppStep {
    fn name(&self) -> &str {
        "upload-app"
    }

    fn capabilities(&self, ctx: &ExecutionContext) -> StepCapabilities {
        let timeout = ctx
            .get(APP_TO_PROCESS)
            .ok()
            .flatten()
            .and_then(|app| app.upload_timeout)
            .unwrap_or(self.services.upload.timeout);
        StepCapabilities::with_timeout(timeout)
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<StepPhase, StepError> {
        let app_to_process = ctx.require(APP_TO_PROCESS)?;
        let elements = ctx.require(MTA_ARCHIVE_ELEMENTS)?;
        let Some(entry) = elements
            .module_file_name(&app_to_process.module_name)
            .map(str::to_string)
        else {
            tracing::info!(
                "module {} has no content to upload",
                app_to_process.module_name
            );
            ctx.set(APP_CONTENT_CHANGED, &false)?;
            return Ok(StepPhase::Done);
        };
        let space = ctx.require(SPACE_GUID)?;
        let archive = ctx.require(APP_ARCHIVE_ID)?;

        let app = self
            .services
            .cluster
            .get_application(&app_to_process.name)
            .await
            .context_op("get", &app_to_process.name)?;

        let max_size = self.services.upload.max_resource_size;
        let digest = {
            let entry = entry.clone();
            self.read_archive(space.clone(), archive.clone(), DIGEST_PRIORITY, move |reader| {
                module_digest(reader, &entry, max_size)
            })
            .await?
        };
        tracing::debug!(app = %app.name, %digest, "computed module digest");

        let decision =
            UploadDecisionEngine::new(self.services.cluster.as_ref(), &self.services.diagnostics)
                .decide(&app, &digest)
                .await?;

        match decision {
            UploadDecision::Skip => {
                ctx.set(APP_CONTENT_CHANGED, &false)?;
                Ok(StepPhase::Done)
            }
            UploadDecision::Reuse(package) => {
                ctx.set(APP_CONTENT_CHANGED, &false)?;
                ctx.set(
                    UPLOAD_TOKEN,
                    &UploadToken::Reused {
                        package: package.guid,
                    },
                )?;
                Ok(StepPhase::Poll)
            }
            UploadDecision::Upload { content_changed } => {
                ctx.set(APP_CONTENT_CHANGED, &content_changed)?;
                let token = self.start_upload(&app.name, space, archive, entry).await?;
                ctx.set(UPLOAD_TOKEN, &token)?;
                Ok(StepPhase::Poll)
            }
        }
    }

    async fn poll_status(&self, ctx: &mut ExecutionContext) -> Result<StepPhase, StepError> {
        let token = ctx.require(UPLOAD_TOKEN)?;
        let app = ctx.require(APP_TO_PROCESS)?;

        if let Some(job) = token.job()
            && let UploadProgress::Failed(message) = self.services.uploads.drain(job)
        {
            return Err(StepError::UploadFailed(format!("{}: {message}", app.name)));
        }

        let package = self
            .services
            .cluster
            .get_package(token.package())
            .await
            .context_op("get package", &app.name)?;

        if package.status.is_ready() {
            if let Some(job) = token.job() {
                self.services.uploads.release(job);
            }
            tracing::info!("application {} uploaded (package {})", app.name, package.guid);
            Ok(StepPhase::Done)
        } else if package.status.is_failed() {
            Err(StepError::UploadFailed(format!(
                "package {} of application {} is {}",
                package.guid, app.name, package.status
            )))
        } else {
            tracing::debug!(app = %app.name, status = %package.status, "upload in progress");
            Ok(StepPhase::Poll)
        }
    }

    async fn release_resources(&self, ctx: &mut ExecutionContext) {
        if let Ok(Some(token)) = ctx.get(UPLOAD_TOKEN)
            && let Some(job) = token.job()
        {
            self.services.uploads.release(job);
        }
    }

    fn error_message(&self) -> String {
        "Error uploading application".to_string()
    }
}
