use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use updraft_core::protocol::{parse_artifact_catalog, ParseContext};
use updraft_core::{
    AppRelease, Architecture, ArtifactCatalog, HostState, LauncherRelease, PlainVersion,
    RuntimeVersion, Task, TransferError, UpdateOutcome, UpdateStatus,
};
use updraft_registry::{LocalSource, RemoteSource, UpdateSite};
use updraft_resolver::{resolve_platform_plan, PlatformPlan, PlatformTarget};

use crate::fs_utils::{find_read_only_entry, move_path, remove_path_if_exists};
use crate::runtime::checked_file_name;
use crate::{
    stage_launcher, stage_runtime, transfer_release, InstallLayout, Interaction, OperationGuard,
    PlatformConfig, RecoveryScript, ScriptCommand, SectionKind, TransferOutcome, TransferPlan,
    TransferSummary, UpdateError,
};

const CATALOG_SLICE: f64 = 0.01;
const TRANSFER_SLICE_END: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    CheckingCatalog,
    UpToDate,
    AwaitingSelection,
    PreparingDestination,
    ResolvingRuntime,
    TransferringFiles,
    WritingRecoveryScript,
    RelocatingRuntime,
    MutatingPlatformConfig,
    Completed,
    Aborted,
    Failed,
}

impl EngineState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::CheckingCatalog => "checking-catalog",
            Self::UpToDate => "up-to-date",
            Self::AwaitingSelection => "awaiting-selection",
            Self::PreparingDestination => "preparing-destination",
            Self::ResolvingRuntime => "resolving-runtime",
            Self::TransferringFiles => "transferring-files",
            Self::WritingRecoveryScript => "writing-recovery-script",
            Self::RelocatingRuntime => "relocating-runtime",
            Self::MutatingPlatformConfig => "mutating-platform-config",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedUpdate {
    pub release: AppRelease,
    pub transfer: TransferSummary,
    pub runtime: Option<RuntimeVersion>,
    pub launcher: Option<PlainVersion>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    UpToDate,
    /// The user declined a release or the discard of a stale update.
    Declined,
    Cancelled,
    /// Staged and configured; live after the next restart.
    Applied(AppliedUpdate),
}

type StateObserver = Box<dyn FnMut(EngineState) + Send>;

/// Artifacts placed outside `delta/` during an apply, removed again if
/// the apply fails afterwards.
#[derive(Debug, Default)]
pub(crate) struct Relocated {
    pub(crate) runtime: Option<PathBuf>,
    pub(crate) launcher: Option<PathBuf>,
}

impl Relocated {
    /// Removes every relocated artifact and describes the ones left behind.
    pub(crate) fn remove(&self) -> Vec<String> {
        let mut leftovers = Vec::new();
        for path in self.runtime.iter().chain(self.launcher.iter()) {
            if let Err(err) = remove_path_if_exists(path) {
                tracing::warn!(
                    path = %path.display(),
                    "failed to remove relocated artifact: {err}"
                );
                leftovers.push(format!("{} is still present ({err})", path.display()));
            }
        }
        leftovers
    }
}

/// Folds rollback leftovers into the error that triggered the rollback.
pub(crate) fn escalate(err: UpdateError, leftovers: Vec<String>) -> UpdateError {
    if leftovers.is_empty() {
        err
    } else {
        UpdateError::Unstable(format!("{err}; {}", leftovers.join("; ")))
    }
}

/// Drives the check and apply sequence for one installation.
pub struct UpdateEngine {
    layout: InstallLayout,
    site: UpdateSite,
    host: HostState,
    platform: Box<dyn PlatformConfig + Send>,
    ui: Box<dyn Interaction + Send>,
    architecture: Architecture,
    state: EngineState,
    observer: Option<StateObserver>,
}

impl UpdateEngine {
    pub fn new(
        layout: InstallLayout,
        site: UpdateSite,
        host: HostState,
        platform: Box<dyn PlatformConfig + Send>,
        ui: Box<dyn Interaction + Send>,
    ) -> Self {
        Self {
            layout,
            site,
            host,
            platform,
            ui,
            architecture: Architecture::current(),
            state: EngineState::Idle,
            observer: None,
        }
    }

    pub fn with_architecture(mut self, architecture: Architecture) -> Self {
        self.architecture = architecture;
        self
    }

    pub fn with_observer(mut self, observer: impl FnMut(EngineState) + Send + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    fn transition(&mut self, next: EngineState) {
        tracing::info!(from = %self.state, to = %next, "update state");
        self.state = next;
        if let Some(observer) = self.observer.as_mut() {
            observer(next);
        }
    }

    fn parse_context(&self) -> ParseContext {
        ParseContext::new(self.site.app_catalog_url())
            .with_launcher_version(self.host.launcher_version.clone())
    }

    fn target(&self) -> PlatformTarget {
        PlatformTarget {
            architecture: self.architecture,
            platform: self.layout.platform(),
            runtime_version: self.host.runtime_version.clone(),
            launcher_version: self.host.launcher_version.clone(),
            runtime_external: self.host.runtime_external,
        }
    }

    pub fn installed_release(&self) -> Result<Option<AppRelease>, UpdateError> {
        let path = self.platform.config_file();
        crate::read_installed_release(&path).map_err(|err| UpdateError::io(path, err))
    }

    /// Published releases, oldest first.
    pub fn list_releases(&self) -> Result<Vec<AppRelease>, UpdateError> {
        let mut releases = self.site.fetch_app_releases(&self.parse_context())?;
        AppRelease::sort_by_build_time(&mut releases);
        Ok(releases)
    }

    /// Whether the newest published release is the installed one. Never
    /// prompts; failures are reported in the status.
    pub fn check_status(&mut self) -> UpdateStatus {
        match self.check_status_inner() {
            Ok(up_to_date) => UpdateStatus::UpToDate(up_to_date),
            Err(err) => {
                tracing::warn!("status check failed: {err}");
                UpdateStatus::Error(err.to_string())
            }
        }
    }

    fn check_status_inner(&mut self) -> Result<bool, UpdateError> {
        let _guard = OperationGuard::claim(&self.layout, "check")?;
        self.transition(EngineState::CheckingCatalog);
        let installed = self.installed_release()?.ok_or_else(|| {
            UpdateError::Refused("the installed release is unknown".to_string())
        })?;
        let releases = self.list_releases()?;
        let up_to_date = AppRelease::newest(&releases).is_some_and(|newest| *newest == installed);
        self.transition(if up_to_date {
            EngineState::UpToDate
        } else {
            EngineState::Idle
        });
        Ok(up_to_date)
    }

    /// Runs one full check-and-apply. Every failure is also reported
    /// through [`Interaction::notify`].
    pub fn run_update(&mut self, task: &Task) -> Result<ApplyOutcome, UpdateError> {
        let result = self.run_update_inner(task);
        if let Err(err) = &result {
            if !matches!(self.state, EngineState::Aborted | EngineState::Failed) {
                self.transition(EngineState::Failed);
            }
            self.ui.notify("Update failed", &err.to_string());
        }
        result
    }

    fn run_update_inner(&mut self, task: &Task) -> Result<ApplyOutcome, UpdateError> {
        self.transition(EngineState::CheckingCatalog);
        if self.host.developer_mode {
            self.transition(EngineState::Aborted);
            return Err(UpdateError::Refused(
                "updates are disabled in developer mode".to_string(),
            ));
        }
        let Some(installed) = self.installed_release()? else {
            self.transition(EngineState::Aborted);
            return Err(UpdateError::Refused(
                "the installed release is unknown; reinstall the application".to_string(),
            ));
        };
        let _guard = OperationGuard::claim(&self.layout, "update")?;

        let catalog_task = task.sub_task(0.0, CATALOG_SLICE);
        let releases = self.list_releases()?;
        catalog_task.set_progress(1.0);

        if let [only] = releases.as_slice() {
            if *only == installed {
                self.transition(EngineState::UpToDate);
                self.ui.notify(
                    "No updates available",
                    &format!("{installed} is the only published release."),
                );
                return Ok(ApplyOutcome::UpToDate);
            }
        }

        self.transition(EngineState::AwaitingSelection);
        let Some(release) = self.ui.choose_release(&releases, &installed) else {
            self.transition(EngineState::Aborted);
            return Ok(ApplyOutcome::Declined);
        };
        tracing::info!(release = %release, installed = %installed, "release selected");

        self.transition(EngineState::PreparingDestination);
        if let Some(read_only) = find_read_only_entry(self.layout.root())
            .map_err(|err| UpdateError::io(self.layout.root(), err))?
        {
            self.transition(EngineState::Aborted);
            return Err(UpdateError::NotWritable(read_only));
        }
        if self.layout.delta_dir().exists() {
            if !self.ui.confirm_discard_stale_delta() {
                self.transition(EngineState::Aborted);
                return Ok(ApplyOutcome::Declined);
            }
            self.discard_delta()?;
        }
        let delta_app = self.layout.delta_app_dir();
        fs::create_dir_all(&delta_app).map_err(|err| UpdateError::io(&delta_app, err))?;

        let main = task.sub_task(CATALOG_SLICE, TRANSFER_SLICE_END);
        match self.stage_release(&release, &main) {
            Ok(Some(staged)) => self.apply_staged(release, staged),
            Ok(None) => {
                self.clean_delta();
                self.transition(EngineState::Aborted);
                self.ui
                    .notify("Update cancelled", "No changes were made to the application.");
                Ok(ApplyOutcome::Cancelled)
            }
            Err(err) => {
                self.clean_delta();
                self.transition(EngineState::Failed);
                Err(err)
            }
        }
    }

    /// Fetches everything the release needs into `delta/`. `None` means
    /// the task was cancelled.
    fn stage_release(
        &mut self,
        release: &AppRelease,
        task: &Task,
    ) -> Result<Option<StagedRelease>, UpdateError> {
        let ctx = self.parse_context();
        let remote = self.site.fetch_release_catalog(release, &ctx)?;

        let mut plan = PlatformPlan::default();
        if remote.runtime_window().is_some() {
            self.transition(EngineState::ResolvingRuntime);
            let site = &self.site;
            plan = resolve_platform_plan(
                &remote,
                &self.target(),
                || site.fetch_runtime_releases(&ctx),
                || site.fetch_launcher_releases(&ctx),
            )?;
        }
        let planned_names = plan.runtime.iter().map(|runtime| runtime.file_name.as_str());
        for name in planned_names.chain(plan.launcher.iter().map(|l| l.file_name.as_str())) {
            checked_file_name(name)?;
        }
        let runtime = plan
            .runtime
            .clone()
            .filter(|runtime| !self.layout.runtime_dir(&runtime.version).exists());
        let launcher = plan.launcher.clone().filter(|launcher| {
            !self
                .layout
                .root()
                .join(self.layout.launcher_rel_path(&launcher.file_name))
                .exists()
        });

        self.transition(EngineState::TransferringFiles);
        let extra_bytes = runtime.as_ref().map_or(0, |r| r.length)
            + launcher.as_ref().map_or(0, |l| l.length);
        let local = self.load_installed_catalog();
        let local_source = LocalSource::new(self.layout.app_dir());
        let remote_source = RemoteSource::new(&self.site, release);
        let transfer = TransferPlan {
            local: &local,
            remote: &remote,
            local_source: &local_source,
            remote_source: &remote_source,
            destination: self.layout.delta_app_dir(),
            extra_bytes,
        };
        let total = transfer.total_bytes().max(1) as f64;
        let summary = match transfer_release(&transfer, task)? {
            TransferOutcome::Completed(summary) => summary,
            TransferOutcome::Cancelled => return Ok(None),
        };
        task.log(format!(
            "Reused {} files, fetched {} files",
            summary.reused.len(),
            summary.fetched.len()
        ));

        let catalog_dest = self.layout.delta_app_dir().join(crate::CATALOG_FILE);
        self.site.download(
            &self.site.release_catalog_url(release),
            &catalog_dest,
            None,
            &task.silent(),
        )?;

        let mut done = remote.total_file_bytes();
        let mut staged_runtime = None;
        if let Some(runtime) = &runtime {
            let lo = done as f64 / total;
            done += runtime.length;
            let result = stage_runtime(
                &self.site,
                &self.layout,
                runtime,
                &task.sub_task(lo, done as f64 / total),
            );
            match result {
                Ok(path) => staged_runtime = Some((runtime.version.clone(), path)),
                Err(TransferError::Cancelled) => return Ok(None),
                Err(err) => return Err(err.into()),
            }
        }
        let mut staged_launcher = None;
        if let Some(launcher) = &launcher {
            let lo = done as f64 / total;
            done += launcher.length;
            let result = stage_launcher(
                &self.site,
                &self.layout,
                launcher,
                &task.sub_task(lo, done as f64 / total),
            );
            match result {
                Ok(path) => staged_launcher = Some((launcher.clone(), path)),
                Err(TransferError::Cancelled) => return Ok(None),
                Err(err) => return Err(err.into()),
            }
        }
        if !task.is_active() {
            return Ok(None);
        }
        task.set_progress(1.0);

        Ok(Some(StagedRelease {
            summary,
            plan,
            staged_runtime,
            staged_launcher,
        }))
    }

    fn apply_staged(
        &mut self,
        release: AppRelease,
        staged: StagedRelease,
    ) -> Result<ApplyOutcome, UpdateError> {
        self.transition(EngineState::WritingRecoveryScript);
        let config_file = self.platform.config_file();
        let backup = self.layout.config_backup_path(&config_file);
        let script = match self.recovery_script(&config_file, &backup, &staged) {
            Ok(script) => script,
            Err(err) => {
                self.clean_delta();
                self.transition(EngineState::Failed);
                return Err(err);
            }
        };
        if let Err(err) = script.write(&self.layout.script_path()) {
            self.clean_delta();
            self.transition(EngineState::Failed);
            return Err(err.into());
        }

        let mut relocated = Relocated::default();
        if staged.staged_runtime.is_some() || staged.staged_launcher.is_some() {
            self.transition(EngineState::RelocatingRuntime);
            if let Err(err) = self.relocate(&staged, &mut relocated) {
                let leftovers = relocated.remove();
                self.clean_delta();
                self.transition(EngineState::Failed);
                return Err(escalate(err, leftovers));
            }
        }

        self.transition(EngineState::MutatingPlatformConfig);
        if let Err(err) = fs::copy(&config_file, &backup) {
            let leftovers = relocated.remove();
            self.clean_delta();
            self.transition(EngineState::Failed);
            return Err(escalate(UpdateError::io(&backup, err), leftovers));
        }
        if let Err(err) = self.mutate_config(&release, &staged) {
            tracing::error!("platform configuration failed, restoring backup: {err}");
            let mut leftovers = relocated.remove();
            if let Err(restore_err) = fs::copy(&backup, &config_file) {
                leftovers.push(format!(
                    "restoring {} also failed: {restore_err}",
                    config_file.display()
                ));
            }
            self.clean_delta();
            self.transition(EngineState::Failed);
            return Err(escalate(err.into(), leftovers));
        }

        self.transition(EngineState::Completed);
        let applied = AppliedUpdate {
            release,
            transfer: staged.summary,
            runtime: staged.plan.runtime.map(|runtime| runtime.version),
            launcher: staged.plan.launcher.map(|launcher| launcher.version),
        };
        let mut message = format!(
            "{} will be installed the next time the application starts.",
            applied.release
        );
        if let (Some(runtime), Some(change)) = (&applied.runtime, staged.plan.change) {
            message.push_str(&format!(" The runtime will be {} to {runtime}.", change.as_str()));
        }
        self.ui.notify("Update ready", &message);
        Ok(ApplyOutcome::Applied(applied))
    }

    fn recovery_script(
        &self,
        config_file: &Path,
        backup: &Path,
        staged: &StagedRelease,
    ) -> Result<RecoveryScript, UpdateError> {
        let relative = |path: &Path| {
            self.layout.relative(path).ok_or_else(|| {
                UpdateError::Refused(format!(
                    "{} lies outside the install root {}",
                    path.display(),
                    self.layout.root().display()
                ))
            })
        };

        let mut script = RecoveryScript::new();
        script.push(
            SectionKind::Fail,
            ScriptCommand::Copy(relative(backup)?, relative(config_file)?),
        )?;
        if let Some((version, _)) = &staged.staged_runtime {
            script.push(
                SectionKind::Fail,
                ScriptCommand::Reboot(Box::new(ScriptCommand::Trash(
                    self.layout.runtime_rel_path(version),
                ))),
            )?;
            if let Some(current) = &self.host.runtime_version {
                if current != version && self.layout.runtime_dir(current).exists() {
                    script.push(
                        SectionKind::Pass,
                        ScriptCommand::Trash(self.layout.runtime_rel_path(current)),
                    )?;
                }
            }
        }
        if let Some((launcher, _)) = &staged.staged_launcher {
            script.push(
                SectionKind::Fail,
                ScriptCommand::Reboot(Box::new(ScriptCommand::Trash(
                    self.layout.launcher_rel_path(&launcher.file_name),
                ))),
            )?;
        }
        Ok(script)
    }

    fn relocate(
        &self,
        staged: &StagedRelease,
        relocated: &mut Relocated,
    ) -> Result<(), UpdateError> {
        if let Some((version, path)) = &staged.staged_runtime {
            let target = self.layout.runtime_dir(version);
            move_path(path, &target).map_err(|err| UpdateError::io(&target, err))?;
            relocated.runtime = Some(target);
        }
        if let Some((launcher, path)) = &staged.staged_launcher {
            let target = self
                .layout
                .root()
                .join(self.layout.launcher_rel_path(&launcher.file_name));
            move_path(path, &target).map_err(|err| UpdateError::io(&target, err))?;
            relocated.launcher = Some(target);
        }
        Ok(())
    }

    fn mutate_config(
        &self,
        release: &AppRelease,
        staged: &StagedRelease,
    ) -> Result<(), updraft_core::ConfigMutationError> {
        self.platform.apply_release_metadata(release)?;
        if let Some(runtime) = &staged.plan.runtime {
            self.platform.set_runtime_version(&runtime.version)?;
        }
        if let Some(launcher) = &staged.plan.launcher {
            self.platform.set_launcher(launcher)?;
        }
        Ok(())
    }

    fn load_installed_catalog(&self) -> ArtifactCatalog {
        let path = self.layout.installed_catalog_path();
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), "cannot read installed catalog: {err}");
                }
                return ArtifactCatalog::new();
            }
        };
        let ctx = ParseContext::new(path.display().to_string())
            .with_launcher_version(self.host.launcher_version.clone());
        parse_artifact_catalog(BufReader::new(file), &ctx).unwrap_or_else(|err| {
            tracing::warn!("ignoring installed catalog: {err}");
            ArtifactCatalog::new()
        })
    }

    fn clean_delta(&self) {
        let delta = self.layout.delta_dir();
        if let Err(err) = remove_path_if_exists(&delta) {
            tracing::warn!(path = %delta.display(), "failed to remove staging directory: {err}");
        }
    }

    /// Runs the `fail` section of a pending update and deletes `delta/`.
    fn discard_delta(&self) -> Result<(), UpdateError> {
        self.run_recovery(SectionKind::Fail)?;
        let delta = self.layout.delta_dir();
        remove_path_if_exists(&delta).map_err(|err| UpdateError::io(&delta, err))?;
        Ok(())
    }

    fn run_recovery(&self, kind: SectionKind) -> Result<(), UpdateError> {
        match RecoveryScript::load(&self.layout.script_path())? {
            Some(script) => {
                let report = script.run_section(kind, self.layout.root())?;
                tracing::info!(
                    section = %kind,
                    executed = report.executed.len(),
                    skipped = report.skipped.len(),
                    "recovery section finished"
                );
            }
            None => tracing::debug!(section = %kind, "no recovery script present"),
        }
        Ok(())
    }

    /// Discards a staged update that has not gone live yet. Returns
    /// `false` when there is nothing to revert.
    pub fn revert_update(&mut self) -> Result<bool, UpdateError> {
        let _guard = OperationGuard::claim(&self.layout, "revert")?;
        if !self.layout.delta_dir().exists() {
            return Ok(false);
        }
        if let Err(err) = self.discard_delta() {
            self.ui.notify("Revert failed", &err.to_string());
            return Err(err);
        }
        self.transition(EngineState::Idle);
        self.ui
            .notify("Update reverted", "The pending update has been discarded.");
        Ok(true)
    }

    /// Acts on the outcome the launcher reported for the previous update.
    pub fn handle_startup(&mut self) -> Result<UpdateOutcome, UpdateError> {
        let outcome = self.host.outcome;
        let section = match outcome {
            UpdateOutcome::None => return Ok(outcome),
            UpdateOutcome::Passed => SectionKind::Pass,
            UpdateOutcome::Failed => SectionKind::Fail,
        };
        let _guard = OperationGuard::claim(&self.layout, "startup")?;
        if let Err(err) = self.run_recovery(section) {
            self.ui.notify("Update cleanup failed", &err.to_string());
            return Err(err);
        }
        let delta = self.layout.delta_dir();
        remove_path_if_exists(&delta).map_err(|err| UpdateError::io(&delta, err))?;

        match outcome {
            UpdateOutcome::Passed => {
                let installed = self
                    .installed_release()
                    .ok()
                    .flatten()
                    .map(|release| release.to_string())
                    .unwrap_or_else(|| "The new release".to_string());
                self.ui
                    .notify("Update installed", &format!("{installed} is now running."));
            }
            _ => {
                let detail = self
                    .host
                    .outcome_message
                    .clone()
                    .unwrap_or_else(|| "no details were reported".to_string());
                self.ui.notify(
                    "Update failed",
                    &format!("The previous release has been restored ({detail})."),
                );
            }
        }
        Ok(outcome)
    }
}

struct StagedRelease {
    summary: TransferSummary,
    plan: PlatformPlan,
    staged_runtime: Option<(RuntimeVersion, PathBuf)>,
    staged_launcher: Option<(LauncherRelease, PathBuf)>,
}

/// Runs [`UpdateEngine::run_update`] on a dedicated worker thread. The
/// engine, and with it its [`Interaction`], is dropped when the run ends.
pub fn spawn_update_worker(
    mut engine: UpdateEngine,
    task: Task,
) -> io::Result<JoinHandle<Result<ApplyOutcome, UpdateError>>> {
    thread::Builder::new()
        .name("updraft-worker".to_string())
        .spawn(move || engine.run_update(&task))
}
