use log::{error, info, warn};

use crate::config::LauncherConfig;
use crate::engine::state::{FailurePrompt, LaunchFailure, Phase, RetryChoice};
use crate::networking::NetworkClient;
use crate::process::ProcessLauncher;
use crate::storage::PackageStore;
use crate::updater;

pub mod state;

pub type PhaseCallback<'a> = Option<&'a mut (dyn FnMut(Phase) + Send)>;

/// How a run ended: some package ran to completion, or the operator gave up
/// with nothing on disk to fall back to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LaunchOutcome {
    Launched { filename: String, exit_code: i32 },
    Aborted { failure: LaunchFailure },
}

pub struct LauncherEngine {
    config: LauncherConfig,
    networking: NetworkClient,
    storage: PackageStore,
    process: ProcessLauncher,
}

impl LauncherEngine {
    pub fn new(config: LauncherConfig) -> Self {
        let networking = NetworkClient::new();
        let storage = PackageStore::new(config.install_dir.clone(), config.pattern());
        let process = ProcessLauncher::new(config.runner.clone());
        Self {
            config,
            networking,
            storage,
            process,
        }
    }

    /// Update-then-launch under the operator-mediated retry loop. Fetch,
    /// download and launch failures are treated alike: the prompt decides
    /// between another full attempt and falling back to the newest package
    /// already on disk. With no fallback available the run ends as Aborted.
    ///
    /// # Errors
    /// Returns an error string only when the fallback launch itself fails;
    /// everything before that is routed through the prompt.
    pub async fn run(
        &self,
        args: &[String],
        prompt: &dyn FailurePrompt,
        mut phases: PhaseCallback<'_>,
    ) -> Result<LaunchOutcome, String> {
        loop {
            match self.attempt(args, &mut phases).await {
                Ok(outcome) => {
                    emit(&mut phases, Phase::Done);
                    return Ok(outcome);
                }
                Err(failure) => {
                    error!("run: attempt failed: {failure}");
                    emit(&mut phases, Phase::PromptingOnError);
                    match prompt.decide(&failure) {
                        RetryChoice::Retry => {
                            info!("run: operator chose to retry");
                        }
                        RetryChoice::Cancel => {
                            warn!("run: operator gave up on updating");
                            let outcome = self.fall_back(args, &mut phases, failure)?;
                            emit(&mut phases, Phase::Done);
                            return Ok(outcome);
                        }
                    }
                }
            }
        }
    }

    async fn attempt(
        &self,
        args: &[String],
        phases: &mut PhaseCallback<'_>,
    ) -> Result<LaunchOutcome, LaunchFailure> {
        emit(phases, Phase::Checking);
        let filename = updater::ensure_latest_downloaded(
            &self.networking,
            &self.storage,
            &self.config,
            |phase| emit(phases, phase),
        )
        .await?;
        self.launch_package(filename, args, phases)
            .map_err(LaunchFailure::Launch)
    }

    /// Launches the newest package already on disk, skipping any further
    /// update attempt. Taken when the operator answers Cancel.
    fn fall_back(
        &self,
        args: &[String],
        phases: &mut PhaseCallback<'_>,
        failure: LaunchFailure,
    ) -> Result<LaunchOutcome, String> {
        let Some(filename) = self.storage.latest_local_filename() else {
            error!("fallback: no package on disk, nothing to launch");
            return Ok(LaunchOutcome::Aborted { failure });
        };
        info!("fallback: launching previously downloaded {filename}");
        self.launch_package(filename, args, phases)
            .map_err(|err| format!("fallback launch failed: {err}"))
    }

    fn launch_package(
        &self,
        filename: String,
        args: &[String],
        phases: &mut PhaseCallback<'_>,
    ) -> Result<LaunchOutcome, String> {
        emit(
            phases,
            Phase::Launching {
                file: filename.clone(),
            },
        );
        let package = self.storage.package_path(&filename);
        let exit_code = self.process.launch(&package, args, self.storage.dir())?;
        Ok(LaunchOutcome::Launched {
            filename,
            exit_code,
        })
    }
}

fn emit(cb: &mut PhaseCallback<'_>, phase: Phase) {
    if let Some(callback) = cb.as_deref_mut() {
        callback(phase);
    }
}
