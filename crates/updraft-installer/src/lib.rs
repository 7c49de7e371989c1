mod engine;
mod error;
mod fs_utils;
mod guard;
mod interact;
mod layout;
mod platform;
mod runtime;
mod script;
mod transfer;

pub use engine::{spawn_update_worker, AppliedUpdate, ApplyOutcome, EngineState, UpdateEngine};
pub use error::{ScriptError, UpdateError};
pub use guard::OperationGuard;
pub use interact::{
    interaction_channel, serve_interaction, ChannelInteraction, DecisionRequest, Interaction,
};
pub use layout::{
    InstallLayout, APP_DIR, CATALOG_FILE, CONFIG_FILE, DELTA_DIR, LAUNCHER_DIR, SCRIPT_FILE,
};
pub use platform::{read_installed_release, AppCfgPlatform, AppConfig, PlatformConfig};
pub use runtime::{stage_launcher, stage_runtime, unpack_runtime};
pub use script::{RecoveryScript, ScriptCommand, SectionKind, SectionReport};
pub use transfer::{transfer_release, TransferOutcome, TransferPlan, TransferSummary};
