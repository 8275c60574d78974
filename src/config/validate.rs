// src/config/validate.rs

use globset::Glob;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, SdaflowError};
use crate::job::JobType;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = SdaflowError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let last_job_type = parse_last_job_type(&raw)?;
        validate_scheduler(&raw)?;
        validate_workflow(&raw)?;
        Ok(ConfigFile::new_unchecked(raw, last_job_type))
    }
}

fn parse_last_job_type(cfg: &RawConfigFile) -> Result<JobType> {
    cfg.workflow
        .last_job_type
        .parse::<JobType>()
        .map_err(|e| SdaflowError::ConfigError(format!("[workflow].last_job_type: {e}")))
}

fn validate_scheduler(cfg: &RawConfigFile) -> Result<()> {
    if cfg.scheduler.concurrency == 0 {
        return Err(SdaflowError::ConfigError(
            "[scheduler].concurrency must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.scheduler.poll_interval_ms == 0 {
        return Err(SdaflowError::ConfigError(
            "[scheduler].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_workflow(cfg: &RawConfigFile) -> Result<()> {
    let wf = &cfg.workflow;
    Glob::new(&wf.input_pattern).map_err(|e| {
        SdaflowError::ConfigError(format!(
            "[workflow].input_pattern '{}' is not a valid glob: {e}",
            wf.input_pattern
        ))
    })?;

    if wf.analysis_output_stem.trim().is_empty() {
        return Err(SdaflowError::ConfigError(
            "[workflow].analysis_output_stem must not be empty".to_string(),
        ));
    }

    // The store document must survive cleanup of the job directory.
    if let Some(dir) = &cfg.store.directory {
        if dir == &wf.job_directory {
            return Err(SdaflowError::ConfigError(
                "[store].directory must differ from [workflow].job_directory".to_string(),
            ));
        }
    }
    Ok(())
}
