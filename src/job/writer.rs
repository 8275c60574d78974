// src/job/writer.rs

//! Job description files.
//!
//! Each job owns a JSON file in the CWL input-object layout that the external
//! tool consumes. Files are written through the [`FileSystem`] abstraction so
//! generation can be exercised against [`crate::fs::mock::MockFileSystem`].

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Value, json};

use crate::fs::FileSystem;
use crate::job::{Job, JobPayload};

/// Sidecar files that travel with every `.shp` input.
const SHAPEFILE_SIDECARS: [&str; 3] = ["shx", "dbf", "prj"];

/// Serialises job payloads into description files.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobWriter;

impl JobWriter {
    /// Render the description document for `job`.
    ///
    /// Jobs without a payload produce an empty object.
    pub fn render(job: &Job) -> Value {
        let Some(payload) = &job.payload else {
            return json!({});
        };

        match payload {
            JobPayload::Filter { input, config } => json!({
                "shpFile": as_file(input),
                "config": as_file(config),
            }),
            JobPayload::Neighbours {
                primary_input,
                additional_input,
                config,
            } => json!({
                "primaryInput": as_file(primary_input),
                "additionalInput": additional_input.iter().map(|p| as_file(p)).collect::<Vec<_>>(),
                "config": as_file(config),
                "taskID": job.id,
            }),
            JobPayload::Components {
                config,
                job_directory,
                next_job_id,
            } => json!({
                "config": as_file(config),
                "jobDirectory": as_directory(job_directory),
                "nextId": next_job_id,
            }),
            JobPayload::Contraction {
                inputs,
                components,
                config,
                output_stem,
            } => json!({
                "shpFiles": inputs.iter().map(|p| as_file(p)).collect::<Vec<_>>(),
                "components": components,
                "config": as_file(config),
                "taskID": job.id,
                "outputStem": output_stem,
            }),
            JobPayload::Analysis {
                input,
                config,
                output_stem,
            } => json!({
                "shpFile": as_file(input),
                "config": as_file(config),
                "outputStem": output_stem,
                "taskID": job.id,
            }),
            JobPayload::Merge { inputs, output } => json!({
                "shpFiles": inputs.iter().map(|p| as_file(p)).collect::<Vec<_>>(),
                "outputPath": output.to_string_lossy(),
                "taskID": job.id,
            }),
        }
    }

    /// Write the description of `job` to `job.file`.
    pub fn write(fs: &dyn FileSystem, job: &Job) -> Result<()> {
        let doc = Self::render(job);
        let mut bytes = serde_json::to_vec_pretty(&doc)
            .with_context(|| format!("serialising description of job {}", job.id))?;
        bytes.push(b'\n');
        fs.write(&job.file, &bytes)
            .with_context(|| format!("writing description of job {} to {:?}", job.id, job.file))
    }
}

fn as_file(path: &Path) -> Value {
    let mut file = json!({
        "class": "File",
        "path": path.to_string_lossy(),
    });

    if path.extension().is_some_and(|ext| ext == "shp") {
        let secondary: Vec<Value> = SHAPEFILE_SIDECARS
            .iter()
            .map(|ext| {
                json!({
                    "class": "File",
                    "path": path.with_extension(ext).to_string_lossy(),
                })
            })
            .collect();
        file["secondaryFiles"] = Value::Array(secondary);
    }

    file
}

fn as_directory(path: &Path) -> Value {
    json!({
        "class": "Directory",
        "path": path.to_string_lossy(),
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn shapefile_inputs_carry_sidecars() {
        let job = Job::with_payload(
            7,
            "jobs/Filter_a.json",
            JobPayload::Filter {
                input: PathBuf::from("in/a.shp"),
                config: PathBuf::from("cfg.json"),
            },
        );

        let doc = JobWriter::render(&job);
        assert_eq!(doc["shpFile"]["class"], "File");
        assert_eq!(doc["shpFile"]["path"], "in/a.shp");
        let sidecars = doc["shpFile"]["secondaryFiles"].as_array().unwrap();
        assert_eq!(sidecars.len(), 3);
        assert_eq!(sidecars[0]["path"], "in/a.shx");
        assert!(doc["config"].get("secondaryFiles").is_none());
    }

    #[test]
    fn neighbours_description_lists_additional_inputs() {
        let job = Job::with_payload(
            2,
            "jobs/Neighbours_a.json",
            JobPayload::Neighbours {
                primary_input: PathBuf::from("w/a_filtered.shp"),
                additional_input: vec![PathBuf::from("w/b_filtered.shp")],
                config: PathBuf::from("cfg.json"),
            },
        );

        let doc = JobWriter::render(&job);
        assert_eq!(doc["taskID"], 2);
        assert_eq!(doc["additionalInput"][0]["path"], "w/b_filtered.shp");
    }

    #[test]
    fn write_goes_through_filesystem() {
        let fs = MockFileSystem::new();
        let job = Job::with_payload(
            4,
            "jobs/ComponentsJob.json",
            JobPayload::Components {
                config: PathBuf::from("cfg.json"),
                job_directory: PathBuf::from("jobs"),
                next_job_id: 5,
            },
        );

        JobWriter::write(&fs, &job).unwrap();

        let written = fs.read_to_string(Path::new("jobs/ComponentsJob.json")).unwrap();
        let doc: Value = serde_json::from_str(&written).unwrap();
        assert_eq!(doc["nextId"], 5);
        assert_eq!(doc["jobDirectory"]["class"], "Directory");
    }
}
