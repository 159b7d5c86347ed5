//! Script jobs
//!
//! Payload that sends a script to the HTTP worker and keeps whatever JSON
//! the worker returns as the job's result.

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tether_client::HttpWorkerClient;
use tether_scheduler::{Job, JobPayload};

/// Runs a script on the remote worker
pub struct ScriptJob {
    client: HttpWorkerClient,
    script: String,
}

impl ScriptJob {
    pub fn new(client: HttpWorkerClient, script: String) -> Self {
        Self { client, script }
    }
}

#[async_trait]
impl JobPayload for ScriptJob {
    async fn run(&self, job: &Job) -> anyhow::Result<Option<JsonValue>> {
        let output = self
            .client
            .run_script(job.id(), &self.script)
            .await
            .with_context(|| format!("Worker failed to run job {}", job.id()))?;

        Ok(Some(output))
    }
}
