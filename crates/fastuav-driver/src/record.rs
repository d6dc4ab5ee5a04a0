//! Evaluation record sinks
//!
//! Every evaluated candidate, and the final design, can be handed to a
//! [`RecordSink`]. Sink errors are logged by the optimizer and never abort
//! a run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fastuav_common::{Candidate, NamedValues, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Where a record was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStage {
    /// Candidate of a generation
    Generation,
    /// Model re-run at the returned optimum
    Final,
}

/// One evaluated design point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub run_id: Uuid,
    pub stage: RecordStage,
    pub generation: u64,
    pub x: Vec<f64>,
    pub objectives: NamedValues,
    pub constraints: NamedValues,
    pub fitness: f64,
    pub feasible: bool,
    pub failed: bool,
    pub timestamp: DateTime<Utc>,
}

impl EvaluationRecord {
    pub fn from_candidate(run_id: Uuid, stage: RecordStage, candidate: &Candidate) -> Self {
        Self {
            run_id,
            stage,
            generation: candidate.generation,
            x: candidate.x.clone(),
            objectives: candidate.objectives.clone(),
            constraints: candidate.constraints.clone(),
            fitness: candidate.fitness,
            feasible: candidate.feasible,
            failed: candidate.failed,
            timestamp: Utc::now(),
        }
    }
}

/// Destination for evaluation records
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Persist one record
    async fn record(&self, record: &EvaluationRecord) -> Result<()>;
}

/// Emits each record as a `debug!` line
#[derive(Debug, Default)]
pub struct TracingRecordSink;

#[async_trait]
impl RecordSink for TracingRecordSink {
    async fn record(&self, record: &EvaluationRecord) -> Result<()> {
        debug!(
            run_id = %record.run_id,
            stage = ?record.stage,
            generation = record.generation,
            fitness = record.fitness,
            feasible = record.feasible,
            failed = record.failed,
            x = ?record.x,
            "Evaluation recorded"
        );
        Ok(())
    }
}

/// Keeps records in memory
#[derive(Debug, Default)]
pub struct MemoryRecordSink {
    records: RwLock<Vec<EvaluationRecord>>,
}

impl MemoryRecordSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records so far
    pub fn records(&self) -> Vec<EvaluationRecord> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Records of one generation
    pub fn generation(&self, generation: u64) -> Vec<EvaluationRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.stage == RecordStage::Generation && r.generation == generation)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RecordSink for MemoryRecordSink {
    async fn record(&self, record: &EvaluationRecord) -> Result<()> {
        self.records.write().push(record.clone());
        Ok(())
    }
}

/// Appends one JSON document per line to a file
pub struct JsonLinesRecordSink {
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesRecordSink {
    /// Create or truncate the output file
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path.as_ref()).await?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

#[async_trait]
impl RecordSink for JsonLinesRecordSink {
    async fn record(&self, record: &EvaluationRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}
