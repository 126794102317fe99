//! Model calls with transcripts and usage accounting.
//!
//! Every prompt the pipeline sends goes through [`LlmSession::call`], which
//! times the request, estimates its cost, writes a transcript and folds the
//! call into the session's [`ApiStats`]. There are no retries at this layer;
//! backend errors propagate to the caller.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::core::usage::{ApiStats, CallRecord, estimate_cost, measure_call};
use crate::io::llm::Llm;
use crate::io::transcript::write_transcript;

pub struct LlmSession<'a, L: Llm + ?Sized> {
    llm: &'a L,
    log_dir: PathBuf,
    cost_per_1k: f64,
    stats: ApiStats,
    transcripts: Vec<PathBuf>,
}

impl<'a, L: Llm + ?Sized> LlmSession<'a, L> {
    /// Start a session writing transcripts into `log_dir`.
    pub fn new(llm: &'a L, log_dir: impl Into<PathBuf>, cost_per_1k: f64) -> Self {
        Self {
            llm,
            log_dir: log_dir.into(),
            cost_per_1k,
            stats: ApiStats::default(),
            transcripts: Vec::new(),
        }
    }

    /// Send `prompt` and return the raw completion text.
    ///
    /// `prefix` names the transcript file, e.g. `stub` or `red-fix-0`.
    #[instrument(skip_all, fields(prefix = prefix, model = self.llm.model_name()))]
    pub fn call(&mut self, prefix: &str, prompt: &str) -> Result<String> {
        let timestamp_ms = chrono::Utc::now().timestamp_millis();
        let started = Instant::now();
        let completion = self
            .llm
            .complete(prompt)
            .with_context(|| format!("model call {prefix}"))?;
        let duration = started.elapsed();

        let (sent, received) = measure_call(
            prompt,
            &completion.text,
            completion.input_tokens,
            completion.output_tokens,
        );
        let cost = estimate_cost(received, self.cost_per_1k);

        let path = write_transcript(
            &self.log_dir,
            prefix,
            timestamp_ms,
            prompt,
            &completion.text,
        )?;
        info!(
            sent = sent.amount,
            received = received.amount,
            unit = ?received.unit,
            duration_ms = duration.as_millis() as u64,
            cost,
            transcript = %path.display(),
            "model call complete"
        );

        self.stats.record(&CallRecord {
            model: self.llm.model_name().to_string(),
            duration,
            sent,
            received,
            cost,
        });
        self.transcripts.push(path);
        Ok(completion.text)
    }

    pub fn stats(&self) -> &ApiStats {
        &self.stats
    }

    /// Transcript files written so far, in call order.
    pub fn transcripts(&self) -> &[PathBuf] {
        &self.transcripts
    }
}
