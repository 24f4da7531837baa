use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::difficulty::{DifficultyClassifier, LookupTables};
use crate::error::{Result, RubigeneError};
use crate::file_utils::FileManager;
use crate::pipeline::{Pipeline, ProgressCallback, RunOutcome, RunReport};
use crate::subtitle::{srt, AssWriter};
use crate::tokenize::{LinguisticModel, Tokenizer};
use crate::translate::{TranslationCache, TranslationService};

/// Result of annotating every subtitle file in a directory.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub annotated: Vec<(PathBuf, RunReport)>,
    pub failed: Vec<(PathBuf, String)>,
}

pub struct Workflow {
    config: Config,
    pipeline: Pipeline,
    writer: AssWriter,
}

impl Workflow {
    /// Assemble a workflow from already constructed services.
    ///
    /// Fails when the configuration is invalid or no API key is set.
    pub fn new(
        config: Config,
        tables: Arc<LookupTables>,
        model: Arc<dyn LinguisticModel>,
        service: Arc<dyn TranslationService>,
        cache: Arc<TranslationCache>,
    ) -> Result<Self> {
        config.validate()?;
        config.require_api_key()?;

        let tokenizer = Arc::new(Tokenizer::new(model, config.tokenize.min_token_length));
        let classifier = Arc::new(DifficultyClassifier::new(tables, config.difficulty.clone()));
        let pipeline = Pipeline::new(tokenizer, classifier, cache, service, &config.translate);
        let writer = AssWriter::new(&config.output);

        Ok(Self {
            config,
            pipeline,
            writer,
        })
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.pipeline = self.pipeline.with_progress(progress);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Annotate one SRT file into an ASS file.
    ///
    /// Nothing is written when loading fails or the run is cancelled.
    pub async fn annotate_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: Q,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        let input_path = input_path.as_ref();
        let output_path = output_path.as_ref();
        info!("Annotating {} -> {}", input_path.display(), output_path.display());

        let loaded = srt::load_file(input_path, self.config.input.on_malformed_block).await?;
        let output = self.pipeline.run(&loaded.cues, cancel).await?;

        let mut report = output.report;
        report.skipped_blocks = loaded.warnings.len();

        self.writer.write(&output.cues, output_path).await?;

        if self.config.output.write_report {
            let report_path = report_path(output_path);
            let content = serde_json::to_vec_pretty(&report)?;
            FileManager::write_atomic(&report_path, content).await?;
            info!("Run report written to {}", report_path.display());
        }

        match report.outcome() {
            RunOutcome::FullyAnnotated => info!(
                "Fully annotated {} ({} words glossed)",
                input_path.display(),
                report.tokens_annotated
            ),
            RunOutcome::PartiallyAnnotated { skipped } => warn!(
                "Partially annotated {}: {} words skipped, unresolved: {}",
                input_path.display(),
                skipped,
                report.unresolved_lemmas.join(", ")
            ),
        }

        Ok(report)
    }

    /// Annotate every `.srt` file under `input_dir`.
    ///
    /// A file that fails is logged and skipped; cancellation stops the batch.
    pub async fn process_directory<P: AsRef<Path>>(
        &self,
        input_dir: P,
        output_dir: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Result<BatchSummary> {
        let input_dir = input_dir.as_ref();
        info!("Processing directory: {}", input_dir.display());

        if !input_dir.is_dir() {
            return Err(RubigeneError::Config(format!(
                "{} is not a directory",
                input_dir.display()
            )));
        }
        if let Some(dir) = output_dir {
            FileManager::ensure_dir(dir)?;
        }

        let files = FileManager::find_files(input_dir, "srt")?;
        info!("Found {} subtitle files to process", files.len());

        let mut summary = BatchSummary::default();
        for input in files {
            if cancel.is_cancelled() {
                return Err(RubigeneError::Cancelled);
            }

            let output = FileManager::output_path(&input, output_dir, &self.config.output.output_suffix, "ass");
            match self.annotate_file(&input, &output, cancel).await {
                Ok(report) => {
                    info!("Successfully processed: {}", input.display());
                    summary.annotated.push((input, report));
                }
                Err(RubigeneError::Cancelled) => return Err(RubigeneError::Cancelled),
                Err(e) => {
                    warn!("Failed to process {}: {}", input.display(), e);
                    summary.failed.push((input, e.to_string()));
                }
            }
        }

        Ok(summary)
    }
}

/// `<output>.report.json`
pub fn report_path(output_path: &Path) -> PathBuf {
    let mut name = output_path.as_os_str().to_os_string();
    name.push(".report.json");
    PathBuf::from(name)
}
