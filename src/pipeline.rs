use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::TranslateConfig;
use crate::difficulty::DifficultyClassifier;
use crate::error::{Result, RubigeneError};
use crate::ruby::{self, AnnotationSpan};
use crate::subtitle::Cue;
use crate::tokenize::{Token, Tokenizer};
use crate::translate::{Resolution, Resolver, RetryPolicy, TranslationCache, TranslationService};

/// Called with (resolved, total) after each distinct lemma is resolved
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Summary of one annotation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub cues_processed: usize,
    pub tokens_annotated: usize,
    /// Distinct lemmas that could not be resolved
    pub resolution_failures: usize,
    pub unresolved_lemmas: Vec<String>,
    /// Difficult tokens left unannotated because their lemma did not resolve
    pub skipped_tokens: usize,
    pub discarded_spans: usize,
    /// Input blocks dropped by the loader
    pub skipped_blocks: usize,
    /// Cues the linguistic model could not analyze; written without annotations
    pub untokenized_cues: usize,
    pub cache_hits: usize,
    pub external_calls: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    FullyAnnotated,
    PartiallyAnnotated { skipped: usize },
}

impl RunReport {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            cues_processed: 0,
            tokens_annotated: 0,
            resolution_failures: 0,
            unresolved_lemmas: Vec::new(),
            skipped_tokens: 0,
            discarded_spans: 0,
            skipped_blocks: 0,
            untokenized_cues: 0,
            cache_hits: 0,
            external_calls: 0,
        }
    }

    /// A run with zero annotations and no failures is still fully annotated.
    pub fn outcome(&self) -> RunOutcome {
        if self.skipped_tokens == 0 {
            RunOutcome::FullyAnnotated
        } else {
            RunOutcome::PartiallyAnnotated {
                skipped: self.skipped_tokens,
            }
        }
    }
}

pub struct PipelineOutput {
    pub cues: Vec<Cue>,
    pub report: RunReport,
}

/// Tokenize, classify, resolve and tag a batch of cues.
///
/// Classification runs on blocking worker threads; resolution is coalesced
/// per distinct lemma and bounded by `max_concurrent_requests`. Output cues
/// keep the input order.
pub struct Pipeline {
    tokenizer: Arc<Tokenizer>,
    classifier: Arc<DifficultyClassifier>,
    cache: Arc<TranslationCache>,
    service: Arc<dyn TranslationService>,
    retry: RetryPolicy,
    source_language: String,
    target_language: String,
    api_key: String,
    max_concurrent_requests: usize,
    progress: Option<ProgressCallback>,
}

impl Pipeline {
    pub fn new(
        tokenizer: Arc<Tokenizer>,
        classifier: Arc<DifficultyClassifier>,
        cache: Arc<TranslationCache>,
        service: Arc<dyn TranslationService>,
        translate: &TranslateConfig,
    ) -> Self {
        Self {
            tokenizer,
            classifier,
            cache,
            service,
            retry: translate.retry.clone(),
            source_language: translate.source_language.clone(),
            target_language: translate.target_language.clone(),
            api_key: translate.api_key.trim().to_string(),
            max_concurrent_requests: translate.max_concurrent_requests.max(1),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub async fn run(&self, cues: &[Cue], cancel: &CancellationToken) -> Result<PipelineOutput> {
        let mut report = RunReport::new(Uuid::new_v4());
        info!(
            "Run {}: annotating {} cues (model {}, target {})",
            report.run_id,
            cues.len(),
            self.tokenizer.model_version(),
            self.target_language
        );

        let (selected, untokenized) = self.classify_cues(cues, cancel).await?;
        report.untokenized_cues = untokenized;

        let mut lemmas = Vec::new();
        let mut seen = HashSet::new();
        for token in selected.iter().flatten() {
            let lemma = token.lemma.to_lowercase();
            if seen.insert(lemma.clone()) {
                lemmas.push(lemma);
            }
        }
        debug!(
            "{} difficult tokens, {} distinct lemmas",
            selected.iter().map(Vec::len).sum::<usize>(),
            lemmas.len()
        );

        let resolver = Resolver::new(
            self.cache.clone(),
            self.service.clone(),
            self.retry.clone(),
            self.source_language.clone(),
            self.api_key.clone(),
        );
        let glosses = self.resolve_lemmas(&resolver, lemmas, cancel).await;
        if cancel.is_cancelled() {
            warn!("Run {} cancelled during resolution", report.run_id);
            return Err(RubigeneError::Cancelled);
        }

        let mut unresolved = HashSet::new();
        let mut output = Vec::with_capacity(cues.len());
        for (cue, tokens) in cues.iter().zip(selected) {
            let mut spans = Vec::with_capacity(tokens.len());
            for token in tokens {
                let lemma = token.lemma.to_lowercase();
                match glosses.get(&lemma).and_then(Resolution::gloss) {
                    Some(gloss) => spans.push(AnnotationSpan {
                        cue_index: cue.index,
                        span: token.span,
                        gloss: gloss.to_string(),
                    }),
                    None => {
                        report.skipped_tokens += 1;
                        unresolved.insert(lemma);
                    }
                }
            }

            let tagged = ruby::annotate(&cue.text, &spans);
            report.tokens_annotated += tagged.applied.len();
            report.discarded_spans += tagged.discarded.len();
            output.push(cue.with_text(tagged.text));
        }

        report.cues_processed = output.len();
        report.unresolved_lemmas = unresolved.into_iter().collect();
        report.unresolved_lemmas.sort();
        report.resolution_failures = report.unresolved_lemmas.len();
        report.cache_hits = resolver.cache_hits();
        report.external_calls = resolver.external_calls();

        info!(
            "Run {}: {} cues, {} annotations, {} unresolved lemmas, {} cache hits, {} external calls",
            report.run_id,
            report.cues_processed,
            report.tokens_annotated,
            report.resolution_failures,
            report.cache_hits,
            report.external_calls
        );

        Ok(PipelineOutput {
            cues: output,
            report,
        })
    }

    /// Difficult tokens per cue, in cue order, and the number of cues the
    /// model failed on. A failed cue selects no tokens.
    async fn classify_cues(
        &self,
        cues: &[Cue],
        cancel: &CancellationToken,
    ) -> Result<(Vec<Vec<Token>>, usize)> {
        if cues.is_empty() {
            return Ok((Vec::new(), 0));
        }

        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let chunk_size = cues.len().div_ceil(workers);

        let mut handles = Vec::new();
        for chunk in cues.chunks(chunk_size) {
            let chunk = chunk.to_vec();
            let tokenizer = self.tokenizer.clone();
            let classifier = self.classifier.clone();
            let cancel = cancel.clone();

            handles.push(tokio::task::spawn_blocking(move || -> Result<(Vec<Vec<Token>>, usize)> {
                let mut selected = Vec::with_capacity(chunk.len());
                let mut failed = 0;
                for cue in &chunk {
                    if cancel.is_cancelled() {
                        return Err(RubigeneError::Cancelled);
                    }
                    match tokenizer.tokenize_words(&cue.text) {
                        Ok(tokens) => selected.push(classifier.select(tokens)),
                        Err(e) => {
                            warn!("Leaving cue {} unannotated: {}", cue.index, e);
                            failed += 1;
                            selected.push(Vec::new());
                        }
                    }
                }
                Ok((selected, failed))
            }));
        }

        let mut per_cue = Vec::with_capacity(cues.len());
        let mut untokenized = 0;
        for handle in handles {
            let (chunk, failed) = handle
                .await
                .map_err(|e| RubigeneError::Io(std::io::Error::other(e)))??;
            per_cue.extend(chunk);
            untokenized += failed;
        }
        Ok((per_cue, untokenized))
    }

    async fn resolve_lemmas(
        &self,
        resolver: &Resolver,
        lemmas: Vec<String>,
        cancel: &CancellationToken,
    ) -> HashMap<String, Resolution> {
        let total = lemmas.len();
        let done = AtomicUsize::new(0);
        let target = self.target_language.as_str();
        let done = &done;

        stream::iter(lemmas)
            .take_while(|_| futures::future::ready(!cancel.is_cancelled()))
            .map(|lemma| async move {
                let resolution = resolver.resolve(&lemma, target).await;
                let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(progress) = &self.progress {
                    progress(finished, total);
                }
                (lemma, resolution)
            })
            .buffer_unordered(self.max_concurrent_requests)
            .collect()
            .await
    }
}
