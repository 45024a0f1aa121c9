//! Retrieval-augmented query pipeline
//!
//! One invocation walks `Idle → Retrieving → Assembling → Summarizing → Done`.
//! Any failure moves it to `Errored` and nothing partial is returned. The
//! pipeline itself holds no mutable state, so a single instance can serve
//! concurrent invocations.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ragsum_core::{
    AssembledContext, Answer, Error, Query, Result, RetrievedFragment, Retriever, Summarizer,
};

use crate::context::ContextAssembler;

/// Stage of a single pipeline invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Idle,
    Retrieving,
    Assembling,
    Summarizing,
    Done,
    Errored,
}

/// Everything observable about one finished invocation
#[derive(Debug)]
pub struct PipelineRun {
    /// Every state visited, starting with `Idle`
    pub trace: Vec<PipelineState>,
    pub fragments: Vec<RetrievedFragment>,
    /// Set once assembly has happened
    pub context: Option<AssembledContext>,
    pub outcome: Result<Answer>,
}

impl PipelineRun {
    /// Final state of the invocation
    pub fn state(&self) -> PipelineState {
        self.trace.last().copied().unwrap_or(PipelineState::Idle)
    }

    pub fn into_result(self) -> Result<Answer> {
        self.outcome
    }
}

/// Records transitions for one invocation
struct Transitions {
    trace: Vec<PipelineState>,
}

impl Transitions {
    fn start() -> Self {
        Self {
            trace: vec![PipelineState::Idle],
        }
    }

    fn advance(&mut self, next: PipelineState) {
        let from = self.trace.last().copied().unwrap_or(PipelineState::Idle);
        debug!(?from, to = ?next, "pipeline transition");
        self.trace.push(next);
    }

    fn fail(
        mut self,
        error: Error,
        fragments: Vec<RetrievedFragment>,
        context: Option<AssembledContext>,
    ) -> PipelineRun {
        warn!(error = %error, "query pipeline failed");
        self.advance(PipelineState::Errored);
        PipelineRun {
            trace: self.trace,
            fragments,
            context,
            outcome: Err(error),
        }
    }
}

/// Composes a [`Retriever`], a [`ContextAssembler`] and a [`Summarizer`]
pub struct QueryPipeline<R: Retriever, S: Summarizer> {
    retriever: R,
    summarizer: S,
    assembler: ContextAssembler,
}

impl<R: Retriever, S: Summarizer> QueryPipeline<R, S> {
    pub fn new(retriever: R, summarizer: S, assembler: ContextAssembler) -> Self {
        Self {
            retriever,
            summarizer,
            assembler,
        }
    }

    pub fn retriever(&self) -> &R {
        &self.retriever
    }

    pub fn summarizer(&self) -> &S {
        &self.summarizer
    }

    /// Answer `query` from the `top_k` most relevant fragments
    pub async fn search_and_summarize(&self, query: &str, top_k: usize) -> Result<String> {
        self.search_and_summarize_with_cancel(query, top_k, &CancellationToken::new())
            .await
    }

    /// Like [`QueryPipeline::search_and_summarize`], abandoning the backend
    /// call with [`Error::Cancelled`] once `cancel` fires
    pub async fn search_and_summarize_with_cancel(
        &self,
        query: &str,
        top_k: usize,
        cancel: &CancellationToken,
    ) -> Result<String> {
        self.run(query, top_k, cancel)
            .await
            .into_result()
            .map(Answer::into_string)
    }

    /// Execute one invocation and report how it went
    pub async fn run(&self, query: &str, top_k: usize, cancel: &CancellationToken) -> PipelineRun {
        let mut transitions = Transitions::start();
        transitions.advance(PipelineState::Retrieving);

        let query = match Query::new(query) {
            Ok(query) => query,
            Err(e) => return transitions.fail(e, Vec::new(), None),
        };
        if top_k == 0 {
            let error = Error::InvalidArgument("top_k must be at least 1".to_string());
            return transitions.fail(error, Vec::new(), None);
        }

        let fragments = match self.retriever.retrieve(&query, top_k).await {
            Ok(fragments) => fragments,
            Err(e) => return transitions.fail(e, Vec::new(), None),
        };

        transitions.advance(PipelineState::Assembling);
        let context = self.assembler.assemble(&fragments);
        debug!(
            fragments = fragments.len(),
            included = context.sources.len(),
            dropped = context.dropped,
            chars = context.char_len(),
            "context assembled"
        );

        transitions.advance(PipelineState::Summarizing);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = self.summarizer.summarize(&query, &context) => result,
        };

        match outcome {
            Ok(answer) => {
                transitions.advance(PipelineState::Done);
                info!(
                    sources = context.sources.len(),
                    answer_chars = answer.text.len(),
                    "query answered"
                );
                PipelineRun {
                    trace: transitions.trace,
                    fragments,
                    context: Some(context),
                    outcome: Ok(answer),
                }
            }
            Err(e) => transitions.fail(e, fragments, Some(context)),
        }
    }
}
