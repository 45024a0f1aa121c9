//! Bounded context assembly

use ragsum_core::{AssembledContext, RetrievedFragment};

/// Placed between consecutive fragments; counts toward the budget
pub const FRAGMENT_SEPARATOR: &str = "\n\n";

/// Joins retrieved fragments into a context no longer than a character budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextAssembler {
    max_length: usize,
}

impl ContextAssembler {
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    pub fn assemble(&self, fragments: &[RetrievedFragment]) -> AssembledContext {
        assemble(fragments, self.max_length)
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(ragsum_core::config::DEFAULT_MAX_CONTEXT_CHARS)
    }
}

/// Append whole fragments, in order, while the total stays within `max_length`.
///
/// The first fragment that would overflow is dropped together with everything
/// after it, so the result is always a prefix of the input. Lengths are in
/// characters, separators included. Fragments with no text after trimming
/// contribute nothing and are not listed as sources.
pub fn assemble(fragments: &[RetrievedFragment], max_length: usize) -> AssembledContext {
    let separator_len = FRAGMENT_SEPARATOR.chars().count();
    let mut context = AssembledContext::default();
    let mut used = 0usize;

    for (i, fragment) in fragments.iter().enumerate() {
        let text = fragment.text.trim();
        if text.is_empty() {
            continue;
        }
        let extra = if context.text.is_empty() { 0 } else { separator_len };
        let needed = used + extra + text.chars().count();

        if needed > max_length {
            context.dropped = fragments.len() - i;
            break;
        }

        if !context.text.is_empty() {
            context.text.push_str(FRAGMENT_SEPARATOR);
        }
        context.text.push_str(text);
        context.sources.push(fragment.source_id.clone());
        used = needed;
    }

    context
}
