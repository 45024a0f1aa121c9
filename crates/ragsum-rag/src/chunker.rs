//! Splitting documents into overlapping fragments

use serde_json::json;

use ragsum_core::{Document, Error, PipelineConfig, Result, VectorDocument};

/// Character-window chunker with overlap
///
/// Windows prefer to end on whitespace found in their second half so words are
/// not cut in two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidArgument("chunk_size must be at least 1".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::InvalidArgument(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Split raw text into trimmed, non-empty windows
    pub fn split(&self, content: &str) -> Vec<String> {
        let chars: Vec<char> = content.chars().collect();
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let mut end = (start + self.chunk_size).min(chars.len());

            if end < chars.len() {
                let search_from = start + self.chunk_size / 2;
                if let Some(pos) = chars[search_from..end].iter().rposition(|c| c.is_whitespace()) {
                    end = search_from + pos + 1;
                }
            }

            let chunk: String = chars[start..end].iter().collect();
            let chunk = chunk.trim();
            if !chunk.is_empty() {
                chunks.push(chunk.to_string());
            }

            if end >= chars.len() {
                break;
            }

            let next = end.saturating_sub(self.chunk_overlap);
            start = if next > start { next } else { end };
        }

        chunks
    }

    /// Chunk every document into fragments ready for embedding
    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<VectorDocument> {
        let mut fragments = Vec::new();

        for document in documents {
            let chunks = self.split(&document.content);
            let total = chunks.len();

            for (i, chunk) in chunks.into_iter().enumerate() {
                let mut metadata = match &document.metadata {
                    serde_json::Value::Object(_) => document.metadata.clone(),
                    _ => json!({}),
                };
                metadata["chunk_index"] = json!(i);
                metadata["total_chunks"] = json!(total);
                metadata["title"] = json!(document.title);
                if let Some(ref source) = document.source {
                    metadata["source"] = json!(source);
                }

                fragments.push(VectorDocument {
                    id: format!("{}#{}", document.id, i),
                    source: document.id.clone(),
                    content: chunk,
                    metadata,
                    score: None,
                });
            }
        }

        fragments
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            chunk_size: ragsum_core::config::DEFAULT_CHUNK_SIZE,
            chunk_overlap: ragsum_core::config::DEFAULT_CHUNK_OVERLAP,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(id: &str, content: &str) -> Document {
        Document {
            id: id.to_string(),
            title: "Image Processing Notes".to_string(),
            content: content.to_string(),
            source: Some(format!("data/{}", id)),
            metadata: json!({"file_type": "text"}),
        }
    }

    #[test]
    fn test_short_content_is_one_chunk() {
        let chunker = TextChunker::new(100, 10).unwrap();
        assert_eq!(chunker.split("  short text  "), vec!["short text"]);
        assert!(chunker.split("   ").is_empty());
    }

    #[test]
    fn test_chunks_respect_size_and_overlap() {
        let chunker = TextChunker::new(40, 10).unwrap();
        let text = "histogram equalization redistributes pixel intensities so that the \
                    cumulative distribution becomes roughly linear which stretches contrast";
        let chunks = chunker.split(text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 40, "chunk too long: {:?}", chunk);
        }
        // overlap duplicates text across windows
        let total: usize = chunks.iter().map(|c| c.chars().count()).sum();
        assert!(total > text.chars().count());
        // nothing is lost
        for word in text.split_whitespace() {
            assert!(chunks.iter().any(|c| c.contains(word)), "missing {}", word);
        }
    }

    #[test]
    fn test_unbroken_text_still_progresses() {
        let chunker = TextChunker::new(10, 9).unwrap();
        let chunks = chunker.split(&"x".repeat(35));
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.len() <= 10));
        assert!(chunks.last().unwrap().len() >= 1);
    }

    #[test]
    fn test_chunk_documents_ids_and_metadata() {
        let chunker = TextChunker::new(30, 5).unwrap();
        let docs = vec![document(
            "notes.txt",
            "Edges are detected with Sobel kernels. Noise is removed with a median filter.",
        )];

        let fragments = chunker.chunk_documents(&docs);
        assert!(fragments.len() >= 2);
        assert_eq!(fragments[0].id, "notes.txt#0");
        assert_eq!(fragments[1].id, "notes.txt#1");
        assert!(fragments.iter().all(|f| f.source == "notes.txt"));
        assert_eq!(fragments[0].metadata["chunk_index"], 0);
        assert_eq!(fragments[0].metadata["total_chunks"], fragments.len());
        assert_eq!(fragments[0].metadata["title"], "Image Processing Notes");
        assert_eq!(fragments[0].metadata["file_type"], "text");
        assert_eq!(fragments[0].metadata["source"], "data/notes.txt");
    }

    #[test]
    fn test_invalid_geometry_rejected() {
        assert!(matches!(TextChunker::new(0, 0), Err(Error::InvalidArgument(_))));
        assert!(matches!(TextChunker::new(10, 10), Err(Error::InvalidArgument(_))));
    }
}
