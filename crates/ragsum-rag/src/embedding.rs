//! Feature-hashing embedder

use ragsum_core::Embedder;

pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;

/// Deterministic bag-of-words embedder
///
/// Words and bigrams are hashed into buckets with md5, so vectors written to a
/// persisted index stay valid across builds and toolchains. Output is
/// L2-normalised; similarity between two vectors is their dot product.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn bucket(&self, feature: &str, salt: usize) -> usize {
        let digest = md5::compute(feature.as_bytes()).0;
        let offset = (salt * 4) % 16;
        let bytes = [
            digest[offset],
            digest[(offset + 1) % 16],
            digest[(offset + 2) % 16],
            digest[(offset + 3) % 16],
        ];
        u32::from_le_bytes(bytes) as usize % self.dimension
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIMENSION)
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl Embedder for HashEmbedder {
    fn name(&self) -> &str {
        "hash-md5-v1"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let words = tokenize(text);
        let mut embedding = vec![0.0f32; self.dimension];

        for (pos, word) in words.iter().enumerate() {
            // earlier words weigh a little more, never below half
            let position_weight = 0.5 + 0.5 / (pos as f32 + 1.0);

            embedding[self.bucket(word, 0)] += position_weight;
            embedding[self.bucket(word, 1)] += position_weight * 0.5;
        }

        for pair in words.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            embedding[self.bucket(&bigram, 2)] += 0.8;
        }

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for val in embedding.iter_mut() {
                *val /= magnitude;
            }
        }

        embedding
    }
}

/// Cosine similarity; zero for mismatched or zero-length vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
