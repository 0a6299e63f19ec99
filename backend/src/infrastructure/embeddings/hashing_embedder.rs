/// Deterministic offline embedding provider
use crate::application::providers::{EmbeddingError, EmbeddingProvider};
use crate::domain::{EmbeddingModel, EmbeddingVector};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Feature-hashing embedder for tests and offline use.
///
/// Each text is reduced to lowercase character unigrams and bigrams taken from
/// alphanumeric runs, plus whole ASCII words. Features are hashed (FNV-1a) into a
/// signed bag of `dimension` buckets and the result is L2-normalized. Texts that
/// share characters land close together, which is enough for lexical matching in
/// any script but carries no semantics. Select it explicitly; it is never a
/// fallback for a failing model.
#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        HashingEmbedder {
            dimension: dimension.max(1),
        }
    }

    pub fn model(&self) -> EmbeddingModel {
        EmbeddingModel::Hashing {
            dimension: self.dimension,
        }
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();

        for run in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|r| !r.is_empty())
        {
            let chars: Vec<char> = run.chars().collect();
            for c in &chars {
                self.add(&mut vector, 'u', &c.to_string());
            }
            for pair in chars.windows(2) {
                self.add(&mut vector, 'b', &pair.iter().collect::<String>());
            }
            if run.is_ascii() {
                self.add(&mut vector, 'w', run);
            }
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in vector.iter_mut() {
                *x /= norm;
            }
        }
        vector
    }

    fn add(&self, vector: &mut [f32], kind: char, feature: &str) {
        let hash = fnv1a(kind, feature);
        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign;
    }
}

fn fnv1a(kind: char, feature: &str) -> u64 {
    let mut kind_buf = [0u8; 4];
    kind.encode_utf8(&mut kind_buf)
        .bytes()
        .chain(feature.bytes())
        .fold(FNV_OFFSET, |hash, byte| {
            (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
        })
}

impl EmbeddingProvider for HashingEmbedder {
    fn load(&self) -> Result<EmbeddingModel, EmbeddingError> {
        Ok(self.model())
    }

    fn encode(&self, texts: &[&str]) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        texts
            .iter()
            .map(|text| {
                EmbeddingVector::new(self.embed(text)).map_err(|e| EmbeddingError::Encode {
                    batch_size: texts.len(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distance(embedder: &HashingEmbedder, a: &str, b: &str) -> f32 {
        let va = embedder.encode_one(a).unwrap();
        let vb = embedder.encode_one(b).unwrap();
        va.euclidean_distance(vb.dimensions()).unwrap()
    }

    #[test]
    fn test_reports_hashing_model() {
        let embedder = HashingEmbedder::new(128);
        assert_eq!(
            embedder.load().unwrap(),
            EmbeddingModel::Hashing { dimension: 128 }
        );
    }

    #[test]
    fn test_encode_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::new(64);
        let vectors = embedder.encode(&["hello world", "hello world"]).unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], vectors[1]);
        assert_eq!(vectors[0].dimension_count(), 64);

        let norm: f32 = vectors[0].dimensions().iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_text_without_features_is_zero_vector() {
        let embedder = HashingEmbedder::new(8);
        let vector = embedder.encode_one("  ,.!  ").unwrap();
        assert!(vector.dimensions().iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_shared_characters_are_closer() {
        let embedder = HashingEmbedder::new(384);
        assert!(
            distance(&embedder, "北京历史文化", "北京是中国的首都，拥有悠久的历史和文化遗产")
                < distance(&embedder, "北京历史文化", "网页设计应遵循简洁、直观、一致的原则")
        );
        assert!(
            distance(&embedder, "rust ownership", "ownership rules in rust")
                < distance(&embedder, "rust ownership", "weather forecast today")
        );
    }

    #[test]
    fn test_case_insensitive() {
        let embedder = HashingEmbedder::new(32);
        assert_eq!(
            embedder.encode_one("Rust").unwrap(),
            embedder.encode_one("rust").unwrap()
        );
    }
}
