use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Versioned keyword vocabulary fixing feature-vector dimensionality.
///
/// The vocabulary is an explicit value carried alongside the feature table,
/// not process-wide state: a regenerated vocabulary gets a new version, and a
/// feature table built against the old one stays internally consistent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVocabulary {
    version: u64,
    keywords: Vec<String>,
}

impl FeatureVocabulary {
    /// Keywords are sorted and deduplicated so a given keyword set always
    /// produces the same dimension order.
    pub fn new(version: u64, mut keywords: Vec<String>) -> Self {
        keywords.sort();
        keywords.dedup();
        Self { version, keywords }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// Project a free-form keyword→weight map onto the fixed dimension order.
    ///
    /// Returns `None` when the map shares no keyword with the vocabulary —
    /// the resulting all-zero vector would be "no signal", not a usable
    /// direction.
    pub fn project(&self, weights: &HashMap<String, f64>) -> Option<Vec<f64>> {
        if self.keywords.is_empty() {
            return None;
        }
        let vector: Vec<f64> = self
            .keywords
            .iter()
            .map(|k| weights.get(k).copied().unwrap_or(0.0))
            .collect();
        if vector.iter().all(|v| *v == 0.0) {
            warn!("keyword map has no overlap with vocabulary v{}", self.version);
            return None;
        }
        Some(vector)
    }

    /// Same as [`project`](Self::project) for a raw JSON object.
    pub fn project_json(&self, raw: &str) -> Result<Option<Vec<f64>>, serde_json::Error> {
        let weights: HashMap<String, f64> = serde_json::from_str(raw)?;
        Ok(self.project(&weights))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> FeatureVocabulary {
        FeatureVocabulary::new(
            3,
            vec!["spicy".into(), "noodle".into(), "sweet".into(), "noodle".into()],
        )
    }

    #[test]
    fn test_keywords_sorted_and_deduplicated() {
        let v = vocab();
        assert_eq!(v.len(), 3);
        // projection order follows sorted keywords: noodle, spicy, sweet
        let mut weights = HashMap::new();
        weights.insert("sweet".to_string(), 0.5);
        weights.insert("noodle".to_string(), 0.9);
        assert_eq!(v.project(&weights), Some(vec![0.9, 0.0, 0.5]));
    }

    #[test]
    fn test_no_overlap_is_no_signal() {
        let v = vocab();
        let mut weights = HashMap::new();
        weights.insert("umami".to_string(), 1.0);
        assert_eq!(v.project(&weights), None);
    }

    #[test]
    fn test_project_json() {
        let v = vocab();
        let projected = v.project_json(r#"{"spicy": 0.7}"#).unwrap();
        assert_eq!(projected, Some(vec![0.0, 0.7, 0.0]));
        assert!(v.project_json("not json").is_err());
    }
}
