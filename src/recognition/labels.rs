use std::sync::Arc;

/// Ordered label vocabulary, aligned 1:1 with the model's output vector.
///
/// Loaded once from configuration and shared read-only between all connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelVocabulary {
    labels: Arc<[String]>,
}

impl LabelVocabulary {
    pub fn new(labels: Vec<String>) -> Self {
        Self {
            labels: labels.into(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_index() {
        let labels = LabelVocabulary::new(vec!["HELLO".to_string(), "THANK YOU".to_string()]);
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.get(1), Some("THANK YOU"));
        assert_eq!(labels.get(2), None);

        let shared = labels.clone();
        assert_eq!(shared, labels);
    }
}
