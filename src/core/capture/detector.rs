/// 命中的信号类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// 目标短语，例如 "Page 10"
    Phrase(String),
    /// 位置标记，例如 "10 of 20"
    Marker(String),
}

impl Detection {
    pub fn literal(&self) -> &str {
        match self {
            Detection::Phrase(s) | Detection::Marker(s) => s,
        }
    }
}

/// 目标页判定：短语与位置标记是两个独立、等价的信号
#[derive(Debug, Clone)]
pub struct TargetDetector {
    phrases: Vec<String>,
    markers: Vec<String>,
}

impl TargetDetector {
    pub fn new(phrases: Vec<String>, markers: Vec<String>) -> Self {
        Self {
            phrases: phrases.into_iter().filter(|p| !p.is_empty()).collect(),
            markers: markers.into_iter().filter(|m| !m.is_empty()).collect(),
        }
    }

    pub fn detect(&self, text: &str) -> Option<Detection> {
        if let Some(phrase) = self.phrases.iter().find(|p| text.contains(p.as_str())) {
            return Some(Detection::Phrase(phrase.clone()));
        }
        self.markers
            .iter()
            .find(|m| text.contains(m.as_str()))
            .map(|m| Detection::Marker(m.clone()))
    }
}

impl Default for TargetDetector {
    fn default() -> Self {
        Self::new(vec!["Page 10".to_string()], vec!["10 of 20".to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phrase_detected() {
        let detector = TargetDetector::default();
        let hit = detector.detect("Booklet 933\nPage 10\n");
        assert_eq!(hit, Some(Detection::Phrase("Page 10".to_string())));
    }

    #[test]
    fn test_marker_alone_is_enough() {
        let detector = TargetDetector::default();
        let hit = detector.detect("showing 10 of 20 pages");
        assert_eq!(hit, Some(Detection::Marker("10 of 20".to_string())));
        assert_eq!(hit.unwrap().literal(), "10 of 20");
    }

    #[test]
    fn test_no_signal() {
        let detector = TargetDetector::default();
        assert_eq!(detector.detect("Page 9 / 9 of 20"), None);
        assert_eq!(detector.detect(""), None);
    }

    #[test]
    fn test_empty_literals_ignored() {
        let detector = TargetDetector::new(vec![String::new()], vec![]);
        assert_eq!(detector.detect("anything"), None);
    }
}
