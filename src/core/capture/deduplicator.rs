/// 单槽去重：只记住最后一次保存的编号，不是完整的已见集合。
/// 导航若回到更早的编号，会被再次保存。
#[derive(Debug, Default, Clone)]
pub struct DedupStore {
    last_saved: Option<i64>,
}

impl DedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn should_save(&self, id: i64) -> bool {
        id > 0 && self.last_saved != Some(id)
    }

    pub fn mark_saved(&mut self, id: i64) {
        self.last_saved = Some(id);
    }

    pub fn last_saved(&self) -> Option<i64> {
        self.last_saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_positive_never_saved() {
        let mut store = DedupStore::new();
        for id in [-5, -1, 0] {
            assert!(!store.should_save(id));
        }
        store.mark_saved(3);
        for id in [-5, -1, 0] {
            assert!(!store.should_save(id));
        }
    }

    #[test]
    fn test_duplicate_of_last_rejected() {
        let mut store = DedupStore::new();
        assert!(store.should_save(933));
        store.mark_saved(933);
        assert!(!store.should_save(933));
        assert!(store.should_save(934));
        assert_eq!(store.last_saved(), Some(933));
    }

    #[test]
    fn test_single_slot_forgets_older_ids() {
        let mut store = DedupStore::new();
        store.mark_saved(1);
        store.mark_saved(2);
        // 1 已被 2 挤出，重新视为新编号
        assert!(store.should_save(1));
        assert!(!store.should_save(2));
    }

    #[test]
    fn test_mark_sequence_matches_last_only() {
        let mut store = DedupStore::new();
        let sequence = [5, 5, 7, 5, 9, 9];
        for &id in &sequence {
            store.mark_saved(id);
            for candidate in 1..=10 {
                assert_eq!(store.should_save(candidate), candidate != id);
            }
        }
    }
}
