use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaintPhase {
    /// Groups before `group_index` are painted for this surface.
    Painting,
    Clean,
}

/// Paint progress of one surface. Kept as plain data so a suspended painter
/// can be inspected and compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaintCursor {
    pub phase: PaintPhase,
    pub group_index: usize,
}

impl PaintCursor {
    pub const fn new() -> Self {
        Self {
            phase: PaintPhase::Painting,
            group_index: 0,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.phase == PaintPhase::Painting
    }

    /// Restarts painting from the first group.
    pub(crate) fn reopen(&mut self) {
        self.phase = PaintPhase::Painting;
        self.group_index = 0;
    }

    pub(crate) fn finish(&mut self) {
        self.phase = PaintPhase::Clean;
        self.group_index = 0;
    }
}

impl Default for PaintCursor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reopen_restarts_from_the_first_group() {
        let mut cursor = PaintCursor::new();
        cursor.group_index = 3;
        cursor.finish();
        assert!(!cursor.is_dirty());
        assert_eq!(cursor.group_index, 0);

        cursor.group_index = 2;
        cursor.reopen();
        assert!(cursor.is_dirty());
        assert_eq!(cursor.group_index, 0);
    }

    #[test]
    fn serializes_suspended_state() {
        let cursor = PaintCursor {
            phase: PaintPhase::Painting,
            group_index: 2,
        };
        let encoded = serde_json::to_string(&cursor).unwrap();
        let decoded: PaintCursor = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, cursor);
    }
}
