use crate::config::SelectionMode;
use crate::schedule::BlockRange;

/// Decides which blocks the next write targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    mode: SelectionMode,
    block_count: usize,
    cursor: usize,
    anchor: Option<usize>,
}

impl Selection {
    pub fn new(mode: SelectionMode, block_count: usize) -> Self {
        Self {
            mode,
            block_count: block_count.max(1),
            cursor: 0,
            anchor: None,
        }
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_anchored(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let last = (self.block_count - 1) as isize;
        let next = (self.cursor as isize + delta).clamp(0, last);
        self.cursor = next as usize;
    }

    pub fn set_cursor(&mut self, index: usize) {
        self.cursor = index.min(self.block_count - 1);
    }

    /// Pointer press on `index`. Only drag mode starts a range.
    pub fn press(&mut self, index: usize) {
        self.set_cursor(index);
        self.anchor = match self.mode {
            SelectionMode::SingleCell => None,
            SelectionMode::DragRange => Some(self.cursor),
        };
    }

    pub fn drag_to(&mut self, index: usize) {
        if self.anchor.is_some() {
            self.set_cursor(index);
        }
    }

    /// Keyboard counterpart of press/release: anchors at the cursor, or drops
    /// an existing anchor. Returns whether a range is now being extended.
    pub fn toggle_anchor(&mut self) -> bool {
        if self.mode != SelectionMode::DragRange {
            return false;
        }
        self.anchor = match self.anchor {
            Some(_) => None,
            None => Some(self.cursor),
        };
        self.anchor.is_some()
    }

    pub fn clear_anchor(&mut self) {
        self.anchor = None;
    }

    pub fn target(&self) -> BlockRange {
        match (self.mode, self.anchor) {
            (SelectionMode::DragRange, Some(anchor)) => BlockRange::spanning(anchor, self.cursor),
            _ => BlockRange::single(self.cursor),
        }
    }

    pub fn is_targeted(&self, index: usize) -> bool {
        self.target().contains(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_cell_always_targets_the_cursor() {
        let mut selection = Selection::new(SelectionMode::SingleCell, 36);
        selection.press(4);
        selection.drag_to(9);
        assert!(!selection.toggle_anchor());
        assert_eq!(selection.target(), BlockRange::single(4));
    }

    #[test]
    fn drag_normalizes_reversed_ranges() {
        let mut selection = Selection::new(SelectionMode::DragRange, 48);
        selection.press(10);
        selection.drag_to(6);
        assert_eq!(selection.target(), BlockRange::new(6, 10).expect("range"));
        assert!(selection.is_targeted(8));
        assert!(!selection.is_targeted(11));
    }

    #[test]
    fn keyboard_anchor_extends_with_cursor_moves() {
        let mut selection = Selection::new(SelectionMode::DragRange, 48);
        selection.set_cursor(2);
        assert!(selection.toggle_anchor());
        selection.move_cursor(3);
        assert_eq!(selection.target(), BlockRange::new(2, 5).expect("range"));
        assert!(!selection.toggle_anchor());
        assert_eq!(selection.target(), BlockRange::single(5));
    }

    #[test]
    fn cursor_is_clamped_to_the_grid() {
        let mut selection = Selection::new(SelectionMode::DragRange, 36);
        selection.move_cursor(-5);
        assert_eq!(selection.cursor(), 0);
        selection.move_cursor(100);
        assert_eq!(selection.cursor(), 35);
        selection.press(99);
        assert_eq!(selection.target(), BlockRange::single(35));
    }
}
