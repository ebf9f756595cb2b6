/// Drag-to-reorder bookkeeping for the item grid

/// Transient drag state over a rendered list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReorderState {
    pub dragged: Option<usize>,
    pub hovered: Option<usize>,
}

impl ReorderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_drag_start(&mut self, index: usize) {
        self.dragged = Some(index);
        self.hovered = None;
    }

    pub fn on_drag_over(&mut self, index: usize) {
        match self.dragged {
            Some(dragged) if dragged != index => self.hovered = Some(index),
            _ => {}
        }
    }

    pub fn on_drag_enter(&mut self, index: usize) {
        self.on_drag_over(index);
    }

    pub fn on_drag_leave(&mut self) {
        self.hovered = None;
    }

    /// Finish the drag over `drop_index`
    ///
    /// Returns the reordered list, or `None` when nothing moved. The drag state
    /// is cleared either way.
    pub fn on_drop<T: Clone>(&mut self, drop_index: usize, items: &[T]) -> Option<Vec<T>> {
        let dragged = self.dragged.take();
        self.hovered = None;

        match dragged {
            Some(from) if from != drop_index && from < items.len() => {
                Some(move_item(items, from, drop_index))
            }
            _ => None,
        }
    }

    /// Drag finished or was cancelled
    pub fn on_drag_end(&mut self) {
        self.dragged = None;
        self.hovered = None;
    }

    pub fn is_reordering(&self) -> bool {
        self.dragged.is_some()
    }
}

/// Remove the element at `from`, then insert it at `to`
///
/// `to` is interpreted after the removal, so moving down lands one slot
/// further than "insert before the element currently at `to`".
pub fn move_item<T: Clone>(items: &[T], from: usize, to: usize) -> Vec<T> {
    let mut reordered = items.to_vec();
    if from >= reordered.len() {
        return reordered;
    }
    let moved = reordered.remove(from);
    let to = to.min(reordered.len());
    reordered.insert(to, moved);
    reordered
}

/// Drag data type set by item cards, marking a reorder inside the panel
pub const REORDER_MIME: &str = "application/x-pinex-index";

/// True when a drag carries new content (files, links or text) rather than an
/// item being reordered inside the panel
pub fn is_external_drag<S: AsRef<str>>(types: &[S], file_count: usize) -> bool {
    if types.iter().any(|t| t.as_ref() == REORDER_MIME) {
        return false;
    }
    file_count > 0
        || types
            .iter()
            .any(|t| matches!(t.as_ref(), "text/uri-list" | "text/plain" | "Files"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_down_uses_splice_semantics() {
        let items = vec!["a", "b", "c", "d"];

        assert_eq!(move_item(&items, 0, 2), vec!["b", "c", "a", "d"]);
    }

    #[test]
    fn test_move_up() {
        let items = vec!["a", "b", "c", "d"];

        assert_eq!(move_item(&items, 3, 1), vec!["a", "d", "b", "c"]);
    }

    #[test]
    fn test_move_past_end_clamps() {
        let items = vec!["a", "b", "c"];

        assert_eq!(move_item(&items, 0, 10), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_drop_reorders_and_clears() {
        let mut state = ReorderState::new();
        state.on_drag_start(0);
        state.on_drag_over(2);
        assert_eq!(state.hovered, Some(2));

        let result = state.on_drop(2, &["a", "b", "c", "d"]);

        assert_eq!(result, Some(vec!["b", "c", "a", "d"]));
        assert_eq!(state, ReorderState::default());
    }

    #[test]
    fn test_drop_on_self_is_noop() {
        let mut state = ReorderState::new();
        state.on_drag_start(1);

        assert_eq!(state.on_drop(1, &["a", "b"]), None);
        assert!(!state.is_reordering());
    }

    #[test]
    fn test_drop_without_drag_is_noop() {
        let mut state = ReorderState::new();

        assert_eq!(state.on_drop(1, &["a", "b"]), None);
    }

    #[test]
    fn test_hover_ignores_dragged_index() {
        let mut state = ReorderState::new();
        state.on_drag_over(1);
        assert_eq!(state.hovered, None);

        state.on_drag_start(1);
        state.on_drag_enter(1);
        assert_eq!(state.hovered, None);

        state.on_drag_enter(0);
        assert_eq!(state.hovered, Some(0));
        state.on_drag_leave();
        assert_eq!(state.hovered, None);
    }

    #[test]
    fn test_drag_end_always_clears() {
        let mut state = ReorderState::new();
        state.on_drag_start(2);
        state.on_drag_over(0);

        state.on_drag_end();

        assert!(!state.is_reordering());
        assert_eq!(state.hovered, None);
    }

    #[test]
    fn test_external_drag_detection() {
        assert!(is_external_drag::<&str>(&[], 1));
        assert!(is_external_drag(&["text/uri-list"], 0));
        assert!(is_external_drag(&["text/html", "text/plain"], 0));
        assert!(!is_external_drag(&["text/html"], 0));
        assert!(!is_external_drag::<&str>(&[], 0));
    }

    #[test]
    fn test_card_drag_is_not_external() {
        assert!(!is_external_drag(&[REORDER_MIME], 0));
        assert!(!is_external_drag(&[REORDER_MIME, "text/plain"], 0));
        assert!(!is_external_drag(&[REORDER_MIME], 1));
    }
}
