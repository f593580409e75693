use shared::domain::{Gesture, LessonProgress};

/// Position within a deck of flashcards, driven by committed commands.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonCursor {
    deck_size: usize,
    progress: LessonProgress,
}

impl LessonCursor {
    pub fn new(deck_size: usize) -> Self {
        Self::restore(deck_size, None)
    }

    /// Resumes from saved progress, clamping an index the deck no longer has.
    pub fn restore(deck_size: usize, saved: Option<LessonProgress>) -> Self {
        let deck_size = deck_size.max(1);
        let mut progress = saved.unwrap_or_default();
        progress.index = progress.index.min(deck_size - 1);
        Self {
            deck_size,
            progress,
        }
    }

    pub fn progress(&self) -> LessonProgress {
        self.progress
    }

    /// Applies one command. Returns whether the progress changed.
    pub fn apply(&mut self, command: Gesture) -> bool {
        let before = self.progress;
        match command {
            Gesture::Rest => {}
            Gesture::Next => {
                if self.progress.index + 1 < self.deck_size {
                    self.progress.index += 1;
                    self.progress.show_translation = false;
                } else {
                    self.progress.completed = true;
                }
            }
            Gesture::Prev => {
                if self.progress.index > 0 {
                    self.progress.index -= 1;
                    self.progress.show_translation = false;
                }
            }
            Gesture::Select => {
                self.progress.show_translation = !self.progress.show_translation;
            }
        }
        self.progress != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_and_prev_move_within_deck() {
        let mut cursor = LessonCursor::new(3);
        assert!(!cursor.apply(Gesture::Prev));
        assert!(cursor.apply(Gesture::Next));
        assert!(cursor.apply(Gesture::Next));
        assert_eq!(cursor.progress().index, 2);
        assert!(cursor.apply(Gesture::Prev));
        assert_eq!(cursor.progress().index, 1);
    }

    #[test]
    fn next_on_last_card_completes_lesson() {
        let mut cursor = LessonCursor::new(1);
        assert!(cursor.apply(Gesture::Next));
        assert!(cursor.progress().completed);
        assert!(!cursor.apply(Gesture::Next));
    }

    #[test]
    fn select_toggles_translation_and_moving_hides_it() {
        let mut cursor = LessonCursor::new(4);
        assert!(cursor.apply(Gesture::Select));
        assert!(cursor.progress().show_translation);
        cursor.apply(Gesture::Next);
        assert!(!cursor.progress().show_translation);
    }

    #[test]
    fn rest_changes_nothing() {
        let mut cursor = LessonCursor::new(4);
        assert!(!cursor.apply(Gesture::Rest));
    }

    #[test]
    fn restore_clamps_to_deck() {
        let saved = LessonProgress {
            index: 9,
            completed: false,
            show_translation: true,
        };
        let cursor = LessonCursor::restore(5, Some(saved));
        assert_eq!(cursor.progress().index, 4);
        assert!(cursor.progress().show_translation);
    }
}
