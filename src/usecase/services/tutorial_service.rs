//! Lesson progression over the static tutorial catalog.
//!
//! Unlock state is always derived from the completed set; nothing caches it.

use thiserror::Error;

use crate::domain::entities::tutorial::{LessonId, LevelId, TutorialCatalog, TutorialProgress};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TutorialError {
    #[error("level {0} does not exist")]
    UnknownLevel(u32),
    #[error("lesson {lesson} does not exist in level {level}")]
    UnknownLesson { level: u32, lesson: u32 },
    #[error("level {0} is locked until the previous level is completed")]
    LevelLocked(u32),
}

#[derive(Debug, Clone)]
pub struct TutorialService {
    catalog: TutorialCatalog,
    current_level: LevelId,
    current_lesson: LessonId,
    completed: TutorialProgress,
}

impl TutorialService {
    /// Starts at the first lesson of the first level. An empty catalog leaves
    /// the pointer at level 1, lesson 1 with nothing to complete.
    pub fn new(catalog: TutorialCatalog) -> Self {
        let (current_level, current_lesson) = catalog
            .levels
            .first()
            .map(|level| {
                (
                    level.id,
                    level.lessons.first().map(|lesson| lesson.id).unwrap_or(LessonId(1)),
                )
            })
            .unwrap_or((LevelId(1), LessonId(1)));
        Self {
            catalog,
            current_level,
            current_lesson,
            completed: TutorialProgress::new(),
        }
    }

    pub fn catalog(&self) -> &TutorialCatalog {
        &self.catalog
    }

    pub fn current(&self) -> (LevelId, LessonId) {
        (self.current_level, self.current_lesson)
    }

    pub fn completed_count(&self) -> usize {
        self.completed.values().map(|lessons| lessons.len()).sum()
    }

    pub fn is_lesson_completed(&self, level: LevelId, lesson: LessonId) -> bool {
        self.completed
            .get(&level)
            .is_some_and(|lessons| lessons.contains(&lesson))
    }

    /// Marks the current lesson done and moves the pointer one step forward.
    /// At the last lesson of the last level the pointer stays put.
    pub fn complete_current_lesson(&mut self) {
        let Some(level_idx) = self.catalog.level_index(self.current_level) else {
            return;
        };
        let level = &self.catalog.levels[level_idx];
        let Some(lesson_idx) = level
            .lessons
            .iter()
            .position(|lesson| lesson.id == self.current_lesson)
        else {
            return;
        };

        self.completed
            .entry(self.current_level)
            .or_default()
            .insert(self.current_lesson);

        if let Some(next_lesson) = level.lessons.get(lesson_idx + 1) {
            self.current_lesson = next_lesson.id;
        } else if let Some(next_level) = self.catalog.levels.get(level_idx + 1) {
            if let Some(first) = next_level.lessons.first() {
                self.current_level = next_level.id;
                self.current_lesson = first.id;
            }
        }
    }

    /// Level 1 (the first catalog entry) is always open; every later level
    /// needs all lessons of its predecessor.
    pub fn is_level_unlocked(&self, level: LevelId) -> bool {
        match self.catalog.level_index(level) {
            Some(0) => true,
            Some(idx) => {
                let previous = &self.catalog.levels[idx - 1];
                previous
                    .lessons
                    .iter()
                    .all(|lesson| self.is_lesson_completed(previous.id, lesson.id))
            }
            None => false,
        }
    }

    /// Percentage of the level's lessons completed, in [0, 100].
    pub fn level_progress(&self, level: LevelId) -> f64 {
        let Some(entry) = self.catalog.level(level) else {
            return 0.0;
        };
        if entry.lessons.is_empty() {
            return 0.0;
        }
        let done = entry
            .lessons
            .iter()
            .filter(|lesson| self.is_lesson_completed(level, lesson.id))
            .count();
        if done == entry.lessons.len() {
            return 100.0;
        }
        done as f64 / entry.lessons.len() as f64 * 100.0
    }

    pub fn overall_progress(&self) -> f64 {
        let total: usize = self.catalog.levels.iter().map(|level| level.lessons.len()).sum();
        if total == 0 {
            return 0.0;
        }
        self.completed_count() as f64 / total as f64 * 100.0
    }

    pub fn select_lesson(&mut self, level: LevelId, lesson: LessonId) -> Result<(), TutorialError> {
        let entry = self
            .catalog
            .level(level)
            .ok_or(TutorialError::UnknownLevel(level.0))?;
        if !entry.lessons.iter().any(|candidate| candidate.id == lesson) {
            return Err(TutorialError::UnknownLesson {
                level: level.0,
                lesson: lesson.0,
            });
        }
        if !self.is_level_unlocked(level) {
            return Err(TutorialError::LevelLocked(level.0));
        }
        self.current_level = level;
        self.current_lesson = lesson;
        Ok(())
    }
}
