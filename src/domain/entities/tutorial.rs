use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LessonId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    pub id: LessonId,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    pub id: LevelId,
    pub title: String,
    pub description: String,
    pub lessons: Vec<Lesson>,
}

/// Static, ordered lesson catalog. Order of `levels` is unlock order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TutorialCatalog {
    pub levels: Vec<Level>,
}

impl TutorialCatalog {
    pub fn new(levels: Vec<Level>) -> Self {
        Self { levels }
    }

    pub fn builtin() -> Self {
        let outline: [(&str, &str, [&str; 3]); 4] = [
            (
                "Getting Started with Sankalp",
                "Learn the basics of natural language querying",
                [
                    "Introduction to Sankalp Query Language",
                    "Basic data viewing commands",
                    "Understanding your dataset",
                ],
            ),
            (
                "Data Filtering and Selection",
                "Filter and select specific data",
                [
                    "Simple filtering operations",
                    "Comparison operators",
                    "Text-based filtering",
                ],
            ),
            (
                "Data Aggregation",
                "Perform calculations and summarizations",
                [
                    "Basic aggregations (sum, average, count)",
                    "Grouping data",
                    "Advanced calculations",
                ],
            ),
            (
                "Data Visualization",
                "Create charts and graphs",
                [
                    "Creating bar charts",
                    "Line charts and trends",
                    "Advanced visualizations",
                ],
            ),
        ];

        let levels = outline
            .into_iter()
            .zip(1_u32..)
            .map(|((title, description, lessons), level_no)| Level {
                id: LevelId(level_no),
                title: title.to_string(),
                description: description.to_string(),
                lessons: lessons
                    .into_iter()
                    .zip(1_u32..)
                    .map(|(lesson_title, lesson_no)| Lesson {
                        id: LessonId(lesson_no),
                        title: lesson_title.to_string(),
                    })
                    .collect(),
            })
            .collect();

        Self { levels }
    }

    pub fn level(&self, id: LevelId) -> Option<&Level> {
        self.levels.iter().find(|level| level.id == id)
    }

    pub fn level_index(&self, id: LevelId) -> Option<usize> {
        self.levels.iter().position(|level| level.id == id)
    }
}

/// Completed lessons per level.
pub type TutorialProgress = BTreeMap<LevelId, BTreeSet<LessonId>>;

/// Reference queries grouped by topic, served by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleCategory {
    pub category: String,
    pub queries: Vec<String>,
}
