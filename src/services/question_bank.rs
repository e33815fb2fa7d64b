//! Question content provider consumed at room creation time.
//!
//! The coordinator treats question generation as an external collaborator;
//! this module defines the narrow contract and ships a JSON-file-backed
//! bank with a baked-in default set for local runs and tests.

use std::{fs, io::ErrorKind, path::Path};

use futures::future::BoxFuture;
use rand::seq::SliceRandom;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::ServiceError,
    state::room::{Difficulty, QuizQuestion},
};

/// Error raised when the provider cannot satisfy a question request.
#[derive(Debug, Error)]
pub enum QuestionSourceError {
    /// The bank does not hold enough questions for the requested filter.
    #[error(
        "only {available} question(s) available for topic `{topic}` at {difficulty:?} difficulty, {requested} requested"
    )]
    NotEnough {
        /// Requested topic.
        topic: String,
        /// Requested difficulty.
        difficulty: Difficulty,
        /// Questions available after filtering.
        available: usize,
        /// Questions requested.
        requested: usize,
    },
}

impl From<QuestionSourceError> for ServiceError {
    fn from(err: QuestionSourceError) -> Self {
        ServiceError::InvalidInput(err.to_string())
    }
}

/// Contract of the external question content provider.
pub trait QuestionSource: Send + Sync {
    /// Produce an immutable question set for a new room.
    fn fetch(
        &self,
        topic: String,
        difficulty: Difficulty,
        count: usize,
    ) -> BoxFuture<'static, Result<Vec<QuizQuestion>, QuestionSourceError>>;
}

/// One bank entry as stored in the JSON question file.
#[derive(Debug, Clone, Deserialize)]
pub struct BankQuestion {
    /// Topic this question belongs to.
    pub topic: String,
    /// Difficulty rating of the question.
    pub difficulty: Difficulty,
    /// Prompt text.
    pub prompt: String,
    /// Answer options.
    pub options: Vec<String>,
    /// Index of the correct option.
    pub correct_answer: usize,
    /// Explanation revealed after answering.
    pub explanation: String,
    /// Per-question time limit in whole seconds.
    pub time_limit_secs: u32,
}

/// Question bank loaded from disk, falling back to a built-in set.
#[derive(Debug, Clone)]
pub struct JsonQuestionBank {
    entries: Vec<BankQuestion>,
}

impl JsonQuestionBank {
    /// Load the bank from the configured path, or use the built-in set.
    pub fn load(config: &AppConfig) -> Self {
        let Some(path) = config.question_bank_path.as_deref() else {
            return Self::default();
        };

        match Self::from_file(path) {
            Ok(bank) => {
                info!(path = %path.display(), count = bank.entries.len(), "loaded question bank");
                bank
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to load question bank; using built-in set"
                );
                Self::default()
            }
        }
    }

    fn from_file(path: &Path) -> Result<Self, String> {
        let contents = fs::read_to_string(path).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                "file not found".to_owned()
            } else {
                err.to_string()
            }
        })?;
        let entries: Vec<BankQuestion> =
            serde_json::from_str(&contents).map_err(|err| err.to_string())?;
        Ok(Self { entries })
    }
}

impl Default for JsonQuestionBank {
    fn default() -> Self {
        Self {
            entries: default_bank(),
        }
    }
}

impl QuestionSource for JsonQuestionBank {
    fn fetch(
        &self,
        topic: String,
        difficulty: Difficulty,
        count: usize,
    ) -> BoxFuture<'static, Result<Vec<QuizQuestion>, QuestionSourceError>> {
        let entries = self.entries.clone();
        Box::pin(async move {
            let mut candidates: Vec<&BankQuestion> = entries
                .iter()
                .filter(|q| q.difficulty == difficulty && q.topic.eq_ignore_ascii_case(&topic))
                .collect();

            // Unknown topics fall back to the whole bank at the requested
            // difficulty so small banks remain usable.
            if candidates.len() < count {
                candidates = entries
                    .iter()
                    .filter(|q| q.difficulty == difficulty)
                    .collect();
            }

            if candidates.len() < count {
                return Err(QuestionSourceError::NotEnough {
                    topic,
                    difficulty,
                    available: candidates.len(),
                    requested: count,
                });
            }

            let mut rng = rand::rng();
            candidates.shuffle(&mut rng);

            Ok(candidates
                .into_iter()
                .take(count)
                .map(|entry| QuizQuestion {
                    id: Uuid::new_v4(),
                    prompt: entry.prompt.clone(),
                    options: entry.options.clone(),
                    correct_answer: entry.correct_answer,
                    explanation: entry.explanation.clone(),
                    time_limit_secs: entry.time_limit_secs,
                })
                .collect())
        })
    }
}

/// Built-in question set shipped with the binary.
fn default_bank() -> Vec<BankQuestion> {
    fn entry(
        topic: &str,
        difficulty: Difficulty,
        prompt: &str,
        options: [&str; 4],
        correct_answer: usize,
        explanation: &str,
        time_limit_secs: u32,
    ) -> BankQuestion {
        BankQuestion {
            topic: topic.to_owned(),
            difficulty,
            prompt: prompt.to_owned(),
            options: options.map(str::to_owned).to_vec(),
            correct_answer,
            explanation: explanation.to_owned(),
            time_limit_secs,
        }
    }

    vec![
        entry(
            "general",
            Difficulty::Easy,
            "How many continents are there on Earth?",
            ["Five", "Six", "Seven", "Eight"],
            2,
            "The usual count is seven: Africa, Antarctica, Asia, Europe, North America, Oceania, and South America.",
            20,
        ),
        entry(
            "general",
            Difficulty::Easy,
            "What color do you get by mixing blue and yellow paint?",
            ["Green", "Purple", "Orange", "Brown"],
            0,
            "Blue and yellow pigments subtract to green.",
            15,
        ),
        entry(
            "general",
            Difficulty::Easy,
            "Which planet is known as the Red Planet?",
            ["Venus", "Mars", "Jupiter", "Mercury"],
            1,
            "Iron oxide dust gives Mars its reddish appearance.",
            15,
        ),
        entry(
            "general",
            Difficulty::Easy,
            "How many minutes are in two hours?",
            ["60", "90", "120", "150"],
            2,
            "Two hours is 2 x 60 = 120 minutes.",
            15,
        ),
        entry(
            "science",
            Difficulty::Medium,
            "What is the chemical symbol for potassium?",
            ["P", "Po", "K", "Pt"],
            2,
            "Potassium's symbol K comes from its Latin name, kalium.",
            20,
        ),
        entry(
            "science",
            Difficulty::Medium,
            "Which gas makes up most of Earth's atmosphere?",
            ["Oxygen", "Carbon dioxide", "Nitrogen", "Argon"],
            2,
            "Nitrogen accounts for roughly 78% of the atmosphere.",
            20,
        ),
        entry(
            "history",
            Difficulty::Medium,
            "In which year did the Berlin Wall fall?",
            ["1987", "1989", "1991", "1993"],
            1,
            "The wall was opened on 9 November 1989.",
            25,
        ),
        entry(
            "history",
            Difficulty::Medium,
            "Which civilization built Machu Picchu?",
            ["Aztec", "Maya", "Inca", "Olmec"],
            2,
            "Machu Picchu was built by the Inca in the 15th century.",
            25,
        ),
        entry(
            "science",
            Difficulty::Hard,
            "What is the approximate speed of light in a vacuum?",
            [
                "300 km per second",
                "3,000 km per second",
                "30,000 km per second",
                "300,000 km per second",
            ],
            3,
            "Light travels at about 299,792 km per second in a vacuum.",
            30,
        ),
        entry(
            "history",
            Difficulty::Hard,
            "Which treaty ended the Thirty Years' War?",
            [
                "Treaty of Versailles",
                "Peace of Westphalia",
                "Treaty of Utrecht",
                "Congress of Vienna",
            ],
            1,
            "The Peace of Westphalia of 1648 ended the Thirty Years' War.",
            30,
        ),
        entry(
            "general",
            Difficulty::Hard,
            "How many keys does a standard piano have?",
            ["76", "84", "88", "96"],
            2,
            "A full-size piano has 88 keys: 52 white and 36 black.",
            25,
        ),
        entry(
            "science",
            Difficulty::Hard,
            "Which particle carries the electromagnetic force?",
            ["Gluon", "Photon", "W boson", "Higgs boson"],
            1,
            "The photon is the gauge boson of electromagnetism.",
            30,
        ),
    ]
}
