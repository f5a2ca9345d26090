pub mod ai_helper;
pub mod bank;
pub mod countdown;
pub mod session;

pub use countdown::TimedTest;
pub use session::{Score, TestSession};

/// Every practice question is a four-option multiple choice.
pub const OPTION_COUNT: usize = 4;
pub const OPTION_LABELS: [&str; OPTION_COUNT] = ["A", "B", "C", "D"];

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Question {
    pub id: u32,
    pub prompt: String,
    pub options: [String; OPTION_COUNT],
    pub correct_option: usize,
    pub explanation: Option<String>,
}

impl Question {
    pub fn new(
        id: u32,
        prompt: String,
        options: [String; OPTION_COUNT],
        correct_option: usize,
    ) -> Self {
        Self {
            id,
            prompt,
            options,
            correct_option,
            explanation: None,
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    pub fn is_correct(&self, option_index: usize) -> bool {
        option_index == self.correct_option
    }

    pub fn correct_text(&self) -> &str {
        &self.options[self.correct_option]
    }

    /// Renders the prompt with lettered options for a chat message.
    pub fn render(&self, number: usize, total: usize) -> String {
        let options = self
            .options
            .iter()
            .zip(OPTION_LABELS)
            .map(|(text, label)| format!("{}. {}", label, text))
            .collect::<Vec<_>>()
            .join("\n");
        format!("Question {} of {}:\n{}\n\n{}", number, total, self.prompt, options)
    }

    /// The question as it should be read aloud.
    pub fn spoken(&self) -> String {
        let options = self
            .options
            .iter()
            .zip(OPTION_LABELS)
            .map(|(text, label)| format!("Option {}: {}.", label, text))
            .collect::<Vec<_>>()
            .join(" ");
        format!("{} {}", self.prompt, options)
    }
}

/// Maps an "A".."D" label (case-insensitive) to an option index.
pub fn option_index_from_label(label: &str) -> Option<usize> {
    let label = label.trim();
    OPTION_LABELS
        .iter()
        .position(|l| l.eq_ignore_ascii_case(label))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QuizAnswer {
    pub question_id: u32,
    pub option_index: usize,
}

/// What the user picked in the practice-test wizard.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TestConfig {
    pub exam: String,
    pub subject: String,
    pub question_count: usize,
    pub seconds_per_question: u32,
}

impl TestConfig {
    pub fn duration_seconds(&self) -> u32 {
        self.seconds_per_question
            .saturating_mul(self.question_count as u32)
    }
}
