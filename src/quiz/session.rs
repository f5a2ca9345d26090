use std::collections::HashMap;

use log::{debug, info};
use thiserror::Error;

use crate::quiz::{Question, QuizAnswer, OPTION_COUNT, OPTION_LABELS};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("Invalid test configuration: {0}")]
    InvalidConfig(String),

    #[error("Question {0} is not part of this test")]
    UnknownQuestion(u32),

    #[error("Option {0} is out of range")]
    OptionOutOfRange(usize),

    #[error("The test is not in progress")]
    NotInProgress,

    #[error("The test has already been started")]
    NotConfiguring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Configuring,
    InProgress,
    Submitted,
}

/// Result of a single countdown step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    Running { remaining_seconds: u32 },
    /// The clock hit zero and the test was submitted. Reported once.
    Expired(Score),
    /// The session is not running, nothing changed.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Score {
    pub correct: usize,
    pub answered: usize,
    pub total: usize,
}

impl Score {
    pub fn percentage(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        ((self.correct as f64 / self.total as f64) * 100.0).round() as u32
    }
}

/// A fixed-length multiple choice test with a countdown.
///
/// The session is a plain state machine: the clock is driven from the outside
/// through [`TestSession::tick`], see [`crate::quiz::countdown`].
#[derive(Debug, Default)]
pub struct TestSession {
    questions: Vec<Question>,
    answers: HashMap<u32, usize>,
    current_index: usize,
    remaining_seconds: u32,
    phase: Phase,
}

impl TestSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(
        &mut self,
        questions: Vec<Question>,
        duration_seconds: u32,
    ) -> Result<(), SessionError> {
        if self.phase != Phase::Configuring {
            return Err(SessionError::NotConfiguring);
        }
        if questions.is_empty() {
            return Err(SessionError::InvalidConfig("no questions".to_string()));
        }
        if duration_seconds == 0 {
            return Err(SessionError::InvalidConfig(
                "duration must be positive".to_string(),
            ));
        }

        info!(
            "Starting test: {} questions, {} seconds",
            questions.len(),
            duration_seconds
        );
        self.questions = questions;
        self.answers.clear();
        self.current_index = 0;
        self.remaining_seconds = duration_seconds;
        self.phase = Phase::InProgress;
        Ok(())
    }

    pub fn select_answer(
        &mut self,
        question_id: u32,
        option_index: usize,
    ) -> Result<QuizAnswer, SessionError> {
        if self.phase != Phase::InProgress {
            return Err(SessionError::NotInProgress);
        }
        if !self.questions.iter().any(|q| q.id == question_id) {
            return Err(SessionError::UnknownQuestion(question_id));
        }
        if option_index >= OPTION_COUNT {
            return Err(SessionError::OptionOutOfRange(option_index));
        }

        self.answers.insert(question_id, option_index);
        Ok(QuizAnswer {
            question_id,
            option_index,
        })
    }

    /// Answers the question currently on screen.
    pub fn answer_current(&mut self, option_index: usize) -> Result<QuizAnswer, SessionError> {
        let id = self
            .current_question()
            .map(|q| q.id)
            .ok_or(SessionError::NotInProgress)?;
        self.select_answer(id, option_index)
    }

    /// Moves to `index`, clamped to the question range.
    pub fn go_to(&mut self, index: isize) -> usize {
        if self.questions.is_empty() {
            return 0;
        }
        let last = self.questions.len() - 1;
        self.current_index = index.clamp(0, last as isize) as usize;
        self.current_index
    }

    pub fn next(&mut self) -> usize {
        self.go_to(self.current_index as isize + 1)
    }

    pub fn previous(&mut self) -> usize {
        self.go_to(self.current_index as isize - 1)
    }

    pub fn tick(&mut self) -> Tick {
        if self.phase != Phase::InProgress {
            return Tick::Ignored;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds > 0 {
            return Tick::Running {
                remaining_seconds: self.remaining_seconds,
            };
        }

        info!("Time is up, submitting the test");
        self.phase = Phase::Submitted;
        Tick::Expired(self.score())
    }

    /// Submits the test. Returns the score on the first call only.
    pub fn submit(&mut self) -> Option<Score> {
        if self.phase != Phase::InProgress {
            debug!("Ignoring submit in phase {:?}", self.phase);
            return None;
        }
        self.phase = Phase::Submitted;
        Some(self.score())
    }

    pub fn score(&self) -> Score {
        let correct = self
            .questions
            .iter()
            .filter(|q| self.answers.get(&q.id).is_some_and(|a| q.is_correct(*a)))
            .count();
        Score {
            correct,
            answered: self.answers.len(),
            total: self.questions.len(),
        }
    }

    /// One line per question: what was chosen and what was right.
    pub fn review(&self) -> Vec<String> {
        self.questions
            .iter()
            .enumerate()
            .map(|(i, q)| {
                let chosen = self.answers.get(&q.id).copied();
                let mark = match chosen {
                    Some(a) if q.is_correct(a) => "✅",
                    Some(_) => "❌",
                    None => "⏭",
                };
                let chosen = chosen
                    .map(|a| OPTION_LABELS[a].to_string())
                    .unwrap_or_else(|| "-".to_string());
                let mut line = format!(
                    "{} Q{}: you chose {}, answer {} ({})",
                    mark,
                    i + 1,
                    chosen,
                    OPTION_LABELS[q.correct_option],
                    q.correct_text()
                );
                if let Some(explanation) = &q.explanation {
                    line.push_str(&format!(" - {}", explanation));
                }
                line
            })
            .collect()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn answer_for(&self, question_id: u32) -> Option<usize> {
        self.answers.get(&question_id).copied()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questions(n: u32) -> Vec<Question> {
        (1..=n)
            .map(|id| {
                Question::new(
                    id,
                    format!("Question {}", id),
                    ["a".into(), "b".into(), "c".into(), "d".into()],
                    (id as usize) % OPTION_COUNT,
                )
            })
            .collect()
    }

    #[test]
    fn start_initialises_session() {
        let mut session = TestSession::new();
        session.start(questions(3), 90).unwrap();

        assert_eq!(session.phase(), Phase::InProgress);
        assert_eq!(session.remaining_seconds(), 90);
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.score().answered, 0);
    }

    #[test]
    fn start_rejects_empty_or_zero_duration() {
        let mut session = TestSession::new();
        assert!(matches!(
            session.start(Vec::new(), 60),
            Err(SessionError::InvalidConfig(_))
        ));
        assert!(matches!(
            session.start(questions(2), 0),
            Err(SessionError::InvalidConfig(_))
        ));
        assert_eq!(session.phase(), Phase::Configuring);

        session.start(questions(2), 10).unwrap();
        assert_eq!(
            session.start(questions(2), 10),
            Err(SessionError::NotConfiguring)
        );
    }

    #[test]
    fn last_answer_wins() {
        let mut session = TestSession::new();
        session.start(questions(2), 60).unwrap();

        session.select_answer(2, 0).unwrap();
        session.select_answer(2, 3).unwrap();
        session.select_answer(2, 1).unwrap();

        assert_eq!(session.answer_for(2), Some(1));
        assert_eq!(session.score().answered, 1);
    }

    #[test]
    fn select_answer_validates_input() {
        let mut session = TestSession::new();
        session.start(questions(2), 60).unwrap();

        assert_eq!(
            session.select_answer(7, 0),
            Err(SessionError::UnknownQuestion(7))
        );
        assert_eq!(
            session.select_answer(1, 4),
            Err(SessionError::OptionOutOfRange(4))
        );
        assert_eq!(session.answer_for(1), None);
    }

    #[test]
    fn go_to_clamps_to_bounds() {
        let mut session = TestSession::new();
        session.start(questions(4), 60).unwrap();

        assert_eq!(session.go_to(-3), 0);
        assert_eq!(session.go_to(2), 2);
        assert_eq!(session.go_to(99), 3);
        assert_eq!(session.next(), 3);
        assert_eq!(session.go_to(0), 0);
        assert_eq!(session.previous(), 0);
    }

    #[test]
    fn expiry_fires_once_and_submits() {
        let mut session = TestSession::new();
        session.start(questions(4), 5).unwrap();

        let mut expired = 0;
        for _ in 0..5 {
            if let Tick::Expired(_) = session.tick() {
                expired += 1;
            }
        }
        assert_eq!(session.remaining_seconds(), 0);
        assert_eq!(expired, 1);
        assert_eq!(session.phase(), Phase::Submitted);

        for _ in 0..3 {
            assert_eq!(session.tick(), Tick::Ignored);
        }
        assert_eq!(session.remaining_seconds(), 0);
    }

    #[test]
    fn submitted_session_is_frozen() {
        let mut session = TestSession::new();
        session.start(questions(4), 30).unwrap();
        session.select_answer(1, 1).unwrap();

        let score = session.submit().unwrap();
        assert_eq!(score.correct, 1);
        assert_eq!(score.total, 4);
        assert_eq!(score.percentage(), 25);

        assert_eq!(session.submit(), None);
        assert_eq!(session.select_answer(2, 2), Err(SessionError::NotInProgress));
        assert_eq!(session.tick(), Tick::Ignored);
        assert_eq!(session.remaining_seconds(), 30);
    }

    #[test]
    fn ticks_before_start_are_ignored() {
        let mut session = TestSession::new();
        assert_eq!(session.tick(), Tick::Ignored);
        assert_eq!(session.submit(), None);
    }

    #[test]
    fn review_marks_each_question() {
        let mut session = TestSession::new();
        let mut qs = questions(3);
        qs[0] = qs[0].clone().with_explanation("because");
        session.start(qs, 30).unwrap();
        session.answer_current(1).unwrap();
        session.next();
        session.answer_current(0).unwrap();
        session.submit();

        let review = session.review();
        assert_eq!(review.len(), 3);
        assert!(review[0].starts_with("✅ Q1"));
        assert!(review[0].ends_with("- because"));
        assert!(review[1].starts_with("❌ Q2"));
        assert!(review[2].starts_with("⏭ Q3"));
    }
}
