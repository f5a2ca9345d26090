pub mod store;

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use store::JsonFileStore;

pub const STAGE_PROFILE: &str = "profile";
pub const STAGE_LEARNING_STYLE: &str = "learning_style";
pub const STAGE_CAREER_MATCHES: &str = "career_matches";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LearningStyle {
    Visual,
    Auditory,
    Kinesthetic,
    Reading,
}

impl LearningStyle {
    /// Also the tie-break order when picking the dominant style.
    pub const ALL: [LearningStyle; 4] = [
        LearningStyle::Visual,
        LearningStyle::Auditory,
        LearningStyle::Kinesthetic,
        LearningStyle::Reading,
    ];

    pub fn study_tip(&self) -> &'static str {
        match self {
            LearningStyle::Visual => "use diagrams, mind maps and colour-coded notes",
            LearningStyle::Auditory => "read notes aloud and explain topics to a friend",
            LearningStyle::Kinesthetic => "practise with past questions and hands-on examples",
            LearningStyle::Reading => "summarise textbooks and rewrite key points",
        }
    }
}

impl fmt::Display for LearningStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LearningStyle::Visual => "Visual",
            LearningStyle::Auditory => "Auditory",
            LearningStyle::Kinesthetic => "Kinesthetic",
            LearningStyle::Reading => "Reading",
        };
        f.write_str(name)
    }
}

pub struct StyleQuestion {
    pub id: &'static str,
    pub prompt: &'static str,
    pub options: [(&'static str, LearningStyle); 4],
}

pub static STYLE_QUESTIONS: [StyleQuestion; 5] = [
    StyleQuestion {
        id: "style_q1",
        prompt: "When you learn something new, what helps you most?",
        options: [
            ("Seeing diagrams or videos", LearningStyle::Visual),
            ("Listening to someone explain it", LearningStyle::Auditory),
            ("Trying it out myself", LearningStyle::Kinesthetic),
            ("Reading about it", LearningStyle::Reading),
        ],
    },
    StyleQuestion {
        id: "style_q2",
        prompt: "How do you remember a phone number?",
        options: [
            ("I picture the digits", LearningStyle::Visual),
            ("I say it out loud", LearningStyle::Auditory),
            ("I dial it a few times", LearningStyle::Kinesthetic),
            ("I write it down", LearningStyle::Reading),
        ],
    },
    StyleQuestion {
        id: "style_q3",
        prompt: "Before an exam you prefer to...",
        options: [
            ("Go over charts and highlighted notes", LearningStyle::Visual),
            ("Discuss topics in a study group", LearningStyle::Auditory),
            ("Solve lots of past questions", LearningStyle::Kinesthetic),
            ("Re-read the textbook", LearningStyle::Reading),
        ],
    },
    StyleQuestion {
        id: "style_q4",
        prompt: "Which class do you enjoy most?",
        options: [
            ("One with lots of slides and drawings", LearningStyle::Visual),
            ("One with a great storyteller", LearningStyle::Auditory),
            ("A practical or lab session", LearningStyle::Kinesthetic),
            ("One with good handouts", LearningStyle::Reading),
        ],
    },
    StyleQuestion {
        id: "style_q5",
        prompt: "When you get directions to a new place you...",
        options: [
            ("Look at a map", LearningStyle::Visual),
            ("Ask someone to tell you", LearningStyle::Auditory),
            ("Just start walking and figure it out", LearningStyle::Kinesthetic),
            ("Follow written directions", LearningStyle::Reading),
        ],
    },
];

/// The questionnaire step stored in a dialogue may outlive the questionnaire.
pub fn style_question(step: usize) -> Option<&'static StyleQuestion> {
    STYLE_QUESTIONS.get(step)
}

impl StyleQuestion {
    pub fn style_for(&self, option_text: &str) -> Option<LearningStyle> {
        self.options
            .iter()
            .find(|(text, _)| *text == option_text)
            .map(|(_, style)| *style)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningStyleResult {
    pub percentages: BTreeMap<LearningStyle, u32>,
    pub dominant: Option<LearningStyle>,
}

/// Share of each style among `answers`, rounded to whole percent.
pub fn learning_style_percentages(
    answers: &BTreeMap<String, LearningStyle>,
) -> LearningStyleResult {
    let total = answers.len();
    let count = |style: LearningStyle| answers.values().filter(|s| **s == style).count();

    let percentages = LearningStyle::ALL
        .iter()
        .map(|style| {
            let share = if total == 0 {
                0
            } else {
                ((count(*style) as f64 / total as f64) * 100.0).round() as u32
            };
            (*style, share)
        })
        .collect();

    // max_by_key keeps the last maximum, so walk the styles in reverse
    let dominant = LearningStyle::ALL
        .iter()
        .rev()
        .map(|style| (*style, count(*style)))
        .filter(|(_, n)| *n > 0)
        .max_by_key(|(_, n)| *n)
        .map(|(style, _)| style);

    LearningStyleResult {
        percentages,
        dominant,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStage {
    pub name: String,
    pub exam: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CareerMatch {
    pub title: String,
    pub score: u8,
    pub reason: String,
}

/// Everything the onboarding stages produced, keyed by stage name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OnboardingRecord {
    stages: BTreeMap<String, serde_json::Value>,
}

impl OnboardingRecord {
    /// Shallow merge: the stage's previous result is replaced as a whole.
    pub fn merge_stage(&mut self, stage: &str, result: serde_json::Value) {
        self.stages.insert(stage.to_string(), result);
    }

    pub fn stage<T: DeserializeOwned>(&self, stage: &str) -> Option<T> {
        self.stages
            .get(stage)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn has_stage(&self, stage: &str) -> bool {
        self.stages.contains_key(stage)
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn profile(&self) -> LearnerProfile {
        let profile: Option<ProfileStage> = self.stage(STAGE_PROFILE);
        let style: Option<LearningStyleResult> = self.stage(STAGE_LEARNING_STYLE);
        let careers: Vec<CareerMatch> = self.stage(STAGE_CAREER_MATCHES).unwrap_or_default();

        LearnerProfile {
            name: profile.as_ref().map(|p| p.name.clone()),
            exam: profile.map(|p| p.exam),
            learning_style: style.and_then(|s| s.dominant),
            careers: careers.into_iter().map(|c| c.title).collect(),
        }
    }
}

/// What the AI prompts get to know about the student.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LearnerProfile {
    pub name: Option<String>,
    pub exam: Option<String>,
    pub learning_style: Option<LearningStyle>,
    pub careers: Vec<String>,
}

impl LearnerProfile {
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(name) = &self.name {
            parts.push(format!("The student's name is {}.", name));
        }
        if let Some(exam) = &self.exam {
            parts.push(format!("They are preparing for {}.", exam));
        }
        if let Some(style) = &self.learning_style {
            parts.push(format!(
                "They are a {} learner, so {}.",
                style.to_string().to_lowercase(),
                style.study_tip()
            ));
        }
        if !self.careers.is_empty() {
            parts.push(format!("Careers of interest: {}.", self.careers.join(", ")));
        }
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answers(pairs: &[(&str, LearningStyle)]) -> BTreeMap<String, LearningStyle> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn percentages_round_and_pick_dominant() {
        let result = learning_style_percentages(&answers(&[
            ("style_q1", LearningStyle::Visual),
            ("style_q2", LearningStyle::Visual),
            ("style_q3", LearningStyle::Auditory),
        ]));

        assert_eq!(result.percentages[&LearningStyle::Visual], 67);
        assert_eq!(result.percentages[&LearningStyle::Auditory], 33);
        assert_eq!(result.percentages[&LearningStyle::Kinesthetic], 0);
        assert_eq!(result.percentages[&LearningStyle::Reading], 0);
        assert_eq!(result.dominant, Some(LearningStyle::Visual));
    }

    #[test]
    fn ties_prefer_earlier_style() {
        let result = learning_style_percentages(&answers(&[
            ("a", LearningStyle::Reading),
            ("b", LearningStyle::Auditory),
        ]));
        assert_eq!(result.dominant, Some(LearningStyle::Auditory));
    }

    #[test]
    fn no_answers_means_no_style() {
        let result = learning_style_percentages(&BTreeMap::new());
        assert!(result.percentages.values().all(|p| *p == 0));
        assert_eq!(result.dominant, None);
    }

    #[test]
    fn style_lookup_by_option_text() {
        let q = &STYLE_QUESTIONS[1];
        assert_eq!(q.style_for("I say it out loud"), Some(LearningStyle::Auditory));
        assert_eq!(q.style_for("something else"), None);
    }

    #[test]
    fn stale_step_has_no_question() {
        assert_eq!(style_question(0).map(|q| q.id), Some("style_q1"));
        assert!(style_question(STYLE_QUESTIONS.len()).is_none());
        assert!(style_question(usize::MAX).is_none());
    }

    #[test]
    fn record_merges_and_builds_profile() {
        let mut record = OnboardingRecord::default();
        record.merge_stage(
            STAGE_PROFILE,
            serde_json::json!({"name": "Ada", "exam": "JAMB"}),
        );
        record.merge_stage(
            STAGE_PROFILE,
            serde_json::json!({"name": "Adaeze", "exam": "WAEC"}),
        );
        let style = learning_style_percentages(&answers(&[("q", LearningStyle::Kinesthetic)]));
        record.merge_stage(STAGE_LEARNING_STYLE, serde_json::to_value(&style).unwrap());

        let profile = record.profile();
        assert_eq!(profile.name.as_deref(), Some("Adaeze"));
        assert_eq!(profile.exam.as_deref(), Some("WAEC"));
        assert_eq!(profile.learning_style, Some(LearningStyle::Kinesthetic));
        assert!(profile.careers.is_empty());
        assert!(profile.describe().contains("kinesthetic learner"));
    }
}
