use std::sync::Arc;

use async_trait::async_trait;
use chatgpt::client::ChatGPT;
use chatgpt::config::ChatGPTEngine;
use chatgpt::types::{ChatMessage, CompletionResponse, Role};
use log::{debug, info, warn};
use serde::Deserialize;
use thiserror::Error;

use crate::chat::{Author, ChatLog};
use crate::config::AiSettings;
use crate::onboarding::{CareerMatch, LearnerProfile, LearningStyle};
use crate::quiz::{bank, Question, OPTION_COUNT};

/// How many past tutor messages are sent along with a new question.
const TUTOR_HISTORY: usize = 10;

#[derive(Error, Debug)]
pub enum AiError {
    #[error("No API key configured")]
    MissingCredential,

    #[error("Completion request failed: {0}")]
    Transport(String),

    #[error("Completion did not have the expected shape: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }
}

/// A chat-completion service: ordered messages in, generated text out.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, AiError>;
}

pub struct ChatGptBackend {
    chat_gpt: Option<ChatGPT>,
}

impl ChatGptBackend {
    /// Builds the client. Without a usable key every call fails with
    /// [`AiError::MissingCredential`] and callers fall back.
    pub fn new(settings: &AiSettings) -> Self {
        let chat_gpt = match &settings.api_key {
            Some(key) => match ChatGPT::new(key) {
                Ok(mut gpt) => {
                    gpt.config.engine = engine_for(&settings.model);
                    gpt.config.temperature = settings.temperature;
                    gpt.config.max_tokens = Some(settings.max_tokens);
                    gpt.config.timeout = settings.timeout;
                    Some(gpt)
                }
                Err(e) => {
                    warn!("Unable to set up ChatGPT client: {}", e);
                    None
                }
            },
            None => {
                warn!("CHATGPT_API_KEY is not set, AI features will use offline fallbacks");
                None
            }
        };
        Self { chat_gpt }
    }
}

fn engine_for(model: &str) -> ChatGPTEngine {
    match model {
        "gpt-3.5-turbo" => ChatGPTEngine::Gpt35Turbo,
        "gpt-4" => ChatGPTEngine::Gpt4,
        "gpt-4-32k" => ChatGPTEngine::Gpt4_32k,
        // The engine wants a 'static name; this runs once at startup
        other => ChatGPTEngine::Custom(Box::leak(other.to_string().into_boxed_str())),
    }
}

#[async_trait]
impl CompletionBackend for ChatGptBackend {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, AiError> {
        let chat_gpt = self.chat_gpt.as_ref().ok_or(AiError::MissingCredential)?;
        let history = messages
            .iter()
            .map(|m| ChatMessage {
                role: match m.role {
                    PromptRole::System => Role::System,
                    PromptRole::User => Role::User,
                    PromptRole::Assistant => Role::Assistant,
                },
                content: m.content.clone(),
            })
            .collect::<Vec<_>>();

        let response: CompletionResponse = chat_gpt
            .send_history(&history)
            .await
            .map_err(|e| AiError::Transport(e.to_string()))?;
        let content = response.message().clone().content;
        debug!("Completion: {:?}", content);
        Ok(content)
    }
}

/// The tone the tutor writes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Personality {
    #[default]
    Encouraging,
    Strict,
    Playful,
}

impl Personality {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "encouraging" => Some(Personality::Encouraging),
            "strict" => Some(Personality::Strict),
            "playful" => Some(Personality::Playful),
            _ => None,
        }
    }

    pub fn get_personality(&self) -> &'static str {
        match self {
            Personality::Encouraging => "a warm, encouraging Nigerian secondary school teacher",
            Personality::Strict => "a strict but fair exam coach who values precision",
            Personality::Playful => {
                "a playful older sibling who explains with everyday Naija examples"
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionSource {
    Generated,
    LocalBank,
}

#[derive(Debug, Clone)]
pub struct QuestionSet {
    pub questions: Vec<Question>,
    pub source: QuestionSource,
}

pub struct StudyHelper {
    personality: Personality,
    backend: Arc<dyn CompletionBackend>,
}

impl StudyHelper {
    pub fn new(backend: Arc<dyn CompletionBackend>, personality: Personality) -> Self {
        Self {
            personality,
            backend,
        }
    }

    fn system_prompt(&self, profile: &LearnerProfile) -> String {
        format!(
            "You are StudyMate, an exam preparation tutor for Nigerian students \
            (JAMB, WAEC, NECO). Write like {}. Keep answers short and clear, \
            use plain text without markdown tables. {}",
            self.personality.get_personality(),
            profile.describe()
        )
    }

    /// Answers the last user message in `log`.
    pub async fn tutor_reply(&self, profile: &LearnerProfile, log: &ChatLog) -> String {
        let mut messages = vec![PromptMessage::system(self.system_prompt(profile))];
        messages.extend(log.recent(TUTOR_HISTORY).iter().map(|m| PromptMessage {
            role: match m.author {
                Author::User => PromptRole::User,
                Author::Assistant => PromptRole::Assistant,
            },
            content: m.text.clone(),
        }));

        match self.backend.complete(&messages).await {
            Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
            Ok(_) => {
                warn!("Tutor returned an empty reply");
                fallback_tutor_reply(log)
            }
            Err(e) => {
                warn!("Tutor reply failed: {}", e);
                fallback_tutor_reply(log)
            }
        }
    }

    pub async fn generate_questions(&self, exam: &str, subject: &str, count: usize) -> QuestionSet {
        info!("Generating {} {} questions for {}", count, subject, exam);
        let prompt = format!(
            "Generate exactly {count} multiple choice practice questions for the {exam} exam, \
            subject {subject}. Match the real {exam} syllabus and difficulty. \
            Reply with JSON only, no prose, in this shape: \
            {{\"questions\": [{{\"question\": \"...\", \
            \"options\": [\"...\", \"...\", \"...\", \"...\"], \
            \"correct_answer\": 0, \"explanation\": \"...\"}}]}}. \
            Each question has exactly 4 options and correct_answer is the index (0-3) \
            of the right option. Vary the position of the correct option."
        );
        let messages = [
            PromptMessage::system("You write exam questions and reply with strict JSON."),
            PromptMessage::user(prompt),
        ];

        let parsed = match self.backend.complete(&messages).await {
            Ok(raw) => parse_questions(&raw, count),
            Err(e) => Err(e),
        };
        match parsed {
            Ok(questions) => QuestionSet {
                questions,
                source: QuestionSource::Generated,
            },
            Err(e) => {
                warn!("Question generation failed, using the local bank: {}", e);
                QuestionSet {
                    questions: bank::sample_questions(subject, count),
                    source: QuestionSource::LocalBank,
                }
            }
        }
    }

    pub async fn match_careers(
        &self,
        profile: &LearnerProfile,
        interests: &str,
    ) -> Vec<CareerMatch> {
        let prompt = format!(
            "{} The student describes their interests as: \"{}\". \
            Suggest up to 5 careers that suit them. Reply with JSON only in this shape: \
            {{\"careers\": [{{\"title\": \"...\", \"score\": 0, \"reason\": \"...\"}}]}} \
            where score is a match percentage from 0 to 100.",
            profile.describe(),
            interests
        );
        let messages = [
            PromptMessage::system(
                "You are a career guidance counsellor for Nigerian students. \
                Reply with strict JSON.",
            ),
            PromptMessage::user(prompt),
        ];

        let parsed = match self.backend.complete(&messages).await {
            Ok(raw) => parse_careers(&raw),
            Err(e) => Err(e),
        };
        parsed.unwrap_or_else(|e| {
            warn!("Career matching failed, using defaults: {}", e);
            fallback_careers(profile.learning_style)
        })
    }

    pub async fn study_plan(
        &self,
        profile: &LearnerProfile,
        exam: &str,
        subject: &str,
        weeks: u32,
    ) -> String {
        let prompt = format!(
            "Write a {weeks}-week study plan for {subject} for the {exam} exam. \
            One short paragraph per week with the topics and one practice activity."
        );
        let messages = [
            PromptMessage::system(self.system_prompt(profile)),
            PromptMessage::user(prompt),
        ];

        match self.backend.complete(&messages).await {
            Ok(plan) if !plan.trim().is_empty() => plan.trim().to_string(),
            Ok(_) => fallback_study_plan(profile, exam, subject, weeks),
            Err(e) => {
                warn!("Study plan generation failed: {}", e);
                fallback_study_plan(profile, exam, subject, weeks)
            }
        }
    }
}

#[derive(Deserialize)]
struct GeneratedQuestions {
    questions: Vec<GeneratedQuestion>,
}

#[derive(Deserialize)]
struct GeneratedQuestion {
    question: String,
    options: Vec<String>,
    correct_answer: usize,
    #[serde(default)]
    explanation: Option<String>,
}

#[derive(Deserialize)]
struct GeneratedCareers {
    careers: Vec<CareerMatch>,
}

/// Models like to wrap JSON in a markdown fence.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let body = trimmed
        .split_once('\n')
        .map(|(_, rest)| rest)
        .unwrap_or("");
    body.trim_end().trim_end_matches("```").trim()
}

/// Strict parse: every question must be complete, and there must be exactly `count`.
pub fn parse_questions(raw: &str, count: usize) -> Result<Vec<Question>, AiError> {
    let generated: GeneratedQuestions =
        serde_json::from_str(strip_code_fence(raw)).map_err(|e| AiError::Parse(e.to_string()))?;

    if generated.questions.len() != count {
        return Err(AiError::Parse(format!(
            "expected {} questions, got {}",
            count,
            generated.questions.len()
        )));
    }

    generated
        .questions
        .into_iter()
        .enumerate()
        .map(|(i, q)| {
            let number = i + 1;
            if q.question.trim().is_empty() {
                return Err(AiError::Parse(format!("question {} has no text", number)));
            }
            let options: [String; OPTION_COUNT] = q.options.try_into().map_err(|o: Vec<String>| {
                AiError::Parse(format!("question {} has {} options", number, o.len()))
            })?;
            if options.iter().any(|o| o.trim().is_empty()) {
                return Err(AiError::Parse(format!("question {} has an empty option", number)));
            }
            if q.correct_answer >= OPTION_COUNT {
                return Err(AiError::Parse(format!(
                    "question {} has correct_answer {}",
                    number, q.correct_answer
                )));
            }
            let question = Question::new(number as u32, q.question, options, q.correct_answer);
            Ok(match q.explanation {
                Some(explanation) if !explanation.trim().is_empty() => {
                    question.with_explanation(explanation)
                }
                _ => question,
            })
        })
        .collect()
}

pub fn parse_careers(raw: &str) -> Result<Vec<CareerMatch>, AiError> {
    let generated: GeneratedCareers =
        serde_json::from_str(strip_code_fence(raw)).map_err(|e| AiError::Parse(e.to_string()))?;
    if generated.careers.is_empty() {
        return Err(AiError::Parse("no careers".to_string()));
    }
    if let Some(bad) = generated
        .careers
        .iter()
        .find(|c| c.score > 100 || c.title.trim().is_empty())
    {
        return Err(AiError::Parse(format!("invalid career entry {:?}", bad.title)));
    }

    let mut careers = generated.careers;
    careers.sort_by(|a, b| b.score.cmp(&a.score));
    careers.truncate(5);
    Ok(careers)
}

fn fallback_tutor_reply(log: &ChatLog) -> String {
    let topic = log
        .messages()
        .iter()
        .rev()
        .find(|m| m.author == Author::User)
        .map(|m| m.text.as_str())
        .unwrap_or("your question");
    format!(
        "I can't reach my notes right now. While I reconnect: find \"{}\" in your \
        textbook, write down the key definitions, then try two past questions on it. \
        Ask me again in a moment!",
        topic
    )
}

fn fallback_careers(style: Option<LearningStyle>) -> Vec<CareerMatch> {
    let career = |title: &str, score: u8, reason: &str| CareerMatch {
        title: title.to_string(),
        score,
        reason: reason.to_string(),
    };
    let mut careers = vec![
        career(
            "Medicine and Surgery",
            80,
            "Strong demand across Nigeria and rewards steady study.",
        ),
        career("Computer Science", 78, "Fast growing tech scene in Lagos and beyond."),
        career("Accounting", 72, "Every organisation needs sound financial skills."),
        career("Law", 70, "Good fit for students who enjoy reading and arguing a case."),
        career("Civil Engineering", 68, "Infrastructure growth keeps engineers busy."),
    ];
    let boosted = match style {
        Some(LearningStyle::Visual) => Some("Computer Science"),
        Some(LearningStyle::Auditory) => Some("Law"),
        Some(LearningStyle::Kinesthetic) => Some("Civil Engineering"),
        Some(LearningStyle::Reading) => Some("Accounting"),
        None => None,
    };
    if let Some(title) = boosted {
        for c in careers.iter_mut().filter(|c| c.title == title) {
            c.score = 85;
        }
    }
    careers.sort_by(|a, b| b.score.cmp(&a.score));
    careers
}

fn fallback_study_plan(profile: &LearnerProfile, exam: &str, subject: &str, weeks: u32) -> String {
    let tip = profile
        .learning_style
        .map(|s| s.study_tip())
        .unwrap_or("mix reading, practice questions and short reviews");
    let mut plan = format!("{}-week {} plan for {}:\n", weeks, subject, exam);
    for week in 1..=weeks.max(1) {
        let focus = match (week - 1) % 4 {
            0 => "cover the core syllabus topics and make summary notes",
            1 => "work through past questions topic by topic",
            2 => "revisit weak topics and redo the questions you missed",
            _ => "take a full timed practice test and review every answer",
        };
        plan.push_str(&format!("Week {}: {}.\n", week, focus));
    }
    plan.push_str(&format!("Tip: {}.", tip));
    plan
}
