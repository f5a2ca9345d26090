mod chat;
mod config;
mod onboarding;
mod quiz;
mod speech;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use dotenv::dotenv;
use log::{debug, info, warn};
use teloxide::{
    dispatching::dialogue::{serializer::Json, ErasedStorage, SqliteStorage, Storage},
    prelude::*,
    types::{ChatAction, KeyboardButton, KeyboardMarkup, KeyboardRemove},
};
use tokio::sync::Mutex;

use chat::ChatLog;
use config::Settings;
use onboarding::{
    learning_style_percentages, style_question, JsonFileStore, LearnerProfile, LearningStyle,
    OnboardingRecord, ProfileStage, STAGE_CAREER_MATCHES, STAGE_LEARNING_STYLE, STAGE_PROFILE,
    STYLE_QUESTIONS,
};
use quiz::ai_helper::{ChatGptBackend, QuestionSource, StudyHelper};
use quiz::bank::{EXAMS, SUBJECTS};
use quiz::session::Phase;
use quiz::{option_index_from_label, Score, TestConfig, TestSession, TimedTest, OPTION_LABELS};
use speech::{
    LocalSpeech, RemoteSpeech, SpeakOutcome, SpeechDispatcher, Synthesizer, TelegramAudio,
    VoiceRegistry,
};

type QuizDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type UserInfoStorage = std::sync::Arc<ErasedStorage<State>>;

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Start,
    ReceiveName,
    ReceiveExam {
        name: String,
    },
    LearningStyle {
        step: usize,
        answers: BTreeMap<String, LearningStyle>,
    },
    ReceiveInterests,
    Menu,
    ReceiveSubject,
    ReceiveQuestionCount {
        subject: String,
    },
    Testing,
    Tutoring {
        log: ChatLog,
    },
    StudyPlanSubject,
}

/// Shared services plus the per-chat things that cannot live in dialogue storage.
pub struct App {
    settings: Settings,
    helper: StudyHelper,
    store: JsonFileStore,
    remote_speech: Option<Arc<dyn Synthesizer>>,
    local_speech: Option<Arc<dyn Synthesizer>>,
    tests: Mutex<HashMap<ChatId, TimedTest>>,
    voices: VoiceRegistry<ChatId>,
}

impl App {
    fn new(settings: Settings) -> Self {
        let backend = Arc::new(ChatGptBackend::new(&settings.ai));
        let helper = StudyHelper::new(backend, settings.ai.personality);
        let remote_speech: Option<Arc<dyn Synthesizer>> = settings
            .speech
            .api_key
            .as_ref()
            .map(|_| Arc::new(RemoteSpeech::new(&settings.speech)) as Arc<dyn Synthesizer>);
        let local_speech: Option<Arc<dyn Synthesizer>> =
            Some(Arc::new(LocalSpeech::new(settings.speech.local_command.clone())));
        if remote_speech.is_none() {
            warn!("No TTS key set, read-aloud will use {}", settings.speech.local_command);
        }

        Self {
            store: JsonFileStore::new(settings.data_dir.clone()),
            helper,
            remote_speech,
            local_speech,
            tests: Mutex::new(HashMap::new()),
            voices: VoiceRegistry::new(),
            settings,
        }
    }

    fn voice(&self, bot: &Bot, chat_id: ChatId) -> Arc<SpeechDispatcher> {
        self.voices.get_or_insert_with(chat_id, || {
            SpeechDispatcher::new(
                self.remote_speech.clone(),
                self.local_speech.clone(),
                Arc::new(TelegramAudio::new(bot.clone(), chat_id)),
                self.settings.speech.timeout,
                self.settings.speech.max_chars,
                self.settings.speech.voice.clone(),
            )
        })
    }

    /// The chat left a screen with audio; stop anything still playing.
    fn hide(&self, chat_id: ChatId) {
        if self.voices.hide(&chat_id) {
            debug!("Released speech for chat {}", chat_id);
        }
    }

    async fn profile(&self, chat_id: ChatId) -> LearnerProfile {
        self.record(chat_id).await.profile()
    }

    async fn record(&self, chat_id: ChatId) -> OnboardingRecord {
        self.store
            .load(&chat_id.to_string())
            .await
            .unwrap_or_else(|e| {
                warn!("Could not read onboarding record for {}: {}", chat_id, e);
                OnboardingRecord::default()
            })
    }

    async fn complete_stage(&self, chat_id: ChatId, stage: &str, result: serde_json::Value) {
        if let Err(e) = self
            .store
            .complete_stage(&chat_id.to_string(), stage, result)
            .await
        {
            warn!("Could not save onboarding stage '{}' for {}: {}", stage, chat_id, e);
        }
    }

    async fn drop_finished_test(&self, chat_id: ChatId) {
        let mut tests = self.tests.lock().await;
        let finished = match tests.get(&chat_id) {
            Some(test) => test.session().lock().await.phase() == Phase::Submitted,
            None => false,
        };
        if finished {
            tests.remove(&chat_id);
        }
    }
}

#[tokio::main]
async fn main() -> HandlerResult {
    dotenv().ok();
    pretty_env_logger::init();
    log::info!("Starting StudyMate bot...");

    let settings = Settings::from_env();
    let bot = Bot::from_env();

    info!("Opening dialogue storage at {}", settings.database);
    let storage: UserInfoStorage = SqliteStorage::open(&settings.database, Json).await?.erase();
    let app = Arc::new(App::new(settings));

    Dispatcher::builder(
        bot,
        Update::filter_message()
            .enter_dialogue::<Message, ErasedStorage<State>, State>()
            .branch(dptree::case![State::Start].endpoint(start))
            .branch(dptree::case![State::ReceiveName].endpoint(receive_name))
            .branch(dptree::case![State::ReceiveExam { name }].endpoint(receive_exam))
            .branch(dptree::case![State::LearningStyle { step, answers }].endpoint(learning_style))
            .branch(dptree::case![State::ReceiveInterests].endpoint(receive_interests))
            .branch(dptree::case![State::Menu].endpoint(menu))
            .branch(dptree::case![State::ReceiveSubject].endpoint(receive_subject))
            .branch(
                dptree::case![State::ReceiveQuestionCount { subject }]
                    .endpoint(receive_question_count),
            )
            .branch(dptree::case![State::Testing].endpoint(testing))
            .branch(dptree::case![State::Tutoring { log }].endpoint(tutoring))
            .branch(dptree::case![State::StudyPlanSubject].endpoint(study_plan_subject)),
    )
    .dependencies(dptree::deps![storage, app])
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;
    Ok(())
}

const PRACTICE_TEST: &str = "📝 Practice test";
const ASK_TUTOR: &str = "💬 Ask the tutor";
const STUDY_PLAN: &str = "📅 Study plan";
const RESET_PROFILE: &str = "⚙️ Redo onboarding";
const BACK_TO_MENU: &str = "🏠 Menu";
const READ_ALOUD: &str = "🔊 Read aloud";
const PREVIOUS: &str = "◀️ Prev";
const NEXT: &str = "Next ▶️";
const SUBMIT: &str = "✅ Submit";
const QUESTION_COUNTS: [&str; 3] = ["5", "10", "20"];
const MAX_QUESTIONS: usize = 40;

fn keyboard(rows: Vec<Vec<&str>>) -> KeyboardMarkup {
    KeyboardMarkup::new(
        rows.into_iter()
            .map(|row| row.into_iter().map(KeyboardButton::new).collect::<Vec<_>>())
            .collect::<Vec<_>>(),
    )
}

fn menu_keyboard() -> KeyboardMarkup {
    keyboard(vec![
        vec![PRACTICE_TEST, ASK_TUTOR],
        vec![STUDY_PLAN, RESET_PROFILE],
    ])
}

fn test_keyboard() -> KeyboardMarkup {
    keyboard(vec![
        OPTION_LABELS.to_vec(),
        vec![PREVIOUS, NEXT],
        vec![READ_ALOUD, SUBMIT],
        vec![BACK_TO_MENU],
    ])
}

fn subject_keyboard() -> KeyboardMarkup {
    keyboard(SUBJECTS.chunks(2).map(|c| c.to_vec()).collect())
}

async fn send_menu(bot: &Bot, chat_id: ChatId, dialogue: &QuizDialogue) -> HandlerResult {
    bot.send_message(chat_id, "What would you like to do?")
        .reply_markup(menu_keyboard())
        .await?;
    dialogue.update(State::Menu).await?;
    Ok(())
}

const GREETING_TEXT: &str = "Hi! I'm StudyMate, your JAMB, WAEC and NECO study buddy. \
    Let's get to know each other. What's your name?";
async fn start(bot: Bot, dialogue: QuizDialogue, msg: Message, app: Arc<App>) -> HandlerResult {
    let profile = app.profile(msg.chat.id).await;
    if let (Some(name), Some(_)) = (&profile.name, profile.learning_style) {
        bot.send_message(msg.chat.id, format!("Welcome back, {}!", name))
            .await?;
        return send_menu(&bot, msg.chat.id, &dialogue).await;
    }

    bot.send_message(msg.chat.id, GREETING_TEXT)
        .reply_markup(KeyboardRemove::new())
        .await?;
    dialogue.update(State::ReceiveName).await?;
    Ok(())
}

async fn receive_name(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    let name = match msg.text().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => {
            bot.send_message(msg.chat.id, "Please type your name (as text)")
                .await?;
            return Ok(());
        }
    };

    bot.send_message(
        msg.chat.id,
        format!("Nice to meet you, {}! Which exam are you preparing for?", name),
    )
    .reply_markup(keyboard(vec![EXAMS.to_vec()]))
    .await?;
    dialogue.update(State::ReceiveExam { name }).await?;
    Ok(())
}

async fn receive_exam(
    bot: Bot,
    dialogue: QuizDialogue,
    name: String,
    msg: Message,
    app: Arc<App>,
) -> HandlerResult {
    let exam = msg
        .text()
        .and_then(|text| EXAMS.iter().find(|e| e.eq_ignore_ascii_case(text.trim())));
    let Some(exam) = exam else {
        bot.send_message(msg.chat.id, "Please choose one of the exams")
            .reply_markup(keyboard(vec![EXAMS.to_vec()]))
            .await?;
        return Ok(());
    };

    let profile = ProfileStage {
        name,
        exam: exam.to_string(),
    };
    app.complete_stage(msg.chat.id, STAGE_PROFILE, serde_json::to_value(&profile)?)
        .await;

    bot.send_message(
        msg.chat.id,
        "Great! A few quick questions to find out how you learn best.",
    )
    .await?;
    ask_style_question(&bot, msg.chat.id, 0).await?;
    dialogue
        .update(State::LearningStyle {
            step: 0,
            answers: BTreeMap::new(),
        })
        .await?;
    Ok(())
}

async fn ask_style_question(bot: &Bot, chat_id: ChatId, step: usize) -> HandlerResult {
    let Some(question) = style_question(step) else {
        warn!("No learning style question for step {}", step);
        return Ok(());
    };
    let options = question
        .options
        .iter()
        .map(|(text, _)| vec![*text])
        .collect::<Vec<_>>();
    bot.send_message(
        chat_id,
        format!(
            "Question {} of {}:\n{}",
            step + 1,
            STYLE_QUESTIONS.len(),
            question.prompt
        ),
    )
    .reply_markup(keyboard(options))
    .await?;
    Ok(())
}

async fn learning_style(
    bot: Bot,
    dialogue: QuizDialogue,
    (step, mut answers): (usize, BTreeMap<String, LearningStyle>),
    msg: Message,
    app: Arc<App>,
) -> HandlerResult {
    let Some(question) = style_question(step) else {
        warn!("Stored learning style step {} is out of range, restarting", step);
        ask_style_question(&bot, msg.chat.id, 0).await?;
        dialogue
            .update(State::LearningStyle {
                step: 0,
                answers: BTreeMap::new(),
            })
            .await?;
        return Ok(());
    };
    let Some(style) = msg.text().and_then(|text| question.style_for(text)) else {
        bot.send_message(msg.chat.id, "Please pick one of the options")
            .await?;
        ask_style_question(&bot, msg.chat.id, step).await?;
        return Ok(());
    };
    answers.insert(question.id.to_string(), style);

    if step + 1 < STYLE_QUESTIONS.len() {
        ask_style_question(&bot, msg.chat.id, step + 1).await?;
        dialogue
            .update(State::LearningStyle {
                step: step + 1,
                answers,
            })
            .await?;
        return Ok(());
    }

    let result = learning_style_percentages(&answers);
    app.complete_stage(msg.chat.id, STAGE_LEARNING_STYLE, serde_json::to_value(&result)?)
        .await;

    let breakdown = result
        .percentages
        .iter()
        .map(|(style, percent)| format!("{}: {}%", style, percent))
        .collect::<Vec<_>>()
        .join("\n");
    let summary = match result.dominant {
        Some(style) => format!(
            "You are mostly a {} learner. Tip: {}.\n\n{}",
            style,
            style.study_tip(),
            breakdown
        ),
        None => breakdown,
    };
    bot.send_message(msg.chat.id, summary).await?;
    bot.send_message(
        msg.chat.id,
        "Last step: tell me what you enjoy or which careers interest you (a sentence is enough).",
    )
    .reply_markup(KeyboardRemove::new())
    .await?;
    dialogue.update(State::ReceiveInterests).await?;
    Ok(())
}

async fn receive_interests(
    bot: Bot,
    dialogue: QuizDialogue,
    msg: Message,
    app: Arc<App>,
) -> HandlerResult {
    let Some(interests) = msg.text() else {
        bot.send_message(msg.chat.id, "Please describe your interests as text")
            .await?;
        return Ok(());
    };

    // Only a nicety, so a failed chat action is ignored
    let _ = bot
        .send_chat_action(msg.chat.id, ChatAction::Typing)
        .await;

    let profile = app.profile(msg.chat.id).await;
    let careers = app.helper.match_careers(&profile, interests).await;
    app.complete_stage(msg.chat.id, STAGE_CAREER_MATCHES, serde_json::to_value(&careers)?)
        .await;

    let list = careers
        .iter()
        .map(|c| format!("• {} ({}%): {}", c.title, c.score, c.reason))
        .collect::<Vec<_>>()
        .join("\n");
    bot.send_message(msg.chat.id, format!("Careers that could suit you:\n{}", list))
        .await?;
    send_menu(&bot, msg.chat.id, &dialogue).await
}

async fn menu(bot: Bot, dialogue: QuizDialogue, msg: Message, app: Arc<App>) -> HandlerResult {
    match msg.text() {
        Some(PRACTICE_TEST) => {
            bot.send_message(msg.chat.id, "Pick a subject")
                .reply_markup(subject_keyboard())
                .await?;
            dialogue.update(State::ReceiveSubject).await?;
        }
        Some(ASK_TUTOR) => {
            bot.send_message(
                msg.chat.id,
                "Ask me anything about your subjects. Tap Menu when you are done.",
            )
            .reply_markup(keyboard(vec![vec![READ_ALOUD, BACK_TO_MENU]]))
            .await?;
            dialogue
                .update(State::Tutoring { log: ChatLog::new() })
                .await?;
        }
        Some(STUDY_PLAN) => {
            bot.send_message(msg.chat.id, "Which subject should the plan cover?")
                .reply_markup(subject_keyboard())
                .await?;
            dialogue.update(State::StudyPlanSubject).await?;
        }
        Some(RESET_PROFILE) => {
            if let Err(e) = app
                .store
                .save(&msg.chat.id.to_string(), &OnboardingRecord::default())
                .await
            {
                warn!("Could not reset onboarding for {}: {}", msg.chat.id, e);
            }
            bot.send_message(msg.chat.id, GREETING_TEXT)
                .reply_markup(KeyboardRemove::new())
                .await?;
            dialogue.update(State::ReceiveName).await?;
        }
        _ => send_menu(&bot, msg.chat.id, &dialogue).await?,
    }
    Ok(())
}

async fn receive_subject(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    let Some(subject) = msg
        .text()
        .and_then(|text| SUBJECTS.iter().find(|s| s.eq_ignore_ascii_case(text.trim())))
    else {
        bot.send_message(msg.chat.id, "Please choose one of the subjects")
            .reply_markup(subject_keyboard())
            .await?;
        return Ok(());
    };

    bot.send_message(msg.chat.id, "How many questions?")
        .reply_markup(keyboard(vec![QUESTION_COUNTS.to_vec()]))
        .await?;
    dialogue
        .update(State::ReceiveQuestionCount {
            subject: subject.to_string(),
        })
        .await?;
    Ok(())
}

async fn receive_question_count(
    bot: Bot,
    dialogue: QuizDialogue,
    subject: String,
    msg: Message,
    app: Arc<App>,
    storage: UserInfoStorage,
) -> HandlerResult {
    let amount = match msg.text().map(|t| t.trim().parse::<usize>()) {
        Some(Ok(amount)) if (1..=MAX_QUESTIONS).contains(&amount) => amount,
        _ => {
            bot.send_message(
                msg.chat.id,
                format!("Please enter a number from 1 to {}", MAX_QUESTIONS),
            )
            .await?;
            return Ok(());
        }
    };

    let profile = app.profile(msg.chat.id).await;
    let config = TestConfig {
        exam: profile.exam.unwrap_or_else(|| EXAMS[0].to_string()),
        subject,
        question_count: amount,
        seconds_per_question: app.settings.seconds_per_question,
    };

    bot.send_message(msg.chat.id, "Preparing your questions...")
        .await?;
    let _ = bot
        .send_chat_action(msg.chat.id, ChatAction::Typing)
        .await;
    let set = app
        .helper
        .generate_questions(&config.exam, &config.subject, config.question_count)
        .await;
    if set.source == QuestionSource::LocalBank {
        bot.send_message(
            msg.chat.id,
            "I couldn't reach the question generator, so here is an offline practice set.",
        )
        .await?;
    }

    let chat_id = msg.chat.id;
    let on_expired = {
        let bot = bot.clone();
        let app = app.clone();
        move |score: Score, review: Vec<String>| async move {
            let headline = "⏰ Time is up! Your test was submitted.";
            if let Err(e) = send_result(&bot, chat_id, headline, score, &review).await {
                warn!("Could not deliver expired test result to {}: {}", chat_id, e);
            }
            app.hide(chat_id);
            if let Err(e) = QuizDialogue::new(storage, chat_id).update(State::Menu).await {
                warn!("Could not return {} to the menu: {}", chat_id, e);
            }
            app.drop_finished_test(chat_id).await;
        }
    };

    let test = match TimedTest::start(
        set.questions,
        config.duration_seconds(),
        Duration::from_secs(1),
        on_expired,
    ) {
        Ok(test) => test,
        Err(e) => {
            warn!("Could not start test for {}: {}", chat_id, e);
            bot.send_message(chat_id, format!("Sorry, I couldn't start that test: {}", e))
                .await?;
            return send_menu(&bot, chat_id, &dialogue).await;
        }
    };

    info!(
        "Chat {} started a {} {} test with {} questions",
        chat_id, config.exam, config.subject, config.question_count
    );
    let intro = format!(
        "{} {}: {} questions, {} minutes. Good luck!",
        config.exam,
        config.subject,
        config.question_count,
        (config.duration_seconds() + 59) / 60
    );
    let first = question_text(&*test.session().lock().await);
    app.tests.lock().await.insert(chat_id, test);

    bot.send_message(chat_id, intro).await?;
    if let Some(first) = first {
        bot.send_message(chat_id, first)
            .reply_markup(test_keyboard())
            .await?;
    }
    dialogue.update(State::Testing).await?;
    Ok(())
}

fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

fn question_text(session: &TestSession) -> Option<String> {
    let question = session.current_question()?;
    let chosen = session
        .answer_for(question.id)
        .map(|a| format!("\nYour answer: {}", OPTION_LABELS[a]))
        .unwrap_or_default();
    Some(format!(
        "{}{}\n\n⏱ {} left",
        question.render(session.current_index() + 1, session.len()),
        chosen,
        format_clock(session.remaining_seconds())
    ))
}

async fn send_result(
    bot: &Bot,
    chat_id: ChatId,
    headline: &str,
    score: Score,
    review: &[String],
) -> HandlerResult {
    let text = format!(
        "{}\nScore: {}/{} ({}%), answered {}.\n\n{}",
        headline,
        score.correct,
        score.total,
        score.percentage(),
        score.answered,
        review.join("\n")
    );
    bot.send_message(chat_id, text)
        .reply_markup(menu_keyboard())
        .await?;
    Ok(())
}

async fn testing(bot: Bot, dialogue: QuizDialogue, msg: Message, app: Arc<App>) -> HandlerResult {
    let chat_id = msg.chat.id;
    let text = msg.text().unwrap_or_default();

    if text == SUBMIT || text == BACK_TO_MENU {
        app.hide(chat_id);
        let test = app.tests.lock().await.remove(&chat_id);
        if text == SUBMIT {
            match test {
                Some(test) => match test.submit().await {
                    Some((score, review)) => {
                        send_result(&bot, chat_id, "Test submitted!", score, &review).await?
                    }
                    None => debug!("Test for {} already expired", chat_id),
                },
                None => debug!("No running test for {}", chat_id),
            }
        }
        return send_menu(&bot, chat_id, &dialogue).await;
    }

    let session = app.tests.lock().await.get(&chat_id).map(TimedTest::session);
    let session = match session {
        Some(session) => session,
        None => {
            bot.send_message(chat_id, "There is no test running.")
                .await?;
            return send_menu(&bot, chat_id, &dialogue).await;
        }
    };

    if text == READ_ALOUD {
        let spoken = session
            .lock()
            .await
            .current_question()
            .map(|q| q.spoken());
        if let Some(spoken) = spoken {
            let voice = app.voice(&bot, chat_id);
            if voice.speak(&spoken, None) == SpeakOutcome::Unavailable {
                bot.send_message(chat_id, "Read-aloud is not available right now.")
                    .await?;
            }
        }
        return Ok(());
    }

    let reply = {
        let mut session = session.lock().await;
        if session.phase() != Phase::InProgress {
            None
        } else {
            match text {
                PREVIOUS => {
                    session.previous();
                }
                NEXT => {
                    session.next();
                }
                label => match option_index_from_label(label) {
                    Some(option) => {
                        session.answer_current(option)?;
                        session.next();
                    }
                    None => debug!("Ignoring {:?} during a test", label),
                },
            }
            question_text(&session)
        }
    };

    match reply {
        Some(reply) => {
            // Reading the old question aloud makes no sense after moving on
            app.hide(chat_id);
            bot.send_message(chat_id, reply)
                .reply_markup(test_keyboard())
                .await?;
        }
        None => {
            bot.send_message(chat_id, "This test is already over.")
                .await?;
            send_menu(&bot, chat_id, &dialogue).await?;
        }
    }
    Ok(())
}

async fn tutoring(
    bot: Bot,
    dialogue: QuizDialogue,
    mut log: ChatLog,
    msg: Message,
    app: Arc<App>,
) -> HandlerResult {
    let chat_id = msg.chat.id;
    match msg.text() {
        Some(BACK_TO_MENU) => {
            app.hide(chat_id);
            send_menu(&bot, chat_id, &dialogue).await
        }
        Some(READ_ALOUD) => {
            if let Some(last) = log.last_assistant() {
                let voice = app.voice(&bot, chat_id);
                if voice.speak(&last.text, None) == SpeakOutcome::Unavailable {
                    bot.send_message(chat_id, "Read-aloud is not available right now.")
                        .await?;
                }
            }
            Ok(())
        }
        Some(question) => {
            log.push_user(question);
            let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;

            let profile = app.profile(chat_id).await;
            let reply = app.helper.tutor_reply(&profile, &log).await;
            log.push_assistant(reply.clone());

            bot.send_message(chat_id, reply).await?;
            dialogue.update(State::Tutoring { log }).await?;
            Ok(())
        }
        None => {
            bot.send_message(chat_id, "Please send your question as text")
                .await?;
            Ok(())
        }
    }
}

async fn study_plan_subject(
    bot: Bot,
    dialogue: QuizDialogue,
    msg: Message,
    app: Arc<App>,
) -> HandlerResult {
    let Some(subject) = msg
        .text()
        .and_then(|text| SUBJECTS.iter().find(|s| s.eq_ignore_ascii_case(text.trim())))
    else {
        bot.send_message(msg.chat.id, "Please choose one of the subjects")
            .reply_markup(subject_keyboard())
            .await?;
        return Ok(());
    };

    let _ = bot
        .send_chat_action(msg.chat.id, ChatAction::Typing)
        .await;
    let profile = app.profile(msg.chat.id).await;
    let exam = profile.exam.clone().unwrap_or_else(|| EXAMS[0].to_string());
    let plan = app.helper.study_plan(&profile, &exam, subject, 4).await;

    bot.send_message(msg.chat.id, plan).await?;
    send_menu(&bot, msg.chat.id, &dialogue).await
}
