use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::quiz::{Question, OPTION_COUNT};

pub const SUBJECTS: [&str; 6] = [
    "Mathematics",
    "English",
    "Physics",
    "Chemistry",
    "Biology",
    "Economics",
];

pub const EXAMS: [&str; 3] = ["JAMB", "WAEC", "NECO"];

// (prompt, correct, three distractors, explanation)
type Template = (&'static str, &'static str, [&'static str; 3], &'static str);

const ENGLISH: &[Template] = &[
    (
        "Choose the word opposite in meaning to 'generous'.",
        "stingy",
        ["kind", "liberal", "lavish"],
        "Stingy means unwilling to give, the reverse of generous.",
    ),
    (
        "Choose the correct option: Neither the teacher nor the students ___ present.",
        "were",
        ["was", "is", "has been"],
        "With 'neither...nor' the verb agrees with the nearer subject, 'students'.",
    ),
    (
        "Which word is a synonym of 'candid'?",
        "frank",
        ["secretive", "careless", "timid"],
        "Candid means open and honest.",
    ),
    (
        "Identify the figure of speech: 'The wind whispered through the trees.'",
        "personification",
        ["simile", "hyperbole", "oxymoron"],
        "Whispering is a human action given to the wind.",
    ),
];

const PHYSICS: &[Template] = &[
    (
        "What is the SI unit of force?",
        "newton",
        ["joule", "watt", "pascal"],
        "Force is measured in newtons (kg m/s^2).",
    ),
    (
        "A body moving with constant velocity has an acceleration of",
        "zero",
        ["9.8 m/s^2", "1 m/s^2", "infinity"],
        "Acceleration is the rate of change of velocity.",
    ),
    (
        "Which of these is a vector quantity?",
        "displacement",
        ["speed", "mass", "temperature"],
        "Displacement has both magnitude and direction.",
    ),
    (
        "The energy possessed by a body due to its motion is",
        "kinetic energy",
        ["potential energy", "heat energy", "chemical energy"],
        "Kinetic energy is 1/2 m v^2.",
    ),
];

const CHEMISTRY: &[Template] = &[
    (
        "What is the chemical symbol for sodium?",
        "Na",
        ["S", "So", "Sd"],
        "From the Latin name natrium.",
    ),
    (
        "The pH of a neutral solution at 25 C is",
        "7",
        ["0", "1", "14"],
        "Pure water is neutral at pH 7.",
    ),
    (
        "Which gas is produced when zinc reacts with dilute hydrochloric acid?",
        "hydrogen",
        ["oxygen", "chlorine", "carbon dioxide"],
        "Zn + 2HCl -> ZnCl2 + H2.",
    ),
    (
        "An atom that has gained electrons becomes a",
        "negative ion",
        ["positive ion", "neutral atom", "isotope"],
        "Extra electrons give a net negative charge.",
    ),
];

const BIOLOGY: &[Template] = &[
    (
        "Which organelle is the site of photosynthesis?",
        "chloroplast",
        ["mitochondrion", "ribosome", "nucleus"],
        "Chloroplasts contain chlorophyll.",
    ),
    (
        "The basic unit of life is the",
        "cell",
        ["tissue", "organ", "atom"],
        "All living things are made of cells.",
    ),
    (
        "Which blood cells fight infection?",
        "white blood cells",
        ["red blood cells", "platelets", "plasma"],
        "Leucocytes are part of the immune system.",
    ),
    (
        "Malaria is caused by",
        "Plasmodium",
        ["a virus", "Anopheles mosquito", "bacteria"],
        "The mosquito is the vector, Plasmodium the parasite.",
    ),
];

const ECONOMICS: &[Template] = &[
    (
        "The reward for labour as a factor of production is",
        "wages",
        ["rent", "interest", "profit"],
        "Land earns rent, capital interest, entrepreneurs profit.",
    ),
    (
        "When demand rises and supply is unchanged, price will",
        "rise",
        ["fall", "remain constant", "become zero"],
        "Excess demand pushes the equilibrium price up.",
    ),
    (
        "The central bank of Nigeria is the",
        "CBN",
        ["NDIC", "SEC", "NNPC"],
        "The Central Bank of Nigeria issues the naira.",
    ),
    (
        "Opportunity cost is best described as",
        "the alternative forgone",
        ["money cost", "total cost", "marginal cost"],
        "It is the next best alternative given up.",
    ),
];

/// Deterministic sample questions used when generation is unavailable.
///
/// The same `(subject, count)` always yields the same questions in the same
/// option order; ids run from 1 to `count`.
pub fn sample_questions(subject: &str, count: usize) -> Vec<Question> {
    (0..count)
        .map(|i| {
            let id = i as u32 + 1;
            let mut rng = StdRng::seed_from_u64(seed(subject, i));
            match templates_for(subject) {
                Some(templates) => from_template(id, &templates[i % templates.len()], &mut rng),
                None => arithmetic(id, i, &mut rng),
            }
        })
        .collect()
}

fn templates_for(subject: &str) -> Option<&'static [Template]> {
    match subject.to_lowercase().as_str() {
        "english" | "use of english" => Some(ENGLISH),
        "physics" => Some(PHYSICS),
        "chemistry" => Some(CHEMISTRY),
        "biology" => Some(BIOLOGY),
        "economics" => Some(ECONOMICS),
        _ => None,
    }
}

fn seed(subject: &str, index: usize) -> u64 {
    subject
        .bytes()
        .fold(index as u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64))
}

fn from_template(id: u32, template: &Template, rng: &mut StdRng) -> Question {
    let (prompt, correct, distractors, explanation) = template;
    let mut options = vec![correct.to_string()];
    options.extend(distractors.iter().map(|d| d.to_string()));
    shuffled(id, prompt.to_string(), options, correct, rng).with_explanation(*explanation)
}

fn arithmetic(id: u32, index: usize, rng: &mut StdRng) -> Question {
    let a = 3 + (index as i64 * 7) % 17;
    let b = 2 + (index as i64 * 5) % 11;
    let (prompt, answer, explanation) = match index % 3 {
        0 => (
            format!("Evaluate {} x {}.", a, b),
            a * b,
            format!("{} multiplied by {} is {}.", a, b, a * b),
        ),
        1 => (
            format!("Solve for x: x + {} = {}.", b, a + b),
            a,
            format!("Subtract {} from both sides.", b),
        ),
        _ => (
            format!("Find the value of {}^2 - {}^2.", a, b),
            a * a - b * b,
            format!("({} - {})({} + {}) = {}.", a, b, a, b, a * a - b * b),
        ),
    };
    let options = vec![
        answer.to_string(),
        (answer + 1).to_string(),
        (answer - 2).to_string(),
        (answer + 10).to_string(),
    ];
    let correct = answer.to_string();
    shuffled(id, prompt, options, &correct, rng).with_explanation(explanation)
}

// We shuffle the options so the correct one isn't always the first one
fn shuffled(
    id: u32,
    prompt: String,
    mut options: Vec<String>,
    correct: &str,
    rng: &mut StdRng,
) -> Question {
    options.shuffle(rng);
    let correct_option = options.iter().position(|o| o == correct).unwrap_or(0);
    let options: [String; OPTION_COUNT] = [
        options[0].clone(),
        options[1].clone(),
        options[2].clone(),
        options[3].clone(),
    ];
    Question::new(id, prompt, options, correct_option)
}
