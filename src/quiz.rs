use anyhow::Result;
use clap::ValueEnum;

use crate::gemini::TextGenerator;

pub const MIN_QUESTIONS: usize = 1;
pub const MAX_QUESTIONS: usize = 50;
pub const MIN_DIFFICULTY: u8 = 1;
pub const MAX_DIFFICULTY: u8 = 10;

/// Kind of practice questions to generate
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QuestionType {
    Subjective,
    Objective,
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Matches the CLI value names, so clap can round-trip defaults.
        match self {
            QuestionType::Subjective => write!(f, "subjective"),
            QuestionType::Objective => write!(f, "objective"),
        }
    }
}

/// Validated parameters for a practice-question request
#[derive(Debug, Clone, Copy)]
pub struct QuizParams {
    pub question_type: QuestionType,
    pub count: usize,
    pub difficulty: u8,
}

impl QuizParams {
    /// Validate the requested count (1-50) and difficulty (1-10)
    pub fn new(question_type: QuestionType, count: usize, difficulty: u8) -> Result<Self> {
        if !(MIN_QUESTIONS..=MAX_QUESTIONS).contains(&count) {
            anyhow::bail!(
                "number of questions must be between {} and {}, got {}",
                MIN_QUESTIONS,
                MAX_QUESTIONS,
                count
            );
        }
        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&difficulty) {
            anyhow::bail!(
                "difficulty must be between {} and {}, got {}",
                MIN_DIFFICULTY,
                MAX_DIFFICULTY,
                difficulty
            );
        }
        Ok(QuizParams {
            question_type,
            count,
            difficulty,
        })
    }
}

/// Bloom-verb tier for a difficulty value; steers how abstract the
/// generated questions should be.
fn difficulty_tier(difficulty: u8) -> &'static str {
    match difficulty {
        1..=3 => "Basic: focus on direct information recall (remember/understand)",
        4..=6 => "Intermediate: require analysis and application (apply/analyze)",
        _ => "Advanced: demand synthesis and evaluation (evaluate/create)",
    }
}

/// Build the question-generation prompt over the full document text
pub fn build_prompt(params: QuizParams, text: &str) -> String {
    let type_guidance = match params.question_type {
        QuestionType::Objective => {
            "Use unambiguous phrasing; balance factual and conceptual questions; \
             multiple-choice questions get four plausible options without answer markers"
        }
        QuestionType::Subjective => {
            "Require evidence-based reasoning; include scenario-based prompts; \
             suggest the contextual details a full answer should draw on"
        }
    };

    format!(
        "Generate {count} {kind} questions based on the text below.\n\n\
         Text: {text}\n\n\
         Requirements:\n\
         - Difficulty {difficulty} of 10. {tier}\n\
         - {type_guidance}\n\
         - Do not repeat questions with similar content\n\
         - Keep questions concise, relevant to the text, and free of ambiguous phrasing\n\
         - Never include answers, scoring guidelines, or difficulty labels\n\
         - Output exactly one question per line, nothing else",
        count = params.count,
        kind = params.question_type,
        text = text,
        difficulty = params.difficulty,
        tier = difficulty_tier(params.difficulty),
        type_guidance = type_guidance,
    )
}

/// Parse model output into questions, one per non-empty line
pub fn parse_questions(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Generate practice questions for the document. Stateless: consumes the
/// generation client and the document text, never the index.
pub async fn generate_questions<G: TextGenerator>(
    generator: &G,
    text: &str,
    params: QuizParams,
) -> Result<Vec<String>> {
    let prompt = build_prompt(params, text);
    let output = generator.complete(&prompt).await?;
    Ok(parse_questions(&output))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_validate_count_range() {
        assert!(QuizParams::new(QuestionType::Objective, 0, 5).is_err());
        assert!(QuizParams::new(QuestionType::Objective, 51, 5).is_err());
        assert!(QuizParams::new(QuestionType::Objective, 1, 5).is_ok());
        assert!(QuizParams::new(QuestionType::Objective, 50, 5).is_ok());
    }

    #[test]
    fn test_params_validate_difficulty_range() {
        assert!(QuizParams::new(QuestionType::Subjective, 10, 0).is_err());
        assert!(QuizParams::new(QuestionType::Subjective, 10, 11).is_err());
        assert!(QuizParams::new(QuestionType::Subjective, 10, 1).is_ok());
        assert!(QuizParams::new(QuestionType::Subjective, 10, 10).is_ok());
    }

    #[test]
    fn test_prompt_carries_parameters_and_text() {
        let params = QuizParams::new(QuestionType::Objective, 12, 7).unwrap();
        let prompt = build_prompt(params, "Cells divide by mitosis.");

        assert!(prompt.contains("12 objective questions"));
        assert!(prompt.contains("Difficulty 7 of 10"));
        assert!(prompt.contains("Cells divide by mitosis."));
    }

    #[test]
    fn test_parse_questions_one_per_line() {
        let output = (1..=10)
            .map(|i| format!("Question {}?", i))
            .collect::<Vec<_>>()
            .join("\n");
        let questions = parse_questions(&output);
        assert_eq!(questions.len(), 10);
        assert_eq!(questions[0], "Question 1?");
        assert_eq!(questions[9], "Question 10?");
    }

    #[test]
    fn test_parse_questions_skips_blank_lines() {
        let questions = parse_questions("First?\n\n  \nSecond?\n");
        assert_eq!(questions, vec!["First?".to_string(), "Second?".to_string()]);
    }

    #[tokio::test]
    async fn test_generate_questions_counts_stub_lines() {
        struct TenLines;
        impl TextGenerator for TenLines {
            async fn complete(&self, _prompt: &str) -> Result<String> {
                Ok((1..=10)
                    .map(|i| format!("Q{}?", i))
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
        }

        let params = QuizParams::new(QuestionType::Subjective, 10, 5).unwrap();
        let questions = generate_questions(&TenLines, "text", params).await.unwrap();
        assert_eq!(questions.len(), 10);
    }
}
