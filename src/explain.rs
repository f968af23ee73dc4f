use anyhow::Result;
use clap::ValueEnum;

use crate::gemini::TextGenerator;

/// Prior-knowledge tiers for the explanation generator. A closed
/// enumeration: every tier has its own prompt template and the match is
/// exhaustive, so a new tier cannot silently fall through to a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExplanationLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl std::fmt::Display for ExplanationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Matches the CLI value names, so clap can round-trip defaults.
        match self {
            ExplanationLevel::Beginner => write!(f, "beginner"),
            ExplanationLevel::Intermediate => write!(f, "intermediate"),
            ExplanationLevel::Advanced => write!(f, "advanced"),
        }
    }
}

/// Build the tier-specific explanation prompt over the full document text
pub fn build_prompt(level: ExplanationLevel, text: &str) -> String {
    match level {
        ExplanationLevel::Beginner => format!(
            "Create a complete educational summary of this text for someone completely new to the subject:\n\
             {}\n\n\
             - Start with a one-sentence overview that defines the core concept in everyday language\n\
             - Break down complex ideas using step-by-step explanations and relatable analogies\n\
             - Define every technical term in simple language\n\
             - Include concrete examples for abstract concepts\n\
             - End with a \"Key Takeaways\" bullet list of the fundamental principles\n\
             - Add a \"Common Questions\" section anticipating beginner misunderstandings",
            text
        ),
        ExplanationLevel::Intermediate => format!(
            "Generate a structured knowledge enhancement summary of this text:\n\
             {}\n\n\
             - Organize content under these sections: Core Principles, Current Applications, Ongoing Debates\n\
             - Use domain terminology but add brief context reminders in parentheses\n\
             - Include compare/contrast passages showing how the main concepts relate\n\
             - Explain two or three non-intuitive aspects in more depth\n\
             - Incorporate relevant historical context for key theories or methods\n\
             - Conclude by linking the material back to foundational knowledge",
            text
        ),
        ExplanationLevel::Advanced => format!(
            "Produce an expert-level synthesis and critical analysis of this text:\n\
             {}\n\n\
             - Open with the current research status and knowledge gaps in the field\n\
             - Structure using: Theoretical Foundations, Methodological Approaches, Emerging Frontiers\n\
             - Employ discipline-specific terminology with an expectation of fluency\n\
             - Critically evaluate the strengths and weaknesses of the major theories\n\
             - Add a \"Research Implications\" section forecasting future directions\n\
             - Highlight unresolved challenges in bullet-point form",
            text
        ),
    }
}

/// Explain the document at the requested tier. Stateless: consumes the
/// generation client and the document text, never the index.
pub async fn explain<G: TextGenerator>(
    generator: &G,
    text: &str,
    level: ExplanationLevel,
) -> Result<String> {
    let prompt = build_prompt(level, text);
    generator.complete(&prompt).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_level_embeds_the_document_text() {
        let text = "Entropy measures disorder.";
        for level in [
            ExplanationLevel::Beginner,
            ExplanationLevel::Intermediate,
            ExplanationLevel::Advanced,
        ] {
            assert!(build_prompt(level, text).contains(text));
        }
    }

    #[test]
    fn test_levels_produce_distinct_prompts() {
        let text = "Entropy measures disorder.";
        let beginner = build_prompt(ExplanationLevel::Beginner, text);
        let intermediate = build_prompt(ExplanationLevel::Intermediate, text);
        let advanced = build_prompt(ExplanationLevel::Advanced, text);

        assert_ne!(beginner, intermediate);
        assert_ne!(intermediate, advanced);
        assert_ne!(beginner, advanced);
    }

    #[tokio::test]
    async fn test_explain_returns_model_output_verbatim() {
        struct FixedGenerator;
        impl TextGenerator for FixedGenerator {
            async fn complete(&self, _prompt: &str) -> Result<String> {
                Ok("an explanation".to_string())
            }
        }

        let result = explain(&FixedGenerator, "text", ExplanationLevel::Beginner)
            .await
            .unwrap();
        assert_eq!(result, "an explanation");
    }
}
