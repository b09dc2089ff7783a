//! Prompts for literature-review generation.
//!
//! The system prompt is fixed: the structure and writing rules of the
//! review are part of what this tool produces, so they are not exposed as
//! configuration. Only the user turn varies, and it carries the corpus
//! verbatim; all truncation has already happened during extraction.

/// System prompt sent with every review request.
pub const SYSTEM_PROMPT: &str = r#"You are a senior academic expert in robotics. Using the content of the research papers supplied by the user, write a literature review on "Trajectory Interpolation Techniques for Industrial Robots".

STRUCTURE REQUIREMENTS (follow strictly, in this order):

1. Research Background
   - Explain the origins of the field and the motivation for its development.

2. Research Timeline
   - Trace the key breakthroughs chronologically (1980s to 2024).

3. Method Taxonomy
   - Classify the methods covered by the papers.
   - Compare the advantages and disadvantages of each class.

4. Research Gaps
   - Identify 3 to 5 key problems that remain unsolved.

5. Future Directions
   - Offer reasoned projections grounded in the existing research.

WRITING REQUIREMENTS (follow strictly):

- Citations: every claim must cite a specific paper in the form (First Author, Year).
- Style: academic language, objective and neutral; avoid subjective judgement.
- Contested points: where findings disagree, present every side.
- Output format: Markdown.
- Key terms: set each key term in bold on its first occurrence (for example: **NURBS interpolation**)."#;

/// Build the user turn that embeds the extracted corpus.
pub fn user_prompt(corpus: &str) -> String {
    format!(
        "Below is the collected content of the uploaded papers:\n{}\n\nPlease begin writing the literature review.",
        corpus
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_lists_sections_in_order() {
        let sections = [
            "Research Background",
            "Research Timeline",
            "Method Taxonomy",
            "Research Gaps",
            "Future Directions",
        ];
        let positions: Vec<usize> = sections
            .iter()
            .map(|s| SYSTEM_PROMPT.find(s).unwrap_or_else(|| panic!("missing {s}")))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn system_prompt_states_writing_rules() {
        assert!(SYSTEM_PROMPT.contains("(First Author, Year)"));
        assert!(SYSTEM_PROMPT.contains("3 to 5"));
        assert!(SYSTEM_PROMPT.contains("Markdown"));
        assert!(SYSTEM_PROMPT.contains("bold"));
    }

    #[test]
    fn user_prompt_embeds_corpus_verbatim() {
        let corpus = "\n--- Start of Paper: a.pdf ---\nB-spline\n--- End of Paper ---\n";
        let prompt = user_prompt(corpus);
        assert!(prompt.contains(corpus));
        assert!(prompt.ends_with("Please begin writing the literature review."));
    }
}
