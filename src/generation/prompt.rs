//! Prompt templates for grounded generation

use crate::types::RetrievedSource;

/// Canned answer when retrieval-only mode finds nothing. Returned instead
/// of silently answering from nothing.
pub const NO_RESULTS_MESSAGE: &str =
    "No relevant information was found in your documents to answer this question.";

/// Prompt builder for chat turns
pub struct PromptBuilder;

impl PromptBuilder {
    /// System prompt carrying the citation contract, with the retrieved
    /// context appended when retrieval ran.
    pub fn build_system_prompt(rag_context: Option<&str>) -> String {
        let mut prompt = String::from(
            r#"You are an AI assistant specialized in property management.

Format your answers in Markdown for readability: use **bold** for emphasis,
headings (# ## ###) to structure longer answers, bullet or numbered lists,
tables for structured data, and blank lines between paragraphs.

Citation rules:
- When you use information from the document context you MUST cite the source
- Citation format: [SOURCE:chunk_id] immediately after the information used
- Example: "The rent is 1,500 [SOURCE:chunk-documents-doc-001]"
- ONLY cite sources you actually use in your answer
- If you use no information from the context, cite nothing"#,
        );

        if let Some(context) = rag_context {
            prompt.push_str("\n\nDocument context:\n");
            prompt.push_str(context);
        }

        prompt
    }

    /// Context block: each retrieved source under its chunk id so the model
    /// can reference it in markers.
    pub fn build_context(results: &[RetrievedSource]) -> String {
        results
            .iter()
            .map(|r| format!("[{}] Source: {}\n{}", r.chunk_id, r.document_title, r.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Render retrieved results directly, without generation
    pub fn format_retrieval_only(results: &[RetrievedSource]) -> String {
        if results.is_empty() {
            return NO_RESULTS_MESSAGE.to_string();
        }

        let mut response = String::from("Here is the information found in your records:\n\n");
        for (i, result) in results.iter().enumerate() {
            response.push_str(&format!(
                "{}. **{}** (score: {:.0}%)\n{}\n\n",
                i + 1,
                result.document_title,
                result.score * 100.0,
                result.content
            ));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceType;

    fn result(chunk_id: &str, title: &str) -> RetrievedSource {
        RetrievedSource {
            chunk_id: chunk_id.to_string(),
            document_id: "d".into(),
            document_title: title.to_string(),
            content: "body".into(),
            source_type: SourceType::Documents,
            score: 0.8,
            metadata: None,
        }
    }

    #[test]
    fn context_lines_lead_with_chunk_ids() {
        let context =
            PromptBuilder::build_context(&[result("chunk-documents-a", "Lease agreement")]);
        assert!(context.starts_with("[chunk-documents-a] Source: Lease agreement"));
        assert!(context.contains("body"));
    }

    #[test]
    fn retrieval_only_formats_or_reports_nothing_found() {
        assert_eq!(PromptBuilder::format_retrieval_only(&[]), NO_RESULTS_MESSAGE);

        let formatted = PromptBuilder::format_retrieval_only(&[result("c", "Title X")]);
        assert!(formatted.contains("**Title X**"));
        assert!(formatted.contains("body"));
    }

    #[test]
    fn system_prompt_embeds_context_when_present() {
        let plain = PromptBuilder::build_system_prompt(None);
        assert!(!plain.contains("Document context"));

        let with_context = PromptBuilder::build_system_prompt(Some("[chunk-x] Source: T\nbody"));
        assert!(with_context.contains("Document context:"));
        assert!(with_context.contains("[chunk-x]"));
        assert!(with_context.contains("[SOURCE:chunk_id]"));
    }
}
