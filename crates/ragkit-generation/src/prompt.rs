//! Korean prompt assembly
//!
//! Builds the single-string prompt from the system preamble, session
//! context, retrieved documents and the user question.

use ragkit_core::{AnswerStyle, SearchResult};

const SYSTEM_PROMPT: &str = "당신은 한국어로 답변하는 도움이 되는 AI 어시스턴트입니다.\n제공된 문서 정보를 바탕으로 정확하고 유용한 답변을 제공해주세요.";

const DETAILED_SUFFIX: &str = "자세하고 포괄적인 답변을 제공해주세요.";
const CONCISE_SUFFIX: &str = "간결하고 요점만 정리한 답변을 제공해주세요.";

const MAX_CONTEXT_DOCUMENTS: usize = 10;

/// Format retrieved documents as numbered context blocks.
pub fn build_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .take(MAX_CONTEXT_DOCUMENTS)
        .enumerate()
        .filter(|(_, r)| !r.content.is_empty())
        .map(|(i, r)| format!("[문서 {}]\n{}\n", i + 1, r.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Assemble the full generation prompt.
pub fn build_prompt(
    query: &str,
    context_text: &str,
    session_context: &str,
    style: AnswerStyle,
) -> String {
    let mut system = SYSTEM_PROMPT.to_string();
    match style {
        AnswerStyle::Detailed => {
            system.push('\n');
            system.push_str(DETAILED_SUFFIX);
        }
        AnswerStyle::Concise => {
            system.push('\n');
            system.push_str(CONCISE_SUFFIX);
        }
        AnswerStyle::Standard => {}
    }

    let mut parts = vec![system];
    if !session_context.is_empty() {
        parts.push(format!("\n이전 대화 맥락:\n{}\n", session_context));
    }
    if !context_text.is_empty() {
        parts.push(format!("\n참고 문서:\n{}\n", context_text));
    }
    parts.push(format!("\n사용자 질문: {}\n", query));
    parts.push("\n답변:".to_string());

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(content: &str) -> SearchResult {
        SearchResult {
            id: "id".to_string(),
            content: content.to_string(),
            score: 0.5,
            metadata: json!({}),
        }
    }

    #[test]
    fn test_context_numbers_documents() {
        let context = build_context(&[result("첫 번째 문서"), result("두 번째 문서")]);
        assert!(context.contains("[문서 1]\n첫 번째 문서"));
        assert!(context.contains("[문서 2]\n두 번째 문서"));
    }

    #[test]
    fn test_context_caps_at_ten_documents() {
        let results: Vec<SearchResult> = (0..15).map(|i| result(&format!("doc {}", i))).collect();
        let context = build_context(&results);
        assert!(context.contains("[문서 10]"));
        assert!(!context.contains("[문서 11]"));
    }

    #[test]
    fn test_prompt_sections_in_order() {
        let prompt = build_prompt(
            "휴가 정책 알려줘",
            "[문서 1]\n연차는 15일입니다.\n",
            "이전 대화 요약: 문서 검색",
            AnswerStyle::Standard,
        );

        let system_pos = prompt.find("AI 어시스턴트").unwrap();
        let history_pos = prompt.find("이전 대화 맥락:").unwrap();
        let docs_pos = prompt.find("참고 문서:").unwrap();
        let query_pos = prompt.find("사용자 질문: 휴가 정책 알려줘").unwrap();

        assert!(system_pos < history_pos);
        assert!(history_pos < docs_pos);
        assert!(docs_pos < query_pos);
        assert!(prompt.trim_end().ends_with("답변:"));
    }

    #[test]
    fn test_style_suffixes() {
        let detailed = build_prompt("q", "", "", AnswerStyle::Detailed);
        assert!(detailed.contains("자세하고 포괄적인"));

        let concise = build_prompt("q", "", "", AnswerStyle::Concise);
        assert!(concise.contains("간결하고 요점만"));

        let standard = build_prompt("q", "", "", AnswerStyle::Standard);
        assert!(!standard.contains("자세하고"));
        assert!(!standard.contains("간결하고"));
    }

    #[test]
    fn test_empty_sections_are_omitted() {
        let prompt = build_prompt("q", "", "", AnswerStyle::Standard);
        assert!(!prompt.contains("이전 대화 맥락:"));
        assert!(!prompt.contains("참고 문서:"));
    }
}
