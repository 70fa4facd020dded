//! Context string rendering and eviction summaries

use crate::store::{Exchange, Session};

/// Summarize exchanges evicted from the live window.
///
/// Replaces, never appends to, the previous summary. Keyword-driven rather
/// than LLM-driven so eviction stays synchronous and cheap.
pub(crate) fn summarize_exchanges(exchanges: &[Exchange]) -> String {
    if exchanges.is_empty() {
        return String::new();
    }

    let mut topics: Vec<&str> = Vec::new();
    for exchange in exchanges {
        let message = exchange.user_message.to_lowercase();
        let topic = if ["검색", "찾기", "찾아"].iter().any(|w| message.contains(w)) {
            Some("문서 검색")
        } else if ["설명", "알려", "도움"].iter().any(|w| message.contains(w)) {
            Some("정보 요청")
        } else if message.contains("분석") {
            Some("내용 분석")
        } else {
            None
        };

        if let Some(topic) = topic {
            if !topics.contains(&topic) {
                topics.push(topic);
            }
        }
    }

    if topics.is_empty() {
        format!("이전에 {}개의 대화를 나누었습니다.", exchanges.len())
    } else {
        format!("이전에 {} 관련 대화를 나누었습니다.", topics.join(", "))
    }
}

/// Render a session into the single text block supplied to retrieval and
/// generation: summary, remembered user facts, topics, then the most recent
/// exchanges.
pub(crate) fn render_context(session: &Session, recent: usize) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(summary) = &session.summary {
        if !summary.is_empty() {
            parts.push(format!("이전 대화 요약: {}", summary));
        }
    }

    if !session.facts.is_empty() {
        parts.push("기억된 정보:".to_string());
        for (key, value) in &session.facts {
            parts.push(format!("- {}: {}", key, value));
        }
    }

    if !session.topics.is_empty() {
        parts.push(format!("대화 주제: {}", session.topics.join(", ")));
    }

    let start = session.exchanges.len().saturating_sub(recent);
    for exchange in &session.exchanges[start..] {
        parts.push(format!("사용자: {}", exchange.user_message));
        parts.push(format!("어시스턴트: {}", exchange.assistant_message));
    }

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn exchange(user: &str) -> Exchange {
        Exchange {
            timestamp: Utc::now(),
            user_message: user.to_string(),
            assistant_message: "답변".to_string(),
            metadata: serde_json::json!({}),
        }
    }

    #[test]
    fn test_summary_mentions_topic() {
        let summary = summarize_exchanges(&[exchange("휴가 정책을 검색해 주세요")]);
        assert!(summary.contains("문서 검색"));
    }

    #[test]
    fn test_summary_counts_topicless_exchanges() {
        let summary = summarize_exchanges(&[exchange("안녕"), exchange("반가워")]);
        assert_eq!(summary, "이전에 2개의 대화를 나누었습니다.");
    }

    #[test]
    fn test_summary_empty_for_no_exchanges() {
        assert_eq!(summarize_exchanges(&[]), "");
    }
}
