//! Keyword-based topic tagging for chat messages

const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    ("search", &["검색", "찾기", "찾아", "검색해"]),
    ("document", &["문서", "파일", "자료", "데이터"]),
    ("help", &["도움", "도와", "설명", "알려"]),
    ("technical", &["기술", "개발", "코드", "프로그래밍"]),
    ("general", &["일반", "기본", "소개", "개요"]),
];

/// Tag a message with the first matching topic bucket, `"general"` when
/// nothing matches.
pub fn extract_topic(message: &str) -> &'static str {
    let lower = message.to_lowercase();
    for (topic, words) in TOPIC_KEYWORDS {
        if words.iter().any(|word| lower.contains(word)) {
            return topic;
        }
    }
    "general"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_keywords() {
        assert_eq!(extract_topic("휴가 정책 검색해줘"), "search");
        assert_eq!(extract_topic("관련 자료 찾아줘"), "search");
    }

    #[test]
    fn test_bucket_priority_is_stable() {
        // Contains both a search and a document keyword; search wins.
        assert_eq!(extract_topic("문서 검색"), "search");
    }

    #[test]
    fn test_unmatched_message_is_general() {
        assert_eq!(extract_topic("안녕하세요"), "general");
    }

    #[test]
    fn test_help_and_technical() {
        assert_eq!(extract_topic("휴가 정책 알려줘"), "help");
        assert_eq!(extract_topic("코드 리뷰 부탁해"), "technical");
    }
}
