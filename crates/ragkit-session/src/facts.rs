//! Structured fact extraction from user messages
//!
//! Mines user messages for facts worth remembering across exchanges
//! (name, age). Extracted facts are rendered into the session context.

use regex::Regex;
use std::sync::LazyLock;

static AGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*살").unwrap());

const NAME_PATTERNS: [&str; 4] = ["내 이름은 ", "제 이름은 ", "저는 ", "나는 "];

/// A fact extracted from a single message.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFact {
    pub key: String,
    pub value: String,
}

/// Extract name/age facts from a user message.
pub fn extract_facts(message: &str) -> Vec<ExtractedFact> {
    let mut facts = Vec::new();

    if let Some(name) = extract_name(message) {
        facts.push(ExtractedFact {
            key: "이름".to_string(),
            value: name,
        });
    }

    if let Some(age) = extract_age(message) {
        facts.push(ExtractedFact {
            key: "나이".to_string(),
            value: format!("{}살", age),
        });
    }

    facts
}

fn extract_name(message: &str) -> Option<String> {
    for pattern in NAME_PATTERNS {
        if let Some((_, rest)) = message.split_once(pattern) {
            let candidate: String = rest
                .split_whitespace()
                .next()?
                .trim_end_matches(['이', '야', '입', '니', '다', '요', '.'])
                .to_string();

            // Reject empty or implausibly long candidates.
            if !candidate.is_empty() && candidate.chars().count() < 10 {
                return Some(candidate);
            }
        }
    }
    None
}

fn extract_age(message: &str) -> Option<u32> {
    let captures = AGE_RE.captures(message)?;
    let age: u32 = captures.get(1)?.as_str().parse().ok()?;
    (1 < age && age < 120).then_some(age)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_name() {
        let facts = extract_facts("내 이름은 철수입니다");
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].key, "이름");
        assert_eq!(facts[0].value, "철수");
    }

    #[test]
    fn test_extracts_age() {
        let facts = extract_facts("저는 올해 30살이에요");
        assert!(facts.iter().any(|f| f.key == "나이" && f.value == "30살"));
    }

    #[test]
    fn test_rejects_out_of_range_age() {
        assert!(extract_age("나는 500살").is_none());
        assert!(extract_age("1살").is_none());
    }

    #[test]
    fn test_no_facts_in_plain_message() {
        assert!(extract_facts("휴가 정책이 어떻게 되나요?").is_empty());
    }
}
