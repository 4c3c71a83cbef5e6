use super::ReportStrategy;
use crate::llm::ChatMessage;

/// Four-section analyst report: key findings, key insights, recommendations, conclusion.
#[derive(Debug, Clone, Copy, Default)]
pub struct SectionedReport;

impl ReportStrategy for SectionedReport {
    fn name(&self) -> &'static str {
        "sections"
    }

    fn primary_messages(&self, query: &str, data: &str, current_date: &str) -> Vec<ChatMessage> {
        let system = format!(
            "You are a senior business analyst. Create a detailed report with these sections:\n\n\
             1. KEY FINDINGS:\n\
             \x20  - Present all requested metrics clearly with proper formatting.\n\
             \x20  - Include comparisons and highlight key statistics.\n\n\
             2. KEY INSIGHTS:\n\
             \x20  - Analyze what the numbers mean in a business context.\n\
             \x20  - Identify patterns, trends, and anomalies with potential causes.\n\n\
             3. RECOMMENDATIONS:\n\
             \x20  - Provide 3-5 actionable business recommendations prioritized by impact.\n\
             \x20  - Include implementation considerations.\n\n\
             4. CONCLUSION:\n\
             \x20  - Summarize key takeaways, suggest next steps, and share final thoughts.\n\n\
             Data: {}\n\n\
             Current Date: {}",
            data, current_date
        );
        vec![
            ChatMessage::system(system),
            ChatMessage::human(format!("Original Query: {}", query)),
        ]
    }

    fn fallback_messages(&self, query: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(
                "Generate a concise business report with the following sections:\n\
                 1. KEY FINDINGS\n\
                 2. INSIGHTS\n\
                 3. RECOMMENDATIONS\n\
                 4. CONCLUSION\n\n\
                 If data is limited, provide high-level insights.",
            ),
            ChatMessage::human(format!("Query: {}", query)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_prompt_has_all_sections() {
        let messages = SectionedReport.primary_messages("q", "{\"sales\": {}}", "2024-05-01");
        let system = &messages[0].content;
        for section in ["KEY FINDINGS", "KEY INSIGHTS", "RECOMMENDATIONS", "CONCLUSION"] {
            assert!(system.contains(section), "missing {}", section);
        }
        assert!(system.contains("Data: {\"sales\": {}}"));
        assert!(system.ends_with("Current Date: 2024-05-01"));
        assert!(system.contains("\n   - Present all requested metrics"));
    }

    #[test]
    fn test_fallback_prompt_has_no_data() {
        let messages = SectionedReport.fallback_messages("Complaints about PROD006");
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.contains("high-level insights"));
        assert_eq!(messages[1].content, "Query: Complaints about PROD006");
    }
}
