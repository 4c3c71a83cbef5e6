use super::ReportStrategy;
use crate::llm::ChatMessage;

/// Reason-then-answer report: a chain-of-thought section followed by the final answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReasonedReport;

impl ReportStrategy for ReasonedReport {
    fn name(&self) -> &'static str {
        "reasoned"
    }

    fn primary_messages(&self, query: &str, data: &str, current_date: &str) -> Vec<ChatMessage> {
        let system = format!(
            "You are a senior business analyst using the ReAct approach. First, think out loud \
             and reason step-by-step about the data provided. Then, produce a final \
             comprehensive report. Format your response as follows:\n\n\
             Chain-of-Thought:\n\
             [Your detailed reasoning here]\n\n\
             Final Answer:\n\
             [Your final report here]\n\n\
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
                "Using the ReAct approach, think out loud first and then provide a concise \
                 report. Output your chain-of-thought reasoning followed by the final answer \
                 in this format:\n\n\
                 Chain-of-Thought:\n\
                 [Your reasoning]\n\n\
                 Final Answer:\n\
                 [Your answer]",
            ),
            ChatMessage::human(format!("Query: {}", query)),
        ]
    }
}
