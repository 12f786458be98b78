use asklegal_core::ContextWindow;
use asklegal_llm::{CONTEXT_END, CONTEXT_START};

pub const SYSTEM_PROMPT: &str = "You are a legal assistant for Indian micro, small and medium \
enterprises. Answer from the supplied context, cite sources as [SOURCE: document, passage], \
and say when the context does not cover the question. You do not replace a qualified lawyer.";

pub fn build_prompt(question: &str, context: &ContextWindow) -> String {
    let mut prompt = String::new();
    prompt.push_str(CONTEXT_START);
    prompt.push('\n');
    if context.is_empty() {
        prompt.push_str("No retrieved sources are available for this question. ");
        prompt.push_str("Answer from general knowledge and say that the answer is not grounded in sources.\n");
    } else {
        prompt.push_str(&context.render());
    }
    prompt.push_str(CONTEXT_END);
    prompt.push_str("\n\nQuestion: ");
    prompt.push_str(question.trim());
    prompt.push_str("\nAnswer:");
    prompt
}
