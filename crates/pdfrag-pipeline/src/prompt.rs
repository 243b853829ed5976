/// Prompt with `{context}` and `{query}` placeholders. Substitution is a
/// single left-to-right pass, so placeholder text inside the values is
/// left alone.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self { template: template.into() }
    }

    pub fn render(&self, context: &str, query: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + context.len() + query.len());
        let mut rest = self.template.as_str();
        while let Some(pos) = rest.find('{') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if let Some(after) = tail.strip_prefix("{context}") {
                out.push_str(context);
                rest = after;
            } else if let Some(after) = tail.strip_prefix("{query}") {
                out.push_str(query);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(pdfrag_core::config::DEFAULT_PROMPT_TEMPLATE)
    }
}
