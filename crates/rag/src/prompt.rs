pub const CONTEXT_BEGIN: &str = "[BEGIN CONTEXT]";
pub const CONTEXT_END: &str = "[END CONTEXT]";
pub const PASSAGE_SEPARATOR: &str = "\n---\n";

/// Wraps the passages in the context markers and appends the question.
/// The result is not truncated; oversized prompts are left to the model.
pub fn format_prompt<S: AsRef<str>>(passages: &[S], question: &str) -> String {
    let context = passages
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(PASSAGE_SEPARATOR);
    format!(
        "You are a helpful assistant. Use ONLY the following context to answer the question.\n\n\
         {CONTEXT_BEGIN}\n{context}\n{CONTEXT_END}\n\n\
         Question: {question}\nAnswer:"
    )
}
