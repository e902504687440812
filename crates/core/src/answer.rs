use std::collections::BTreeSet;

use crate::error::ChatError;
use crate::llm::{ChatMessage, ChatOptions};
use crate::models::RetrievedChunk;
use crate::traits::ChatModel;

/// Separator between chunk texts in the prompt context block.
pub const CONTEXT_SEPARATOR: &str = "\n---\n";

const TITLE_PROMPT: &str = "You are a title generator. Based on the user's first message, create a short, concise title for the chat session. The title should be no more than 5-7 words. Do not use quotation marks in the title.";

/// Model answer plus the documents whose chunks backed it.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub text: String,
    pub files_used: Vec<String>,
}

fn system_prompt(chunks: &[RetrievedChunk]) -> String {
    let context = if chunks.is_empty() {
        "No context provided.".to_string()
    } else {
        chunks
            .iter()
            .map(|chunk| chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR)
    };

    format!(
        r#"You are an expert AI assistant. Your primary function is to answer user questions based on the provided document context and chat history.

**CRITICAL INSTRUCTIONS:**
1.  **You MUST use ONLY GitHub-Flavored Markdown for all formatting.** This includes lists, bold/italic text, and tables.
2.  **You are STRICTLY FORBIDDEN from using any HTML tags.** Do not generate `<table>`, `<tr>`, `<td>`, or any other HTML element.
3.  **For tables, you MUST use the following Markdown format:**
    ```
    | Header 1 | Header 2 |
    |----------|----------|
    | Cell 1   | Cell 2   |
    | Cell 3   | Cell 4   |
    ```
4.  Base your answers ONLY on the information given in the "CONTEXT FROM DOCUMENTS" section.
5.  If the context does not contain the answer, you MUST state that the information was not found in the provided documents. Do not invent information.
6.  Keep your responses concise and directly related to the user's question and if you dont find the context, just give a generic answer saying "I'm sorry, I can't assist with that because no relevant information was found in the document."

CONTEXT FROM DOCUMENTS:
{context}
"#
    )
}

/// Sorted, deduplicated source filenames, blanks dropped.
pub fn files_used(chunks: &[RetrievedChunk]) -> Vec<String> {
    let unique: BTreeSet<&str> = chunks
        .iter()
        .map(|chunk| chunk.original_filename.as_str())
        .filter(|name| !name.is_empty())
        .collect();
    unique.into_iter().map(str::to_string).collect()
}

/// Answers one question grounded in the retrieved chunks, with prior chat
/// turns carried between the system prompt and the question.
pub async fn generate_answer(
    chat: &dyn ChatModel,
    question: &str,
    history: &[ChatMessage],
    chunks: &[RetrievedChunk],
) -> Result<GeneratedAnswer, ChatError> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system_prompt(chunks)));
    messages.extend(history.iter().cloned());
    messages.push(ChatMessage::user(question));

    let response = chat.invoke(&messages, ChatOptions::default()).await?;
    Ok(GeneratedAnswer {
        text: response.trim().to_string(),
        files_used: files_used(chunks),
    })
}

/// Short session title for a first message, quotation marks removed.
pub async fn generate_title(
    chat: &dyn ChatModel,
    first_message: &str,
) -> Result<String, ChatError> {
    let messages = [
        ChatMessage::system(TITLE_PROMPT),
        ChatMessage::user(first_message),
    ];

    let response = chat.invoke(&messages, ChatOptions::default()).await?;
    Ok(response.trim().replace(['"', '\''], ""))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{files_used, generate_answer, generate_title, system_prompt};
    use crate::error::ChatError;
    use crate::llm::{ChatMessage, ChatOptions};
    use crate::models::RetrievedChunk;
    use crate::traits::ChatModel;

    struct RecordingChat {
        seen: Mutex<Vec<ChatMessage>>,
        response: &'static str,
    }

    impl RecordingChat {
        fn new(response: &'static str) -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                response,
            }
        }
    }

    #[async_trait]
    impl ChatModel for RecordingChat {
        async fn invoke(
            &self,
            messages: &[ChatMessage],
            _options: ChatOptions,
        ) -> Result<String, ChatError> {
            self.seen.lock().unwrap().extend(messages.iter().cloned());
            Ok(self.response.to_string())
        }
    }

    fn chunk(text: &str, filename: &str) -> RetrievedChunk {
        RetrievedChunk {
            text: text.to_string(),
            original_filename: filename.to_string(),
            payload: None,
        }
    }

    #[test]
    fn context_chunks_are_joined_with_the_separator() {
        let prompt = system_prompt(&[chunk("first", "a.pdf"), chunk("second", "b.pdf")]);

        assert!(prompt.contains("first\n---\nsecond"));
        assert!(prompt.contains("CONTEXT FROM DOCUMENTS:"));
    }

    #[test]
    fn missing_context_is_stated_in_the_prompt() {
        let prompt = system_prompt(&[]);

        assert!(prompt.contains("No context provided."));
    }

    #[test]
    fn files_used_is_sorted_unique_and_skips_blanks() {
        let chunks = [
            chunk("t1", "b.pdf"),
            chunk("t2", "a.pdf"),
            chunk("t3", "a.pdf"),
            chunk("t4", ""),
        ];

        assert_eq!(files_used(&chunks), vec!["a.pdf".to_string(), "b.pdf".to_string()]);
    }

    #[tokio::test]
    async fn answer_carries_history_between_prompt_and_question() {
        let chat = RecordingChat::new("  The relief valve opens at 180 bar.  ");
        let history = [
            ChatMessage::user("earlier question"),
            ChatMessage::assistant("earlier answer"),
        ];
        let chunks = [chunk("relief valve: 180 bar", "manual.pdf")];

        let answer = generate_answer(&chat, "At what pressure?", &history, &chunks)
            .await
            .unwrap();

        assert_eq!(answer.text, "The relief valve opens at 180 bar.");
        assert_eq!(answer.files_used, vec!["manual.pdf".to_string()]);

        let seen = chat.seen.lock().unwrap();
        let roles: Vec<&str> = seen.iter().map(|message| message.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(seen[3].content, "At what pressure?");
    }

    #[tokio::test]
    async fn titles_lose_their_quotation_marks() {
        let chat = RecordingChat::new("\"Pump Safety 'Overview'\"\n");

        let title = generate_title(&chat, "how safe is the pump?").await.unwrap();

        assert_eq!(title, "Pump Safety Overview");
    }
}
