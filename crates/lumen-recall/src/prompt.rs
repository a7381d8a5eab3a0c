//! Prediction prompts and their replies.

use lumen_core::language::markdown_language;
use lumen_core::{CodeReference, Functionality};
use serde::Deserialize;

use crate::llm::ChatMessage;

const PREDICTION_SYSTEM_PROMPT: &str = "\
You help a code assistant gather context. Read the code the user shares \
and name the symbols it uses whose definitions are not shown: functions, \
classes, types, constants and components defined elsewhere in the project. \
Also describe in one sentence what related code would help to understand it.

Respond with a JSON object and nothing else:
{
  \"references\": [\"symbolName\"],
  \"comments\": \"one sentence describing the related code\"
}

If nothing is referenced, return: { \"references\": [], \"comments\": \"\" }";

const COMPLETION_PREDICTION_SYSTEM_PROMPT: &str = "\
You help a code completion engine gather context. The user shares a whole \
file with the cursor marked as <CURSOR>. Name the symbols defined elsewhere \
that the code at the cursor is likely to use, and describe in one sentence \
the code that would help to complete it.

Respond with a JSON object and nothing else:
{
  \"references\": [\"symbolName\"],
  \"comments\": \"one sentence describing the related code\"
}";

/// Marker inserted at the cursor of a completion prediction prompt.
pub const CURSOR_MARKER: &str = "<CURSOR>";

/// Symbols and a comment predicted from a snippet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Prediction {
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default)]
    pub comments: Option<String>,
}

impl Prediction {
    /// The predicted comment, if non-blank.
    pub fn comment(&self) -> Option<&str> {
        self.comments.as_deref().filter(|c| !c.trim().is_empty())
    }
}

/// Fence `code` as a markdown code block.
///
/// # Examples
///
/// ```
/// use lumen_recall::prompt::wrap_in_codeblock;
///
/// assert_eq!(wrap_in_codeblock("tsx", "<A />"), "```tsx\n<A />\n```");
/// ```
pub fn wrap_in_codeblock(lang: &str, code: &str) -> String {
    format!("```{lang}\n{code}\n```")
}

/// Fence the source of `code_ref`, using its markdown language.
pub fn wrap_code_ref(code_ref: &CodeReference) -> String {
    wrap_in_codeblock(markdown_language(&code_ref.language_id), &code_ref.source_code)
}

/// Messages asking the chat channel for the symbols used by `code_refs`.
pub fn build_prediction_messages(
    code_refs: &[&CodeReference],
    functionality: Functionality,
    content: Option<&str>,
) -> Vec<ChatMessage> {
    let mut user = String::new();
    if !functionality.is_free_chat() {
        user.push_str(&format!("Task: {}.\n\n", functionality.instruction()));
    }
    if let Some(content) = content {
        user.push_str(&format!("Question: {content}\n\n"));
    }
    for (i, code_ref) in code_refs.iter().enumerate() {
        user.push_str(&format!(
            "Snippet {} from {}:\n{}\n\n",
            i + 1,
            code_ref.file_name,
            wrap_code_ref(code_ref)
        ));
    }
    vec![
        ChatMessage::system(PREDICTION_SYSTEM_PROMPT),
        ChatMessage::user(user.trim_end()),
    ]
}

/// Messages asking the chat channel what the code at `position` needs.
///
/// `position` is a byte offset into `document`; it is moved back to the
/// nearest character boundary.
pub fn build_completion_prediction_messages(
    file_path: &str,
    document: &str,
    position: usize,
) -> Vec<ChatMessage> {
    let mut at = position.min(document.len());
    while !document.is_char_boundary(at) {
        at -= 1;
    }
    let marked = format!("{}{CURSOR_MARKER}{}", &document[..at], &document[at..]);
    vec![
        ChatMessage::system(COMPLETION_PREDICTION_SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "File: {file_path}\n{}",
            wrap_in_codeblock("javascript", &marked)
        )),
    ]
}

/// Cut a reply down to its outermost `{…}` object.
///
/// Returns an empty string when the reply holds no object.
///
/// # Examples
///
/// ```
/// use lumen_recall::prompt::remove_unexpected_content;
///
/// let reply = "Sure!\n```json\n{\"references\": [\"a\"], \"x\": {\"y\": 1}}\n```";
/// assert_eq!(
///     remove_unexpected_content(reply),
///     "{\"references\": [\"a\"], \"x\": {\"y\": 1}}"
/// );
/// assert_eq!(remove_unexpected_content("no json here"), "");
/// ```
pub fn remove_unexpected_content(reply: &str) -> &str {
    match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => "",
    }
}

/// Parse a prediction reply. Malformed replies yield `None`.
pub fn parse_prediction(reply: &str) -> Option<Prediction> {
    let json = remove_unexpected_content(reply);
    if json.is_empty() {
        return None;
    }
    match serde_json::from_str::<Prediction>(json) {
        Ok(mut prediction) => {
            prediction.references.retain(|r| !r.trim().is_empty());
            prediction.references.dedup();
            Some(prediction)
        }
        Err(e) => {
            tracing::debug!(error = %e, "unparseable prediction");
            None
        }
    }
}
