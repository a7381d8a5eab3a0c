use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A pointer to a piece of source used as chat context.
///
/// # Examples
///
/// ```
/// use lumen_core::CodeReference;
///
/// let code_ref = CodeReference::snippet("typescript", "/work/app/src/a.ts", "function add() {}");
/// assert_eq!(code_ref.file_name, "a.ts");
/// assert!(code_ref.document.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeReference {
    /// Editor language id (e.g. `"typescriptreact"`).
    pub language_id: String,
    /// Absolute path of the referenced file.
    pub file_url: String,
    /// Path relative to the project root, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// File name (last component of the path).
    pub file_name: String,
    /// Full text of the document the snippet came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    /// The referenced source text.
    pub source_code: String,
    /// First selected line (0-indexed).
    #[serde(default)]
    pub selected_start_line: u32,
    /// First selected column (0-indexed).
    #[serde(default)]
    pub selected_start_column: u32,
    /// Last selected line (0-indexed).
    #[serde(default)]
    pub selected_end_line: u32,
    /// Last selected column (0-indexed).
    #[serde(default)]
    pub selected_end_column: u32,
}

impl CodeReference {
    /// Build a reference for `source_code` in the file at `file_url`.
    pub fn snippet(language_id: &str, file_url: &str, source_code: &str) -> Self {
        let file_name = file_url
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(file_url)
            .to_string();
        Self {
            language_id: language_id.to_string(),
            file_url: file_url.to_string(),
            file_name,
            source_code: source_code.to_string(),
            ..Self::default()
        }
    }
}

/// Status of one recall stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecallStatus {
    Loading,
    Done,
    Terminated,
}

/// One stage of a recall, as shown to the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecallStep {
    pub status: RecallStatus,
}

/// Per-turn recall state: staged progress plus the references merged so far.
///
/// Stages only move forward: each call to [`RecallRecord::advance`] either
/// marks more stages `done` or does nothing, and a terminated record never
/// changes again.
///
/// # Examples
///
/// ```
/// use lumen_core::{RecallRecord, RecallStatus};
///
/// let mut record = RecallRecord::new();
/// record.advance(1);
/// record.advance(0);
/// assert_eq!(record.done_count(), 1);
/// assert_eq!(record.steps.last().unwrap().status, RecallStatus::Loading);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecallRecord {
    pub steps: Vec<RecallStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_refs: Option<Vec<CodeReference>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_refs: Option<Vec<CodeReference>>,
}

/// Total number of recall stages.
pub const RECALL_STAGES: usize = 3;

impl RecallRecord {
    /// A record with a single `loading` stage.
    pub fn new() -> Self {
        Self {
            steps: vec![RecallStep {
                status: RecallStatus::Loading,
            }],
            local_refs: None,
            remote_refs: None,
        }
    }

    /// Number of stages marked `done`.
    pub fn done_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == RecallStatus::Done)
            .count()
    }

    /// Whether the last stage was terminated by cancellation.
    pub fn is_terminated(&self) -> bool {
        self.steps
            .last()
            .is_some_and(|s| s.status == RecallStatus::Terminated)
    }

    /// Whether every stage is `done`.
    pub fn is_complete(&self) -> bool {
        self.steps.len() == RECALL_STAGES && self.done_count() == RECALL_STAGES
    }

    /// Mark the first `done` stages complete, followed by one `loading`
    /// stage unless all stages are done. Returns `false` when the call would
    /// not move the record forward.
    pub fn advance(&mut self, done: usize) -> bool {
        let done = done.min(RECALL_STAGES);
        if self.is_terminated() || done <= self.done_count() {
            return false;
        }
        let mut steps = vec![
            RecallStep {
                status: RecallStatus::Done,
            };
            done
        ];
        if done < RECALL_STAGES {
            steps.push(RecallStep {
                status: RecallStatus::Loading,
            });
        }
        self.steps = steps;
        true
    }

    /// Mark the stage in progress as `terminated`. Returns `false` when
    /// nothing was loading.
    pub fn terminate(&mut self) -> bool {
        match self.steps.last_mut() {
            Some(step) if step.status == RecallStatus::Loading => {
                step.status = RecallStatus::Terminated;
                true
            }
            _ => false,
        }
    }

    /// Append references to the local list, creating it if needed.
    pub fn push_local_refs(&mut self, refs: Vec<CodeReference>) {
        if refs.is_empty() {
            return;
        }
        self.local_refs.get_or_insert_with(Vec::new).extend(refs);
    }
}

impl Default for RecallRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// The command that produced a chat turn.
///
/// Only [`Functionality::PureChat`] is free-form; every other variant is a
/// canned code action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Functionality {
    PureChat,
    ExplainCode,
    FixCode,
    GenerateTest,
    CheckPerformance,
    ReviewCode,
    CommentCode,
    CommentMethod,
}

impl Functionality {
    /// Whether the turn is free-form chat.
    pub fn is_free_chat(self) -> bool {
        self == Functionality::PureChat
    }

    /// The canned instruction that opens a code-action turn.
    pub fn instruction(self) -> &'static str {
        match self {
            Functionality::PureChat => "",
            Functionality::ExplainCode => "Explain the following code",
            Functionality::FixCode => "Fix the bugs in the following code",
            Functionality::GenerateTest => "Generate unit tests for the following code",
            Functionality::CheckPerformance => "Check the performance of the following code",
            Functionality::ReviewCode => "Review the following code",
            Functionality::CommentCode => "Add comments to the following code",
            Functionality::CommentMethod => "Write a doc comment for the following method",
        }
    }
}

impl FromStr for Functionality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "chat" | "pure-chat" => Ok(Functionality::PureChat),
            "explain" | "explain-code" => Ok(Functionality::ExplainCode),
            "fix" | "fix-code" => Ok(Functionality::FixCode),
            "test" | "generate-test" => Ok(Functionality::GenerateTest),
            "performance" | "check-performance" => Ok(Functionality::CheckPerformance),
            "review" | "review-code" => Ok(Functionality::ReviewCode),
            "comment" | "comment-code" => Ok(Functionality::CommentCode),
            "comment-method" => Ok(Functionality::CommentMethod),
            _ => Err(format!("unknown functionality: {s}")),
        }
    }
}

/// How a chat turn was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChatMode {
    /// Regular turn; recall may run.
    #[default]
    Normal,
    /// Raw turn sent without any retrieved context.
    Raw,
}

/// One user turn handed to the recall orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    /// Free text typed by the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Code selected or attached by the user, in attach order.
    #[serde(default)]
    pub code_refs: Vec<CodeReference>,
    #[serde(default)]
    pub mode: ChatMode,
    pub functionality: Functionality,
}

impl ChatTurn {
    /// The free text, if non-blank.
    pub fn text(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.trim().is_empty())
    }

    /// The most recently attached code reference.
    pub fn last_code_ref(&self) -> Option<&CodeReference> {
        self.code_refs.last()
    }
}

/// Output format for CLI results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("unknown output format: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statuses(record: &RecallRecord) -> Vec<RecallStatus> {
        record.steps.iter().map(|s| s.status).collect()
    }

    #[test]
    fn recall_record_starts_loading() {
        let record = RecallRecord::new();
        assert_eq!(statuses(&record), vec![RecallStatus::Loading]);
        assert!(!record.is_complete());
    }

    #[test]
    fn recall_record_advances_in_order() {
        let mut record = RecallRecord::new();
        assert!(record.advance(1));
        assert_eq!(
            statuses(&record),
            vec![RecallStatus::Done, RecallStatus::Loading]
        );
        assert!(record.advance(2));
        assert!(record.advance(3));
        assert_eq!(statuses(&record), vec![RecallStatus::Done; 3]);
        assert!(record.is_complete());
    }

    #[test]
    fn recall_record_never_rewinds() {
        let mut record = RecallRecord::new();
        record.advance(2);
        assert!(!record.advance(1));
        assert!(!record.advance(2));
        assert_eq!(record.done_count(), 2);
    }

    #[test]
    fn terminated_record_is_frozen() {
        let mut record = RecallRecord::new();
        record.advance(1);
        assert!(record.terminate());
        assert!(record.is_terminated());
        assert!(!record.advance(3));
        assert!(!record.terminate());
        assert_eq!(
            statuses(&record),
            vec![RecallStatus::Done, RecallStatus::Terminated]
        );
    }

    #[test]
    fn complete_record_cannot_be_terminated() {
        let mut record = RecallRecord::new();
        record.advance(3);
        assert!(!record.terminate());
        assert!(record.is_complete());
    }

    #[test]
    fn monotone_under_any_sequence() {
        let ops: [i32; 9] = [2, 0, 1, -1, 3, 1, 0, -1, 2];
        let mut record = RecallRecord::new();
        let mut last = 0;
        for op in ops {
            if op < 0 {
                record.terminate();
            } else {
                record.advance(op as usize);
            }
            let done = record.done_count();
            assert!(done >= last, "doneness went from {last} to {done}");
            last = done;
        }
    }

    #[test]
    fn recall_record_serializes_camel_case() {
        let mut record = RecallRecord::new();
        record.push_local_refs(vec![CodeReference::snippet("typescript", "/a.ts", "x()")]);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["steps"][0]["status"], "loading");
        assert_eq!(json["localRefs"][0]["sourceCode"], "x()");
        assert!(json.get("remoteRefs").is_none());
    }

    #[test]
    fn functionality_parses_aliases() {
        assert_eq!("chat".parse::<Functionality>().unwrap(), Functionality::PureChat);
        assert_eq!(
            "explain_code".parse::<Functionality>().unwrap(),
            Functionality::ExplainCode
        );
        assert!("dance".parse::<Functionality>().is_err());
        assert!(Functionality::PureChat.is_free_chat());
        assert!(!Functionality::FixCode.is_free_chat());
    }

    #[test]
    fn code_reference_snippet_derives_file_name() {
        let r = CodeReference::snippet("javascript", r"C:\proj\src\util.js", "a");
        assert_eq!(r.file_name, "util.js");
    }

    #[test]
    fn chat_turn_ignores_blank_text() {
        let turn = ChatTurn {
            content: Some("   ".into()),
            code_refs: Vec::new(),
            mode: ChatMode::Normal,
            functionality: Functionality::PureChat,
        };
        assert!(turn.text().is_none());
        assert!(turn.last_code_ref().is_none());
    }
}
