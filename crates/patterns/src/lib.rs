//! Pure pattern-matching helpers shared by the transcript reader and the
//! validator agents. Every public function here is a pure `&str -> T`
//! computation — no I/O, no LLM calls — so it can be unit tested cheaply and
//! reused from both the reader's filters and the pipeline's prompt builders.

pub mod blacklist;
pub mod question;
pub mod rules;
pub mod style;
pub mod transcript_filters;

pub use blacklist::{BlacklistHit, WorkaroundCategory, blacklist_highlights, workaround_category};
pub use question::{
    QuestionKind, classify_question, detect_plan_approval_phrasing, extract_real_question, looks_like_plain_text_question,
};
pub use rules::{RuleViolation, content_rule_violations};
pub use style::{QuotePreference, StyleFinding, StyleFindingKind, detect_emoji_additions, style_diff};
pub use transcript_filters::{is_host_interruption, is_system_reminder, is_slash_command_prompt};
