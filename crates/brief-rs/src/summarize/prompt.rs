//! Prompt templates for the three kinds of summary call.
//!
//! Every template has a single `{text}` placeholder. Stuff mode renders the
//! whole document into [`SummaryPrompts::stuff`]; map-reduce renders each
//! chunk (and each intermediate collapse chunk) into
//! [`SummaryPrompts::map`], and the joined partial summaries into
//! [`SummaryPrompts::combine`] for the last call.

use crate::llm::ChatMessage;

const PLACEHOLDER: &str = "{text}";

const VIDEO_STUFF: &str = "\
Write a concise Japanese summary of the following transcript of Youtube Video.
============
{text}
============

ここから日本語で書いてね
必ず10段落以内の600文字以内で簡潔にまとめること:
";

const VIDEO_COMBINE: &str = "\
The following are consecutive partial summaries of one Youtube Video transcript, in order.
Merge them into one concise Japanese summary that follows the same order.
============
{text}
============

ここから日本語で書いてね
必ず10段落以内の600文字以内で簡潔にまとめること:
";

const WEB_STUFF: &str = "\
以下はとある。Webページのコンテンツである。内容を{n_chars}程度でわかりやすく要約してください。
========
{text}
========
日本語で書いてね！
";

const WEB_COMBINE: &str = "\
以下はとあるWebページを前から順に部分ごとに要約したものである。全体の内容を{n_chars}程度でわかりやすく一つの要約にまとめてください。
========
{text}
========
日本語で書いてね！
";

const GENERIC_STUFF: &str = "\
Write a concise summary of the following text.

\"{text}\"

CONCISE SUMMARY:";

const GENERIC_COMBINE: &str = "\
The following are partial summaries of consecutive parts of one text, in order. \
Combine them into a single concise summary that keeps that order.

\"{text}\"

CONCISE SUMMARY:";

const MAP: &str = "\
Write a concise summary of the following part of a longer text. \
Keep names, numbers and the order of events.

\"{text}\"

CONCISE SUMMARY:";

/// Default summary length (in characters) requested for web pages.
pub const DEFAULT_WEB_SUMMARY_CHARS: usize = 300;

/// A prompt with one `{text}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Templates without a `{text}` placeholder get the text appended after
    /// a blank line.
    pub fn new(template: impl Into<String>) -> Self {
        let mut template = template.into();
        if !template.contains(PLACEHOLDER) {
            template.push_str("\n\n");
            template.push_str(PLACEHOLDER);
        }
        Self { template }
    }

    pub fn render(&self, text: &str) -> String {
        self.template.replacen(PLACEHOLDER, text, 1)
    }

    /// The one-message request for `text`.
    pub fn to_messages(&self, text: &str) -> Vec<ChatMessage> {
        vec![ChatMessage::user(self.render(text))]
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }
}

/// Templates for stuff, map and combine calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryPrompts {
    pub stuff: PromptTemplate,
    pub map: PromptTemplate,
    pub combine: PromptTemplate,
}

impl SummaryPrompts {
    /// Japanese summary of a video transcript (≤10 paragraphs, ≤600 chars).
    pub fn video() -> Self {
        Self {
            stuff: PromptTemplate::new(VIDEO_STUFF),
            map: PromptTemplate::new(MAP),
            combine: PromptTemplate::new(VIDEO_COMBINE),
        }
    }

    /// Japanese summary of a web page in roughly `n_chars` characters.
    pub fn web(n_chars: usize) -> Self {
        let n = n_chars.to_string();
        Self {
            stuff: PromptTemplate::new(WEB_STUFF.replace("{n_chars}", &n)),
            map: PromptTemplate::new(MAP),
            combine: PromptTemplate::new(WEB_COMBINE.replace("{n_chars}", &n)),
        }
    }

    /// Language-neutral concise summary.
    pub fn generic() -> Self {
        Self {
            stuff: PromptTemplate::new(GENERIC_STUFF),
            map: PromptTemplate::new(MAP),
            combine: PromptTemplate::new(GENERIC_COMBINE),
        }
    }
}

impl Default for SummaryPrompts {
    fn default() -> Self {
        Self::generic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_text_once() {
        let t = PromptTemplate::new("A {text} B");
        assert_eq!(t.render("x {text} y"), "A x {text} y B");
    }

    #[test]
    fn template_without_placeholder_appends_text() {
        let t = PromptTemplate::new("Summarize:");
        assert_eq!(t.render("body"), "Summarize:\n\nbody");
    }

    #[test]
    fn web_prompt_carries_length_target() {
        let prompts = SummaryPrompts::web(300);
        let rendered = prompts.stuff.render("本文");
        assert!(rendered.contains("内容を300程度で"));
        assert!(rendered.contains("本文"));
        assert!(!rendered.contains("{n_chars}"));
        assert!(prompts.combine.render("x").contains("300程度"));
    }

    #[test]
    fn video_prompt_embeds_transcript() {
        let prompts = SummaryPrompts::video();
        let messages = prompts.stuff.to_messages("transcript body");
        assert_eq!(messages.len(), 1);
        assert!(messages[0].content.contains("============\ntranscript body\n============"));
        assert!(messages[0].content.contains("600文字以内"));
    }
}
