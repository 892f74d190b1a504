//! Prompt templates for the four model calls and parsers for their replies.
//!
//! Everything here is pure: no I/O, no state.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{EngineConfig, TokenBudgets};
use crate::domain::types::{AttributeDraft, Component};
use crate::error::{Result, ZwickyError};

static BOLD_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("bold span pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Chat-completion payload posted to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    fn user(model: &str, max_tokens: u32, content: String) -> Self {
        Self {
            model: model.to_string(),
            max_tokens,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content,
            }],
        }
    }

    /// The text of the (single) user message.
    pub fn prompt(&self) -> &str {
        self.messages
            .first()
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    model: String,
    budgets: TokenBudgets,
}

impl PromptBuilder {
    pub fn new(model: impl Into<String>, budgets: TokenBudgets) -> Self {
        Self {
            model: model.into(),
            budgets,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.model.clone(), config.budgets.clone())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn attributes(&self, challenge: &str) -> Result<ChatRequest> {
        let challenge = require_challenge(challenge)?;
        let content = format!(
            r#"You are an expert at morphological analysis and creative problem-solving.
Given a challenge, generate 3 to 5 relevant attributes (dimensions) that should be considered when creating solutions.

For each attribute, also generate a guiding question that helps people think of items for that attribute.

Requirements:
- Attributes should be distinct and non-overlapping
- Attributes should be broad enough to allow multiple items
- Attributes should be directly relevant to solving the challenge
- Attribute names should be concise (1-3 words)
- Questions should help clarify what types of items fit in each attribute
- Questions should be concise (one sentence, maximum 150 characters)
- Respond in the same language as the challenge
- Return ONLY a JSON array of objects with "name" and "question" fields

Example for "How might we increase customer engagement?":
[
  {{"name": "Target Audience", "question": "For which specific customer segment are we designing this solution?"}},
  {{"name": "Core Feature", "question": "Which product, tool, or functionality will serve as the basis for engagement?"}},
  {{"name": "Communication Channel", "question": "Through which channel will we communicate or deliver this solution?"}},
  {{"name": "Incentive", "question": "What rewards or benefits will motivate customers to engage?"}}
]

Challenge: {challenge}

Generate the attributes with questions as a JSON array:"#
        );
        Ok(ChatRequest::user(&self.model, self.budgets.attributes, content))
    }

    pub fn idea(&self, challenge: &str, components: &[Component]) -> Result<ChatRequest> {
        let challenge = require_challenge(challenge)?;
        let components = require_components(components)?;
        let content = format!(
            r#"You are a senior growth & innovation strategist. Generate ONE practical idea by combining ALL selected items from a morphological matrix.

Rules:
- Use ALL selected components. If any item creates an ethical/legal/operational conflict, adapt the execution while preserving the item's intent and state the adjustment.
- Focus on a real end-user problem and the clear value delivered.
- Avoid absolute promises, fabricated testimonials, and unverifiable claims. Use plain language.
- The idea must be testable within 7–14 days with plausible resources.

Input:
Challenge: {challenge}
Selected components: {components}

Output (in the same language as the input, and output ONLY the content in the format below):

**Title** (in sentence case, not title case)

[2–4 sentences describing what will be done, for whom, and why it should work. Include the main mechanism that connects the selected components.]
"#
        );
        Ok(ChatRequest::user(&self.model, self.budgets.idea, content))
    }

    pub fn expansion(
        &self,
        challenge: &str,
        components: &[Component],
        summary: &str,
    ) -> Result<ChatRequest> {
        let challenge = require_challenge(challenge)?;
        let components = render_components(components);
        let content = format!(
            r#"You are a senior growth & innovation strategist. You previously generated this idea summary:

{summary}

Now generate the detailed execution plan for this idea.

Challenge: {challenge}
Selected components: {components}

Output (in the same language as the input, and output ONLY the content in the format below. Use sentence case for all headings, not title case):

**How to execute:**
1) …
2) …
3) …
4) …
5) …

**Quick test:**
- **Hypothesis:**
- **7–14 day experiment:**
- **Primary success metric:**
- **Initial target:**

**Risks & compliance:**
- **Risk:**
- **Mitigation:**

**Required resources:**
- [People, tools, rough budget]
"#
        );
        Ok(ChatRequest::user(&self.model, self.budgets.expansion, content))
    }

    pub fn variation(&self, challenge: &str, reference_idea: &str) -> Result<ChatRequest> {
        let challenge = require_challenge(challenge)?;
        let content = format!(
            r#"You are a senior innovation strategist. Given the challenge and an existing idea, generate a DIFFERENT variation that addresses the same challenge in a more plausible, realistic, and practical way.

Challenge: {challenge}

Reference idea (for inspiration only):
{reference_idea}

Your task:
- Internally analyze what could be improved or done differently
- Generate a standalone idea that addresses the challenge better
- Focus on practicality, feasibility, and clear value proposition
- The new idea should be more grounded and actionable
- Do NOT reference or mention the original idea in your output
- Do NOT explain what was wrong with the original idea
- Present the new idea as if it's a completely fresh solution
- Avoid absolute promises, fabricated testimonials, and unverifiable claims

Output (in the same language as the input, and output ONLY the content in the format below):

**Title** (in sentence case, not title case)

[2–4 sentences describing what will be done, for whom, and why it should work. Focus on the value and mechanism of THIS idea only.]
"#
        );
        Ok(ChatRequest::user(&self.model, self.budgets.variation, content))
    }
}

fn require_challenge(challenge: &str) -> Result<&str> {
    let trimmed = challenge.trim();
    if trimmed.is_empty() {
        return Err(ZwickyError::EmptyChallenge);
    }
    Ok(trimmed)
}

fn require_components(components: &[Component]) -> Result<String> {
    if components.is_empty() {
        return Err(ZwickyError::NoComponents);
    }
    Ok(render_components(components))
}

fn render_components(components: &[Component]) -> String {
    components
        .iter()
        .map(Component::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pulls the completion text out of a gateway response body.
///
/// Accepts OpenAI-style chat completions (`choices[0].message.content`) and
/// Anthropic-style messages (`content[0].text`).
pub fn response_text(body: &Value) -> Result<String> {
    let text = body
        .pointer("/choices/0/message/content")
        .or_else(|| body.pointer("/content/0/text"))
        .and_then(Value::as_str);
    match text {
        Some(t) => Ok(t.to_string()),
        None => Err(ZwickyError::Parse(
            "response carries no completion text".to_string(),
        )),
    }
}

/// Removes a surrounding markdown code fence, if any.
fn strip_code_fence(input: &str) -> &str {
    if let Some(start) = input.find("```") {
        let after = &input[start + 3..];
        // skip the language tag line
        let content_start = after.find('\n').map(|n| n + 1).unwrap_or(0);
        if let Some(end) = after[content_start..].find("```") {
            return after[content_start..content_start + end].trim();
        }
    }
    input.trim()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AttributeEntry {
    Named { name: String, question: Option<String> },
    Plain(String),
}

/// Parses the attribute-generation reply: a JSON array of `{name, question}`
/// objects, or of bare names.
pub fn parse_attributes(text: &str) -> Result<Vec<AttributeDraft>> {
    let cleaned = strip_code_fence(text);
    let value: Value = serde_json::from_str(cleaned)?;
    if !value.is_array() {
        return Err(ZwickyError::Parse(
            "expected a JSON array of attributes".to_string(),
        ));
    }
    let entries: Vec<AttributeEntry> = serde_json::from_value(value)?;
    Ok(entries
        .into_iter()
        .map(|entry| match entry {
            AttributeEntry::Named { name, question } => AttributeDraft {
                name,
                question: question.unwrap_or_default(),
                items: Vec::new(),
            },
            AttributeEntry::Plain(name) => AttributeDraft::named(name),
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitledText {
    pub title: String,
    pub body: String,
}

/// Splits a generated idea into its bold title and the remaining body.
///
/// The first `**...**` span wherever it appears is the title; only that span
/// is removed. If its line is left blank, the line and any blank lines right
/// after it are dropped too. Without a bold span the raw text, whitespace
/// included, is the body.
pub fn extract_titled(text: &str, placeholder: &str) -> TitledText {
    let untitled = || TitledText {
        title: placeholder.to_string(),
        body: text.to_string(),
    };
    let Some(caps) = BOLD_SPAN.captures(text) else {
        return untitled();
    };
    let (Some(span), Some(inner)) = (caps.get(0), caps.get(1)) else {
        return untitled();
    };

    let line_start = text[..span.start()].rfind('\n').map(|n| n + 1).unwrap_or(0);
    let line_end = text[span.end()..]
        .find('\n')
        .map(|n| span.end() + n)
        .unwrap_or(text.len());
    let rest_of_line = format!(
        "{}{}",
        &text[line_start..span.start()],
        &text[span.end()..line_end]
    );

    let body = if rest_of_line.trim().is_empty() {
        let after: Vec<&str> = text[line_end..]
            .trim_start_matches('\n')
            .lines()
            .skip_while(|l| l.trim().is_empty())
            .collect();
        format!("{}{}", &text[..line_start], after.join("\n"))
    } else {
        format!("{}{}", &text[..span.start()], &text[span.end()..])
    };

    TitledText {
        title: inner.as_str().trim().to_string(),
        body: body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn builder() -> PromptBuilder {
        PromptBuilder::new("test-model", TokenBudgets::default())
    }

    #[test]
    fn test_attributes_prompt_embeds_challenge_and_budget() {
        let req = builder()
            .attributes("  How might we reduce food waste?  ")
            .unwrap();
        assert_eq!(req.model, "test-model");
        assert_eq!(req.max_tokens, 1500);
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].role, "user");
        assert!(req.prompt().contains("Challenge: How might we reduce food waste?\n"));
        assert!(req.prompt().contains(r#"{"name": "Target Audience""#));
    }

    #[test]
    fn test_blank_challenge_is_rejected() {
        assert!(matches!(
            builder().attributes("   "),
            Err(ZwickyError::EmptyChallenge)
        ));
        assert!(matches!(
            builder().variation("", "**A**\n\nB"),
            Err(ZwickyError::EmptyChallenge)
        ));
    }

    #[test]
    fn test_idea_prompt_lists_components() {
        let components = vec![
            Component::new("Audience", "Students"),
            Component::new("Channel", "Podcast"),
        ];
        let req = builder().idea("Grow reading", &components).unwrap();
        assert_eq!(req.max_tokens, 300);
        assert!(req
            .prompt()
            .contains("Selected components: Audience: Students\nChannel: Podcast"));
    }

    #[test]
    fn test_idea_prompt_requires_components() {
        assert!(matches!(
            builder().idea("Grow reading", &[]),
            Err(ZwickyError::NoComponents)
        ));
    }

    #[test]
    fn test_expansion_and_variation_budgets() {
        let components = vec![Component::new("Audience", "Students")];
        let expansion = builder()
            .expansion("Grow reading", &components, "A summary")
            .unwrap();
        assert_eq!(expansion.max_tokens, 1200);
        assert!(expansion.prompt().contains("A summary"));
        assert!(expansion.prompt().contains("**How to execute:**"));

        let variation = builder()
            .variation("Grow reading", "**Book club**\n\nMonthly meetups.")
            .unwrap();
        assert_eq!(variation.max_tokens, 350);
        assert!(variation.prompt().contains("**Book club**\n\nMonthly meetups."));
        assert!(variation
            .prompt()
            .contains("Do NOT reference or mention the original idea"));
    }

    #[test]
    fn test_parse_attribute_objects() {
        let text = r#"[{"name": "Audience", "question": "Who is it for?"}, {"name": "Channel"}]"#;
        let drafts = parse_attributes(text).unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].name, "Audience");
        assert_eq!(drafts[0].question, "Who is it for?");
        assert_eq!(drafts[1].question, "");
        assert!(drafts.iter().all(|d| d.items.is_empty()));
    }

    #[test]
    fn test_parse_plain_attribute_names() {
        let drafts = parse_attributes(r#"["Target Audience", "Platform"]"#).unwrap();
        assert_eq!(
            drafts,
            vec![
                AttributeDraft::named("Target Audience"),
                AttributeDraft::named("Platform")
            ]
        );
    }

    #[test]
    fn test_parse_attributes_inside_code_fence() {
        let text = "```json\n[\"Audience\"]\n```";
        let drafts = parse_attributes(text).unwrap();
        assert_eq!(drafts[0].name, "Audience");
    }

    #[test]
    fn test_parse_attributes_rejects_bad_shapes() {
        assert!(matches!(
            parse_attributes("not json at all"),
            Err(ZwickyError::Parse(_))
        ));
        assert!(matches!(
            parse_attributes(r#"{"name": "Audience"}"#),
            Err(ZwickyError::Parse(_))
        ));
        assert!(matches!(
            parse_attributes("[42]"),
            Err(ZwickyError::Parse(_))
        ));
    }

    #[test]
    fn test_extract_title_and_body() {
        let titled = extract_titled("**Foo bar**\n\nBody text here.", "Idea");
        assert_eq!(titled.title, "Foo bar");
        assert_eq!(titled.body, "Body text here.");
    }

    #[test]
    fn test_extract_without_marker_uses_placeholder() {
        let titled = extract_titled("Just a plain idea.", "Idea Variation");
        assert_eq!(titled.title, "Idea Variation");
        assert_eq!(titled.body, "Just a plain idea.");
    }

    #[test]
    fn test_extract_without_marker_keeps_raw_whitespace() {
        let text = "  An idea with indentation.\n\n";
        let titled = extract_titled(text, "Idea");
        assert_eq!(titled.title, "Idea");
        assert_eq!(titled.body, text);
    }

    #[test]
    fn test_extract_strips_only_first_span() {
        let text = "Intro line\n**Main title**\n\n\nBody with **emphasis** inside.";
        let titled = extract_titled(text, "Idea");
        assert_eq!(titled.title, "Main title");
        assert_eq!(titled.body, "Intro line\nBody with **emphasis** inside.");
    }

    #[test]
    fn test_extract_inline_span_keeps_surrounding_text() {
        let titled = extract_titled("We propose **Night market** for locals.", "Idea");
        assert_eq!(titled.title, "Night market");
        assert_eq!(titled.body, "We propose  for locals.");
    }

    #[test]
    fn test_response_text_shapes() {
        let openai = json!({"choices": [{"message": {"role": "assistant", "content": "hello"}}]});
        assert_eq!(response_text(&openai).unwrap(), "hello");

        let anthropic = json!({"content": [{"type": "text", "text": "hi"}]});
        assert_eq!(response_text(&anthropic).unwrap(), "hi");

        assert!(matches!(
            response_text(&json!({"unexpected": true})),
            Err(ZwickyError::Parse(_))
        ));
    }
}
