//! Prompt templates for the rating model

use crate::error::Result;
use crate::payload::EvaluationPayload;
use minijinja::{Environment, context};

const USER_TEMPLATE_NAME: &str = "rating.user";

/// Role, scope and non-advice framing for the research assistant
pub const SYSTEM_PROMPT: &str = r"You are an equity research assistant for an experienced but busy investor.
You receive structured JSON that includes:
- real-time quote & basic fundamentals,
- recent earnings details,
- a list of recent news headlines with timestamps and sources,
- latest filings / annual reports links when available,
- a simplified options snapshot (for covered calls and cash-secured puts),
- and a data_quality section indicating which data is present or missing.

Your job is to:
1. Produce a concise but detailed research report in markdown.
2. Highlight key risks, catalysts, and any recent issues or controversies.
3. Provide a non-binding, opinionated classification on whether:
   - the current moment seems attractive / neutral / unattractive for a new stock position (entry),
   - selling covered calls on an existing position seems attractive / neutral / unattractive,
   - selling cash-secured puts seems attractive / neutral / unattractive.

Treat this strictly as educational research, not as guaranteed or personalized financial advice.
Never give absolute instructions like 'you must buy now'; instead, describe the risk-reward profile and conditions under which an experienced investor might consider each action.
If some data is missing (e.g., no options, no recent news), clearly state that limitation.";

/// JSON document the model must answer with
pub const RESPONSE_FORMAT: &str = r#"{
  "summary_markdown": "Detailed markdown report with analysis",
  "entry": {
    "rating": "strong_buy|buy|hold|avoid",
    "rationale": "Explanation for entry rating"
  },
  "covered_call": {
    "rating": "attractive|neutral|unattractive",
    "rationale": "Explanation for covered call rating",
    "notes": "Additional notes on covered calls"
  },
  "secured_put": {
    "rating": "attractive|neutral|unattractive",
    "rationale": "Explanation for secured put rating",
    "notes": "Additional notes on secured puts"
  },
  "risks_and_issues": [
    {
      "label": "Risk label",
      "details": "Detailed description of the risk"
    }
  ],
  "key_dates": [
    {
      "label": "Event label",
      "date": "YYYY-MM-DD",
      "notes": "Event description"
    }
  ]
}"#;

const USER_TEMPLATE: &str = r"Please analyze the following stock data for {{ symbol }} ({{ name }}) and provide a comprehensive research report:

```json
{{ payload_json }}
```
{% if missing %}
Missing inputs: {{ missing | join(', ') }}.
{% endif %}
Please provide your analysis in the following JSON format:
{{ response_format }}";

/// Renders the user message for a payload
pub struct PromptRenderer {
    env: Environment<'static>,
}

impl PromptRenderer {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template(USER_TEMPLATE_NAME, USER_TEMPLATE)?;
        Ok(Self { env })
    }

    pub fn system_prompt(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    /// User message embedding the payload as indented JSON
    pub fn render_user(&self, payload: &EvaluationPayload) -> Result<String> {
        let quality = payload.data_quality;
        let missing: Vec<&str> = [
            (!quality.has_options).then_some("options"),
            (!quality.has_recent_news).then_some("recent news"),
            (!quality.has_earnings_data).then_some("earnings"),
            (!quality.has_fundamentals).then_some("fundamentals"),
        ]
        .into_iter()
        .flatten()
        .collect();

        let template = self.env.get_template(USER_TEMPLATE_NAME)?;
        let rendered = template.render(context! {
            symbol => &payload.symbol,
            name => &payload.name,
            payload_json => payload.to_json_pretty()?,
            missing => missing,
            response_format => RESPONSE_FORMAT,
        })?;
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::PayloadSources;
    use crate::providers::{EarningsData, Quote};

    fn payload(quote: &Quote) -> EvaluationPayload {
        let earnings = EarningsData::default();
        EvaluationPayload::assemble(
            PayloadSources {
                symbol: "AAPL",
                fallback_name: "Apple Inc",
                quote,
                earnings: &earnings,
                news: &[],
                options: None,
                filings: &[],
            },
            5,
            5,
        )
    }

    #[test]
    fn test_render_user_prompt() {
        let renderer = PromptRenderer::new().unwrap();
        let prompt = renderer.render_user(&payload(&Quote::new("AAPL", 190.0))).unwrap();

        assert!(prompt.contains("stock data for AAPL (Apple Inc)"));
        assert!(prompt.contains("```json\n{"));
        assert!(prompt.contains("\"has_fundamentals\": false"));
        assert!(prompt.contains("\"risks_and_issues\""));
        assert!(prompt.contains("Missing inputs: options, recent news, earnings, fundamentals."));
    }

    #[test]
    fn test_render_omits_missing_line_when_complete() {
        let renderer = PromptRenderer::new().unwrap();
        let mut payload = payload(&Quote::new("AAPL", 190.0));
        payload.data_quality.has_options = true;
        payload.data_quality.has_recent_news = true;
        payload.data_quality.has_earnings_data = true;
        payload.data_quality.has_fundamentals = true;

        let prompt = renderer.render_user(&payload).unwrap();
        assert!(!prompt.contains("Missing inputs"));
    }

    #[test]
    fn test_system_prompt_disclaimer() {
        let renderer = PromptRenderer::new().unwrap();
        assert!(renderer.system_prompt().contains("not as guaranteed or personalized financial advice"));
    }
}
