use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;

/// System prompts sent ahead of the user's message.
///
/// Placeholders substituted at request time: `{today}`, `{weekday}`,
/// `{timezone}`, `{utc_offset}`, `{date_format}` and `{categories}`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PromptTemplates {
    #[serde(default = "default_extraction_prompt")]
    pub extraction: String,
    #[serde(default = "default_classification_prompt")]
    pub classification: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            extraction: default_extraction_prompt(),
            classification: default_classification_prompt(),
        }
    }
}

fn default_extraction_prompt() -> String {
    "Extract a calendar event from the user's message. \
     Today is {today} ({weekday}), the user's timezone is {timezone} (UTC{utc_offset}). \
     Resolve relative dates such as \"tomorrow\" or \"Saturday\" against today's date. \
     Respond with raw JSON only, without markdown or explanations, in the form \
     {\"summary\": string, \"start\": string, \"end\": string}, \
     where start and end are ISO-8601 date-times formatted as {date_format}. \
     If no end time is given, make the event one hour long."
        .to_string()
}

fn default_classification_prompt() -> String {
    "Classify the user's message into exactly one of these categories: {categories}. \
     Respond with the category name only, exactly as written above."
        .to_string()
}

/// Values substituted into a prompt template.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub now: DateTime<FixedOffset>,
    pub timezone_label: String,
    pub date_format: String,
}

impl PromptContext {
    /// Context for the current moment in the configured fixed offset.
    pub fn current(utc_offset_hours: i32, timezone_label: &str, date_format: &str) -> Result<Self> {
        let offset = utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .with_context(|| format!("Invalid UTC offset: {} hours", utc_offset_hours))?;
        Ok(Self {
            now: Utc::now().with_timezone(&offset),
            timezone_label: timezone_label.to_string(),
            date_format: date_format.to_string(),
        })
    }

    pub fn render(&self, template: &str) -> String {
        template
            .replace("{today}", &self.now.format("%Y-%m-%d").to_string())
            .replace("{weekday}", &self.now.format("%A").to_string())
            .replace("{timezone}", &self.timezone_label)
            .replace("{utc_offset}", &self.now.offset().to_string())
            .replace("{date_format}", &self.date_format)
            .replace("{categories}", &Category::labels().join(", "))
    }
}

/// Closed set of labels the classification prompt may answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    TodoItem,
    CalendarEvent,
    GiftIdea,
    PlaceToVisit,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::TodoItem,
        Category::CalendarEvent,
        Category::GiftIdea,
        Category::PlaceToVisit,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::TodoItem => "TODO item",
            Category::CalendarEvent => "calendar event",
            Category::GiftIdea => "gift idea",
            Category::PlaceToVisit => "place to visit",
        }
    }

    pub fn labels() -> Vec<&'static str> {
        Self::ALL.iter().map(|c| c.label()).collect()
    }

    /// Match a model answer against the fixed labels.
    /// Surrounding whitespace, quotes and a trailing period are ignored, as is case.
    pub fn parse(answer: &str) -> Option<Self> {
        let normalized = answer
            .trim()
            .trim_matches(|c| c == '"' || c == '\'' || c == '`')
            .trim_end_matches('.')
            .trim();
        Self::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(normalized))
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_context() -> PromptContext {
        let msk = FixedOffset::east_opt(3 * 3600).unwrap();
        PromptContext {
            now: msk.with_ymd_and_hms(2024, 11, 15, 10, 30, 0).unwrap(),
            timezone_label: "MSK".to_string(),
            date_format: "YYYY-MM-DDTHH:MM:SS+03:00".to_string(),
        }
    }

    #[test]
    fn test_render_extraction_prompt() {
        let prompt = fixed_context().render(&PromptTemplates::default().extraction);
        assert!(prompt.contains("Today is 2024-11-15 (Friday)"));
        assert!(prompt.contains("MSK (UTC+03:00)"));
        assert!(prompt.contains("formatted as YYYY-MM-DDTHH:MM:SS+03:00"));
        assert!(prompt.contains(r#"{"summary": string, "start": string, "end": string}"#));
        assert!(!prompt.contains("{today}"));
    }

    #[test]
    fn test_render_classification_prompt_lists_categories() {
        let prompt = fixed_context().render(&PromptTemplates::default().classification);
        assert!(prompt.contains("TODO item, calendar event, gift idea, place to visit"));
    }

    #[test]
    fn test_render_leaves_plain_templates_alone() {
        assert_eq!(fixed_context().render("no placeholders"), "no placeholders");
    }

    #[test]
    fn test_current_rejects_out_of_range_offset() {
        assert!(PromptContext::current(30, "X", "").is_err());
        let ctx = PromptContext::current(3, "MSK", "").unwrap();
        assert_eq!(ctx.now.offset().local_minus_utc(), 3 * 3600);
    }

    #[test]
    fn test_category_parse_exact_labels() {
        for category in Category::ALL {
            assert_eq!(Category::parse(category.label()), Some(category));
        }
    }

    #[test]
    fn test_category_parse_tolerates_decoration() {
        assert_eq!(Category::parse("  Calendar Event.\n"), Some(Category::CalendarEvent));
        assert_eq!(Category::parse("\"gift idea\""), Some(Category::GiftIdea));
        assert_eq!(Category::parse("todo ITEM"), Some(Category::TodoItem));
    }

    #[test]
    fn test_category_parse_unknown() {
        assert_eq!(Category::parse("shopping list"), None);
        assert_eq!(Category::parse("calendar event tomorrow"), None);
        assert_eq!(Category::parse(""), None);
    }
}
