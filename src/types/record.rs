use serde::{Deserialize, Serialize};

use crate::metrics::HarvestMetrics;

/// One subsection of an article: its heading and the text that follows it.
///
/// Both fields are non-empty. Deserialization enforces the same rule as
/// [`Section::new`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "SectionFields")]
pub struct Section {
    title: String,
    content: String,
}

#[derive(Deserialize)]
struct SectionFields {
    title: String,
    content: String,
}

impl TryFrom<SectionFields> for Section {
    type Error = String;

    fn try_from(fields: SectionFields) -> Result<Self, Self::Error> {
        Section::new(fields.title, fields.content)
            .ok_or_else(|| "section title and content must be non-empty".to_string())
    }
}

impl Section {
    /// Build a section, returning `None` when either field is empty.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Option<Self> {
        let title = title.into();
        let content = content.into();
        if title.is_empty() || content.is_empty() {
            return None;
        }
        Some(Self { title, content })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Structured representation of a single detail page.
///
/// An empty `title` means the page had no top-level heading; callers should
/// treat it as a partial extraction rather than an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    pub title: String,
    #[serde(alias = "content")]
    pub sections: Vec<Section>,
}

impl Record {
    pub fn is_partial(&self) -> bool {
        self.title.is_empty()
    }
}

/// Ordered records produced by one run.
pub type RunResult = Vec<Record>;

/// Records of a run together with the counters collected while producing them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HarvestRun {
    pub records: RunResult,
    pub metrics: HarvestMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn section_requires_title_and_content() {
        assert!(Section::new("", "body").is_none());
        assert!(Section::new("Heading", "").is_none());
        let section = Section::new("Heading", "body").expect("section");
        assert_eq!(section.title(), "Heading");
        assert_eq!(section.content(), "body");
    }

    #[test]
    fn record_serializes_sections_and_accepts_legacy_content_key() {
        let record = Record {
            title: "Alpha".into(),
            sections: vec![Section::new("Beta", "Hello World").unwrap()],
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "title": "Alpha",
                "sections": [{ "title": "Beta", "content": "Hello World" }]
            })
        );

        let legacy: Record = serde_json::from_value(json!({
            "title": "Alpha",
            "content": [{ "title": "Beta", "content": "Hello World" }]
        }))
        .unwrap();
        assert_eq!(legacy, record);
    }

    #[test]
    fn deserializing_an_empty_section_is_rejected() {
        let err = serde_json::from_value::<Section>(json!({ "title": "", "content": "body" }))
            .expect_err("empty title");
        assert!(err.to_string().contains("non-empty"));

        let err = serde_json::from_value::<Record>(json!({
            "title": "Alpha",
            "sections": [{ "title": "Beta", "content": "" }]
        }));
        assert!(err.is_err());
    }

    #[test]
    fn empty_title_marks_partial_record() {
        assert!(Record::default().is_partial());
    }
}
