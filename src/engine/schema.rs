use crate::dom::highlights::HighlightTarget;

/// Field types a scrape schema can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Str,
    Num,
    Link,
    Image,
    Html,
    Element,
    Textarea,
    Markdown,
    ElemId,
}

impl FieldType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "str" => Some(FieldType::Str),
            "num" => Some(FieldType::Num),
            "link" => Some(FieldType::Link),
            "image" => Some(FieldType::Image),
            "html" => Some(FieldType::Html),
            "element" => Some(FieldType::Element),
            "textarea" => Some(FieldType::Textarea),
            "markdown" => Some(FieldType::Markdown),
            "elem_id" => Some(FieldType::ElemId),
            _ => None,
        }
    }

    /// Which elements the highlighter offers while the operator picks this field.
    pub fn highlight_target(&self) -> HighlightTarget {
        match self {
            FieldType::Str | FieldType::Num | FieldType::Textarea | FieldType::Markdown => {
                HighlightTarget::Text
            }
            FieldType::Link => HighlightTarget::Url,
            FieldType::Image => HighlightTarget::Image,
            FieldType::Html => HighlightTarget::Html,
            FieldType::Element | FieldType::ElemId => HighlightTarget::Action,
        }
    }
}

/// Field path as shown to the operator: `dataset0|items|title` reads `items / title`.
pub fn field_label(field: &str) -> String {
    field.replace("dataset0|", "").replace('|', " / ")
}
