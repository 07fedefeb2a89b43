//! Best-effort classification of form inputs into profile fields, so a
//! recorded fill can later be replayed from a structured profile.

use regex::{Regex, RegexBuilder};
use std::sync::OnceLock;

use crate::browser::IndexedElement;
use crate::models::{FieldType, ValueSource};

/// Checked in order; the first match wins. Email precedes address and name
/// so "Email Address" is an email field.
const FIELD_PATTERNS: &[(FieldType, &str)] = &[
    (FieldType::Linkedin, r"linked[\s_-]*in"),
    (FieldType::Github, r"git[\s_-]*hub"),
    (FieldType::Website, r"website|portfolio|homepage|personal[\s_-]*(site|url)"),
    (FieldType::Email, r"e[\s_-]?mail"),
    (FieldType::Phone, r"phone|mobile|\btel\b|telephone"),
    (FieldType::CoverLetter, r"cover[\s_-]*letter"),
    (FieldType::Summary, r"summary|about[\s_-]*(you|me|yourself)|\bbio\b"),
    (FieldType::Salary, r"salary|compensation|pay[\s_-]*expectation"),
    (FieldType::StartDate, r"start[\s_-]*date|available[\s_-]*(from|date)|availability|notice[\s_-]*period"),
    (FieldType::JobTitle, r"job[\s_-]*title|current[\s_-]*(title|role)|position"),
    (FieldType::Company, r"company|employer|organi[sz]ation"),
    (FieldType::Zip, r"\bzip|postal|post[\s_-]*code"),
    (FieldType::City, r"\bcity\b|\btown\b"),
    (FieldType::State, r"\bstate\b|province|region"),
    (FieldType::Country, r"country"),
    (FieldType::Address, r"address|street"),
    (FieldType::Name, r"\b(full|first|last|given|family|middle|legal|your)?[\s_-]*name\b"),
];

/// Names that belong to an account or object rather than the person
const NON_PERSON_NAME: &str =
    r"user[\s_-]*name|login|account|screen[\s_-]*name|display[\s_-]*name|nick[\s_-]*name|file[\s_-]*name|domain[\s_-]*name";

fn field_regexes() -> &'static [(FieldType, Regex)] {
    static REGEXES: OnceLock<Vec<(FieldType, Regex)>> = OnceLock::new();
    REGEXES.get_or_init(|| {
        FIELD_PATTERNS
            .iter()
            .filter_map(|(field, pattern)| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .ok()
                    .map(|re| (*field, re))
            })
            .collect()
    })
}

fn non_person_name() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        RegexBuilder::new(NON_PERSON_NAME)
            .case_insensitive(true)
            .build()
            .ok()
    })
    .as_ref()
}

/// Text the classifier looks at: label-like strings plus the selector with
/// attribute names removed (`input[name="city"]` must not read as "name")
fn haystack(element: &IndexedElement) -> String {
    let selector = element
        .selector
        .replace("[name=", "[")
        .replace("[data-testid=", "[")
        .replace("[data-test-id=", "[")
        .replace("[aria-label=", "[")
        .replace("[type=", "[");

    [
        element.text.as_deref(),
        element.placeholder.as_deref(),
        element.aria_label.as_deref(),
        Some(selector.as_str()),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ")
}

pub fn infer_field_type(element: &IndexedElement) -> Option<FieldType> {
    let kind = element.element_type.to_lowercase();
    if kind.contains("password") || kind.contains("search") || kind.contains("hidden") {
        return None;
    }
    if kind.contains("email") {
        return Some(FieldType::Email);
    }
    if kind.contains("tel") {
        return Some(FieldType::Phone);
    }

    let text = haystack(element);
    field_regexes()
        .iter()
        .find(|(field, re)| {
            re.is_match(&text)
                && !(*field == FieldType::Name
                    && non_person_name().map_or(true, |re| re.is_match(&text)))
        })
        .map(|(field, _)| *field)
}

/// Value source for a fill of `literal` into `element`; `None` when the
/// field is not recognised and the literal is all there is
pub fn value_source_for(element: &IndexedElement, literal: &str) -> Option<ValueSource> {
    infer_field_type(element).map(|field_type| ValueSource::ProfileField {
        field_type,
        expression: field_type.profile_expression(),
        fallback: Some(literal.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::BoundingBox;

    fn input(placeholder: Option<&str>, aria: Option<&str>, selector: &str) -> IndexedElement {
        IndexedElement {
            index: 0,
            element_type: "input[text]".to_string(),
            text: None,
            placeholder: placeholder.map(|s| s.to_string()),
            href: None,
            aria_label: aria.map(|s| s.to_string()),
            selector: selector.to_string(),
            bounding_box: BoundingBox::default(),
        }
    }

    #[test]
    fn test_email_address_is_email() {
        let el = input(Some("Email Address"), None, "input");
        assert_eq!(infer_field_type(&el), Some(FieldType::Email));
    }

    #[test]
    fn test_common_fields() {
        let cases = [
            (input(Some("First name"), None, "input"), FieldType::Name),
            (input(None, Some("Phone number"), "input"), FieldType::Phone),
            (input(None, None, "#linkedin_url"), FieldType::Linkedin),
            (input(Some("Street address"), None, "input"), FieldType::Address),
            (input(None, None, "input[name=\"postal_code\"]"), FieldType::Zip),
            (input(Some("Desired salary"), None, "input"), FieldType::Salary),
            (input(Some("Earliest start date"), None, "input"), FieldType::StartDate),
            (input(None, Some("Current company"), "input"), FieldType::Company),
            (input(None, Some("Job title"), "input"), FieldType::JobTitle),
        ];
        for (el, expected) in cases {
            assert_eq!(infer_field_type(&el), Some(expected), "{:?}", el);
        }
    }

    #[test]
    fn test_name_attribute_alone_is_not_a_name_field() {
        let el = input(None, None, "input[name=\"q\"]");
        assert_eq!(infer_field_type(&el), None);
    }

    #[test]
    fn test_username_is_not_a_person_name() {
        let el = input(Some("Username"), None, "input[name=\"username\"]");
        assert_eq!(infer_field_type(&el), None);

        let el = input(Some("Login"), Some("Account name"), "#login");
        assert_eq!(infer_field_type(&el), None);

        let el = input(None, Some("Display name"), "input");
        assert_eq!(infer_field_type(&el), None);
    }

    #[test]
    fn test_person_name_variants() {
        for el in [
            input(Some("Full Name"), None, "input"),
            input(None, None, "#first_name"),
            input(None, None, "input[name=\"lastName\"]"),
            input(Some("Name"), None, "input"),
        ] {
            assert_eq!(infer_field_type(&el), Some(FieldType::Name), "{:?}", el);
        }
    }

    #[test]
    fn test_login_email_is_still_email() {
        let el = input(Some("Login email"), None, "#login");
        assert_eq!(infer_field_type(&el), Some(FieldType::Email));
    }

    #[test]
    fn test_password_never_classified() {
        let mut el = input(Some("Your name"), None, "input");
        el.element_type = "input[password]".to_string();
        assert_eq!(infer_field_type(&el), None);
    }

    #[test]
    fn test_value_source_for() {
        let el = input(Some("E-mail"), None, "#contact");
        let source = value_source_for(&el, "me@example.com").unwrap();
        assert_eq!(source.field_type(), Some(FieldType::Email));
        assert_eq!(
            serde_json::to_value(&source).unwrap(),
            serde_json::json!({
                "kind": "profileField",
                "fieldType": "email",
                "expression": "{{ profile.email }}",
                "fallback": "me@example.com"
            })
        );

        assert!(value_source_for(&input(Some("Search"), None, "#q"), "x").is_none());
    }
}
