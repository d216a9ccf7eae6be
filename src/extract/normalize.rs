use anyhow::{Context, Result};
use regex::Regex;

use super::VisaCategory;

/// Annotation values that carry no information beyond the description.
const NO_EXTRA_MARKERS: [&str; 5] = ["", "✓", "✔", "X", "x"];

pub struct CellNormalizer {
    footnote: Regex,
    whitespace: Regex,
    categories: Vec<(Regex, VisaCategory)>,
}

impl CellNormalizer {
    pub fn new() -> Result<Self> {
        // Earlier entries win; "visa not required" must be tested before "visa required".
        let patterns = [
            (
                r"(?i)admission\s+refused|entry\s+(?:not\s+allowed|refused|banned)",
                VisaCategory::AdmissionRefused,
            ),
            (
                r"(?i)visa\s+not\s+required|visa[\s-]+free|freedom\s+of\s+movement|free\s+visitor",
                VisaCategory::VisaFree,
            ),
            (r"(?i)visa\s+on\s+arrival", VisaCategory::VisaOnArrival),
            (
                r"(?i)\be-?visa\b|electronic\s+visa|online\s+visa",
                VisaCategory::EVisa,
            ),
            (
                r"(?i)\b(?:eta|esta|etias|k-eta)\b|electronic\s+travel\s+authori[sz]ation",
                VisaCategory::Eta,
            ),
            (r"(?i)visa\s+(?:is\s+)?required", VisaCategory::VisaRequired),
        ];

        let mut categories = Vec::with_capacity(patterns.len());
        for (pattern, category) in patterns {
            let regex = Regex::new(pattern).with_context(|| {
                format!("failed to compile {} category regex", category.as_str())
            })?;
            categories.push((regex, category));
        }

        Ok(Self {
            footnote: Regex::new(r"\[[^\[\]]*\]").context("failed to compile footnote regex")?,
            whitespace: Regex::new(r"[\s\x{200b}]+")
                .context("failed to compile whitespace regex")?,
            categories,
        })
    }

    /// Removes bracketed footnote references and collapses whitespace runs.
    pub fn strip_artifacts(&self, text: &str) -> String {
        let without_notes = self.footnote.replace_all(text, " ");
        self.whitespace
            .replace_all(&without_notes, " ")
            .trim()
            .to_string()
    }

    /// Total: anything not recognised becomes `UnknownVisaCategory`.
    pub fn classify_visa_category(&self, text: &str) -> VisaCategory {
        let cleaned = self.strip_artifacts(text);
        if cleaned.is_empty() {
            return VisaCategory::UnknownVisaCategory;
        }

        self.categories
            .iter()
            .find(|(pattern, _)| pattern.is_match(&cleaned))
            .map(|(_, category)| *category)
            .unwrap_or(VisaCategory::UnknownVisaCategory)
    }

    /// Combines a description with its annotation cell. Marker-only
    /// annotations are dropped and the description is returned as is.
    pub fn build_description(&self, raw_text: &str, extra_annotation: &str) -> String {
        let extra = self.strip_artifacts(extra_annotation);
        if is_no_extra_marker(&extra) {
            return raw_text.to_string();
        }

        absorb_annotations(raw_text, &[extra.as_str()])
    }
}

pub fn is_no_extra_marker(value: &str) -> bool {
    NO_EXTRA_MARKERS.contains(&value.trim())
}

/// Space-joins the description with every non-empty annotation.
pub fn absorb_annotations(description: &str, annotations: &[&str]) -> String {
    std::iter::once(description)
        .chain(annotations.iter().copied())
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<&str>>()
        .join(" ")
}
