// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns raw onboarding answers into per-field fragment drafts.

use std::collections::BTreeMap;

use pitchcraft_core::{FragmentDraft, RawProfile, SourceField, UserScope};

/// Drafts ordered by source field, plus the raw keys that produced nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedProfile {
    pub drafts: Vec<FragmentDraft>,
    pub skipped: Vec<String>,
}

/// `Some(field)` for a recognized onboarding key or one of its aliases.
pub fn resolve_field(raw_key: &str) -> Option<SourceField> {
    let key = normalize_key(raw_key);
    let field = match key.as_str() {
        "company_name" | "company" => SourceField::CompanyName,
        "product" | "product_description" | "service" => SourceField::Product,
        "audience" | "target_audience" | "target_audience_persona" => SourceField::Audience,
        "industry" | "sector" => SourceField::Industry,
        "goals" | "goal" | "objectives" => SourceField::Goals,
        "tone" | "tone_of_voice" | "voice" => SourceField::Tone,
        "derived" | "notes" | "summary" | "about" | "overview" => SourceField::Derived,
        _ => return None,
    };
    Some(field)
}

fn normalize_key(raw_key: &str) -> String {
    raw_key
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

fn normalize_value(raw_value: &str) -> String {
    raw_value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extracts at most one draft per source field.
///
/// Raw keys are visited in sorted order, so when two aliases name the same
/// field the first non-empty one wins deterministically.
pub fn extract(scope: &UserScope, profile: &RawProfile) -> ExtractedProfile {
    let mut by_field: BTreeMap<SourceField, FragmentDraft> = BTreeMap::new();
    let mut skipped = Vec::new();

    for (raw_key, raw_value) in profile.iter() {
        let Some(field) = resolve_field(raw_key) else {
            skipped.push(raw_key.to_string());
            continue;
        };
        let value = normalize_value(raw_value);
        if value.is_empty() || by_field.contains_key(&field) {
            skipped.push(raw_key.to_string());
            continue;
        }
        by_field.insert(
            field,
            FragmentDraft {
                scope: scope.clone(),
                source_field: field,
                text: format!("{}: {value}", field.label()),
            },
        );
    }

    ExtractedProfile {
        drafts: by_field.into_values().collect(),
        skipped,
    }
}
