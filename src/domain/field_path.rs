//! Field identifier resolution
//!
//! Block fields are addressed either by a flat key (`heading`, `cta_text`)
//! or by a repeater path encoded as `<group>_<index>_<subfield>`
//! (`testimonials_0_quote`). Any identifier that does not match the
//! repeater shape is treated as flat; there is no failure case.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static REPEATER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z0-9_]+)_(\d+)_([A-Za-z0-9_]+)$").expect("repeater pattern is valid")
});

/// Resolved form of a field identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldRef {
    /// Top-level key inside a block's data object.
    Flat { field_id: String },
    /// One entry of an ordered repeater group: `data[group][index][subfield]`.
    Repeater {
        group: String,
        index: usize,
        subfield: String,
    },
}

impl FieldRef {
    /// Resolve a raw field identifier.
    ///
    /// Matches `<group>_<index>_<subfield>` with a non-negative index;
    /// everything else is a flat key. Ambiguous identifiers (an index that
    /// overflows usize) fall back to flat as well.
    pub fn parse(field_id: &str) -> Self {
        if let Some(caps) = REPEATER_RE.captures(field_id) {
            if let Ok(index) = caps[2].parse::<usize>() {
                return Self::Repeater {
                    group: caps[1].to_string(),
                    index,
                    subfield: caps[3].to_string(),
                };
            }
        }
        Self::Flat {
            field_id: field_id.to_string(),
        }
    }

    /// Name-based image heuristic, independent of any configured flag.
    ///
    /// Decides whether the merger also emits a companion `<field>_url`
    /// value when the new value is a numeric asset reference.
    pub fn is_image_field(&self) -> bool {
        match self {
            Self::Repeater { subfield, .. } => subfield == "image",
            Self::Flat { field_id } => field_id.contains("image"),
        }
    }

    /// Key that receives the resolved public URL of an image asset.
    pub fn url_companion_key(&self) -> String {
        match self {
            Self::Repeater { subfield, .. } => format!("{subfield}_url"),
            Self::Flat { field_id } => format!("{field_id}_url"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("testimonials_0_quote", "testimonials", 0, "quote")]
    #[case("team_members_12_name", "team_members", 12, "name")]
    #[case("gallery_3_image", "gallery", 3, "image")]
    #[case("a_0_b", "a", 0, "b")]
    fn repeater_identifiers_resolve(
        #[case] raw: &str,
        #[case] group: &str,
        #[case] index: usize,
        #[case] subfield: &str,
    ) {
        assert_eq!(
            FieldRef::parse(raw),
            FieldRef::Repeater {
                group: group.to_string(),
                index,
                subfield: subfield.to_string(),
            }
        );
    }

    #[rstest]
    #[case("heading")]
    #[case("hero_image")]
    #[case("cta_text")]
    #[case("field_x_name")] // index is not numeric
    #[case("_0_")] // empty group/subfield
    fn everything_else_resolves_flat(#[case] raw: &str) {
        assert_eq!(
            FieldRef::parse(raw),
            FieldRef::Flat {
                field_id: raw.to_string()
            }
        );
    }

    #[test]
    fn multi_underscore_group_keeps_trailing_subfield() {
        // The index is the last standalone numeric segment; the subfield may
        // itself contain underscores.
        assert_eq!(
            FieldRef::parse("cards_2_link_label"),
            FieldRef::Repeater {
                group: "cards".to_string(),
                index: 2,
                subfield: "link_label".to_string(),
            }
        );
    }

    #[test]
    fn image_heuristic_follows_names() {
        assert!(FieldRef::parse("gallery_0_image").is_image_field());
        assert!(!FieldRef::parse("gallery_0_caption").is_image_field());
        assert!(FieldRef::parse("hero_image").is_image_field());
        assert!(FieldRef::parse("background_image_large").is_image_field());
        assert!(!FieldRef::parse("heading").is_image_field());
    }

    #[test]
    fn url_companion_keys() {
        assert_eq!(
            FieldRef::parse("gallery_0_image").url_companion_key(),
            "image_url"
        );
        assert_eq!(
            FieldRef::parse("hero_image").url_companion_key(),
            "hero_image_url"
        );
    }
}
