//! Prompt card observations extracted from the listing page
//!
//! A card is the transient view of one listed prompt: just the trimmed
//! texts of its tag chips. Cards are read from the live page, asserted
//! against, and discarded.

use serde::{Deserialize, Serialize};

/// One rendered prompt card, as observed in the DOM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptCard {
    /// Trimmed text of each tag chip inside the card.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl PromptCard {
    /// Whether this card carries the given tag (exact match after trimming).
    pub fn has_tag(&self, wanted: &str) -> bool {
        // `wanted` is deliberately named apart from the card's own tags:
        // comparing a tag against itself is always true and checks nothing.
        self.tags.iter().any(|chip| chip.trim() == wanted)
    }
}

/// Indices of cards that do not carry the wanted tag.
pub fn missing_tag(cards: &[PromptCard], wanted: &str) -> Vec<usize> {
    cards
        .iter()
        .enumerate()
        .filter(|(_, card)| !card.has_tag(wanted))
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn card(tags: &[&str]) -> PromptCard {
        PromptCard {
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test_case(&["IDE"], "IDE" => true; "single exact tag")]
    #[test_case(&["CLI", "IDE"], "IDE" => true; "among several tags")]
    #[test_case(&[" IDE "], "IDE" => true; "surrounding whitespace trimmed")]
    #[test_case(&["ide"], "IDE" => false; "case sensitive")]
    #[test_case(&["IDEA"], "IDE" => false; "no prefix match")]
    #[test_case(&[], "IDE" => false; "no tags at all")]
    fn has_tag_cases(tags: &[&str], wanted: &str) -> bool {
        card(tags).has_tag(wanted)
    }

    #[test]
    fn card_without_wanted_tag_is_reported() {
        let cards = vec![card(&["IDE", "CLI"]), card(&["Chat"]), card(&["IDE"])];
        assert_eq!(missing_tag(&cards, "IDE"), vec![1]);
    }

    #[test]
    fn all_cards_tagged_reports_nothing() {
        let cards = vec![card(&["IDE"]), card(&["IDE", "Editor"])];
        assert!(missing_tag(&cards, "IDE").is_empty());
    }

    #[test]
    fn empty_card_set_reports_nothing() {
        assert!(missing_tag(&[], "IDE").is_empty());
    }
}
