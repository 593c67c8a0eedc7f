// ── Talent roster extraction ───────────────────────────────────────────────
// Pure HTML → scanned member rows for the wiki catalogue. Card selectors
// are probed in order; inside a card the name is mandatory and everything
// else is best-effort. Duplicate names within one page are collapsed to the
// first occurrence so a double-listed talent cannot double-upsert.

use scraper::{ElementRef, Html, Selector};

use crate::store::wiki::ScannedMember;

/// Member card containers, most specific first.
const CARD_SELECTORS: &[&str] = &[
    "a.talent_list_item",
    "li.talent_list_item",
    "div.talent_card",
    "div.member",
    "li.member",
];

const NAME_SELECTORS: &[&str] = &["h3", ".name", ".talent_name", "h2"];
const GENERATION_SELECTORS: &[&str] = &[".catch", ".generation", ".gen"];
const GRADUATION_SELECTORS: &[&str] = &[".graduation", ".graduated"];

fn first_text(scope: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    for raw in selectors {
        let Ok(selector) = Selector::parse(raw) else { continue };
        if let Some(element) = scope.select(&selector).next() {
            let text = element
                .text()
                .collect::<Vec<_>>()
                .join(" ")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

fn profile_link(scope: ElementRef<'_>) -> Option<String> {
    if scope.value().name() == "a" {
        return scope.value().attr("href").map(str::to_string);
    }
    let anchor = Selector::parse("a").ok()?;
    scope
        .select(&anchor)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string)
}

/// Extract the member roster from one talents listing page.
pub fn parse_members(html: &str) -> Vec<ScannedMember> {
    let document = Html::parse_document(html);

    let mut cards: Vec<ElementRef<'_>> = Vec::new();
    for raw in CARD_SELECTORS {
        let Ok(selector) = Selector::parse(raw) else { continue };
        cards = document.select(&selector).collect();
        if !cards.is_empty() {
            break;
        }
    }

    let mut members: Vec<ScannedMember> = Vec::new();
    for card in cards {
        let Some(member_name) = first_text(card, NAME_SELECTORS) else { continue };
        if members.iter().any(|m| m.member_name == member_name) {
            continue;
        }
        let generation = first_text(card, GENERATION_SELECTORS);
        let tags = generation.iter().cloned().collect();
        members.push(ScannedMember {
            member_name,
            generation,
            tags,
            debut_date: None,
            graduation_date: first_text(card, GRADUATION_SELECTORS),
            profile_url: profile_link(card),
        });
    }
    members
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_cards_with_name_generation_and_link() {
        let html = r#"
            <a class="talent_list_item" href="/talents/tokino-sora/">
              <h3>ときのそら</h3>
              <p class="catch">hololive 0期生</p>
            </a>
            <a class="talent_list_item" href="/talents/gawr-gura/">
              <h3>Gawr Gura</h3>
              <p class="catch">hololive English -Myth-</p>
            </a>"#;
        let members = parse_members(html);
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].member_name, "ときのそら");
        assert_eq!(members[0].generation.as_deref(), Some("hololive 0期生"));
        assert_eq!(members[0].profile_url.as_deref(), Some("/talents/tokino-sora/"));
        assert!(members[0].graduation_date.is_none());
        assert_eq!(members[0].tags, vec!["hololive 0期生".to_string()]);
    }

    #[test]
    fn falls_back_through_card_selectors() {
        let html = r#"<div class="member"><h3>Solo</h3></div>"#;
        let members = parse_members(html);
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].member_name, "Solo");
        assert!(members[0].generation.is_none());
        assert!(members[0].profile_url.is_none());
    }

    #[test]
    fn graduation_marker_is_captured() {
        let html = r#"
            <div class="talent_card">
              <h3>Graduated One</h3>
              <span class="graduation">2024-01-01</span>
            </div>"#;
        let members = parse_members(html);
        assert_eq!(members[0].graduation_date.as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn duplicate_names_collapse_to_first() {
        let html = r#"
            <div class="member"><h3>Twin</h3><p class="catch">first</p></div>
            <div class="member"><h3>Twin</h3><p class="catch">second</p></div>"#;
        let members = parse_members(html);
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].generation.as_deref(), Some("first"));
    }

    #[test]
    fn nameless_cards_are_dropped() {
        let html = r#"<div class="member"><img src="x.png"></div>"#;
        assert!(parse_members(html).is_empty());
    }
}
