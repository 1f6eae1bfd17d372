use serde::{Deserialize, Serialize};

/// Raw payload of the deck view endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DeckViewPayload {
    pub deck_id: String,
    /// Deck class as labelled by the deck builder.
    #[serde(default)]
    pub deck_param2: Option<String>,
    #[serde(default)]
    pub list: Option<Vec<DeckCardEntry>>,
}

/// One card row of the raw deck payload.
#[derive(Debug, Clone, Deserialize)]
pub struct DeckCardEntry {
    pub name: String,
    pub card_number: String,
    pub num: u32,
}

/// A card of an exported deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Card {
    pub card_name: String,
    pub card_id: String,
    pub count: u32,
}

/// A deck a ranked player brought to an event, flattened for export.
#[derive(Debug, Clone, Serialize)]
pub struct DeckRecord {
    pub deck_id: String,
    pub class_name: String,
    pub user_name: String,
    pub rank: u32,
    pub cards: Vec<Card>,
}

impl DeckRecord {
    /// Flatten a raw deck payload into the export shape for one player.
    pub fn from_payload(payload: DeckViewPayload, user_name: &str, rank: u32) -> Self {
        let cards = payload
            .list
            .unwrap_or_default()
            .into_iter()
            .map(|entry| Card {
                card_name: entry.name,
                card_id: entry.card_number,
                count: entry.num,
            })
            .collect();
        Self {
            deck_id: payload.deck_id,
            class_name: payload.deck_param2.unwrap_or_default(),
            user_name: user_name.to_owned(),
            rank,
            cards,
        }
    }
}
