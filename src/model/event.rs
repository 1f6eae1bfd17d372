use std::collections::HashMap;

use serde::Deserialize;

/// Envelope of the event listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct EventListPayload {
    pub success: EventListBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventListBody {
    #[serde(default)]
    pub events: Vec<EventRef>,
}

/// One event row of the listing response. Only the id is consumed.
#[derive(Debug, Clone, Deserialize)]
pub struct EventRef {
    pub event_id: u64,
}

/// Envelope of the event detail endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct EventDetailPayload {
    pub success: EventDetailBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventDetailBody {
    pub joined_player_count: u32,
    /// Rankings keyed by group name, then by an opaque ranking key. The
    /// final standings live under the unnamed ("") group.
    #[serde(default)]
    pub grouped_rankings: HashMap<String, HashMap<String, Ranking>>,
}

/// One final standing of an event.
#[derive(Debug, Clone, Deserialize)]
pub struct Ranking {
    pub rank: u32,
    #[serde(default)]
    pub team_member: Vec<TeamMember>,
}

/// One player of a ranked team.
#[derive(Debug, Clone, Deserialize)]
pub struct TeamMember {
    pub player_name: String,
    /// Absent for players who never registered a deck.
    #[serde(default)]
    pub deck_recipe_id: Option<String>,
}
