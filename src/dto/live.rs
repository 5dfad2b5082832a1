use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::{
        EventContent, LiveMatchSession, MapState, MatchId, Mvp, Score, SeriesFormat, Teams,
    },
    state::{conversation::ConversationState, state_machine::LiveStage},
};

/// Admin command vocabulary, tagged by its wire token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(tag = "command")]
pub enum LiveCommand {
    /// Open the live admin panel.
    #[serde(rename = "ao_vivo_painel")]
    OpenPanel,
    /// One point for the home side on the current map.
    #[serde(rename = "placar_mapa_furia")]
    ScoreHome,
    /// One point for the opponent on the current map.
    #[serde(rename = "placar_mapa_oponente")]
    ScoreAway,
    #[serde(rename = "vitoria_mapa")]
    DeclareMapWin,
    #[serde(rename = "encerrar_partida")]
    EndSession,
    /// Rename the current map; without a name the next message is taken as the name.
    #[serde(rename = "alterar_nome_mapa")]
    RenameMap {
        #[serde(default)]
        name: Option<String>,
    },
    /// Subscribe to the live broadcast.
    #[serde(rename = "ao_vivo_ver")]
    Watch,
    /// Unsubscribe from the live broadcast.
    #[serde(rename = "sair_sessao")]
    LeaveWatch,
    /// Leave the admin panel.
    #[serde(rename = "sair_sessao_ao_vivo")]
    LeavePanel,
}

/// Free-form message sent by a user; its meaning depends on the sender's conversation state.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum InboundMessage {
    Text {
        text: String,
    },
    Photo {
        #[serde(rename = "fileRef")]
        file_ref: String,
        #[serde(default)]
        caption: Option<String>,
    },
    Video {
        #[serde(rename = "fileRef")]
        file_ref: String,
        #[serde(default)]
        caption: Option<String>,
    },
}

impl InboundMessage {
    /// Turn the message into a live event: URLs become links, media keep their caption.
    pub fn into_event(self) -> EventContent {
        match self {
            InboundMessage::Text { text } => {
                let trimmed = text.trim();
                let lower = trimmed.to_ascii_lowercase();
                if lower.starts_with("http://") || lower.starts_with("https://") {
                    EventContent::Link {
                        url: trimmed.to_owned(),
                    }
                } else {
                    EventContent::Text { text }
                }
            }
            InboundMessage::Photo { file_ref, caption } => EventContent::Photo {
                file_ref,
                caption: caption.filter(|caption| !caption.trim().is_empty()),
            },
            InboundMessage::Video { file_ref, caption } => EventContent::Video {
                file_ref,
                caption: caption.filter(|caption| !caption.trim().is_empty()),
            },
        }
    }

    /// Text body, `None` for media messages.
    pub fn text(&self) -> Option<&str> {
        match self {
            InboundMessage::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Structured MVP entry for the current map.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct MvpRequest {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[validate(range(max = 999))]
    pub kills: u32,
    #[validate(range(max = 999))]
    pub deaths: u32,
}

/// New name of the current map.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RenameMapRequest {
    #[validate(length(min = 1, max = 400))]
    pub name: String,
}

/// Prompt the panel is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PanelStage {
    Scoring,
    AwaitingMvp,
    AwaitingMapName,
}

impl From<LiveStage> for PanelStage {
    fn from(stage: LiveStage) -> Self {
        match stage {
            LiveStage::Scoring => PanelStage::Scoring,
            LiveStage::AwaitingMvp { .. } => PanelStage::AwaitingMvp,
            LiveStage::AwaitingMapName { .. } => PanelStage::AwaitingMapName,
        }
    }
}

/// One map as shown in the panel and the history views.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MapView {
    pub number: u32,
    pub name: Option<String>,
    pub score: Score,
    pub mvp: Option<Mvp>,
}

impl From<&MapState> for MapView {
    fn from(map: &MapState) -> Self {
        Self {
            number: map.number,
            name: map.name.clone(),
            score: map.score,
            mvp: map.mvp.clone(),
        }
    }
}

/// Admin panel summary of the live session.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PanelView {
    pub match_id: MatchId,
    pub format: SeriesFormat,
    pub teams: Teams,
    pub aggregate: Score,
    pub maps_played: usize,
    pub max_maps: usize,
    pub current_map: Option<MapView>,
    pub stage: PanelStage,
    /// What the caller's next free-form message will be used for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl PanelView {
    /// Panel view of `session` as seen by an actor in `conversation`.
    pub fn build(session: &LiveMatchSession, stage: LiveStage, conversation: ConversationState) -> Self {
        let prompt = match conversation {
            ConversationState::AwaitingMvp { map_number } => Some(format!(
                "send the MVP of map {map_number} as `<name> <kills>/<deaths>`"
            )),
            ConversationState::RenamingMap { map_number } => {
                Some(format!("send the name of map {map_number}"))
            }
            ConversationState::InPanel | ConversationState::Idle => None,
        };

        Self {
            match_id: session.match_id,
            format: session.format,
            teams: session.teams.clone(),
            aggregate: session.aggregate_score,
            maps_played: session.maps.len(),
            max_maps: session.format.map_count(),
            current_map: session.current_map().map(MapView::from),
            stage: stage.into(),
            prompt,
        }
    }
}

/// Scoreboard pushed to spectators after score changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ScoreboardView {
    pub home: String,
    pub away: String,
    pub aggregate: Score,
    pub map_number: u32,
    pub map_name: Option<String>,
    pub map_score: Score,
}

impl From<&LiveMatchSession> for ScoreboardView {
    fn from(session: &LiveMatchSession) -> Self {
        let (map_number, map_name, map_score) = session
            .current_map()
            .map(|map| (map.number, map.name.clone(), map.score))
            .unwrap_or_default();
        Self {
            home: session.teams.home.name.clone(),
            away: session.teams.away.name.clone(),
            aggregate: session.aggregate_score,
            map_number,
            map_name,
            map_score,
        }
    }
}

/// Answer to every command and message.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CommandReply {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub panel: Option<PanelView>,
}

impl CommandReply {
    /// Reply without a panel view.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            panel: None,
        }
    }

    /// Reply carrying the refreshed panel view.
    pub fn with_panel(message: impl Into<String>, panel: PanelView) -> Self {
        Self {
            message: message.into(),
            panel: Some(panel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_tokens_deserialize_into_typed_commands() {
        let parse = |raw: &str| serde_json::from_str::<LiveCommand>(raw).expect(raw);
        assert_eq!(parse(r#"{"command":"ao_vivo_painel"}"#), LiveCommand::OpenPanel);
        assert_eq!(parse(r#"{"command":"placar_mapa_furia"}"#), LiveCommand::ScoreHome);
        assert_eq!(parse(r#"{"command":"placar_mapa_oponente"}"#), LiveCommand::ScoreAway);
        assert_eq!(parse(r#"{"command":"vitoria_mapa"}"#), LiveCommand::DeclareMapWin);
        assert_eq!(parse(r#"{"command":"encerrar_partida"}"#), LiveCommand::EndSession);
        assert_eq!(
            parse(r#"{"command":"alterar_nome_mapa"}"#),
            LiveCommand::RenameMap { name: None }
        );
        assert_eq!(
            parse(r#"{"command":"alterar_nome_mapa","name":"Inferno"}"#),
            LiveCommand::RenameMap {
                name: Some("Inferno".into())
            }
        );
        assert_eq!(parse(r#"{"command":"ao_vivo_ver"}"#), LiveCommand::Watch);
        assert_eq!(parse(r#"{"command":"sair_sessao"}"#), LiveCommand::LeaveWatch);
        assert_eq!(parse(r#"{"command":"sair_sessao_ao_vivo"}"#), LiveCommand::LeavePanel);
        assert!(serde_json::from_str::<LiveCommand>(r#"{"command":"confirm_remove_3"}"#).is_err());
    }

    #[test]
    fn messages_are_classified_into_events() {
        let link = InboundMessage::Text {
            text: " HTTPS://example.org/clip ".into(),
        };
        assert_eq!(
            link.into_event(),
            EventContent::Link {
                url: "HTTPS://example.org/clip".into()
            }
        );

        let text = InboundMessage::Text {
            text: "what a clutch".into(),
        };
        assert_eq!(text.into_event().kind(), "text");

        let photo: InboundMessage =
            serde_json::from_str(r#"{"kind":"photo","fileRef":"f1","caption":"  "}"#).expect("photo");
        assert_eq!(
            photo.into_event(),
            EventContent::Photo {
                file_ref: "f1".into(),
                caption: None
            }
        );
    }
}
