use axum::{
    Json,
    extract::State,
    http::header,
    response::IntoResponse,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use tracing::{debug, info};

use tenun_db::models::{CharacterRow, MessageRow, NewExchange};
use tenun_types::api::{
    CharacterConversation, CharacterResponse, ChatRequest, ChatResponse, ChatWithTtsResponse,
    ConversationHistory, ConversationRef, ConversationSummary, MessageBody, MessageView, TtsRequest,
    UserConversations, VoiceInfo, VoiceQuery, VoicesResponse,
};
use tenun_types::models::{PERSONA_ID, Sender, TargetLanguage, Voice};

use crate::error::{ApiError, ApiResult, Subsystem};
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::openai::Completion;
use crate::state::{AppState, db_call};

/// Prior messages replayed to the model on every turn.
pub const CONTEXT_WINDOW: u32 = 20;
const CHAT_MAX_TOKENS: u32 = 200;
const CHAT_TEMPERATURE: f32 = 0.7;
const MAX_MESSAGE_LEN: usize = 2000;
const MAX_USER_ID_LEN: usize = 8;
const MAX_REQUEST_ID_LEN: usize = 64;
const MAX_TTS_LEN: usize = 4096;

pub async fn send_message(
    State(state): State<AppState>,
    AppJson(req): AppJson<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    Ok(Json(run_chat_turn(&state, req).await?))
}

pub async fn chat_with_tts(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<VoiceQuery>,
    AppJson(req): AppJson<ChatRequest>,
) -> ApiResult<Json<ChatWithTtsResponse>> {
    let voice: Voice = query.voice.parse().map_err(ApiError::BadRequest)?;
    let speech = state.speech_synthesizer()?;

    let chat = run_chat_turn(&state, req).await?;
    let audio = speech
        .synthesize(&chat.bot_response, voice)
        .await
        .map_err(|e| ApiError::upstream(Subsystem::Tts, e))?;

    Ok(Json(ChatWithTtsResponse {
        bot_response: chat.bot_response,
        conversation_id: chat.conversation_id,
        character_name: chat.character_name,
        audio_base64: STANDARD.encode(&audio),
        voice_used: voice.as_str().to_string(),
    }))
}

/// One chat turn. Nothing is written unless the model answers, and then the
/// prompt and the reply are committed together.
pub(crate) async fn run_chat_turn(state: &AppState, req: ChatRequest) -> ApiResult<ChatResponse> {
    let user_text = req.user_message.trim().to_string();
    if user_text.is_empty() || user_text.chars().count() > MAX_MESSAGE_LEN {
        return Err(ApiError::bad_request(format!(
            "Message must be between 1 and {} characters",
            MAX_MESSAGE_LEN
        )));
    }
    if req.user_id.is_empty() || req.user_id.chars().count() > MAX_USER_ID_LEN {
        return Err(ApiError::bad_request("Invalid user id"));
    }
    let request_id = match req.request_id.map(|id| id.trim().to_string()) {
        Some(id) if id.is_empty() || id.len() > MAX_REQUEST_ID_LEN => {
            return Err(ApiError::bad_request("Invalid request id"));
        }
        other => other,
    };

    let user_id = req.user_id;
    let character = {
        let user_id = user_id.clone();
        db_call(state, move |db| {
            if !db.user_exists(&user_id)? {
                return Ok(Err(ApiError::not_found("User")));
            }
            Ok(db
                .get_character(PERSONA_ID)?
                .ok_or_else(|| ApiError::not_found("Character")))
        })
        .await??
    };

    if let Some(request_id) = request_id.clone() {
        let user_id = user_id.clone();
        let stored = db_call(state, move |db| db.find_reply(&user_id, PERSONA_ID, &request_id)).await?;
        if let Some((conversation_id, bot_response)) = stored {
            debug!("Replaying stored reply for conversation {}", conversation_id);
            return Ok(ChatResponse {
                bot_response,
                conversation_id,
                character_name: character.name,
            });
        }
    }

    let text = state.text_generator()?;

    let history = {
        let user_id = user_id.clone();
        db_call(state, move |db| {
            match db.find_conversation(&user_id, PERSONA_ID)? {
                Some(conversation) => db.recent_messages(conversation.conversation_id, CONTEXT_WINDOW),
                None => Ok(Vec::new()),
            }
        })
        .await?
    };

    let system = persona_prompt(&character);
    let prompt = turn_prompt(&character.name, &history, &user_text);
    let bot_text = text
        .complete(Completion {
            system: &system,
            user: &prompt,
            max_tokens: CHAT_MAX_TOKENS,
            temperature: CHAT_TEMPERATURE,
        })
        .await
        .map_err(|e| ApiError::upstream(Subsystem::Chat, e))?;

    let appended = {
        let user_id = user_id.clone();
        db_call(state, move |db| {
            db.append_exchange(&NewExchange {
                user_id: &user_id,
                character_id: PERSONA_ID,
                user_text: &user_text,
                bot_text: &bot_text,
                request_id: request_id.as_deref(),
            })
        })
        .await?
    };

    if appended.replayed {
        debug!("Concurrent retry resolved to the stored reply");
    } else {
        info!(
            "Chat turn stored in conversation {} for user {}",
            appended.conversation_id, user_id
        );
    }

    Ok(ChatResponse {
        bot_response: appended.bot_text,
        conversation_id: appended.conversation_id,
        character_name: character.name,
    })
}

fn persona_prompt(character: &CharacterRow) -> String {
    format!(
        "Kamu adalah {name}, penenun ikat tradisional dari Sumba.\n\n\
         {bio}\n\n\
         Daerah asal: {region}\n\n\
         Balas dalam bahasa yang sama dengan pesan pengguna. Bicaralah dengan hangat dan sabar \
         seperti seorang ibu, sesekali gunakan istilah Sumba, dan bagikan pengetahuanmu tentang \
         motif, makna budaya, serta proses pembuatan kain tenun ikat.",
        name = character.name,
        bio = character.bio.as_deref().unwrap_or_default(),
        region = character.region.as_deref().unwrap_or("Sumba"),
    )
}

/// Prior turns as `User:` / `<persona>:` lines, oldest first, then the new line.
fn turn_prompt(persona: &str, history: &[MessageRow], user_text: &str) -> String {
    let mut prompt = String::from("Riwayat percakapan sebelumnya:\n");
    for message in history {
        let speaker = match message.sender.parse::<Sender>() {
            Ok(Sender::Bot) => persona,
            _ => "User",
        };
        prompt.push_str(speaker);
        prompt.push_str(": ");
        prompt.push_str(&message.message);
        prompt.push('\n');
    }
    prompt.push_str(&format!("\nUser: {}\n{}:", user_text, persona));
    prompt
}

pub async fn get_character(State(state): State<AppState>) -> ApiResult<Json<CharacterResponse>> {
    let character = db_call(&state, |db| db.get_character(PERSONA_ID))
        .await?
        .ok_or_else(|| ApiError::not_found("Character"))?;

    Ok(Json(CharacterResponse {
        character_id: character.character_id,
        name: character.name,
        bio: character.bio,
        region: character.region,
    }))
}

// -- Conversations --

pub async fn get_conversation(
    State(state): State<AppState>,
    AppPath(conversation_id): AppPath<i64>,
) -> ApiResult<Json<ConversationHistory>> {
    let (conversation, character_name, messages) = db_call(&state, move |db| {
        let Some(conversation) = db.get_conversation(conversation_id)? else {
            return Ok(None);
        };
        let character_name = db
            .get_character(&conversation.character_id)?
            .map(|c| c.name)
            .unwrap_or_default();
        let messages = db.list_messages(conversation_id)?;
        Ok(Some((conversation, character_name, messages)))
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Conversation"))?;

    Ok(Json(ConversationHistory {
        conversation_id: conversation.conversation_id,
        user_id: conversation.user_id,
        character_name,
        messages: messages.into_iter().map(message_view).collect(),
    }))
}

pub async fn delete_conversation(
    State(state): State<AppState>,
    AppPath(conversation_id): AppPath<i64>,
) -> ApiResult<Json<MessageBody>> {
    if !db_call(&state, move |db| db.delete_conversation(conversation_id)).await? {
        return Err(ApiError::not_found("Conversation"));
    }

    info!("Deleted conversation {}", conversation_id);
    Ok(Json(MessageBody {
        message: "Conversation deleted successfully".into(),
    }))
}

pub async fn list_user_conversations(
    State(state): State<AppState>,
    AppPath(user_id): AppPath<String>,
) -> ApiResult<Json<UserConversations>> {
    let summaries = db_call(&state, move |db| {
        if !db.user_exists(&user_id)? {
            return Ok(None);
        }
        db.list_user_conversations(&user_id, PERSONA_ID).map(Some)
    })
    .await?
    .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(UserConversations {
        conversations: summaries
            .into_iter()
            .map(|row| ConversationSummary {
                conversation_id: row.conversation_id,
                character_id: row.character_id,
                character_name: row.character_name,
                last_message: row.last_message,
                last_timestamp: row.last_timestamp,
            })
            .collect(),
    }))
}

pub async fn get_character_conversation(
    State(state): State<AppState>,
    AppPath((user_id, character_id)): AppPath<(String, String)>,
) -> ApiResult<Json<CharacterConversation>> {
    let found = db_call(&state, move |db| {
        match db.find_conversation(&user_id, &character_id)? {
            Some(conversation) => {
                let messages = db.list_messages(conversation.conversation_id)?;
                Ok(Some((conversation, messages)))
            }
            None => Ok(None),
        }
    })
    .await?;

    let Some((conversation, messages)) = found else {
        return Ok(Json(CharacterConversation {
            conversation: None,
            messages: Vec::new(),
        }));
    };

    Ok(Json(CharacterConversation {
        conversation: Some(ConversationRef {
            conversation_id: conversation.conversation_id,
            user_id: conversation.user_id,
            character_id: conversation.character_id,
        }),
        messages: messages.into_iter().map(message_view).collect(),
    }))
}

fn message_view(row: MessageRow) -> MessageView {
    MessageView {
        message_id: row.message_id,
        sender: row.sender,
        message: row.message,
        timestamp: row.timestamp,
    }
}

// -- Speech --

pub async fn text_to_speech(
    State(state): State<AppState>,
    AppJson(req): AppJson<TtsRequest>,
) -> ApiResult<impl IntoResponse> {
    let text = req.text.trim();
    if text.is_empty() || text.chars().count() > MAX_TTS_LEN {
        return Err(ApiError::bad_request(format!(
            "Text must be between 1 and {} characters",
            MAX_TTS_LEN
        )));
    }
    let voice: Voice = req.voice.parse().map_err(ApiError::BadRequest)?;
    req.language
        .parse::<TargetLanguage>()
        .map_err(ApiError::BadRequest)?;

    let audio = state
        .speech_synthesizer()?
        .synthesize(text, voice)
        .await
        .map_err(|e| ApiError::upstream(Subsystem::Tts, e))?;

    Ok((
        [
            (header::CONTENT_TYPE, "audio/mpeg"),
            (header::CONTENT_DISPOSITION, "attachment; filename=speech.mp3"),
        ],
        audio,
    ))
}

pub async fn list_voices() -> Json<VoicesResponse> {
    Json(VoicesResponse {
        voices: Voice::ALL
            .iter()
            .map(|voice| VoiceInfo {
                name: voice.as_str().to_string(),
                description: voice.description().to_string(),
            })
            .collect(),
    })
}
