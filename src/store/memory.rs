//! In-memory [`MessageStore`].

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::MessageStore;
use crate::error::{Result, TurnError};
use crate::types::{
    Message, MessageId, ModelRef, NewMessage, Role, Session, SessionId, SessionSettings,
};

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<SessionId, Session>,
    messages: BTreeMap<MessageId, Message>,
    next_id: u64,
}

impl Inner {
    fn message_mut(&mut self, id: MessageId) -> Result<&mut Message> {
        self.messages
            .get_mut(&id)
            .ok_or(TurnError::MessageNotFound(id))
    }

    fn session_mut(&mut self, id: SessionId) -> Result<&mut Session> {
        self.sessions
            .get_mut(&id)
            .ok_or(TurnError::SessionNotFound(id))
    }
}

/// Process-local store, shared behind an `Arc`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn create_session(
        &self,
        title: &str,
        model: ModelRef,
        settings: SessionSettings,
    ) -> Result<Session> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            title: title.to_string(),
            model,
            settings,
            checkpoint: None,
            created_at: now,
            updated_at: now,
        };
        self.inner
            .write()
            .await
            .sessions
            .insert(session.id, session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: SessionId) -> Result<Session> {
        self.inner
            .read()
            .await
            .sessions
            .get(&id)
            .cloned()
            .ok_or(TurnError::SessionNotFound(id))
    }

    async fn update_settings(&self, id: SessionId, settings: SessionSettings) -> Result<Session> {
        let mut inner = self.inner.write().await;
        let session = inner.session_mut(id)?;
        if let Some(title) = settings.title.as_deref().filter(|t| !t.is_empty()) {
            session.title = title.to_string();
        }
        session.settings = settings;
        session.updated_at = Utc::now();
        Ok(session.clone())
    }

    async fn set_title(&self, id: SessionId, title: &str) -> Result<Session> {
        let mut inner = self.inner.write().await;
        let session = inner.session_mut(id)?;
        session.title = title.to_string();
        session.updated_at = Utc::now();
        Ok(session.clone())
    }

    async fn set_checkpoint(&self, id: SessionId, message_id: MessageId) -> Result<()> {
        let mut inner = self.inner.write().await;
        let session = inner.session_mut(id)?;
        session.checkpoint = Some(message_id);
        session.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_session(&self, id: SessionId) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .sessions
            .remove(&id)
            .ok_or(TurnError::SessionNotFound(id))?;
        inner.messages.retain(|_, message| message.session_id != id);
        Ok(())
    }

    async fn create_message(&self, message: NewMessage) -> Result<Message> {
        let mut inner = self.inner.write().await;
        if !inner.sessions.contains_key(&message.session_id) {
            return Err(TurnError::SessionNotFound(message.session_id));
        }
        inner.next_id += 1;
        let now = Utc::now();
        let stored = Message {
            id: MessageId(inner.next_id),
            session_id: message.session_id,
            role: message.role,
            content: message.content,
            model: message.model,
            is_round_end: message.is_round_end,
            created_at: now,
            updated_at: now,
        };
        inner.messages.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn append_content(&self, id: MessageId, text: &str) -> Result<Message> {
        let mut inner = self.inner.write().await;
        let message = inner.message_mut(id)?;
        message.content.push_str(text);
        message.updated_at = Utc::now();
        Ok(message.clone())
    }

    async fn update_content(&self, id: MessageId, content: String) -> Result<Message> {
        let mut inner = self.inner.write().await;
        let message = inner.message_mut(id)?;
        message.content = content;
        message.updated_at = Utc::now();
        Ok(message.clone())
    }

    async fn set_round_end(&self, id: MessageId, is_round_end: bool) -> Result<Message> {
        let mut inner = self.inner.write().await;
        let message = inner.message_mut(id)?;
        message.is_round_end = is_round_end;
        message.updated_at = Utc::now();
        Ok(message.clone())
    }

    async fn find_latest_by_role(
        &self,
        session_id: SessionId,
        role: Role,
    ) -> Result<Option<Message>> {
        let inner = self.inner.read().await;
        if !inner.sessions.contains_key(&session_id) {
            return Err(TurnError::SessionNotFound(session_id));
        }
        Ok(inner
            .messages
            .values()
            .rev()
            .find(|m| m.session_id == session_id && m.role == role)
            .cloned())
    }

    async fn list_messages(&self, session_id: SessionId) -> Result<Vec<Message>> {
        let inner = self.inner.read().await;
        if !inner.sessions.contains_key(&session_id) {
            return Err(TurnError::SessionNotFound(session_id));
        }
        Ok(inner
            .messages
            .values()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn session(store: &MemoryStore) -> Session {
        store
            .create_session("chat", ModelRef::new("openai", "gpt-4o-mini"), SessionSettings::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn latest_by_role_follows_creation_order() {
        let store = MemoryStore::new();
        let s = session(&store).await;
        store
            .create_message(NewMessage::new(s.id, Role::Assistant, "first"))
            .await
            .unwrap();
        store
            .create_message(NewMessage::new(s.id, Role::User, "question"))
            .await
            .unwrap();
        let second = store
            .create_message(NewMessage::new(s.id, Role::Assistant, "second"))
            .await
            .unwrap();

        let latest = store
            .find_latest_by_role(s.id, Role::Assistant)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, second.id);
        assert!(store
            .find_latest_by_role(s.id, Role::System)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn delete_cascades_to_messages() {
        let store = MemoryStore::new();
        let keep = session(&store).await;
        let doomed = session(&store).await;
        let kept = store
            .create_message(NewMessage::new(keep.id, Role::User, "stay"))
            .await
            .unwrap();
        let gone = store
            .create_message(NewMessage::new(doomed.id, Role::User, "go"))
            .await
            .unwrap();

        store.delete_session(doomed.id).await.unwrap();

        assert!(matches!(
            store.get_session(doomed.id).await,
            Err(TurnError::SessionNotFound(_))
        ));
        assert!(matches!(
            store.append_content(gone.id, "x").await,
            Err(TurnError::MessageNotFound(_))
        ));
        assert_eq!(store.list_messages(keep.id).await.unwrap(), vec![kept]);
    }

    #[tokio::test]
    async fn settings_update_renames_and_round_end_toggles() {
        let store = MemoryStore::new();
        let s = session(&store).await;
        let updated = store
            .update_settings(
                s.id,
                SessionSettings {
                    title: Some("renamed".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "renamed");
        let titled = store.set_title(s.id, "🐱 Cat facts").await.unwrap();
        assert_eq!(titled.title, "🐱 Cat facts");
        assert_eq!(store.get_session(s.id).await.unwrap().title, "🐱 Cat facts");

        let m = store
            .create_message(NewMessage::new(s.id, Role::Assistant, ""))
            .await
            .unwrap();
        assert!(store.set_round_end(m.id, true).await.unwrap().is_round_end);
        assert!(!store.set_round_end(m.id, false).await.unwrap().is_round_end);
    }

    #[tokio::test]
    async fn messages_require_a_session() {
        let store = MemoryStore::new();
        let err = store
            .create_message(NewMessage::new(Uuid::new_v4(), Role::User, "orphan"))
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::SessionNotFound(_)));
    }
}
