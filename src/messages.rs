//! Messages between users. A reply is a new message, never an edit.

use log::info;

use crate::error::{StoreError, StoreResult};
use crate::models::{now_timestamp, Message, UserProfile, MESSAGES, USERS};
use crate::store::Store;

#[derive(Clone)]
pub struct MessageService {
    store: Store,
}

impl MessageService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn send(
        &self,
        sender: &UserProfile,
        receiver_id: &str,
        subject: &str,
        content: &str,
    ) -> StoreResult<Message> {
        self.write(sender, receiver_id, subject, content, None).await
    }

    async fn write(
        &self,
        sender: &UserProfile,
        receiver_id: &str,
        subject: &str,
        content: &str,
        reply_to: Option<String>,
    ) -> StoreResult<Message> {
        if subject.trim().is_empty() || content.trim().is_empty() {
            return Err(StoreError::Validation(
                "subject and content are required".to_string(),
            ));
        }
        if !self.store.collection(USERS).doc(receiver_id).get().await?.exists() {
            return Err(StoreError::not_found(USERS, receiver_id));
        }

        let doc_ref = self.store.collection(MESSAGES).new_doc();
        let message = Message {
            id: doc_ref.id().to_string(),
            sender_id: sender.uid.clone(),
            sender_name: sender.name.clone(),
            receiver_id: receiver_id.to_string(),
            subject: subject.to_string(),
            content: content.to_string(),
            created_at: now_timestamp(),
            read: false,
            reply_to,
        };
        doc_ref.set(&message).await?;

        info!("Message {} sent from {} to {receiver_id}", message.id, sender.uid);
        Ok(message)
    }

    /// Messages addressed to `uid`, newest first.
    pub async fn inbox(&self, uid: &str) -> StoreResult<Vec<Message>> {
        let mut messages: Vec<Message> = self
            .store
            .collection(MESSAGES)
            .where_("receiverId", "==", uid)?
            .get()
            .await?
            .deserialize_valid();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(messages)
    }

    /// Answers a message with a new one addressed back to its sender.
    pub async fn reply(&self, author: &UserProfile, message_id: &str, content: &str) -> StoreResult<Message> {
        let original: Message = self
            .store
            .collection(MESSAGES)
            .doc(message_id)
            .get()
            .await?
            .deserialize()?
            .ok_or_else(|| StoreError::not_found(MESSAGES, message_id))?;

        if original.receiver_id != author.uid {
            return Err(StoreError::Validation(format!(
                "message {message_id} was not addressed to {}",
                author.uid
            )));
        }

        let subject = if original.subject.starts_with("Re: ") {
            original.subject.clone()
        } else {
            format!("Re: {}", original.subject)
        };
        self.write(author, &original.sender_id, &subject, content, Some(original.id))
            .await
    }
}
