//! `TokenIndex`: tokens by owner, state and dates, joined with the status of
//! the owning authorization.

use authdoc_storage::{DocumentLoader, IndexDefinition, IndexEntry};
use serde_json::Value;

use super::{decode, text, timestamp};
use crate::models::{Authorization, Document, Token};

pub const NAME: &str = "TokenIndex";

/// Indexed field names.
pub mod fields {
    pub const APPLICATION_ID: &str = "applicationId";
    pub const AUTHORIZATION_ID: &str = "authorizationId";
    pub const AUTHORIZATION_STATUS: &str = "authorizationStatus";
    pub const CREATION_DATE: &str = "creationDate";
    pub const EXPIRATION_DATE: &str = "expirationDate";
    pub const SUBJECT: &str = "subject";
    pub const STATUS: &str = "status";
    pub const TYPE: &str = "type";
    pub const REFERENCE_ID: &str = "referenceId";
}

#[must_use]
pub fn definition() -> IndexDefinition {
    IndexDefinition::new(NAME, Token::COLLECTION, |document, loader| {
        decode::<Token>(NAME, document)
            .map(|token| {
                let status = authorization_status(&token, loader);
                vec![entry(&token, status)]
            })
            .unwrap_or_default()
    })
}

/// Status of the owning authorization, or `null` when the token has none or
/// the authorization no longer exists.
fn authorization_status(token: &Token, loader: &mut dyn DocumentLoader) -> Value {
    token
        .authorization_id
        .as_deref()
        .and_then(|id| loader.load(Authorization::COLLECTION, id))
        .and_then(|body| body.get("status").cloned())
        .unwrap_or(Value::Null)
}

pub(crate) fn entry(token: &Token, authorization_status: Value) -> IndexEntry {
    let mut entry = IndexEntry::new();
    entry.insert(
        fields::APPLICATION_ID.into(),
        text(token.application_id.as_deref()),
    );
    entry.insert(
        fields::AUTHORIZATION_ID.into(),
        text(token.authorization_id.as_deref()),
    );
    entry.insert(fields::AUTHORIZATION_STATUS.into(), authorization_status);
    entry.insert(fields::CREATION_DATE.into(), timestamp(token.creation_date));
    entry.insert(
        fields::EXPIRATION_DATE.into(),
        timestamp(token.expiration_date),
    );
    entry.insert(fields::SUBJECT.into(), text(token.subject.as_deref()));
    entry.insert(fields::STATUS.into(), text(token.status.as_deref()));
    entry.insert(fields::TYPE.into(), text(token.token_type.as_deref()));
    entry.insert(
        fields::REFERENCE_ID.into(),
        text(token.reference_id.as_deref()),
    );
    entry
}
