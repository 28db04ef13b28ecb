//! `AuthorizationIndex`: authorizations by owner, state and issued tokens.

use authdoc_storage::{IndexDefinition, IndexEntry};

use super::{decode, strings, text, timestamp};
use crate::models::{Authorization, Document};

pub const NAME: &str = "AuthorizationIndex";

/// Indexed field names.
pub mod fields {
    pub const APPLICATION_ID: &str = "applicationId";
    pub const CREATION_DATE: &str = "creationDate";
    pub const SUBJECT: &str = "subject";
    pub const STATUS: &str = "status";
    pub const TYPE: &str = "type";
    pub const SCOPES: &str = "scopes";
    pub const TOKENS: &str = "tokens";
}

#[must_use]
pub fn definition() -> IndexDefinition {
    IndexDefinition::new(NAME, Authorization::COLLECTION, |document, _| {
        decode::<Authorization>(NAME, document)
            .map(|authorization| vec![entry(&authorization)])
            .unwrap_or_default()
    })
}

pub(crate) fn entry(authorization: &Authorization) -> IndexEntry {
    let mut entry = IndexEntry::new();
    entry.insert(
        fields::APPLICATION_ID.into(),
        text(authorization.application_id.as_deref()),
    );
    entry.insert(
        fields::CREATION_DATE.into(),
        timestamp(authorization.creation_date),
    );
    entry.insert(fields::SUBJECT.into(), text(authorization.subject.as_deref()));
    entry.insert(fields::STATUS.into(), text(authorization.status.as_deref()));
    entry.insert(
        fields::TYPE.into(),
        text(authorization.authorization_type.as_deref()),
    );
    entry.insert(fields::SCOPES.into(), strings(&authorization.scopes));
    entry.insert(fields::TOKENS.into(), strings(&authorization.tokens));
    entry
}
