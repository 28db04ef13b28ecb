//! `ApplicationIndex`: applications by client id and redirect URIs.

use authdoc_storage::{IndexDefinition, IndexEntry};

use super::{decode, strings, text};
use crate::models::{Application, Document};

pub const NAME: &str = "ApplicationIndex";

/// Indexed field names.
pub mod fields {
    pub const CLIENT_ID: &str = "clientId";
    pub const REDIRECT_URIS: &str = "redirectUris";
    pub const POST_LOGOUT_REDIRECT_URIS: &str = "postLogoutRedirectUris";
}

#[must_use]
pub fn definition() -> IndexDefinition {
    IndexDefinition::new(NAME, Application::COLLECTION, |document, _| {
        decode::<Application>(NAME, document)
            .map(|application| vec![entry(&application)])
            .unwrap_or_default()
    })
}

pub(crate) fn entry(application: &Application) -> IndexEntry {
    let mut entry = IndexEntry::new();
    entry.insert(fields::CLIENT_ID.into(), text(application.client_id.as_deref()));
    entry.insert(fields::REDIRECT_URIS.into(), strings(&application.redirect_uris));
    entry.insert(
        fields::POST_LOGOUT_REDIRECT_URIS.into(),
        strings(&application.post_logout_redirect_uris),
    );
    entry
}
