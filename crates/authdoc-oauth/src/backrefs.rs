//! Authorization back-references.
//!
//! An authorization lists the keys of its tokens. The list is only ever
//! changed through atomic patches issued alongside token writes, so it never
//! needs a read-modify-write of the authorization document.

use authdoc_storage::{PatchOperation, WriteCommand};

use crate::indexes::authorization::fields::TOKENS;
use crate::models::{Authorization, Document};

/// Patches moving `token_id` from the `previous` owner's list to the
/// `current` owner's list. Nothing is emitted when the owner is unchanged.
pub(crate) fn relink(
    token_id: &str,
    previous: Option<&str>,
    current: Option<&str>,
) -> Vec<WriteCommand> {
    let previous = previous.filter(|id| !id.is_empty());
    let current = current.filter(|id| !id.is_empty());
    if previous == current {
        return Vec::new();
    }

    let mut commands = detach(token_id, previous);
    if let Some(owner) = current {
        commands.push(WriteCommand::patch(
            Authorization::COLLECTION,
            owner,
            PatchOperation::add_to_set(TOKENS, token_id),
        ));
    }
    commands
}

/// Patch removing `token_id` from its owner's list.
pub(crate) fn detach(token_id: &str, owner: Option<&str>) -> Vec<WriteCommand> {
    owner
        .filter(|id| !id.is_empty())
        .map(|owner| {
            WriteCommand::patch(
                Authorization::COLLECTION,
                owner,
                PatchOperation::remove(TOKENS, token_id),
            )
        })
        .into_iter()
        .collect()
}
