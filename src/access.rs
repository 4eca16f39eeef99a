use thiserror::Error;
use uuid::Uuid;

/// The caller on whose behalf a request runs. Resolved once from the session
/// cookie and passed explicitly into every domain operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    User(Uuid),
}

impl Identity {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Identity::Anonymous => None,
            Identity::User(id) => Some(*id),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("only the owner may modify this resource")]
    Forbidden,
}

/// Requires an authenticated caller, returning its user id.
pub fn require_user(identity: Identity) -> Result<Uuid, AccessError> {
    identity.user_id().ok_or(AccessError::Unauthenticated)
}

/// Requires that the caller is the owner of the resource being mutated.
pub fn authorize_mutation(identity: Identity, owner_id: Uuid) -> Result<Uuid, AccessError> {
    let user_id = require_user(identity)?;
    if user_id != owner_id {
        return Err(AccessError::Forbidden);
    }
    Ok(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_caller_is_unauthenticated() {
        let owner = Uuid::new_v4();
        assert_eq!(
            authorize_mutation(Identity::Anonymous, owner),
            Err(AccessError::Unauthenticated)
        );
        assert_eq!(
            require_user(Identity::Anonymous),
            Err(AccessError::Unauthenticated)
        );
    }

    #[test]
    fn non_owner_is_forbidden() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert_eq!(
            authorize_mutation(Identity::User(other), owner),
            Err(AccessError::Forbidden)
        );
    }

    #[test]
    fn owner_is_authorized() {
        let owner = Uuid::new_v4();
        assert_eq!(authorize_mutation(Identity::User(owner), owner), Ok(owner));
    }
}
