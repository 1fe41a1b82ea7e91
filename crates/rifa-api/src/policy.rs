//! Who may do what. Handlers never compare roles themselves; they resolve the
//! caller's profile and ask [`authorize`].

use rifa_types::models::Role;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateRaffle,
    UpdateRaffle,
    SettlePayment,
    ViewStats,
}

pub fn allows(role: Role, action: Action) -> bool {
    match role {
        Role::Admin => true,
        Role::Moderator => matches!(action, Action::SettlePayment | Action::ViewStats),
        Role::User => false,
    }
}

pub fn authorize(role: Role, action: Action) -> Result<(), ApiError> {
    if allows(role, action) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Action; 4] = [
        Action::CreateRaffle,
        Action::UpdateRaffle,
        Action::SettlePayment,
        Action::ViewStats,
    ];

    #[test]
    fn test_admin_may_do_everything() {
        assert!(ALL.iter().all(|a| allows(Role::Admin, *a)));
    }

    #[test]
    fn test_user_may_do_nothing() {
        assert!(ALL.iter().all(|a| !allows(Role::User, *a)));
        assert!(matches!(
            authorize(Role::User, Action::ViewStats),
            Err(ApiError::Unauthorized)
        ));
    }

    #[test]
    fn test_moderator_settles_but_does_not_edit() {
        assert!(allows(Role::Moderator, Action::SettlePayment));
        assert!(allows(Role::Moderator, Action::ViewStats));
        assert!(!allows(Role::Moderator, Action::CreateRaffle));
        assert!(!allows(Role::Moderator, Action::UpdateRaffle));
    }
}
