use bcrypt::{hash, verify};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{AsRefStr, Display, EnumString};
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::inventory::InventoryError;

lazy_static! {
    static ref USERNAME_REGEX: Regex = Regex::new(r"^[A-Za-z0-9._-]{3,50}$").unwrap();
}

// ======== USER ROLE ========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase", ascii_case_insensitive)]
pub enum Role {
    Admin,
    Supervisor,
    #[serde(alias = "teamleader")]
    TeamLeader,
    Staff,
    InventoryController,
}

impl Role {
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Admin => "Administrator",
            Role::Supervisor => "Supervisor",
            Role::TeamLeader => "Team Leader",
            Role::Staff => "Staff",
            Role::InventoryController => "Inventory Controller",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Role::Admin => "Full access including users and direct stock edits",
            Role::Supervisor => "Manages jobs; may assign materials past available stock",
            Role::TeamLeader => "Runs jobs on site and records completion",
            Role::Staff => "Works jobs; read-only access to materials",
            Role::InventoryController => "Owns the stock ledger and receives collections",
        }
    }

    // ======== USER MANAGEMENT ========
    pub fn can_manage_users(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn can_send_notifications(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn can_view_tracking(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Roles whose location is shown on the live tracking map.
    pub fn is_tracked(&self) -> bool {
        matches!(self, Role::TeamLeader | Role::Supervisor)
    }

    // ======== JOB PERMISSIONS ========
    pub fn can_approve_jobs(&self) -> bool {
        matches!(self, Role::Admin | Role::Supervisor)
    }

    // ======== INVENTORY PERMISSIONS ========

    /// Direct ledger edits: materials replacement, returns, receiving
    /// collections, reading the audit trail.
    pub fn can_mutate_stock(&self) -> bool {
        matches!(self, Role::Admin | Role::InventoryController)
    }

    /// Job-driven assignment that is not held to available stock.
    pub fn can_assign_without_stock_check(&self) -> bool {
        matches!(self, Role::Admin | Role::InventoryController | Role::Supervisor)
    }

    pub fn can_view_inventory_audit(&self) -> bool {
        self.can_mutate_stock()
    }

    pub fn all_roles() -> Vec<Self> {
        vec![
            Role::Admin,
            Role::Supervisor,
            Role::TeamLeader,
            Role::Staff,
            Role::InventoryController,
        ]
    }
}

// ======== AUTHORIZATION GATE ========

pub enum InventoryAction {
    ViewMaterials,
    ReplaceMaterials,
    Assign,
    Return,
    ReceiveCollection,
    ViewPendingCollections,
    ViewTransactions,
}

pub fn check_inventory_permission(actor: &Actor, action: InventoryAction) -> Result<(), InventoryError> {
    let allowed = match action {
        InventoryAction::ViewMaterials | InventoryAction::Assign => true,
        InventoryAction::ReplaceMaterials
        | InventoryAction::Return
        | InventoryAction::ReceiveCollection
        | InventoryAction::ViewPendingCollections => actor.role.can_mutate_stock(),
        InventoryAction::ViewTransactions => actor.role.can_view_inventory_audit(),
    };

    if allowed {
        Ok(())
    } else {
        Err(InventoryError::AccessDenied(format!(
            "role '{}' may not perform this inventory operation",
            actor.role
        )))
    }
}

// ======== USER MODEL ========

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

/// Caller identity attached to every mutation for authorization and audit.
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub username: String,
    pub name: String,
    pub role: Role,
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

pub fn user_key(username: &str) -> String {
    username.trim().to_lowercase()
}

pub fn find_user<'a>(users: &'a BTreeMap<String, User>, username: &str) -> Option<&'a User> {
    users.get(&user_key(username))
}

pub fn resolve_actor(users: &BTreeMap<String, User>, username: &str) -> ApiResult<Actor> {
    if username.trim().is_empty() {
        return Err(ApiError::Unauthorized("Username is required".to_string()));
    }
    find_user(users, username)
        .map(Actor::from)
        .ok_or_else(|| ApiError::unknown_user(username))
}

pub fn users_with_role(users: &BTreeMap<String, User>, role: Role) -> impl Iterator<Item = &User> {
    users.values().filter(move |u| u.role == role)
}

// ======== PASSWORDS ========

pub fn hash_password(password: &str, cost: u32) -> ApiResult<String> {
    Ok(hash(password, cost)?)
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    verify(password, password_hash).unwrap_or(false)
}

// ======== REQUEST/RESPONSE STRUCTS ========

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, message = "Username of the caller is required"))]
    pub requested_by: String,
    #[validate(regex(path = *USERNAME_REGEX, message = "Username must be 3-50 letters, digits, '.', '_' or '-'"))]
    pub username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub role: Role,
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(max = 30, message = "Phone cannot exceed 30 characters"))]
    pub phone: Option<String>,
}

/// Public view of a user; never carries the password hash.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub username: String,
    pub role: Role,
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            role: user.role,
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role) -> Actor {
        Actor { username: "u".into(), name: "U".into(), role }
    }

    #[test]
    fn test_three_tier_stock_permissions() {
        assert!(Role::Admin.can_mutate_stock());
        assert!(Role::InventoryController.can_mutate_stock());
        assert!(!Role::Supervisor.can_mutate_stock());
        assert!(!Role::TeamLeader.can_mutate_stock());

        assert!(Role::Supervisor.can_assign_without_stock_check());
        assert!(Role::InventoryController.can_assign_without_stock_check());
        assert!(!Role::Staff.can_assign_without_stock_check());
        assert!(!Role::TeamLeader.can_assign_without_stock_check());
    }

    #[test]
    fn test_gate_denies_supervisor_direct_edits() {
        let supervisor = actor(Role::Supervisor);
        assert!(check_inventory_permission(&supervisor, InventoryAction::Assign).is_ok());
        assert!(matches!(
            check_inventory_permission(&supervisor, InventoryAction::ReceiveCollection),
            Err(InventoryError::AccessDenied(_))
        ));
        assert!(check_inventory_permission(&actor(Role::InventoryController), InventoryAction::ViewTransactions).is_ok());
    }

    #[test]
    fn test_admin_only_and_approval_permissions() {
        assert!(Role::Admin.can_send_notifications());
        assert!(!Role::InventoryController.can_send_notifications());
        assert!(Role::Admin.can_view_tracking());
        assert!(!Role::Supervisor.can_view_tracking());
        assert!(Role::Supervisor.can_approve_jobs());
        assert!(!Role::TeamLeader.can_approve_jobs());
        assert!(Role::TeamLeader.is_tracked());
        assert!(!Role::Staff.is_tracked());
    }

    #[test]
    fn test_role_names() {
        assert_eq!(serde_json::to_string(&Role::InventoryController).unwrap(), "\"inventoryController\"");
        let legacy: Role = serde_json::from_str("\"teamleader\"").unwrap();
        assert_eq!(legacy, Role::TeamLeader);
        assert_eq!("inventorycontroller".parse::<Role>().unwrap(), Role::InventoryController);
        assert_eq!(Role::TeamLeader.to_string(), "teamLeader");
    }

    #[test]
    fn test_resolve_actor_is_case_insensitive() {
        let mut users = BTreeMap::new();
        users.insert(
            user_key("Admin"),
            User {
                username: "admin".into(),
                password_hash: String::new(),
                role: Role::Admin,
                name: "Admin User".into(),
                email: String::new(),
                phone: String::new(),
            },
        );

        let found = resolve_actor(&users, "ADMIN").unwrap();
        assert_eq!(found.role, Role::Admin);
        assert!(matches!(resolve_actor(&users, "ghost"), Err(ApiError::Unauthorized(_))));
        assert!(matches!(resolve_actor(&users, "  "), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn test_password_roundtrip() {
        let hashed = hash_password("correct horse", 4).unwrap();
        assert!(verify_password("correct horse", &hashed));
        assert!(!verify_password("wrong", &hashed));
    }
}
