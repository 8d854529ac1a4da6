//! User accounts (credential store) and roles.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::common::{parse_break_times, serialize_break_times, BreakTime};

/// Workshop roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Administrator,
    JobController,
    Technician,
    ServiceAdvisor,
    Superadmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "administrator",
            Role::JobController => "job-controller",
            Role::Technician => "technician",
            Role::ServiceAdvisor => "service-advisor",
            Role::Superadmin => "superadmin",
        }
    }

    /// Create user accounts (technicians included)
    pub fn can_manage_users(&self) -> bool {
        matches!(self, Role::Administrator | Role::Superadmin)
    }

    /// Book, edit and cancel appointments
    pub fn can_book_appointments(&self) -> bool {
        matches!(
            self,
            Role::Administrator | Role::Superadmin | Role::JobController | Role::ServiceAdvisor
        )
    }

    /// Create, edit and delete job orders
    pub fn can_manage_job_orders(&self) -> bool {
        matches!(
            self,
            Role::Administrator | Role::Superadmin | Role::JobController
        )
    }

    /// Close the day and carry unfinished job orders over
    pub fn can_run_end_of_day(&self) -> bool {
        matches!(self, Role::JobController | Role::Superadmin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "administrator" => Ok(Role::Administrator),
            "job-controller" => Ok(Role::JobController),
            "technician" => Ok(Role::Technician),
            "service-advisor" => Ok(Role::ServiceAdvisor),
            "superadmin" => Ok(Role::Superadmin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// Stored user row. Carries the password hash and never leaves the server.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub level: Option<String>,
    pub picture_url: Option<String>,
    pub break_times: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Projection returned by login: name, email, role and picture only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoginUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub picture_url: Option<String>,
}

/// Public view of a user for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    pub picture_url: Option<String>,
    pub break_times: Vec<BreakTime>,
    pub created_at: String,
}

/// Fields needed to insert a user; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub level: Option<String>,
    pub picture_url: Option<String>,
    pub break_times: Vec<BreakTime>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: LoginUser,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub level: Option<String>,
    pub picture_url: Option<String>,
    #[serde(default)]
    pub break_times: Vec<BreakTime>,
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub role: Option<String>,
}

impl User {
    /// Parsed role. Rows are constrained by the schema, so an unknown value
    /// means the database was edited by hand; it is treated as least privileged.
    pub fn role(&self) -> Role {
        self.role.parse().unwrap_or_else(|e| {
            tracing::warn!(user_id = %self.id, "{}", e);
            Role::Technician
        })
    }

    pub fn login_projection(&self) -> LoginUser {
        LoginUser {
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role(),
            picture_url: self.picture_url.clone(),
        }
    }

    pub async fn find_by_email(db: &SqlitePool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE email = ? COLLATE NOCASE")
            .bind(email)
            .fetch_optional(db)
            .await
    }

    pub async fn get_by_id(db: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn list(db: &SqlitePool, role: Option<Role>) -> Result<Vec<User>, sqlx::Error> {
        match role {
            Some(role) => {
                sqlx::query_as("SELECT * FROM users WHERE role = ? ORDER BY name ASC")
                    .bind(role.as_str())
                    .fetch_all(db)
                    .await
            }
            None => {
                sqlx::query_as("SELECT * FROM users ORDER BY name ASC")
                    .fetch_all(db)
                    .await
            }
        }
    }

    pub async fn create(db: &SqlitePool, new: &NewUser) -> Result<User, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, level, picture_url, break_times, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.role.as_str())
        .bind(&new.level)
        .bind(&new.picture_url)
        .bind(serialize_break_times(&new.break_times))
        .bind(&now)
        .bind(&now)
        .execute(db)
        .await?;

        Self::get_by_id(db, &id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        let role = user.role();
        let break_times = parse_break_times(user.break_times.as_deref());
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role,
            level: user.level,
            picture_url: user.picture_url,
            break_times,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        for role in [
            Role::Administrator,
            Role::JobController,
            Role::Technician,
            Role::ServiceAdvisor,
            Role::Superadmin,
        ] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
            assert_eq!(
                serde_json::to_value(role).unwrap(),
                serde_json::Value::String(role.as_str().to_string())
            );
        }
        assert!("mechanic".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_permissions() {
        assert!(Role::JobController.can_run_end_of_day());
        assert!(!Role::Technician.can_run_end_of_day());
        assert!(!Role::ServiceAdvisor.can_run_end_of_day());
        assert!(Role::ServiceAdvisor.can_book_appointments());
        assert!(!Role::Technician.can_book_appointments());
        assert!(Role::Administrator.can_manage_users());
        assert!(!Role::JobController.can_manage_users());
    }

    #[test]
    fn test_login_projection_has_no_hash() {
        let user = User {
            id: "u1".into(),
            name: "Tess Tech".into(),
            email: "tech@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            role: "technician".into(),
            level: Some("2".into()),
            picture_url: None,
            break_times: None,
            created_at: String::new(),
            updated_at: String::new(),
        };

        let json = serde_json::to_string(&user.login_projection()).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("\"pictureUrl\":null"));
        assert!(json.contains("\"role\":\"technician\""));
    }
}
