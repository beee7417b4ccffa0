use crate::error::{Error, Result};
use crate::models::user::{User, UserWithVisitCount};
use sqlx::PgPool;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, password_hash, is_admin, created_at";

#[derive(Clone)]
pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn list_with_visit_counts(&self) -> Result<Vec<UserWithVisitCount>> {
        let users = sqlx::query_as::<_, UserWithVisitCount>(
            r#"
            SELECT u.id, u.username, u.is_admin, u.created_at,
                   COUNT(v.id) AS visit_count
            FROM users u
            LEFT JOIN visits v ON v.created_by = u.id
            GROUP BY u.id, u.username, u.is_admin, u.created_at
            ORDER BY u.username
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    pub async fn create(&self, username: &str, password_hash: &str, is_admin: bool) -> Result<User> {
        let exists = sqlx::query("SELECT id FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_some() {
            return Err(Error::BadRequest(
                "A user with this username already exists".to_string(),
            ));
        }

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, password_hash, is_admin)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(username)
        .bind(password_hash)
        .bind(is_admin)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn update(
        &self,
        id: Uuid,
        username: Option<&str>,
        password_hash: Option<&str>,
        is_admin: Option<bool>,
    ) -> Result<User> {
        if let Some(name) = username {
            let taken = sqlx::query("SELECT id FROM users WHERE username = $1 AND id <> $2")
                .bind(name)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            if taken.is_some() {
                return Err(Error::BadRequest(
                    "A user with this username already exists".to_string(),
                ));
            }
        }

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                password_hash = COALESCE($3, password_hash),
                is_admin = COALESCE($4, is_admin)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(username)
        .bind(password_hash)
        .bind(is_admin)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("User not found".to_string()))?;
        Ok(user)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound("User not found".to_string()));
        }
        Ok(())
    }

    pub async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound("User not found".to_string()));
        }
        Ok(())
    }
}
