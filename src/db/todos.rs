//! Todo persistence.
//!
//! [`TodoStore`] runs the CRUD statements against whichever pool the
//! bootstrapper produced. SQL is kept per dialect; the two backends differ in
//! placeholder syntax and column types.

use crate::db::pool::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::todo::validate_title;
use crate::models::{NewTodo, Todo, TodoPatch};
use chrono::Utc;
use tracing::debug;

mod sqlite {
    pub const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS todos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title VARCHAR(200) NOT NULL,
        completed BOOLEAN NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )";
    pub const LIST: &str = "SELECT id, title, completed, created_at FROM todos ORDER BY id";
    pub const GET: &str = "SELECT id, title, completed, created_at FROM todos WHERE id = ?";
    pub const INSERT: &str = "INSERT INTO todos (title, completed, created_at) VALUES (?, ?, ?)
        RETURNING id, title, completed, created_at";
    pub const UPDATE: &str = "UPDATE todos
        SET title = COALESCE(?, title), completed = COALESCE(?, completed)
        WHERE id = ?
        RETURNING id, title, completed, created_at";
    pub const DELETE: &str = "DELETE FROM todos WHERE id = ?";
}

mod postgres {
    pub const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS todos (
        id BIGSERIAL PRIMARY KEY,
        title VARCHAR(200) NOT NULL,
        completed BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL
    )";
    pub const LIST: &str = "SELECT id, title, completed, created_at FROM todos ORDER BY id";
    pub const GET: &str = "SELECT id, title, completed, created_at FROM todos WHERE id = $1";
    pub const INSERT: &str = "INSERT INTO todos (title, completed, created_at) VALUES ($1, $2, $3)
        RETURNING id, title, completed, created_at";
    pub const UPDATE: &str = "UPDATE todos
        SET title = COALESCE($1, title), completed = COALESCE($2, completed)
        WHERE id = $3
        RETURNING id, title, completed, created_at";
    pub const DELETE: &str = "DELETE FROM todos WHERE id = $1";
}

/// CRUD access to the `todos` table.
#[derive(Debug, Clone)]
pub struct TodoStore {
    pool: DbPool,
}

impl TodoStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Create the `todos` table if it does not exist.
    pub async fn init_schema(&self) -> AppResult<()> {
        debug!(backend = %self.pool.backend(), "Ensuring todos table exists");
        match &self.pool {
            DbPool::Embedded(pool) => {
                sqlx::query(sqlite::CREATE_TABLE).execute(pool).await?;
            }
            DbPool::Managed(pool) => {
                let mut conn = pool.get().await?;
                sqlx::query(postgres::CREATE_TABLE)
                    .execute(&mut *conn)
                    .await?;
            }
        }
        Ok(())
    }

    pub async fn list(&self) -> AppResult<Vec<Todo>> {
        let todos = match &self.pool {
            DbPool::Embedded(pool) => {
                sqlx::query_as::<_, Todo>(sqlite::LIST)
                    .fetch_all(pool)
                    .await?
            }
            DbPool::Managed(pool) => {
                let mut conn = pool.get().await?;
                sqlx::query_as::<_, Todo>(postgres::LIST)
                    .fetch_all(&mut *conn)
                    .await?
            }
        };
        Ok(todos)
    }

    pub async fn get(&self, id: i64) -> AppResult<Todo> {
        let todo = match &self.pool {
            DbPool::Embedded(pool) => {
                sqlx::query_as::<_, Todo>(sqlite::GET)
                    .bind(id)
                    .fetch_optional(pool)
                    .await?
            }
            DbPool::Managed(pool) => {
                let mut conn = pool.get().await?;
                sqlx::query_as::<_, Todo>(postgres::GET)
                    .bind(id)
                    .fetch_optional(&mut *conn)
                    .await?
            }
        };
        todo.ok_or_else(|| AppError::todo_not_found(id))
    }

    /// Insert a todo. Fails with `InvalidInput` when the title is missing or too long.
    pub async fn create(&self, input: NewTodo) -> AppResult<Todo> {
        let title = input
            .title
            .ok_or_else(|| AppError::invalid_input("Title is required"))?;
        validate_title(&title).map_err(AppError::invalid_input)?;
        let created_at = Utc::now();

        let todo = match &self.pool {
            DbPool::Embedded(pool) => {
                sqlx::query_as::<_, Todo>(sqlite::INSERT)
                    .bind(&title)
                    .bind(input.completed)
                    .bind(created_at)
                    .fetch_one(pool)
                    .await?
            }
            DbPool::Managed(pool) => {
                let mut conn = pool.get().await?;
                sqlx::query_as::<_, Todo>(postgres::INSERT)
                    .bind(&title)
                    .bind(input.completed)
                    .bind(created_at)
                    .fetch_one(&mut *conn)
                    .await?
            }
        };
        debug!(id = todo.id, "Created todo");
        Ok(todo)
    }

    /// Apply a partial update; absent fields keep their stored values.
    pub async fn update(&self, id: i64, patch: TodoPatch) -> AppResult<Todo> {
        if let Some(title) = &patch.title {
            validate_title(title).map_err(AppError::invalid_input)?;
        }

        let todo = match &self.pool {
            DbPool::Embedded(pool) => {
                sqlx::query_as::<_, Todo>(sqlite::UPDATE)
                    .bind(patch.title.as_deref())
                    .bind(patch.completed)
                    .bind(id)
                    .fetch_optional(pool)
                    .await?
            }
            DbPool::Managed(pool) => {
                let mut conn = pool.get().await?;
                sqlx::query_as::<_, Todo>(postgres::UPDATE)
                    .bind(patch.title.as_deref())
                    .bind(patch.completed)
                    .bind(id)
                    .fetch_optional(&mut *conn)
                    .await?
            }
        };
        todo.ok_or_else(|| AppError::todo_not_found(id))
    }

    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let affected = match &self.pool {
            DbPool::Embedded(pool) => {
                sqlx::query(sqlite::DELETE)
                    .bind(id)
                    .execute(pool)
                    .await?
                    .rows_affected()
            }
            DbPool::Managed(pool) => {
                let mut conn = pool.get().await?;
                sqlx::query(postgres::DELETE)
                    .bind(id)
                    .execute(&mut *conn)
                    .await?
                    .rows_affected()
            }
        };
        if affected == 0 {
            return Err(AppError::todo_not_found(id));
        }
        debug!(id, "Deleted todo");
        Ok(())
    }
}
