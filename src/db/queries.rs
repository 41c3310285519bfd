use sqlx::PgPool;

use crate::models::credits::{Creation, NewCreation};

/// Save a finished generation to the user's gallery
pub async fn insert_creation(pool: &PgPool, new: &NewCreation) -> Result<Creation, sqlx::Error> {
    sqlx::query_as::<_, Creation>(
        r#"
        INSERT INTO creations
            (user_id, original_image_url, generated_image_url, style, prompt, job_title, cost)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, user_id, original_image_url, generated_image_url, style, prompt,
                  job_title, cost, created_at
        "#,
    )
    .bind(&new.user_id)
    .bind(&new.original_image_url)
    .bind(&new.generated_image_url)
    .bind(&new.style)
    .bind(&new.prompt)
    .bind(&new.job_title)
    .bind(new.cost)
    .fetch_one(pool)
    .await
}

/// List a user's creations, newest first
pub async fn list_creations(
    pool: &PgPool,
    user_id: &str,
    limit: i64,
) -> Result<Vec<Creation>, sqlx::Error> {
    sqlx::query_as::<_, Creation>(
        r#"
        SELECT id, user_id, original_image_url, generated_image_url, style, prompt,
               job_title, cost, created_at
        FROM creations
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}
