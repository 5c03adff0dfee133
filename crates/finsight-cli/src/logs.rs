//! Database maintenance and request-log inspection.

use finsight_core::AppConfig;

async fn require_pool(config: &AppConfig) -> anyhow::Result<sqlx::PgPool> {
    crate::optional_pool(config)
        .await?
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set for this command"))
}

/// Apply pending migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub(crate) async fn run_migrate(config: &AppConfig) -> anyhow::Result<()> {
    let pool = require_pool(config).await?;
    let applied = finsight_db::run_migrations(&pool).await?;
    println!("applied {applied} migration(s)");
    Ok(())
}

/// List the most recent forecast requests, newest first.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_logs(config: &AppConfig, limit: i64) -> anyhow::Result<()> {
    let pool = require_pool(config).await?;
    let rows = finsight_db::list_request_logs(&pool, limit.clamp(1, 200)).await?;

    if rows.is_empty() {
        println!("no forecast requests logged yet");
        return Ok(());
    }

    println!("{:<38}{:<18}{:<40}SUMMARY", "REQUEST", "CREATED", "QUERY");
    for row in &rows {
        let created = row.created_at.format("%Y-%m-%d %H:%M").to_string();
        let summary = row.response_json["forecast_summary"]
            .as_str()
            .unwrap_or("-");
        println!(
            "{:<38}{:<18}{:<40}{}",
            row.request_id,
            created,
            truncate(&row.input_query, 38),
            truncate(summary, 60)
        );
    }

    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    short.push_str("...");
    short
}

#[cfg(test)]
mod tests {
    use super::truncate;

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate("outlook", 10), "outlook");
    }

    #[test]
    fn truncate_shortens_on_char_boundaries() {
        assert_eq!(truncate("₹₹₹₹₹₹", 5), "₹₹...");
    }
}
