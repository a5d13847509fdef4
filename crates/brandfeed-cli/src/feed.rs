use brandfeed_core::CanonicalPost;
use brandfeed_store::PostStore;
use chrono::DateTime;

fn fmt_timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string())
}

fn truncate(text: &str, max_chars: usize) -> String {
    let single_line = text.replace(['\n', '\r'], " ");
    if single_line.chars().count() > max_chars {
        format!("{}...", single_line.chars().take(max_chars).collect::<String>())
    } else {
        single_line
    }
}

pub(crate) fn render_posts(posts: &[CanonicalPost]) -> String {
    let mut out = format!("{:<18}{:<18}{:<28}CAPTION", "POSTED", "BRAND", "ID");
    for post in posts {
        out.push('\n');
        out.push_str(&format!(
            "{:<18}{:<18}{:<28}{}",
            fmt_timestamp(post.timestamp),
            post.brand,
            post.id,
            truncate(&post.caption, 50)
        ));
    }
    out
}

/// Print up to `limit` stored posts, optionally for one brand.
///
/// # Errors
///
/// Returns an error if the feed cannot be read.
pub(crate) async fn run_posts(
    store: &PostStore,
    brand: Option<&str>,
    limit: usize,
) -> anyhow::Result<()> {
    let posts = match brand {
        Some(brand) => store.by_brand(brand).await?,
        None => store.get_all().await?,
    };

    if posts.is_empty() {
        println!(
            "no posts stored{}; run `ingest` or `refresh` first",
            brand.map(|b| format!(" for brand {b}")).unwrap_or_default()
        );
        return Ok(());
    }

    let shown = posts.len().min(limit);
    println!("{}", render_posts(&posts[..shown]));
    println!("\n{shown} of {} posts", posts.len());
    Ok(())
}

/// Remove seeded placeholder posts from the feed.
///
/// # Errors
///
/// Returns an error if the feed cannot be read or rewritten.
pub(crate) async fn run_purge_samples(store: &PostStore) -> anyhow::Result<()> {
    let removed = store.purge_samples().await?;
    let remaining = store.get_all().await?.len();
    println!("removed {removed} sample posts; {remaining} posts remain");
    Ok(())
}
