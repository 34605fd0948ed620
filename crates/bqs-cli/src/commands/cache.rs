//! `bqs cache` - operator surface over the local metadata cache.

use anyhow::{Context, Result};
use bqs_core::cache::{CacheStore, SqliteCache};
use bqs_core::config::CacheTtl;
use bqs_core::format::format_bytes;
use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Show cache statistics
    Stats,
    /// Remove all cached data
    Clear,
    /// Remove expired cache entries and reclaim disk space
    Cleanup,
}

pub fn run(command: CacheCommand) -> Result<()> {
    let cache =
        SqliteCache::open_default(CacheTtl::DEFAULT).context("failed to initialize cache")?;

    match command {
        CacheCommand::Stats => stats(&cache),
        CacheCommand::Clear => clear(&cache),
        CacheCommand::Cleanup => cleanup(&cache),
    }
}

fn stats(cache: &SqliteCache) -> Result<()> {
    let stats = cache.stats().context("failed to get cache stats")?;

    println!("Cache Statistics:");
    println!("  Total entries:   {}", stats.total_entries);
    println!("  Valid entries:   {}", stats.valid_entries);
    println!("  Expired entries: {}", stats.expired_entries);
    println!("  Database size:   {}", format_bytes(stats.size_bytes));

    if stats.total_entries > 0 {
        let hit_rate = stats.valid_entries as f64 / stats.total_entries as f64 * 100.0;
        println!("  Hit rate:        {hit_rate:.1}%");
    }

    Ok(())
}

fn clear(cache: &SqliteCache) -> Result<()> {
    let stats = cache.stats().context("failed to get cache stats")?;

    if stats.total_entries == 0 {
        println!("Cache is already empty");
        return Ok(());
    }

    cache.clear().context("failed to clear cache")?;
    println!("Cleared {} cache entries", stats.total_entries);

    Ok(())
}

fn cleanup(cache: &SqliteCache) -> Result<()> {
    let before = cache.stats().context("failed to get cache stats")?;

    let removed = cache.cleanup().context("failed to cleanup cache")?;

    if removed > 0 {
        let after = cache
            .stats()
            .context("failed to get cache stats after cleanup")?;
        println!("Removed {removed} expired cache entries");
        println!(
            "Cache size reduced by {}",
            format_bytes(before.size_bytes.saturating_sub(after.size_bytes))
        );
    } else {
        println!("No expired entries to clean up");
    }

    Ok(())
}
