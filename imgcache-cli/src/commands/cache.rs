//! Cache management CLI commands.

use clap::ValueEnum;
use imgcache::cache::CacheType;
use imgcache::config::format_size;
use imgcache::SourceDescriptor;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Which tiers an invalidation touches.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Scope {
    Memory,
    Disk,
    All,
}

impl From<Scope> for CacheType {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::Memory => CacheType::Memory,
            Scope::Disk => CacheType::Disk,
            Scope::All => CacheType::All,
        }
    }
}

/// Arguments for the invalidate command.
pub struct InvalidateArgs {
    pub scope: Scope,
    pub entry: Option<String>,
    pub cache_key: Option<String>,
    pub no_wait: bool,
}

/// Run the invalidate command: clear a tier or drop a single entry.
pub async fn invalidate(runner: &CliRunner, args: InvalidateArgs) -> Result<(), CliError> {
    let service = runner.create_service().await?;
    let scope = CacheType::from(args.scope);

    match (args.entry, args.cache_key) {
        (Some(entry), _) => {
            let source = SourceDescriptor::parse(&entry);
            service
                .invalidate_cache_entry(&source, scope, !args.no_wait)
                .await
                .map_err(CliError::Invalidate)?;
            println!("Invalidated {} ({:?})", source, scope);
        }
        (None, Some(custom)) => {
            let key = service.custom_cache_key(&custom);
            service
                .invalidate_cache_key(&key, scope, !args.no_wait)
                .await
                .map_err(CliError::Invalidate)?;
            println!("Invalidated key {} ({:?})", custom, scope);
        }
        (None, None) => {
            service
                .invalidate_cache(scope)
                .await
                .map_err(CliError::Invalidate)?;
            println!("Invalidated {:?} cache", scope);
        }
    }

    service.shutdown().await;
    Ok(())
}

/// Run the stats command.
pub async fn stats(runner: &CliRunner) -> Result<(), CliError> {
    let service = runner.create_service().await?;
    let stats = service.stats();

    println!("Disk cache: {}", runner.config().cache.directory.display());
    if let Some(disk) = service.disk_cache_handle() {
        println!(
            "  Size:      {} / {}",
            format_size(disk.size_bytes() as usize),
            format_size(disk.max_size_bytes() as usize)
        );
    }
    println!("  Writes:    {}", stats.cache.disk.writes);
    println!("  Evictions: {}", stats.cache.disk.evictions);
    println!(
        "Memory cache: {} entries, {}",
        stats.cache.memory.entry_count,
        format_size(stats.cache.memory.size_bytes)
    );

    service.shutdown().await;
    Ok(())
}

/// Run the gc command: one disk garbage collection cycle now.
pub async fn gc(runner: &CliRunner) -> Result<(), CliError> {
    let service = runner.create_service().await?;

    if let Some(disk) = service.disk_cache_handle() {
        let result = disk
            .gc()
            .await
            .map_err(|e| CliError::Maintenance(e.to_string()))?;
        println!(
            "Removed {} entries ({} expired, {} evicted), freed {}",
            result.entries_removed(),
            result.expired,
            result.evicted,
            format_size(result.bytes_freed as usize)
        );
        println!("Cache size now {}", format_size(result.size_after as usize));
    }

    service.shutdown().await;
    Ok(())
}
