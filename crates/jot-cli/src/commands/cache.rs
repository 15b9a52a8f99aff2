use jot_core::{ExitCode, JotResult, now_millis};
use serde::Serialize;
use serde_json::json;

use crate::{CacheCommand, GlobalOptions, print_json, with_sync_context};

#[derive(Debug, Serialize)]
struct CachedView {
    key: String,
    notes: usize,
    age_ms: i64,
    fresh: bool,
}

pub(crate) fn cmd_cache(command: CacheCommand, globals: &GlobalOptions) -> JotResult<ExitCode> {
    with_sync_context(globals, |ctx| match command {
        CacheCommand::Clear => {
            let cleared = ctx.sync.cache().invalidate_all();
            ctx.state.publish_notes_updated(now_millis());

            if globals.json {
                print_json(&json!({"ok": true, "result": {"cleared": cleared}}))?;
            } else {
                println!("Cleared {cleared} cached views.");
            }
            Ok(ExitCode::Success)
        }
        CacheCommand::Status => {
            let now = now_millis();
            let ttl_ms = ctx.sync.cache().ttl_ms();
            let views: Vec<CachedView> = ctx
                .state
                .cache_keys()
                .into_iter()
                .filter_map(|key| ctx.state.cache_entry(&key))
                .map(|entry| {
                    let age_ms = now.saturating_sub(entry.timestamp);
                    CachedView {
                        key: entry.key,
                        notes: entry.notes.len(),
                        age_ms,
                        fresh: age_ms <= ttl_ms,
                    }
                })
                .collect();
            let mirrored = ctx.sync.global().snapshot().len();

            if globals.json {
                print_json(&json!({
                    "ok": true,
                    "result": {
                        "ttl_ms": ttl_ms,
                        "mirrored_notes": mirrored,
                        "notes_updated": ctx.state.notes_updated(),
                        "views": views,
                    }
                }))?;
            } else {
                println!("Mirrored notes: {mirrored}");
                println!("Cache TTL: {}s", ttl_ms / 1000);
                if views.is_empty() {
                    println!("Cached views: none");
                }
                for view in &views {
                    println!(
                        "[{}] {} ({} notes, {}s old)",
                        if view.fresh { "FRESH" } else { "STALE" },
                        view.key,
                        view.notes,
                        view.age_ms / 1000
                    );
                }
            }
            Ok(ExitCode::Success)
        }
    })
}
