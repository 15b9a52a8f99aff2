use jot_core::{ErrorKind, ExitCode, JotError, JotResult, Note};
use jot_sync::{
    ExportFormat, ExportOptions, LoadOptions, LoadOutcome, LoadState, ViewQuery, export_notes,
};
use serde_json::json;

use crate::{
    ExportFormatArg, GlobalOptions, NotesCommand, absolutize, print_json, with_sync_context,
};

pub(crate) fn cmd_notes(command: NotesCommand, globals: &GlobalOptions) -> JotResult<ExitCode> {
    with_sync_context(globals, |ctx| match command {
        NotesCommand::List {
            trash,
            starred,
            shared,
            category,
            tag,
            search,
            exclude_category,
            refresh,
        } => {
            let query = ViewQuery {
                in_trash: trash,
                category_id: category,
                tag_id: tag,
                is_starred: starred,
                is_shared: shared,
                search_query: search,
                exclude_category,
                view_mode: ctx.sync.view_mode(),
            };
            let mut options = LoadOptions::new(query);
            if refresh {
                options = options.force_refresh();
            }

            render_outcome(ctx.sync.load_notes(options), globals)
        }
        NotesCommand::View { mode } => render_outcome(ctx.sync.set_view_mode(&mode)?, globals),
        NotesCommand::Remove { id } => render_outcome(ctx.sync.remove_note(&id), globals),
        NotesCommand::Trash { id } => {
            let note = ctx.sync.trash_note(&id)?;
            render_mutation("trashed", &id, note.as_ref(), globals)
        }
        NotesCommand::Restore { id } => {
            let note = ctx.sync.restore_note(&id)?;
            render_mutation("restored", &id, note.as_ref(), globals)
        }
        NotesCommand::Star { id } => {
            let note = ctx.sync.toggle_star(&id)?;
            let action = match &note {
                Some(note) if !note.starred => "unstarred",
                _ => "starred",
            };
            render_mutation(action, &id, note.as_ref(), globals)
        }
        NotesCommand::Export {
            dir,
            format,
            no_trash,
            no_metadata,
        } => {
            let dir = match dir {
                Some(dir) => absolutize(&dir)?,
                None => ctx.paths.export_dir.clone(),
            };
            let options = ExportOptions {
                format: match format {
                    ExportFormatArg::Markdown => ExportFormat::Markdown,
                    ExportFormatArg::Html => ExportFormat::Html,
                },
                include_trashed: !no_trash,
                include_metadata: !no_metadata,
            };
            let summary = export_notes(ctx.sync.global(), &dir, &options)?;

            if globals.json {
                print_json(&json!({"ok": true, "result": summary}))?;
            } else {
                println!(
                    "Exported {} notes to {}",
                    summary.exported,
                    summary.dir.display()
                );
            }
            Ok(ExitCode::Success)
        }
    })
}

fn render_outcome(outcome: LoadOutcome, globals: &GlobalOptions) -> JotResult<ExitCode> {
    if outcome.state == LoadState::Failed {
        let label = outcome.kind.error_message();
        let err = outcome
            .error
            .unwrap_or_else(|| JotError::new(ErrorKind::Server, "no notes could be loaded"));
        return Err(JotError {
            message: format!("{label}: {}", err.message),
            ..err
        });
    }

    if globals.json {
        print_json(&json!({
            "ok": true,
            "result": {
                "view": outcome.kind,
                "state": outcome.state,
                "source": outcome.source,
                "query": outcome.query,
                "count": outcome.notes.len(),
                "notes": outcome.notes,
            }
        }))?;
        return Ok(ExitCode::Success);
    }

    println!("{}", outcome.kind.title());
    if outcome.notes.is_empty() {
        println!("  {}", outcome.kind.empty_message());
    }
    for note in &outcome.notes {
        println!("  {}", note_line(note));
    }
    Ok(ExitCode::Success)
}

fn render_mutation(
    action: &str,
    id: &str,
    note: Option<&Note>,
    globals: &GlobalOptions,
) -> JotResult<ExitCode> {
    if globals.json {
        print_json(&json!({
            "ok": true,
            "result": {
                "action": action,
                "id": id,
                "note": note,
            }
        }))?;
    } else {
        println!("Note {id} {action}.");
        if note.is_none() {
            println!("(not in the local mirror; run `jot notes list` to fetch it)");
        }
    }
    Ok(ExitCode::Success)
}

fn note_line(note: &Note) -> String {
    let mut flags = Vec::new();
    if note.starred {
        flags.push("starred");
    }
    if note.shared {
        flags.push("shared");
    }
    if note.in_trash {
        flags.push("trash");
    }

    let title = if note.title.trim().is_empty() {
        "(untitled)"
    } else {
        note.title.as_str()
    };
    if flags.is_empty() {
        format!("{}  {}", note.id, title)
    } else {
        format!("{}  {}  [{}]", note.id, title, flags.join(", "))
    }
}
