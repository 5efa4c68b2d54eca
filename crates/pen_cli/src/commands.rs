//! Subcommand execution. Every command returns the text to print.

use crate::args::Command;
use anyhow::{anyhow, bail, Context, Result};
use pen_core::{
    render_wiki_links, Attachment, AttachmentPayload, MergeReport, Note, NotePatch, VaultConfig,
    VaultStore,
};
use std::path::Path;

pub struct Ctx {
    pub store: VaultStore,
    pub config: VaultConfig,
    pub password: Option<String>,
}

impl Ctx {
    fn password(&self) -> Result<&str> {
        self.password
            .as_deref()
            .filter(|password| !password.is_empty())
            .ok_or_else(|| anyhow!("a password is required (--password or PEN_PASSWORD)"))
    }
}

pub fn execute(ctx: &mut Ctx, command: Command) -> Result<String> {
    match command {
        Command::List => Ok(note_lines(&ctx.store.list()?)),
        Command::New { title, content } => {
            let note = ctx.store.create()?;
            let patch = NotePatch { title, content };
            let note = if patch.title.is_some() || patch.content.is_some() {
                ctx.store
                    .update(&note.id, &patch)?
                    .ok_or_else(|| anyhow!("note {} vanished after create", note.id))?
            } else {
                note
            };
            Ok(note.id)
        }
        Command::Show { id } => {
            let note = ctx
                .store
                .get(&id)?
                .ok_or_else(|| anyhow!("note not found: {id}"))?;
            Ok(show_note(&note))
        }
        Command::Edit { id, title, content } => {
            if title.is_none() && content.is_none() {
                bail!("nothing to change; pass --title and/or --content");
            }
            let note = ctx
                .store
                .update(&id, &NotePatch { title, content })?
                .ok_or_else(|| anyhow!("note not found: {id}"))?;
            Ok(format!("{} updated {}", note.id, note.updated_at.to_rfc3339()))
        }
        Command::Rm { id } => {
            if !ctx.store.remove(&id)? {
                bail!("note not found: {id}");
            }
            Ok(format!("removed {id}"))
        }
        Command::AddImage { note, path } => {
            let payload = read_payload(&path)?;
            let image = ctx.store.add_image(&note, payload)?;
            Ok(format!("image:{}", image.id))
        }
        Command::AddFile { note, path, mime } => {
            let mut payload = read_payload(&path)?;
            if let Some(mime) = mime {
                payload = payload.with_mime_type(mime);
            }
            let file = ctx.store.add_file(&note, payload)?;
            Ok(format!("file:{}", file.id))
        }
        Command::Attachments { note } => {
            let mut attachments = ctx.store.list_images(&note)?;
            attachments.extend(ctx.store.list_files(&note)?);
            Ok(attachment_lines(&attachments))
        }
        Command::Search { query } => Ok(note_lines(&ctx.store.search(&query)?)),
        Command::Export { out, note } => {
            let json = ctx.store.export_json(note.as_deref())?;
            write_output(&out, &json)?;
            Ok(format!("wrote {}", out.display()))
        }
        Command::Import { input } => {
            let json = read_input(&input)?;
            let report = ctx.store.import_json(&json)?;
            Ok(report_line(&report))
        }
        Command::Seal { out, note, hint } => {
            let options = ctx.config.seal_options(hint);
            let envelope =
                ctx.store
                    .export_encrypted(ctx.password()?, note.as_deref(), &options)?;
            write_output(&out, &envelope.to_json()?)?;
            Ok(format!("sealed {}", out.display()))
        }
        Command::Open { input } => {
            let json = read_input(&input)?;
            let password = ctx.password()?.to_string();
            let report = ctx.store.import_encrypted(&password, &json)?;
            Ok(report_line(&report))
        }
    }
}

fn read_payload(path: &Path) -> Result<AttachmentPayload> {
    let data = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("{} has no file name", path.display()))?;
    Ok(AttachmentPayload::new(name, data))
}

fn read_input(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write_output(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

fn note_lines(notes: &[Note]) -> String {
    let mut out = String::new();
    for note in notes {
        let title = if note.title.is_empty() {
            "(untitled)"
        } else {
            note.title.as_str()
        };
        out.push_str(&format!(
            "{}  {}  {}",
            note.id,
            note.updated_at.to_rfc3339(),
            title
        ));
        if !note.tags.is_empty() {
            out.push_str(&format!("  #{}", note.tags.join(" #")));
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

fn show_note(note: &Note) -> String {
    format!(
        "# {}\nid: {}\ncreated: {}\nupdated: {}\ntags: {}\n\n{}",
        note.title,
        note.id,
        note.created_at.to_rfc3339(),
        note.updated_at.to_rfc3339(),
        note.tags.join(", "),
        render_wiki_links(&note.content)
    )
}

fn attachment_lines(attachments: &[Attachment]) -> String {
    attachments
        .iter()
        .map(|attachment| {
            format!(
                "{}:{}  {}  {}  {} bytes",
                attachment.kind.scheme(),
                attachment.id,
                attachment.name,
                attachment.mime_type.as_deref().unwrap_or("-"),
                attachment.data.len()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn report_line(report: &MergeReport) -> String {
    format!(
        "notes: {} inserted, {} replaced, {} kept; images: {} inserted, {} skipped; files: {} inserted, {} skipped; orphans skipped: {}",
        report.notes_inserted,
        report.notes_replaced,
        report.notes_kept,
        report.images_inserted,
        report.images_skipped,
        report.files_inserted,
        report.files_skipped,
        report.orphans_skipped
    )
}
