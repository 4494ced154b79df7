//! Folder watching.
//!
//! Translates `notify` events for one directory (non-recursive) into
//! [`IngestCommand`]s on the ingestion worker's queue. Events are not
//! debounced: an editor that writes a file in three steps produces three
//! commands, and the single writer applies them in order.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::ingest::{IngestCommand, IngestHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderEventKind {
    Created,
    Deleted,
    Modified,
}

/// One filesystem change in the watched folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEvent {
    pub kind: FolderEventKind,
    pub path: PathBuf,
    pub is_dir: bool,
}

impl FolderEvent {
    /// The ingestion command for this event. Directories produce none.
    pub fn to_command(&self) -> Option<IngestCommand> {
        if self.is_dir {
            return None;
        }
        let path = self.path.clone();
        Some(match self.kind {
            FolderEventKind::Created => IngestCommand::Add(path),
            FolderEventKind::Deleted => IngestCommand::Remove(path),
            FolderEventKind::Modified => IngestCommand::Modify(path),
        })
    }
}

/// Map a raw `notify` event to folder events.
///
/// A rename out of the folder counts as a delete and a rename into it as a
/// create. Access and metadata-only changes are dropped.
pub fn classify(event: &Event) -> Vec<FolderEvent> {
    let make = |kind, path: &PathBuf, is_dir| FolderEvent {
        kind,
        path: path.clone(),
        is_dir,
    };

    match &event.kind {
        EventKind::Create(kind) => event
            .paths
            .iter()
            .map(|p| {
                let is_dir = matches!(kind, notify::event::CreateKind::Folder) || p.is_dir();
                make(FolderEventKind::Created, p, is_dir)
            })
            .collect(),
        EventKind::Remove(kind) => event
            .paths
            .iter()
            .map(|p| {
                let is_dir = matches!(kind, notify::event::RemoveKind::Folder);
                make(FolderEventKind::Deleted, p, is_dir)
            })
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => event
            .paths
            .iter()
            .map(|p| make(FolderEventKind::Deleted, p, false))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
            .paths
            .iter()
            .map(|p| make(FolderEventKind::Created, p, p.is_dir()))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to] => vec![
                make(FolderEventKind::Deleted, from, false),
                make(FolderEventKind::Created, to, to.is_dir()),
            ],
            _ => Vec::new(),
        },
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => event
            .paths
            .iter()
            .map(|p| make(FolderEventKind::Modified, p, p.is_dir()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Watch `dir` and forward every change to the ingestion worker. Dropping
/// the returned watcher stops watching.
pub fn watch_folder(dir: &Path, handle: IngestHandle) -> Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            for folder_event in classify(&event) {
                debug!(event = ?folder_event, "folder event");
                if let Some(command) = folder_event.to_command() {
                    if let Err(e) = handle.submit(command) {
                        warn!(error = %e, "dropping folder event");
                    }
                }
            }
        }
        Err(e) => warn!(error = %e, "watch error"),
    })
    .context("Failed to create folder watcher")?;

    watcher
        .watch(dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch folder: {}", dir.display()))?;

    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut e = Event::new(kind);
        for p in paths {
            e = e.add_path(PathBuf::from(p));
        }
        e
    }

    #[test]
    fn test_create_remove_modify() {
        let created = classify(&event(EventKind::Create(CreateKind::File), &["/w/a.pdf"]));
        assert_eq!(created[0].kind, FolderEventKind::Created);
        assert!(!created[0].is_dir);

        let removed = classify(&event(EventKind::Remove(RemoveKind::File), &["/w/a.pdf"]));
        assert_eq!(removed[0].kind, FolderEventKind::Deleted);

        let modified = classify(&event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/w/a.pdf"],
        ));
        assert_eq!(modified[0].kind, FolderEventKind::Modified);
    }

    #[test]
    fn test_rename_is_delete_plus_create() {
        let both = classify(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/w/old.pdf", "/w/new.pdf"],
        ));
        assert_eq!(both.len(), 2);
        assert_eq!(both[0].kind, FolderEventKind::Deleted);
        assert_eq!(both[0].path, PathBuf::from("/w/old.pdf"));
        assert_eq!(both[1].kind, FolderEventKind::Created);
        assert_eq!(both[1].path, PathBuf::from("/w/new.pdf"));
    }

    #[test]
    fn test_metadata_and_access_are_dropped() {
        assert!(classify(&event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any)),
            &["/w/a.pdf"]
        ))
        .is_empty());
        assert!(classify(&event(
            EventKind::Access(notify::event::AccessKind::Any),
            &["/w/a.pdf"]
        ))
        .is_empty());
    }

    #[test]
    fn test_directories_produce_no_command() {
        let events = classify(&event(EventKind::Create(CreateKind::Folder), &["/w/sub"]));
        assert!(events[0].is_dir);
        assert_eq!(events[0].to_command(), None);

        let file = FolderEvent {
            kind: FolderEventKind::Deleted,
            path: PathBuf::from("/w/a.pdf"),
            is_dir: false,
        };
        assert_eq!(
            file.to_command(),
            Some(IngestCommand::Remove(PathBuf::from("/w/a.pdf")))
        );
    }
}
