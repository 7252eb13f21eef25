//! Structured change events decoded from `notify` notifications.

use bitflags::bitflags;
use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind, RemoveKind};
use notify::EventKind;
use std::path::Path;

bitflags! {
    /// Raw notification flags for one event, before classification.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventMask: u32 {
        const OPEN          = 0b0000_0000_0001;
        const MODIFY        = 0b0000_0000_0010;
        const CLOSE_WRITE   = 0b0000_0000_0100;
        const CLOSE_NOWRITE = 0b0000_0000_1000;
        const ACCESS        = 0b0000_0001_0000;
        const ATTRIB        = 0b0000_0010_0000;
        const CREATE        = 0b0000_0100_0000;
        const DELETE        = 0b0000_1000_0000;
        const MOVE          = 0b0001_0000_0000;
        const IS_DIR        = 0b0010_0000_0000;
        const OVERFLOW      = 0b0100_0000_0000;
    }
}

bitflags! {
    /// The change kinds a subscription reports to its consumer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Interest: u8 {
        const MODIFIED = 0b001;
        const OPENED   = 0b010;
        const CLOSED   = 0b100;
    }
}

impl Default for Interest {
    fn default() -> Self {
        Interest::all()
    }
}

impl EventMask {
    /// Translates a `notify` event kind into notification flags.
    pub fn from_kind(kind: &EventKind) -> Self {
        match kind {
            EventKind::Access(AccessKind::Open(_)) => EventMask::OPEN,
            EventKind::Access(AccessKind::Close(AccessMode::Write | AccessMode::Any)) => {
                EventMask::CLOSE_WRITE
            }
            EventKind::Access(AccessKind::Close(_)) => EventMask::CLOSE_NOWRITE,
            EventKind::Access(_) => EventMask::ACCESS,
            // Windows reports `Any` for content writes
            EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => EventMask::MODIFY,
            EventKind::Modify(ModifyKind::Metadata(_)) => EventMask::ATTRIB,
            EventKind::Modify(ModifyKind::Name(_)) => EventMask::MOVE,
            EventKind::Modify(ModifyKind::Other) => EventMask::empty(),
            EventKind::Create(CreateKind::Folder) => EventMask::CREATE | EventMask::IS_DIR,
            EventKind::Create(_) => EventMask::CREATE,
            EventKind::Remove(RemoveKind::Folder) => EventMask::DELETE | EventMask::IS_DIR,
            EventKind::Remove(_) => EventMask::DELETE,
            EventKind::Any | EventKind::Other => EventMask::empty(),
        }
    }
}

/// The single kind assigned to a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Opened,
    Modified,
    Closed,
    DirectoryEvent,
    Other,
}

impl ChangeKind {
    /// Classifies a flag set. When several flags coexist the priority is
    /// open, then modify, then close-after-write, then the directory flag.
    pub fn from_mask(mask: EventMask) -> Self {
        if mask.contains(EventMask::OPEN) {
            ChangeKind::Opened
        } else if mask.contains(EventMask::MODIFY) {
            ChangeKind::Modified
        } else if mask.contains(EventMask::CLOSE_WRITE) {
            ChangeKind::Closed
        } else if mask.contains(EventMask::IS_DIR) {
            ChangeKind::DirectoryEvent
        } else {
            ChangeKind::Other
        }
    }

    /// The interest flag that admits this kind, if it is one a subscriber
    /// registers for.
    pub fn interest(self) -> Option<Interest> {
        match self {
            ChangeKind::Opened => Some(Interest::OPENED),
            ChangeKind::Modified => Some(Interest::MODIFIED),
            ChangeKind::Closed => Some(Interest::CLOSED),
            ChangeKind::DirectoryEvent | ChangeKind::Other => None,
        }
    }
}

/// One filesystem notification concerning the watched path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    kind: ChangeKind,
    is_directory: bool,
    name: Option<String>,
    mask: EventMask,
}

impl ChangeEvent {
    /// Builds a file-scoped event of the given kind.
    pub fn new(kind: ChangeKind) -> Self {
        let mask = match kind {
            ChangeKind::Opened => EventMask::OPEN,
            ChangeKind::Modified => EventMask::MODIFY,
            ChangeKind::Closed => EventMask::CLOSE_WRITE,
            ChangeKind::DirectoryEvent => EventMask::IS_DIR,
            ChangeKind::Other => EventMask::empty(),
        };
        Self {
            kind,
            is_directory: kind == ChangeKind::DirectoryEvent,
            name: None,
            mask,
        }
    }

    /// Builds a directory-scoped event naming the affected entry.
    pub fn directory(name: impl Into<String>, mask: EventMask) -> Self {
        Self {
            kind: ChangeKind::DirectoryEvent,
            is_directory: mask.contains(EventMask::IS_DIR),
            name: Some(name.into()),
            mask,
        }
    }

    /// Decodes a `notify` event for a subscription watching `target`.
    ///
    /// Events naming the target itself are classified from their flags.
    /// Events naming any other entry are reported as directory-scoped, with
    /// the entry's file name. Events without paths (such as a rescan request
    /// after a queue overflow) are classified from flags alone.
    pub fn decode(event: &notify::Event, target: &Path) -> Self {
        let mut mask = EventMask::from_kind(&event.kind);
        if event.need_rescan() {
            mask |= EventMask::OVERFLOW;
        }

        if event.paths.is_empty() || is_event_for_path(event, target) {
            let kind = ChangeKind::from_mask(mask);
            return Self {
                kind,
                is_directory: mask.contains(EventMask::IS_DIR),
                name: None,
                mask,
            };
        }

        let name = event
            .paths
            .first()
            .and_then(|path| path.file_name())
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        Self::directory(name, mask)
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn mask(&self) -> EventMask {
        self.mask
    }

    /// Whether a subscriber registered for `interest` should receive this
    /// event. Directory-scoped and unrecognized events are always delivered.
    pub fn is_admitted_by(&self, interest: Interest) -> bool {
        self.kind
            .interest()
            .is_none_or(|flag| interest.contains(flag))
    }
}

/// Check if a notify event concerns exactly the given path
pub(crate) fn is_event_for_path(event: &notify::Event, target: &Path) -> bool {
    event.paths.iter().any(|path| path == target)
}
