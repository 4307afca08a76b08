use std::fmt;

use crate::player::events::MopidyEvent;
use crate::player::types::StreamId;
use crate::snapcast::notification::SnapcastNotification;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    Snapcast,
    Mopidy,
    Notice,
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Topic::Snapcast => "Snapcast",
            Topic::Mopidy => "Mopidy",
            Topic::Notice => "Notice",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A user-facing message, shown as a transient banner by front ends.
#[derive(Clone, Debug, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, message: message.into() }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Success, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, message: message.into() }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum BusMessage {
    Snapcast(SnapcastNotification),
    Mopidy { instance: StreamId, event: MopidyEvent },
    Notice(Notice),
}

impl BusMessage {
    pub fn topic(&self) -> Topic {
        match self {
            BusMessage::Snapcast(_) => Topic::Snapcast,
            BusMessage::Mopidy { .. } => Topic::Mopidy,
            BusMessage::Notice(_) => Topic::Notice,
        }
    }
}

impl From<Notice> for BusMessage {
    fn from(notice: Notice) -> Self {
        BusMessage::Notice(notice)
    }
}
