#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Destination of the runner's human readable progress notices.
pub trait NoticeSink {
    fn notice(&mut self, level: NoticeLevel, message: &str);

    fn info(&mut self, message: &str) {
        self.notice(NoticeLevel::Info, message);
    }

    fn error(&mut self, message: &str) {
        self.notice(NoticeLevel::Error, message);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSink;

impl NoticeSink for SilentSink {
    fn notice(&mut self, _level: NoticeLevel, _message: &str) {}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingSink {
    pub notices: Vec<(NoticeLevel, String)>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<&str> {
        self.notices
            .iter()
            .map(|(_, message)| message.as_str())
            .collect()
    }

    pub fn errors(&self) -> Vec<&str> {
        self.notices
            .iter()
            .filter(|(level, _)| *level == NoticeLevel::Error)
            .map(|(_, message)| message.as_str())
            .collect()
    }
}

impl NoticeSink for RecordingSink {
    fn notice(&mut self, level: NoticeLevel, message: &str) {
        self.notices.push((level, message.to_string()));
    }
}
