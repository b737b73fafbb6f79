use crate::domain::CcList;

/// A file to send along with the message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAttachment {
    pub filename: String,
    pub content: Vec<u8>,
}

impl MessageAttachment {
    /// Only yields an attachment when both halves are present.
    pub fn from_parts(content: Option<Vec<u8>>, filename: Option<String>) -> Option<Self> {
        match (content, filename) {
            (Some(content), Some(filename)) if !filename.trim().is_empty() => {
                Some(Self { filename, content })
            }
            _ => None,
        }
    }
}

/// Everything needed to send one message; consumed by a single dispatch.
#[derive(Debug, Clone)]
pub struct DispatchJob {
    pub recipient: String,
    pub cc: CcList,
    pub subject: String,
    pub body: String,
    pub attachment: Option<MessageAttachment>,
}
