/// The `email` column of a row that is fit to be dispatched to.
///
/// Only blank values and the literal `undefined` (left behind by exporters
/// that stringify missing cells) are rejected here. Anything else is handed
/// to the transport, which reports malformed addresses as a send failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientEmail(String);

impl RecipientEmail {
    pub fn parse(s: String) -> Result<RecipientEmail, String> {
        if s.trim().is_empty() {
            Err("recipient email is empty.".to_string())
        } else if s == "undefined" {
            Err("recipient email is undefined.".to_string())
        } else {
            Ok(Self(s))
        }
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for RecipientEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
