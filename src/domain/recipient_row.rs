use std::collections::HashMap;

use super::recipient_email::RecipientEmail;

/// Lowercase and trim a column name so lookups ignore case and padding.
pub fn normalize_header(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Strip surrounding whitespace, then any run of leading/trailing `"`.
pub fn clean_field(value: &str) -> &str {
    value.trim().trim_matches('"')
}

/// One record of the uploaded table, keyed by normalized column name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientRow {
    fields: HashMap<String, String>,
}

impl RecipientRow {
    /// Pair already-normalized headers with the raw values of one record.
    pub fn from_record<'a, H, V>(headers: H, values: V) -> Self
    where
        H: IntoIterator<Item = &'a str>,
        V: IntoIterator<Item = &'a str>,
    {
        let fields = headers
            .into_iter()
            .zip(values)
            .map(|(header, value)| (header.to_owned(), value.to_owned()))
            .collect();
        Self { fields }
    }

    /// Raw value of a column, untouched.
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.fields.get(&normalize_header(key)).map(String::as_str)
    }

    /// Cleaned value of a column, `None` when absent.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.raw(key).map(clean_field)
    }

    /// The row's email, if it names someone who can be dispatched to.
    pub fn recipient_email(&self) -> Option<RecipientEmail> {
        self.field("email")
            .and_then(|email| RecipientEmail::parse(email.to_owned()).ok())
    }

    /// A row is eligible when it has a usable email and `send_email` is "yes".
    ///
    /// Ineligible rows are skipped without producing an outcome.
    pub fn is_eligible(&self) -> bool {
        let wants_email = self
            .field("send_email")
            .is_some_and(|flag| flag.to_lowercase() == "yes");

        wants_email && self.recipient_email().is_some()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RecipientRow {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let fields = iter
            .into_iter()
            .map(|(key, value)| (normalize_header(&key.into()), value.into()))
            .collect();
        Self { fields }
    }
}
