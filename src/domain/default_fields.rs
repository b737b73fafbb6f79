use std::collections::HashMap;

/// Run-wide fallback values for placeholders, e.g. `position=Engineer;salutation=Mx`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultFields(HashMap<String, String>);

impl DefaultFields {
    /// Segments without `=` or with an empty side are dropped silently.
    pub fn parse(raw: &str) -> Self {
        let fields = raw
            .split(';')
            .filter_map(|segment| segment.split_once('='))
            .map(|(key, value)| (key.trim(), value.trim()))
            .filter(|(key, value)| !key.is_empty() && !value.is_empty())
            .map(|(key, value)| (key.to_owned(), value.to_owned()))
            .collect();
        Self(fields)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
