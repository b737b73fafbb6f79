/// Comma-separated carbon copy addresses shared by every message of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CcList(Vec<String>);

impl CcList {
    pub fn parse(raw: &str) -> Self {
        Self(
            raw.split(',')
                .map(str::trim)
                .filter(|address| !address.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
