use super::recipient_row::RecipientRow;

/// The personalisation fields of one recipient, cleaned once per dispatch.
///
/// Blank cells are treated the same as missing columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientData {
    pub email: Option<String>,
    pub name: Option<String>,
    pub middle_name: Option<String>,
    pub sur_name: Option<String>,
    pub phone_no: Option<String>,
    pub salutation: Option<String>,
    pub position: Option<String>,
}

impl From<&RecipientRow> for RecipientData {
    fn from(row: &RecipientRow) -> Self {
        let field = |key: &str| {
            row.field(key)
                .filter(|value| !value.is_empty())
                .map(str::to_owned)
        };

        Self {
            email: field("email"),
            name: field("name"),
            middle_name: field("middle_name"),
            sur_name: field("sur_name"),
            phone_no: field("phone_no"),
            salutation: field("salutation"),
            position: field("position"),
        }
    }
}
