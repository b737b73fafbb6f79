mod cc_list;
mod default_fields;
mod recipient_data;
mod recipient_email;
mod recipient_row;

pub use cc_list::CcList;
pub use default_fields::DefaultFields;
pub use recipient_data::RecipientData;
pub use recipient_email::RecipientEmail;
pub use recipient_row::{RecipientRow, clean_field, normalize_header};
