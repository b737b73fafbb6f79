//! Per-recipient substitution of `{{placeholder}}` tokens in a message body.
//!
//! Each placeholder resolves from the recipient's own value first, then from
//! the run's [`DefaultFields`], then from a fixed literal. Tokens that are not
//! in [`Placeholder::ALL`] are left in the output as written, and so is any
//! token that a substituted value happens to contain.

use crate::domain::{DefaultFields, RecipientData};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Email,
    Name,
    MiddleName,
    SurName,
    PhoneNo,
    Salutation,
    Position,
}

impl Placeholder {
    pub const ALL: [Placeholder; 7] = [
        Placeholder::Email,
        Placeholder::Name,
        Placeholder::MiddleName,
        Placeholder::SurName,
        Placeholder::PhoneNo,
        Placeholder::Salutation,
        Placeholder::Position,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Placeholder::Email => "email",
            Placeholder::Name => "name",
            Placeholder::MiddleName => "middle_name",
            Placeholder::SurName => "sur_name",
            Placeholder::PhoneNo => "phone_no",
            Placeholder::Salutation => "salutation",
            Placeholder::Position => "position",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|placeholder| placeholder.key() == key)
    }

    pub fn fallback(self) -> &'static str {
        match self {
            Placeholder::Salutation => "Dear",
            Placeholder::Position => "Position Not Specified",
            _ => "N/A",
        }
    }

    fn from_recipient(self, data: &RecipientData) -> Option<&str> {
        match self {
            Placeholder::Email => data.email.as_deref(),
            Placeholder::Name => data.name.as_deref(),
            Placeholder::MiddleName => data.middle_name.as_deref(),
            Placeholder::SurName => data.sur_name.as_deref(),
            Placeholder::PhoneNo => data.phone_no.as_deref(),
            Placeholder::Salutation => data.salutation.as_deref(),
            Placeholder::Position => data.position.as_deref(),
        }
    }

    /// Recipient value, then run default, then the literal fallback.
    pub fn resolve<'a>(self, data: &'a RecipientData, defaults: &'a DefaultFields) -> &'a str {
        self.from_recipient(data)
            .or_else(|| defaults.get(self.key()))
            .unwrap_or_else(|| self.fallback())
    }
}

/// Substitute every `{{key}}` of `template` in a single left-to-right pass.
pub fn render(template: &str, data: &RecipientData, defaults: &DefaultFields) -> String {
    let mut body = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        body.push_str(&rest[..start]);
        let inner = &rest[start + 2..];
        let placeholder = inner
            .find("}}")
            .and_then(|end| Placeholder::from_key(&inner[..end]).map(|p| (p, end)));
        match placeholder {
            Some((placeholder, end)) => {
                body.push_str(placeholder.resolve(data, defaults));
                rest = &inner[end + 2..];
            }
            // Not a token; keep one brace and look again from the next one.
            None => {
                body.push('{');
                rest = &rest[start + 1..];
            }
        }
    }
    body.push_str(rest);
    body
}
