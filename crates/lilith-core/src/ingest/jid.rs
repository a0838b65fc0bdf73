//! Address key conventions.
//!
//! Keys look like `<user>@<server>`. The server part tells the forms apart:
//! `@g.us` for groups, `@s.whatsapp.net` for phone-linked keys, `@lid` for
//! anonymized identifiers. A phone-linked user part may carry a device
//! suffix (`31612345678:12@s.whatsapp.net`).

pub const GROUP_SUFFIX: &str = "@g.us";
pub const PHONE_SUFFIX: &str = "@s.whatsapp.net";
pub const ANON_SUFFIX: &str = "@lid";

pub fn is_group(key: &str) -> bool {
    key.ends_with(GROUP_SUFFIX)
}

pub fn is_phone_linked(key: &str) -> bool {
    key.ends_with(PHONE_SUFFIX)
}

pub fn is_anonymized(key: &str) -> bool {
    key.ends_with(ANON_SUFFIX)
}

/// Bare phone digits of a phone-linked key, `None` for every other form.
pub fn phone_number(key: &str) -> Option<String> {
    let user = key.strip_suffix(PHONE_SUFFIX)?;
    let digits = user.split_once(':').map_or(user, |(digits, _device)| digits);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        Some(digits.to_string())
    } else {
        None
    }
}
