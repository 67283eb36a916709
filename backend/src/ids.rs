//! Identifier generation for stored entities

use uuid::Uuid;

/// Length of the random part of generated identifiers
pub const ID_LENGTH: usize = 16;

/// Generate an identifier made of `prefix` followed by `length` random
/// lowercase hex characters, e.g. `subscriptionf3c2...`
pub fn generate(prefix: &str, length: usize) -> String {
    let mut random = String::with_capacity(length);
    while random.len() < length {
        random.push_str(&Uuid::new_v4().simple().to_string());
    }
    random.truncate(length);
    format!("{}{}", prefix, random)
}
