/// Trims and lower-cases an email address. Returns `None` when nothing is left.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() { None } else { Some(email) }
}
