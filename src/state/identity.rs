//! Run identity.
//!
//! Each export, import or transfer run gets an identifier that tags its log
//! span, so interleaved runs against the same storage path can be told apart.

use uuid::Uuid;

/// Generates a unique identifier for the current run.
///
/// The format is `<hostname>-<pid>-<uuid prefix>`.
#[must_use]
pub fn generate_run_id() -> String {
    let hostname = hostname::get()
        .map_or_else(|_| String::from("unknown"), |h| h.to_string_lossy().to_string());

    let pid = std::process::id();
    let uuid = Uuid::new_v4().simple().to_string();

    format!("{hostname}-{pid}-{}", &uuid[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_is_unique() {
        let first = generate_run_id();
        let second = generate_run_id();
        assert_ne!(first, second);

        let pid = std::process::id().to_string();
        assert!(first.contains(&pid));
    }
}
