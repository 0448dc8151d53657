/// Normalize a user handle for display on a card.
///
/// Strips all whitespace anywhere in the string, collapses any run of leading
/// `@` characters, and prepends exactly one `@`. The empty string maps to the
/// empty string. Idempotent.
pub fn normalize_handle(input: &str) -> String {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return String::new();
    }
    let bare = compact.trim_start_matches('@');
    format!("@{bare}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepends_single_at() {
        assert_eq!(normalize_handle("emir"), "@emir");
    }

    #[test]
    fn collapses_leading_ats() {
        assert_eq!(normalize_handle("@@@emir"), "@emir");
    }

    #[test]
    fn strips_interior_whitespace() {
        assert_eq!(normalize_handle("  @@Foo Bar "), "@FooBar");
    }

    #[test]
    fn empty_stays_empty() {
        assert_eq!(normalize_handle(""), "");
        assert_eq!(normalize_handle("   "), "");
    }

    #[test]
    fn all_ats_leaves_bare_at() {
        assert_eq!(normalize_handle("@@@"), "@");
    }

    #[test]
    fn idempotent() {
        for s in ["emir", "@@@emir", "  @@Foo Bar ", "", "@a b@c"] {
            let once = normalize_handle(s);
            assert_eq!(normalize_handle(&once), once);
        }
    }
}
