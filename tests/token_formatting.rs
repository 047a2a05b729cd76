//! S7 - Token formatting, exercised against the public `utils::tokens` API
//! rather than just the in-module unit tests, since the footer string is
//! part of what the TUI actually renders end to end.

use mogzi_agent::utils::tokens::format_tokens;

#[test]
fn s7_token_formatting() {
    assert_eq!(format_tokens(345), "345");
    assert_eq!(format_tokens(1900), "1.9k");
    assert_eq!(format_tokens(15000), "15k");
    assert_eq!(format_tokens(1_900_000), "1.9m");
}
