use proptest::prelude::*;

/// Strategy for generating key segments without glob metacharacters
pub fn key_segment_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9:._+()-]{1,16}"
}

/// Strategy for generating cache keys made of two segments
pub fn cache_key_strategy() -> impl Strategy<Value = String> {
    (key_segment_strategy(), key_segment_strategy()).prop_map(|(a, b)| format!("{a}:{b}"))
}

/// Strategy for generating glob patterns mixing literals and wildcards
pub fn glob_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            key_segment_strategy(),
            Just("*".to_string()),
            Just("?".to_string()),
        ],
        1..5,
    )
    .prop_map(|parts| parts.concat())
}
