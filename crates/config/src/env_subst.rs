/// Replace `${ENV_VAR}` and `${ENV_VAR:-fallback}` placeholders.
///
/// A variable that is unset and has no fallback is left as-is, so the
/// validator can point at it later.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated: keep the remainder verbatim.
            result.push_str(&rest[start..]);
            return result;
        };
        let body = &after[..end];
        let (name, fallback) = match body.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (body, None),
        };
        match (name.is_empty(), lookup(name), fallback) {
            (false, Some(value), _) => result.push_str(&value),
            (false, None, Some(fallback)) => result.push_str(fallback),
            _ => {
                result.push_str("${");
                result.push_str(body);
                result.push('}');
            },
        }
        rest = &after[end + 1..];
    }
    result.push_str(rest);
    result
}

/// Whether `value` still contains an unresolved placeholder.
pub fn has_placeholder(value: &str) -> bool {
    value
        .find("${")
        .is_some_and(|start| value[start..].contains('}'))
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn lookup(name: &str) -> Option<String> {
        match name {
            "RELAY_TOKEN" => Some("secret".to_string()),
            "EMPTY" => Some(String::new()),
            _ => None,
        }
    }

    #[rstest]
    #[case("token = \"${RELAY_TOKEN}\"", "token = \"secret\"")]
    #[case("${RELAY_TOKEN}${RELAY_TOKEN}", "secretsecret")]
    #[case("${MISSING}", "${MISSING}")]
    #[case("${MISSING:-300}", "300")]
    #[case("${RELAY_TOKEN:-unused}", "secret")]
    #[case("${EMPTY:-unused}", "")]
    #[case("${}", "${}")]
    #[case("cost: $5 {braces}", "cost: $5 {braces}")]
    #[case("tail ${UNTERMINATED", "tail ${UNTERMINATED")]
    fn substitutes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(substitute_env_with(input, lookup), expected);
    }

    #[test]
    fn detects_leftover_placeholders() {
        assert!(has_placeholder("${AGENT_ACCESS_TOKEN}"));
        assert!(!has_placeholder("plain"));
        assert!(!has_placeholder("${open"));
    }
}
