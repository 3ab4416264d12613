/// Problems with a command's help text.
///
/// Currently checks that the text starts with `Usage: <command_name>`.
/// An empty result means the help text looks fine.
pub fn help_problems(command_name: &str, help_text: &str) -> Vec<String> {
    let mut problems = Vec::new();
    let expected_start = format!("Usage: {command_name}");

    if !help_text.starts_with(&expected_start) {
        let actual: String = help_text.chars().take(expected_start.chars().count()).collect();
        problems.push(format!(
            "Does not begin with {expected_start:?}. Found {actual:?} instead"
        ));
    }

    problems
}
