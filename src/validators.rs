//! Input validation for values that end up on an iptables or ssh command line
//!
//! Commands are spawned directly, never through a shell, so these checks are
//! structural: they keep a value from being read as a different argument
//! (a chain name starting with `-`, an unterminated quote). Addresses and
//! ports are left for iptables to judge.

/// Longest chain name iptables accepts (`XT_EXTENSION_MAXNAMELEN - 1`)
pub const MAX_CHAIN_NAME: usize = 28;

/// Splits a specification into arguments, honouring quotes.
///
/// Whitespace separates arguments. Single quotes keep their content
/// literally; double quotes allow `\"` and `\\`; outside quotes a backslash
/// escapes the next character. `u32 "0x0>>0x16=0x0"` therefore yields two
/// arguments with the quotes removed.
///
/// # Errors
///
/// Returns `Err` on an unterminated quote or a trailing backslash.
///
/// # Examples
///
/// ```
/// use ruledeck::validators::split_specification;
///
/// let args = split_specification("-m comment --comment 'allow ssh' -j ACCEPT").unwrap();
/// assert_eq!(args, ["-m", "comment", "--comment", "allow ssh", "-j", "ACCEPT"]);
/// ```
pub fn split_specification(input: &str) -> Result<Vec<String>, String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            '\'' => {
                in_arg = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => current.push(c),
                        None => return Err("Unterminated single quote".to_string()),
                    }
                }
            }
            '"' => {
                in_arg = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c @ ('"' | '\\')) => current.push(c),
                            Some(c) => {
                                current.push('\\');
                                current.push(c);
                            }
                            None => return Err("Unterminated double quote".to_string()),
                        },
                        Some(c) => current.push(c),
                        None => return Err("Unterminated double quote".to_string()),
                    }
                }
            }
            '\\' => match chars.next() {
                Some(c) => {
                    in_arg = true;
                    current.push(c);
                }
                None => return Err("Trailing backslash".to_string()),
            },
            c => {
                in_arg = true;
                current.push(c);
            }
        }
    }

    if in_arg {
        args.push(current);
    }
    Ok(args)
}

/// Validates a chain name before it is placed on a command line.
///
/// # Errors
///
/// Returns `Err` if the name is empty, too long, contains whitespace or
/// control characters, or starts with `-`.
pub fn validate_chain_name(name: &str) -> Result<&str, String> {
    if name.is_empty() {
        return Err("Chain name is empty".to_string());
    }
    if name.len() > MAX_CHAIN_NAME {
        return Err(format!(
            "Chain name too long (max {MAX_CHAIN_NAME} characters)"
        ));
    }
    if name.starts_with('-') {
        return Err("Chain name cannot start with '-'".to_string());
    }
    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err("Chain name contains whitespace or control characters".to_string());
    }
    Ok(name)
}

/// Validates an SSH destination (`host` or `user`).
///
/// # Errors
///
/// Returns `Err` if the value is empty, starts with `-` (would be parsed as
/// an ssh option) or contains whitespace, control characters or `@`.
pub fn validate_ssh_part(kind: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("SSH {kind} is empty"));
    }
    if value.starts_with('-') {
        return Err(format!("SSH {kind} cannot start with '-'"));
    }
    if value
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || c == '@')
    {
        return Err(format!("SSH {kind} contains invalid characters"));
    }
    Ok(())
}
