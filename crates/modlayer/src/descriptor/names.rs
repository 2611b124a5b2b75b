//! Name checks shared by the builder and the document decoder.

use crate::error::DescriptorError;

fn invalid(kind: &'static str, name: &str, reason: &'static str) -> DescriptorError {
    DescriptorError::InvalidName {
        kind,
        name: name.to_string(),
        reason,
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn is_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) if is_identifier_start(first) => chars.all(is_identifier_part),
        _ => false,
    }
}

fn check_dotted(kind: &'static str, name: &str) -> Result<(), DescriptorError> {
    if name.is_empty() {
        return Err(invalid(kind, name, "empty name"));
    }
    for part in name.split('.') {
        if part.is_empty() {
            return Err(invalid(kind, name, "empty segment"));
        }
        if !is_identifier(part) {
            return Err(invalid(kind, name, "segment is not an identifier"));
        }
    }
    Ok(())
}

pub(crate) fn check_module_name(name: &str) -> Result<(), DescriptorError> {
    check_dotted("module", name)
}

pub(crate) fn check_package_name(name: &str) -> Result<(), DescriptorError> {
    check_dotted("package", name)
}

/// Service types, provider classes, and main classes must live in a package.
pub(crate) fn check_qualified_name(kind: &'static str, name: &str) -> Result<(), DescriptorError> {
    check_dotted(kind, name)?;
    if !name.contains('.') {
        return Err(invalid(kind, name, "not in a named package"));
    }
    Ok(())
}

/// Package portion of a qualified type name, `""` for an unqualified one.
pub(crate) fn package_of(type_name: &str) -> &str {
    type_name.rsplit_once('.').map_or("", |(package, _)| package)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_identifiers() {
        assert!(check_module_name("java.base").is_ok());
        assert!(check_module_name("m1").is_ok());
        assert!(check_module_name("_x.$y").is_ok());
        assert!(check_module_name("").is_err());
        assert!(check_module_name("a..b").is_err());
        assert!(check_module_name("a.").is_err());
        assert!(check_module_name("1a").is_err());
        assert!(check_package_name("p-q").is_err());
    }

    #[test]
    fn qualified_names_need_a_package() {
        assert!(check_qualified_name("service type", "p.S").is_ok());
        let err = check_qualified_name("service type", "S").unwrap_err();
        assert_eq!(err.to_string(), "S: Invalid service type name: not in a named package");
    }

    #[test]
    fn package_of_type() {
        assert_eq!(package_of("p.q.S"), "p.q");
        assert_eq!(package_of("S"), "");
    }
}
