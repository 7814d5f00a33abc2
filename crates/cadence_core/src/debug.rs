//! Helpers for rendering type names in diagnostics

use core::fmt::{self, Write};

/// Lazily shortens a type name produced by [`core::any::type_name`] so that
/// diagnostics read `Movement` instead of `my_game::systems::Movement`.
/// Path segments inside generic arguments are shortened as well
#[derive(Clone, Copy)]
pub struct ShortName<'a>(pub &'a str);

impl fmt::Display for ShortName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rest = self.0;
        while !rest.is_empty() {
            let end = rest
                .find(['<', '>', '(', ')', '[', ']', ',', ';', ' ', '&'])
                .unwrap_or(rest.len());
            let (path, tail) = rest.split_at(end);
            let segment = path.rsplit("::").next().unwrap_or(path);
            f.write_str(segment)?;
            match tail.chars().next() {
                Some(c) => {
                    f.write_char(c)?;
                    rest = &tail[c.len_utf8()..];
                }
                None => rest = tail,
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ShortName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::ShortName;
    use alloc::string::ToString;

    #[test]
    fn strips_module_paths() {
        assert_eq!(ShortName("alpha::beta::Gamma").to_string(), "Gamma");
        assert_eq!(ShortName("Plain").to_string(), "Plain");
    }

    #[test]
    fn shortens_generic_arguments() {
        assert_eq!(
            ShortName("alpha::Outer<alpha::beta::Inner, core::option::Option<u32>>").to_string(),
            "Outer<Inner, Option<u32>>"
        );
    }
}
