use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub value: String,
    pub quoted: bool,
}

impl Ident {
    pub fn quoted(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            quoted: true,
        }
    }

    pub fn unquoted(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            quoted: false,
        }
    }

    /// The name as Postgres stores it in the catalog: unquoted identifiers
    /// fold to lower case, quoted identifiers keep their exact spelling.
    #[must_use]
    pub fn catalog_name(&self) -> String {
        if self.quoted {
            self.value.clone()
        } else {
            self.value.to_ascii_lowercase()
        }
    }

    #[must_use]
    pub fn same_object(&self, other: &Ident) -> bool {
        self.catalog_name() == other.catalog_name()
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.quoted {
            write!(f, "\"{}\"", self.value.replace('"', "\"\""))
        } else {
            f.write_str(&self.value)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    pub schema: Option<Ident>,
    pub name: Ident,
}

impl QualifiedName {
    pub fn unqualified(name: Ident) -> Self {
        Self { schema: None, name }
    }

    /// Two names refer to the same relation when their names match and their
    /// schemas match or at least one side leaves the schema implicit.
    #[must_use]
    pub fn same_object(&self, other: &QualifiedName) -> bool {
        let schemas_match = match (&self.schema, &other.schema) {
            (Some(left), Some(right)) => left.same_object(right),
            _ => true,
        };
        schemas_match && self.name.same_object(&other.name)
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(schema) = &self.schema {
            write!(f, "{schema}.")?;
        }
        write!(f, "{}", self.name)
    }
}

/// Renders `value` as a single-quoted SQL string literal.
#[must_use]
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
