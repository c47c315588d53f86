use std::borrow::Cow;

/// `IS_NULLABLE` / `Null` column of the MySQL column metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nullability {
    Yes,
    No,
}

impl Nullability {
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("NO") {
            Nullability::No
        } else {
            Nullability::Yes
        }
    }
}

/// `COLUMN_KEY` / `Key` column of the MySQL column metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    Primary,
    Unique,
    Multiple,
    None,
}

impl KeyRole {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "PRI" => KeyRole::Primary,
            "UNI" => KeyRole::Unique,
            "MUL" => KeyRole::Multiple,
            _ => KeyRole::None,
        }
    }
}

/// `EXTRA` / `Extra` column of the MySQL column metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extra {
    None,
    AutoIncrement,
    Other(Cow<'static, str>),
}

impl Extra {
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            Extra::None
        } else if s.eq_ignore_ascii_case("auto_increment") {
            Extra::AutoIncrement
        } else {
            Extra::Other(Cow::Owned(s.to_string()))
        }
    }

    pub fn is_auto_increment(&self) -> bool {
        matches!(self, Extra::AutoIncrement)
    }
}

/// One column of a table as the database describes it.
///
/// The expected schema is built from `'static` data; descriptors read back
/// from a live database own their strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub field: Cow<'static, str>,
    pub column_type: Cow<'static, str>,
    pub null: Nullability,
    pub key: KeyRole,
    pub default: Option<Cow<'static, str>>,
    pub extra: Extra,
}

impl ColumnDescriptor {
    /// Type, default and nullability agree. These are the attributes a
    /// `CHANGE` statement can bring into line.
    pub fn attributes_match(&self, live: &ColumnDescriptor) -> bool {
        types_match(&self.column_type, &live.column_type)
            && self.default == live.default
            && self.null == live.null
    }

    /// Every attribute checked for conformance agrees: type, nullability,
    /// default and extra. The key role is not compared; it follows from the
    /// DDL that sets the extra attribute.
    pub fn conforms(&self, live: &ColumnDescriptor) -> bool {
        self.field == live.field && self.attributes_match(live) && self.extra == live.extra
    }

    /// The column as plain `CREATE TABLE` declares it, before keys and
    /// auto-increment are layered on.
    pub fn without_constraints(&self) -> ColumnDescriptor {
        ColumnDescriptor {
            key: KeyRole::None,
            extra: Extra::None,
            ..self.clone()
        }
    }
}

/// Compare declared SQL types, ignoring case and integer display widths.
///
/// MySQL 8.0.19+ reports `int` for a column declared `int(11)`.
pub fn types_match(expected: &str, live: &str) -> bool {
    normalize_type(expected) == normalize_type(live)
}

const INTEGER_TYPES: [&str; 6] = ["tinyint", "smallint", "mediumint", "integer", "bigint", "int"];

fn normalize_type(ty: &str) -> String {
    let ty = ty.trim().to_ascii_lowercase();
    for name in INTEGER_TYPES {
        let Some(rest) = ty.strip_prefix(name) else {
            continue;
        };
        if let Some((width, tail)) = rest.strip_prefix('(').and_then(|r| r.split_once(')'))
            && !width.is_empty()
            && width.chars().all(|c| c.is_ascii_digit())
        {
            return format!("{name}{tail}");
        }
        break;
    }
    ty
}

/// A row of the `auth` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRecord {
    pub order: i64,
    pub id: String,
    /// Lowercase hex HMAC-SHA512 digest.
    pub password: String,
}
