use serde::Serialize;

/// Parsed SQL statement with the metadata the guard needs
#[derive(Debug, Clone, Default, Serialize)]
pub struct Query {
    pub raw:        String,
    pub query_type: QueryType,
    /// Every relation referenced, as written (`catalog.table`)
    pub tables:     Vec<String>,
    /// Names declared in a top-level WITH clause
    pub cte_names:  Vec<String>
}

impl Query {
    pub fn new(raw: String, query_type: QueryType) -> Self {
        Self {
            raw,
            query_type,
            ..Default::default()
        }
    }

    /// SELECT, including `WITH ... SELECT`
    pub fn is_read_only(&self) -> bool {
        self.query_type == QueryType::Select
    }
}

/// Type of SQL statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
    Truncate,
    Drop,
    Create,
    Attach,
    Pragma,
    #[default]
    Other
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
            Self::Truncate => write!(f, "TRUNCATE"),
            Self::Drop => write!(f, "DROP"),
            Self::Create => write!(f, "CREATE"),
            Self::Attach => write!(f, "ATTACH"),
            Self::Pragma => write!(f, "PRAGMA"),
            Self::Other => write!(f, "OTHER")
        }
    }
}
